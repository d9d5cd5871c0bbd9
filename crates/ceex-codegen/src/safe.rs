//! Safe (already escaped) output.
//!
//! Rendering produces a [`Safe`] value: a list of chunks that are known to
//! be valid HTML. Static template text is shared between renders through
//! `Arc<str>` and is never copied or escaped again.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
enum Chunk {
    Static(Arc<str>),
    Owned(String),
}

impl Chunk {
    fn as_str(&self) -> &str {
        match self {
            Chunk::Static(s) => s,
            Chunk::Owned(s) => s,
        }
    }
}

/// Escaped output, flattened with `to_string()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Safe {
    chunks: Vec<Chunk>,
}

impl Safe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap text the caller vouches for. Nothing is escaped.
    pub fn raw(html: impl Into<String>) -> Self {
        let mut safe = Self::new();
        safe.push_raw(html);
        safe
    }

    /// Escape `text` and wrap the result.
    pub fn escaped(text: &str) -> Self {
        let mut safe = Self::new();
        safe.push_escaped(text);
        safe
    }

    pub(crate) fn push_static(&mut self, text: &Arc<str>) {
        if !text.is_empty() {
            self.chunks.push(Chunk::Static(Arc::clone(text)));
        }
    }

    pub fn push_raw(&mut self, html: impl Into<String>) {
        let html = html.into();
        if !html.is_empty() {
            self.chunks.push(Chunk::Owned(html));
        }
    }

    pub fn push_escaped(&mut self, text: &str) {
        if !text.is_empty() {
            self.chunks.push(Chunk::Owned(escape(text)));
        }
    }

    pub fn append(&mut self, other: Safe) {
        self.chunks.extend(other.chunks);
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(|c| c.as_str().is_empty())
    }

    /// Total length in bytes.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(|c| c.as_str().len()).sum()
    }
}

impl fmt::Display for Safe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in &self.chunks {
            f.write_str(chunk.as_str())?;
        }
        Ok(())
    }
}

/// HTML-escape `& < > " '`.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape_each_special_once() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_escape_plain_text_unchanged() {
        assert_eq!(escape("héllo wörld"), "héllo wörld");
    }

    #[test]
    fn test_chunks_flatten_in_order() {
        let mut safe = Safe::new();
        safe.push_static(&Arc::from("<p>"));
        safe.push_escaped("a<b");
        safe.push_raw("</p>");
        assert_eq!(safe.to_string(), "<p>a&lt;b</p>");
        assert_eq!(safe.len(), 13);
    }

    #[test]
    fn test_empty_chunks_are_skipped() {
        let mut safe = Safe::raw("");
        safe.push_escaped("");
        assert!(safe.is_empty());
        assert_eq!(safe, Safe::new());
    }

    #[test]
    fn test_append() {
        let mut a = Safe::raw("a");
        a.append(Safe::escaped("&"));
        assert_eq!(a.to_string(), "a&amp;");
    }
}
