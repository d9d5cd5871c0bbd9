//! Compile-time diagnostics.
//!
//! ```text
//! lib/page.ceex:3:5: unmatched closing tag. Expected `</div>` for `<div>` at line 2, got: `</span>`
//!   |
//! 1 | <main>
//! 2 |   <div>
//! 3 |     </span>
//!   |     ^
//! ```

use ceex_parser::ParseError;

use crate::CompileOptions;

/// Lines of context shown above the offending line.
const CONTEXT_LINES: usize = 2;

/// A positioned compile error, formatted with a source excerpt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{description}")]
pub struct SyntaxError {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub hint: Option<String>,
    description: String,
}

impl SyntaxError {
    pub fn new(err: ParseError, source: &str, options: &CompileOptions) -> Self {
        let ParseError {
            message,
            hint,
            position,
        } = err;

        let mut description = format!(
            "{}:{}:{}: {}",
            options.file, position.line, position.column, message
        );
        if let Some(hint) = &hint {
            description.push_str("\n\n");
            description.push_str(hint);
        }
        description.push_str(&snippet(source, options, position.line, position.column));

        Self {
            file: options.file.clone(),
            line: position.line,
            column: position.column,
            message,
            hint,
            description,
        }
    }

    /// The full diagnostic, as printed by `Display`.
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// The `|`-framed excerpt ending with a caret under `column`.
fn snippet(source: &str, options: &CompileOptions, line: usize, column: usize) -> String {
    let lines: Vec<&str> = source.split('\n').collect();
    let Some(index) = line.checked_sub(options.line) else {
        return String::new();
    };
    if index >= lines.len() {
        return String::new();
    }

    let width = line.to_string().len();
    let pad = " ".repeat(width);
    let indent = " ".repeat(options.indentation);

    let mut out = format!("\n {pad}|");
    for i in index.saturating_sub(CONTEXT_LINES)..=index {
        let text = lines[i].trim_end_matches('\r');
        out.push_str(&format!(
            "\n{:>width$} | {indent}{text}",
            i + options.line,
        ));
    }
    out.push_str(&format!(
        "\n {pad}| {}^",
        " ".repeat(column.saturating_sub(1))
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ceex_lexer::Position;
    use pretty_assertions::assert_eq;

    fn error_at(line: usize, column: usize) -> ParseError {
        ParseError::new("boom", Position::new(0, line, column))
    }

    #[test]
    fn test_single_line() {
        let options = CompileOptions::new("t.ceex");
        let err = SyntaxError::new(error_at(1, 6), "<div><a>", &options);
        assert_eq!(err.to_string(), "t.ceex:1:6: boom\n  |\n1 | <div><a>\n  |      ^");
    }

    #[test]
    fn test_context_lines_are_capped() {
        let source = "a\nb\nc\nd";
        let options = CompileOptions::new("t.ceex");
        let err = SyntaxError::new(error_at(4, 1), source, &options);
        assert_eq!(
            err.to_string(),
            "t.ceex:4:1: boom\n  |\n2 | b\n3 | c\n4 | d\n  | ^"
        );
    }

    #[test]
    fn test_offset_line_and_indentation() {
        let source = "<p>\n</a>";
        let options = CompileOptions::new("lib/x.ex").line(9).indentation(2);
        let err = SyntaxError::new(error_at(10, 3), source, &options);
        assert_eq!(
            err.to_string(),
            "lib/x.ex:10:3: boom\n   |\n 9 |   <p>\n10 |   </a>\n   |   ^"
        );
    }

    #[test]
    fn test_hint_goes_before_snippet() {
        let options = CompileOptions::default();
        let err = SyntaxError::new(error_at(1, 1).with_hint("explain"), "x", &options);
        assert_eq!(err.to_string(), "nofile:1:1: boom\n\nexplain\n  |\n1 | x\n  | ^");
        assert_eq!(err.hint.as_deref(), Some("explain"));
    }
}
