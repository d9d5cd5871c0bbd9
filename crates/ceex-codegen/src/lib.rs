//! CEEx Code Generator
//!
//! Compiles template source into a [`Template`]: a program of static chunks
//! and dynamic operations that renders an assigns map to escaped output.
//!
//! ```text
//! source → Parser → Fragment → generate() → Program
//! Template::render(assigns) → Safe
//! ```
//!
//! Compilation is pure. A compiled template holds no mutable state and can be
//! rendered from many threads at once.

pub mod component;
pub mod diagnostic;
pub mod error;
pub mod eval;
pub mod generate;
pub mod render;
pub mod safe;
pub mod value;

use std::sync::Arc;

use ceex_parser::Parser;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

pub use component::{Components, FnComponent, Renderable};
pub use diagnostic::SyntaxError;
pub use error::RenderError;
pub use generate::{Op, Program};
pub use safe::{escape, Safe};
pub use value::{Assigns, Slot, SlotEntry, SlotRender, Slots, Value};

use eval::Env;

/// Where a template comes from and what it can call.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// File name used in diagnostics.
    pub file: String,
    /// Line of the first source line in `file`.
    pub line: usize,
    /// Columns the source is indented by in `file`.
    pub indentation: usize,
    /// Components reachable as `<.name>` and `<Mod.name>`.
    pub components: Components,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            file: "nofile".to_string(),
            line: 1,
            indentation: 0,
            components: Components::new(),
        }
    }
}

impl CompileOptions {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    pub fn line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    pub fn indentation(mut self, indentation: usize) -> Self {
        self.indentation = indentation;
        self
    }

    pub fn components(mut self, components: Components) -> Self {
        self.components = components;
        self
    }

    pub fn component(mut self, name: impl Into<String>, component: impl Renderable + 'static) -> Self {
        self.components.register(name, component);
        self
    }
}

/// Compile template source.
///
/// Stops at the first syntax error. Unknown components are only reported
/// when rendering reaches them.
#[tracing::instrument(level = "debug", skip_all, fields(file = %options.file, line = options.line))]
pub fn compile(source: &str, options: &CompileOptions) -> Result<Template, SyntaxError> {
    let fragment = Parser::parse_at(source, options.line, options.indentation).map_err(|err| {
        debug!(
            line = err.position.line,
            column = err.position.column,
            "template failed to compile"
        );
        SyntaxError::new(err, source, options)
    })?;

    let program = generate::generate(&fragment);
    let fingerprint = fingerprint(source, options);

    debug!(
        nodes = fragment.children.len(),
        ops = program.ops.len(),
        fingerprint = %format_args!("{fingerprint:016x}"),
        "compiled template"
    );

    Ok(Template {
        program: Arc::new(program),
        components: Arc::new(options.components.clone()),
        fingerprint,
    })
}

/// XXH3-64 of the source text and the options that affect compilation.
pub fn fingerprint(source: &str, options: &CompileOptions) -> u64 {
    let mut buf = Vec::with_capacity(source.len() + options.file.len() + 18);
    buf.extend_from_slice(source.as_bytes());
    buf.push(0);
    buf.extend_from_slice(options.file.as_bytes());
    buf.push(0);
    buf.extend_from_slice(&(options.line as u64).to_le_bytes());
    buf.extend_from_slice(&(options.indentation as u64).to_le_bytes());
    xxh3_64(&buf)
}

/// A compiled template. Cheap to clone, safe to share between threads.
#[derive(Debug, Clone)]
pub struct Template {
    program: Arc<Program>,
    components: Arc<Components>,
    fingerprint: u64,
}

impl Template {
    pub fn render(&self, assigns: Assigns) -> Result<Safe, RenderError> {
        let env = Env::new(Arc::new(assigns));
        render::render(&self.program, &env, &self.components)
    }

    /// Render and flatten to a string.
    pub fn render_to_string(&self, assigns: Assigns) -> Result<String, RenderError> {
        Ok(self.render(assigns)?.to_string())
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn program(&self) -> &Program {
        &self.program
    }
}

/// A template used as a component sees its slots as assigns (`@inner_block`).
impl Renderable for Template {
    fn render(&self, attrs: Assigns, slots: Slots) -> Result<Safe, RenderError> {
        let mut assigns = attrs;
        for (name, slot) in slots {
            assigns.insert(name, Value::Slot(slot));
        }
        Template::render(self, assigns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(source: &str, assigns: &[(&str, Value)]) -> String {
        let template = compile(source, &CompileOptions::default()).unwrap();
        let assigns = assigns
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        template.render_to_string(assigns).unwrap()
    }

    // =========================================================================
    // compile
    // =========================================================================

    #[test]
    fn test_static_round_trip() {
        let source = "<!DOCTYPE html>\n<html lang='en'>\n  <!-- c -->\n  <body class=\"a\">x &amp; y</body>\n</html>\n";
        assert_eq!(render(source, &[]), source);
    }

    #[test]
    fn test_if_attribute() {
        let source = r#"<div :if={@flag} id="test">yes</div>"#;
        assert_eq!(render(source, &[("flag", Value::Bool(true))]), r#"<div id="test">yes</div>"#);
        assert_eq!(render(source, &[("flag", Value::Bool(false))]), "");
    }

    #[test]
    fn test_compile_error_is_formatted() {
        let err = compile("<div>\n</span>", &CompileOptions::new("page.ceex")).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.to_string().starts_with("page.ceex:2:1: unmatched closing tag."));
    }

    // =========================================================================
    // Fingerprint
    // =========================================================================

    #[test]
    fn test_fingerprint_is_deterministic() {
        let options = CompileOptions::new("a.ceex");
        assert_eq!(fingerprint("<p/>", &options), fingerprint("<p/>", &options));
        assert_ne!(fingerprint("<p/>", &options), fingerprint("<p />", &options));
        assert_ne!(
            fingerprint("<p/>", &options),
            fingerprint("<p/>", &options.clone().line(2))
        );
    }

    #[test]
    fn test_template_carries_fingerprint() {
        let options = CompileOptions::default();
        let template = compile("x", &options).unwrap();
        assert_eq!(template.fingerprint(), fingerprint("x", &options));
    }

    // =========================================================================
    // Templates as components
    // =========================================================================

    #[test]
    fn test_template_as_component() {
        let card = compile(
            "<section><h1>{@title}</h1>{render_slot(@inner_block)}</section>",
            &CompileOptions::default(),
        )
        .unwrap();
        let options = CompileOptions::default().component("card", card);
        let page = compile("<.card title=\"Hi\">body</.card>", &options).unwrap();
        assert_eq!(
            page.render_to_string(Assigns::new()).unwrap(),
            "<section><h1>Hi</h1>body</section>"
        );
    }

    #[test]
    fn test_template_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Template>();
    }
}
