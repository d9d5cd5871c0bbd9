/// A position in template source, tracking the byte offset plus the line and
/// column reported in diagnostics.
///
/// Lines and columns are absolute: they already include the caller's starting
/// line and indentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(0, 1, 1)
    }
}

/// The four kinds of tags a template can open or close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// `<div>`
    Element,
    /// `<Ui.Forms.input>`
    RemoteComponent,
    /// `<.button>`
    LocalComponent,
    /// `<:header>`
    Slot,
}

impl TagKind {
    pub fn is_component(self) -> bool {
        matches!(self, TagKind::RemoteComponent | TagKind::LocalComponent)
    }
}

/// Value of a named attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// `name="value"` or `name='value'`, kept verbatim with its delimiter.
    Static { value: String, quote: char },
    /// `name={expr}`
    Expr(String),
    /// `name` without a value.
    Boolean,
}

/// Which host-expression form produced a [`TokenKind::HostExpr`] token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMarker {
    /// `{expr}` in a tag body.
    Curly,
    /// `<%= expr %>`
    Output,
    /// `<% expr %>`
    Exec,
}

/// Token classification for template source.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Text(String),
    TagOpenStart { name: String, kind: TagKind },
    AttrName(String),
    AttrValue(AttrValue),
    /// `{expr}` in attribute position, without a name.
    RootAttr(String),
    TagOpenEnd { self_closing: bool },
    TagClose { name: String, kind: TagKind },
    Comment(String),
    Doctype(String),
    /// Embedded host-language code, opaque to the tokenizer.
    HostExpr { marker: HostMarker, code: String },
    Eof,
}

/// A token produced by the template tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self { kind, position }
    }
}

/// HTML void elements: never closed, never given children.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Elements whose body is raw text: curly interpolation is inert inside them.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Attribute that disables curly interpolation in an element's body.
pub const NO_CURLY_ATTRIBUTE: &str = "ceex-no-curly-interpolation";

/// Name of the implicit default slot.
pub const DEFAULT_SLOT: &str = "inner_block";

/// Check if a tag name is an HTML void element.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}
