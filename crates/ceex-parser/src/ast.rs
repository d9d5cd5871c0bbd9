//! Abstract Syntax Tree for CEEx templates.
//!
//! Contains both the template tree (text, elements, components, slot
//! entries, do-blocks) and the host-expression tree (literals, assigns,
//! operators, calls, patterns and generators).

use ceex_lexer::Position;

// ---------------------------------------------------------------------------
// Template tree
// ---------------------------------------------------------------------------

/// The implicit root fragment of a template.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub children: Vec<Node>,
}

/// A node in the template tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal markup: text, comments and doctypes.
    Text(Text),

    /// `{expr}`, `<%= expr %>` or `<% expr %>` in a tag body.
    Expr(ExprNode),

    /// `<div>`
    Element(Element),

    /// `<Ui.Forms.input>`
    RemoteComponent(Component),

    /// `<.button>`
    LocalComponent(Component),

    /// `<:header>`, only legal as a direct child of a component.
    SlotEntry(SlotEntry),

    /// `<%= if ... do %>` / `<%= for ... do %>` ... `<% end %>`
    Block(Block),
}

impl Node {
    pub fn position(&self) -> Position {
        match self {
            Node::Text(t) => t.position,
            Node::Expr(e) => e.position,
            Node::Element(el) => el.position,
            Node::RemoteComponent(c) | Node::LocalComponent(c) => c.position,
            Node::SlotEntry(s) => s.position,
            Node::Block(b) => b.position,
        }
    }

    /// True for text nodes made only of whitespace.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(t) if t.content.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub content: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprNode {
    pub expr: Expression,
    /// False for `<% expr %>`, which is evaluated and discarded.
    pub output: bool,
    pub position: Position,
}

/// A markup element.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<Attribute>,
    pub special: SpecialAttrs,
    pub children: Vec<Node>,
    pub void: bool,
    pub raw_text: bool,
    pub position: Position,
}

/// A remote or local component call.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// `button` for `<.button>`, `Ui.Forms.input` for `<Ui.Forms.input>`.
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub special: SpecialAttrs,
    pub children: Vec<Node>,
    pub self_closing: bool,
    pub position: Position,
}

/// A named slot entry inside a component call.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotEntry {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub special: SpecialAttrs,
    pub children: Vec<Node>,
    pub self_closing: bool,
    pub position: Position,
}

/// An attribute on a tag, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Named {
        name: String,
        value: AttributeValue,
        position: Position,
    },
    /// `{expr}` without a name, expanded to name/value pairs at render time.
    Root { expr: Expression, position: Position },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Quoted value, verbatim, with its delimiter.
    Static { value: String, quote: char },
    Expr(Expression),
    Boolean,
}

/// The `:if`, `:for` and `:let` attributes of a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecialAttrs {
    /// `:if={expr}`
    pub condition: Option<Expression>,
    /// `:for={pattern <- enumerable}`
    pub generator: Option<Generator>,
    /// `:let={pattern}`
    pub binding: Option<Pattern>,
}

impl SpecialAttrs {
    pub fn is_empty(&self) -> bool {
        self.condition.is_none() && self.generator.is_none() && self.binding.is_none()
    }
}

/// A host-language do-block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// `if` and `unless` (with a negated condition).
    If {
        condition: Expression,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    For {
        generator: Generator,
        body: Vec<Node>,
    },
}

// ---------------------------------------------------------------------------
// Host-expression tree
// ---------------------------------------------------------------------------

/// A position in expression text (relative to the expression string, not the template).
/// Named `ExprSpan` to distinguish from `ceex_lexer::Position` which tracks template positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprSpan {
    pub start: usize,
    pub end: usize,
}

impl ExprSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A complete expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub span: ExprSpan,
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Nil,

    Boolean(bool),

    /// `42`, `1_000`
    Integer(i64),

    /// `3.14`
    Float(f64),

    /// `"hello"` without interpolation.
    String(String),

    /// `"hello #{@name}"`
    Interpolated(Vec<StringPart>),

    /// `:ok`, `:"with space"`
    Atom(String),

    /// `@name`
    Assign(String),

    /// `item`
    Variable(String),

    /// `[1, 2]`, `[id: 1]` (keyword entries become `{atom, value}` tuples)
    List(Vec<Expression>),

    /// `{a, b}`
    Tuple(Vec<Expression>),

    /// `%{a: 1, "b" => 2}`
    Map(Vec<(Expression, Expression)>),

    /// `!active`, `not active`, `-count`
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },

    /// `a + b`, `x in list`
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },

    /// `user.name`
    Field {
        object: Box<Expression>,
        field: String,
    },

    /// `map[:key]`
    Index {
        object: Box<Expression>,
        key: Box<Expression>,
    },

    /// `rem(i, 2)`, `String.upcase(name)`
    Call {
        function: String,
        arguments: Vec<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Literal(String),
    Code(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`, truthiness based
    Not,
    /// `not`, boolean only
    StrictNot,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    StrictEq,
    StrictNeq,
    Lt,
    Gt,
    Lte,
    Gte,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `and`
    StrictAnd,
    /// `or`
    StrictOr,
    /// `<>`
    Concat,
    /// `++`
    ListConcat,
    /// `..`
    Range,
    In,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNeq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Lte => "<=",
            BinaryOp::Gte => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::StrictAnd => "and",
            BinaryOp::StrictOr => "or",
            BinaryOp::Concat => "<>",
            BinaryOp::ListConcat => "++",
            BinaryOp::Range => "..",
            BinaryOp::In => "in",
        }
    }
}

/// A destructuring pattern, as used by `:let` and generators.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    /// The pattern as written, for error messages.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    /// `_` or `_ignored`
    Wildcard,
    Variable(String),
    /// A literal expression: nil, booleans, numbers, strings and atoms.
    Literal(Expression),
    Tuple(Vec<PatternKind>),
    List {
        items: Vec<PatternKind>,
        tail: Option<Box<PatternKind>>,
    },
    /// `%{key: pattern}`; keys are atom or string names.
    Map(Vec<(String, PatternKind)>),
}

/// `pattern <- enumerable`
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    pub pattern: Pattern,
    pub source: Expression,
}
