//! Code generator: template tree to [`Program`].
//!
//! A program is a flat list of [`Op`]s interpreted by `render`. Adjacent
//! static markup is coalesced into a single `Op::Static` chunk, shared by
//! every render through `Arc<str>`.
//!
//! Only the root fragment goes through whitespace trimming: a whitespace-only
//! text run at the very start or end of the template is dropped when it sits
//! next to a dynamic construct. Slot, component and do-block bodies are
//! emitted verbatim.

use std::sync::Arc;

use ceex_lexer::{Position, DEFAULT_SLOT};
use ceex_parser::ast::{
    Attribute, AttributeValue, Block, BlockKind, Component, Element, ExprKind, Expression,
    Fragment, Generator, Node, Pattern, SlotEntry, SpecialAttrs,
};

/// A compiled template body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub ops: Vec<Op>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Pre-rendered markup.
    Static(Arc<str>),
    /// `{expr}` / `<%= expr %>`, escaped at render time.
    Output(Expression),
    /// `<% expr %>`, evaluated for its errors only.
    Exec(Expression),
    /// `name={expr}` on a markup element.
    Attr { name: String, value: Expression },
    /// `{expr}` in attribute position on a markup element.
    Spread(Expression),
    If {
        condition: Expression,
        then: Program,
        otherwise: Program,
    },
    /// `filter` is the `:if` of a node that also has `:for`.
    For {
        generator: Generator,
        filter: Option<Expression>,
        body: Program,
    },
    Component(Box<ComponentCall>),
}

/// A remote or local component call.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentCall {
    /// Registry key: `button` or `Ui.Forms.input`.
    pub name: String,
    /// As written: `<.button>` or `<Ui.Forms.input>`.
    pub display: String,
    pub attrs: Vec<AttrOp>,
    /// Default slot body, `None` when the call has no non-blank content.
    pub inner_block: Option<Arc<Program>>,
    /// `:let` on the component itself, bound when `inner_block` renders.
    pub binding: Option<Pattern>,
    pub slots: Vec<SlotOp>,
    pub position: Position,
}

/// One `<:name>` entry of a component call.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotOp {
    pub name: String,
    pub attrs: Vec<AttrOp>,
    pub condition: Option<Expression>,
    pub generator: Option<Generator>,
    pub binding: Option<Pattern>,
    /// `None` for self-closing entries.
    pub body: Option<Arc<Program>>,
}

/// An attribute passed to a component or slot entry.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrOp {
    Static { name: String, value: String },
    Boolean { name: String },
    Expr { name: String, value: Expression },
    Spread(Expression),
}

/// Generate the program for a whole template.
pub fn generate(fragment: &Fragment) -> Program {
    let children = trim_boundaries(&fragment.children);
    let mut builder = Builder::default();
    builder.nodes(children);
    builder.finish()
}

/// Drop whitespace-only text at the edges of the root when it touches a dynamic node.
fn trim_boundaries(nodes: &[Node]) -> &[Node] {
    let mut start = 0;
    let mut end = nodes.len();

    if end - start >= 2 && nodes[start].is_blank_text() && is_dynamic(&nodes[start + 1]) {
        start += 1;
    }
    if end - start >= 2 && nodes[end - 1].is_blank_text() && is_dynamic(&nodes[end - 2]) {
        end -= 1;
    }

    &nodes[start..end]
}

/// Constructs whose neighbouring boundary whitespace is suppressed.
///
/// Slot invocations (`{render_slot(...)}`) and elements made only of literal
/// markup keep their surrounding whitespace.
fn is_dynamic(node: &Node) -> bool {
    match node {
        Node::Expr(e) => !is_slot_invocation(&e.expr),
        Node::Element(el) => has_dynamic_content(el),
        Node::Block(_) | Node::RemoteComponent(_) | Node::LocalComponent(_) => true,
        Node::Text(_) | Node::SlotEntry(_) => false,
    }
}

fn has_dynamic_content(el: &Element) -> bool {
    let dynamic_attr = el.attrs.iter().any(|attr| {
        !matches!(
            attr,
            Attribute::Named {
                value: AttributeValue::Static { .. } | AttributeValue::Boolean,
                ..
            }
        )
    });
    dynamic_attr
        || !el.special.is_empty()
        || el.children.iter().any(|child| match child {
            Node::Text(_) => false,
            Node::Element(inner) => has_dynamic_content(inner),
            _ => true,
        })
}

fn is_slot_invocation(expr: &Expression) -> bool {
    matches!(&expr.kind, ExprKind::Call { function, .. } if function == "render_slot")
}

#[derive(Default)]
struct Builder {
    ops: Vec<Op>,
    text: String,
}

impl Builder {
    fn finish(mut self) -> Program {
        self.flush();
        Program { ops: self.ops }
    }

    fn flush(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.ops.push(Op::Static(Arc::from(text)));
        }
    }

    fn push_static(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn push(&mut self, op: Op) {
        self.flush();
        self.ops.push(op);
    }

    fn extend(&mut self, program: Program) {
        for op in program.ops {
            match op {
                Op::Static(text) => self.push_static(&text),
                op => self.push(op),
            }
        }
    }

    fn nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Text(text) => self.push_static(&text.content),
            Node::Expr(e) if e.output => self.push(Op::Output(e.expr.clone())),
            Node::Expr(e) => self.push(Op::Exec(e.expr.clone())),
            Node::Element(el) => {
                let body = program_of(|b| b.element(el));
                self.wrap(&el.special, body);
            }
            Node::RemoteComponent(c) => {
                let call = component_call(c, format!("<{}>", c.name));
                self.wrap(&c.special, Program { ops: vec![call] });
            }
            Node::LocalComponent(c) => {
                let call = component_call(c, format!("<.{}>", c.name));
                self.wrap(&c.special, Program { ops: vec![call] });
            }
            Node::Block(block) => self.block(block),
            // The parser only accepts slot entries directly inside a component,
            // and `component_call` consumes them.
            Node::SlotEntry(_) => {}
        }
    }

    /// Apply `:for` (outer) and `:if` (per-iteration filter) around `body`.
    fn wrap(&mut self, special: &SpecialAttrs, body: Program) {
        match (&special.generator, &special.condition) {
            (Some(generator), filter) => self.push(Op::For {
                generator: generator.clone(),
                filter: filter.clone(),
                body,
            }),
            (None, Some(condition)) => self.push(Op::If {
                condition: condition.clone(),
                then: body,
                otherwise: Program::default(),
            }),
            (None, None) => self.extend(body),
        }
    }

    fn element(&mut self, el: &Element) {
        self.push_static("<");
        self.push_static(&el.tag);

        for attr in &el.attrs {
            match attr {
                Attribute::Named {
                    name,
                    value: AttributeValue::Static { value, quote },
                    ..
                } => {
                    self.push_static(&format!(" {name}={quote}{value}{quote}"));
                }
                Attribute::Named {
                    name,
                    value: AttributeValue::Boolean,
                    ..
                } => {
                    self.push_static(" ");
                    self.push_static(name);
                }
                Attribute::Named {
                    name,
                    value: AttributeValue::Expr(expr),
                    ..
                } => self.push(Op::Attr {
                    name: name.clone(),
                    value: expr.clone(),
                }),
                Attribute::Root { expr, .. } => self.push(Op::Spread(expr.clone())),
            }
        }

        self.push_static(">");

        if el.void {
            return;
        }

        self.nodes(&el.children);
        self.push_static("</");
        self.push_static(&el.tag);
        self.push_static(">");
    }

    fn block(&mut self, block: &Block) {
        match &block.kind {
            BlockKind::If {
                condition,
                then,
                otherwise,
            } => self.push(Op::If {
                condition: condition.clone(),
                then: program_of(|b| b.nodes(then)),
                otherwise: program_of(|b| b.nodes(otherwise)),
            }),
            BlockKind::For { generator, body } => self.push(Op::For {
                generator: generator.clone(),
                filter: None,
                body: program_of(|b| b.nodes(body)),
            }),
        }
    }
}

fn program_of(f: impl FnOnce(&mut Builder)) -> Program {
    let mut builder = Builder::default();
    f(&mut builder);
    builder.finish()
}

fn component_call(component: &Component, display: String) -> Op {
    let mut inner = Vec::new();
    let mut slots = Vec::new();

    for child in &component.children {
        match child {
            Node::SlotEntry(entry) => slots.push(slot_op(entry)),
            other => inner.push(other.clone()),
        }
    }

    let has_content = inner.iter().any(|n| !n.is_blank_text());
    let inner_block = has_content.then(|| Arc::new(program_of(|b| b.nodes(&inner))));

    Op::Component(Box::new(ComponentCall {
        name: component.name.clone(),
        display,
        attrs: attr_ops(&component.attrs),
        inner_block,
        binding: component.special.binding.clone(),
        slots,
        position: component.position,
    }))
}

fn slot_op(entry: &SlotEntry) -> SlotOp {
    SlotOp {
        name: entry.name.clone(),
        attrs: attr_ops(&entry.attrs),
        condition: entry.special.condition.clone(),
        generator: entry.special.generator.clone(),
        binding: entry.special.binding.clone(),
        body: (!entry.self_closing).then(|| Arc::new(program_of(|b| b.nodes(&entry.children)))),
    }
}

fn attr_ops(attrs: &[Attribute]) -> Vec<AttrOp> {
    attrs
        .iter()
        .map(|attr| match attr {
            Attribute::Named { name, value, .. } => match value {
                AttributeValue::Static { value, .. } => AttrOp::Static {
                    name: name.clone(),
                    value: value.clone(),
                },
                AttributeValue::Boolean => AttrOp::Boolean { name: name.clone() },
                AttributeValue::Expr(expr) => AttrOp::Expr {
                    name: name.clone(),
                    value: expr.clone(),
                },
            },
            Attribute::Root { expr, .. } => AttrOp::Spread(expr.clone()),
        })
        .collect()
}

/// Name of the implicit default slot.
pub const INNER_BLOCK: &str = DEFAULT_SLOT;
