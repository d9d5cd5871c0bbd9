//! Template parser for CEEx.
//!
//! Turns the flat token stream from `ceex-lexer` into a `Fragment` tree.
//! Open tags and do-blocks are tracked on an explicit stack, so mismatches
//! are reported against the construct that is still waiting to be closed.
//!
//! Every embedded expression is handed to `expr_parser`, and tag attributes
//! go through `special::resolve` before the node is built.

use ceex_lexer::{
    is_raw_text_element, is_void_element, HostMarker, Position, Scanner, TagKind, Token,
    TokenKind,
};

use crate::ast::{
    Attribute, Block, BlockKind, Component, Element, ExprKind, ExprNode, Expression,
    Fragment, Generator, Node, SlotEntry, SpecialAttrs, Text, UnaryOp,
};
use crate::expr_parser::ExprParser;
use crate::special::{self, RawAttr};
use crate::ParseError;

/// CEEx template parser.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    stack: Vec<Frame>,
}

/// Something waiting for its closing token, plus the children collected so far.
struct Frame {
    kind: FrameKind,
    children: Vec<Node>,
}

enum FrameKind {
    Root,
    Tag(OpenTag),
    Block(OpenBlock),
}

struct OpenTag {
    name: String,
    kind: TagKind,
    attrs: Vec<Attribute>,
    special: SpecialAttrs,
    position: Position,
}

struct OpenBlock {
    head: BlockHead,
    code: String,
    position: Position,
    /// Children collected before `<% else %>`, once it has been seen.
    then: Option<Vec<Node>>,
}

enum BlockHead {
    If(Expression),
    For(Generator),
}

impl Parser {
    /// Create a new parser for the given tokens.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            stack: vec![Frame {
                kind: FrameKind::Root,
                children: Vec::new(),
            }],
        }
    }

    /// Parse template source starting at line 1 with no indentation.
    pub fn parse(source: &str) -> Result<Fragment, ParseError> {
        Self::parse_at(source, 1, 0)
    }

    /// Parse template source embedded at `line` with `indentation` columns
    /// before its first character.
    pub fn parse_at(source: &str, line: usize, indentation: usize) -> Result<Fragment, ParseError> {
        let tokens = Scanner::tokenize_at(source, line, indentation)?;
        Parser::new(tokens).parse_fragment()
    }

    /// Consume the whole token stream.
    pub fn parse_fragment(mut self) -> Result<Fragment, ParseError> {
        while self.pos < self.tokens.len() {
            let token = self.tokens[self.pos].clone();
            self.pos += 1;

            match token.kind {
                TokenKind::Text(text) | TokenKind::Comment(text) | TokenKind::Doctype(text) => {
                    self.push_text(text, token.position)
                }
                TokenKind::TagOpenStart { name, kind } => {
                    self.parse_open_tag(name, kind, token.position)?
                }
                TokenKind::TagClose { name, kind } => {
                    self.close_tag(&name, kind, token.position)?
                }
                TokenKind::HostExpr { marker, code } => {
                    self.host_expr(marker, &code, token.position)?
                }
                TokenKind::Eof => break,
                TokenKind::AttrName(_)
                | TokenKind::AttrValue(_)
                | TokenKind::RootAttr(_)
                | TokenKind::TagOpenEnd { .. } => {
                    return Err(ParseError::new(
                        "unexpected attribute outside of a tag",
                        token.position,
                    ));
                }
            }
        }

        self.finish()
    }

    // =========================================================================
    // Tags
    // =========================================================================

    fn parse_open_tag(
        &mut self,
        name: String,
        kind: TagKind,
        position: Position,
    ) -> Result<(), ParseError> {
        if kind == TagKind::Slot {
            self.check_slot_parent(&name, position)?;
        }

        let mut raw = Vec::new();
        let self_closing = loop {
            let Some(token) = self.tokens.get(self.pos).cloned() else {
                return Err(ParseError::new(
                    format!("missing closing `>` for tag {}", tag_display(&name, kind)),
                    position,
                ));
            };
            self.pos += 1;

            match token.kind {
                TokenKind::AttrName(attr) => {
                    let value = match self.tokens.get(self.pos).map(|t| &t.kind) {
                        Some(TokenKind::AttrValue(value)) => value.clone(),
                        _ => {
                            return Err(ParseError::new(
                                format!("missing value for attribute `{attr}`"),
                                token.position,
                            ))
                        }
                    };
                    self.pos += 1;
                    raw.push(RawAttr::Named {
                        name: attr,
                        value,
                        position: token.position,
                    });
                }
                TokenKind::RootAttr(code) => raw.push(RawAttr::Root {
                    code,
                    position: token.position,
                }),
                TokenKind::TagOpenEnd { self_closing } => break self_closing,
                _ => {
                    return Err(ParseError::new(
                        format!("missing closing `>` for tag {}", tag_display(&name, kind)),
                        position,
                    ))
                }
            }
        };

        let void = kind == TagKind::Element && is_void_element(&name);
        let (attrs, special) = special::resolve(raw, kind, self_closing && !void)?;

        let tag = OpenTag {
            name,
            kind,
            attrs,
            special,
            position,
        };

        if void || self_closing {
            let node = build_node(tag, Vec::new(), true);
            self.push_node(node);
        } else {
            self.stack.push(Frame {
                kind: FrameKind::Tag(tag),
                children: Vec::new(),
            });
        }
        Ok(())
    }

    /// Slot entries must be direct children of a component.
    fn check_slot_parent(&self, name: &str, position: Position) -> Result<(), ParseError> {
        let parent_is_component = matches!(
            self.stack.last().map(|f| &f.kind),
            Some(FrameKind::Tag(tag)) if tag.kind.is_component()
        );
        if parent_is_component {
            Ok(())
        } else {
            Err(ParseError::new(
                format!(
                    "invalid slot entry <:{name}>. A slot entry must be a direct child of a component"
                ),
                position,
            ))
        }
    }

    fn close_tag(&mut self, name: &str, kind: TagKind, position: Position) -> Result<(), ParseError> {
        let got = close_display(name, kind);

        let matches = match self.stack.last().map(|f| &f.kind) {
            Some(FrameKind::Tag(open)) if open.name == name && open.kind == kind => true,
            Some(FrameKind::Tag(open)) => {
                return Err(ParseError::new(
                    format!(
                        "unmatched closing tag. Expected `{}` for `{}` at line {}, got: `{got}`",
                        close_display(&open.name, open.kind),
                        tag_display(&open.name, open.kind),
                        open.position.line
                    ),
                    position,
                ));
            }
            Some(FrameKind::Block(block)) => {
                return Err(ParseError::new(
                    format!(
                        "unmatched closing tag. Expected `<% end %>` for `<%= {} %>` at line {}, got: `{got}`",
                        block.code,
                        block.position.line
                    ),
                    position,
                ));
            }
            _ => false,
        };

        if !matches {
            return Err(ParseError::new(
                format!("missing opening tag for `{got}`"),
                position,
            ));
        }

        if let Some(Frame {
            kind: FrameKind::Tag(tag),
            children,
        }) = self.stack.pop()
        {
            let node = build_node(tag, children, false);
            self.push_node(node);
        }
        Ok(())
    }

    // =========================================================================
    // Host expressions and do-blocks
    // =========================================================================

    fn host_expr(
        &mut self,
        marker: HostMarker,
        code: &str,
        position: Position,
    ) -> Result<(), ParseError> {
        let trimmed = code.trim();

        if marker != HostMarker::Curly {
            if trimmed == "end" {
                return self.close_block(position);
            }
            if trimmed == "else" {
                return self.else_block(position);
            }
            if let Some(head) = do_block_head(trimmed) {
                if marker == HostMarker::Exec {
                    return Err(ParseError::new(
                        format!("do-blocks must use `<%=` to output their result, got: `<% {trimmed} %>`"),
                        position,
                    ));
                }
                return self.open_block(head, trimmed, position);
            }
        }

        let expr = ExprParser::parse(code, position)?;
        self.push_node(Node::Expr(ExprNode {
            expr,
            output: marker != HostMarker::Exec,
            position,
        }));
        Ok(())
    }

    fn open_block(&mut self, head: &str, code: &str, position: Position) -> Result<(), ParseError> {
        let head = if let Some(condition) = head.strip_prefix("if ") {
            BlockHead::If(ExprParser::parse(condition, position)?)
        } else if let Some(condition) = head.strip_prefix("unless ") {
            let condition = ExprParser::parse(condition, position)?;
            let span = condition.span;
            BlockHead::If(Expression {
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(condition),
                },
                span,
            })
        } else if let Some(generator) = head.strip_prefix("for ") {
            BlockHead::For(ExprParser::parse_generator(generator, position)?)
        } else {
            return Err(ParseError::new(
                format!(
                    "unsupported do-block `<%= {code} %>`. Only `if`, `unless` and `for` blocks are supported"
                ),
                position,
            ));
        };

        self.stack.push(Frame {
            kind: FrameKind::Block(OpenBlock {
                head,
                code: code.to_string(),
                position,
                then: None,
            }),
            children: Vec::new(),
        });
        Ok(())
    }

    fn else_block(&mut self, position: Position) -> Result<(), ParseError> {
        let Some(frame) = self.stack.last_mut() else {
            return Err(ParseError::new("unexpected `<% else %>`", position));
        };

        match &mut frame.kind {
            FrameKind::Block(block) => match block.head {
                BlockHead::For(_) => Err(ParseError::new(
                    format!(
                        "`<% else %>` is not supported in `<%= {} %>`",
                        block.code
                    ),
                    position,
                )),
                BlockHead::If(_) if block.then.is_some() => Err(ParseError::new(
                    format!(
                        "duplicate `<% else %>` in `<%= {} %>` at line {}",
                        block.code, block.position.line
                    ),
                    position,
                )),
                BlockHead::If(_) => {
                    block.then = Some(std::mem::take(&mut frame.children));
                    Ok(())
                }
            },
            FrameKind::Tag(tag) => Err(unclosed_in_block(tag)),
            FrameKind::Root => Err(ParseError::new(
                "unexpected `<% else %>` without a matching do-block",
                position,
            )),
        }
    }

    fn close_block(&mut self, position: Position) -> Result<(), ParseError> {
        match self.stack.last().map(|f| &f.kind) {
            Some(FrameKind::Block(_)) => {}
            Some(FrameKind::Tag(tag)) => return Err(unclosed_in_block(tag)),
            _ => {
                return Err(ParseError::new(
                    "unexpected `<% end %>` without a matching do-block",
                    position,
                ))
            }
        }

        if let Some(Frame {
            kind: FrameKind::Block(block),
            children,
        }) = self.stack.pop()
        {
            let kind = match block.head {
                BlockHead::If(condition) => match block.then {
                    Some(then) => BlockKind::If {
                        condition,
                        then,
                        otherwise: children,
                    },
                    None => BlockKind::If {
                        condition,
                        then: children,
                        otherwise: Vec::new(),
                    },
                },
                BlockHead::For(generator) => BlockKind::For {
                    generator,
                    body: children,
                },
            };
            self.push_node(Node::Block(Block {
                kind,
                position: block.position,
            }));
        }
        Ok(())
    }

    // =========================================================================
    // Tree building
    // =========================================================================

    fn push_text(&mut self, text: String, position: Position) {
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        if let Some(Node::Text(last)) = frame.children.last_mut() {
            last.content.push_str(&text);
        } else {
            frame.children.push(Node::Text(Text {
                content: text,
                position,
            }));
        }
    }

    fn push_node(&mut self, node: Node) {
        if let Some(frame) = self.stack.last_mut() {
            frame.children.push(node);
        }
    }

    fn finish(mut self) -> Result<Fragment, ParseError> {
        if let Some(frame) = self.stack.last() {
            match &frame.kind {
                FrameKind::Tag(tag) => {
                    return Err(ParseError::new(
                        format!(
                            "end of template reached without closing tag for `{}`",
                            tag_display(&tag.name, tag.kind)
                        ),
                        tag.position,
                    ))
                }
                FrameKind::Block(block) => {
                    return Err(ParseError::new(
                        format!(
                            "end of template reached without `<% end %>` for `<%= {} %>`",
                            block.code
                        ),
                        block.position,
                    ))
                }
                FrameKind::Root => {}
            }
        }

        let children = self.stack.pop().map(|f| f.children).unwrap_or_default();
        Ok(Fragment { children })
    }
}

fn build_node(tag: OpenTag, children: Vec<Node>, self_closing: bool) -> Node {
    match tag.kind {
        TagKind::Element => Node::Element(Element {
            void: is_void_element(&tag.name),
            raw_text: is_raw_text_element(&tag.name),
            tag: tag.name,
            attrs: tag.attrs,
            special: tag.special,
            children,
            position: tag.position,
        }),
        TagKind::RemoteComponent | TagKind::LocalComponent => {
            let component = Component {
                name: tag.name,
                attrs: tag.attrs,
                special: tag.special,
                children,
                self_closing,
                position: tag.position,
            };
            if tag.kind == TagKind::RemoteComponent {
                Node::RemoteComponent(component)
            } else {
                Node::LocalComponent(component)
            }
        }
        TagKind::Slot => Node::SlotEntry(SlotEntry {
            name: tag.name,
            attrs: tag.attrs,
            special: tag.special,
            children,
            self_closing,
            position: tag.position,
        }),
    }
}

fn unclosed_in_block(tag: &OpenTag) -> ParseError {
    ParseError::new(
        format!(
            "end of do-block reached without closing tag for `{}`",
            tag_display(&tag.name, tag.kind)
        ),
        tag.position,
    )
}

/// `if x do` -> `if x`
fn do_block_head(code: &str) -> Option<&str> {
    let head = code.strip_suffix("do")?;
    if head.ends_with(|c: char| c.is_whitespace() || c == ')') {
        Some(head.trim_end())
    } else {
        None
    }
}

fn tag_display(name: &str, kind: TagKind) -> String {
    match kind {
        TagKind::Element | TagKind::RemoteComponent => format!("<{name}>"),
        TagKind::LocalComponent => format!("<.{name}>"),
        TagKind::Slot => format!("<:{name}>"),
    }
}

fn close_display(name: &str, kind: TagKind) -> String {
    match kind {
        TagKind::Element | TagKind::RemoteComponent => format!("</{name}>"),
        TagKind::LocalComponent => format!("</.{name}>"),
        TagKind::Slot => format!("</:{name}>"),
    }
}
