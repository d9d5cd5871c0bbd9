//! Expression parser for CEEx.
//!
//! Parses expression token streams (from `expr_lexer`) into `Expression`
//! nodes, plus the `Pattern` and `Generator` forms used by `:let` and `:for`.
//! Operator precedence is handled with Pratt parsing.
//!
//! Expression text carries no line information of its own, so every error
//! is reported at the template position of the construct that embeds it.

use std::fmt;

use ceex_lexer::Position;

use crate::ast::{
    BinaryOp, ExprKind, ExprSpan, Expression, Generator, Pattern, PatternKind, StringPart,
    UnaryOp,
};
use crate::expr_lexer::{ExprLexer, StringSegment, Token, TokenKind, TokenValue};
use crate::ParseError;

/// Binding power of prefix operators (`!`, `not`, `-`).
const PREFIX_BP: u8 = 90;

/// CEEx expression parser.
pub struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
    chars: Vec<char>,
    origin: Position,
}

impl ExprParser {
    /// Tokenize `source` and prepare a parser reporting errors at `origin`.
    pub fn new(source: &str, origin: Position) -> Result<Self, ParseError> {
        let tokens = ExprLexer::tokenize(source).map_err(|e| {
            ParseError::new(
                format!("syntax error in expression `{}`: {}", source.trim(), e.message),
                origin,
            )
        })?;

        Ok(Self {
            tokens,
            pos: 0,
            chars: source.chars().collect(),
            origin,
        })
    }

    /// Parse a complete expression from a source string.
    pub fn parse(source: &str, origin: Position) -> Result<Expression, ParseError> {
        let mut parser = Self::new(source, origin)?;
        if parser.at(TokenKind::Eof) {
            return Err(ParseError::new("missing expression", origin));
        }
        let expr = parser.expression(0)?;
        parser.expect_end()?;
        Ok(expr)
    }

    /// Parse a destructuring pattern such as `{name, value}` or `%{id: id}`.
    pub fn parse_pattern(source: &str, origin: Position) -> Result<Pattern, ParseError> {
        let mut parser = Self::new(source, origin)?;
        let kind = parser.pattern()?;
        parser.expect_end()?;
        Ok(Pattern {
            kind,
            source: source.trim().to_string(),
        })
    }

    /// Parse `pattern <- enumerable`.
    pub fn parse_generator(source: &str, origin: Position) -> Result<Generator, ParseError> {
        let mut parser = Self::new(source, origin)?;
        let kind = parser.pattern()?;

        let arrow = parser.current().clone();
        if arrow.kind != TokenKind::LeftArrow {
            return Err(parser.unexpected(&arrow));
        }
        let pattern_source: String = parser.chars[..arrow.span.start].iter().collect();
        parser.advance();

        let source = parser.expression(0)?;
        parser.expect_end()?;

        Ok(Generator {
            pattern: Pattern {
                kind,
                source: pattern_source.trim().to_string(),
            },
            source,
        })
    }

    // --- Expressions ---

    fn expression(&mut self, min_bp: u8) -> Result<Expression, ParseError> {
        let mut left = self.prefix()?;

        loop {
            let Some((op, left_bp, right_bp)) = infix_binding_power(self.current().kind) else {
                break;
            };
            if left_bp < min_bp {
                break;
            }
            self.advance();

            let right = self.expression(right_bp)?;
            let span = ExprSpan::new(left.span.start, right.span.end);
            left = Expression {
                kind: ExprKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            };
        }

        Ok(left)
    }

    fn prefix(&mut self) -> Result<Expression, ParseError> {
        let token = self.current().clone();
        let op = match token.kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Not => UnaryOp::StrictNot,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        self.advance();

        let operand = self.expression(PREFIX_BP)?;
        let span = ExprSpan::new(token.span.start, operand.span.end);

        // Fold negative number literals so patterns and ranges see plain values.
        let kind = match (op, &operand.kind) {
            (UnaryOp::Neg, ExprKind::Integer(n)) => ExprKind::Integer(-n),
            (UnaryOp::Neg, ExprKind::Float(n)) => ExprKind::Float(-n),
            _ => ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        };
        Ok(Expression { kind, span })
    }

    /// A primary expression followed by any `.field` and `[key]` accesses.
    fn postfix(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.primary()?;

        loop {
            match self.current().kind {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.current().clone();
                    if name.kind != TokenKind::Identifier {
                        return Err(self.unexpected(&name));
                    }
                    self.advance();
                    if self.at(TokenKind::LParen) {
                        return Err(self.error(format!(
                            "cannot call `.{}(...)` on a value, only module functions such as `String.upcase(...)` are supported",
                            token_name(&name)
                        )));
                    }
                    let span = ExprSpan::new(expr.span.start, name.span.end);
                    expr = Expression {
                        kind: ExprKind::Field {
                            object: Box::new(expr),
                            field: token_name(&name),
                        },
                        span,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let key = self.expression(0)?;
                    let close = self.expect(TokenKind::RBracket)?;
                    let span = ExprSpan::new(expr.span.start, close.span.end);
                    expr = Expression {
                        kind: ExprKind::Index {
                            object: Box::new(expr),
                            key: Box::new(key),
                        },
                        span,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expression, ParseError> {
        let token = self.current().clone();
        let span = token.span;

        let kind = match token.kind {
            TokenKind::Nil => ExprKind::Nil,
            TokenKind::True => ExprKind::Boolean(true),
            TokenKind::False => ExprKind::Boolean(false),
            TokenKind::Integer => match token.value {
                TokenValue::Integer(n) => ExprKind::Integer(n),
                _ => return Err(self.unexpected(&token)),
            },
            TokenKind::Float => match token.value {
                TokenValue::Float(n) => ExprKind::Float(n),
                _ => return Err(self.unexpected(&token)),
            },
            TokenKind::Atom => ExprKind::Atom(token_name(&token)),
            TokenKind::Assign => ExprKind::Assign(token_name(&token)),
            TokenKind::String => match &token.value {
                TokenValue::String(segments) => self.string(segments)?,
                _ => return Err(self.unexpected(&token)),
            },
            TokenKind::Identifier => {
                self.advance();
                let name = token_name(&token);
                if self.at(TokenKind::LParen) {
                    return self.call(name, span.start);
                }
                return Ok(Expression {
                    kind: ExprKind::Variable(name),
                    span,
                });
            }
            TokenKind::Alias => return self.remote_call(),
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression(0)?;
                let close = self.expect(TokenKind::RParen)?;
                return Ok(Expression {
                    kind: inner.kind,
                    span: ExprSpan::new(span.start, close.span.end),
                });
            }
            TokenKind::LBracket => return self.list(),
            TokenKind::LBrace => return self.tuple(),
            TokenKind::PercentBrace => return self.map(),
            _ => return Err(self.unexpected(&token)),
        };

        self.advance();
        Ok(Expression { kind, span })
    }

    fn string(&self, segments: &[StringSegment]) -> Result<ExprKind, ParseError> {
        if let [StringSegment::Literal(s)] = segments {
            return Ok(ExprKind::String(s.clone()));
        }

        let mut parts = Vec::with_capacity(segments.len());
        for segment in segments {
            match segment {
                StringSegment::Literal(s) => parts.push(StringPart::Literal(s.clone())),
                StringSegment::Code { code, .. } => {
                    parts.push(StringPart::Code(ExprParser::parse(code, self.origin)?))
                }
            }
        }
        Ok(ExprKind::Interpolated(parts))
    }

    /// `name(args)`; the name has been consumed.
    fn call(&mut self, function: String, start: usize) -> Result<Expression, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut arguments = Vec::new();

        while !self.at(TokenKind::RParen) {
            if self.at(TokenKind::KeywordKey) {
                let entries = self.keyword_entries(TokenKind::RParen)?;
                arguments.push(keyword_list(entries));
                break;
            }
            arguments.push(self.expression(0)?);
            if !self.at(TokenKind::RParen) {
                self.expect(TokenKind::Comma)?;
            }
        }

        let close = self.expect(TokenKind::RParen)?;
        Ok(Expression {
            kind: ExprKind::Call {
                function,
                arguments,
            },
            span: ExprSpan::new(start, close.span.end),
        })
    }

    /// `Module.Sub.function(args)`
    fn remote_call(&mut self) -> Result<Expression, ParseError> {
        let start = self.current().span.start;
        let mut path = Vec::new();

        loop {
            let segment = self.expect(TokenKind::Alias)?;
            path.push(token_name(&segment));
            if !self.at(TokenKind::Dot) {
                return Err(self.error(format!(
                    "module `{}` cannot be used as a value",
                    path.join(".")
                )));
            }
            self.advance();
            if !self.at(TokenKind::Alias) {
                break;
            }
        }

        let function = self.expect(TokenKind::Identifier)?;
        path.push(token_name(&function));
        if !self.at(TokenKind::LParen) {
            return Err(self.error(format!(
                "expected a call to `{}(...)`",
                path.join(".")
            )));
        }
        self.call(path.join("."), start)
    }

    fn list(&mut self) -> Result<Expression, ParseError> {
        let open = self.expect(TokenKind::LBracket)?;
        let mut items = Vec::new();

        while !self.at(TokenKind::RBracket) {
            if self.at(TokenKind::KeywordKey) {
                items.extend(
                    self.keyword_entries(TokenKind::RBracket)?
                        .into_iter()
                        .map(|(key, value)| pair(key, value)),
                );
                break;
            }
            items.push(self.expression(0)?);
            if !self.at(TokenKind::RBracket) {
                self.expect(TokenKind::Comma)?;
            }
        }

        let close = self.expect(TokenKind::RBracket)?;
        Ok(Expression {
            kind: ExprKind::List(items),
            span: ExprSpan::new(open.span.start, close.span.end),
        })
    }

    fn tuple(&mut self) -> Result<Expression, ParseError> {
        let open = self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();

        while !self.at(TokenKind::RBrace) {
            items.push(self.expression(0)?);
            if !self.at(TokenKind::RBrace) {
                self.expect(TokenKind::Comma)?;
            }
        }

        let close = self.expect(TokenKind::RBrace)?;
        Ok(Expression {
            kind: ExprKind::Tuple(items),
            span: ExprSpan::new(open.span.start, close.span.end),
        })
    }

    fn map(&mut self) -> Result<Expression, ParseError> {
        let open = self.expect(TokenKind::PercentBrace)?;
        let mut entries = Vec::new();

        while !self.at(TokenKind::RBrace) {
            if self.at(TokenKind::KeywordKey) {
                entries.extend(self.keyword_entries(TokenKind::RBrace)?);
                break;
            }
            let key = self.expression(0)?;
            self.expect(TokenKind::FatArrow)?;
            let value = self.expression(0)?;
            entries.push((key, value));
            if !self.at(TokenKind::RBrace) {
                self.expect(TokenKind::Comma)?;
            }
        }

        let close = self.expect(TokenKind::RBrace)?;
        Ok(Expression {
            kind: ExprKind::Map(entries),
            span: ExprSpan::new(open.span.start, close.span.end),
        })
    }

    /// `a: 1, b: 2` up to (not including) `close`. Keys become atoms.
    fn keyword_entries(
        &mut self,
        close: TokenKind,
    ) -> Result<Vec<(Expression, Expression)>, ParseError> {
        let mut entries = Vec::new();

        while !self.at(close) {
            let key = self.expect(TokenKind::KeywordKey)?;
            let value = self.expression(0)?;
            entries.push((
                Expression {
                    kind: ExprKind::Atom(token_name(&key)),
                    span: key.span,
                },
                value,
            ));
            if !self.at(close) {
                self.expect(TokenKind::Comma)?;
            }
        }

        Ok(entries)
    }

    // --- Patterns ---

    fn pattern(&mut self) -> Result<PatternKind, ParseError> {
        let token = self.current().clone();

        match token.kind {
            TokenKind::Identifier => {
                self.advance();
                let name = token_name(&token);
                if self.at(TokenKind::LParen) {
                    return Err(self.error(format!(
                        "cannot invoke `{name}(...)` inside a pattern"
                    )));
                }
                if name.starts_with('_') {
                    Ok(PatternKind::Wildcard)
                } else {
                    Ok(PatternKind::Variable(name))
                }
            }
            TokenKind::Nil
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Integer
            | TokenKind::Float
            | TokenKind::Atom => Ok(PatternKind::Literal(self.primary()?)),
            TokenKind::String => {
                let literal = self.primary()?;
                if matches!(literal.kind, ExprKind::Interpolated(_)) {
                    return Err(self.error("string interpolation is not allowed in patterns"));
                }
                Ok(PatternKind::Literal(literal))
            }
            TokenKind::Minus => {
                let literal = self.prefix()?;
                match literal.kind {
                    ExprKind::Integer(_) | ExprKind::Float(_) => Ok(PatternKind::Literal(literal)),
                    _ => Err(self.error("only number literals can be negated in patterns")),
                }
            }
            TokenKind::LBrace => {
                self.advance();
                let mut items = Vec::new();
                while !self.at(TokenKind::RBrace) {
                    items.push(self.pattern()?);
                    if !self.at(TokenKind::RBrace) {
                        self.expect(TokenKind::Comma)?;
                    }
                }
                self.expect(TokenKind::RBrace)?;
                Ok(PatternKind::Tuple(items))
            }
            TokenKind::LBracket => self.list_pattern(),
            TokenKind::PercentBrace => self.map_pattern(),
            TokenKind::Assign => Err(self.error(format!(
                "cannot use the assign `@{}` inside a pattern",
                token_name(&token)
            ))),
            _ => Err(self.unexpected(&token)),
        }
    }

    fn list_pattern(&mut self) -> Result<PatternKind, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let mut items = Vec::new();
        let mut tail = None;

        while !self.at(TokenKind::RBracket) {
            if self.at(TokenKind::KeywordKey) {
                let key = self.expect(TokenKind::KeywordKey)?;
                let atom = Expression {
                    kind: ExprKind::Atom(token_name(&key)),
                    span: key.span,
                };
                items.push(PatternKind::Tuple(vec![
                    PatternKind::Literal(atom),
                    self.pattern()?,
                ]));
            } else {
                items.push(self.pattern()?);
            }

            if self.at(TokenKind::Pipe) {
                self.advance();
                tail = Some(Box::new(self.pattern()?));
                break;
            }
            if !self.at(TokenKind::RBracket) {
                self.expect(TokenKind::Comma)?;
            }
        }

        self.expect(TokenKind::RBracket)?;
        Ok(PatternKind::List { items, tail })
    }

    fn map_pattern(&mut self) -> Result<PatternKind, ParseError> {
        self.expect(TokenKind::PercentBrace)?;
        let mut entries = Vec::new();

        while !self.at(TokenKind::RBrace) {
            let token = self.current().clone();
            let key = match token.kind {
                TokenKind::KeywordKey => {
                    self.advance();
                    token_name(&token)
                }
                TokenKind::Atom => {
                    self.advance();
                    self.expect(TokenKind::FatArrow)?;
                    token_name(&token)
                }
                TokenKind::String => match &token.value {
                    TokenValue::String(segments) => match segments.as_slice() {
                        [StringSegment::Literal(s)] => {
                            let key = s.clone();
                            self.advance();
                            self.expect(TokenKind::FatArrow)?;
                            key
                        }
                        _ => return Err(self.error("map pattern keys must be literals")),
                    },
                    _ => return Err(self.unexpected(&token)),
                },
                _ => return Err(self.error("map pattern keys must be atoms or strings")),
            };

            entries.push((key, self.pattern()?));
            if !self.at(TokenKind::RBrace) {
                self.expect(TokenKind::Comma)?;
            }
        }

        self.expect(TokenKind::RBrace)?;
        Ok(PatternKind::Map(entries))
    }

    // --- Helpers ---

    fn current(&self) -> &Token {
        // The token stream always ends with Eof and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn advance(&mut self) {
        if self.current().kind != TokenKind::Eof {
            self.pos += 1;
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let token = self.current().clone();
        if token.kind != kind {
            return Err(self.unexpected(&token));
        }
        self.advance();
        Ok(token)
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        let token = self.current();
        if token.kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.unexpected(token))
        }
    }

    fn unexpected(&self, token: &Token) -> ParseError {
        let found = if token.kind == TokenKind::Eof {
            "end of expression".to_string()
        } else {
            let text: String = self.chars[token.span.start..token.span.end].iter().collect();
            format!("`{text}`")
        };
        self.error(format!("unexpected {found}"))
    }

    fn error(&self, detail: impl fmt::Display) -> ParseError {
        let source: String = self.chars.iter().collect();
        ParseError::new(
            format!("syntax error in expression `{}`: {detail}", source.trim()),
            self.origin,
        )
    }
}

/// Returns `(op, left_bp, right_bp)` for an infix operator token.
fn infix_binding_power(kind: TokenKind) -> Option<(BinaryOp, u8, u8)> {
    let entry = match kind {
        TokenKind::OrOr => (BinaryOp::Or, 10, 11),
        TokenKind::Or => (BinaryOp::StrictOr, 10, 11),
        TokenKind::AndAnd => (BinaryOp::And, 20, 21),
        TokenKind::And => (BinaryOp::StrictAnd, 20, 21),
        TokenKind::EqEq => (BinaryOp::Eq, 30, 31),
        TokenKind::NotEq => (BinaryOp::Neq, 30, 31),
        TokenKind::StrictEq => (BinaryOp::StrictEq, 30, 31),
        TokenKind::StrictNotEq => (BinaryOp::StrictNeq, 30, 31),
        TokenKind::Lt => (BinaryOp::Lt, 40, 41),
        TokenKind::Gt => (BinaryOp::Gt, 40, 41),
        TokenKind::Lte => (BinaryOp::Lte, 40, 41),
        TokenKind::Gte => (BinaryOp::Gte, 40, 41),
        TokenKind::In => (BinaryOp::In, 50, 51),
        // Right associative.
        TokenKind::PlusPlus => (BinaryOp::ListConcat, 61, 60),
        TokenKind::Concat => (BinaryOp::Concat, 61, 60),
        TokenKind::DotDot => (BinaryOp::Range, 61, 60),
        TokenKind::Plus => (BinaryOp::Add, 70, 71),
        TokenKind::Minus => (BinaryOp::Sub, 70, 71),
        TokenKind::Star => (BinaryOp::Mul, 80, 81),
        TokenKind::Slash => (BinaryOp::Div, 80, 81),
        _ => return None,
    };
    Some(entry)
}

fn token_name(token: &Token) -> String {
    match &token.value {
        TokenValue::Name(name) => name.clone(),
        _ => String::new(),
    }
}

fn pair(key: Expression, value: Expression) -> Expression {
    let span = ExprSpan::new(key.span.start, value.span.end);
    Expression {
        kind: ExprKind::Tuple(vec![key, value]),
        span,
    }
}

fn keyword_list(entries: Vec<(Expression, Expression)>) -> Expression {
    let start = entries.first().map_or(0, |(k, _)| k.span.start);
    let end = entries.last().map_or(0, |(_, v)| v.span.end);
    Expression {
        kind: ExprKind::List(entries.into_iter().map(|(k, v)| pair(k, v)).collect()),
        span: ExprSpan::new(start, end),
    }
}
