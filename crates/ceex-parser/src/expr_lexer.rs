//! Lexer for CEEx host expressions.
//!
//! Tokenizes the Elixir-flavoured expression language used in `{expr}`,
//! `<%= expr %>`, attribute values and the `:if`/`:for`/`:let` attributes.
//! Operates on a single expression string, never on template markup.
//!
//! # Examples
//!
//! ```
//! use ceex_parser::expr_lexer::{ExprLexer, TokenKind};
//!
//! let tokens = ExprLexer::tokenize("@count + 1").unwrap();
//! assert_eq!(tokens[0].kind, TokenKind::Assign);
//! assert_eq!(tokens[1].kind, TokenKind::Plus);
//! assert_eq!(tokens[2].kind, TokenKind::Integer);
//! ```

use crate::ast::ExprSpan;

/// A token produced by the expression lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: ExprSpan,
    pub value: TokenValue,
}

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    Integer,
    Float,
    String,
    Atom,
    Nil,
    True,
    False,

    // Names
    /// `item`, `is_nil`
    Identifier,
    /// `String`, `Ui`
    Alias,
    /// `@name`
    Assign,
    /// `name:` inside keyword lists, maps and call arguments
    KeywordKey,

    // Word operators
    And,
    Or,
    Not,
    In,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,

    // Comparison
    EqEq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    Lte,
    Gte,

    // Logical
    AndAnd,
    OrOr,
    Bang,

    // Collections
    /// `<>`
    Concat,
    /// `++`
    PlusPlus,
    /// `..`
    DotDot,
    /// `<-`
    LeftArrow,
    /// `=>`
    FatArrow,
    /// `|`
    Pipe,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    /// `%{`
    PercentBrace,

    // Punctuation
    Dot,
    Comma,

    Eof,
}

/// The value carried by a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Integer(i64),
    Float(f64),
    String(Vec<StringSegment>),
    Name(String),
}

/// A piece of a double-quoted string.
#[derive(Debug, Clone, PartialEq)]
pub enum StringSegment {
    Literal(String),
    /// Code inside `#{...}`, not yet parsed.
    Code { code: String, offset: usize },
}

/// Expression lexer error.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprLexerError {
    pub message: String,
    pub span: ExprSpan,
}

impl std::fmt::Display for ExprLexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message, self.span.start)
    }
}

impl std::error::Error for ExprLexerError {}

/// CEEx expression lexer.
pub struct ExprLexer {
    chars: Vec<char>,
    pos: usize,
}

impl ExprLexer {
    /// Create a new expression lexer for the given source.
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    /// Tokenize the entire source into a vector of tokens.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, ExprLexerError> {
        let mut lexer = ExprLexer::new(source);
        let mut tokens = Vec::new();

        loop {
            let token = lexer.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Read the next token from the source.
    pub fn next_token(&mut self) -> Result<Token, ExprLexerError> {
        self.skip_whitespace();

        if self.is_at_end() {
            return Ok(self.token(TokenKind::Eof, self.pos, TokenValue::None));
        }

        let start = self.pos;
        let ch = self.current();

        match ch {
            '0'..='9' => self.read_number(start),

            '"' => {
                let segments = self.read_string(start)?;
                self.maybe_quoted_key(start, segments)
            }

            ':' => self.read_atom(start),

            '@' => {
                self.advance();
                if !self.is_at_end() && is_name_start(self.current()) {
                    let name = self.read_name();
                    Ok(self.token(TokenKind::Assign, start, TokenValue::Name(name)))
                } else {
                    Err(self.error("expected an assign name after `@`", start))
                }
            }

            'A'..='Z' => {
                let name = self.read_name();
                Ok(self.token(TokenKind::Alias, start, TokenValue::Name(name)))
            }

            c if is_name_start(c) => self.read_identifier(start),

            // Three-character operators
            '=' if self.peek() == Some('=') && self.peek_at(2) == Some('=') => {
                Ok(self.op(TokenKind::StrictEq, start, 3))
            }
            '!' if self.peek() == Some('=') && self.peek_at(2) == Some('=') => {
                Ok(self.op(TokenKind::StrictNotEq, start, 3))
            }

            // Two-character operators
            '=' if self.peek() == Some('=') => Ok(self.op(TokenKind::EqEq, start, 2)),
            '!' if self.peek() == Some('=') => Ok(self.op(TokenKind::NotEq, start, 2)),
            '=' if self.peek() == Some('>') => Ok(self.op(TokenKind::FatArrow, start, 2)),
            '<' if self.peek() == Some('=') => Ok(self.op(TokenKind::Lte, start, 2)),
            '<' if self.peek() == Some('>') => Ok(self.op(TokenKind::Concat, start, 2)),
            '<' if self.peek() == Some('-') => Ok(self.op(TokenKind::LeftArrow, start, 2)),
            '>' if self.peek() == Some('=') => Ok(self.op(TokenKind::Gte, start, 2)),
            '&' if self.peek() == Some('&') => Ok(self.op(TokenKind::AndAnd, start, 2)),
            '|' if self.peek() == Some('|') => Ok(self.op(TokenKind::OrOr, start, 2)),
            '+' if self.peek() == Some('+') => Ok(self.op(TokenKind::PlusPlus, start, 2)),
            '.' if self.peek() == Some('.') => Ok(self.op(TokenKind::DotDot, start, 2)),
            '%' if self.peek() == Some('{') => Ok(self.op(TokenKind::PercentBrace, start, 2)),

            // Single-character tokens
            '+' => Ok(self.op(TokenKind::Plus, start, 1)),
            '-' => Ok(self.op(TokenKind::Minus, start, 1)),
            '*' => Ok(self.op(TokenKind::Star, start, 1)),
            '/' => Ok(self.op(TokenKind::Slash, start, 1)),
            '!' => Ok(self.op(TokenKind::Bang, start, 1)),
            '<' => Ok(self.op(TokenKind::Lt, start, 1)),
            '>' => Ok(self.op(TokenKind::Gt, start, 1)),
            '|' => Ok(self.op(TokenKind::Pipe, start, 1)),
            '(' => Ok(self.op(TokenKind::LParen, start, 1)),
            ')' => Ok(self.op(TokenKind::RParen, start, 1)),
            '[' => Ok(self.op(TokenKind::LBracket, start, 1)),
            ']' => Ok(self.op(TokenKind::RBracket, start, 1)),
            '{' => Ok(self.op(TokenKind::LBrace, start, 1)),
            '}' => Ok(self.op(TokenKind::RBrace, start, 1)),
            '.' => Ok(self.op(TokenKind::Dot, start, 1)),
            ',' => Ok(self.op(TokenKind::Comma, start, 1)),

            '=' => Err(self.error(
                "the match operator `=` is not supported in template expressions",
                start,
            )),

            _ => Err(self.error(format!("unexpected character `{ch}`"), start)),
        }
    }

    // --- Private helpers ---

    fn read_number(&mut self, start: usize) -> Result<Token, ExprLexerError> {
        self.read_digits();

        let mut is_float = false;
        if !self.is_at_end()
            && self.current() == '.'
            && self.peek().is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            self.read_digits();

            if !self.is_at_end() && matches!(self.current(), 'e' | 'E') {
                let sign = matches!(self.peek(), Some('+') | Some('-'));
                let digit_at = if sign { 2 } else { 1 };
                if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += digit_at;
                    self.read_digits();
                }
            }
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();

        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.error(format!("invalid float `{text}`"), start))?;
            Ok(self.token(TokenKind::Float, start, TokenValue::Float(value)))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.error(format!("invalid integer `{text}`"), start))?;
            Ok(self.token(TokenKind::Integer, start, TokenValue::Integer(value)))
        }
    }

    fn read_digits(&mut self) {
        while !self.is_at_end() && (self.current().is_ascii_digit() || self.current() == '_') {
            self.advance();
        }
    }

    /// Reads a double-quoted string, splitting out `#{...}` interpolations.
    fn read_string(&mut self, start: usize) -> Result<Vec<StringSegment>, ExprLexerError> {
        self.advance(); // skip opening quote

        let mut segments = Vec::new();
        let mut literal = String::new();

        loop {
            if self.is_at_end() {
                return Err(self.error("missing terminator `\"` for string", start));
            }

            match self.current() {
                '"' => break,
                '\\' => {
                    self.advance();
                    if self.is_at_end() {
                        return Err(self.error("unterminated escape sequence", start));
                    }
                    match self.current() {
                        'n' => literal.push('\n'),
                        't' => literal.push('\t'),
                        'r' => literal.push('\r'),
                        '\\' => literal.push('\\'),
                        '"' => literal.push('"'),
                        '#' => literal.push('#'),
                        c => {
                            literal.push('\\');
                            literal.push(c);
                        }
                    }
                    self.advance();
                }
                '#' if self.peek() == Some('{') => {
                    if !literal.is_empty() {
                        segments.push(StringSegment::Literal(std::mem::take(&mut literal)));
                    }
                    self.advance_n(2);
                    let offset = self.pos;
                    let code = self.read_interpolation(start)?;
                    segments.push(StringSegment::Code { code, offset });
                }
                c => {
                    literal.push(c);
                    self.advance();
                }
            }
        }

        self.advance(); // skip closing quote

        if !literal.is_empty() || segments.is_empty() {
            segments.push(StringSegment::Literal(literal));
        }

        Ok(segments)
    }

    /// Reads the code of a `#{...}` up to its matching brace.
    fn read_interpolation(&mut self, string_start: usize) -> Result<String, ExprLexerError> {
        let code_start = self.pos;
        let mut depth = 1;
        let mut in_string = false;

        while !self.is_at_end() {
            let c = self.current();
            if in_string {
                match c {
                    '\\' => self.advance(),
                    '"' => in_string = false,
                    _ => {}
                }
            } else {
                match c {
                    '"' => in_string = true,
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            let code = self.chars[code_start..self.pos].iter().collect();
                            self.advance();
                            return Ok(code);
                        }
                    }
                    _ => {}
                }
            }
            self.advance();
        }

        Err(self.error("missing terminator `}` for string interpolation", string_start))
    }

    /// `"data-id": 1` is a keyword key; any other string is a literal.
    fn maybe_quoted_key(
        &mut self,
        start: usize,
        segments: Vec<StringSegment>,
    ) -> Result<Token, ExprLexerError> {
        if self.at_keyword_colon() {
            if let [StringSegment::Literal(name)] = segments.as_slice() {
                let name = name.clone();
                self.advance();
                return Ok(self.token(TokenKind::KeywordKey, start, TokenValue::Name(name)));
            }
        }
        Ok(self.token(TokenKind::String, start, TokenValue::String(segments)))
    }

    fn read_atom(&mut self, start: usize) -> Result<Token, ExprLexerError> {
        self.advance(); // skip `:`

        if self.is_at_end() {
            return Err(self.error("unexpected character `:`", start));
        }

        match self.current() {
            '"' => {
                let segments = self.read_string(self.pos)?;
                match segments.as_slice() {
                    [StringSegment::Literal(name)] => {
                        let name = name.clone();
                        Ok(self.token(TokenKind::Atom, start, TokenValue::Name(name)))
                    }
                    _ => Err(self.error("interpolation is not supported in atoms", start)),
                }
            }
            c if is_name_start(c) || c.is_ascii_uppercase() => {
                let name = self.read_name();
                Ok(self.token(TokenKind::Atom, start, TokenValue::Name(name)))
            }
            _ => Err(self.error("unexpected character `:`", start)),
        }
    }

    fn read_identifier(&mut self, start: usize) -> Result<Token, ExprLexerError> {
        let name = self.read_name();

        if self.at_keyword_colon() {
            self.advance();
            return Ok(self.token(TokenKind::KeywordKey, start, TokenValue::Name(name)));
        }

        let kind = match name.as_str() {
            "nil" => TokenKind::Nil,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            _ => return Ok(self.token(TokenKind::Identifier, start, TokenValue::Name(name))),
        };
        Ok(self.token(kind, start, TokenValue::None))
    }

    /// Reads `[A-Za-z0-9_]*` with an optional trailing `?` or `!`.
    fn read_name(&mut self) -> String {
        let start = self.pos;
        while !self.is_at_end() && (self.current().is_alphanumeric() || self.current() == '_') {
            self.advance();
        }
        if !self.is_at_end() && matches!(self.current(), '?' | '!') && self.peek() != Some('=') {
            self.advance();
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// A `:` directly after a name, followed by whitespace or the end.
    fn at_keyword_colon(&self) -> bool {
        !self.is_at_end()
            && self.current() == ':'
            && self.peek().map_or(true, |c| c.is_whitespace())
    }

    fn op(&mut self, kind: TokenKind, start: usize, len: usize) -> Token {
        self.advance_n(len);
        self.token(kind, start, TokenValue::None)
    }

    fn token(&self, kind: TokenKind, start: usize, value: TokenValue) -> Token {
        Token {
            kind,
            span: ExprSpan::new(start, self.pos),
            value,
        }
    }

    fn error(&self, message: impl Into<String>, start: usize) -> ExprLexerError {
        ExprLexerError {
            message: message.into(),
            span: ExprSpan::new(start, self.pos.max(start + 1)),
        }
    }

    fn current(&self) -> char {
        self.chars[self.pos]
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn advance_n(&mut self, n: usize) {
        self.pos += n;
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current().is_whitespace() {
            self.advance();
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_lowercase() || c == '_'
}
