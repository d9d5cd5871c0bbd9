//! CEEx Parser
//!
//! Builds a template tree from the token stream produced by `ceex-lexer`.
//! Includes both the tag-stack parser (elements, components, slot entries,
//! do-blocks) and the host-expression parser used for `{expr}`,
//! `<%= expr %>` and attribute values.
//!
//! Every embedded expression is parsed here, so syntax errors in host code
//! surface at compile time together with markup errors.

pub mod ast;
pub mod expr_lexer;
pub mod expr_parser;
pub mod parser;
pub mod special;

pub use ast::{Expression, Fragment, Node};
pub use parser::Parser;

use ceex_lexer::{LexerError, Position};

/// Parser error with position information.
///
/// Lexer errors convert into this type unchanged, so a single error type
/// reaches the diagnostic formatter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} (line {}, column {})", position.line, position.column)]
pub struct ParseError {
    pub message: String,
    pub hint: Option<String>,
    pub position: Position,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            hint: None,
            position,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<LexerError> for ParseError {
    fn from(err: LexerError) -> Self {
        Self {
            message: err.message,
            hint: err.hint,
            position: err.position,
        }
    }
}
