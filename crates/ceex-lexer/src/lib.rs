//! CEEx Lexer
//!
//! Tokenizes HTML-aware template source into a flat stream of tokens:
//! text runs, tag open/close markers, attributes, comments, doctypes and
//! embedded host expressions (`{expr}`, `<%= expr %>`).
//! Every token carries the [`Position`] where it starts.
//!
//! # Example
//!
//! ```
//! use ceex_lexer::{Scanner, TokenKind};
//!
//! let tokens = Scanner::tokenize("<br>").unwrap();
//! assert_eq!(tokens.len(), 3); // TagOpenStart, TagOpenEnd, Eof
//! assert_eq!(tokens[2].kind, TokenKind::Eof);
//! ```

pub mod scanner;
pub mod token;

pub use scanner::Scanner;
pub use token::{
    is_raw_text_element, is_void_element, AttrValue, HostMarker, Position, TagKind, Token,
    TokenKind, DEFAULT_SLOT, NO_CURLY_ATTRIBUTE,
};

/// Lexer error with position information.
///
/// `hint` is an optional explanatory paragraph rendered between the message
/// and the source snippet.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} (line {}, column {})", position.line, position.column)]
pub struct LexerError {
    pub message: String,
    pub hint: Option<String>,
    pub position: Position,
}

impl LexerError {
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
