//! Runtime errors raised while rendering a compiled template.

/// Failure of a render call.
///
/// Compile-time problems are reported as [`crate::SyntaxError`] instead;
/// everything here depends on the assigns or components given at render time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("assign @{name} not available in template. Available assigns: {available}")]
    MissingAssign { name: String, available: String },

    #[error("undefined variable \"{name}\"")]
    UndefinedVariable { name: String },

    /// `render_slot` on a slot with no entries.
    #[error("attempted to render slot <:{slot}> but the slot has no entries")]
    NoInnerBlock { slot: String },

    /// `render_slot` on a self-closing slot entry.
    #[error("attempted to render slot <:{slot}> but the slot has no inner content")]
    NoInnerContent { slot: String },

    #[error("no match of right hand side value: {value} (expected pattern: {pattern})")]
    MatchFailure { pattern: String, value: String },

    #[error("undefined component {name}")]
    UnknownComponent { name: String },

    #[error("cannot render {value} as HTML")]
    NotRenderable { value: String },

    #[error("{value} is not enumerable")]
    NotEnumerable { value: String },

    #[error("key {key} not found in: {value}")]
    KeyNotFound { key: String, value: String },

    #[error("{message}")]
    BadArgument { message: String },

    #[error("undefined function {name}")]
    UndefinedFunction { name: String },
}

impl RenderError {
    pub(crate) fn bad_argument(message: impl Into<String>) -> Self {
        RenderError::BadArgument {
            message: message.into(),
        }
    }
}
