//! Diagnostic type shared by the evaluator and the template expander.
//!
//! Every failure surfaces as one of two shapes. Evaluator diagnostics carry a
//! line/column pair relative to the start of the backtick region they came
//! from; expander diagnostics are positionless. The `Display` rendering is
//! the crate's stable error surface, so the formats below are load-bearing.

use thiserror::Error;

/// An error produced while expanding a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Lex, parse, type, binding, or arithmetic error inside an expression.
    #[error("[Module:Interp,Location:({line},{col})]:\n{message}\n")]
    Interp {
        line: usize,
        col: usize,
        message: String,
    },

    /// Structural error in the surrounding template text.
    #[error("[Module:Expander]:{message}")]
    Expand { message: String },
}

impl Error {
    pub(crate) fn expand(message: impl Into<String>) -> Self {
        Error::Expand {
            message: message.into(),
        }
    }

    /// The diagnostic text without its module/location envelope.
    pub fn message(&self) -> &str {
        match self {
            Error::Interp { message, .. } | Error::Expand { message } => message,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
