//! Error types for the proxy dispatch core

use thiserror::Error;

/// Main error type for proxy dispatch operations
///
/// The taxonomy mirrors the failure classes of the dispatch protocol:
/// `TypeError` for spec-visible type failures (bad trap return values,
/// strict-mode assignment to read-only properties, invalid instanceof
/// operands), `InvalidArgument` for malformed inputs at the dispatcher
/// boundary, `PolicyDenied` for gate refusals that are required to surface,
/// `InvariantViolation` for handler results that contradict the target's
/// non-configurable/non-extensible state, and `RecursionLimitExceeded` for
/// tripped reentrancy guards.
#[derive(Debug, Clone, Error)]
pub enum JsError {
    #[error("TypeError: {message}")]
    TypeError { message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("access denied{}", format_key(key))]
    PolicyDenied { key: Option<String> },

    #[error("proxy handler violated an invariant in '{trap}'{}: {message}", format_key(key))]
    InvariantViolation {
        trap: &'static str,
        key: Option<String>,
        message: String,
    },

    #[error("too much recursion: proxy dispatch exceeded {limit} nested frames")]
    RecursionLimitExceeded { limit: usize },

    #[error("internal error: {0}")]
    Internal(String),
}

fn format_key(key: &Option<String>) -> String {
    match key {
        Some(key) => format!(" for property '{}'", key),
        None => String::new(),
    }
}

impl JsError {
    pub fn type_error(message: impl Into<String>) -> Self {
        JsError::TypeError {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        JsError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn policy_denied(key: Option<String>) -> Self {
        JsError::PolicyDenied { key }
    }

    pub fn invariant(trap: &'static str, key: Option<String>, message: impl Into<String>) -> Self {
        JsError::InvariantViolation {
            trap,
            key,
            message: message.into(),
        }
    }

    /// Create an internal error for states that indicate a bug in the
    /// embedding rather than in script-visible behavior
    pub fn internal_error(message: impl Into<String>) -> Self {
        JsError::Internal(message.into())
    }

    /// Whether this error is a handler contract breach
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, JsError::InvariantViolation { .. })
    }
}
