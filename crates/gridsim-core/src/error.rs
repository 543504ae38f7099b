//! Errors raised by inspected members.

use std::error::Error;

use thiserror::Error;

use crate::inspect::ValueKind;

/// Failure of a getter, setter or method registered through
/// [`Describe`](crate::Describe).
#[derive(Debug, Error)]
pub enum MemberError {
    /// The member refused the request.
    #[error("rejected: {0}")]
    Rejected(String),
    /// Wrong number of arguments.
    #[error("expected {expected} argument(s), got {got}")]
    Arity {
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        got: usize,
    },
    /// An argument had the wrong kind.
    #[error("argument {index}: expected {expected}, got {got}")]
    ArgumentType {
        /// Zero-based argument position.
        index: usize,
        /// Declared kind.
        expected: ValueKind,
        /// Supplied kind.
        got: ValueKind,
    },
    /// Any other failure raised by member code.
    #[error("{0}")]
    Other(#[source] Box<dyn Error + Send + Sync>),
}

impl MemberError {
    /// Convenience constructor for [`MemberError::Rejected`].
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}
