//! Shared failure classification. Every crate keeps its own `thiserror`
//! enum; `kind()` maps each variant onto this closed set so callers and
//! audit trails can react uniformly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of failure kinds surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed input; rejected before any state mutation.
    Validation,
    /// Membership or balance requirement not met.
    AuthorizationDenied,
    /// Referenced id absent.
    NotFound,
    /// Duplicate vote, terminal intent, broken chain on append.
    Conflict,
    /// External capability exceeded its deadline.
    Timeout,
    /// Hash chain break, clock regression, mid-pipeline hash mismatch.
    IntegrityViolation,
    /// Retries/backoff exhausted; terminal for the round or job.
    Exhausted,
    /// Unexpected; logged and surfaced opaquely, never swallowed.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::AuthorizationDenied => "authorization_denied",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Timeout => "timeout",
            ErrorKind::IntegrityViolation => "integrity_violation",
            ErrorKind::Exhausted => "exhausted",
            ErrorKind::Internal => "internal",
        }
    }

    /// Recoverable kinds are handled locally with best-effort retries.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ErrorKind::Timeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user-visible shape of a failure: {kind, message, correlation-id}.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    pub message: String,
    pub correlation_id: String,
}

impl FailureReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            correlation_id: correlation_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeouts_are_recoverable() {
        assert!(ErrorKind::Timeout.is_recoverable());
        assert!(!ErrorKind::Conflict.is_recoverable());
        assert!(!ErrorKind::IntegrityViolation.is_recoverable());
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(ErrorKind::AuthorizationDenied.to_string(), "authorization_denied");
        assert_eq!(ErrorKind::Exhausted.as_str(), "exhausted");
    }
}
