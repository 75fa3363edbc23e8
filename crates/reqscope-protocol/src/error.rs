//! Sentinel error kinds and the error type handlers return.
//!
//! Lower layers never pick HTTP statuses. They tag failures with an
//! [`ErrorKind`] and the transport maps the kind to a status code.

use std::fmt;

/// Failure categories used to choose a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The client sent something undecodable or invalid.
    BadRequest,
    /// A collaborator (settings source, user store) failed.
    Internal,
    /// The requested feature is switched off in the current settings.
    NotImplemented,
    /// The request was refused before reaching a handler.
    Unavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "input error",
            Self::Internal => "internal error",
            Self::NotImplemented => "not implemented",
            Self::Unavailable => "service unavailable",
        }
    }

    /// Whether the error text may be shown to the client.
    pub fn exposes_message(&self) -> bool {
        matches!(self, Self::BadRequest)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure tagged with its sentinel kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}. {kind}")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Sentinel comparison: does this error belong to `kind`?
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Prepend a description, keeping the kind.
    pub fn context(self, prefix: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{prefix}. {}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_appends_kind() {
        let err = ApiError::bad_request("failed to decode. EOF");
        assert_eq!(err.to_string(), "failed to decode. EOF. input error");
    }

    #[test]
    fn context_preserves_kind() {
        let err = ApiError::internal("connection refused").context("failed to insert user");
        assert!(err.is(ErrorKind::Internal));
        assert_eq!(err.message(), "failed to insert user. connection refused");
    }

    #[test]
    fn only_bad_request_exposes_message() {
        assert!(ErrorKind::BadRequest.exposes_message());
        assert!(!ErrorKind::Internal.exposes_message());
        assert!(!ErrorKind::NotImplemented.exposes_message());
        assert!(!ErrorKind::Unavailable.exposes_message());
    }
}
