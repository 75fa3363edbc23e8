//! Response envelope shared by every controller endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

/// Status of a successful handler outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok,
    Created,
}

/// Successful handler outcome, before it is wrapped in an [`Envelope`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: ReplyStatus,
    pub data: Value,
}

impl Reply {
    pub fn ok(data: Value) -> Self {
        Self {
            status: ReplyStatus::Ok,
            data,
        }
    }

    pub fn created(data: Value) -> Self {
        Self {
            status: ReplyStatus::Created,
            data,
        }
    }
}

/// Result returned by the controller for every route.
pub type HandlerResult = Result<Reply, ApiError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope {
    pub success: bool,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: Option<String>,
}

/// `{"success": true, "data": ...}` or `{"success": false, "error": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Success(SuccessEnvelope),
    Error(ErrorEnvelope),
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self::Success(SuccessEnvelope {
            success: true,
            data,
        })
    }

    pub fn error(message: Option<String>) -> Self {
        Self::Error(ErrorEnvelope {
            success: false,
            error: message,
        })
    }

    /// Client-facing form of `err`. Only kinds that expose their message
    /// carry text; the rest send `null`.
    pub fn from_error(err: &ApiError) -> Self {
        let message = err.kind().exposes_message().then(|| err.to_string());
        Self::error(message)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
