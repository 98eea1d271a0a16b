use econsql_error::{EconError, ErrorCode, ErrorContext};
use serde::Serialize;
use thiserror::Error;

/// Why an accepted query produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", content = "detail")]
pub enum ExecutionFailure {
    #[error("query exceeded its {budget_ms} ms budget")]
    Timeout { budget_ms: u64 },

    /// Every session slot stayed busy for the whole budget. Reported as a
    /// timeout, since the wait counts against the same budget.
    #[error("no store session became free within the {budget_ms} ms budget")]
    #[serde(rename = "Timeout")]
    SessionUnavailable { budget_ms: u64 },

    /// Store-side fault. The detail is for logs, not for end users.
    #[error("store error: {0}")]
    StoreError(String),
}

impl ExecutionFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            ExecutionFailure::Timeout { .. } | ExecutionFailure::SessionUnavailable { .. } => {
                "Timeout"
            }
            ExecutionFailure::StoreError(_) => "StoreError",
        }
    }

    pub fn to_econ_error(&self) -> EconError {
        match self {
            ExecutionFailure::Timeout { budget_ms } => {
                EconError::new(ErrorCode::ExecutionTimeout, self.to_string())
                    .with_context(ErrorContext::Timeout {
                        budget_ms: *budget_ms,
                    })
                    .with_hint("Narrow the question or raise query_limits.timeout_ms")
            }
            ExecutionFailure::SessionUnavailable { budget_ms } => {
                EconError::new(ErrorCode::SessionUnavailable, self.to_string())
                    .with_context(ErrorContext::Timeout {
                        budget_ms: *budget_ms,
                    })
                    .with_hint("Retry later or raise query_limits.max_concurrent_sessions")
            }
            ExecutionFailure::StoreError(_) => {
                EconError::new(ErrorCode::StoreError, "the data store could not run the query")
            }
        }
    }
}

/// Failure of the generation or synthesis collaborator.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("model request failed: {0}")]
    Request(String),

    #[error("model endpoint returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("model response could not be decoded: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CollaboratorError::Malformed(err.to_string())
        } else {
            CollaboratorError::Request(err.to_string())
        }
    }
}
