//! Error taxonomy for client operations.

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tareas_core::TaskId;
use tareas_storage::StorageError;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors returned by client operations. Nothing is retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response was received (offline, DNS, refused connection, ...)
    #[error("could not reach the task server: {0}")]
    Transport(#[source] reqwest::Error),

    /// The server rejected the session token; the session has been cleared
    #[error("session expired, please log in again")]
    Unauthorized,

    /// There is no session; the request was not sent
    #[error("not logged in")]
    NotAuthenticated,

    /// The server refused the request (4xx other than 401)
    #[error("{detail}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Server-provided detail, verbatim
        detail: String,
    },

    /// The server failed (5xx)
    #[error("the task server failed (status {status})")]
    Server {
        /// HTTP status
        status: u16,
        /// Raw response body
        body: String,
    },

    /// A conditional write lost against a concurrent change
    #[error("task {0} was changed elsewhere, reload and try again")]
    Conflict(TaskId),

    /// Another operation on the same task has not finished yet
    #[error("task {0} is still being updated")]
    Busy(TaskId),

    /// A destructive action was not confirmed; nothing was sent
    #[error("deletion was not confirmed")]
    NotConfirmed,

    /// The response body did not have the expected shape
    #[error("unexpected response from the task server: {0}")]
    Decode(String),

    /// Token storage failed
    #[error("token storage: {0}")]
    Storage(#[from] StorageError),

    /// Invalid client configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Whether this error means the user has to log in (again).
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::NotAuthenticated)
    }
}

/// Pass 2xx responses through; turn anything else into an error carrying
/// the server's explanation.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        return Err(ApiError::Server {
            status: status.as_u16(),
            body,
        });
    }

    Err(ApiError::Rejected {
        status: status.as_u16(),
        detail: extract_detail(status, &body),
    })
}

/// Read a JSON response body.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await.map_err(ApiError::Transport)?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

/// The user-facing explanation in an error body.
///
/// Handles `{"detail": "..."}` and validation errors of the form
/// `{"detail": [{"msg": "..."}, ...]}`; falls back to the raw body.
pub(crate) fn extract_detail(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| match value.get("detail")? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                    .collect();
                (!messages.is_empty()).then(|| messages.join("; "))
            }
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        });

    match detail {
        Some(detail) => detail,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => format!("request rejected ({})", status),
    }
}
