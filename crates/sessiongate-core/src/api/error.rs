use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::transport::TransportError;
use crate::auth::StoreError;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// No response was obtained (connect, DNS, timeout)
    #[error("Network error: {0}")]
    Transport(#[from] TransportError),

    /// The backend rejected the credential (401)
    #[error("Unauthorized - session expired")]
    AuthenticationFailure { body: String },

    /// The request could not be built; nothing was sent
    #[error("Invalid request: {0}")]
    RequestConstruction(String),

    /// Any other non-2xx status, body kept verbatim
    #[error("Request failed with status {status}: {}", truncate_body(.body))]
    Application { status: StatusCode, body: String },

    /// A 2xx response whose body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to store credentials: {0}")]
    Storage(#[from] StoreError),
}

/// Maximum length for response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
}

/// Error payload in the backend's JSON error shape.
///
/// Validation failures carry `message` as a list of strings; those are joined with
/// `"; "`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(deserialize_with = "deserialize_message")]
    pub message: String,
    #[serde(rename = "statusCode", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn deserialize_message<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Message {
        Text(String),
        List(Vec<String>),
    }

    Ok(match Message::deserialize(deserializer)? {
        Message::Text(text) => text,
        Message::List(items) => items.join("; "),
    })
}

impl GatewayError {
    /// Build the error for a non-success status
    pub fn from_status(status: StatusCode, body: String) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            GatewayError::AuthenticationFailure { body }
        } else {
            GatewayError::Application { status, body }
        }
    }

    /// HTTP status carried by the error, if a response was received
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::AuthenticationFailure { .. } => Some(StatusCode::UNAUTHORIZED),
            GatewayError::Application { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, GatewayError::AuthenticationFailure { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }

    /// Message suitable for display to a user.
    ///
    /// Prefers the backend's own `{message, statusCode, error}` body when it has one.
    pub fn details(&self) -> ErrorDetails {
        let body = match self {
            GatewayError::AuthenticationFailure { body }
            | GatewayError::Application { body, .. } => Some(body),
            _ => None,
        };

        if let Some(parsed) = body.and_then(|b| serde_json::from_str::<ErrorDetails>(b).ok()) {
            return ErrorDetails {
                status_code: parsed.status_code.or_else(|| self.status().map(|s| s.as_u16())),
                ..parsed
            };
        }

        ErrorDetails {
            message: self.to_string(),
            status_code: self.status().map(|s| s.as_u16()),
            error: None,
        }
    }
}
