use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::transport::RawResponse;
use super::GatewayError;

/// A backend response passed through the gateway. Status and body are untouched.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON regardless of status
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            GatewayError::InvalidResponse(format!(
                "Failed to parse JSON response (status {}): {}",
                self.status, e
            ))
        })
    }

    /// Turn a non-2xx response into `GatewayError::Application`
    pub fn error_for_status(self) -> Result<Self, GatewayError> {
        if self.is_success() {
            Ok(self)
        } else {
            let body = self.text();
            Err(GatewayError::from_status(self.status, body))
        }
    }
}

impl From<RawResponse> for ApiResponse {
    fn from(raw: RawResponse) -> Self {
        Self {
            status: raw.status,
            headers: raw.headers,
            body: raw.body,
        }
    }
}
