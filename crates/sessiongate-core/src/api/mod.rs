//! Backend API access.
//!
//! This module provides the session-aware `Gateway` through which every call to the
//! backend is sent, the request/response types it exchanges with callers, and the
//! `Transport` seam it dispatches over.
//!
//! The backend authenticates requests with a bearer token in the `Authorization`
//! header; a 401 answer means the token is no longer valid.

pub mod error;
pub mod gateway;
pub mod request;
pub mod response;
pub mod transport;

pub use reqwest::Method;

pub use error::{ErrorDetails, GatewayError};
pub use gateway::Gateway;
pub use request::ApiRequest;
pub use response::ApiResponse;
pub use transport::{
    HttpTransport, PreparedRequest, RawResponse, Transport, TransportError, TransportErrorKind,
};
