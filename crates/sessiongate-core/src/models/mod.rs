//! Data models for backend request and response payloads.
//!
//! - `auth`: Login, registration, refresh and user profile payloads

pub mod auth;

pub use auth::{
    LoginInput, LoginResponse, RefreshRequest, RefreshResponse, RegisterInput, RegisterResponse,
    User, UserProfile,
};
