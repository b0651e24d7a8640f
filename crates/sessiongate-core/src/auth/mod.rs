//! Authentication module for managing sessions and stored credentials.
//!
//! This module provides:
//! - `CredentialStore`: Pluggable token storage (memory, JSON file, OS keychain)
//! - `Session`: Authentication state derived from the stored access token
//! - `AuthService`: Login, logout, registration and token refresh against the backend

pub mod credentials;
pub mod service;
pub mod session;

pub use credentials::{
    CredentialStore, FileStore, KeyringStore, MemoryStore, StoreError, ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
};
pub use service::AuthService;
pub use session::{ClearScope, Session, SessionState};
