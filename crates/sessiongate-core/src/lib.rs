//! Core library for sessiongate.
//!
//! This crate provides the session-aware API gateway, credential storage and auth
//! service used by the sessiongate front end. All backend traffic goes through
//! [`api::Gateway`], which attaches the stored bearer token and resets the session
//! when the backend rejects it.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod navigator;

pub use api::{ApiRequest, ApiResponse, Gateway, GatewayError};
pub use auth::{AuthService, Session, SessionState};
pub use config::GatewayConfig;
pub use navigator::{LoginRedirect, MemoryNavigator, Navigator, NoopNavigator};
