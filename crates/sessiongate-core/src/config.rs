//! Gateway configuration.
//!
//! The backend origin and the request policy are read from the environment once at
//! startup. Every setting has a default suitable for local development, so an empty
//! environment yields a working configuration pointed at `http://localhost:4000`.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;

/// Environment variable holding the backend base origin
pub const API_URL_ENV: &str = "SESSIONGATE_API_URL";

/// Environment variable holding the request timeout in seconds
pub const TIMEOUT_ENV: &str = "SESSIONGATE_TIMEOUT_SECS";

/// Environment variable controlling refresh-token cleanup on 401
pub const CLEAR_REFRESH_ENV: &str = "SESSIONGATE_CLEAR_REFRESH_ON_401";

/// Environment variable holding the login entry point
pub const LOGIN_PATH_ENV: &str = "SESSIONGATE_LOGIN_PATH";

/// Local development backend
pub const DEFAULT_API_URL: &str = "http://localhost:4000";

/// Upper bound on a single round trip.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Login entry point used for session-expired redirects
pub const DEFAULT_LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: Url,
    pub timeout: Duration,
    /// Also delete the refresh token when the backend rejects the access token
    pub clear_refresh_on_unauthorized: bool,
    pub login_path: String,
}

impl GatewayConfig {
    /// Build a configuration for a base origin with the default request policy
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            clear_refresh_on_unauthorized: true,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
        }
    }

    /// Build a configuration from a base origin string, other settings defaulted
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self::new(parse_base_url(base_url)?))
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    /// Unset or blank variables fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let base_url = get(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut config = Self::new(
            parse_base_url(&base_url).with_context(|| format!("Invalid {}", API_URL_ENV))?,
        );

        if let Some(secs) = get(TIMEOUT_ENV) {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", TIMEOUT_ENV))?;
            if secs == 0 {
                anyhow::bail!("{} must be greater than zero", TIMEOUT_ENV);
            }
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(flag) = get(CLEAR_REFRESH_ENV) {
            config.clear_refresh_on_unauthorized = parse_flag(&flag)
                .with_context(|| format!("{} must be true or false", CLEAR_REFRESH_ENV))?;
        }

        if let Some(path) = get(LOGIN_PATH_ENV) {
            if !path.starts_with('/') {
                anyhow::bail!("{} must start with '/'", LOGIN_PATH_ENV);
            }
            config.login_path = path;
        }

        Ok(config)
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("Failed to parse base URL '{}'", raw))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow::anyhow!("Unsupported URL scheme '{}'", other)),
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!("unrecognised flag value '{}'", raw)),
    }
}
