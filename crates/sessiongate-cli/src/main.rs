//! sessiongate - command-line client for the backend API.
//!
//! Logs in, keeps the session tokens in the chosen credential store, and sends
//! authenticated requests through the session-aware gateway.

mod commands;
mod config;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sessiongate_core::config::API_URL_ENV;
use sessiongate_core::{AuthService, Gateway, GatewayConfig, MemoryNavigator, Session};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::{Config, StoreBackend};

#[derive(Parser)]
#[command(name = "sessiongate", version, about = "Session-aware client for the backend API")]
struct Cli {
    /// Backend base URL (defaults to http://localhost:4000)
    #[arg(long, global = true, env = API_URL_ENV)]
    api_url: Option<String>,

    /// Credential storage backend (defaults to the saved choice)
    #[arg(long, value_enum, global = true)]
    store: Option<StoreBackend>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session tokens
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
    },
    /// End the session and forget the stored tokens
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Exchange the refresh token for a new access token
    Refresh,
    /// Show the backend and local session state
    Status,
    /// Send an arbitrary request to the backend
    Request {
        method: String,
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
        /// Extra header, e.g. -H 'X-Trace: 1'
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
}

impl Command {
    /// Location the host reports to the gateway while running this command
    fn location(&self) -> &'static str {
        match self {
            Command::Login { .. } | Command::Register { .. } => "/login",
            Command::Logout => "/logout",
            Command::Whoami => "/profile",
            Command::Refresh | Command::Status | Command::Request { .. } => "/",
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_default();
    if let Some(store) = cli.store {
        if store != config.store {
            config.store = store;
            config.save().context("Failed to save config")?;
        }
    }

    let mut gateway_config = GatewayConfig::from_env()?;
    if let Some(ref url) = cli.api_url {
        let overridden = GatewayConfig::with_base_url(url)?;
        gateway_config.base_url = overridden.base_url;
    }
    info!(backend = %gateway_config.base_url, store = ?config.store, "sessiongate starting");

    let session = Session::new(config.store.open()?);
    let navigator = Arc::new(MemoryNavigator::at(cli.command.location()));
    let gateway = Gateway::with_http(gateway_config, session, navigator.clone())?;
    let auth = AuthService::new(gateway);

    let result = match cli.command {
        Command::Login { email } => commands::login(&auth, &mut config, email).await,
        Command::Register { email, username } => commands::register(&auth, email, username).await,
        Command::Logout => commands::logout(&auth).await,
        Command::Whoami => commands::whoami(&auth).await,
        Command::Refresh => commands::refresh(&auth).await,
        Command::Status => {
            commands::status(&auth);
            Ok(())
        }
        Command::Request {
            method,
            path,
            data,
            headers,
        } => commands::request(&auth, &method, &path, data, &headers).await,
    };

    // The gateway asked the host to go to the login page
    if let Some(redirect) = navigator.last_redirect() {
        eprintln!("Session expired ({}). Run `sessiongate login` to sign in again.", redirect);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_flag_reads_environment() {
        temp_env::with_var(API_URL_ENV, Some("https://api.example.com"), || {
            let cli = Cli::try_parse_from(["sessiongate", "status"]).unwrap();
            assert_eq!(cli.api_url.as_deref(), Some("https://api.example.com"));
        });
    }

    #[test]
    fn test_api_url_flag_beats_environment() {
        temp_env::with_var(API_URL_ENV, Some("https://api.example.com"), || {
            let cli = Cli::try_parse_from([
                "sessiongate",
                "--api-url",
                "http://localhost:5000",
                "status",
            ])
            .unwrap();
            assert_eq!(cli.api_url.as_deref(), Some("http://localhost:5000"));
        });
    }

    #[test]
    fn test_api_url_absent_without_environment() {
        temp_env::with_var_unset(API_URL_ENV, || {
            let cli = Cli::try_parse_from(["sessiongate", "status"]).unwrap();
            assert!(cli.api_url.is_none());
        });
    }
}
