//! Subcommand implementations.

use anyhow::{Context, Result};
use sessiongate_core::api::Method;
use sessiongate_core::models::{LoginInput, RegisterInput};
use sessiongate_core::{ApiRequest, AuthService, GatewayError};

use crate::config::Config;

/// Turn a gateway failure into the message shown to the user
pub fn describe(err: &GatewayError) -> String {
    match err {
        GatewayError::AuthenticationFailure { .. } => {
            "Session expired or not logged in".to_string()
        }
        GatewayError::Transport(e) => format!("Network unavailable ({})", e),
        GatewayError::RequestConstruction(msg) => format!("Invalid request: {}", msg),
        other => other.details().message,
    }
}

fn fail(err: GatewayError) -> anyhow::Error {
    anyhow::anyhow!(describe(&err))
}

fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("Failed to read password")
}

pub async fn login(auth: &AuthService, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => anyhow::bail!("No email given; pass --email"),
    };
    let password = prompt_password(&format!("Password for {}: ", email))?;

    let response = auth
        .login(&LoginInput {
            email: email.clone(),
            password,
        })
        .await
        .map_err(fail)?;

    config.last_email = Some(email);
    if let Err(e) = config.save() {
        tracing::warn!(error = %e, "Failed to save config");
    }

    println!("Logged in as {}", response.user.username);
    Ok(())
}

pub async fn register(auth: &AuthService, email: String, username: String) -> Result<()> {
    let password = prompt_password("Password: ")?;
    let confirm_password = prompt_password("Confirm password: ")?;
    if password != confirm_password {
        anyhow::bail!("Passwords do not match");
    }

    let response = auth
        .register(&RegisterInput {
            email,
            username,
            password,
            confirm_password,
        })
        .await
        .map_err(fail)?;

    println!("{} ({})", response.message, response.user.username);
    Ok(())
}

pub async fn logout(auth: &AuthService) -> Result<()> {
    match auth.logout().await {
        Ok(()) => println!("Logged out"),
        // Local session is gone either way
        Err(e) => println!("Logged out locally ({})", describe(&e)),
    }
    Ok(())
}

pub async fn whoami(auth: &AuthService) -> Result<()> {
    let me = auth.current_user().await.map_err(fail)?;
    println!("{} <{}>", me.display_name(), me.email);
    println!("member since {}", me.created_at.format("%Y-%m-%d"));
    Ok(())
}

pub async fn refresh(auth: &AuthService) -> Result<()> {
    auth.refresh_token().await.map_err(fail)?;
    println!("Access token refreshed");
    Ok(())
}

pub fn status(auth: &AuthService) {
    let gateway = auth.gateway();
    println!("backend: {}", gateway.config().base_url);
    println!("session: {}", gateway.session().state());
}

pub async fn request(
    auth: &AuthService,
    method: &str,
    path: &str,
    data: Option<String>,
    headers: &[String],
) -> Result<()> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method '{}'", method))?;

    let mut request = ApiRequest::new(method, path);
    if let Some(data) = data {
        let body: serde_json::Value =
            serde_json::from_str(&data).context("--data must be valid JSON")?;
        request = request.json(&body);
    }
    for header in headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("Header '{}' must look like 'Name: value'", header))?;
        request = request.header(name.trim(), value.trim());
    }

    let response = auth.gateway().send(request).await.map_err(fail)?;
    eprintln!("HTTP {}", response.status());

    let text = response.text();
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
