//! Navigation capability used to send the host back to the login entry point.
//!
//! The gateway never navigates on its own. It asks an injected `Navigator` where the
//! host currently is and, when the session has been rejected, asks it to redirect.
//! Hosts without a navigable surface (tests, background tasks) use `NoopNavigator`.

use std::fmt;
use std::sync::Mutex;

use tracing::debug;

/// Why the host is being sent to the login entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    SessionExpired,
}

/// A redirect to the login entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub login_path: String,
    pub reason: RedirectReason,
}

impl LoginRedirect {
    pub fn session_expired(login_path: &str) -> Self {
        Self {
            login_path: login_path.to_string(),
            reason: RedirectReason::SessionExpired,
        }
    }

    /// Full navigation target, e.g. `/login?expired=true`
    pub fn target(&self) -> String {
        match self.reason {
            RedirectReason::SessionExpired => format!("{}?expired=true", self.login_path),
        }
    }

    /// True when `location` is already the login entry point, ignoring query and fragment
    pub fn is_at_login(&self, location: &str) -> bool {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or(location);
        path.trim_end_matches('/') == self.login_path.trim_end_matches('/')
    }
}

impl fmt::Display for LoginRedirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target())
    }
}

pub trait Navigator: Send + Sync {
    /// Current location of the host, or `None` when there is nothing to navigate
    fn current_path(&self) -> Option<String>;

    fn redirect_to_login(&self, redirect: &LoginRedirect);
}

/// Navigator for contexts with no navigable surface
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn current_path(&self) -> Option<String> {
        None
    }

    fn redirect_to_login(&self, _redirect: &LoginRedirect) {}
}

/// Navigator that tracks a location in memory and records every redirect.
///
/// A redirect moves the current location to the redirect target, so a second
/// rejection while "on" the login page is suppressed by the gateway's loop guard.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    inner: Mutex<NavigatorState>,
}

#[derive(Debug, Default)]
struct NavigatorState {
    location: Option<String>,
    redirects: Vec<LoginRedirect>,
}

impl MemoryNavigator {
    pub fn at(location: &str) -> Self {
        let navigator = Self::default();
        navigator.navigate(location);
        navigator
    }

    /// Move to a new location, as the host would on user navigation
    pub fn navigate(&self, location: &str) {
        if let Ok(mut state) = self.inner.lock() {
            state.location = Some(location.to_string());
        }
    }

    pub fn redirects(&self) -> Vec<LoginRedirect> {
        self.inner
            .lock()
            .map(|state| state.redirects.clone())
            .unwrap_or_default()
    }

    pub fn last_redirect(&self) -> Option<LoginRedirect> {
        self.redirects().pop()
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|state| state.location.clone())
    }

    fn redirect_to_login(&self, redirect: &LoginRedirect) {
        if let Ok(mut state) = self.inner.lock() {
            debug!(from = ?state.location, to = %redirect, "Redirecting to login");
            state.location = Some(redirect.target());
            state.redirects.push(redirect.clone());
        }
    }
}
