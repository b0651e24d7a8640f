use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use super::credentials::{CredentialStore, StoreError, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

/// Authentication state, derived from the store on every query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unauthenticated => write!(f, "unauthenticated"),
            SessionState::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// Which tokens a session reset removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    AccessOnly,
    AccessAndRefresh,
}

/// View of the stored credentials.
///
/// Holds no token state of its own, so there is a single source of truth. Clone is
/// cheap and every clone observes the same store.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn CredentialStore>,
}

impl Session {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Current access token. A failing store reads as "no token".
    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    pub fn state(&self) -> SessionState {
        if self.access_token().is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// Record the tokens from a successful login.
    /// Without a new refresh token any previous one is dropped.
    ///
    /// The access token is written last, so an `Err` never leaves the new session
    /// authenticated.
    pub fn store_tokens(&self, access: &str, refresh: Option<&str>) -> Result<(), StoreError> {
        match refresh {
            Some(refresh) => self.store.set(REFRESH_TOKEN_KEY, refresh)?,
            None => self.store.remove(REFRESH_TOKEN_KEY)?,
        }
        if let Err(e) = self.store.set(ACCESS_TOKEN_KEY, access) {
            // Half a login is no login: drop whatever access token is left over
            if let Err(cleanup) = self.store.remove(ACCESS_TOKEN_KEY) {
                warn!(error = %cleanup, "Failed to remove access token after failed login write");
            }
            return Err(e);
        }
        info!("Session established");
        Ok(())
    }

    /// Replace the access token, keeping the refresh token
    pub fn set_access_token(&self, access: &str) -> Result<(), StoreError> {
        self.store.set(ACCESS_TOKEN_KEY, access)
    }

    /// Remove stored tokens. Storage failures are logged, not returned.
    pub fn clear(&self, scope: ClearScope) {
        if let Err(e) = self.store.remove(ACCESS_TOKEN_KEY) {
            warn!(error = %e, "Failed to remove access token");
        }
        if scope == ClearScope::AccessAndRefresh {
            if let Err(e) = self.store.remove(REFRESH_TOKEN_KEY) {
                warn!(error = %e, "Failed to remove refresh token");
            }
        }
        info!(?scope, "Session cleared");
    }

    /// Reset the session only if the stored access token is still `rejected` (or
    /// absent). Returns `false` when a different token has replaced it, in which case
    /// nothing is removed.
    pub fn clear_if_current(&self, rejected: Option<&str>, scope: ClearScope) -> bool {
        match self.store.remove_if_current(ACCESS_TOKEN_KEY, rejected) {
            Ok(false) => return false,
            Ok(true) => {}
            Err(e) => warn!(error = %e, "Failed to remove access token"),
        }
        if scope == ClearScope::AccessAndRefresh {
            if let Err(e) = self.store.remove(REFRESH_TOKEN_KEY) {
                warn!(error = %e, "Failed to remove refresh token");
            }
        }
        info!(?scope, "Session cleared");
        true
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "Credential store unavailable, treating as unauthenticated");
                None
            }
        }
    }
}
