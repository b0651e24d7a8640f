//! Session-aware request gateway.
//!
//! Every outbound call goes through `Gateway::send`, which attaches the stored access
//! token and applies the session reset when the backend answers 401. The gateway
//! observes the session but does not own it: login writes tokens through the
//! `Session`, and the only transition the gateway makes is back to unauthenticated.

use std::sync::Arc;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::request::ApiRequest;
use super::response::ApiResponse;
use super::transport::{HttpTransport, PreparedRequest, Transport, TransportError};
use super::GatewayError;
use crate::auth::{ClearScope, Session};
use crate::config::GatewayConfig;
use crate::navigator::{LoginRedirect, Navigator};

/// Clone is cheap - all collaborators are shared behind Arc.
#[derive(Clone)]
pub struct Gateway {
    config: Arc<GatewayConfig>,
    session: Session,
    transport: Arc<dyn Transport>,
    navigator: Arc<dyn Navigator>,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        session: Session,
        transport: Arc<dyn Transport>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            session,
            transport,
            navigator,
        }
    }

    /// Gateway over HTTP, with the transport timeout taken from the config.
    /// Fails only when the HTTP client itself cannot be set up.
    pub fn with_http(
        config: GatewayConfig,
        session: Session,
        navigator: Arc<dyn Navigator>,
    ) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self::new(config, session, Arc::new(transport), navigator))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Send a request to the backend.
    ///
    /// Every status except 401 comes back as `Ok`, including 4xx and 5xx. A 401 clears
    /// the stored credential, redirects the host to login when it is not already there,
    /// and is returned as `AuthenticationFailure`.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        let token = self.session.access_token();
        let method = request.method.clone();
        let path = request.path.clone();
        let prepared = self.prepare(request, token.as_deref())?;

        debug!(%method, %path, authenticated = token.is_some(), "Sending request");

        let outcome =
            tokio::time::timeout(self.config.timeout, self.transport.execute(prepared)).await;
        let raw = match outcome {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(%method, %path, error = %e, "Request failed without a response");
                return Err(e.into());
            }
            Err(_) => {
                let e = TransportError::timeout(self.config.timeout);
                warn!(%method, %path, error = %e, "Request timed out");
                return Err(e.into());
            }
        };

        if raw.status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized(token.as_deref());
            let body = String::from_utf8_lossy(&raw.body).into_owned();
            return Err(GatewayError::AuthenticationFailure { body });
        }

        if !raw.status.is_success() {
            debug!(%method, %path, status = raw.status.as_u16(), "Passing through error status");
        }
        Ok(raw.into())
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, GatewayError> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post<B>(&self, path: &str, body: &B) -> Result<ApiResponse, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::post(path).json(body)).await
    }

    pub async fn put<B>(&self, path: &str, body: &B) -> Result<ApiResponse, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::put(path).json(body)).await
    }

    pub async fn patch<B>(&self, path: &str, body: &B) -> Result<ApiResponse, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::patch(path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, GatewayError> {
        self.send(ApiRequest::delete(path)).await
    }

    /// GET and decode a 2xx JSON body. Non-2xx statuses become `Application` errors.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        self.get(path).await?.error_for_status()?.json()
    }

    /// POST a JSON body and decode a 2xx JSON body
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.post(path, body).await?.error_for_status()?.json()
    }

    fn prepare(
        &self,
        request: ApiRequest,
        token: Option<&str>,
    ) -> Result<PreparedRequest, GatewayError> {
        if let Some(err) = request.error {
            return Err(GatewayError::RequestConstruction(err));
        }

        let url = self.resolve(&request.path)?;

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                GatewayError::RequestConstruction(format!("invalid header name '{}'", name))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                GatewayError::RequestConstruction(format!("invalid value for header '{}'", name))
            })?;
            headers.insert(header_name, header_value);
        }

        // The stored credential wins over any caller-supplied Authorization
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                GatewayError::RequestConstruction(
                    "stored access token is not a valid header value".to_string(),
                )
            })?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let body = request
            .body
            .map(|b| serde_json::to_vec(&b))
            .transpose()
            .map_err(|e| {
                GatewayError::RequestConstruction(format!("body is not serializable: {}", e))
            })?;

        Ok(PreparedRequest {
            method: request.method,
            url,
            headers,
            body,
        })
    }

    /// Join a path onto the base origin. Paths must be origin-relative.
    fn resolve(&self, path: &str) -> Result<Url, GatewayError> {
        if !path.starts_with('/') || path.starts_with("//") {
            return Err(GatewayError::RequestConstruction(format!(
                "path '{}' must be relative to the base origin and start with '/'",
                path
            )));
        }
        let base = self.config.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{}{}", base, path)).map_err(|e| {
            GatewayError::RequestConstruction(format!("invalid URL for '{}': {}", path, e))
        })
    }

    fn handle_unauthorized(&self, sent_token: Option<&str>) {
        let scope = if self.config.clear_refresh_on_unauthorized {
            ClearScope::AccessAndRefresh
        } else {
            ClearScope::AccessOnly
        };

        // A login that happened while this request was in flight is not ours to undo.
        // The compare and the removal happen under one store lock.
        if !self.session.clear_if_current(sent_token, scope) {
            info!("Rejected credential was already replaced, keeping current session");
            return;
        }

        let redirect = LoginRedirect::session_expired(&self.config.login_path);
        match self.navigator.current_path() {
            None => debug!("No navigable surface, skipping login redirect"),
            Some(location) if redirect.is_at_login(&location) => {
                debug!(%location, "Already at login, skipping redirect");
            }
            Some(location) => {
                info!(from = %location, to = %redirect, "Session expired, redirecting to login");
                self.navigator.redirect_to_login(&redirect);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::api::transport::{RawResponse, TransportErrorKind};
    use crate::auth::{CredentialStore, MemoryStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
    use crate::navigator::{MemoryNavigator, NoopNavigator};

    /// Replies to every request with the same scripted outcome
    struct FakeTransport {
        reply: Result<(u16, String), TransportErrorKind>,
        delay: Option<Duration>,
        seen: Mutex<Vec<PreparedRequest>>,
        // Runs after the request is recorded, before replying
        on_dispatch: Option<Box<dyn Fn() + Send + Sync>>,
    }

    impl FakeTransport {
        fn status(status: u16, body: &str) -> Self {
            Self {
                reply: Ok((status, body.to_string())),
                delay: None,
                seen: Mutex::new(Vec::new()),
                on_dispatch: None,
            }
        }

        fn failing(kind: TransportErrorKind) -> Self {
            Self {
                reply: Err(kind),
                ..Self::status(200, "")
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn authorization_headers(&self) -> Vec<Option<String>> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|r| {
                    r.headers
                        .get(header::AUTHORIZATION)
                        .map(|v| v.to_str().unwrap().to_string())
                })
                .collect()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn execute(&self, request: PreparedRequest) -> Result<RawResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            if let Some(hook) = &self.on_dispatch {
                hook();
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok((status, body)) => Ok(RawResponse {
                    status: StatusCode::from_u16(*status).unwrap(),
                    headers: HeaderMap::new(),
                    body: body.as_bytes().to_vec(),
                }),
                Err(kind) => Err(TransportError::new(*kind, "simulated")),
            }
        }
    }

    struct Harness {
        gateway: Gateway,
        store: Arc<MemoryStore>,
        transport: Arc<FakeTransport>,
        navigator: Arc<MemoryNavigator>,
    }

    fn harness(transport: FakeTransport, token: Option<&str>, location: &str) -> Harness {
        let config = GatewayConfig::with_base_url("http://backend.test").unwrap();
        harness_with(transport, token, location, config)
    }

    fn harness_with(
        transport: FakeTransport,
        token: Option<&str>,
        location: &str,
        config: GatewayConfig,
    ) -> Harness {
        let store = Arc::new(MemoryStore::new());
        if let Some(token) = token {
            store.set(ACCESS_TOKEN_KEY, token).unwrap();
            store.set(REFRESH_TOKEN_KEY, "refresh-1").unwrap();
        }
        let transport = Arc::new(transport);
        let navigator = Arc::new(MemoryNavigator::at(location));
        let gateway = Gateway::new(
            config,
            Session::new(store.clone()),
            transport.clone(),
            navigator.clone(),
        );
        Harness {
            gateway,
            store,
            transport,
            navigator,
        }
    }

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let h = harness(FakeTransport::status(200, "{}"), Some("tok123"), "/profile");
        h.gateway.get("/api/profile").await.unwrap();

        assert_eq!(h.transport.authorization_headers(), vec![Some("Bearer tok123".to_string())]);
        let seen = h.transport.seen.lock().unwrap();
        assert_eq!(seen[0].url.as_str(), "http://backend.test/api/profile");
        assert_eq!(
            seen[0].headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_no_token_no_authorization_header() {
        let h = harness(FakeTransport::status(200, "{}"), None, "/");
        h.gateway.get("/api/public").await.unwrap();
        assert_eq!(h.transport.authorization_headers(), vec![None]);
    }

    #[tokio::test]
    async fn test_stored_token_overrides_caller_authorization() {
        let h = harness(FakeTransport::status(200, "{}"), Some("tok123"), "/");
        h.gateway
            .send(ApiRequest::get("/api/profile").header("Authorization", "Bearer forged"))
            .await
            .unwrap();
        assert_eq!(h.transport.authorization_headers(), vec![Some("Bearer tok123".to_string())]);
    }

    #[tokio::test]
    async fn test_unauthorized_clears_and_redirects() {
        let h = harness(
            FakeTransport::status(401, r#"{"message":"unauthorized"}"#),
            Some("tok123"),
            "/dashboard",
        );

        let err = h.gateway.get("/api/profile").await.unwrap_err();
        match &err {
            GatewayError::AuthenticationFailure { body } => assert!(body.contains("unauthorized")),
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(h.store.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(h.store.get(REFRESH_TOKEN_KEY).unwrap(), None);
        assert_eq!(
            h.navigator.current_path().as_deref(),
            Some("/login?expired=true")
        );

        // Next call goes out without a credential
        let _ = h.gateway.get("/api/profile").await;
        assert_eq!(
            h.transport.authorization_headers(),
            vec![Some("Bearer tok123".to_string()), None]
        );
        // Already on the login page, so no second redirect
        assert_eq!(h.navigator.redirects().len(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_at_login_does_not_redirect() {
        let h = harness(FakeTransport::status(401, ""), Some("tok123"), "/login");
        let err = h.gateway.get("/api/profile").await.unwrap_err();
        assert!(err.is_auth_failure());
        assert!(h.navigator.redirects().is_empty());
        assert_eq!(h.store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh_cleanup_is_configurable() {
        let mut config = GatewayConfig::with_base_url("http://backend.test").unwrap();
        config.clear_refresh_on_unauthorized = false;
        let h = harness_with(FakeTransport::status(401, ""), Some("tok123"), "/", config);

        let _ = h.gateway.get("/api/profile").await;
        assert_eq!(h.store.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(h.store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_no_surface_still_clears() {
        let store = Arc::new(MemoryStore::with_access_token("tok123"));
        let gateway = Gateway::new(
            GatewayConfig::with_base_url("http://backend.test").unwrap(),
            Session::new(store.clone()),
            Arc::new(FakeTransport::status(401, "")),
            Arc::new(NoopNavigator),
        );
        assert!(gateway.get("/x").await.unwrap_err().is_auth_failure());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_credential() {
        let h = harness(
            FakeTransport::failing(TransportErrorKind::Connect),
            Some("tok123"),
            "/dashboard",
        );
        let err = h.gateway.get("/api/profile").await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(h.store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("tok123"));
        assert!(h.navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_transport_failure() {
        let mut config = GatewayConfig::with_base_url("http://backend.test").unwrap();
        config.timeout = Duration::from_millis(20);
        let h = harness_with(
            FakeTransport::status(401, "").delayed(Duration::from_millis(500)),
            Some("tok123"),
            "/dashboard",
            config,
        );

        match h.gateway.get("/api/profile").await.unwrap_err() {
            GatewayError::Transport(e) => assert!(e.is_timeout()),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(h.store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("tok123"));
        assert!(h.navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_error_statuses_pass_through() {
        for status in [403u16, 404, 500] {
            let h = harness(FakeTransport::status(status, "server says no"), Some("tok123"), "/");
            let response = h.gateway.get("/api/admin").await.unwrap();
            assert_eq!(response.status().as_u16(), status);
            assert_eq!(response.text(), "server says no");
            assert_eq!(h.store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("tok123"));
        }
    }

    #[tokio::test]
    async fn test_get_json_maps_error_status() {
        let h = harness(FakeTransport::status(500, "oops"), None, "/");
        let err = h.gateway.get_json::<serde_json::Value>("/api/x").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_bad_requests_are_never_dispatched() {
        let h = harness(FakeTransport::status(200, "{}"), Some("tok123"), "/");

        for path in ["", "api/profile", "//evil.test/x", "http://evil.test/x"] {
            let err = h.gateway.get(path).await.unwrap_err();
            assert!(matches!(err, GatewayError::RequestConstruction(_)), "{}", path);
        }

        let err = h
            .gateway
            .send(ApiRequest::get("/ok").header("bad header", "v"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::RequestConstruction(_)));

        let err = h
            .gateway
            .send(ApiRequest::get("/ok").header("X-Ok", "line\nbreak"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::RequestConstruction(_)));

        assert!(h.transport.seen.lock().unwrap().is_empty());
        assert_eq!(h.store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("tok123"));
    }

    #[tokio::test]
    async fn test_base_path_is_kept() {
        let config = GatewayConfig::with_base_url("http://backend.test/v1/").unwrap();
        let h = harness_with(FakeTransport::status(200, "{}"), None, "/", config);
        h.gateway.get("/users?page=2").await.unwrap();
        let seen = h.transport.seen.lock().unwrap();
        assert_eq!(seen[0].url.as_str(), "http://backend.test/v1/users?page=2");
    }

    #[tokio::test]
    async fn test_stale_unauthorized_keeps_newer_login() {
        let store = Arc::new(MemoryStore::with_access_token("old"));
        let relogin = store.clone();
        let transport = FakeTransport {
            on_dispatch: Some(Box::new(move || {
                relogin.set(ACCESS_TOKEN_KEY, "new").unwrap();
            })),
            ..FakeTransport::status(401, "")
        };
        let navigator = Arc::new(MemoryNavigator::at("/dashboard"));
        let gateway = Gateway::new(
            GatewayConfig::with_base_url("http://backend.test").unwrap(),
            Session::new(store.clone()),
            Arc::new(transport),
            navigator.clone(),
        );

        assert!(gateway.get("/x").await.unwrap_err().is_auth_failure());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("new"));
        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_call_has_no_side_effects() {
        let h = harness(
            FakeTransport::status(401, "").delayed(Duration::from_millis(200)),
            Some("tok123"),
            "/dashboard",
        );

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), h.gateway.get("/api/profile")).await;
        assert!(abandoned.is_err());

        // Give the dropped transport future time it would have needed to finish
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(h.store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("tok123"));
        assert!(h.navigator.redirects().is_empty());
    }
}
