//! Authentication calls against the backend's `/api/auth` endpoints.

use tracing::{debug, info, warn};

use super::session::ClearScope;
use crate::api::{ApiRequest, Gateway, GatewayError};
use crate::models::{
    LoginInput, LoginResponse, RefreshRequest, RefreshResponse, RegisterInput, RegisterResponse,
    UserProfile,
};

const LOGIN_PATH: &str = "/api/auth/login";
const REGISTER_PATH: &str = "/api/auth/register";
const LOGOUT_PATH: &str = "/api/auth/logout";
const ME_PATH: &str = "/api/auth/me";
const REFRESH_PATH: &str = "/api/auth/refresh";

#[derive(Clone)]
pub struct AuthService {
    gateway: Gateway,
}

impl AuthService {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Log in and store the returned tokens
    pub async fn login(&self, input: &LoginInput) -> Result<LoginResponse, GatewayError> {
        let response: LoginResponse = self.gateway.post_json(LOGIN_PATH, input).await?;
        self.gateway
            .session()
            .store_tokens(&response.access_token, response.refresh_token.as_deref())?;
        info!(user = %response.user.username, "Logged in");
        Ok(response)
    }

    pub async fn register(&self, input: &RegisterInput) -> Result<RegisterResponse, GatewayError> {
        self.gateway.post_json(REGISTER_PATH, input).await
    }

    /// Tell the backend we are leaving, then drop local tokens whatever it answered
    pub async fn logout(&self) -> Result<(), GatewayError> {
        let result = self
            .gateway
            .send(ApiRequest::post(LOGOUT_PATH))
            .await
            .and_then(|r| r.error_for_status());
        self.gateway.session().clear(ClearScope::AccessAndRefresh);

        match result {
            Ok(_) => {
                info!("Logged out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Logout request failed, local session cleared anyway");
                Err(e)
            }
        }
    }

    pub async fn current_user(&self) -> Result<UserProfile, GatewayError> {
        self.gateway.get_json(ME_PATH).await
    }

    /// Exchange the stored refresh token for a new access token
    pub async fn refresh_token(&self) -> Result<RefreshResponse, GatewayError> {
        let refresh_token = self.gateway.session().refresh_token().ok_or_else(|| {
            GatewayError::RequestConstruction("No refresh token available".to_string())
        })?;

        let response: RefreshResponse = self
            .gateway
            .post_json(REFRESH_PATH, &RefreshRequest { refresh_token })
            .await?;
        self.gateway.session().set_access_token(&response.access_token)?;
        debug!("Access token refreshed");
        Ok(response)
    }

    pub fn is_authenticated(&self) -> bool {
        self.gateway.session().is_authenticated()
    }

    pub fn token(&self) -> Option<String> {
        self.gateway.session().access_token()
    }
}
