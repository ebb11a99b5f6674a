//! Auth endpoints
//!
//! Login and register store the returned token pair; logout clears it even
//! when the backend call fails. The password endpoints only report the
//! backend's message.

use josgen_auth::{
    CHANGE_PASSWORD_PATH, FORGOT_PASSWORD_PATH, LOGIN_PATH, LOGOUT_PATH, ME_PATH, REGISTER_PATH,
    RESET_PASSWORD_PATH, TokenPair, UPDATE_PROFILE_PATH,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::assets::resolve_storage_url;
use crate::error::Result;
use crate::gateway::AuthGateway;
use crate::request::ApiRequest;

/// Account as returned by the auth endpoints.
///
/// Fields beyond the common ones (division, role, phone, ...) are kept in
/// `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn avatar_url(&self, storage_base: &str) -> Option<String> {
        self.avatar
            .as_deref()
            .and_then(|path| resolve_storage_url(storage_base, path))
    }
}

/// `data` of a login or register response.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// `data` of `/auth/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct MeResponse {
    pub user: User,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Serialize)]
pub struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub remember: bool,
}

#[derive(Serialize)]
pub struct Registration<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub password_confirmation: &'a str,
}

#[derive(Serialize)]
pub struct PasswordChange<'a> {
    pub current_password: &'a str,
    pub password: &'a str,
    pub password_confirmation: &'a str,
}

#[derive(Serialize)]
pub struct PasswordReset<'a> {
    pub token: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub password_confirmation: &'a str,
}

/// Profile fields to change; unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl AuthGateway {
    pub async fn login(&self, credentials: &Credentials<'_>) -> Result<AuthSession> {
        let session: AuthSession = self.post(LOGIN_PATH, credentials).await?;
        self.tokens().set_tokens(&session.tokens);
        info!(email = %session.user.email, "logged in");
        Ok(session)
    }

    pub async fn register(&self, registration: &Registration<'_>) -> Result<AuthSession> {
        let session: AuthSession = self.post(REGISTER_PATH, registration).await?;
        self.tokens().set_tokens(&session.tokens);
        info!(email = %session.user.email, "registered");
        Ok(session)
    }

    pub async fn me(&self) -> Result<MeResponse> {
        self.post(ME_PATH, &json!({})).await
    }

    /// Tell the backend the session is over, then clear local tokens
    /// regardless of the outcome. The backend's error, if any, is returned
    /// after the tokens are gone.
    pub async fn logout(&self) -> Result<()> {
        let result = if self.is_authenticated() {
            match ApiRequest::post(LOGOUT_PATH).json(&json!({})) {
                Ok(request) => self.send(request).await.map(|_| ()),
                Err(e) => Err(e),
            }
        } else {
            Ok(())
        };

        self.tokens().clear_tokens();
        match &result {
            Ok(()) => info!("logged out"),
            Err(e) => warn!(error = %e, "logout request failed, local session cleared anyway"),
        }
        result
    }

    pub async fn change_password(&self, change: &PasswordChange<'_>) -> Result<Option<String>> {
        self.acknowledged(CHANGE_PASSWORD_PATH, change).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<Option<String>> {
        self.acknowledged(FORGOT_PASSWORD_PATH, &json!({ "email": email }))
            .await
    }

    pub async fn reset_password(&self, reset: &PasswordReset<'_>) -> Result<Option<String>> {
        self.acknowledged(RESET_PASSWORD_PATH, reset).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Option<String>> {
        self.acknowledged(UPDATE_PROFILE_PATH, update).await
    }

    async fn acknowledged<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<String>> {
        let envelope = self.envelope(ApiRequest::post(path).json(body)?).await?;
        Ok(envelope.message)
    }
}
