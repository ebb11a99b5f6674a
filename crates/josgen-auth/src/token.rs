//! Token pair issued by the backend

use serde::{Deserialize, Serialize};

/// Access/refresh token pair from a login, register or refresh response.
///
/// Only the two token strings are persisted. `token_type` and `expires_in`
/// are kept for callers that want to display them; expiry is never checked
/// client-side, the backend signals it with a 401.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: u64,
}

fn default_token_type() -> String {
    "bearer".into()
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: default_token_type(),
            expires_in: 0,
        }
    }
}
