//! Authenticated request gateway for the josgen API
//!
//! Wraps a `reqwest::Client` with the behaviour every API call needs:
//! bearer token injection, transparent refresh on 401 with a single shared
//! refresh call, forced logout when the session cannot be recovered, and
//! normalization of every failure into one human-readable `Error`.
//!
//! Request flow:
//! 1. `intercept::outbound_token()` picks the bearer token (skip-list aware)
//! 2. `AuthGateway::send()` dispatches; a 401 enters the refresh state machine
//! 3. `refresh` runs at most one `/auth/refresh` call and drains the queue
//! 4. Terminal failures become `Error` via `Error::from_response()`
//! 5. `Envelope` folds the `status`/`success` flag and extracts `data`

pub mod assets;
pub mod auth;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod intercept;
pub mod redirect;
mod refresh;
pub mod request;

#[cfg(test)]
mod mock;

pub use assets::resolve_storage_url;
pub use auth::{
    AuthSession, Credentials, MeResponse, PasswordChange, PasswordReset, ProfileUpdate,
    Registration, User,
};
pub use envelope::{Envelope, Page};
pub use error::{Error, Result};
pub use gateway::{AuthGateway, GatewayConfig};
pub use intercept::SkipList;
pub use redirect::{LogRedirect, LoginRedirect};
pub use request::ApiRequest;
