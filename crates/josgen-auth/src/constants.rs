//! Storage keys and auth endpoint paths
//!
//! The storage key names are shared with the browser client, so a token file
//! written by one can be read by the other.

/// Storage key for the current access token
pub const ACCESS_TOKEN_KEY: &str = "josgen_auth_token";

/// Storage key for the current refresh token
pub const REFRESH_TOKEN_KEY: &str = "josgen_refresh_token";

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const ME_PATH: &str = "/auth/me";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const CHANGE_PASSWORD_PATH: &str = "/auth/change-password";
pub const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";
pub const RESET_PASSWORD_PATH: &str = "/auth/reset-password";
pub const UPDATE_PROFILE_PATH: &str = "/auth/update-profile";

/// Endpoints that never carry an Authorization header and never enter the
/// 401 refresh flow.
pub const SKIP_AUTH_PATHS: &[&str] = &[
    LOGIN_PATH,
    REGISTER_PATH,
    REFRESH_PATH,
    FORGOT_PASSWORD_PATH,
    RESET_PASSWORD_PATH,
];

/// Client-side route the user is sent to once the session is unrecoverable.
pub const LOGIN_ROUTE: &str = "/login";
