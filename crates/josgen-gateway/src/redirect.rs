//! Login redirect hook

use josgen_auth::LOGIN_ROUTE;
use tracing::warn;

/// Called once per unrecoverable session (no refresh token, or the refresh
/// call failed), after the stored tokens have been cleared.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self);
}

/// Logs the redirect; for headless callers with no login screen to show.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRedirect;

impl LoginRedirect for LogRedirect {
    fn redirect_to_login(&self) {
        warn!(route = LOGIN_ROUTE, "session ended, login required");
    }
}

impl<F> LoginRedirect for F
where
    F: Fn() + Send + Sync,
{
    fn redirect_to_login(&self) {
        self()
    }
}
