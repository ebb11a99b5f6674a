//! Refresh state machine
//!
//! States: idle (`refreshing == false`) and refreshing. The first 401 handler
//! to arrive while idle flips the flag and starts the one refresh call; every
//! handler, including that first one, parks a oneshot sender in `waiters`.
//! When the refresh settles the flag is cleared and the whole queue drained
//! with the same outcome, in insertion order. Nothing is ever resolved
//! partially.

use reqwest::header::ACCEPT;
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::{Error, Result};

/// New access token, or the error every waiter fails with.
pub(crate) type RefreshOutcome = Result<String>;

#[derive(Debug, Default)]
pub(crate) struct RefreshState {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// A place in the pending queue.
pub(crate) struct Ticket {
    /// True for the caller that must start the refresh
    pub(crate) leader: bool,
    pub(crate) outcome: oneshot::Receiver<RefreshOutcome>,
}

impl RefreshState {
    /// Queue for the in-flight refresh, starting one if idle.
    ///
    /// Check-and-set happens under the caller's lock with no await in between.
    pub(crate) fn join(&mut self) -> Ticket {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        let leader = !self.refreshing;
        self.refreshing = true;
        Ticket {
            leader,
            outcome: rx,
        }
    }

    /// Back to idle; returns the queue to drain.
    pub(crate) fn settle(&mut self) -> Vec<oneshot::Sender<RefreshOutcome>> {
        self.refreshing = false;
        std::mem::take(&mut self.waiters)
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        self.refreshing
    }
}

/// Resolve every waiter with the same outcome.
pub(crate) fn notify(waiters: Vec<oneshot::Sender<RefreshOutcome>>, outcome: &RefreshOutcome) {
    let count = waiters.len();
    for waiter in waiters {
        // A dropped receiver means that caller gave up; nothing to deliver
        let _ = waiter.send(outcome.clone());
    }
    debug!(waiters = count, ok = outcome.is_ok(), "refresh settled");
}

/// Tokens from a successful `/auth/refresh` call.
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshedTokens {
    pub(crate) access_token: String,
    #[serde(default)]
    pub(crate) refresh_token: Option<String>,
}

/// POST the refresh token and read `{data: {access_token, refresh_token}}`.
///
/// Goes straight to the client: no bearer header, no 401 handling.
pub(crate) async fn request_refresh(
    client: &reqwest::Client,
    url: &str,
    refresh_token: &str,
) -> Result<RefreshedTokens> {
    let response = client
        .post(url)
        .header(ACCEPT, "application/json")
        .json(&serde_json::json!({ "refresh_token": refresh_token }))
        .send()
        .await
        .map_err(|e| Error::from_transport(&e))?;

    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::from_transport(&e))?;

    if !status.is_success() {
        return Err(Error::from_response(status, &body));
    }

    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| Error::Decode(format!("invalid refresh response: {e}")))?;
    Envelope::from_value(value)?.data_as()
}
