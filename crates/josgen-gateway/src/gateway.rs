//! Authenticated request gateway
//!
//! `AuthGateway` sends every API call. Outbound, it attaches the stored bearer
//! token (skip-list paths excepted). Inbound, a 401 on a request that has not
//! been retried yet enters the refresh state machine:
//!
//! - another refresh in flight: wait for it, then retry with its token
//! - idle, no refresh token: clear tokens, redirect to login, fail
//! - idle, refresh succeeds: store new tokens, release waiters, retry
//! - idle, refresh fails: clear tokens, fail every waiter, redirect once
//!
//! The refresh runs on its own task, so a caller dropping its future cannot
//! strand the queue. Every other failure goes through `Error::from_response`
//! or `Error::from_transport`.

use std::sync::Arc;
use std::time::Duration;

use josgen_auth::{REFRESH_PATH, TokenPair, TokenStore};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::envelope::{Envelope, Page};
use crate::error::{Error, Result};
use crate::intercept::{SkipList, outbound_token};
use crate::redirect::LoginRedirect;
use crate::refresh::{self, RefreshState};
use crate::request::ApiRequest;

/// Gateway settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// API base URL, e.g. `https://api.example.org/api`
    pub base_url: String,
    /// Applied to every call, refresh included
    pub timeout: Duration,
    /// Sent as `Accept-Language`
    pub language: String,
    pub skip_list: SkipList,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            language: "en".into(),
            skip_list: SkipList::default(),
        }
    }
}

enum Reply {
    Success(Value),
    Failure { status: StatusCode, body: Vec<u8> },
}

struct Inner {
    client: reqwest::Client,
    base_url: String,
    language: String,
    skip_list: SkipList,
    tokens: TokenStore,
    redirect: Arc<dyn LoginRedirect>,
    refresh: Mutex<RefreshState>,
}

/// Cheap to clone; clones share tokens and refresh state.
#[derive(Clone)]
pub struct AuthGateway {
    inner: Arc<Inner>,
}

impl AuthGateway {
    pub fn new(
        config: GatewayConfig,
        tokens: TokenStore,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Request(format!("building HTTP client: {e}")))?;

        info!(
            base_url = %config.base_url,
            timeout_ms = config.timeout.as_millis() as u64,
            "gateway initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                language: config.language,
                skip_list: config.skip_list,
                tokens,
                redirect,
                refresh: Mutex::new(RefreshState::default()),
            }),
        })
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.tokens.is_authenticated()
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and return the decoded 2xx body (`null` when empty).
    pub async fn send(&self, mut request: ApiRequest) -> Result<Value> {
        let mut token = outbound_token(&self.inner.skip_list, &self.inner.tokens, &request.path);

        loop {
            let (status, body) = match self.dispatch(&request, token.as_deref()).await? {
                Reply::Success(value) => return Ok(value),
                Reply::Failure { status, body } => (status, body),
            };

            let refreshable = status == StatusCode::UNAUTHORIZED
                && !request.retried
                && !self.inner.skip_list.matches(&request.path);
            if !refreshable {
                let err = Error::from_response(status, &body);
                debug!(path = %request.path, status = status.as_u16(), error = %err, "request failed");
                return Err(err);
            }

            request.retried = true;

            // The session changed while this request was on the wire
            let current = self.inner.tokens.access_token();
            if current != token {
                if current.is_none() {
                    // Already ended by a failed refresh or a logout
                    let err = Error::from_response(status, &body);
                    debug!(path = %request.path, "401 after the session ended, not refreshing");
                    return Err(err);
                }
                debug!(path = %request.path, "401 with superseded token, retrying with current");
                token = current;
                continue;
            }

            let trigger = Error::from_response(status, &body);
            token = Some(self.refreshed_access_token(trigger).await?);
            debug!(path = %request.path, "retrying after token refresh");
        }
    }

    /// Wait for (or start) the single in-flight refresh.
    ///
    /// `trigger` is the normalized 401, used as the failure when no refresh
    /// token is stored.
    async fn refreshed_access_token(&self, trigger: Error) -> Result<String> {
        let ticket = self.inner.refresh.lock().await.join();

        if ticket.leader {
            let gateway = self.clone();
            tokio::spawn(async move { gateway.run_refresh(trigger).await });
        } else {
            debug!("refresh already in flight, queued");
        }

        ticket
            .outcome
            .await
            .unwrap_or_else(|_| Err(Error::Network("token refresh was interrupted".into())))
    }

    async fn run_refresh(&self, trigger: Error) {
        let tokens = &self.inner.tokens;

        let outcome = match tokens.refresh_token() {
            None => {
                warn!("401 with no refresh token stored, ending session");
                Err(trigger)
            }
            Some(refresh_token) => {
                info!("access token rejected, refreshing");
                match refresh::request_refresh(
                    &self.inner.client,
                    &self.url(REFRESH_PATH),
                    &refresh_token,
                )
                .await
                {
                    Ok(refreshed) => {
                        match refreshed.refresh_token {
                            Some(new_refresh) => tokens.set_tokens(&TokenPair::new(
                                refreshed.access_token.clone(),
                                new_refresh,
                            )),
                            None => tokens.update_access_token(&refreshed.access_token),
                        }
                        info!("token refresh succeeded");
                        Ok(refreshed.access_token)
                    }
                    Err(e) => {
                        warn!(error = %e, "token refresh failed, ending session");
                        Err(e)
                    }
                }
            }
        };

        let label = if outcome.is_ok() { "success" } else { "failure" };
        metrics::counter!("gateway_token_refresh_total", "outcome" => label).increment(1);

        if outcome.is_err() {
            tokens.clear_tokens();
        }

        let waiters = self.inner.refresh.lock().await.settle();
        refresh::notify(waiters, &outcome);

        if outcome.is_err() {
            self.inner.redirect.redirect_to_login();
        }
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Reply> {
        let mut builder = self
            .inner
            .client
            .request(request.method.clone(), self.url(&request.path))
            .header(ACCEPT, "application/json")
            .header(ACCEPT_LANGUAGE, self.inner.language.as_str());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(path = %request.path, error = %e, "request did not complete");
            Error::from_transport(&e)
        })?;

        let status = response.status();
        metrics::counter!("gateway_requests_total", "status" => status.as_u16().to_string())
            .increment(1);

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::from_transport(&e))?;

        if !status.is_success() {
            return Ok(Reply::Failure {
                status,
                body: body.to_vec(),
            });
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Reply::Success(Value::Null));
        }
        serde_json::from_slice(&body)
            .map(Reply::Success)
            .map_err(|e| Error::Decode(format!("invalid JSON response: {e}")))
    }

    /// Send a request and read its envelope, failing on a false success flag.
    pub async fn envelope(&self, request: ApiRequest) -> Result<Envelope> {
        let body = self.send(request).await?;
        Envelope::from_value(body)?.ensure_success()
    }

    /// Send a request and deserialize the envelope's `data`.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.envelope(request).await?.data_as()
    }

    /// Send a listing request and return its items with the reported total.
    pub async fn fetch_page<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Page<T>> {
        Page::from_envelope(&self.envelope(request).await?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.fetch(ApiRequest::get(path)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.fetch(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.fetch(ApiRequest::put(path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.fetch(ApiRequest::delete(path)).await
    }
}
