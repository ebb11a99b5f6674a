//! Mock backend for gateway tests
//!
//! An axum app on an ephemeral port that mimics the API's auth behaviour:
//! `/items` accepts only `Bearer fresh`, `/auth/refresh` counts its calls and
//! answers after a delay long enough for concurrent 401s to queue up.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::redirect::LoginRedirect;

pub(crate) const FRESH_ACCESS: &str = "fresh";
pub(crate) const FRESH_REFRESH: &str = "rt_2";
pub(crate) const USER_EMAIL: &str = "ketua@josgen.org";
pub(crate) const USER_PASSWORD: &str = "correct-horse";

const REFRESH_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy)]
pub(crate) enum RefreshMode {
    Succeed,
    Reject,
}

pub(crate) struct MockState {
    mode: RefreshMode,
    pub(crate) refresh_calls: AtomicUsize,
    pub(crate) logout_calls: AtomicUsize,
    last_refresh_token: Mutex<Option<String>>,
    seen_auth: Mutex<Vec<Option<String>>>,
    login_auth: Mutex<Vec<Option<String>>>,
}

impl MockState {
    pub(crate) fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().unwrap().clone()
    }

    /// Authorization headers seen on the protected item routes, in order.
    pub(crate) fn seen_auth(&self) -> Vec<Option<String>> {
        self.seen_auth.lock().unwrap().clone()
    }

    /// Authorization headers seen on `/auth/login`.
    pub(crate) fn login_auth(&self) -> Vec<Option<String>> {
        self.login_auth.lock().unwrap().clone()
    }
}

pub(crate) struct MockBackend {
    pub(crate) url: String,
    pub(crate) state: Arc<MockState>,
}

/// Redirect hook that counts its invocations.
#[derive(Debug, Default)]
pub(crate) struct CountingRedirect(AtomicUsize);

impl CountingRedirect {
    pub(crate) fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl LoginRedirect for CountingRedirect {
    fn redirect_to_login(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn has_fresh_token(headers: &HeaderMap) -> bool {
    authorization(headers).as_deref() == Some("Bearer fresh")
}

fn token_expired() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"status": false, "message": "Token expired"})),
    )
        .into_response()
}

fn user() -> Value {
    json!({
        "id": 7,
        "name": "Ketua Umum",
        "email": USER_EMAIL,
        "avatar": "avatars/ketua.png",
        "division_id": 2
    })
}

async fn items(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.seen_auth.lock().unwrap().push(authorization(&headers));
    if has_fresh_token(&headers) {
        Json(json!({"status": true, "code": 200, "data": {"owner": "fresh"}})).into_response()
    } else {
        token_expired()
    }
}

async fn slow_items(state: State<Arc<MockState>>, headers: HeaderMap) -> Response {
    tokio::time::sleep(REFRESH_DELAY).await;
    items(state, headers).await
}

/// Holds the 401 until well after any refresh has settled.
async fn late_401(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.seen_auth.lock().unwrap().push(authorization(&headers));
    tokio::time::sleep(REFRESH_DELAY * 3).await;
    token_expired()
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_refresh_token.lock().unwrap() = body["refresh_token"].as_str().map(str::to_string);
    tokio::time::sleep(REFRESH_DELAY).await;

    match state.mode {
        RefreshMode::Succeed => Json(json!({
            "data": {"access_token": FRESH_ACCESS, "refresh_token": FRESH_REFRESH}
        }))
        .into_response(),
        RefreshMode::Reject => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": false, "message": "Refresh token expired"})),
        )
            .into_response(),
    }
}

async fn login(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.login_auth.lock().unwrap().push(authorization(&headers));
    if body["email"] == USER_EMAIL && body["password"] == USER_PASSWORD {
        Json(json!({
            "status": true,
            "data": {
                "user": user(),
                "access_token": FRESH_ACCESS,
                "refresh_token": FRESH_REFRESH,
                "token_type": "bearer",
                "expires_in": 3600
            }
        }))
        .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": false, "message": "Invalid credentials"})),
        )
            .into_response()
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["email"] == USER_EMAIL {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"errors": {"email": ["Email already taken"]}})),
        )
            .into_response();
    }
    Json(json!({
        "status": true,
        "data": {
            "user": {"id": 8, "name": body["name"], "email": body["email"]},
            "access_token": FRESH_ACCESS,
            "refresh_token": FRESH_REFRESH,
            "token_type": "bearer",
            "expires_in": 3600
        }
    }))
    .into_response()
}

async fn me(headers: HeaderMap) -> Response {
    if !has_fresh_token(&headers) {
        return token_expired();
    }
    Json(json!({
        "status": true,
        "data": {"user": user(), "permissions": ["events.view", "treasury.manage"]}
    }))
    .into_response()
}

async fn logout(State(state): State<Arc<MockState>>) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))).into_response()
}

async fn acknowledge(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if body.get("email").is_none() && !has_fresh_token(&headers) {
        return token_expired();
    }
    Json(json!({"success": true, "message": "Done"})).into_response()
}

async fn language(headers: HeaderMap) -> Json<Value> {
    let language = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Json(json!({"status": true, "data": language}))
}

/// Start the mock backend; it runs until the test's runtime shuts down.
pub(crate) async fn start(mode: RefreshMode) -> MockBackend {
    let state = Arc::new(MockState {
        mode,
        refresh_calls: AtomicUsize::new(0),
        logout_calls: AtomicUsize::new(0),
        last_refresh_token: Mutex::new(None),
        seen_auth: Mutex::new(Vec::new()),
        login_auth: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/items", any(items))
        .route("/slow-items", get(slow_items))
        .route("/late-401", get(late_401))
        .route("/always-401", get(|| async { StatusCode::UNAUTHORIZED }))
        .route("/loop", get(|| async { Redirect::temporary("/loop") }))
        .route(
            "/server-error",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))) }),
        )
        .route(
            "/validate",
            post(|| async {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({"errors": {"email": ["Email already taken"]}})),
                )
            }),
        )
        .route(
            "/business-failure",
            get(|| async { Json(json!({"success": false, "message": "Insufficient balance"})) }),
        )
        .route(
            "/events",
            get(|| async {
                Json(json!({"status": true, "data": [{"id": 1}, {"id": 2}], "total": 42}))
            }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"status": true}))
            }),
        )
        .route("/language", get(language))
        .route("/auth/refresh", post(refresh))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/me", post(me))
        .route("/auth/logout", post(logout))
        .route("/auth/change-password", post(acknowledge))
        .route("/auth/forgot-password", post(acknowledge))
        .route("/auth/reset-password", post(acknowledge))
        .route("/auth/update-profile", post(acknowledge))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockBackend {
        url: format!("http://{addr}"),
        state,
    }
}
