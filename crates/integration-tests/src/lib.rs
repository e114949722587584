//! Integration tests for the Bynona storefront client.
//!
//! [`MockApi`] serves a small imitation of the storefront API on an
//! ephemeral local port. Tests point a real [`BynonaClient`] (reqwest
//! transport, in-memory or file store) at it and observe what the server
//! received.
//!
//! # Token model
//!
//! The server keeps one valid access/refresh token pair. Requests that carry
//! a bearer other than the current access token get `401`, which lets tests
//! expire a session server-side with [`MockApi::expire_access_token`].
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bynona-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bynona_client::gateway::ReqwestTransport;
use bynona_client::storage::{KeyValueStore, MemoryStore};
use bynona_client::{BynonaClient, ClientConfig, SearchConfig};
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

/// Credentials the mock accepts at `/login`.
pub const EMAIL: &str = "mona@example.com";
pub const PASSWORD: &str = "secret1";

/// Email `/register` reports as already taken.
pub const TAKEN_EMAIL: &str = "taken@example.com";

/// What the server saw for one request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub accept_language: Option<String>,
    pub price_mode: Option<String>,
}

impl RecordedRequest {
    fn capture(path: &str, headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            path: path.to_string(),
            authorization: text(header::AUTHORIZATION.as_str()),
            accept_language: text(header::ACCEPT_LANGUAGE.as_str()),
            price_mode: text("price-mode"),
        }
    }
}

#[derive(Default)]
struct Tokens {
    generation: usize,
    access: String,
    refresh: String,
}

impl Tokens {
    fn rotate(&mut self) {
        self.generation += 1;
        self.access = format!("access-{}", self.generation);
        self.refresh = format!("refresh-{}", self.generation);
    }
}

#[derive(Default)]
struct MockState {
    tokens: Mutex<Tokens>,
    requests: Mutex<Vec<RecordedRequest>>,
    refreshes: AtomicUsize,
    refresh_delay: Mutex<Duration>,
    search_delays: Mutex<HashMap<String, Duration>>,
}

impl MockState {
    fn record(&self, path: &str, headers: &HeaderMap) {
        self.requests
            .lock()
            .unwrap()
            .push(RecordedRequest::capture(path, headers));
    }

    /// `Err` with a 401 response when the request carries a stale bearer.
    fn check_bearer(&self, headers: &HeaderMap) -> Result<(), Response> {
        let Some(bearer) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(());
        };
        let current = format!("Bearer {}", self.tokens.lock().unwrap().access);
        if bearer == current {
            Ok(())
        } else {
            Err(unauthenticated("Unauthenticated."))
        }
    }

    fn issue_tokens(&self) -> (String, String) {
        let mut tokens = self.tokens.lock().unwrap();
        tokens.rotate();
        (tokens.access.clone(), tokens.refresh.clone())
    }
}

fn unauthenticated(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
}

fn is_english(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_LANGUAGE)
        .is_some_and(|v| v.as_bytes() == b"en")
}

fn is_wholesale(headers: &HeaderMap) -> bool {
    headers
        .get("price-mode")
        .is_some_and(|v| v.as_bytes() == b"wholesale")
}

// =============================================================================
// Handlers
// =============================================================================

type Shared = State<Arc<MockState>>;

async fn login(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("/login", &headers);
    if body["email"] != EMAIL || body["password"] != PASSWORD {
        return unauthenticated("Invalid credentials");
    }
    let (token, refresh_token) = state.issue_tokens();
    Json(json!({
        "status": "success",
        "message": "Logged in successfully",
        "token": token,
        "refresh_token": refresh_token,
        "user": {"id": 5, "first_name": "Mona", "last_name": "Adel", "email": EMAIL, "wallet_balance": "120.50"}
    }))
    .into_response()
}

async fn logout(State(state): Shared, headers: HeaderMap) -> Response {
    state.record("/logout", &headers);
    if let Err(response) = state.check_bearer(&headers) {
        return response;
    }
    Json(json!({"status": true, "message": "Logged out"})).into_response()
}

async fn refresh(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("/refresh", &headers);
    state.refreshes.fetch_add(1, Ordering::SeqCst);

    let delay = *state.refresh_delay.lock().unwrap();
    tokio::time::sleep(delay).await;

    let valid = state.tokens.lock().unwrap().refresh.clone();
    if body["refresh_token"] != valid.as_str() {
        return unauthenticated("Invalid refresh token");
    }
    let (token, refresh_token) = state.issue_tokens();
    Json(json!({"token": token, "refresh_token": refresh_token})).into_response()
}

async fn register(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("/register", &headers);
    if body["email"] == TAKEN_EMAIL {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "The email has already been taken.",
                "errors": {"email": ["The email has already been taken."]}
            })),
        )
            .into_response();
    }
    Json(json!({"status": 200, "message": "OTP sent to your email"})).into_response()
}

async fn brands(State(state): Shared, headers: HeaderMap) -> Response {
    state.record("/brands", &headers);
    if let Err(response) = state.check_bearer(&headers) {
        return response;
    }
    let name = if is_english(&headers) { "Nona" } else { "نونا" };
    Json(json!({"success": true, "data": [{"id": 1, "name": name}]})).into_response()
}

async fn categories(State(state): Shared, headers: HeaderMap) -> Response {
    state.record("/categories", &headers);
    if let Err(response) = state.check_bearer(&headers) {
        return response;
    }
    Json(json!({"data": [{"id": 3, "name": "Skincare", "image_path": "categories/3.png"}]}))
        .into_response()
}

#[derive(Deserialize)]
struct FilterQuery {
    sort: Option<String>,
}

async fn filter_products(
    State(state): Shared,
    headers: HeaderMap,
    Query(query): Query<FilterQuery>,
) -> Response {
    state.record("/filter/product", &headers);
    if let Err(response) = state.check_bearer(&headers) {
        return response;
    }
    let price = if is_wholesale(&headers) { "80.00" } else { "100.00" };
    let offers = if query.sort.as_deref() == Some("offers") {
        json!([{"id": 1, "disscount_price": "25"}])
    } else {
        json!([])
    };
    Json(json!({
        "status": true,
        "data": {"products": [{"id": 11, "name": "Rose Serum", "price": price, "offers": offers}]}
    }))
    .into_response()
}

#[derive(Deserialize)]
struct SearchQuery {
    search: String,
    page: Option<u32>,
}

async fn search(State(state): Shared, headers: HeaderMap, Query(query): Query<SearchQuery>) -> Response {
    state.record("/search", &headers);
    if let Err(response) = state.check_bearer(&headers) {
        return response;
    }
    let delay = state
        .search_delays
        .lock()
        .unwrap()
        .get(&query.search)
        .copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let page = query.page.unwrap_or(1);
    Json(json!({
        "success": true,
        "data": {
            "current_page": page,
            "last_page": 3,
            "data": [{"id": page, "name": format!("{} #{page}", query.search), "price": "10.00"}]
        }
    }))
    .into_response()
}

// =============================================================================
// MockApi
// =============================================================================

/// Running mock server.
pub struct MockApi {
    addr: SocketAddr,
    state: Arc<MockState>,
    server: tokio::task::JoinHandle<()>,
}

impl MockApi {
    /// Bind to an ephemeral port and start serving.
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let api = Router::new()
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/refresh", post(refresh))
            .route("/register", post(register))
            .route("/brands", get(brands))
            .route("/categories", get(categories))
            .route("/filter/product", get(filter_products))
            .route("/search", get(search));
        let app = Router::new()
            .nest("/api/v1", api)
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL of the mock API, with trailing slash.
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/api/v1/", self.addr)).unwrap()
    }

    /// Client configuration pointing at this server, with a short debounce.
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.base_url());
        config.timeout = Duration::from_secs(5);
        config.search = SearchConfig {
            debounce: Duration::from_millis(100),
            min_chars: 2,
        };
        config
    }

    /// Client over a fresh in-memory store.
    pub fn client(&self) -> BynonaClient {
        self.client_with_store(Arc::new(MemoryStore::new()))
    }

    /// Client over the given store.
    pub fn client_with_store(&self, store: Arc<dyn KeyValueStore>) -> BynonaClient {
        let config = self.config();
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .no_proxy()
            .build()
            .unwrap();
        let transport = Arc::new(ReqwestTransport::from_client(http));
        BynonaClient::with_parts(&config, store, transport).unwrap()
    }

    /// Invalidate the current access token; the refresh token stays valid.
    pub fn expire_access_token(&self) {
        self.state.tokens.lock().unwrap().access = "revoked".to_string();
    }

    /// Invalidate both tokens.
    pub fn revoke_session(&self) {
        let mut tokens = self.state.tokens.lock().unwrap();
        tokens.access = "revoked".to_string();
        tokens.refresh = "revoked".to_string();
    }

    /// Make every refresh exchange take at least `delay`.
    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.state.refresh_delay.lock().unwrap() = delay;
    }

    /// Make searches for `text` take at least `delay`.
    pub fn set_search_delay(&self, text: &str, delay: Duration) {
        self.state
            .search_delays
            .lock()
            .unwrap()
            .insert(text.to_string(), delay);
    }

    pub fn refresh_count(&self) -> usize {
        self.state.refreshes.load(Ordering::SeqCst)
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Requests received for `path` (relative to the API root).
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Sign `client` in with the accepted credentials.
pub async fn sign_in(client: &BynonaClient) {
    let email = bynona_core::Email::parse(EMAIL).unwrap();
    client
        .login(&email, &secrecy::SecretString::from(PASSWORD))
        .await
        .unwrap();
}
