//! Session-aware request gateway.
//!
//! Every API call goes through [`Gateway::send`], which:
//!
//! - attaches `Authorization`, `Accept-Language` and `Price-Mode` headers
//!   computed from the session and preferences at send time
//! - turns error responses into [`ApiError`] values
//! - recovers from an expired access token by exchanging the refresh token
//!   (once, shared by every request that hit the same expiry) and replaying
//!   the failed request a single time

pub mod refresh;
pub mod transport;

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue,
};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use crate::error::{ApiError, GENERIC_FAILURE_MESSAGE, RefreshFailure, TransportError};
use crate::preferences::Preferences;
use crate::storage::SessionStore;

use refresh::{REFRESH_PATH, RefreshOutcome, RefreshState};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

/// Header carrying the shopper's pricing context.
pub const PRICE_MODE_HEADER: &str = "price-mode";

const LOGIN_PATH: &str = "login";

// =============================================================================
// ApiRequest
// =============================================================================

/// An API call described relative to the base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    retried: bool,
}

impl ApiRequest {
    /// Request with the given method and endpoint path (e.g. `"/brands"`).
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    /// `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST` request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set the JSON body.
    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this is the credential check, whose 401 means "wrong
    /// password" rather than "expired token".
    #[must_use]
    pub fn is_login(&self) -> bool {
        self.path.trim_matches('/') == LOGIN_PATH
    }

    fn url(&self, base: &Url) -> Result<Url, ApiError> {
        let mut url = base
            .join(self.path.trim_start_matches('/'))
            .map_err(|e| ApiError::NetworkUnreachable(TransportError::Request(e.to_string())))?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        Ok(url)
    }
}

// =============================================================================
// Gateway
// =============================================================================

/// The single choke point for outbound API calls.
///
/// Cloning is cheap; clones share the session, preferences and refresh state.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    base_url: Url,
    transport: Arc<dyn Transport>,
    session: SessionStore,
    preferences: Preferences,
    refresh: RefreshState,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.inner.base_url.as_str())
            .field("preferences", &self.inner.preferences)
            .field("refresh", &self.inner.refresh)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway. `base_url` must end with `/` so endpoint paths are
    /// appended rather than substituted.
    #[must_use]
    pub fn new(
        base_url: Url,
        transport: Arc<dyn Transport>,
        session: SessionStore,
        preferences: Preferences,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                base_url,
                transport,
                session,
                preferences,
                refresh: RefreshState::default(),
            }),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn preferences(&self) -> &Preferences {
        &self.inner.preferences
    }

    /// Send a request and decode its JSON body.
    ///
    /// A 401 outside the login endpoint triggers the refresh protocol: the
    /// refresh token is exchanged once (concurrent failures share one
    /// exchange) and the request is replayed once with the new token.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` for a 401 from the login endpoint
    /// - `AuthExpired` if the replay is rejected too, or no refresh token exists
    /// - `RefreshFailed` if the exchange failed; the session has been cleared
    /// - `NetworkUnreachable` if no response was received
    /// - `ValidationRejected` / `UnexpectedStatus` for other error statuses
    /// - `Decode` if a successful body does not match `T`
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send<T: DeserializeOwned>(&self, mut request: ApiRequest) -> Result<T, ApiError> {
        loop {
            let token = self.inner.session.access_token()?;
            let response = self.transmit(&request, token.as_ref()).await?;

            if response.status != StatusCode::UNAUTHORIZED {
                return decode(&response);
            }

            let message = error_message(&response.body);
            if request.is_login() {
                return Err(ApiError::InvalidCredentials { message });
            }
            if request.retried {
                tracing::warn!("Request rejected again after token refresh");
                return Err(ApiError::AuthExpired { message });
            }

            request.retried = true;
            self.recover(token.as_ref(), message).await?;
        }
    }

    /// Make a fresh access token available for the replay of a 401'd request.
    async fn recover(&self, failed: Option<&SecretString>, message: String) -> Result<(), ApiError> {
        let current = self.inner.session.access_token()?;
        if let Some(current) = &current
            && failed.is_none_or(|failed| failed.expose_secret() != current.expose_secret())
        {
            tracing::debug!("Access token changed since the request was sent, replaying");
            return Ok(());
        }
        if current.is_none() && failed.is_some() {
            tracing::debug!("Session was cleared while the request was in flight");
            return Err(ApiError::AuthExpired { message });
        }

        match self.inner.refresh.run(|| self.start_refresh()).await {
            Ok(()) => Ok(()),
            Err(RefreshFailure::MissingRefreshToken) => Err(ApiError::AuthExpired { message }),
            Err(failure) => Err(ApiError::RefreshFailed(failure)),
        }
    }

    /// Build the shared exchange future. Clearing the session on failure
    /// happens here so it runs once no matter how many requests wait.
    fn start_refresh(&self) -> BoxFuture<'static, RefreshOutcome> {
        let transport = Arc::clone(&self.inner.transport);
        let session = self.inner.session.clone();
        let url = self.inner.base_url.join(REFRESH_PATH);

        async move {
            let url = url.map_err(|e| {
                RefreshFailure::Transport(TransportError::Request(e.to_string()))
            })?;

            let outcome = refresh::exchange(transport.as_ref(), url, &session).await;
            if let Err(failure) = &outcome {
                tracing::warn!(error = %failure, "Token refresh failed, clearing session");
                if let Err(e) = session.expire() {
                    tracing::error!(error = %e, "Failed to clear expired session");
                }
            }
            outcome
        }
        .boxed()
    }

    async fn transmit(
        &self,
        request: &ApiRequest,
        token: Option<&SecretString>,
    ) -> Result<HttpResponse, ApiError> {
        let http_request = HttpRequest {
            method: request.method.clone(),
            url: request.url(&self.inner.base_url)?,
            headers: self.headers(token, request.body.is_some())?,
            body: request.body.clone(),
        };

        self.inner
            .transport
            .execute(http_request)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "No response from API");
                ApiError::NetworkUnreachable(e)
            })
    }

    /// Request context headers, read fresh for every transmission.
    fn headers(&self, token: Option<&SecretString>, has_body: bool) -> Result<HeaderMap, ApiError> {
        let preferences = &self.inner.preferences;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if has_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(preferences.locale().as_str()),
        );
        headers.insert(
            PRICE_MODE_HEADER,
            HeaderValue::from_static(preferences.price_mode().as_str()),
        );

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|_| {
                    ApiError::NetworkUnreachable(TransportError::Request(
                        "stored access token is not a valid header value".to_string(),
                    ))
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

/// The `message` field of an error body, or a generic fallback.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string())
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    if !response.status.is_success() {
        return Err(rejection(response));
    }

    let body = if response.body.trim().is_empty() {
        "null"
    } else {
        response.body.as_str()
    };

    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %response.body.chars().take(500).collect::<String>(),
            "Failed to parse API response"
        );
        ApiError::Decode(e)
    })
}

fn rejection(response: &HttpResponse) -> ApiError {
    match serde_json::from_str::<ErrorBody>(&response.body) {
        Ok(ErrorBody {
            message: Some(message),
            errors,
        }) => ApiError::ValidationRejected {
            status: response.status,
            message,
            errors: errors.map(field_errors).unwrap_or_default(),
        },
        _ => {
            tracing::error!(
                status = %response.status,
                body = %response.body.chars().take(500).collect::<String>(),
                "API returned non-success status"
            );
            ApiError::UnexpectedStatus {
                status: response.status,
                body: response.body.clone(),
            }
        }
    }
}

/// Per-field messages; each field may carry a list of messages or a single one.
fn field_errors(errors: serde_json::Value) -> BTreeMap<String, Vec<String>> {
    let serde_json::Value::Object(fields) = errors else {
        return BTreeMap::new();
    };

    fields
        .into_iter()
        .map(|(field, messages)| {
            let messages = match messages {
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .filter_map(|m| m.as_str().map(str::to_string))
                    .collect(),
                serde_json::Value::String(message) => vec![message],
                _ => Vec::new(),
            };
            (field, messages)
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bynona_core::{Locale, PriceMode};
    use serde_json::json;

    use super::*;
    use crate::storage::{Session, SessionEvent};
    use crate::test_support::{FakeTransport, gateway_with};

    fn signed_in(access: &str, refresh: Option<&str>) -> Session {
        Session {
            access_token: Some(SecretString::from(access)),
            refresh_token: refresh.map(SecretString::from),
            user: None,
        }
    }

    /// Protected endpoint accepting only `Bearer new`, refresh issuing `new`.
    fn expiring_api(refreshes: Arc<AtomicUsize>) -> FakeTransport {
        FakeTransport::new(move |request| {
            if request.url.path().ends_with("/refresh") {
                refreshes.fetch_add(1, Ordering::SeqCst);
                return Ok(HttpResponse::json(StatusCode::OK, &json!({"token": "new"})));
            }
            if request.header(AUTHORIZATION) == Some("Bearer new") {
                Ok(HttpResponse::json(StatusCode::OK, &json!({"ok": true})))
            } else {
                Ok(HttpResponse::json(
                    StatusCode::UNAUTHORIZED,
                    &json!({"message": "Unauthenticated."}),
                ))
            }
        })
        .with_latency("/refresh", Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_bearer_matches_session_token() {
        let transport = Arc::new(FakeTransport::ok(json!({"data": []})));
        let gateway = gateway_with(transport.clone(), Some(signed_in("abc", None)));

        let _: serde_json::Value = gateway.send(ApiRequest::get("/brands")).await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].header(AUTHORIZATION), Some("Bearer abc"));
        assert_eq!(sent[0].url.as_str(), "http://api.test/v1/brands");
    }

    #[tokio::test]
    async fn test_no_authorization_without_session() {
        let transport = Arc::new(FakeTransport::ok(json!({"data": []})));
        let gateway = gateway_with(transport.clone(), None);

        let _: serde_json::Value = gateway.send(ApiRequest::get("/brands")).await.unwrap();

        let sent = transport.requests();
        assert!(sent[0].header(AUTHORIZATION).is_none());
        assert_eq!(sent[0].header(ACCEPT_LANGUAGE), Some("ar"));
        assert_eq!(sent[0].header(PRICE_MODE_HEADER), Some("retail"));
    }

    #[tokio::test]
    async fn test_preference_changes_apply_to_next_request() {
        let transport = Arc::new(FakeTransport::ok(json!({})));
        let gateway = gateway_with(transport.clone(), None);

        let _: serde_json::Value = gateway.send(ApiRequest::get("/brands")).await.unwrap();
        gateway.preferences().set_locale(Locale::En).unwrap();
        gateway
            .preferences()
            .set_price_mode(PriceMode::Wholesale)
            .unwrap();
        let _: serde_json::Value = gateway.send(ApiRequest::get("/brands")).await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].header(ACCEPT_LANGUAGE), Some("ar"));
        assert_eq!(sent[1].header(ACCEPT_LANGUAGE), Some("en"));
        assert_eq!(sent[1].header(PRICE_MODE_HEADER), Some("wholesale"));
    }

    #[tokio::test]
    async fn test_query_and_body_are_sent() {
        let transport = Arc::new(FakeTransport::ok(json!({})));
        let gateway = gateway_with(transport.clone(), None);

        let _: serde_json::Value = gateway
            .send(
                ApiRequest::post("/search")
                    .query("search", "phone case")
                    .query("page", 2)
                    .json(json!({"a": 1})),
            )
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].url.query(), Some("search=phone+case&page=2"));
        assert_eq!(sent[0].header(CONTENT_TYPE), Some("application/json"));
        assert_eq!(sent[0].body, Some(json!({"a": 1})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_401_refreshes_once_and_retries_once() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let transport = Arc::new(expiring_api(refreshes.clone()));
        let gateway = gateway_with(transport.clone(), Some(signed_in("old", Some("r1"))));
        let mut events = gateway.session().subscribe();

        let body: serde_json::Value = gateway.send(ApiRequest::get("/profile")).await.unwrap();

        assert_eq!(body, json!({"ok": true}));
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        let sent = transport.requests();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].body, Some(json!({"refresh_token": "r1"})));
        assert!(sent[1].header(AUTHORIZATION).is_none());
        assert_eq!(sent[2].header(AUTHORIZATION), Some("Bearer new"));
        assert_eq!(
            gateway.session().access_token().unwrap().unwrap().expose_secret(),
            "new"
        );
        assert_eq!(events.try_recv().unwrap(), SessionEvent::TokenRefreshed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_401s_share_one_refresh() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let transport = Arc::new(expiring_api(refreshes.clone()));
        let gateway = gateway_with(transport.clone(), Some(signed_in("old", Some("r1"))));

        let results = futures::future::join_all(
            (0..5).map(|i| gateway.send::<serde_json::Value>(ApiRequest::get(format!("/p/{i}")))),
        )
        .await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);

        let retries: Vec<_> = transport
            .requests()
            .into_iter()
            .filter(|r| r.header(AUTHORIZATION) == Some("Bearer new"))
            .collect();
        assert_eq!(retries.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_401s_across_tasks_share_one_refresh() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let transport = Arc::new(expiring_api(refreshes.clone()));
        let gateway = gateway_with(transport, Some(signed_in("old", Some("r1"))));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gateway = gateway.clone();
                tokio::spawn(async move {
                    gateway
                        .send::<serde_json::Value>(ApiRequest::get("/profile"))
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_session_without_retry() {
        let transport = Arc::new(FakeTransport::new(|request| {
            let status = if request.url.path().ends_with("/refresh") {
                StatusCode::FORBIDDEN
            } else {
                StatusCode::UNAUTHORIZED
            };
            Ok(HttpResponse::json(status, &json!({"message": "Token revoked"})))
        }));
        let gateway = gateway_with(transport.clone(), Some(signed_in("old", Some("r1"))));
        let mut events = gateway.session().subscribe();

        let err = gateway
            .send::<serde_json::Value>(ApiRequest::get("/profile"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApiError::RefreshFailed(RefreshFailure::Rejected { status, .. }) if status == StatusCode::FORBIDDEN
        ));
        assert!(err.requires_login());
        assert_eq!(transport.requests().len(), 2);

        let session = gateway.session().load().unwrap();
        assert!(session.access_token.is_none());
        assert!(session.refresh_token.is_none());
        assert!(session.user.is_none());
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_is_auth_expired() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(HttpResponse::json(
                StatusCode::UNAUTHORIZED,
                &json!({"message": "Unauthenticated."}),
            ))
        }));
        let gateway = gateway_with(transport.clone(), Some(signed_in("old", None)));

        let err = gateway
            .send::<serde_json::Value>(ApiRequest::get("/profile"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::AuthExpired { ref message } if message == "Unauthenticated."));
        // No refresh request went out
        assert_eq!(transport.requests().len(), 1);
        assert!(gateway.session().access_token().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_cleared_in_flight_is_auth_expired_without_refresh() {
        let session_slot: Arc<std::sync::OnceLock<SessionStore>> = Arc::default();
        let slot = Arc::clone(&session_slot);
        let transport = Arc::new(FakeTransport::new(move |_| {
            // Another request's refresh failed while this one was on the wire
            slot.get().unwrap().expire().unwrap();
            Ok(HttpResponse::json(
                StatusCode::UNAUTHORIZED,
                &json!({"message": "Unauthenticated."}),
            ))
        }));
        let gateway = gateway_with(transport.clone(), Some(signed_in("old", Some("r1"))));
        session_slot.set(gateway.session().clone()).unwrap();
        let mut events = gateway.session().subscribe();

        let err = gateway
            .send::<serde_json::Value>(ApiRequest::get("/profile"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::AuthExpired { ref message } if message == "Unauthenticated."));
        assert_eq!(transport.requests().len(), 1);
        assert!(!gateway.inner.refresh.is_in_flight());
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
        assert!(events.try_recv().is_err(), "session expired only once");
    }

    #[tokio::test]
    async fn test_refresh_without_token_in_body_fails() {
        let transport = Arc::new(FakeTransport::new(|request| {
            if request.url.path().ends_with("/refresh") {
                Ok(HttpResponse::json(StatusCode::OK, &json!({"success": true})))
            } else {
                Ok(HttpResponse::json(StatusCode::UNAUTHORIZED, &json!({})))
            }
        }));
        let gateway = gateway_with(transport, Some(signed_in("old", Some("r1"))));

        let err = gateway
            .send::<serde_json::Value>(ApiRequest::get("/profile"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::RefreshFailed(RefreshFailure::MissingToken)));
    }

    #[tokio::test]
    async fn test_second_401_after_refresh_is_auth_expired() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let counter = refreshes.clone();
        let transport = Arc::new(FakeTransport::new(move |request| {
            if request.url.path().ends_with("/refresh") {
                counter.fetch_add(1, Ordering::SeqCst);
                return Ok(HttpResponse::json(StatusCode::OK, &json!({"token": "new"})));
            }
            Ok(HttpResponse::json(
                StatusCode::UNAUTHORIZED,
                &json!({"message": "Unauthenticated."}),
            ))
        }));
        let gateway = gateway_with(transport.clone(), Some(signed_in("old", Some("r1"))));

        let err = gateway
            .send::<serde_json::Value>(ApiRequest::get("/profile"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::AuthExpired { .. }));
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_login_401_never_refreshes() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(HttpResponse::json(
                StatusCode::UNAUTHORIZED,
                &json!({"message": "These credentials do not match our records."}),
            ))
        }));
        let gateway = gateway_with(transport.clone(), Some(signed_in("old", Some("r1"))));

        let err = gateway
            .send::<serde_json::Value>(ApiRequest::post("/login/").json(json!({})))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApiError::InvalidCredentials { ref message } if message == "These credentials do not match our records."
        ));
        assert_eq!(transport.requests().len(), 1);
        // The stored session is left alone
        assert!(gateway.session().refresh_token().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stale_token_replays_without_refresh() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let transport = Arc::new(expiring_api(refreshes.clone()));
        let gateway = gateway_with(transport.clone(), Some(signed_in("old", Some("r1"))));

        // Another request already refreshed; this one was sent with "old"
        gateway
            .session()
            .replace_tokens(&SecretString::from("new"), None)
            .unwrap();
        gateway
            .recover(Some(&SecretString::from("old")), String::new())
            .await
            .unwrap();

        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_network_failure_never_refreshes() {
        let transport = Arc::new(FakeTransport::new(|_| Err(TransportError::Timeout)));
        let gateway = gateway_with(transport.clone(), Some(signed_in("old", Some("r1"))));

        let err = gateway
            .send::<serde_json::Value>(ApiRequest::get("/brands"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::NetworkUnreachable(TransportError::Timeout)));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_error_body_message_is_surfaced() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(HttpResponse::json(
                StatusCode::UNPROCESSABLE_ENTITY,
                &json!({
                    "message": "The email has already been taken.",
                    "errors": {"email": ["The email has already been taken."], "phone": "Invalid"}
                }),
            ))
        }));
        let gateway = gateway_with(transport, None);

        let err = gateway
            .send::<serde_json::Value>(ApiRequest::post("/register").json(json!({})))
            .await
            .unwrap_err();

        let ApiError::ValidationRejected {
            status,
            message,
            errors,
        } = err
        else {
            panic!("expected ValidationRejected");
        };
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(message, "The email has already been taken.");
        assert_eq!(errors["email"], vec!["The email has already been taken.".to_string()]);
        assert_eq!(errors["phone"], vec!["Invalid".to_string()]);
    }

    #[tokio::test]
    async fn test_unstructured_error_is_unexpected_status() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(HttpResponse {
                status: StatusCode::BAD_GATEWAY,
                body: "<html>Bad Gateway</html>".to_string(),
            })
        }));
        let gateway = gateway_with(transport, None);

        let err = gateway
            .send::<serde_json::Value>(ApiRequest::get("/brands"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::UnexpectedStatus { status, .. } if status == StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn test_login_path_detection() {
        assert!(ApiRequest::post("/login").is_login());
        assert!(ApiRequest::post("login/").is_login());
        assert!(!ApiRequest::post("/logout").is_login());
        assert!(!ApiRequest::post("/login-history").is_login());
    }
}
