//! Single-flight refresh-token exchange.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use super::error_message;
use super::transport::{HttpRequest, Transport};
use crate::error::RefreshFailure;
use crate::storage::SessionStore;

/// Path of the refresh endpoint, relative to the API base.
pub const REFRESH_PATH: &str = "refresh";

pub type RefreshOutcome = Result<(), RefreshFailure>;
type RefreshFuture = Shared<BoxFuture<'static, RefreshOutcome>>;

/// The refresh exchange currently in flight, if any.
///
/// Holds at most one shared future. Every caller that arrives while it is
/// pending awaits the same exchange and observes the same outcome; the slot
/// is emptied as soon as the exchange settles.
#[derive(Default)]
pub struct RefreshState {
    in_flight: Mutex<Option<(u64, RefreshFuture)>>,
    generation: AtomicU64,
}

impl RefreshState {
    /// Await the pending exchange, or start one with `start` if none is pending.
    pub async fn run<F>(&self, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    {
        let (generation, exchange) = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            let pending = slot
                .as_ref()
                .filter(|(_, exchange)| exchange.peek().is_none())
                .map(|(generation, exchange)| (*generation, exchange.clone()));

            if let Some(pending) = pending {
                tracing::debug!("Joining refresh already in flight");
                pending
            } else {
                let generation = self.next_generation();
                let exchange = start().shared();
                *slot = Some((generation, exchange.clone()));
                (generation, exchange)
            }
        };

        let outcome = exchange.await;

        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|(current, _)| *current == generation) {
            *slot = None;
        }

        outcome
    }

    /// Whether an exchange is currently pending.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|(_, exchange)| exchange.peek().is_none())
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RefreshState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshState")
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(alias = "access_token")]
    token: Option<String>,
    refresh_token: Option<String>,
}

/// Exchange the stored refresh token for a new access token and persist it.
///
/// Goes straight to the transport without an `Authorization` header, so a
/// 401 from the refresh endpoint is just a failed exchange.
pub async fn exchange(
    transport: &dyn Transport,
    url: Url,
    session: &SessionStore,
) -> RefreshOutcome {
    let refresh_token = session
        .refresh_token()
        .map_err(|e| RefreshFailure::Storage(e.to_string()))?
        .ok_or(RefreshFailure::MissingRefreshToken)?;

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let request = HttpRequest {
        method: Method::POST,
        url,
        headers,
        body: Some(serde_json::json!({
            "refresh_token": refresh_token.expose_secret(),
        })),
    };

    let response = transport
        .execute(request)
        .await
        .map_err(RefreshFailure::Transport)?;

    if !response.status.is_success() {
        return Err(RefreshFailure::Rejected {
            status: response.status,
            message: error_message(&response.body),
        });
    }

    let body: RefreshResponse =
        serde_json::from_str(&response.body).map_err(|_| RefreshFailure::MissingToken)?;
    let token = body
        .token
        .filter(|token| !token.is_empty())
        .map(SecretString::from)
        .ok_or(RefreshFailure::MissingToken)?;
    let rotated = body
        .refresh_token
        .filter(|token| !token.is_empty())
        .map(SecretString::from);

    session
        .replace_tokens(&token, rotated.as_ref())
        .map_err(|e| RefreshFailure::Storage(e.to_string()))?;

    tracing::info!(rotated = rotated.is_some(), "Access token refreshed");
    Ok(())
}
