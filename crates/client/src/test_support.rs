//! Scripted transport and constructors shared by unit tests.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bynona_core::Locale;
use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::StatusCode;
use url::Url;

use crate::api::BynonaClient;
use crate::error::TransportError;
use crate::gateway::{Gateway, HttpRequest, HttpResponse, Transport};
use crate::preferences::Preferences;
use crate::storage::{MemoryStore, Session, SessionStore};

pub const TEST_BASE_URL: &str = "http://api.test/v1/";

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

/// Transport answering from a closure and recording every request.
pub struct FakeTransport {
    handler: Box<Handler>,
    latency: Vec<(String, Duration)>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            latency: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with `200` and the given body.
    pub fn ok(body: serde_json::Value) -> Self {
        Self::new(move |_| Ok(HttpResponse::json(StatusCode::OK, &body)))
    }

    /// Delay responses to URLs whose path ends with `suffix`.
    pub fn with_latency(mut self, suffix: &str, latency: Duration) -> Self {
        self.latency.push((suffix.to_string(), latency));
        self
    }

    /// Requests in the order they were sent.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        self.requests.lock().unwrap().push(request.clone());
        let delay = self
            .latency
            .iter()
            .find(|(suffix, _)| request.url.path().ends_with(suffix.as_str()))
            .map(|(_, latency)| *latency);

        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            (self.handler)(&request)
        }
        .boxed()
    }
}

fn parts(session: Option<Session>) -> (Arc<MemoryStore>, SessionStore, Preferences) {
    let store = Arc::new(MemoryStore::new());
    let sessions = SessionStore::new(store.clone());
    if let Some(session) = session {
        sessions.save(&session).unwrap();
    }
    let preferences = Preferences::load(store.clone(), Locale::Ar).unwrap();
    (store, sessions, preferences)
}

/// Gateway over `transport` with an in-memory store holding `session`.
pub fn gateway_with(transport: Arc<FakeTransport>, session: Option<Session>) -> Gateway {
    let (_, sessions, preferences) = parts(session);
    Gateway::new(
        Url::parse(TEST_BASE_URL).unwrap(),
        transport,
        sessions,
        preferences,
    )
}

/// Client over `transport`, returning the backing store for inspection.
pub fn client_with(
    transport: Arc<FakeTransport>,
    session: Option<Session>,
) -> (BynonaClient, Arc<MemoryStore>) {
    let (store, sessions, preferences) = parts(session);
    let gateway = Gateway::new(
        Url::parse(TEST_BASE_URL).unwrap(),
        transport,
        sessions,
        preferences,
    );
    (BynonaClient::new(gateway), store)
}
