//! Debounced, paginated search-as-you-type.
//!
//! [`SearchPipeline`] turns rapidly changing input text into a rate-limited
//! sequence of search requests:
//!
//! - text shorter than the threshold (2 characters by default) clears the
//!   results and closes the panel without touching the network
//! - every keystroke restarts a quiet-period timer (400 ms by default); only
//!   when it elapses is page 1 requested
//! - pager navigation requests another page immediately
//! - a response is applied only if its text and page still match what the
//!   shopper is asking for; superseded responses are dropped on arrival
//!
//! State is published through a `tokio::sync::watch` channel so a UI can
//! redraw on every change.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::{Product, SearchResultPage};
use crate::config::SearchConfig;
use crate::error::ApiError;

/// Backend the pipeline fetches result pages from.
pub trait SearchSource: Send + Sync {
    fn fetch_page(&self, text: String, page: u32) -> BoxFuture<'_, Result<SearchResultPage, ApiError>>;
}

/// Where the pipeline is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStatus {
    /// Text below the threshold; nothing pending, no results.
    #[default]
    Idle,
    /// Waiting for typing to pause.
    Pending,
    /// A request for the current query is in flight.
    Loading,
    /// The response for the current query has been applied.
    Loaded,
}

/// Read-only view of the pipeline state.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSnapshot {
    pub status: SearchStatus,
    /// Text as typed, untrimmed.
    pub text: String,
    pub items: Vec<Product>,
    /// Page the current items belong to.
    pub page: u32,
    pub last_page: u32,
    pub panel_open: bool,
    /// Message of the last failed request, cleared by the next success.
    pub error: Option<String>,
}

impl Default for SearchSnapshot {
    fn default() -> Self {
        Self {
            status: SearchStatus::Idle,
            text: String::new(),
            items: Vec::new(),
            page: 1,
            last_page: 1,
            panel_open: false,
            error: None,
        }
    }
}

impl SearchSnapshot {
    /// Whether the pager should be shown.
    #[must_use]
    pub fn is_paginated(&self) -> bool {
        self.status == SearchStatus::Loaded && self.last_page > 1
    }
}

/// The parameters a response must match to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Trimmed query text.
    pub text: String,
    pub page: u32,
}

#[derive(Default)]
struct Control {
    target: Option<SearchQuery>,
    debounce: Option<JoinHandle<()>>,
}

/// Search-as-you-type state machine.
///
/// Must be driven from within a Tokio runtime. Cloning is cheap; clones
/// drive the same state.
pub struct SearchPipeline<S> {
    inner: Arc<PipelineInner<S>>,
}

impl<S> Clone for SearchPipeline<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PipelineInner<S> {
    source: S,
    config: SearchConfig,
    state: watch::Sender<SearchSnapshot>,
    control: Mutex<Control>,
}

impl<S> std::fmt::Debug for SearchPipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchPipeline")
            .field("config", &self.inner.config)
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl<S: SearchSource + 'static> SearchPipeline<S> {
    #[must_use]
    pub fn new(source: S, config: SearchConfig) -> Self {
        let (state, _) = watch::channel(SearchSnapshot::default());
        Self {
            inner: Arc::new(PipelineInner {
                source,
                config: SearchConfig {
                    min_chars: config.min_chars.max(1),
                    ..config
                },
                state,
                control: Mutex::new(Control::default()),
            }),
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> SearchSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Observe every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.inner.state.subscribe()
    }

    /// The query responses are currently matched against.
    #[must_use]
    pub fn current_query(&self) -> Option<SearchQuery> {
        self.inner.lock().target.clone()
    }

    /// Handle a change of the input text.
    ///
    /// Below the threshold the pipeline goes idle immediately. Otherwise the
    /// debounce timer restarts and page 1 of the new text is requested once
    /// it elapses.
    pub fn set_query_text(&self, text: impl Into<String>) {
        let text = text.into();
        let trimmed = text.trim().to_string();
        let mut control = self.inner.lock();

        if let Some(timer) = control.debounce.take() {
            timer.abort();
        }

        if trimmed.chars().count() < self.inner.config.min_chars {
            control.target = None;
            self.inner.state.send_modify(|s| {
                *s = SearchSnapshot {
                    text,
                    ..SearchSnapshot::default()
                };
            });
            return;
        }

        let query = SearchQuery {
            text: trimmed,
            page: 1,
        };
        control.target = Some(query.clone());
        self.inner.state.send_modify(|s| {
            s.text = text;
            s.status = SearchStatus::Pending;
        });

        let inner = Arc::clone(&self.inner);
        // Only the wait is abortable; once started, a search runs to completion
        control.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.config.debounce).await;
            tokio::spawn(async move { inner.load(query, false).await });
        }));
    }

    /// Request another page of the current results, skipping the debounce.
    ///
    /// Only honoured while results are shown, the query spans several pages
    /// and `page` is within range and different from the current one.
    /// Returns whether a request was started.
    pub fn go_to_page(&self, page: u32) -> bool {
        let mut control = self.inner.lock();
        let Some(target) = control.target.clone() else {
            return false;
        };

        {
            let state = self.inner.state.borrow();
            if state.status != SearchStatus::Loaded
                || state.last_page <= 1
                || !(1..=state.last_page).contains(&page)
                || page == state.page
            {
                return false;
            }
        }

        let query = SearchQuery { page, ..target };
        control.target = Some(query.clone());
        drop(control);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.load(query, true).await });
        true
    }

    /// Close the results panel, keeping the text (click outside).
    pub fn close_panel(&self) {
        self.inner.state.send_if_modified(|s| {
            let was_open = s.panel_open;
            s.panel_open = false;
            was_open
        });
    }

    /// Reopen the results panel if the text meets the threshold (input focus).
    pub fn focus(&self) {
        let min_chars = self.inner.config.min_chars;
        self.inner.state.send_if_modified(|s| {
            let reopen = !s.panel_open && s.text.trim().chars().count() >= min_chars;
            if reopen {
                s.panel_open = true;
            }
            reopen
        });
    }

    /// Empty the text and close the panel (the input's clear button).
    pub fn clear(&self) {
        self.set_query_text(String::new());
    }

    #[must_use]
    pub fn has_previous_page(&self) -> bool {
        let state = self.inner.state.borrow();
        state.is_paginated() && state.page > 1
    }

    #[must_use]
    pub fn has_next_page(&self) -> bool {
        let state = self.inner.state.borrow();
        state.is_paginated() && state.page < state.last_page
    }
}

impl<S: SearchSource> PipelineInner<S> {
    fn lock(&self) -> std::sync::MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, query: &SearchQuery) -> bool {
        self.lock().target.as_ref() == Some(query)
    }

    /// Fetch `query` and apply the response if it is still wanted.
    async fn load(&self, query: SearchQuery, page_change: bool) {
        if !self.is_current(&query) {
            return;
        }
        self.state.send_modify(|s| {
            s.status = SearchStatus::Loading;
            s.panel_open = true;
        });

        let result = self
            .source
            .fetch_page(query.text.clone(), query.page)
            .await;

        let control = self.lock();
        if control.target.as_ref() != Some(&query) {
            debug!(text = %query.text, page = query.page, "Discarding stale search response");
            return;
        }

        self.state.send_modify(|s| {
            s.status = SearchStatus::Loaded;
            match result {
                Ok(page) => {
                    s.items = page.items;
                    s.page = page.page;
                    s.last_page = page.last_page.max(1);
                    s.error = None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, text = %query.text, page = query.page, "Search failed");
                    s.error = Some(e.user_message());
                    if !page_change {
                        s.items.clear();
                        s.page = 1;
                        s.last_page = 1;
                    }
                }
            }
        });
        drop(control);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;

    use futures::FutureExt;
    use serde_json::json;

    use super::*;
    use crate::error::TransportError;

    /// Every page holds one product named after the query; three pages total.
    #[derive(Default)]
    struct FakeSource {
        calls: Mutex<Vec<(String, u32)>>,
        completed: Mutex<Vec<(String, u32)>>,
        latency: HashMap<String, Duration>,
        failing: Mutex<HashSet<(String, u32)>>,
    }

    impl FakeSource {
        fn with_latency(mut self, text: &str, latency: Duration) -> Self {
            self.latency.insert(text.to_string(), latency);
            self
        }

        fn fail(&self, text: &str, page: u32) {
            self.failing.lock().unwrap().insert((text.to_string(), page));
        }
    }

    impl SearchSource for Arc<FakeSource> {
        fn fetch_page(&self, text: String, page: u32) -> BoxFuture<'_, Result<SearchResultPage, ApiError>> {
            self.calls.lock().unwrap().push((text.clone(), page));
            let latency = self.latency.get(&text).copied().unwrap_or_default();
            let fails = self.failing.lock().unwrap().contains(&(text.clone(), page));
            async move {
                tokio::time::sleep(latency).await;
                self.completed.lock().unwrap().push((text.clone(), page));
                if fails {
                    return Err(ApiError::NetworkUnreachable(TransportError::Timeout));
                }
                let item = serde_json::from_value(json!({"id": page, "name": format!("{text} #{page}")}))
                    .unwrap();
                Ok(SearchResultPage {
                    items: vec![item],
                    page,
                    last_page: 3,
                })
            }
            .boxed()
        }
    }

    fn pipeline(source: &Arc<FakeSource>) -> SearchPipeline<Arc<FakeSource>> {
        SearchPipeline::new(Arc::clone(source), SearchConfig::default())
    }

    async fn settled(pipeline: &SearchPipeline<Arc<FakeSource>>) -> SearchSnapshot {
        pipeline
            .subscribe()
            .wait_for(|s| s.status == SearchStatus::Loaded)
            .await
            .unwrap()
            .clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_typing_issues_one_request() {
        let source = Arc::new(FakeSource::default());
        let search = pipeline(&source);

        for text in ["p", "ph", "pho", "phon", "phone"] {
            search.set_query_text(text);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let snapshot = settled(&search).await;

        assert_eq!(*source.calls.lock().unwrap(), vec![("phone".to_string(), 1)]);
        assert_eq!(snapshot.items[0].name, "phone #1");
        assert!(snapshot.panel_open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_never_overwrites_newer_query() {
        let source = Arc::new(FakeSource::default().with_latency("abc", Duration::from_millis(1000)));
        let search = pipeline(&source);

        search.set_query_text("abc");
        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(search.snapshot().status, SearchStatus::Loading);

        search.set_query_text("abcd");
        let snapshot = settled(&search).await;
        assert_eq!(snapshot.items[0].name, "abcd #1");

        // Let the slow "abc" response arrive
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(source.calls.lock().unwrap().len(), 2);
        assert_eq!(
            *source.completed.lock().unwrap(),
            vec![("abcd".to_string(), 1), ("abc".to_string(), 1)],
            "superseded search runs to completion"
        );
        let snapshot = search.snapshot();
        assert_eq!(snapshot.items[0].name, "abcd #1");
        assert_eq!(snapshot.status, SearchStatus::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_and_timer_start() {
        let source = Arc::new(FakeSource::default());
        let search = pipeline(&source);

        search.set_query_text("a");
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let snapshot = search.snapshot();
        assert_eq!(snapshot.status, SearchStatus::Idle);
        assert!(!snapshot.panel_open);
        assert!(source.calls.lock().unwrap().is_empty());

        search.set_query_text("ab");
        assert_eq!(search.snapshot().status, SearchStatus::Pending);
        tokio::time::sleep(Duration::from_millis(399)).await;
        assert!(source.calls.lock().unwrap().is_empty());

        settled(&search).await;
        assert_eq!(*source.calls.lock().unwrap(), vec![("ab".to_string(), 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_whitespace_does_not_count_towards_threshold() {
        let source = Arc::new(FakeSource::default());
        let search = pipeline(&source);

        search.set_query_text("  a   ");
        assert_eq!(search.snapshot().status, SearchStatus::Idle);
        assert!(search.current_query().is_none());

        search.set_query_text("  ab ");
        assert_eq!(
            search.current_query(),
            Some(SearchQuery {
                text: "ab".to_string(),
                page: 1
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_below_threshold_goes_idle() {
        let source = Arc::new(FakeSource::default());
        let search = pipeline(&source);

        search.set_query_text("phone");
        settled(&search).await;
        search.set_query_text("p");

        let snapshot = search.snapshot();
        assert_eq!(snapshot.status, SearchStatus::Idle);
        assert!(snapshot.items.is_empty());
        assert!(!snapshot.panel_open);
        assert_eq!(snapshot.text, "p");
    }

    #[tokio::test(start_paused = true)]
    async fn test_go_to_page_is_immediate_and_bounded() {
        let source = Arc::new(FakeSource::default());
        let search = pipeline(&source);

        assert!(!search.go_to_page(2));
        search.set_query_text("phone");
        assert!(!search.go_to_page(2), "not while pending");
        settled(&search).await;
        assert!(!search.has_previous_page());
        assert!(search.has_next_page());

        assert!(!search.go_to_page(0));
        assert!(!search.go_to_page(4));
        assert!(!search.go_to_page(1));

        assert!(search.go_to_page(3));
        let snapshot = search
            .subscribe()
            .wait_for(|s| s.status == SearchStatus::Loaded && s.page == 3)
            .await
            .unwrap()
            .clone();

        assert_eq!(snapshot.items[0].name, "phone #3");
        assert!(search.has_previous_page());
        assert!(!search.has_next_page());
        // No debounce before the page request
        assert_eq!(source.calls.lock().unwrap()[1], ("phone".to_string(), 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_text_resets_to_first_page() {
        let source = Arc::new(FakeSource::default());
        let search = pipeline(&source);

        search.set_query_text("phone");
        settled(&search).await;
        search.go_to_page(2);
        search
            .subscribe()
            .wait_for(|s| s.status == SearchStatus::Loaded && s.page == 2)
            .await
            .unwrap();

        search.set_query_text("phones");
        let snapshot = settled(&search).await;
        assert_eq!(snapshot.page, 1);
        assert_eq!(source.calls.lock().unwrap().last(), Some(&("phones".to_string(), 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_page_change_keeps_previous_items() {
        let source = Arc::new(FakeSource::default());
        source.fail("phone", 2);
        let search = pipeline(&source);

        search.set_query_text("phone");
        settled(&search).await;
        search.go_to_page(2);
        let snapshot = search
            .subscribe()
            .wait_for(|s| s.error.is_some())
            .await
            .unwrap()
            .clone();

        assert_eq!(snapshot.status, SearchStatus::Loaded);
        assert_eq!(snapshot.items[0].name, "phone #1");
        assert_eq!(snapshot.page, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_new_text_shows_empty_open_panel() {
        let source = Arc::new(FakeSource::default());
        source.fail("phone", 1);
        let search = pipeline(&source);

        search.set_query_text("phone");
        let snapshot = settled(&search).await;

        assert!(snapshot.items.is_empty());
        assert!(snapshot.panel_open);
        assert!(snapshot.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_focus_and_clear() {
        let source = Arc::new(FakeSource::default());
        let search = pipeline(&source);

        search.set_query_text("phone");
        settled(&search).await;

        search.close_panel();
        let snapshot = search.snapshot();
        assert!(!snapshot.panel_open);
        assert_eq!(snapshot.text, "phone");
        assert_eq!(snapshot.items.len(), 1);

        search.focus();
        assert!(search.snapshot().panel_open);

        search.clear();
        let snapshot = search.snapshot();
        assert!(snapshot.text.is_empty());
        assert!(!snapshot.panel_open);
        assert_eq!(snapshot.status, SearchStatus::Idle);

        search.focus();
        assert!(!search.snapshot().panel_open);
    }
}
