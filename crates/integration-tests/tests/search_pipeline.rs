//! Debounced search over HTTP.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bynona_client::api::SearchResultPage;
use bynona_client::{ApiError, BynonaClient, SearchPipeline, SearchSource, SearchStatus};
use bynona_integration_tests::MockApi;
use futures::FutureExt;
use futures::future::BoxFuture;

/// Client wrapper noting each search whose response came back.
struct Recording {
    client: BynonaClient,
    completed: Arc<Mutex<Vec<String>>>,
}

impl SearchSource for Recording {
    fn fetch_page(&self, text: String, page: u32) -> BoxFuture<'_, Result<SearchResultPage, ApiError>> {
        async move {
            let result = self.client.search(&text, page).await;
            self.completed.lock().unwrap().push(text);
            result
        }
        .boxed()
    }
}

#[tokio::test]
async fn test_typing_burst_sends_only_final_text() {
    let api = MockApi::start().await;
    let pipeline = SearchPipeline::new(api.client(), api.config().search);

    for text in ["s", "se", "ser", "seru", "serum"] {
        pipeline.set_query_text(text);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let snapshot = pipeline
        .subscribe()
        .wait_for(|s| s.status == SearchStatus::Loaded)
        .await
        .unwrap()
        .clone();

    assert_eq!(snapshot.items[0].name, "serum #1");
    assert!(snapshot.is_paginated());
    assert_eq!(api.requests_to("/search").len(), 1);
}

#[tokio::test]
async fn test_slow_stale_response_is_discarded() {
    let api = MockApi::start().await;
    api.set_search_delay("abc", Duration::from_millis(600));
    let completed = Arc::new(Mutex::new(Vec::new()));
    let source = Recording {
        client: api.client(),
        completed: Arc::clone(&completed),
    };
    let pipeline = SearchPipeline::new(source, api.config().search);

    pipeline.set_query_text("abc");
    tokio::time::sleep(Duration::from_millis(200)).await;
    pipeline.set_query_text("abcd");

    pipeline
        .subscribe()
        .wait_for(|s| s.status == SearchStatus::Loaded)
        .await
        .unwrap();
    // Outlast the slow "abc" response
    tokio::time::sleep(Duration::from_millis(700)).await;

    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.items[0].name, "abcd #1");
    assert_eq!(api.requests_to("/search").len(), 2);
    assert_eq!(*completed.lock().unwrap(), vec!["abcd", "abc"]);
}

#[tokio::test]
async fn test_pager_fetches_requested_page() {
    let api = MockApi::start().await;
    let pipeline = SearchPipeline::new(api.client(), api.config().search);

    pipeline.set_query_text("serum");
    pipeline
        .subscribe()
        .wait_for(|s| s.status == SearchStatus::Loaded)
        .await
        .unwrap();

    assert!(pipeline.go_to_page(3));
    let snapshot = pipeline
        .subscribe()
        .wait_for(|s| s.status == SearchStatus::Loaded && s.page == 3)
        .await
        .unwrap()
        .clone();

    assert_eq!(snapshot.items[0].name, "serum #3");
    assert!(!pipeline.has_next_page());
}
