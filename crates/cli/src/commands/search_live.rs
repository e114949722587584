//! Interactive search: every stdin line replaces the query text.
//!
//! Lines are fed to the pipeline as they arrive, so typing quickly
//! exercises the debounce. Special lines:
//!
//! - `:next` / `:prev` - move through result pages
//! - `:close` / `:focus` - close or reopen the results panel
//! - `:clear` - clear the input

use bynona_client::config::SearchConfig;
use bynona_client::{BynonaClient, SearchPipeline, SearchSnapshot, SearchStatus};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::CommandError;
use super::catalog::print_products;

/// Run until stdin closes.
///
/// # Errors
///
/// Returns an error if stdin cannot be read.
pub async fn run(client: BynonaClient, config: SearchConfig) -> Result<(), CommandError> {
    let pipeline = SearchPipeline::new(client, config);
    let mut updates = pipeline.subscribe();

    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            print_snapshot(&snapshot);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            ":next" => {
                let page = pipeline.snapshot().page;
                if pipeline.has_next_page() {
                    pipeline.go_to_page(page + 1);
                }
            }
            ":prev" => {
                let page = pipeline.snapshot().page;
                if pipeline.has_previous_page() {
                    pipeline.go_to_page(page - 1);
                }
            }
            ":close" => pipeline.close_panel(),
            ":focus" => pipeline.focus(),
            ":clear" => pipeline.clear(),
            _ => pipeline.set_query_text(line),
        }
    }

    // Let an in-flight search finish before exiting
    let mut updates = pipeline.subscribe();
    let _ = updates
        .wait_for(|s| matches!(s.status, SearchStatus::Idle | SearchStatus::Loaded))
        .await;
    printer.abort();
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_snapshot(snapshot: &SearchSnapshot) {
    match snapshot.status {
        SearchStatus::Idle => println!("[idle]"),
        SearchStatus::Pending => println!("[waiting] {}", snapshot.text.trim()),
        SearchStatus::Loading => println!("[searching] {}", snapshot.text.trim()),
        SearchStatus::Loaded if !snapshot.panel_open => println!("[closed]"),
        SearchStatus::Loaded => {
            if let Some(error) = &snapshot.error {
                println!("[error] {error}");
            }
            print_products(&snapshot.items);
            if snapshot.is_paginated() {
                println!("-- page {} of {} --", snapshot.page, snapshot.last_page);
            }
        }
    }
}
