use super::test_helpers::*;
use super::*;
use crate::error::Error;
use crate::types::{Cursor, FetchOutcome, PageSize, RunPhase};
use serde_json::json;
use std::time::Duration;


/// Everything currently buffered on an event receiver
fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Buffered events without the periodic throughput noise
fn lifecycle_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    drain_events(rx)
        .into_iter()
        .filter(|event| !matches!(event, Event::Throughput { .. }))
        .collect()
}

/// Run `fetch_next_page` on its own task
fn spawn_fetch(loader: &FactSheetLoader) -> tokio::task::JoinHandle<crate::Result<FetchOutcome>> {
    let loader = loader.clone();
    tokio::spawn(async move { loader.fetch_next_page().await })
}

/// State every reset must produce
fn assert_post_reset(snapshot: &Snapshot) {
    assert!(snapshot.items.is_empty(), "items should be empty");
    assert_eq!(snapshot.cursor, None);
    assert_eq!(snapshot.total_count, None);
    assert_eq!(snapshot.completion_ratio(), 0.0);
    assert_eq!(snapshot.phase, RunPhase::Idle);
    assert_eq!(snapshot.started_at, None);
    assert_eq!(snapshot.first_page_latency, None);
    assert_eq!(snapshot.total_latency, None);
    assert_eq!(snapshot.pages_accepted, 0);
}
