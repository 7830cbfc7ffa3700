//! Throughput ticker: periodic rate events while a run is active.

use crate::types::{Event, Generation, Snapshot};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use super::FactSheetLoader;

/// A running ticker task
pub(crate) struct TickerHandle {
    pub cancel_token: CancellationToken,
    #[cfg_attr(not(test), allow(dead_code))]
    pub join_handle: tokio::task::JoinHandle<()>,
}

/// Parameters for spawning a throughput ticker
pub(crate) struct ThroughputTickerParams {
    /// Run the ticker reports on
    pub generation: Generation,
    /// Time between events
    pub period: Duration,
    /// Snapshot source (read-only)
    pub snapshot_rx: watch::Receiver<Snapshot>,
    /// Event broadcast sender
    pub event_tx: broadcast::Sender<Event>,
    /// Cancellation token
    pub cancel_token: CancellationToken,
}

/// Whether the ticker for `generation` should keep running
fn still_running(snapshot: &Snapshot, generation: Generation) -> bool {
    snapshot.generation == generation && snapshot.phase.is_active()
}

/// Spawn a background task that periodically reports the loading rate.
///
/// The task only reads snapshots. It exits when cancelled, when the run it
/// was started for completes, fails or is reset, or when the loader is dropped.
pub(crate) fn spawn_throughput_ticker(
    params: ThroughputTickerParams,
) -> tokio::task::JoinHandle<()> {
    let ThroughputTickerParams {
        generation,
        period,
        mut snapshot_rx,
        event_tx,
        cancel_token,
    } = params;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let snapshot = snapshot_rx.borrow_and_update().clone();
                    if !still_running(&snapshot, generation) {
                        break;
                    }

                    let elapsed = snapshot.elapsed().unwrap_or_default();
                    event_tx
                        .send(Event::Throughput {
                            generation,
                            elapsed_ms: elapsed.as_millis() as u64,
                            items: snapshot.items.len(),
                            items_per_second: snapshot.items_per_second().unwrap_or(0.0),
                        })
                        .ok();
                }
                changed = snapshot_rx.changed() => {
                    // Sender gone: the loader was dropped
                    if changed.is_err() || !still_running(&snapshot_rx.borrow_and_update(), generation) {
                        break;
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }
        tracing::debug!(generation = generation.0, "Throughput ticker stopped");
    })
}

impl FactSheetLoader {
    /// Start the ticker for a new run, replacing any previous one
    pub(crate) async fn start_ticker(&self, generation: Generation) {
        let cancel_token = CancellationToken::new();
        let join_handle = spawn_throughput_ticker(ThroughputTickerParams {
            generation,
            period: self.config.loader.tick_interval,
            snapshot_rx: self.snapshot_tx.subscribe(),
            event_tx: self.event_tx.clone(),
            cancel_token: cancel_token.clone(),
        });

        let previous = self.ticker.lock().await.replace(TickerHandle {
            cancel_token,
            join_handle,
        });
        if let Some(previous) = previous {
            previous.cancel_token.cancel();
        }
    }

    /// Stop the running ticker, if any
    pub(crate) async fn stop_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.cancel_token.cancel();
        }
    }

    /// Take the running ticker's handle so a test can await its exit
    #[cfg(test)]
    pub(crate) async fn take_ticker(&self) -> Option<TickerHandle> {
        self.ticker.lock().await.take()
    }
}
