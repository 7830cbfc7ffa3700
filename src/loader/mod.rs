//! Paginated fact sheet loader split into focused submodules.
//!
//! The `FactSheetLoader` struct and its methods are organized by concern:
//! - [`state`] - Accumulator state and its transitions
//! - [`fetch`] - Host handshake, page fetching and run driving
//! - [`control`] - Page size configuration and reset
//! - [`ticker`] - Throughput reporting while a run is active

mod control;
mod fetch;
mod state;
mod ticker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::error::Result;
use crate::executor::{GraphQlExecutor, HttpExecutor};
use crate::query;
use crate::types::{Event, Snapshot};
use state::AccumulatorState;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use ticker::TickerHandle;
use tokio::sync::{Mutex, OnceCell, broadcast, watch};
use tokio_stream::wrappers::WatchStream;

/// Paginated fact sheet loader (cloneable - all fields are Arc-wrapped)
///
/// Drives `allFactSheets` pagination one page at a time, accumulating items
/// and timing telemetry. State is written only by the loader itself;
/// presentation code reads it through [`snapshot`](Self::snapshot),
/// [`watch_snapshots`](Self::watch_snapshots) or [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct FactSheetLoader {
    /// Host GraphQL execution (trait object for pluggable transports)
    pub(crate) executor: Arc<dyn GraphQlExecutor>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Query text, built once from the configured node fields
    pub(crate) query: Arc<str>,
    /// Accumulator state; never locked across an executor call
    pub(crate) state: Arc<Mutex<AccumulatorState>>,
    /// Set while a page request is outstanding
    pub(crate) in_flight: Arc<AtomicBool>,
    /// Completed host handshake
    pub(crate) initialized: Arc<OnceCell<()>>,
    /// Latest published snapshot
    pub(crate) snapshot_tx: Arc<watch::Sender<Snapshot>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Running throughput ticker, if any
    pub(crate) ticker: Arc<Mutex<Option<TickerHandle>>>,
}

impl FactSheetLoader {
    /// Create a new loader on top of a host executor
    ///
    /// Validates the configuration. No network traffic happens until
    /// [`initialize`](Self::initialize).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use factsheet_loader::{Config, FactSheetLoader, HttpExecutor};
    /// use std::sync::Arc;
    ///
    /// # fn example() -> factsheet_loader::Result<()> {
    /// let config = Config::default();
    /// let executor = Arc::new(HttpExecutor::new(&config.host)?);
    /// let loader = FactSheetLoader::new(config, executor)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: Config, executor: Arc<dyn GraphQlExecutor>) -> Result<Self> {
        config.validate()?;

        let state = AccumulatorState::new(config.loader.page_size);
        let (snapshot_tx, _rx) = watch::channel(state.snapshot());
        let (event_tx, _rx) = broadcast::channel(config.loader.event_buffer);
        let query = query::build_query(&config.loader.node_fields);

        tracing::debug!(
            executor = executor.name(),
            page_size = %config.loader.page_size,
            dedup_by_id = config.loader.dedup_by_id,
            "Fact sheet loader created"
        );

        Ok(Self {
            executor,
            config: Arc::new(config),
            query: query.into(),
            state: Arc::new(Mutex::new(state)),
            in_flight: Arc::new(AtomicBool::new(false)),
            initialized: Arc::new(OnceCell::new()),
            snapshot_tx: Arc::new(snapshot_tx),
            event_tx,
            ticker: Arc::new(Mutex::new(None)),
        })
    }

    /// Create a loader that talks to the configured endpoint over HTTP
    pub fn with_http(config: Config) -> Result<Self> {
        let executor = Arc::new(HttpExecutor::new(&config.host)?);
        Self::new(config, executor)
    }

    /// Subscribe to loader events
    ///
    /// Each subscriber receives all events independently. A subscriber that
    /// falls behind by more than `loader.event_buffer` events receives
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver that is notified on every published snapshot
    pub fn watch_snapshots(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Snapshots as a stream, starting with the current one
    pub fn snapshot_stream(&self) -> WatchStream<Snapshot> {
        WatchStream::new(self.snapshot_tx.subscribe())
    }

    /// Current configuration
    pub fn config(&self) -> Arc<Config> {
        self.config.clone()
    }

    /// Query text sent for every page
    pub fn query(&self) -> &str {
        &self.query
    }

    pub(crate) fn publish(&self, state: &AccumulatorState) -> Snapshot {
        let snapshot = state.snapshot();
        self.snapshot_tx.send_replace(snapshot.clone());
        snapshot
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}
