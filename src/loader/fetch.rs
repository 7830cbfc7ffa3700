//! Host handshake, page fetching and run driving.

use crate::error::{Error, Result};
use crate::query;
use crate::types::{Event, FetchOutcome, Generation, RunPhase, Snapshot};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::FactSheetLoader;

/// Holds the in-flight flag for the duration of one page request
///
/// Released on drop, so an abandoned fetch future does not block later fetches.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::FetchInFlight)?;
        Ok(Self(flag.clone()))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl FactSheetLoader {
    /// Perform the host init/ready handshake
    ///
    /// Runs the executor's handshake exactly once; later calls return
    /// immediately. A failed handshake can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HostInit`] if the host refuses or cannot be reached.
    pub async fn initialize(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| async {
                self.executor.init().await.map_err(|e| match e {
                    Error::HostInit(_) => e,
                    other => Error::HostInit(other.to_string()),
                })?;
                info!(executor = self.executor.name(), "Host handshake complete");
                Ok::<(), Error>(())
            })
            .await?;
        Ok(())
    }

    /// Whether the host handshake has completed
    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Fetch and apply one page
    ///
    /// Builds the request from the current page size and cursor, executes it,
    /// and applies the response if no reset or page size change happened
    /// while it was outstanding. The first page of a run starts the run clock
    /// and the throughput ticker; retrying after a failure restarts the ticker.
    ///
    /// # Returns
    ///
    /// - [`FetchOutcome::Accepted`] - page applied, call again for the next one
    /// - [`FetchOutcome::Complete`] - terminal page applied
    /// - [`FetchOutcome::Discarded`] - the response was stale and dropped
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`initialize`](Self::initialize) has not completed
    /// - Another fetch is in flight
    /// - The run is already complete (call [`reset`](Self::reset) first)
    /// - The executor fails or the payload is malformed; accumulated data is
    ///   left untouched and the run is marked failed
    pub async fn fetch_next_page(&self) -> Result<FetchOutcome> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }
        let _in_flight = InFlightGuard::acquire(&self.in_flight)?;

        let (request, generation, resuming) = {
            let mut state = self.state.lock().await;
            let resuming = state.phase == RunPhase::Failed;
            let request = state.begin_request(Instant::now())?;
            self.publish(&state);
            (request, state.generation, resuming)
        };

        if request.is_first_page() {
            info!(
                generation = generation.0,
                page_size = %request.page_size,
                executor = self.executor.name(),
                "Starting fact sheet run"
            );
            self.emit(Event::RunStarted {
                generation,
                page_size: request.page_size.first(),
            });
            self.start_ticker(generation).await;
        } else if resuming {
            info!(
                generation = generation.0,
                cursor = ?request.cursor,
                "Resuming fact sheet run after failure"
            );
            self.start_ticker(generation).await;
        }

        let response = self.executor.execute(&self.query, request.variables()).await;
        let received_at = Instant::now();
        let page = response.and_then(query::decode_page);

        let mut state = self.state.lock().await;

        if state.generation != generation {
            let current_generation = state.generation;
            state.clear_run();
            self.publish(&state);
            drop(state);

            warn!(
                request_generation = generation.0,
                current_generation = current_generation.0,
                "Discarding stale page response"
            );
            self.emit(Event::PageDiscarded {
                request_generation: generation,
                current_generation,
            });
            return Ok(FetchOutcome::Discarded);
        }

        let dedup_by_id = self.config.loader.dedup_by_id;
        let applied =
            page.and_then(|page| state.apply_page(&request, page, received_at, dedup_by_id));

        match applied {
            Err(e) => {
                state.mark_failed(received_at);
                self.publish(&state);
                drop(state);

                warn!(generation = generation.0, error = %e, "Fact sheet page fetch failed");
                self.emit(Event::FetchFailed {
                    generation,
                    error: e.to_string(),
                });
                self.stop_ticker().await;
                Err(e)
            }
            Ok(applied) => {
                let snapshot = self.publish(&state);
                drop(state);

                debug!(
                    generation = generation.0,
                    page = snapshot.pages_accepted,
                    page_items = applied.page_items,
                    items = snapshot.items.len(),
                    total_count = snapshot.total_count.unwrap_or(0),
                    "Accepted fact sheet page"
                );
                self.emit(Event::PageAccepted {
                    generation,
                    page: snapshot.pages_accepted,
                    page_items: applied.page_items,
                    items: snapshot.items.len(),
                    total_count: snapshot.total_count.unwrap_or(0),
                    percent: (snapshot.completion_ratio() * 100.0) as f32,
                });

                if applied.terminal {
                    self.finish_run(generation, &snapshot).await;
                    Ok(FetchOutcome::Complete)
                } else {
                    Ok(FetchOutcome::Accepted)
                }
            }
        }
    }

    /// Fetch pages until the run completes
    ///
    /// Pages are requested strictly one after another.
    ///
    /// # Errors
    ///
    /// Returns the first fetch error, or [`Error::Superseded`] if a reset or
    /// page size change invalidated the run while it was being driven.
    pub async fn run_to_completion(&self) -> Result<Snapshot> {
        loop {
            match self.fetch_next_page().await? {
                FetchOutcome::Accepted => continue,
                FetchOutcome::Complete => return Ok(self.snapshot()),
                FetchOutcome::Discarded => return Err(Error::Superseded),
            }
        }
    }

    /// Handshake with the host, then load the whole collection
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use factsheet_loader::{Config, FactSheetLoader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let loader = FactSheetLoader::with_http(Config::default())?;
    ///     let snapshot = loader.load_all().await?;
    ///     println!(
    ///         "{} fact sheets in {:?}",
    ///         snapshot.items.len(),
    ///         snapshot.total_latency
    ///     );
    ///     Ok(())
    /// }
    /// ```
    pub async fn load_all(&self) -> Result<Snapshot> {
        self.initialize().await?;
        self.run_to_completion().await
    }

    async fn finish_run(&self, generation: Generation, snapshot: &Snapshot) {
        let first_page_ms = snapshot
            .first_page_latency
            .unwrap_or_default()
            .as_millis() as u64;
        let total_ms = snapshot.total_latency.unwrap_or_default().as_millis() as u64;
        let items_per_second = snapshot.items_per_second().unwrap_or(0.0);

        info!(
            generation = generation.0,
            items = snapshot.items.len(),
            pages = snapshot.pages_accepted,
            first_page_ms,
            total_ms,
            items_per_second,
            "Fact sheet run complete"
        );
        self.emit(Event::RunComplete {
            generation,
            items: snapshot.items.len(),
            total_count: snapshot.total_count.unwrap_or(0),
            first_page_ms,
            total_ms,
            items_per_second,
        });
        self.stop_ticker().await;
    }
}
