//! Page size configuration and reset.

use crate::error::Result;
use crate::types::{Event, PageSize};
use tracing::info;

use super::FactSheetLoader;

impl FactSheetLoader {
    /// Set the page size for subsequent fetches
    ///
    /// Does not fetch. Changing to a different size resets the accumulator,
    /// so a response still outstanding for the old size is discarded when it
    /// arrives. Setting the current size again is a no-op.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use factsheet_loader::*;
    /// # async fn example(loader: FactSheetLoader) -> Result<()> {
    /// loader.configure(PageSize::Limited(1000)).await;
    /// loader.run_to_completion().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn configure(&self, page_size: PageSize) {
        let mut state = self.state.lock().await;
        if state.requested_page_size == page_size {
            return;
        }

        let previous = state.requested_page_size;
        state.requested_page_size = page_size;
        let generation = state.reset();
        self.publish(&state);
        drop(state);

        info!(
            generation = generation.0,
            previous = %previous,
            page_size = %page_size,
            "Page size changed, accumulator reset"
        );
        self.emit(Event::Reset { generation });
        self.stop_ticker().await;
    }

    /// Set the page size from a raw value
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `page_size` is not an allowed size.
    pub async fn configure_size(&self, page_size: Option<u32>) -> Result<()> {
        self.configure(PageSize::try_from(page_size)?).await;
        Ok(())
    }

    /// Page size used for the next request
    pub async fn page_size(&self) -> PageSize {
        self.state.lock().await.requested_page_size
    }

    /// Clear items, cursor, totals and timings
    ///
    /// No network effect. Any response still outstanding is discarded when it
    /// arrives, and the throughput ticker is stopped.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        let generation = state.reset();
        self.publish(&state);
        drop(state);

        info!(generation = generation.0, "Fact sheet loader reset");
        self.emit(Event::Reset { generation });
        self.stop_ticker().await;
    }
}
