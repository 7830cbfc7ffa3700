//! # factsheet-loader
//!
//! Paginated loader for the `allFactSheets` GraphQL collection of an
//! enterprise-architecture host, with load-time telemetry.
//!
//! ## Design Philosophy
//!
//! factsheet-loader is designed to be:
//! - **Strictly sequential** - One page request in flight at a time, always
//!   continuing from the last `endCursor`
//! - **Stale-safe** - A reset or page size change invalidates any response
//!   still outstanding; it is dropped instead of mixed into the new run
//! - **Library-first** - No UI, presentation code reads snapshots and events
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use factsheet_loader::{Config, Event, FactSheetLoader, PageSize};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.host.endpoint = "https://eam.example.com/graphql".to_string();
//!     config.host.bearer_token = Some("token".to_string());
//!     config.loader.page_size = PageSize::Limited(1000);
//!
//!     let loader = FactSheetLoader::with_http(config)?;
//!
//!     // Subscribe to events
//!     let mut events = loader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let Event::Throughput { items_per_second, .. } = event {
//!                 println!("{:.0} fact sheets/s", items_per_second);
//!             }
//!         }
//!     });
//!
//!     let snapshot = loader.load_all().await?;
//!     println!(
//!         "{} of {:?} fact sheets, first page after {:?}, done after {:?}",
//!         snapshot.items.len(),
//!         snapshot.total_count,
//!         snapshot.first_page_latency,
//!         snapshot.total_latency
//!     );
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Host GraphQL execution
pub mod executor;
/// Paginated loader (decomposed into focused submodules)
pub mod loader;
/// Query text and response decoding
pub mod query;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, HostConfig, LoaderConfig};
pub use error::{Error, Result};
pub use executor::{GraphQlExecutor, HttpExecutor};
pub use loader::FactSheetLoader;
pub use types::{
    Cursor, Event, FactSheet, FetchOutcome, Generation, Items, PageRequest, PageResult, PageSize,
    RunPhase, Snapshot,
};
