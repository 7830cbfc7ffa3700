//! GraphQL execution against the host platform
//!
//! The loader never talks to the network directly. It goes through the
//! [`GraphQlExecutor`] trait, which models the host SDK: a one-time init/ready
//! handshake followed by any number of query executions.
//!
//! ## Implementations
//!
//! - [`HttpExecutor`]: POSTs queries to a GraphQL endpoint with `reqwest`
//!
//! ## Usage
//!
//! ```no_run
//! use factsheet_loader::config::HostConfig;
//! use factsheet_loader::executor::{GraphQlExecutor, HttpExecutor};
//! use factsheet_loader::query::FACT_SHEETS_QUERY;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let executor = HttpExecutor::new(&HostConfig::default())?;
//!     executor.init().await?;
//!
//!     let data = executor
//!         .execute(FACT_SHEETS_QUERY, serde_json::json!({ "first": 100, "after": null }))
//!         .await?;
//!     println!("{}", data);
//!     Ok(())
//! }
//! ```

mod http;
mod traits;

pub use http::HttpExecutor;
pub use traits::GraphQlExecutor;
