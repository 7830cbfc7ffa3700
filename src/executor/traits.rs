//! Trait for host GraphQL execution

use async_trait::async_trait;

/// Host-provided GraphQL execution
///
/// Implementations own transport, authentication and timeouts. They must not
/// retry on their own: a failed execution is reported to the loader, which
/// ends the run.
#[async_trait]
pub trait GraphQlExecutor: Send + Sync {
    /// Init/ready handshake with the host
    ///
    /// Called once by the loader before the first fetch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HostInit`](crate::Error::HostInit) if the host is not
    /// reachable or refuses the session.
    async fn init(&self) -> crate::Result<()>;

    /// Execute `query` with `variables` and return the `data` object
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request cannot be delivered or times out
    /// - The server answers with a non-success status
    /// - The response carries GraphQL `errors`
    /// - The response has no `data`
    async fn execute(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> crate::Result<serde_json::Value>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
