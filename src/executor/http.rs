//! HTTP GraphQL executor

use super::traits::GraphQlExecutor;
use crate::config::HostConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Query sent during the init handshake when `probe_on_init` is enabled
const PROBE_QUERY: &str = "query { __typename }";

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

/// GraphQL executor that POSTs JSON requests to the configured endpoint
///
/// # Examples
///
/// ```no_run
/// use factsheet_loader::config::HostConfig;
/// use factsheet_loader::executor::HttpExecutor;
///
/// let host = HostConfig {
///     endpoint: "https://eu.example.com/services/pathfinder/v1/graphql".to_string(),
///     bearer_token: Some("token".to_string()),
///     ..Default::default()
/// };
/// let executor = HttpExecutor::new(&host).expect("valid host config");
/// ```
pub struct HttpExecutor {
    /// HTTP client with timeout and user agent applied
    http_client: reqwest::Client,

    endpoint: String,

    bearer_token: Option<String>,

    probe_on_init: bool,
}

impl HttpExecutor {
    /// Create a new HTTP executor
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(host: &HostConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(host.request_timeout)
            .user_agent(host.user_agent.clone())
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: host.endpoint.clone(),
            bearer_token: host.bearer_token.clone(),
            probe_on_init: host.probe_on_init,
        })
    }

    async fn post(&self, query: &str, variables: serde_json::Value) -> Result<GraphQlResponse> {
        let mut request = self
            .http_client
            .post(&self.endpoint)
            .json(&GraphQlRequest { query, variables });
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        // Check HTTP status before trying to parse the response body
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "GraphQL endpoint returned HTTP {}: {}",
                status.as_u16(),
                self.endpoint
            )));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| Error::MalformedResponse(format!("response is not GraphQL JSON: {}", e)))
    }
}

#[async_trait]
impl GraphQlExecutor for HttpExecutor {
    async fn init(&self) -> Result<()> {
        if !self.probe_on_init {
            return Ok(());
        }

        debug!(endpoint = %self.endpoint, "Probing GraphQL endpoint");
        let response = self
            .post(PROBE_QUERY, serde_json::json!({}))
            .await
            .map_err(|e| Error::HostInit(e.to_string()))?;
        if !response.errors.is_empty() {
            let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
            return Err(Error::HostInit(messages.join("; ")));
        }
        Ok(())
    }

    async fn execute(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let response = self.post(query, variables).await?;

        if !response.errors.is_empty() {
            return Err(Error::GraphQl {
                messages: response.errors.into_iter().map(|e| e.message).collect(),
            });
        }

        response
            .data
            .filter(|data| !data.is_null())
            .ok_or_else(|| Error::MalformedResponse("response has no data".to_string()))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
