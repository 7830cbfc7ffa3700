//! Common test utilities for factsheet-loader integration tests

use factsheet_loader::{Config, PageSize};
use serde_json::{Value, json};
use std::ops::Range;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock GraphQL endpoint is served on
pub const GRAPHQL_PATH: &str = "/services/pathfinder/v1/graphql";

/// Config pointing at `server` with a short request timeout
pub fn config_for(server: &MockServer, page_size: PageSize) -> Config {
    let mut config = Config::default();
    config.host.endpoint = format!("{}{}", server.uri(), GRAPHQL_PATH);
    config.host.bearer_token = Some("test-token".to_string());
    config.host.request_timeout = Duration::from_secs(5);
    config.loader.page_size = page_size;
    config.loader.tick_interval = Duration::from_millis(20);
    config
}

/// Full GraphQL response body for one `allFactSheets` page
pub fn page_body(total: u64, ids: Range<u64>, has_next_page: bool, end_cursor: Option<&str>) -> Value {
    let edges: Vec<Value> = ids
        .map(|n| json!({ "node": { "id": format!("fs-{}", n), "name": format!("Application {}", n) } }))
        .collect();
    json!({
        "data": {
            "allFactSheets": {
                "totalCount": total,
                "pageInfo": { "hasNextPage": has_next_page, "endCursor": end_cursor },
                "edges": edges
            }
        }
    })
}

/// Answer the `{ __typename }` init probe
pub async fn mount_probe(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_partial_json(json!({ "query": "query { __typename }" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "__typename": "Query" } })),
        )
        .expect(1)
        .mount(server)
        .await;
}

/// Answer the page request continuing after `after`, exactly once
pub async fn mount_page(server: &MockServer, first: Option<u32>, after: Option<&str>, body: Value) {
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_partial_json(
            json!({ "variables": { "first": first, "after": after } }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}
