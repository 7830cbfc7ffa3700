//! GraphQL query text and response decoding for `allFactSheets`
//!
//! The query shape is a fixed contract with the host:
//! `allFactSheets(first, after) { totalCount pageInfo { hasNextPage endCursor } edges { node { id } } }`.
//! Decoding is all-or-nothing: a payload that lacks any required field is
//! rejected as [`Error::MalformedResponse`] before anything is applied.

use crate::error::{Error, Result};
use crate::types::{Cursor, FactSheet, PageResult};
use serde::Deserialize;

/// Default fact sheet query, requesting only node identifiers
pub const FACT_SHEETS_QUERY: &str = "query ($first: Int = 15000, $after: String) { \
allFactSheets(first: $first, after: $after) { \
totalCount pageInfo { hasNextPage endCursor } edges { node { id } } } }";

/// Build the fact sheet query, selecting `extra_fields` next to `id`
///
/// Field names must already be validated as GraphQL identifiers
/// (see [`Config::validate`](crate::config::Config::validate)).
pub fn build_query(extra_fields: &[String]) -> String {
    if extra_fields.is_empty() {
        return FACT_SHEETS_QUERY.to_string();
    }

    let mut selection = String::from("id");
    for field in extra_fields.iter().filter(|f| f.as_str() != "id") {
        selection.push(' ');
        selection.push_str(field);
    }
    FACT_SHEETS_QUERY.replace("node { id }", &format!("node {{ {} }}", selection))
}

#[derive(Deserialize)]
struct QueryData {
    #[serde(rename = "allFactSheets")]
    all_fact_sheets: Option<Connection>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection {
    total_count: u64,
    page_info: PageInfo,
    edges: Vec<Edge>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    #[serde(default)]
    has_next_page: bool,
    #[serde(default)]
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
struct Edge {
    node: FactSheet,
}

/// Decode the `data` object of a fact sheet query response
pub fn decode_page(data: serde_json::Value) -> Result<PageResult> {
    let data: QueryData = serde_json::from_value(data)
        .map_err(|e| Error::MalformedResponse(format!("unexpected payload shape: {}", e)))?;

    let connection = data
        .all_fact_sheets
        .ok_or_else(|| Error::MalformedResponse("allFactSheets is null".to_string()))?;

    Ok(PageResult {
        total_count: connection.total_count,
        has_next_page: connection.page_info.has_next_page,
        next_cursor: connection.page_info.end_cursor.map(Cursor),
        items: connection.edges.into_iter().map(|edge| edge.node).collect(),
    })
}
