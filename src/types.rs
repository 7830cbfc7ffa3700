//! Core types for factsheet-loader

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Page sizes the endpoint accepts as an explicit `first` argument
pub const ALLOWED_PAGE_SIZES: [u32; 5] = [100, 500, 1000, 5000, 15000];

/// Number of items requested per page
///
/// Serialized as the integer size, or `null` for [`PageSize::Unbounded`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Option<u32>", into = "Option<u32>")]
pub enum PageSize {
    /// One of [`ALLOWED_PAGE_SIZES`]
    Limited(u32),
    /// Let the server pick its maximum (`first: null`)
    Unbounded,
}

impl PageSize {
    /// Value sent as the `first` variable
    pub fn first(&self) -> Option<u32> {
        match self {
            PageSize::Limited(n) => Some(*n),
            PageSize::Unbounded => None,
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::Limited(100)
    }
}

impl TryFrom<u32> for PageSize {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        if ALLOWED_PAGE_SIZES.contains(&value) {
            Ok(PageSize::Limited(value))
        } else {
            Err(Error::config(
                "loader.page_size",
                format!(
                    "page size {} is not one of {:?} (or null for unbounded)",
                    value, ALLOWED_PAGE_SIZES
                ),
            ))
        }
    }
}

impl TryFrom<Option<u32>> for PageSize {
    type Error = Error;

    fn try_from(value: Option<u32>) -> Result<Self> {
        match value {
            Some(n) => PageSize::try_from(n),
            None => Ok(PageSize::Unbounded),
        }
    }
}

impl From<PageSize> for Option<u32> {
    fn from(size: PageSize) -> Self {
        size.first()
    }
}

impl std::fmt::Display for PageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageSize::Limited(n) => write!(f, "{}", n),
            PageSize::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Opaque pagination cursor returned by the endpoint as `endCursor`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub String);

impl Cursor {
    /// Create a cursor from its raw value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw cursor value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration generation a request was issued under
///
/// Bumped by every reset and every page size change. A response is applied
/// only if the loader is still on the generation its request was stamped with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation that follows this one
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single page request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// Page size in effect when the request was built
    pub page_size: PageSize,
    /// Cursor to continue after (`None` = first page)
    pub cursor: Option<Cursor>,
}

impl PageRequest {
    /// Whether this request starts a new run
    pub fn is_first_page(&self) -> bool {
        self.cursor.is_none()
    }

    /// GraphQL variables for the fact sheet query
    pub fn variables(&self) -> serde_json::Value {
        serde_json::json!({
            "first": self.page_size.first(),
            "after": self.cursor.as_ref().map(Cursor::as_str),
        })
    }
}

/// A fact sheet node
///
/// Only `id` is guaranteed; every other field requested through the query is
/// kept verbatim in `fields`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactSheet {
    /// Fact sheet identifier
    pub id: String,
    /// Remaining node fields as returned by the endpoint
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl FactSheet {
    /// Create a fact sheet with only an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: serde_json::Map::new(),
        }
    }
}

/// A decoded page of results
#[derive(Clone, Debug, PartialEq)]
pub struct PageResult {
    /// Total number of fact sheets in the collection
    pub total_count: u64,
    /// Whether another page follows
    pub has_next_page: bool,
    /// Cursor for the next page
    pub next_cursor: Option<Cursor>,
    /// Items in the order the endpoint returned them
    pub items: Vec<FactSheet>,
}

impl PageResult {
    /// Whether this page ends the run
    pub fn is_terminal(&self) -> bool {
        !self.has_next_page || self.total_count == 0
    }
}

/// Accumulated items, stored as shared pages
///
/// Cloning is cheap: pages are reference counted, so snapshots share storage
/// with the loader instead of copying every item on each publish.
#[derive(Clone, Debug, Default)]
pub struct Items {
    pages: Vec<Arc<[FactSheet]>>,
    len: usize,
}

impl Items {
    /// Number of items across all pages
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no items have been accepted
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of stored pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Iterate items in acceptance order
    pub fn iter(&self) -> impl Iterator<Item = &FactSheet> {
        self.pages.iter().flat_map(|page| page.iter())
    }

    /// Copy items into a flat vector
    pub fn to_vec(&self) -> Vec<FactSheet> {
        self.iter().cloned().collect()
    }

    pub(crate) fn push_page(&mut self, page: Vec<FactSheet>) {
        if page.is_empty() {
            return;
        }
        self.len += page.len();
        self.pages.push(page.into());
    }

    pub(crate) fn clear(&mut self) {
        self.pages.clear();
        self.len = 0;
    }
}

impl Serialize for Items {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Phase of a loading run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Nothing loaded, nothing in flight
    #[default]
    Idle,
    /// The first page of a run is being fetched
    FirstPageInFlight,
    /// At least one page accepted, more to come
    Accumulating,
    /// A follow-up page is being fetched
    PageInFlight,
    /// Terminal page accepted
    Complete,
    /// The last fetch failed; accumulated data is kept as it was
    Failed,
}

impl RunPhase {
    /// Whether a request is outstanding for the current generation
    pub fn is_loading(&self) -> bool {
        matches!(self, RunPhase::FirstPageInFlight | RunPhase::PageInFlight)
    }

    /// Whether the run is between start and completion
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunPhase::FirstPageInFlight | RunPhase::Accumulating | RunPhase::PageInFlight
        )
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::FirstPageInFlight => "fetching first page",
            RunPhase::Accumulating => "accumulating",
            RunPhase::PageInFlight => "fetching page",
            RunPhase::Complete => "complete",
            RunPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a single `fetch_next_page` call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Page applied, more pages follow
    Accepted,
    /// Terminal page applied, run complete
    Complete,
    /// Response belonged to an older generation and was dropped
    Discarded,
}

/// Immutable read-only view of the loader state
///
/// Published after every state change. Reading a snapshot never blocks the
/// fetch loop. Serializes for presentation layers; the monotonic
/// `started_at` is skipped and latencies are written in milliseconds.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Snapshot {
    /// Generation the state belongs to
    pub generation: Generation,
    /// Current run phase
    pub phase: RunPhase,
    /// Page size requested for upcoming fetches
    pub page_size: PageSize,
    /// Cursor the next fetch continues after
    pub cursor: Option<Cursor>,
    /// Total reported by the most recent accepted page
    pub total_count: Option<u64>,
    /// Accumulated fact sheets
    pub items: Items,
    /// Number of pages accepted in this run
    pub pages_accepted: u32,
    /// Monotonic run start (first request issued)
    #[serde(skip)]
    pub started_at: Option<Instant>,
    /// Wall-clock run start
    pub run_started_at: Option<DateTime<Utc>>,
    /// Time from run start until the first page was accepted
    #[serde(with = "opt_millis_serde")]
    pub first_page_latency: Option<Duration>,
    /// Time from run start until the terminal page was accepted
    #[serde(with = "opt_millis_serde")]
    pub total_latency: Option<Duration>,
    /// Time from run start until the last fetch failed; cleared by a retry
    #[serde(with = "opt_millis_serde")]
    pub failed_after: Option<Duration>,
}

impl Snapshot {
    /// Whether a fetch for this generation is outstanding
    pub fn loading(&self) -> bool {
        self.phase.is_loading()
    }

    /// Whether the run has finished
    pub fn is_complete(&self) -> bool {
        self.phase == RunPhase::Complete
    }

    /// Fraction of the collection loaded, in `[0, 1]`
    ///
    /// Zero when the total is unknown or zero.
    pub fn completion_ratio(&self) -> f64 {
        completion_ratio(self.items.len(), self.total_count)
    }

    /// Completion as a whole percentage
    pub fn completion_percent(&self) -> u8 {
        (self.completion_ratio() * 100.0).round() as u8
    }

    /// Time spent on the run
    ///
    /// Frozen at `total_latency` once complete and at `failed_after` while
    /// the run is stopped on a failure.
    pub fn elapsed(&self) -> Option<Duration> {
        self.total_latency
            .or(self.failed_after)
            .or_else(|| self.started_at.map(|started| started.elapsed()))
    }

    /// Download rate over the run so far
    pub fn items_per_second(&self) -> Option<f64> {
        self.elapsed()
            .map(|elapsed| items_per_second(self.items.len(), elapsed))
    }
}

// Optional duration serialization helper (milliseconds)
mod opt_millis_serde {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }
}

/// `items / total`, guarding against an unknown or zero total
pub(crate) fn completion_ratio(items: usize, total: Option<u64>) -> f64 {
    match total {
        Some(total) if total > 0 => (items as f64 / total as f64).min(1.0),
        _ => 0.0,
    }
}

/// `items / elapsed`, zero when no time has elapsed
pub(crate) fn items_per_second(items: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { items as f64 / secs } else { 0.0 }
}

/// Loader events
///
/// Broadcast to every subscriber. Durations are reported in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// First page of a run requested
    RunStarted {
        /// Generation of the run
        generation: Generation,
        /// Page size of the run (`None` = unbounded)
        page_size: Option<u32>,
    },

    /// A page was applied
    PageAccepted {
        /// Generation of the run
        generation: Generation,
        /// 1-based page number within the run
        page: u32,
        /// Items accepted from this page
        page_items: usize,
        /// Items accumulated so far
        items: usize,
        /// Total reported by the endpoint
        total_count: u64,
        /// Completion percentage (0.0 to 100.0)
        percent: f32,
    },

    /// A stale response was dropped
    PageDiscarded {
        /// Generation the request was issued under
        request_generation: Generation,
        /// Generation in effect when the response arrived
        current_generation: Generation,
    },

    /// Terminal page applied
    RunComplete {
        /// Generation of the run
        generation: Generation,
        /// Items accumulated
        items: usize,
        /// Total reported by the endpoint
        total_count: u64,
        /// Time to first results
        first_page_ms: u64,
        /// Total loading time
        total_ms: u64,
        /// Average rate over the run
        items_per_second: f64,
    },

    /// A fetch failed and the run stopped
    FetchFailed {
        /// Generation of the run
        generation: Generation,
        /// Error message
        error: String,
    },

    /// Accumulator cleared
    Reset {
        /// Generation that starts with this reset
        generation: Generation,
    },

    /// Periodic rate update while a run is active
    Throughput {
        /// Generation of the run
        generation: Generation,
        /// Time since run start
        elapsed_ms: u64,
        /// Items accumulated so far
        items: usize,
        /// Current rate
        items_per_second: f64,
    },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_accepts_only_allow_list() {
        for n in ALLOWED_PAGE_SIZES {
            assert_eq!(PageSize::try_from(n).unwrap(), PageSize::Limited(n));
        }
        for n in [0, 1, 99, 250, 20000] {
            let err = PageSize::try_from(n).unwrap_err();
            assert!(matches!(err, Error::Config { .. }), "{n} should be rejected");
        }
    }

    #[test]
    fn page_size_serializes_as_integer_or_null() {
        assert_eq!(serde_json::to_string(&PageSize::Limited(500)).unwrap(), "500");
        assert_eq!(serde_json::to_string(&PageSize::Unbounded).unwrap(), "null");

        let size: PageSize = serde_json::from_str("null").unwrap();
        assert_eq!(size, PageSize::Unbounded);
        assert!(serde_json::from_str::<PageSize>("250").is_err());
    }

    #[test]
    fn request_variables_match_query_contract() {
        let first = PageRequest {
            page_size: PageSize::Limited(1000),
            cursor: None,
        };
        assert!(first.is_first_page());
        assert_eq!(
            first.variables(),
            serde_json::json!({ "first": 1000, "after": null })
        );

        let next = PageRequest {
            page_size: PageSize::Unbounded,
            cursor: Some(Cursor::new("abc")),
        };
        assert!(!next.is_first_page());
        assert_eq!(
            next.variables(),
            serde_json::json!({ "first": null, "after": "abc" })
        );
    }

    #[test]
    fn fact_sheet_keeps_extra_fields() {
        let sheet: FactSheet =
            serde_json::from_value(serde_json::json!({ "id": "fs-1", "name": "CRM", "type": "Application" }))
                .unwrap();
        assert_eq!(sheet.id, "fs-1");
        assert_eq!(sheet.fields["name"], "CRM");
        assert_eq!(sheet.fields.len(), 2);
    }

    #[test]
    fn completion_ratio_guards_zero_and_unknown_totals() {
        assert_eq!(completion_ratio(0, None), 0.0);
        assert_eq!(completion_ratio(0, Some(0)), 0.0);
        assert_eq!(completion_ratio(50, Some(200)), 0.25);
        assert_eq!(completion_ratio(250, Some(250)), 1.0);
    }

    #[test]
    fn items_per_second_handles_zero_elapsed() {
        assert_eq!(items_per_second(100, Duration::ZERO), 0.0);
        assert_eq!(items_per_second(100, Duration::from_millis(500)), 200.0);
    }

    #[test]
    fn items_share_pages_between_clones() {
        let mut items = Items::default();
        items.push_page(vec![FactSheet::new("a"), FactSheet::new("b")]);
        items.push_page(Vec::new());
        items.push_page(vec![FactSheet::new("c")]);

        let copy = items.clone();
        assert_eq!(copy.len(), 3);
        assert_eq!(copy.page_count(), 2);
        let ids: Vec<_> = copy.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);

        items.clear();
        assert!(items.is_empty());
        assert_eq!(copy.len(), 3);
    }

    #[test]
    fn snapshot_rate_is_frozen_after_completion() {
        let mut items = Items::default();
        items.push_page((0..10).map(|i| FactSheet::new(i.to_string())).collect());
        let snapshot = Snapshot {
            phase: RunPhase::Complete,
            total_count: Some(10),
            items,
            started_at: Some(Instant::now()),
            total_latency: Some(Duration::from_secs(2)),
            ..Default::default()
        };

        assert_eq!(snapshot.elapsed(), Some(Duration::from_secs(2)));
        assert_eq!(snapshot.items_per_second(), Some(5.0));
        assert_eq!(snapshot.completion_percent(), 100);
        assert!(!snapshot.loading());
    }

    #[test]
    fn snapshot_rate_is_frozen_after_failure() {
        let mut items = Items::default();
        items.push_page((0..10).map(|i| FactSheet::new(i.to_string())).collect());
        let snapshot = Snapshot {
            phase: RunPhase::Failed,
            total_count: Some(40),
            items,
            started_at: Some(Instant::now() - Duration::from_secs(60)),
            failed_after: Some(Duration::from_secs(4)),
            ..Default::default()
        };

        assert_eq!(snapshot.elapsed(), Some(Duration::from_secs(4)));
        assert_eq!(snapshot.items_per_second(), Some(2.5));
    }

    #[test]
    fn snapshot_serializes_for_presentation() {
        let mut items = Items::default();
        items.push_page(vec![FactSheet::new("a"), FactSheet::new("b")]);
        let snapshot = Snapshot {
            phase: RunPhase::Complete,
            page_size: PageSize::Limited(500),
            total_count: Some(2),
            items,
            pages_accepted: 1,
            started_at: Some(Instant::now()),
            first_page_latency: Some(Duration::from_millis(120)),
            total_latency: Some(Duration::from_millis(120)),
            ..Default::default()
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["phase"], "complete");
        assert_eq!(json["page_size"], 500);
        assert_eq!(json["items"], serde_json::json!([{ "id": "a" }, { "id": "b" }]));
        assert_eq!(json["first_page_latency"], 120);
        assert_eq!(json["failed_after"], serde_json::Value::Null);
        assert!(json.get("started_at").is_none());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::Reset {
            generation: Generation(3),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "reset", "generation": 3 }));
    }
}
