//! Accumulator state and its transitions.
//!
//! Everything here is synchronous and clock-injected; the async fetch loop in
//! [`super::fetch`] decides *when* transitions happen, this module decides
//! *what* they do.

use crate::error::{Error, Result};
use crate::types::{
    Cursor, FactSheet, Generation, Items, PageRequest, PageResult, PageSize, RunPhase, Snapshot,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// What applying a page did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Applied {
    /// Items taken from the page (after dedup)
    pub page_items: usize,
    /// Whether the page ended the run
    pub terminal: bool,
}

/// Mutable loader state, owned by the fetch loop
#[derive(Debug, Default)]
pub(crate) struct AccumulatorState {
    pub generation: Generation,
    pub phase: RunPhase,
    pub requested_page_size: PageSize,
    pub cursor: Option<Cursor>,
    pub total_count: Option<u64>,
    pub items: Items,
    pub seen_ids: HashSet<String>,
    pub pages_accepted: u32,
    pub started_at: Option<Instant>,
    pub run_started_at: Option<DateTime<Utc>>,
    pub first_page_latency: Option<Duration>,
    pub total_latency: Option<Duration>,
    pub failed_after: Option<Duration>,
}

impl AccumulatorState {
    pub fn new(page_size: PageSize) -> Self {
        Self {
            requested_page_size: page_size,
            ..Default::default()
        }
    }

    /// Build the next request and move into an in-flight phase
    ///
    /// Starts the run clock when the request is for the first page. An
    /// in-flight phase here means the previous request was abandoned (its
    /// future dropped); the in-flight flag in the loader already rules out a
    /// live one, so the request is simply reissued.
    pub fn begin_request(&mut self, now: Instant) -> Result<PageRequest> {
        if self.phase == RunPhase::Complete {
            return Err(Error::InvalidState {
                operation: "fetch next page".to_string(),
                phase: self.phase.to_string(),
            });
        }

        let request = PageRequest {
            page_size: self.requested_page_size,
            cursor: self.cursor.clone(),
        };
        self.failed_after = None;

        if request.is_first_page() {
            self.started_at = Some(now);
            self.run_started_at = Some(Utc::now());
            self.first_page_latency = None;
            self.total_latency = None;
            self.phase = RunPhase::FirstPageInFlight;
        } else {
            self.phase = RunPhase::PageInFlight;
        }

        Ok(request)
    }

    /// Apply an accepted page
    ///
    /// The page is validated completely before anything is written, so an
    /// error leaves the state exactly as it was.
    pub fn apply_page(
        &mut self,
        request: &PageRequest,
        page: PageResult,
        now: Instant,
        dedup_by_id: bool,
    ) -> Result<Applied> {
        let terminal = page.is_terminal();
        let first_page = request.is_first_page();

        if !terminal {
            match &page.next_cursor {
                None => {
                    return Err(Error::MalformedResponse(
                        "hasNextPage is true but endCursor is missing".to_string(),
                    ));
                }
                Some(next) if Some(next) == request.cursor.as_ref() => {
                    return Err(Error::MalformedResponse(format!(
                        "endCursor '{}' did not advance past the requested cursor",
                        next
                    )));
                }
                Some(_) => {}
            }
        }

        let accepted = if dedup_by_id {
            self.filter_seen(first_page, page.items)
        } else {
            page.items
        };

        let carried = if first_page { 0 } else { self.items.len() };
        let new_len = carried + accepted.len();
        if new_len as u64 > page.total_count {
            return Err(Error::MalformedResponse(format!(
                "page would bring item count to {} but totalCount is {}",
                new_len, page.total_count
            )));
        }

        // Validation done; from here on every field is written.
        let elapsed = self
            .started_at
            .map(|started| now.saturating_duration_since(started));
        if first_page {
            self.items.clear();
            self.seen_ids.clear();
            self.pages_accepted = 0;
            self.first_page_latency = elapsed;
        }
        if dedup_by_id {
            self.seen_ids
                .extend(accepted.iter().map(|sheet| sheet.id.clone()));
        }

        let page_items = accepted.len();
        self.items.push_page(accepted);
        self.total_count = Some(page.total_count);
        self.pages_accepted += 1;

        if terminal {
            self.cursor = None;
            self.total_latency = elapsed;
            self.phase = RunPhase::Complete;
        } else {
            self.cursor = page.next_cursor;
            self.phase = RunPhase::Accumulating;
        }

        Ok(Applied {
            page_items,
            terminal,
        })
    }

    /// Drop items already accepted in this run, and repeats within the page
    fn filter_seen(&self, first_page: bool, items: Vec<FactSheet>) -> Vec<FactSheet> {
        let mut page_ids = HashSet::with_capacity(items.len());
        items
            .into_iter()
            .filter(|sheet| {
                let already_seen = !first_page && self.seen_ids.contains(&sheet.id);
                !already_seen && page_ids.insert(sheet.id.clone())
            })
            .collect()
    }

    /// Record a failed fetch; accumulated data stays untouched
    ///
    /// The run clock is frozen at `now` until the next request.
    pub fn mark_failed(&mut self, now: Instant) {
        self.phase = RunPhase::Failed;
        self.failed_after = self
            .started_at
            .map(|started| now.saturating_duration_since(started));
    }

    /// Clear the run back to its initial values, keeping generation and page size
    pub fn clear_run(&mut self) {
        self.phase = RunPhase::Idle;
        self.cursor = None;
        self.total_count = None;
        self.items.clear();
        self.seen_ids.clear();
        self.pages_accepted = 0;
        self.started_at = None;
        self.run_started_at = None;
        self.first_page_latency = None;
        self.total_latency = None;
        self.failed_after = None;
    }

    /// Clear the run and move to a new generation
    pub fn reset(&mut self) -> Generation {
        self.clear_run();
        self.generation = self.generation.next();
        self.generation
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            generation: self.generation,
            phase: self.phase,
            page_size: self.requested_page_size,
            cursor: self.cursor.clone(),
            total_count: self.total_count,
            items: self.items.clone(),
            pages_accepted: self.pages_accepted,
            started_at: self.started_at,
            run_started_at: self.run_started_at,
            first_page_latency: self.first_page_latency,
            total_latency: self.total_latency,
            failed_after: self.failed_after,
        }
    }
}
