//! Calendar-year rollups, fetched and cached independently of the window
//!
//! Entries are keyed by year and created lazily. At most one fetch per year is
//! in flight. Invalidation clears every entry and bumps the epoch; a fetch that
//! started under an older epoch is dropped when it lands.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::SourceError;
use crate::model::{CellValue, CumulativeBalance, Direction, Remainder, ViewOptions};
use crate::month::Month;
use crate::source::{WindowPayload, WindowRequest};
use crate::taint::TaintSets;
use crate::view::{GridView, PipelineInput};

/// One direction's share of a year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearDirectionTotal {
    pub direction: Direction,
    pub total: CellValue,
    /// Per-category totals in ranked order
    pub categories: Vec<(String, CellValue)>,
    pub is_tainted: bool,
}

/// Derived totals for one calendar year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearTotalComputed {
    pub year: i32,
    pub directions: Vec<YearDirectionTotal>,
    pub remainder: Remainder,
    /// Sum of the monthly FX adjustments that could be computed
    pub fx_total: f64,
    pub december_balance: CumulativeBalance,
    #[serde(skip)]
    pub taint: TaintSets,
}

impl YearTotalComputed {
    pub fn direction(&self, direction: Direction) -> Option<&YearDirectionTotal> {
        self.directions.iter().find(|d| d.direction == direction)
    }
}

/// The January to December fetch for `year`
pub fn year_request(year: i32, current_month: Month) -> WindowRequest {
    let months = Month::year_months(year);
    let (first, last) = (months[0], months[11]);
    WindowRequest::new(first, last, current_month)
}

/// Run the grid pipeline over exactly the twelve months of `year`
pub fn compute_year_total(
    year: i32,
    payload: &WindowPayload,
    current_month: Month,
    options: &ViewOptions,
) -> YearTotalComputed {
    let months = Month::year_months(year);
    let warnings: BTreeSet<_> = payload.conversion_warnings.iter().cloned().collect();
    let view = GridView::compute(&PipelineInput {
        months: &months,
        rows: &payload.rows,
        before: payload.cumulative_before,
        balances: &payload.month_end_balances,
        liquidity: &payload.month_end_balances_by_liquidity,
        warnings: &warnings,
        current_month,
        options,
    });

    let directions = view
        .blocks
        .iter()
        .map(|block| {
            let categories = block
                .categories
                .iter()
                .map(|c| (c.clone(), block.category_total(c)))
                .collect();
            YearDirectionTotal {
                direction: block.direction,
                total: CellValue::sum(block.subtotals.values()),
                categories,
                is_tainted: view.taint.direction(block.direction),
            }
        })
        .collect();

    let remainder = view.remainders.values().fold(Remainder::default(), |acc, r| Remainder {
        plan: acc.plan + r.plan,
        actual: acc.actual + r.actual,
        is_tainted: acc.is_tainted || r.is_tainted,
    });

    YearTotalComputed {
        year,
        directions,
        remainder,
        fx_total: view.fx_adjustments.values().sum(),
        december_balance: months
            .last()
            .and_then(|m| view.balances.get(m))
            .copied()
            .unwrap_or_default(),
        taint: view.taint,
    }
}

/// Loading state of one year as seen by a caller
#[derive(Debug, Clone, PartialEq)]
pub enum YearStatus {
    Missing,
    Loading,
    Ready(Arc<YearTotalComputed>),
    Failed(String),
}

#[derive(Debug, Clone)]
enum Entry {
    Loading { request_id: u64 },
    Ready(Arc<YearTotalComputed>),
    Failed(String),
}

/// Claim on an in-flight year fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearTicket {
    pub year: i32,
    pub request: WindowRequest,
    epoch: u64,
    request_id: u64,
}

#[derive(Debug, Default)]
pub struct YearRollupCache {
    entries: BTreeMap<i32, Entry>,
    epoch: u64,
    next_request: u64,
}

impl YearRollupCache {
    pub fn status(&self, year: i32) -> YearStatus {
        match self.entries.get(&year) {
            None => YearStatus::Missing,
            Some(Entry::Loading { .. }) => YearStatus::Loading,
            Some(Entry::Ready(total)) => YearStatus::Ready(Arc::clone(total)),
            Some(Entry::Failed(reason)) => YearStatus::Failed(reason.clone()),
        }
    }

    pub fn ready(&self) -> BTreeMap<i32, Arc<YearTotalComputed>> {
        self.entries
            .iter()
            .filter_map(|(year, entry)| match entry {
                Entry::Ready(total) => Some((*year, Arc::clone(total))),
                _ => None,
            })
            .collect()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Claim the fetch for `year`. `None` when it is loading or already cached.
    /// A failed entry is retried.
    pub fn begin(&mut self, year: i32, current_month: Month) -> Option<YearTicket> {
        if matches!(
            self.entries.get(&year),
            Some(Entry::Loading { .. } | Entry::Ready(_))
        ) {
            return None;
        }
        self.next_request += 1;
        let request_id = self.next_request;
        self.entries.insert(year, Entry::Loading { request_id });
        Some(YearTicket {
            year,
            request: year_request(year, current_month),
            epoch: self.epoch,
            request_id,
        })
    }

    /// Store the outcome of a fetch. Returns `false` when the ticket was
    /// superseded and the response dropped.
    pub fn complete(
        &mut self,
        ticket: YearTicket,
        response: Result<WindowPayload, SourceError>,
        current_month: Month,
        options: &ViewOptions,
    ) -> bool {
        let current = matches!(
            self.entries.get(&ticket.year),
            Some(Entry::Loading { request_id }) if *request_id == ticket.request_id
        );
        if ticket.epoch != self.epoch || !current {
            warn!(year = ticket.year, "discarding stale year rollup");
            return false;
        }

        let entry = match response {
            Ok(payload) => {
                let total = compute_year_total(ticket.year, &payload, current_month, options);
                info!(year = ticket.year, rows = payload.rows.len(), "year rollup ready");
                Entry::Ready(Arc::new(total))
            }
            Err(e) => {
                warn!(year = ticket.year, "year rollup fetch failed: {e}");
                Entry::Failed(e.to_string())
            }
        };
        self.entries.insert(ticket.year, entry);
        true
    }

    /// Drop every entry. Fetches still in flight will be discarded.
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.epoch += 1;
    }
}
