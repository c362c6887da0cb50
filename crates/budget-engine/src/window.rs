//! Loaded month range and incremental edge loading
//!
//! [`WindowState`] owns the rows, baseline and snapshots of the loaded window
//! `[loaded_from, loaded_to]`. Loads are split into a `begin_*` step, which
//! hands out a ticket, and a `complete_*` step, which merges the response;
//! the fetch in between runs without holding the state.
//!
//! - Only one load per edge is in flight; a second request for the same edge
//!   is coalesced. The two edges load independently.
//! - A left merge lowers the baseline by the exact actuals of the prepended
//!   months. The baseline is never re-queried after the initial load.
//! - Every ticket carries the window generation. A wholesale reload starts a
//!   new generation and any response tagged with an older one is discarded.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::error::{EngineError, Result, SourceError};
use crate::model::{
    BudgetRow, ConversionWarning, CumulativeBefore, LiquidityBalances, MonthEndBalances, RowKey,
    ViewOptions,
};
use crate::month::Month;
use crate::rows::RowSet;
use crate::source::{WindowPayload, WindowRequest};
use crate::view::{GridView, PipelineInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Left,
    Right,
}

/// Which edges a scroll position is close enough to load
pub fn edges_near(
    scroll_left: f64,
    viewport_width: f64,
    content_width: f64,
    threshold: f64,
) -> Vec<Edge> {
    let mut edges = Vec::new();
    if scroll_left <= threshold {
        edges.push(Edge::Left);
    }
    if content_width - (scroll_left + viewport_width) <= threshold {
        edges.push(Edge::Right);
    }
    edges
}

/// Result of a completed (or refused) load
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOutcome {
    /// Window replaced wholesale
    Reloaded { from: Month, to: Month },
    /// Batch merged at one edge
    Merged {
        edge: Edge,
        months_added: u32,
        /// Horizontal offset to add so the focused column stays put
        scroll_compensation_px: f64,
    },
    /// A load for the same target was already running
    Coalesced,
    /// The response arrived after its request was superseded and was dropped
    Stale,
}

/// Claim on an in-flight window fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub request: WindowRequest,
    edge: Option<Edge>,
    request_id: u64,
    generation: u64,
}

impl LoadTicket {
    pub fn edge(&self) -> Option<Edge> {
        self.edge
    }
}

#[derive(Debug, Default)]
pub struct WindowState {
    loaded: Option<(Month, Month)>,
    pub(crate) rows: RowSet,
    before: CumulativeBefore,
    balances: MonthEndBalances,
    liquidity: LiquidityBalances,
    warnings: BTreeSet<ConversionWarning>,
    /// Fetched comments; `None` records a cell known to have none
    pub(crate) comments: BTreeMap<RowKey, Option<String>>,
    generation: u64,
    next_request: u64,
    left_in_flight: Option<u64>,
    right_in_flight: Option<u64>,
    reload_in_flight: Option<u64>,
}

impl WindowState {
    pub fn loaded_range(&self) -> Option<(Month, Month)> {
        self.loaded
    }

    pub fn months(&self) -> Vec<Month> {
        self.loaded
            .map(|(from, to)| Month::range_inclusive(from, to))
            .unwrap_or_default()
    }

    pub fn rows(&self) -> &[BudgetRow] {
        self.rows.as_slice()
    }

    pub fn cumulative_before(&self) -> CumulativeBefore {
        self.before
    }

    pub fn month_end_balances(&self) -> &MonthEndBalances {
        &self.balances
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self, edge: Edge) -> bool {
        match edge {
            Edge::Left => self.left_in_flight.is_some(),
            Edge::Right => self.right_in_flight.is_some(),
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_request += 1;
        self.next_request
    }

    // =========================================================================
    // Wholesale (re)load
    // =========================================================================

    /// Start replacing the whole window with `[from, to]`.
    ///
    /// Opens a new generation: edge loads already in flight become stale.
    pub fn begin_reload(&mut self, from: Month, to: Month, current_month: Month) -> LoadTicket {
        self.generation += 1;
        self.left_in_flight = None;
        self.right_in_flight = None;
        let request_id = self.next_id();
        self.reload_in_flight = Some(request_id);
        debug!(generation = self.generation, %from, %to, "window reload started");
        LoadTicket {
            request: WindowRequest::new(from, to, current_month),
            edge: None,
            request_id,
            generation: self.generation,
        }
    }

    pub fn complete_reload(
        &mut self,
        ticket: LoadTicket,
        response: std::result::Result<WindowPayload, SourceError>,
    ) -> Result<LoadOutcome> {
        if self.reload_in_flight != Some(ticket.request_id) {
            warn!(request_id = ticket.request_id, "discarding superseded window reload");
            return Ok(LoadOutcome::Stale);
        }
        self.reload_in_flight = None;

        let payload = response.inspect_err(|e| warn!("window reload failed: {e}"))?;
        let (from, to) = (ticket.request.month_from, ticket.request.month_to);
        self.rows.replace_all(payload.rows);
        self.before = payload.cumulative_before;
        self.balances = payload.month_end_balances;
        self.liquidity = payload.month_end_balances_by_liquidity;
        self.warnings = payload.conversion_warnings.into_iter().collect();
        self.comments.clear();
        self.loaded = Some((from, to));
        info!(%from, %to, rows = self.rows.len(), "window loaded");
        Ok(LoadOutcome::Reloaded { from, to })
    }

    // =========================================================================
    // Edge loads
    // =========================================================================

    /// Claim the next batch at `edge`, or `None` when that edge (or a reload)
    /// is already loading.
    pub fn begin_edge(
        &mut self,
        edge: Edge,
        batch_months: u32,
        current_month: Month,
    ) -> Result<Option<LoadTicket>> {
        let (from, to) = self.loaded.ok_or(EngineError::NotInitialized)?;
        if self.reload_in_flight.is_some() || self.is_loading(edge) {
            return Ok(None);
        }

        let batch = batch_months.max(1) as i32;
        let (month_from, month_to) = match edge {
            Edge::Left => (from.add_months(-batch), from.prev()),
            Edge::Right => (to.next(), to.add_months(batch)),
        };
        let request_id = self.next_id();
        match edge {
            Edge::Left => self.left_in_flight = Some(request_id),
            Edge::Right => self.right_in_flight = Some(request_id),
        }
        debug!(?edge, %month_from, %month_to, "edge load started");

        Ok(Some(LoadTicket {
            request: WindowRequest::new(month_from, month_to, current_month),
            edge: Some(edge),
            request_id,
            generation: self.generation,
        }))
    }

    pub fn complete_edge(
        &mut self,
        ticket: LoadTicket,
        response: std::result::Result<WindowPayload, SourceError>,
        column_width_px: f64,
    ) -> Result<LoadOutcome> {
        let Some(edge) = ticket.edge else {
            return self.complete_reload(ticket, response);
        };
        let in_flight = match edge {
            Edge::Left => &mut self.left_in_flight,
            Edge::Right => &mut self.right_in_flight,
        };
        if ticket.generation != self.generation || *in_flight != Some(ticket.request_id) {
            warn!(?edge, request_id = ticket.request_id, "discarding stale edge load");
            return Ok(LoadOutcome::Stale);
        }
        *in_flight = None;

        let payload = response.inspect_err(|e| warn!(?edge, "edge load failed: {e}"))?;
        let (from, to) = self.loaded.ok_or(EngineError::NotInitialized)?;
        let (new_from, new_to) = (ticket.request.month_from, ticket.request.month_to);

        let outcome = match edge {
            Edge::Left => {
                let rows = keep_range(payload.rows, new_from, from.prev());
                let added = self.rows.merge_front(rows);
                self.before.subtract_rows(&added);
                self.loaded = Some((new_from, to));
                let months_added = new_from.months_until(from).max(0) as u32;
                LoadOutcome::Merged {
                    edge,
                    months_added,
                    scroll_compensation_px: months_added as f64 * column_width_px,
                }
            }
            Edge::Right => {
                let rows = keep_range(payload.rows, to.next(), new_to);
                self.rows.merge_back(rows);
                self.loaded = Some((from, new_to));
                LoadOutcome::Merged {
                    edge,
                    months_added: to.months_until(new_to).max(0) as u32,
                    scroll_compensation_px: 0.0,
                }
            }
        };

        self.balances.extend(payload.month_end_balances);
        self.liquidity.extend(payload.month_end_balances_by_liquidity);
        self.warnings.extend(payload.conversion_warnings);
        debug!(?edge, rows = self.rows.len(), "edge load merged");
        Ok(outcome)
    }

    // =========================================================================
    // Derived view
    // =========================================================================

    pub fn view(&self, current_month: Month, options: &ViewOptions) -> Result<GridView> {
        if self.loaded.is_none() {
            return Err(EngineError::NotInitialized);
        }
        let months = self.months();
        Ok(GridView::compute(&PipelineInput {
            months: &months,
            rows: self.rows.as_slice(),
            before: self.before,
            balances: &self.balances,
            liquidity: &self.liquidity,
            warnings: &self.warnings,
            current_month,
            options,
        }))
    }
}

/// Drop rows outside the months a batch was asked for
fn keep_range(rows: Vec<BudgetRow>, from: Month, to: Month) -> Vec<BudgetRow> {
    rows.into_iter()
        .filter(|r| r.month >= from && r.month <= to)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Direction;

    fn m(s: &str) -> Month {
        s.parse().unwrap()
    }

    fn row(month: &str, direction: Direction, category: &str, actual: f64) -> BudgetRow {
        BudgetRow {
            actual,
            ..BudgetRow::zero(&RowKey::new(m(month), direction, category))
        }
    }

    fn loaded_state() -> WindowState {
        let mut state = WindowState::default();
        let ticket = state.begin_reload(m("2026-01"), m("2026-03"), m("2026-02"));
        let payload = WindowPayload {
            rows: vec![
                row("2026-01", Direction::Income, "salary", 1000.0),
                row("2026-02", Direction::Spend, "rent", 400.0),
            ],
            cumulative_before: CumulativeBefore {
                income_actual: 5000.0,
                spend_actual: 2000.0,
                transfer_actual: -100.0,
            },
            ..Default::default()
        };
        state.complete_reload(ticket, Ok(payload)).unwrap();
        state
    }

    #[test]
    fn test_edges_near() {
        assert_eq!(edges_near(50.0, 800.0, 3000.0, 200.0), vec![Edge::Left]);
        assert_eq!(edges_near(2100.0, 800.0, 3000.0, 200.0), vec![Edge::Right]);
        assert!(edges_near(1000.0, 800.0, 3000.0, 200.0).is_empty());
        assert_eq!(edges_near(0.0, 800.0, 900.0, 200.0), vec![Edge::Left, Edge::Right]);
    }

    #[test]
    fn test_edge_before_initial_load_fails() {
        let mut state = WindowState::default();
        assert!(matches!(
            state.begin_edge(Edge::Left, 3, m("2026-02")),
            Err(EngineError::NotInitialized)
        ));
    }

    #[test]
    fn test_left_load_adjusts_baseline_exactly() {
        let mut state = loaded_state();
        let net_before = state.cumulative_before().net();

        let ticket = state.begin_edge(Edge::Left, 2, m("2026-02")).unwrap().unwrap();
        assert_eq!(ticket.request.month_from, m("2025-11"));
        assert_eq!(ticket.request.month_to, m("2025-12"));

        let payload = WindowPayload {
            rows: vec![
                row("2025-11", Direction::Income, "salary", 900.25),
                row("2025-12", Direction::Spend, "rent", 400.5),
                row("2025-12", Direction::Transfer, "", -30.0),
            ],
            ..Default::default()
        };
        let outcome = state.complete_edge(ticket, Ok(payload), 96.0).unwrap();

        assert_eq!(
            outcome,
            LoadOutcome::Merged {
                edge: Edge::Left,
                months_added: 2,
                scroll_compensation_px: 192.0,
            }
        );
        assert_eq!(state.loaded_range(), Some((m("2025-11"), m("2026-03"))));
        let prepended_net = 900.25 - 400.5 + -30.0;
        assert_eq!(state.cumulative_before().net(), net_before - prepended_net);
        assert_eq!(state.cumulative_before().income_actual, 5000.0 - 900.25);
        assert_eq!(state.rows()[0].month, m("2025-11"));
    }

    #[test]
    fn test_balance_is_unchanged_by_left_extension() {
        let mut state = loaded_state();
        let options = ViewOptions::default();
        let before_view = state.view(m("2026-02"), &options).unwrap();

        let ticket = state.begin_edge(Edge::Left, 3, m("2026-02")).unwrap().unwrap();
        let payload = WindowPayload {
            rows: vec![
                row("2025-10", Direction::Income, "salary", 700.0),
                row("2025-12", Direction::Spend, "rent", 123.0),
            ],
            ..Default::default()
        };
        state.complete_edge(ticket, Ok(payload), 96.0).unwrap();
        let after_view = state.view(m("2026-02"), &options).unwrap();

        for month in &before_view.months {
            assert_eq!(before_view.balances[month], after_view.balances[month]);
        }
    }

    #[test]
    fn test_same_edge_is_coalesced_other_edge_is_not() {
        let mut state = loaded_state();
        let left = state.begin_edge(Edge::Left, 3, m("2026-02")).unwrap();
        assert!(left.is_some());
        assert!(state.begin_edge(Edge::Left, 3, m("2026-02")).unwrap().is_none());
        assert!(state.begin_edge(Edge::Right, 3, m("2026-02")).unwrap().is_some());
    }

    #[test]
    fn test_right_load_appends() {
        let mut state = loaded_state();
        let ticket = state.begin_edge(Edge::Right, 2, m("2026-02")).unwrap().unwrap();
        let payload = WindowPayload {
            rows: vec![row("2026-05", Direction::Spend, "rent", 0.0)],
            month_end_balances: [(m("2026-04"), 1.0)].into_iter().collect(),
            ..Default::default()
        };
        let outcome = state.complete_edge(ticket, Ok(payload), 96.0).unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Merged {
                edge: Edge::Right,
                months_added: 2,
                scroll_compensation_px: 0.0,
            }
        );
        assert_eq!(state.loaded_range(), Some((m("2026-01"), m("2026-05"))));
        assert_eq!(state.rows().last().unwrap().month, m("2026-05"));
        assert_eq!(state.month_end_balances().get(&m("2026-04")), Some(&1.0));
        assert_eq!(state.cumulative_before().net(), 2900.0);
    }

    #[test]
    fn test_failed_edge_load_merges_nothing() {
        let mut state = loaded_state();
        let rows_before = state.rows().to_vec();
        let ticket = state.begin_edge(Edge::Left, 3, m("2026-02")).unwrap().unwrap();
        let failure = Err(SourceError::Unavailable("down".into()));
        let result = state.complete_edge(ticket, failure, 96.0);

        assert!(matches!(result, Err(EngineError::Source(_))));
        assert_eq!(state.rows(), rows_before.as_slice());
        assert_eq!(state.loaded_range(), Some((m("2026-01"), m("2026-03"))));
        assert!(!state.is_loading(Edge::Left));
    }

    #[test]
    fn test_reload_discards_in_flight_edge_response() {
        let mut state = loaded_state();
        let ticket = state.begin_edge(Edge::Left, 1, m("2026-02")).unwrap().unwrap();
        let reload = state.begin_reload(m("2026-01"), m("2026-03"), m("2026-02"));

        let late = WindowPayload {
            rows: vec![row("2025-12", Direction::Income, "late", 1.0)],
            ..Default::default()
        };
        assert_eq!(state.complete_edge(ticket, Ok(late), 96.0).unwrap(), LoadOutcome::Stale);

        // Edge loads wait for the pending reload
        assert!(state.begin_edge(Edge::Right, 1, m("2026-02")).unwrap().is_none());

        state.complete_reload(reload, Ok(WindowPayload::default())).unwrap();
        assert!(state.rows().is_empty());
        assert_eq!(state.loaded_range(), Some((m("2026-01"), m("2026-03"))));
    }

    #[test]
    fn test_superseded_reload_is_stale() {
        let mut state = WindowState::default();
        let first = state.begin_reload(m("2026-01"), m("2026-02"), m("2026-02"));
        let second = state.begin_reload(m("2026-01"), m("2026-03"), m("2026-02"));
        assert_eq!(
            state.complete_reload(first, Ok(WindowPayload::default())).unwrap(),
            LoadOutcome::Stale
        );
        assert!(state.loaded_range().is_none());
        state.complete_reload(second, Ok(WindowPayload::default())).unwrap();
        assert_eq!(state.loaded_range(), Some((m("2026-01"), m("2026-03"))));
    }
}
