//! The engine session: one loaded window, its year rollups and the edit path
//!
//! State lives behind short-lived mutex guards that are never held across an
//! await. Every load runs as begin (claim a ticket) / fetch / complete, so a
//! load in flight never blocks reads of what is already loaded.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::edits::EditCommand;
use crate::error::{EngineError, Result};
use crate::lock;
use crate::model::{Direction, PlanKind, RowKey, ViewOptions};
use crate::month::Month;
use crate::source::BudgetSource;
use crate::view::GridView;
use crate::window::{Edge, LoadOutcome, WindowState, edges_near};
use crate::year_cache::{YearRollupCache, YearStatus, YearTotalComputed};

pub struct BudgetEngine<S> {
    source: S,
    config: EngineConfig,
    current_month: Month,
    window: Mutex<WindowState>,
    years: Mutex<YearRollupCache>,
    options: Mutex<ViewOptions>,
}

impl<S: BudgetSource> BudgetEngine<S> {
    pub fn new(source: S, config: EngineConfig, current_month: Month) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            current_month,
            window: Mutex::new(WindowState::default()),
            years: Mutex::new(YearRollupCache::default()),
            options: Mutex::new(ViewOptions::default()),
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn current_month(&self) -> Month {
        self.current_month
    }

    pub fn loaded_range(&self) -> Option<(Month, Month)> {
        lock(&self.window).loaded_range()
    }

    // =========================================================================
    // Window loading
    // =========================================================================

    /// Load the configured window around the current month
    pub async fn initialize(&self) -> Result<LoadOutcome> {
        let from = self
            .current_month
            .add_months(-(self.config.months_before as i32));
        let to = self.current_month.add_months(self.config.months_after as i32);
        self.load_range(from, to).await
    }

    /// Replace the whole window with `[from, to]`
    pub async fn load_range(&self, from: Month, to: Month) -> Result<LoadOutcome> {
        if from > to {
            return Err(EngineError::InvalidMonth(format!("{from} is after {to}")));
        }
        let ticket = lock(&self.window).begin_reload(from, to, self.current_month);
        let response = self.source.fetch_window(ticket.request).await;
        lock(&self.window).complete_reload(ticket, response)
    }

    /// Refetch the loaded range after an external change to the data
    pub async fn reload(&self) -> Result<LoadOutcome> {
        let (from, to) = self.loaded_range().ok_or(EngineError::NotInitialized)?;
        self.invalidate_years();
        self.load_range(from, to).await
    }

    pub async fn load_left(&self) -> Result<LoadOutcome> {
        self.load_edge(Edge::Left).await
    }

    pub async fn load_right(&self) -> Result<LoadOutcome> {
        self.load_edge(Edge::Right).await
    }

    pub async fn load_edge(&self, edge: Edge) -> Result<LoadOutcome> {
        let ticket =
            lock(&self.window).begin_edge(edge, self.config.batch_months, self.current_month)?;
        let Some(ticket) = ticket else {
            return Ok(LoadOutcome::Coalesced);
        };
        let response = self.source.fetch_window(ticket.request).await;
        lock(&self.window).complete_edge(ticket, response, self.config.column_width_px)
    }

    /// Extend whichever edges the scroll position is close to. Each edge
    /// reports on its own, so a merged left batch keeps its scroll
    /// compensation when the right load fails.
    pub async fn on_scroll(
        &self,
        scroll_left: f64,
        viewport_width: f64,
        content_width: f64,
    ) -> Vec<(Edge, Result<LoadOutcome>)> {
        let edges = edges_near(
            scroll_left,
            viewport_width,
            content_width,
            self.config.edge_threshold_px,
        );
        match edges.as_slice() {
            [] => Vec::new(),
            [edge] => vec![(*edge, self.load_edge(*edge).await)],
            _ => {
                let (left, right) =
                    tokio::join!(self.load_edge(Edge::Left), self.load_edge(Edge::Right));
                vec![(Edge::Left, left), (Edge::Right, right)]
            }
        }
    }

    // =========================================================================
    // Derived views
    // =========================================================================

    pub fn view(&self) -> Result<GridView> {
        let options = self.view_options();
        lock(&self.window).view(self.current_month, &options)
    }

    pub fn view_options(&self) -> ViewOptions {
        lock(&self.options).clone()
    }

    /// Change category visibility/masking. Cached year rollups are dropped when
    /// anything changed.
    pub fn set_view_options(&self, options: ViewOptions) {
        let changed = {
            let mut current = lock(&self.options);
            let changed = *current != options;
            *current = options;
            changed
        };
        if changed {
            self.invalidate_years();
        }
    }

    // =========================================================================
    // Year rollups
    // =========================================================================

    /// Fetch and cache the rollup of `year` unless it is cached or loading
    pub async fn year_total(&self, year: i32) -> Result<YearStatus> {
        if !(Month::MIN_YEAR..=Month::MAX_YEAR).contains(&year) {
            return Err(EngineError::InvalidMonth(format!("year {year} is out of range")));
        }
        let ticket = lock(&self.years).begin(year, self.current_month);
        let Some(ticket) = ticket else {
            return Ok(self.year_status(year));
        };

        let response = self.source.fetch_window(ticket.request).await;
        let failure = response.as_ref().err().cloned();
        let options = self.view_options();
        lock(&self.years).complete(ticket, response, self.current_month, &options);

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(self.year_status(year)),
        }
    }

    pub fn year_status(&self, year: i32) -> YearStatus {
        lock(&self.years).status(year)
    }

    /// Every rollup computed so far
    pub fn year_totals(&self) -> BTreeMap<i32, Arc<YearTotalComputed>> {
        lock(&self.years).ready()
    }

    fn invalidate_years(&self) {
        lock(&self.years).invalidate();
    }

    // =========================================================================
    // Optimistic edits
    // =========================================================================

    /// Save one plan field. Cells outside the loaded window are only saved;
    /// the edge load that reaches them brings the stored row.
    pub async fn set_plan(&self, key: RowKey, kind: PlanKind, value: f64) -> Result<()> {
        let command = EditCommand::SetPlan {
            key: key.clone(),
            kind,
            value,
        };
        let local = {
            let mut window = lock(&self.window);
            let (from, to) = window.loaded_range().ok_or(EngineError::NotInitialized)?;
            (from..=to)
                .contains(&key.month)
                .then(|| (command.apply(&mut window), window.generation()))
        };
        self.invalidate_years();

        let saved = self.source.set_plan(key.clone(), kind, value).await;
        if let Err(e) = saved {
            if let Some((inverse, generation)) = local {
                self.roll_back(&inverse, generation);
            }
            warn!(%key, field = kind.field_name(), "plan save failed, rolled back: {e}");
            return Err(EngineError::EditConflict {
                key,
                field: kind.field_name(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }

    /// Set the base plan of every month after `from` through December
    pub async fn fill_months(
        &self,
        from: Month,
        direction: Direction,
        category: &str,
        base: f64,
    ) -> Result<()> {
        let (loaded_from, loaded_to) = self.loaded_range().ok_or(EngineError::NotInitialized)?;
        let commands = Month::range_inclusive(from.next(), from.december())
            .into_iter()
            .filter(|m| *m >= loaded_from && *m <= loaded_to)
            .map(|month| EditCommand::SetPlan {
                key: RowKey::new(month, direction, category),
                kind: PlanKind::Base,
                value: base,
            })
            .collect();
        let (inverse, generation) = self.apply_local(&EditCommand::Batch(commands))?;
        self.invalidate_years();

        let saved = self
            .source
            .fill_months(from, direction, category.to_string(), base)
            .await;
        if let Err(e) = saved {
            self.roll_back(&inverse, generation);
            let key = RowKey::new(from, direction, category);
            warn!(%key, "fill save failed, rolled back: {e}");
            return Err(EngineError::EditConflict {
                key,
                field: PlanKind::Base.field_name(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }

    /// Comment of a cell, fetched on first read and cached
    pub async fn comment(&self, key: &RowKey) -> Result<Option<String>> {
        if let Some(cached) = lock(&self.window).comments.get(key) {
            return Ok(cached.clone());
        }
        let fetched = self.source.get_comment(key.clone()).await?;
        let mut window = lock(&self.window);
        let entry = window.comments.entry(key.clone()).or_insert(fetched);
        Ok(entry.clone())
    }

    /// Save a comment; blank text clears it
    pub async fn set_comment(&self, key: RowKey, text: &str) -> Result<()> {
        let text = text.trim();
        let command = EditCommand::SetComment {
            key: key.clone(),
            text: (!text.is_empty()).then(|| text.to_string()),
        };
        let (inverse, generation) = self.apply_local(&command)?;

        let saved = self.source.set_comment(key.clone(), text.to_string()).await;
        if let Err(e) = saved {
            self.roll_back(&inverse, generation);
            warn!(%key, "comment save failed, rolled back: {e}");
            return Err(EngineError::EditConflict {
                key,
                field: "comment",
                reason: e.to_string(),
            });
        }
        Ok(())
    }

    fn apply_local(&self, command: &EditCommand) -> Result<(EditCommand, u64)> {
        let mut window = lock(&self.window);
        if window.loaded_range().is_none() {
            return Err(EngineError::NotInitialized);
        }
        Ok((command.apply(&mut window), window.generation()))
    }

    /// Undo a local edit unless the window was replaced in the meantime
    fn roll_back(&self, inverse: &EditCommand, generation: u64) {
        let mut window = lock(&self.window);
        if window.generation() == generation {
            inverse.apply(&mut window);
        } else {
            info!("window reloaded since the edit, skipping local rollback");
        }
    }
}
