//! Budget aggregation and cumulative balance engine
//!
//! Turns row-level monthly budget records and month-end portfolio snapshots
//! into what a budgeting grid renders:
//!
//! - per-category and per-direction monthly totals ([`aggregate`], [`ranking`])
//! - unconvertible-currency taint at cell, subtotal and month level ([`taint`])
//! - a running balance anchored to real snapshots ([`projection`])
//! - the FX drift between real and booked balance changes ([`fx`])
//! - calendar-year rollups cached per year ([`year_cache`])
//!
//! [`BudgetEngine`] ties these to a [`BudgetSource`], loading the visible
//! window incrementally at either edge and applying plan/comment edits
//! optimistically.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod aggregate;
pub mod config;
pub mod edits;
pub mod engine;
pub mod error;
pub mod fx;
pub mod model;
pub mod month;
pub mod projection;
pub mod ranking;
pub mod rows;
pub mod source;
pub mod taint;
pub mod view;
pub mod window;
pub mod year_cache;

pub use config::EngineConfig;
pub use engine::BudgetEngine;
pub use error::{EngineError, Result, SourceError};
pub use fx::format_fx_amount;
pub use model::{
    BudgetRow, CellValue, ConversionWarning, CumulativeBalance, CumulativeBefore, Direction,
    DirectionBlock, PlanKind, Remainder, RowKey, ViewOptions,
};
pub use month::Month;
pub use source::{BudgetSource, Dataset, MemorySource, WindowPayload, WindowRequest};
pub use view::{GridView, LiquidityShare, liquidity_breakdown};
pub use window::{Edge, LoadOutcome};
pub use year_cache::{YearStatus, YearTotalComputed};

/// Lock a mutex, taking the data even if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
