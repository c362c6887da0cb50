//! Row-level budget records and the aggregates derived from them

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::month::Month;

// =============================================================================
// Raw Records
// =============================================================================

/// Budget direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Income,
    Spend,
    Transfer,
}

impl Direction {
    /// Display order of the direction blocks
    pub const ALL: [Direction; 3] = [Direction::Income, Direction::Spend, Direction::Transfer];

    pub fn label(self) -> &'static str {
        match self {
            Direction::Income => "Income",
            Direction::Spend => "Spend",
            Direction::Transfer => "Transfer",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Income => write!(f, "income"),
            Direction::Spend => write!(f, "spend"),
            Direction::Transfer => write!(f, "transfer"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Direction::Income),
            "spend" => Ok(Direction::Spend),
            "transfer" => Ok(Direction::Transfer),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Category used by rows that have no category (transfers)
pub const UNCATEGORIZED: &str = "";

/// One (month, direction, category) budget record as returned by the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRow {
    pub month: Month,
    pub direction: Direction,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub planned_base: f64,
    #[serde(default)]
    pub planned_modifier: f64,
    #[serde(default)]
    pub planned: f64,
    #[serde(default)]
    pub actual: f64,
    #[serde(default)]
    pub has_unconvertible: bool,
}

impl BudgetRow {
    /// Empty row for a key, used when an edit targets a cell with no data yet
    pub fn zero(key: &RowKey) -> Self {
        Self {
            month: key.month,
            direction: key.direction,
            category: key.category.clone(),
            planned_base: 0.0,
            planned_modifier: 0.0,
            planned: 0.0,
            actual: 0.0,
            has_unconvertible: false,
        }
    }

    pub fn key(&self) -> RowKey {
        RowKey {
            month: self.month,
            direction: self.direction,
            category: self.category.clone(),
        }
    }

    pub fn matches(&self, key: &RowKey) -> bool {
        self.month == key.month && self.direction == key.direction && self.category == key.category
    }
}

/// Identity of a row and of a grid cell
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey {
    pub month: Month,
    pub direction: Direction,
    pub category: String,
}

impl RowKey {
    pub fn new(month: Month, direction: Direction, category: impl Into<String>) -> Self {
        Self {
            month,
            direction,
            category: category.into(),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.category.is_empty() {
            write!(f, "{}/{}", self.month, self.direction)
        } else {
            write!(f, "{}/{}/{}", self.month, self.direction, self.category)
        }
    }
}

/// Which half of the plan an edit touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    Base,
    Modifier,
}

impl PlanKind {
    pub fn field_name(self) -> &'static str {
        match self {
            PlanKind::Base => "plannedBase",
            PlanKind::Modifier => "plannedModifier",
        }
    }
}

/// Currency that had no conversion rate for a month
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversionWarning {
    pub month: Month,
    pub currency: String,
}

// =============================================================================
// Aggregates
// =============================================================================

/// Additive aggregate of one or more rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellValue {
    pub planned_base: f64,
    pub planned_modifier: f64,
    pub planned: f64,
    pub actual: f64,
}

impl CellValue {
    pub fn from_row(row: &BudgetRow) -> Self {
        Self {
            planned_base: row.planned_base,
            planned_modifier: row.planned_modifier,
            planned: row.planned,
            actual: row.actual,
        }
    }

    pub fn add(&mut self, other: &CellValue) {
        self.planned_base += other.planned_base;
        self.planned_modifier += other.planned_modifier;
        self.planned += other.planned;
        self.actual += other.actual;
    }

    /// Sum of any number of cells. Subtotals at every level go through here.
    pub fn sum<'a>(cells: impl IntoIterator<Item = &'a CellValue>) -> CellValue {
        let mut total = CellValue::default();
        for cell in cells {
            total.add(cell);
        }
        total
    }
}

/// Per-month totals for one direction
pub type MonthTotals = BTreeMap<Month, CellValue>;

/// One direction's section of the grid
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionBlock {
    pub direction: Direction,
    pub label: &'static str,
    /// Ranked category rows. Empty when the only category is uncategorized.
    pub categories: Vec<String>,
    pub cells: BTreeMap<(Month, String), CellValue>,
    pub subtotals: MonthTotals,
}

impl DirectionBlock {
    pub fn cell(&self, month: Month, category: &str) -> Option<&CellValue> {
        self.cells.get(&(month, category.to_string()))
    }

    pub fn subtotal(&self, month: Month) -> CellValue {
        self.subtotals.get(&month).copied().unwrap_or_default()
    }

    /// Sum of all months of one category
    pub fn category_total(&self, category: &str) -> CellValue {
        CellValue::sum(
            self.cells
                .iter()
                .filter(|((_, c), _)| c == category)
                .map(|(_, cell)| cell),
        )
    }
}

/// Actual totals of every month before the loaded window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeBefore {
    #[serde(default)]
    pub income_actual: f64,
    #[serde(default)]
    pub spend_actual: f64,
    #[serde(default)]
    pub transfer_actual: f64,
}

impl CumulativeBefore {
    pub fn net(&self) -> f64 {
        self.income_actual - self.spend_actual + self.transfer_actual
    }

    pub fn add_row(&mut self, row: &BudgetRow) {
        match row.direction {
            Direction::Income => self.income_actual += row.actual,
            Direction::Spend => self.spend_actual += row.actual,
            Direction::Transfer => self.transfer_actual += row.actual,
        }
    }

    /// Remove the actuals of rows that moved from "before the window" into it
    pub fn subtract_rows<'a>(&mut self, rows: impl IntoIterator<Item = &'a BudgetRow>) {
        for row in rows {
            match row.direction {
                Direction::Income => self.income_actual -= row.actual,
                Direction::Spend => self.spend_actual -= row.actual,
                Direction::Transfer => self.transfer_actual -= row.actual,
            }
        }
    }
}

/// Real month-end portfolio value
pub type MonthEndBalances = BTreeMap<Month, f64>;

/// Month-end portfolio value split by account liquidity tier
pub type LiquidityBalances = BTreeMap<Month, BTreeMap<String, f64>>;

/// Projected running balance for one month
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeBalance {
    pub plan: f64,
    pub actual: f64,
    pub is_tainted: bool,
}

/// Income minus spend plus transfer for one month
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Remainder {
    pub plan: f64,
    pub actual: f64,
    pub is_tainted: bool,
}

/// Category visibility and masking chosen by the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewOptions {
    pub hidden: BTreeSet<(Direction, String)>,
    pub masked: BTreeSet<String>,
}

impl ViewOptions {
    pub fn is_visible(&self, direction: Direction, category: &str) -> bool {
        !self.hidden.contains(&(direction, category.to_string()))
    }

    pub fn hide(mut self, direction: Direction, category: impl Into<String>) -> Self {
        self.hidden.insert((direction, category.into()));
        self
    }

    pub fn mask(mut self, category: impl Into<String>) -> Self {
        self.masked.insert(category.into());
        self
    }
}
