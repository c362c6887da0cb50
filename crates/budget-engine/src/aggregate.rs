//! Grouping of raw rows into per-direction grid blocks
//!
//! Rows are grouped by direction and then by (month, category). Subtotals are
//! the sum of the block's own ranked categories, so a filtered view gets
//! subtotals over its visible categories only.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{
    BudgetRow, CellValue, Direction, DirectionBlock, MonthTotals, Remainder, UNCATEGORIZED,
    ViewOptions,
};
use crate::month::Month;
use crate::ranking::{effective_value, rank_categories};
use crate::taint::TaintSets;

/// Build one block per direction present in `rows`, in [income, spend, transfer] order.
///
/// Rows outside `months` are ignored. Rows sharing a key are summed.
pub fn aggregate_rows(
    rows: &[BudgetRow],
    months: &[Month],
    current_month: Month,
    options: &ViewOptions,
) -> Vec<DirectionBlock> {
    let window: BTreeSet<Month> = months.iter().copied().collect();

    Direction::ALL
        .into_iter()
        .filter_map(|direction| {
            let in_block: Vec<&BudgetRow> = rows
                .iter()
                .filter(|r| r.direction == direction && window.contains(&r.month))
                .collect();
            if in_block.is_empty() {
                return None;
            }
            Some(build_block(direction, &in_block, months, current_month, options))
        })
        .collect()
}

fn build_block(
    direction: Direction,
    rows: &[&BudgetRow],
    months: &[Month],
    current_month: Month,
    options: &ViewOptions,
) -> DirectionBlock {
    // Categories in order of first appearance; ranking ties fall back to this
    let mut categories: Vec<String> = Vec::new();
    let mut cells: BTreeMap<(Month, String), CellValue> = BTreeMap::new();

    for row in rows {
        if !options.is_visible(direction, &row.category) {
            continue;
        }
        if !categories.contains(&row.category) {
            categories.push(row.category.clone());
        }
        cells
            .entry((row.month, row.category.clone()))
            .or_default()
            .add(&CellValue::from_row(row));
    }

    let values: BTreeMap<String, f64> = categories
        .iter()
        .map(|category| {
            let series = cells
                .iter()
                .filter(|((_, c), _)| c == category)
                .map(|((month, _), cell)| (month, cell));
            (category.clone(), effective_value(series, current_month))
        })
        .collect();

    let masked = (!options.masked.is_empty()).then_some(&options.masked);
    let ranked = rank_categories(&categories, &values, masked);
    let subtotals = subtotals_over(&cells, &ranked, months);

    let categories = if ranked.len() == 1 && ranked[0] == UNCATEGORIZED {
        Vec::new()
    } else {
        ranked
    };

    DirectionBlock {
        direction,
        label: direction.label(),
        categories,
        cells,
        subtotals,
    }
}

/// Per-month sum of the given categories' cells
pub fn subtotals_over(
    cells: &BTreeMap<(Month, String), CellValue>,
    categories: &[String],
    months: &[Month],
) -> MonthTotals {
    months
        .iter()
        .map(|&month| {
            let total = CellValue::sum(
                categories
                    .iter()
                    .filter_map(|category| cells.get(&(month, category.clone()))),
            );
            (month, total)
        })
        .collect()
}

/// Per-direction monthly totals feeding the remainder, balance and FX rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectionTotals {
    pub income: MonthTotals,
    pub spend: MonthTotals,
    pub transfer: MonthTotals,
}

impl DirectionTotals {
    pub fn from_rows(rows: &[BudgetRow], months: &[Month]) -> Self {
        let mut totals = DirectionTotals::default();
        for direction in Direction::ALL {
            let map = totals.get_mut(direction);
            for &month in months {
                map.insert(month, CellValue::default());
            }
        }
        let window: BTreeSet<Month> = months.iter().copied().collect();
        for row in rows.iter().filter(|r| window.contains(&r.month)) {
            totals
                .get_mut(row.direction)
                .entry(row.month)
                .or_default()
                .add(&CellValue::from_row(row));
        }
        totals
    }

    /// Totals over the categories a set of blocks actually shows
    pub fn from_blocks(blocks: &[DirectionBlock], months: &[Month]) -> Self {
        let mut totals = DirectionTotals::default();
        for block in blocks {
            let map = totals.get_mut(block.direction);
            for &month in months {
                map.insert(month, block.subtotal(month));
            }
        }
        totals
    }

    pub fn get(&self, direction: Direction) -> &MonthTotals {
        match direction {
            Direction::Income => &self.income,
            Direction::Spend => &self.spend,
            Direction::Transfer => &self.transfer,
        }
    }

    fn get_mut(&mut self, direction: Direction) -> &mut MonthTotals {
        match direction {
            Direction::Income => &mut self.income,
            Direction::Spend => &mut self.spend,
            Direction::Transfer => &mut self.transfer,
        }
    }

    pub fn cell(&self, direction: Direction, month: Month) -> CellValue {
        self.get(direction).get(&month).copied().unwrap_or_default()
    }

    /// `actualIncome - actualSpend + actualTransfer`
    pub fn actual_delta(&self, month: Month) -> f64 {
        self.cell(Direction::Income, month).actual - self.cell(Direction::Spend, month).actual
            + self.cell(Direction::Transfer, month).actual
    }

    /// `plannedIncome - plannedSpend + actualTransfer`; transfers carry no plan
    pub fn planned_delta(&self, month: Month) -> f64 {
        self.cell(Direction::Income, month).planned - self.cell(Direction::Spend, month).planned
            + self.cell(Direction::Transfer, month).actual
    }
}

/// Remainder row: what is left of each month after spending.
///
/// Fed with [`DirectionTotals::from_blocks`] it follows the visible categories.
pub fn remainders(
    totals: &DirectionTotals,
    months: &[Month],
    taint: &TaintSets,
) -> BTreeMap<Month, Remainder> {
    months
        .iter()
        .map(|&month| {
            let remainder = Remainder {
                plan: totals.planned_delta(month),
                actual: totals.actual_delta(month),
                is_tainted: taint.month(month),
            };
            (month, remainder)
        })
        .collect()
}
