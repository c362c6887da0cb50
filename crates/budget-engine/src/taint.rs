//! Propagation of "currency unconvertible" flags
//!
//! A row flagged `has_unconvertible` taints its own cell, the subtotal of its
//! direction for that month, and the month as a whole. Coarser taint is the
//! plain union of the finer rows that roll into it.

use std::collections::BTreeSet;

use crate::model::{BudgetRow, Direction};
use crate::month::Month;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaintSets {
    pub cells: BTreeSet<(Direction, Month, String)>,
    pub subtotals: BTreeSet<(Direction, Month)>,
    pub months: BTreeSet<Month>,
}

impl TaintSets {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a BudgetRow>) -> Self {
        let mut taint = TaintSets::default();
        for row in rows.into_iter().filter(|r| r.has_unconvertible) {
            taint
                .cells
                .insert((row.direction, row.month, row.category.clone()));
            taint.subtotals.insert((row.direction, row.month));
            taint.months.insert(row.month);
        }
        taint
    }

    pub fn cell(&self, direction: Direction, month: Month, category: &str) -> bool {
        self.cells
            .contains(&(direction, month, category.to_string()))
    }

    pub fn subtotal(&self, direction: Direction, month: Month) -> bool {
        self.subtotals.contains(&(direction, month))
    }

    pub fn month(&self, month: Month) -> bool {
        self.months.contains(&month)
    }

    /// Any tainted category of `direction`, over any month
    pub fn category(&self, direction: Direction, category: &str) -> bool {
        self.cells
            .iter()
            .any(|(d, _, c)| *d == direction && c == category)
    }

    /// Any tainted subtotal of `direction`, over any month
    pub fn direction(&self, direction: Direction) -> bool {
        self.subtotals.iter().any(|(d, _)| *d == direction)
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RowKey;

    fn row(month: &str, direction: Direction, category: &str, tainted: bool) -> BudgetRow {
        let key = RowKey::new(month.parse().unwrap(), direction, category);
        BudgetRow {
            actual: 10.0,
            has_unconvertible: tainted,
            ..BudgetRow::zero(&key)
        }
    }

    #[test]
    fn test_taint_rolls_up_by_union() {
        let jan: Month = "2026-01".parse().unwrap();
        let feb: Month = "2026-02".parse().unwrap();
        let rows = vec![
            row("2026-01", Direction::Spend, "travel", true),
            row("2026-01", Direction::Spend, "rent", false),
            row("2026-02", Direction::Income, "salary", false),
        ];
        let taint = TaintSets::from_rows(&rows);

        assert!(taint.cell(Direction::Spend, jan, "travel"));
        assert!(!taint.cell(Direction::Spend, jan, "rent"));
        assert!(taint.subtotal(Direction::Spend, jan));
        assert!(!taint.subtotal(Direction::Income, jan));
        assert!(taint.month(jan));
        assert!(!taint.month(feb));
        assert!(taint.category(Direction::Spend, "travel"));
        assert!(taint.direction(Direction::Spend));
        assert!(!taint.direction(Direction::Income));
    }

    #[test]
    fn test_clean_rows_produce_no_taint() {
        let rows = vec![row("2026-01", Direction::Income, "salary", false)];
        assert!(TaintSets::from_rows(&rows).is_empty());
    }

    #[test]
    fn test_multiple_tainted_rows_are_or_not_count() {
        let rows = vec![
            row("2026-01", Direction::Spend, "a", true),
            row("2026-01", Direction::Spend, "b", true),
        ];
        let taint = TaintSets::from_rows(&rows);
        assert_eq!(taint.subtotals.len(), 1);
        assert_eq!(taint.months.len(), 1);
        assert_eq!(taint.cells.len(), 2);
    }
}
