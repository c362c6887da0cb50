//! Ordered row storage for the loaded window
//!
//! Insertion order matters: it is the tie order of category ranking, so left
//! batches go to the front and right batches to the back. A row whose key is
//! already present is never stored twice.

use std::collections::HashSet;

use crate::model::{BudgetRow, RowKey};
use crate::month::Month;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    rows: Vec<BudgetRow>,
}

impl RowSet {
    pub fn new(rows: Vec<BudgetRow>) -> Self {
        let mut set = Self::default();
        set.merge_back(rows);
        set
    }

    pub fn as_slice(&self) -> &[BudgetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &RowKey) -> Option<&BudgetRow> {
        self.rows.iter().find(|r| r.matches(key))
    }

    /// Row for `key`, created with zero values when missing
    pub fn get_or_insert(&mut self, key: &RowKey) -> &mut BudgetRow {
        let index = match self.rows.iter().position(|r| r.matches(key)) {
            Some(index) => index,
            None => {
                self.rows.push(BudgetRow::zero(key));
                self.rows.len() - 1
            }
        };
        &mut self.rows[index]
    }

    /// Prepend a batch, returning the rows that were actually added
    pub fn merge_front(&mut self, incoming: Vec<BudgetRow>) -> Vec<BudgetRow> {
        let added = self.fresh(incoming);
        let mut rows = added.clone();
        rows.append(&mut self.rows);
        self.rows = rows;
        added
    }

    /// Append a batch, returning the rows that were actually added
    pub fn merge_back(&mut self, incoming: Vec<BudgetRow>) -> Vec<BudgetRow> {
        let added = self.fresh(incoming);
        self.rows.extend(added.iter().cloned());
        added
    }

    pub fn replace_all(&mut self, rows: Vec<BudgetRow>) {
        self.rows.clear();
        self.merge_back(rows);
    }

    pub fn in_range(&self, from: Month, to: Month) -> impl Iterator<Item = &BudgetRow> {
        self.rows
            .iter()
            .filter(move |r| r.month >= from && r.month <= to)
    }

    fn fresh(&self, incoming: Vec<BudgetRow>) -> Vec<BudgetRow> {
        let mut seen: HashSet<RowKey> = self.rows.iter().map(BudgetRow::key).collect();
        incoming
            .into_iter()
            .filter(|row| seen.insert(row.key()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Direction;

    fn row(month: &str, category: &str, actual: f64) -> BudgetRow {
        BudgetRow {
            actual,
            ..BudgetRow::zero(&RowKey::new(month.parse().unwrap(), Direction::Spend, category))
        }
    }

    fn categories(set: &RowSet) -> Vec<String> {
        set.as_slice().iter().map(|r| format!("{}:{}", r.month, r.category)).collect()
    }

    #[test]
    fn test_merge_front_and_back_keep_order() {
        let mut set = RowSet::new(vec![row("2026-02", "b", 1.0)]);
        set.merge_front(vec![row("2026-01", "a", 1.0)]);
        set.merge_back(vec![row("2026-03", "c", 1.0)]);
        assert_eq!(categories(&set), ["2026-01:a", "2026-02:b", "2026-03:c"]);
    }

    #[test]
    fn test_overlapping_batches_are_not_duplicated() {
        let mut set = RowSet::new(vec![row("2026-02", "b", 5.0)]);
        let added = set.merge_front(vec![row("2026-01", "a", 1.0), row("2026-02", "b", 5.0)]);
        assert_eq!(added.len(), 1);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(&row("2026-02", "b", 0.0).key()).unwrap().actual, 5.0);
    }

    #[test]
    fn test_get_or_insert_creates_zero_row() {
        let mut set = RowSet::default();
        let key = row("2026-04", "new", 0.0).key();
        set.get_or_insert(&key).planned_base = 10.0;
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&key).unwrap().planned_base, 10.0);
        set.get_or_insert(&key).planned_modifier = 2.0;
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_in_range() {
        let set = RowSet::new(vec![
            row("2026-01", "a", 1.0),
            row("2026-02", "a", 1.0),
            row("2026-03", "a", 1.0),
        ]);
        let from = "2026-02".parse().unwrap();
        let to = "2026-03".parse().unwrap();
        assert_eq!(set.in_range(from, to).count(), 2);
    }
}
