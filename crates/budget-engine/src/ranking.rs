//! Category ordering by time-weighted "effective value"
//!
//! Effective value sums, over the current calendar year, the actual amount of
//! elapsed months and the planned amount of the current and future months.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::CellValue;
use crate::month::Month;

/// Effective value of one category from its (month -> cell) series
pub fn effective_value<'a>(
    cells: impl IntoIterator<Item = (&'a Month, &'a CellValue)>,
    current_month: Month,
) -> f64 {
    cells
        .into_iter()
        .filter(|(month, _)| month.year() == current_month.year())
        .map(|(month, cell)| {
            if *month < current_month {
                cell.actual
            } else {
                cell.planned
            }
        })
        .sum()
}

/// Order categories descending by effective value.
///
/// The sort is stable: categories with equal values keep the order in which
/// they were supplied. Masked categories always follow unmasked ones.
pub fn rank_categories(
    categories: &[String],
    values: &BTreeMap<String, f64>,
    masked: Option<&BTreeSet<String>>,
) -> Vec<String> {
    let value_of = |category: &String| values.get(category).copied().unwrap_or(0.0);
    let by_value_desc = |a: &String, b: &String| {
        value_of(b)
            .partial_cmp(&value_of(a))
            .unwrap_or(Ordering::Equal)
    };

    let (mut unmasked, mut hidden): (Vec<String>, Vec<String>) = categories
        .iter()
        .cloned()
        .partition(|c| masked.is_none_or(|m| !m.contains(c)));

    // slice::sort_by is stable
    unmasked.sort_by(by_value_desc);
    hidden.sort_by(by_value_desc);
    unmasked.extend(hidden);
    unmasked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn values(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn cell(planned: f64, actual: f64) -> CellValue {
        CellValue {
            planned_base: planned,
            planned_modifier: 0.0,
            planned,
            actual,
        }
    }

    #[test]
    fn test_effective_value_uses_actual_for_past_and_plan_otherwise() {
        let current: Month = "2026-03".parse().unwrap();
        let series: BTreeMap<Month, CellValue> = [
            ("2025-12", cell(1000.0, 1000.0)), // previous year, ignored
            ("2026-01", cell(100.0, 80.0)),
            ("2026-02", cell(100.0, 120.0)),
            ("2026-03", cell(100.0, 10.0)),
            ("2026-04", cell(150.0, 0.0)),
        ]
        .into_iter()
        .map(|(m, c)| (m.parse().unwrap(), c))
        .collect();

        assert_eq!(effective_value(&series, current), 80.0 + 120.0 + 100.0 + 150.0);
    }

    #[test]
    fn test_descending_order() {
        let ranked = rank_categories(
            &names(&["food", "rent", "fun"]),
            &values(&[("food", 400.0), ("rent", 1500.0), ("fun", 50.0)]),
            None,
        );
        assert_eq!(ranked, names(&["rent", "food", "fun"]));
    }

    #[test]
    fn test_ties_keep_supplied_order() {
        let ranked = rank_categories(
            &names(&["B", "A"]),
            &values(&[("A", 300.0), ("B", 300.0)]),
            None,
        );
        assert_eq!(ranked, names(&["B", "A"]));
    }

    #[test]
    fn test_ranking_is_idempotent() {
        let vals = values(&[("a", 5.0), ("b", 9.0), ("c", 5.0), ("d", 9.0)]);
        let once = rank_categories(&names(&["a", "b", "c", "d"]), &vals, None);
        let twice = rank_categories(&once, &vals, None);
        assert_eq!(once, names(&["b", "d", "a", "c"]));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_masked_categories_follow_unmasked() {
        let masked: BTreeSet<String> = ["salary".to_string()].into_iter().collect();
        let ranked = rank_categories(
            &names(&["bonus", "salary", "gift", "dividends"]),
            &values(&[
                ("salary", 9000.0),
                ("bonus", 100.0),
                ("gift", 10.0),
                ("dividends", 200.0),
            ]),
            Some(&masked),
        );
        assert_eq!(ranked, names(&["dividends", "bonus", "gift", "salary"]));
    }

    #[test]
    fn test_missing_value_counts_as_zero() {
        let ranked = rank_categories(
            &names(&["new", "old"]),
            &values(&[("old", -10.0)]),
            None,
        );
        assert_eq!(ranked, names(&["new", "old"]));
    }
}
