//! Running plan/actual balance per month
//!
//! The running totals start from the real snapshot of the month before the
//! window when there is one, otherwise from the net of all actuals before the
//! window. Past months re-anchor on their own snapshot, so bookkeeping drift
//! never compounds across snapshots.
//!
//! Transfers have no plan: the plan track always adds the actual transfer,
//! for current and future months alike.

use std::collections::BTreeMap;

use crate::aggregate::DirectionTotals;
use crate::model::{CumulativeBalance, CumulativeBefore, MonthEndBalances};
use crate::month::Month;
use crate::taint::TaintSets;

/// Inputs of one projection call
pub struct ProjectionInput<'a> {
    pub months: &'a [Month],
    pub totals: &'a DirectionTotals,
    pub before: CumulativeBefore,
    pub taint: &'a TaintSets,
    pub current_month: Month,
    pub balances: &'a MonthEndBalances,
}

pub fn project_balances(input: &ProjectionInput<'_>) -> BTreeMap<Month, CumulativeBalance> {
    let mut result = BTreeMap::new();
    let Some(first) = input.months.first() else {
        return result;
    };

    let seed = input
        .balances
        .get(&first.prev())
        .copied()
        .unwrap_or_else(|| input.before.net());
    let mut plan = seed;
    let mut actual = seed;
    let mut tainted = false;

    for &month in input.months {
        let snapshot = input.balances.get(&month).copied();

        if month < input.current_month {
            match snapshot {
                Some(real) => {
                    plan = real;
                    actual = real;
                }
                None => {
                    let delta = input.totals.actual_delta(month);
                    plan += delta;
                    actual += delta;
                }
            }
        } else if month == input.current_month {
            plan += input.totals.planned_delta(month);
            match snapshot {
                Some(real) => actual = real,
                None => actual += input.totals.actual_delta(month),
            }
        } else {
            let delta = input.totals.planned_delta(month);
            plan += delta;
            actual += delta;
        }

        tainted = tainted || input.taint.month(month);
        result.insert(
            month,
            CumulativeBalance {
                plan,
                actual,
                is_tainted: tainted,
            },
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BudgetRow, Direction, RowKey};

    fn m(s: &str) -> Month {
        s.parse().unwrap()
    }

    fn row(month: &str, direction: Direction, planned: f64, actual: f64) -> BudgetRow {
        BudgetRow {
            planned_base: planned,
            planned,
            actual,
            ..BudgetRow::zero(&RowKey::new(m(month), direction, "c"))
        }
    }

    fn project(
        rows: &[BudgetRow],
        months: &[Month],
        before: CumulativeBefore,
        current: &str,
        balances: &MonthEndBalances,
    ) -> BTreeMap<Month, CumulativeBalance> {
        let totals = DirectionTotals::from_rows(rows, months);
        let taint = TaintSets::from_rows(rows);
        project_balances(&ProjectionInput {
            months,
            totals: &totals,
            before,
            taint: &taint,
            current_month: m(current),
            balances,
        })
    }

    #[test]
    fn test_single_spend_without_snapshots() {
        let rows = vec![row("2026-01", Direction::Spend, 1500.0, 1500.0)];
        let out = project(
            &rows,
            &[m("2026-01")],
            CumulativeBefore::default(),
            "2026-02",
            &MonthEndBalances::new(),
        );
        assert_eq!(out[&m("2026-01")].actual, -1500.0);
        assert_eq!(out[&m("2026-01")].plan, -1500.0);
    }

    #[test]
    fn test_seed_from_previous_month_snapshot() {
        let rows = vec![row("2026-01", Direction::Income, 100.0, 100.0)];
        let balances: MonthEndBalances = [(m("2025-12"), 5000.0)].into_iter().collect();
        let before = CumulativeBefore {
            income_actual: 1.0,
            ..Default::default()
        };
        let out = project(&rows, &[m("2026-01")], before, "2026-02", &balances);
        assert_eq!(out[&m("2026-01")].actual, 5100.0);
    }

    #[test]
    fn test_seed_from_cumulative_before() {
        let before = CumulativeBefore {
            income_actual: 1000.0,
            spend_actual: 300.0,
            transfer_actual: -50.0,
        };
        let out = project(&[], &[m("2026-01")], before, "2026-02", &MonthEndBalances::new());
        assert_eq!(out[&m("2026-01")].actual, 650.0);
    }

    #[test]
    fn test_past_snapshot_overrides_bookkeeping() {
        let rows = vec![
            row("2026-01", Direction::Income, 0.0, 1000.0),
            row("2026-02", Direction::Spend, 0.0, 100.0),
        ];
        let months = [m("2026-01"), m("2026-02")];
        let balances: MonthEndBalances = [(m("2026-01"), 1234.5)].into_iter().collect();
        let out = project(&rows, &months, CumulativeBefore::default(), "2026-03", &balances);
        assert_eq!(out[&m("2026-01")].actual, 1234.5);
        assert_eq!(out[&m("2026-01")].plan, 1234.5);
        assert_eq!(out[&m("2026-02")].actual, 1134.5);
    }

    #[test]
    fn test_current_month_plan_carries_actual_snaps() {
        let rows = vec![
            row("2026-02", Direction::Income, 3000.0, 1000.0),
            row("2026-02", Direction::Spend, 2000.0, 500.0),
        ];
        let balances: MonthEndBalances =
            [(m("2026-01"), 10_000.0), (m("2026-02"), 10_200.0)].into_iter().collect();
        let out = project(
            &rows,
            &[m("2026-02")],
            CumulativeBefore::default(),
            "2026-02",
            &balances,
        );
        assert_eq!(out[&m("2026-02")].plan, 11_000.0);
        assert_eq!(out[&m("2026-02")].actual, 10_200.0);
    }

    #[test]
    fn test_future_uses_plan_and_actual_transfer() {
        let rows = vec![
            row("2026-04", Direction::Income, 3000.0, 0.0),
            row("2026-04", Direction::Spend, 1000.0, 0.0),
            row("2026-04", Direction::Transfer, 777.0, -200.0),
        ];
        let out = project(
            &rows,
            &[m("2026-04")],
            CumulativeBefore::default(),
            "2026-02",
            &MonthEndBalances::new(),
        );
        assert_eq!(out[&m("2026-04")].plan, 1800.0);
        assert_eq!(out[&m("2026-04")].actual, 1800.0);
    }

    #[test]
    fn test_snapshots_in_future_are_ignored() {
        let rows = vec![row("2026-05", Direction::Income, 100.0, 0.0)];
        let balances: MonthEndBalances = [(m("2026-05"), 99_999.0)].into_iter().collect();
        let out = project(
            &rows,
            &[m("2026-05")],
            CumulativeBefore::default(),
            "2026-02",
            &balances,
        );
        assert_eq!(out[&m("2026-05")].actual, 100.0);
    }

    #[test]
    fn test_taint_is_monotonic() {
        let mut tainted = row("2026-02", Direction::Spend, 10.0, 10.0);
        tainted.has_unconvertible = true;
        let rows = vec![row("2026-01", Direction::Spend, 10.0, 10.0), tainted];
        let months = Month::range_inclusive(m("2026-01"), m("2026-05"));
        let out = project(
            &rows,
            &months,
            CumulativeBefore::default(),
            "2026-03",
            &MonthEndBalances::new(),
        );

        let flags: Vec<bool> = months.iter().map(|month| out[month].is_tainted).collect();
        assert_eq!(flags, vec![false, true, true, true, true]);
    }

    #[test]
    fn test_actual_equals_snapshot_for_every_snapshot_month() {
        let rows = vec![
            row("2026-01", Direction::Income, 0.0, 333.33),
            row("2026-02", Direction::Spend, 0.0, 1.11),
            row("2026-03", Direction::Income, 0.0, 7.0),
        ];
        let months = Month::range_inclusive(m("2026-01"), m("2026-03"));
        let balances: MonthEndBalances =
            [(m("2026-01"), 100.0), (m("2026-03"), 250.25)].into_iter().collect();
        let out = project(&rows, &months, CumulativeBefore::default(), "2026-03", &balances);
        for (month, real) in &balances {
            assert_eq!(out[month].actual, *real);
        }
    }

    #[test]
    fn test_empty_months() {
        let none = MonthEndBalances::new();
        let out = project(&[], &[], CumulativeBefore::default(), "2026-02", &none);
        assert!(out.is_empty());
    }
}
