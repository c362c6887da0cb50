//! Reconciliation of real balance movement against bookkeeping
//!
//! Whatever part of a month's real balance change the budget rows do not
//! explain is attributed to exchange-rate movement.

use std::collections::BTreeMap;

use crate::aggregate::DirectionTotals;
use crate::model::MonthEndBalances;
use crate::month::Month;

/// FX adjustment per month.
///
/// A month is present only when it is not after `current_month` and both its
/// own snapshot and the previous month's snapshot exist.
pub fn fx_adjustments(
    months: &[Month],
    totals: &DirectionTotals,
    balances: &MonthEndBalances,
    current_month: Month,
) -> BTreeMap<Month, f64> {
    months
        .iter()
        .filter(|&&month| month <= current_month)
        .filter_map(|&month| {
            let real = balances.get(&month)?;
            let previous = balances.get(&month.prev())?;
            Some((month, real - previous - totals.actual_delta(month)))
        })
        .collect()
}

/// Display text of an FX adjustment: the negated value rounded half up, with
/// an explicit sign unless it rounds to zero.
pub fn format_fx_amount(value: f64) -> String {
    let shown = round_half_up(-value);
    if shown == 0.0 {
        "0".to_string()
    } else if shown > 0.0 {
        format!("+{}", shown as i64)
    } else {
        format!("-{}", (-shown) as i64)
    }
}

/// Round to the nearest integer, ties toward positive infinity
fn round_half_up(value: f64) -> f64 {
    // Adding 0.5 first rounds values just under a tie up in f64
    if value.fract().abs() == 0.5 {
        value.ceil()
    } else {
        value.round()
    }
}
