//! Console rendering of the grid and year rollups

use budget_engine::{
    CellValue, GridView, YearTotalComputed, format_fx_amount, liquidity_breakdown,
};
use tabled::builder::Builder;
use tabled::settings::Style;

/// Marker appended to values that include unconvertible currency
const TAINT_MARK: &str = "*";

fn amount(value: f64) -> String {
    format!("{value:.0}")
}

fn plan_actual(plan: f64, actual: f64, tainted: bool) -> String {
    let mark = if tainted { TAINT_MARK } else { "" };
    format!("{} / {}{}", amount(plan), amount(actual), mark)
}

fn cell_text(cell: Option<&CellValue>, tainted: bool) -> String {
    match cell {
        Some(cell) => plan_actual(cell.planned, cell.actual, tainted),
        None => String::new(),
    }
}

/// Build the grid table: one column per month, plan / actual per cell
pub fn grid_table(view: &GridView) -> String {
    let mut builder = Builder::default();

    let mut header = vec![String::new()];
    header.extend(view.months.iter().map(|m| m.to_string()));
    builder.push_record(header);

    for block in &view.blocks {
        let mut subtotal_row = vec![block.label.to_uppercase()];
        subtotal_row.extend(view.months.iter().map(|m| {
            let subtotal = block.subtotal(*m);
            plan_actual(
                subtotal.planned,
                subtotal.actual,
                view.taint.subtotal(block.direction, *m),
            )
        }));
        builder.push_record(subtotal_row);

        for category in &block.categories {
            let mut row = vec![format!("  {category}")];
            row.extend(view.months.iter().map(|m| {
                cell_text(
                    block.cell(*m, category),
                    view.taint.cell(block.direction, *m, category),
                )
            }));
            builder.push_record(row);
        }
    }

    let mut remainder_row = vec!["Remainder".to_string()];
    remainder_row.extend(view.months.iter().map(|m| {
        let r = view.remainders.get(m).copied().unwrap_or_default();
        plan_actual(r.plan, r.actual, r.is_tainted)
    }));
    builder.push_record(remainder_row);

    let mut balance_row = vec!["Balance".to_string()];
    balance_row.extend(view.months.iter().map(|m| {
        let b = view.balances.get(m).copied().unwrap_or_default();
        plan_actual(b.plan, b.actual, b.is_tainted)
    }));
    builder.push_record(balance_row);

    let mut fx_row = vec!["FX".to_string()];
    fx_row.extend(
        view.months
            .iter()
            .map(|m| view.fx_adjustments.get(m).map(|v| format_fx_amount(*v)).unwrap_or_default()),
    );
    builder.push_record(fx_row);

    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

/// Conversion warnings and the latest liquidity split, one line each
pub fn grid_notes(view: &GridView) -> Vec<String> {
    let mut notes = Vec::new();

    for warning in &view.conversion_warnings {
        notes.push(format!(
            "{TAINT_MARK} {}: no {} rate, amounts in that currency were left out",
            warning.month, warning.currency
        ));
    }

    if let Some(month) = view.liquidity.keys().next_back() {
        let shares = liquidity_breakdown(&view.liquidity, *month);
        let parts: Vec<String> = shares
            .iter()
            .map(|s| format!("{} {} ({:.0}%)", s.tier, amount(s.amount), s.share * 100.0))
            .collect();
        notes.push(format!("Liquidity at end of {month}: {}", parts.join(", ")));
    }

    notes
}

/// Build the year rollup table
pub fn year_table(year: &YearTotalComputed) -> String {
    let mut builder = Builder::default();
    builder.push_record(["", "Planned", "Actual"]);

    for direction in &year.directions {
        let mark = if direction.is_tainted { TAINT_MARK } else { "" };
        builder.push_record([
            format!("{}{mark}", direction.direction.label().to_uppercase()),
            amount(direction.total.planned),
            amount(direction.total.actual),
        ]);
        for (category, total) in &direction.categories {
            builder.push_record([
                format!("  {category}"),
                amount(total.planned),
                amount(total.actual),
            ]);
        }
    }

    builder.push_record([
        "Remainder".to_string(),
        amount(year.remainder.plan),
        amount(year.remainder.actual),
    ]);
    builder.push_record([
        "December balance".to_string(),
        amount(year.december_balance.plan),
        amount(year.december_balance.actual),
    ]);
    builder.push_record([
        "FX".to_string(),
        String::new(),
        format_fx_amount(year.fx_total),
    ]);

    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_actual_marks_taint() {
        assert_eq!(plan_actual(1000.4, 980.0, false), "1000 / 980");
        assert_eq!(plan_actual(-50.0, 0.0, true), "-50 / 0*");
        assert_eq!(cell_text(None, true), "");
    }
}
