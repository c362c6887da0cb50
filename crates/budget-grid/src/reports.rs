//! CSV exports of the grid, the balance rows and a year rollup

use anyhow::Result;
use budget_engine::{GridView, YearTotalComputed, format_fx_amount};
use csv::Writer;
use std::path::{Path, PathBuf};

pub const GRID_FILENAME: &str = "grid.csv";
pub const BALANCES_FILENAME: &str = "balances.csv";
pub const YEAR_FILENAME: &str = "year.csv";

/// Write every report, returning the paths written
pub fn generate_all_reports(
    output_dir: &Path,
    view: &GridView,
    year: Option<&YearTotalComputed>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = vec![
        generate_grid(output_dir, view)?,
        generate_balances(output_dir, view)?,
    ];
    if let Some(year) = year {
        written.push(generate_year(output_dir, year)?);
    }
    Ok(written)
}

/// Generate grid.csv: one line per category cell, subtotals included
fn generate_grid(output_dir: &Path, view: &GridView) -> Result<PathBuf> {
    let path = output_dir.join(GRID_FILENAME);
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record([
        "Month",
        "Direction",
        "Category",
        "Planned_Base",
        "Planned_Modifier",
        "Planned",
        "Actual",
        "Unconvertible",
    ])?;

    for block in &view.blocks {
        for month in &view.months {
            let month_label = month.to_string();
            for category in &block.categories {
                let Some(cell) = block.cell(*month, category) else {
                    continue;
                };
                let tainted = view.taint.cell(block.direction, *month, category);
                wtr.write_record([
                    month_label.as_str(),
                    block.label,
                    category.as_str(),
                    &format!("{:.2}", cell.planned_base),
                    &format!("{:.2}", cell.planned_modifier),
                    &format!("{:.2}", cell.planned),
                    &format!("{:.2}", cell.actual),
                    yes_no(tainted),
                ])?;
            }

            let subtotal = block.subtotal(*month);
            wtr.write_record([
                month_label.as_str(),
                block.label,
                "TOTAL",
                &format!("{:.2}", subtotal.planned_base),
                &format!("{:.2}", subtotal.planned_modifier),
                &format!("{:.2}", subtotal.planned),
                &format!("{:.2}", subtotal.actual),
                yes_no(view.taint.subtotal(block.direction, *month)),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(path)
}

/// Generate balances.csv: remainder, running balance, snapshot and FX per month
fn generate_balances(output_dir: &Path, view: &GridView) -> Result<PathBuf> {
    let path = output_dir.join(BALANCES_FILENAME);
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record([
        "Month",
        "Remainder_Plan",
        "Remainder_Actual",
        "Balance_Plan",
        "Balance_Actual",
        "Real_Balance",
        "FX_Adjustment",
        "FX_Display",
        "Unconvertible",
    ])?;

    for month in &view.months {
        let remainder = view.remainders.get(month).copied().unwrap_or_default();
        let balance = view.balances.get(month).copied().unwrap_or_default();
        let real = view
            .month_end_balances
            .get(month)
            .map(|v| format!("{v:.2}"))
            .unwrap_or_default();
        let fx = view.fx_adjustments.get(month);

        wtr.write_record([
            month.to_string().as_str(),
            &format!("{:.2}", remainder.plan),
            &format!("{:.2}", remainder.actual),
            &format!("{:.2}", balance.plan),
            &format!("{:.2}", balance.actual),
            &real,
            &fx.map(|v| format!("{v:.2}")).unwrap_or_default(),
            &fx.map(|v| format_fx_amount(*v)).unwrap_or_default(),
            yes_no(balance.is_tainted),
        ])?;
    }

    wtr.flush()?;
    Ok(path)
}

/// Generate year.csv: per-direction and per-category totals of one year
fn generate_year(output_dir: &Path, year: &YearTotalComputed) -> Result<PathBuf> {
    let path = output_dir.join(YEAR_FILENAME);
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record(["Year", "Direction", "Category", "Planned", "Actual"])?;
    let year_label = year.year.to_string();

    for direction in &year.directions {
        let label = direction.direction.to_string();
        for (category, total) in &direction.categories {
            wtr.write_record([
                year_label.as_str(),
                label.as_str(),
                category.as_str(),
                &format!("{:.2}", total.planned),
                &format!("{:.2}", total.actual),
            ])?;
        }
        wtr.write_record([
            year_label.as_str(),
            label.as_str(),
            "TOTAL",
            &format!("{:.2}", direction.total.planned),
            &format!("{:.2}", direction.total.actual),
        ])?;
    }

    wtr.write_record([
        year_label.as_str(),
        "remainder",
        "",
        &format!("{:.2}", year.remainder.plan),
        &format!("{:.2}", year.remainder.actual),
    ])?;
    wtr.write_record([
        year_label.as_str(),
        "balance",
        "December",
        &format!("{:.2}", year.december_balance.plan),
        &format!("{:.2}", year.december_balance.actual),
    ])?;
    wtr.write_record([
        year_label.as_str(),
        "fx",
        "",
        "",
        &format!("{:.2}", year.fx_total),
    ])?;

    wtr.flush()?;
    Ok(path)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
