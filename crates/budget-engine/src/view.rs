//! The derived grid: blocks, remainder, balance and FX rows for a month range
//!
//! The same pipeline serves the visible window and the year rollups.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::{DirectionTotals, aggregate_rows, remainders};
use crate::fx::fx_adjustments;
use crate::model::{
    BudgetRow, ConversionWarning, CumulativeBalance, CumulativeBefore, Direction, DirectionBlock,
    LiquidityBalances, MonthEndBalances, Remainder, ViewOptions,
};
use crate::month::Month;
use crate::projection::{ProjectionInput, project_balances};
use crate::taint::TaintSets;

/// Raw state one pipeline run reads
pub struct PipelineInput<'a> {
    pub months: &'a [Month],
    pub rows: &'a [BudgetRow],
    pub before: CumulativeBefore,
    pub balances: &'a MonthEndBalances,
    pub liquidity: &'a LiquidityBalances,
    pub warnings: &'a BTreeSet<ConversionWarning>,
    pub current_month: Month,
    pub options: &'a ViewOptions,
}

/// Everything the grid renders for a month range
#[derive(Debug, Clone, PartialEq)]
pub struct GridView {
    pub months: Vec<Month>,
    pub blocks: Vec<DirectionBlock>,
    pub taint: TaintSets,
    pub remainders: BTreeMap<Month, Remainder>,
    pub balances: BTreeMap<Month, CumulativeBalance>,
    pub fx_adjustments: BTreeMap<Month, f64>,
    pub month_end_balances: MonthEndBalances,
    pub liquidity: LiquidityBalances,
    pub conversion_warnings: Vec<ConversionWarning>,
}

impl GridView {
    pub fn compute(input: &PipelineInput<'_>) -> Self {
        let months = input.months;
        let in_range = |month: Month| months.contains(&month);
        let rows: Vec<BudgetRow> = input
            .rows
            .iter()
            .filter(|r| in_range(r.month))
            .cloned()
            .collect();

        let blocks = aggregate_rows(&rows, months, input.current_month, input.options);
        // Blocks and remainder follow the visible categories; the balance row
        // reconciles every row and carries every row's taint.
        let taint = TaintSets::from_rows(
            rows.iter()
                .filter(|r| input.options.is_visible(r.direction, &r.category)),
        );
        let all_taint = TaintSets::from_rows(&rows);
        let all_totals = DirectionTotals::from_rows(&rows, months);
        let visible_totals = DirectionTotals::from_blocks(&blocks, months);

        let balances = project_balances(&ProjectionInput {
            months,
            totals: &all_totals,
            before: input.before,
            taint: &all_taint,
            current_month: input.current_month,
            balances: input.balances,
        });
        let fx = fx_adjustments(months, &all_totals, input.balances, input.current_month);

        GridView {
            months: months.to_vec(),
            remainders: remainders(&visible_totals, months, &taint),
            blocks,
            taint,
            balances,
            fx_adjustments: fx,
            month_end_balances: input
                .balances
                .iter()
                .filter(|(m, _)| in_range(**m))
                .map(|(m, v)| (*m, *v))
                .collect(),
            liquidity: input
                .liquidity
                .iter()
                .filter(|(m, _)| in_range(**m))
                .map(|(m, tiers)| (*m, tiers.clone()))
                .collect(),
            conversion_warnings: input
                .warnings
                .iter()
                .filter(|w| in_range(w.month))
                .cloned()
                .collect(),
        }
    }

    pub fn block(&self, direction: Direction) -> Option<&DirectionBlock> {
        self.blocks.iter().find(|b| b.direction == direction)
    }
}

/// One tier's share of a month-end snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidityShare {
    pub tier: String,
    pub amount: f64,
    /// Fraction of the month's total across tiers; zero when the total is zero
    pub share: f64,
}

/// Tier breakdown of one month, largest tier first
pub fn liquidity_breakdown(liquidity: &LiquidityBalances, month: Month) -> Vec<LiquidityShare> {
    let Some(tiers) = liquidity.get(&month) else {
        return Vec::new();
    };
    let total: f64 = tiers.values().sum();
    let mut shares: Vec<LiquidityShare> = tiers
        .iter()
        .map(|(tier, amount)| LiquidityShare {
            tier: tier.clone(),
            amount: *amount,
            share: if total == 0.0 { 0.0 } else { amount / total },
        })
        .collect();
    shares.sort_by(|a, b| {
        b.amount
            .partial_cmp(&a.amount)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    shares
}
