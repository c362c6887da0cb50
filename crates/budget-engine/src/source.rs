//! The server/storage collaborator
//!
//! The engine never talks to storage directly. Everything it loads or saves
//! goes through [`BudgetSource`]; [`MemorySource`] is the in-process
//! implementation backing the CLI dataset file and the tests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::SourceError;
use crate::lock;
use crate::model::{
    BudgetRow, ConversionWarning, CumulativeBefore, Direction, LiquidityBalances,
    MonthEndBalances, PlanKind, RowKey,
};
use crate::month::Month;

/// Month range of one window fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRequest {
    pub month_from: Month,
    pub month_to: Month,
    /// First month whose plan fields are wanted
    pub plan_from: Month,
    /// Last month whose actual fields are wanted
    pub actual_to: Month,
}

impl WindowRequest {
    pub fn new(month_from: Month, month_to: Month, current_month: Month) -> Self {
        Self {
            month_from,
            month_to,
            plan_from: month_from,
            actual_to: month_to.min(current_month),
        }
    }
}

/// Everything one window fetch returns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowPayload {
    pub rows: Vec<BudgetRow>,
    #[serde(default)]
    pub conversion_warnings: Vec<ConversionWarning>,
    #[serde(default)]
    pub cumulative_before: CumulativeBefore,
    #[serde(default)]
    pub month_end_balances: MonthEndBalances,
    #[serde(default)]
    pub month_end_balances_by_liquidity: LiquidityBalances,
}

pub trait BudgetSource: Send + Sync + 'static {
    fn fetch_window(
        &self,
        request: WindowRequest,
    ) -> impl Future<Output = Result<WindowPayload, SourceError>> + Send;

    fn set_plan(
        &self,
        key: RowKey,
        kind: PlanKind,
        value: f64,
    ) -> impl Future<Output = Result<(), SourceError>> + Send;

    /// Apply `base` to every month after `from` through December of its year
    fn fill_months(
        &self,
        from: Month,
        direction: Direction,
        category: String,
        base: f64,
    ) -> impl Future<Output = Result<(), SourceError>> + Send;

    fn get_comment(
        &self,
        key: RowKey,
    ) -> impl Future<Output = Result<Option<String>, SourceError>> + Send;

    fn set_comment(
        &self,
        key: RowKey,
        text: String,
    ) -> impl Future<Output = Result<(), SourceError>> + Send;
}

// =============================================================================
// In-memory source
// =============================================================================

/// Comment attached to one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellComment {
    pub month: Month,
    pub direction: Direction,
    #[serde(default)]
    pub category: String,
    pub text: String,
}

/// Serializable contents of a [`MemorySource`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub rows: Vec<BudgetRow>,
    #[serde(default)]
    pub month_end_balances: MonthEndBalances,
    #[serde(default)]
    pub month_end_balances_by_liquidity: LiquidityBalances,
    #[serde(default)]
    pub conversion_warnings: Vec<ConversionWarning>,
    #[serde(default)]
    pub comments: Vec<CellComment>,
}

#[derive(Debug, Default)]
struct Store {
    rows: BTreeMap<RowKey, BudgetRow>,
    balances: MonthEndBalances,
    liquidity: LiquidityBalances,
    warnings: Vec<ConversionWarning>,
    comments: BTreeMap<RowKey, String>,
}

#[derive(Debug, Default)]
struct Faults {
    fetches: usize,
    saves: usize,
    /// Fetches whose range ends at or after this month fail
    fetches_reaching: Option<Month>,
}

#[derive(Debug, Clone, Copy)]
enum FaultKind {
    Fetch,
    Save,
}

/// Dataset-backed source with fault injection for failure paths
#[derive(Debug, Default)]
pub struct MemorySource {
    store: Mutex<Store>,
    faults: Mutex<Faults>,
    fetches: AtomicUsize,
    requests: Mutex<Vec<WindowRequest>>,
}

impl MemorySource {
    pub fn new(dataset: Dataset) -> Self {
        let mut store = Store {
            balances: dataset.month_end_balances,
            liquidity: dataset.month_end_balances_by_liquidity,
            warnings: dataset.conversion_warnings,
            ..Default::default()
        };
        for row in dataset.rows {
            store.rows.insert(row.key(), row);
        }
        for comment in dataset.comments {
            let key = RowKey::new(comment.month, comment.direction, comment.category);
            store.comments.insert(key, comment.text);
        }
        Self {
            store: Mutex::new(store),
            ..Default::default()
        }
    }

    /// Current contents, for writing back to disk
    pub fn dataset(&self) -> Dataset {
        let store = lock(&self.store);
        Dataset {
            rows: store.rows.values().cloned().collect(),
            month_end_balances: store.balances.clone(),
            month_end_balances_by_liquidity: store.liquidity.clone(),
            conversion_warnings: store.warnings.clone(),
            comments: store
                .comments
                .iter()
                .map(|(key, text)| CellComment {
                    month: key.month,
                    direction: key.direction,
                    category: key.category.clone(),
                    text: text.clone(),
                })
                .collect(),
        }
    }

    /// Make the next `count` window fetches fail
    pub fn fail_next_fetches(&self, count: usize) {
        lock(&self.faults).fetches = count;
    }

    /// Make every fetch reaching `month` or later fail until cleared with `None`
    pub fn fail_fetches_reaching(&self, month: Option<Month>) {
        lock(&self.faults).fetches_reaching = month;
    }

    /// Make the next `count` saves (plan, fill, comment) fail
    pub fn fail_next_saves(&self, count: usize) {
        lock(&self.faults).saves = count;
    }

    /// Number of window fetches served so far, failed ones included
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<WindowRequest> {
        lock(&self.requests).clone()
    }

    fn take_fault(&self, kind: FaultKind) -> bool {
        let mut faults = lock(&self.faults);
        let counter = match kind {
            FaultKind::Fetch => &mut faults.fetches,
            FaultKind::Save => &mut faults.saves,
        };
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }

    fn check_save(&self) -> Result<(), SourceError> {
        if self.take_fault(FaultKind::Save) {
            return Err(SourceError::Unavailable("injected save failure".to_string()));
        }
        Ok(())
    }

    fn window(&self, request: WindowRequest) -> WindowPayload {
        let store = lock(&self.store);
        let mut payload = WindowPayload::default();

        for row in store.rows.values() {
            if row.month < request.month_from {
                payload.cumulative_before.add_row(row);
                continue;
            }
            if row.month > request.month_to {
                continue;
            }
            let mut row = row.clone();
            if row.month < request.plan_from {
                row.planned_base = 0.0;
                row.planned_modifier = 0.0;
                row.planned = 0.0;
            }
            if row.month > request.actual_to {
                row.actual = 0.0;
            }
            payload.rows.push(row);
        }

        let snapshot_from = request.month_from.prev();
        payload.month_end_balances = store
            .balances
            .range(snapshot_from..=request.month_to)
            .map(|(m, v)| (*m, *v))
            .collect();
        payload.month_end_balances_by_liquidity = store
            .liquidity
            .range(snapshot_from..=request.month_to)
            .map(|(m, tiers)| (*m, tiers.clone()))
            .collect();
        payload.conversion_warnings = store
            .warnings
            .iter()
            .filter(|w| w.month >= request.month_from && w.month <= request.month_to)
            .cloned()
            .collect();
        payload
    }
}

fn write_plan(row: &mut BudgetRow, kind: PlanKind, value: f64) {
    match kind {
        PlanKind::Base => row.planned_base = value,
        PlanKind::Modifier => row.planned_modifier = value,
    }
    row.planned = row.planned_base + row.planned_modifier;
}

impl BudgetSource for MemorySource {
    async fn fetch_window(&self, request: WindowRequest) -> Result<WindowPayload, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request);

        // Let concurrent callers interleave like a real network round-trip would
        tokio::task::yield_now().await;

        let reaching = lock(&self.faults).fetches_reaching;
        if reaching.is_some_and(|m| request.month_to >= m) || self.take_fault(FaultKind::Fetch) {
            return Err(SourceError::Unavailable("injected fetch failure".to_string()));
        }
        Ok(self.window(request))
    }

    async fn set_plan(&self, key: RowKey, kind: PlanKind, value: f64) -> Result<(), SourceError> {
        tokio::task::yield_now().await;
        self.check_save()?;
        let mut store = lock(&self.store);
        let row = store
            .rows
            .entry(key.clone())
            .or_insert_with(|| BudgetRow::zero(&key));
        write_plan(row, kind, value);
        Ok(())
    }

    async fn fill_months(
        &self,
        from: Month,
        direction: Direction,
        category: String,
        base: f64,
    ) -> Result<(), SourceError> {
        tokio::task::yield_now().await;
        self.check_save()?;
        let mut store = lock(&self.store);
        for month in Month::range_inclusive(from.next(), from.december()) {
            let key = RowKey::new(month, direction, category.clone());
            let row = store
                .rows
                .entry(key.clone())
                .or_insert_with(|| BudgetRow::zero(&key));
            write_plan(row, PlanKind::Base, base);
        }
        Ok(())
    }

    async fn get_comment(&self, key: RowKey) -> Result<Option<String>, SourceError> {
        tokio::task::yield_now().await;
        Ok(lock(&self.store).comments.get(&key).cloned())
    }

    async fn set_comment(&self, key: RowKey, text: String) -> Result<(), SourceError> {
        tokio::task::yield_now().await;
        self.check_save()?;
        let mut store = lock(&self.store);
        if text.trim().is_empty() {
            store.comments.remove(&key);
        } else {
            store.comments.insert(key, text);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Month {
        s.parse().unwrap()
    }

    fn row(
        month: &str,
        direction: Direction,
        category: &str,
        planned: f64,
        actual: f64,
    ) -> BudgetRow {
        BudgetRow {
            planned_base: planned,
            planned,
            actual,
            ..BudgetRow::zero(&RowKey::new(m(month), direction, category))
        }
    }

    fn source() -> MemorySource {
        MemorySource::new(Dataset {
            rows: vec![
                row("2025-11", Direction::Income, "salary", 100.0, 1000.0),
                row("2025-11", Direction::Spend, "rent", 100.0, 400.0),
                row("2025-12", Direction::Transfer, "", 0.0, -50.0),
                row("2026-01", Direction::Spend, "rent", 500.0, 450.0),
                row("2026-03", Direction::Spend, "rent", 500.0, 0.0),
            ],
            month_end_balances: [(m("2025-12"), 10.0), (m("2026-01"), 20.0), (m("2026-06"), 30.0)]
                .into_iter()
                .collect(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_fetch_window_computes_cumulative_before() {
        let src = source();
        let payload = src
            .fetch_window(WindowRequest::new(m("2026-01"), m("2026-03"), m("2026-02")))
            .await
            .unwrap();

        assert_eq!(payload.rows.len(), 2);
        assert_eq!(payload.cumulative_before.income_actual, 1000.0);
        assert_eq!(payload.cumulative_before.spend_actual, 400.0);
        assert_eq!(payload.cumulative_before.transfer_actual, -50.0);
        let snapshot_months: Vec<Month> = payload.month_end_balances.keys().copied().collect();
        assert_eq!(snapshot_months, vec![m("2025-12"), m("2026-01")]);
    }

    #[tokio::test]
    async fn test_injected_fetch_failure() {
        let src = source();
        src.fail_next_fetches(1);
        let request = WindowRequest::new(m("2026-01"), m("2026-01"), m("2026-02"));
        assert!(src.fetch_window(request).await.is_err());
        assert!(src.fetch_window(request).await.is_ok());
        assert_eq!(src.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_fetches_reaching_a_month_fail() {
        let src = source();
        src.fail_fetches_reaching(Some(m("2026-03")));
        let early = WindowRequest::new(m("2025-11"), m("2026-02"), m("2026-02"));
        let late = WindowRequest::new(m("2026-03"), m("2026-04"), m("2026-02"));
        assert!(src.fetch_window(early).await.is_ok());
        assert!(src.fetch_window(late).await.is_err());

        src.fail_fetches_reaching(None);
        assert!(src.fetch_window(late).await.is_ok());
    }

    #[tokio::test]
    async fn test_fill_months_through_december() {
        let src = source();
        src.fill_months(m("2026-10"), Direction::Spend, "rent".to_string(), 700.0)
            .await
            .unwrap();
        let data = src.dataset();
        let filled: Vec<String> = data
            .rows
            .iter()
            .filter(|r| r.planned_base == 700.0)
            .map(|r| r.month.to_string())
            .collect();
        assert_eq!(filled, vec!["2026-11", "2026-12"]);
    }

    #[tokio::test]
    async fn test_comments_round_trip_and_clear() {
        let src = source();
        let key = RowKey::new(m("2026-01"), Direction::Spend, "rent");
        src.set_comment(key.clone(), "deposit".to_string()).await.unwrap();
        assert_eq!(src.get_comment(key.clone()).await.unwrap().as_deref(), Some("deposit"));
        src.set_comment(key.clone(), String::new()).await.unwrap();
        assert_eq!(src.get_comment(key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_plan_keeps_planned_sum() {
        let src = source();
        let key = RowKey::new(m("2026-01"), Direction::Spend, "rent");
        src.set_plan(key.clone(), PlanKind::Modifier, 25.0).await.unwrap();
        let data = src.dataset();
        let row = data.rows.iter().find(|r| r.matches(&key)).unwrap();
        assert_eq!(row.planned, 525.0);
    }
}
