//! Bulk budget mutations: a pure preview, then an all-or-nothing apply.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::{
    cell::CellStateController,
    error::{BatchError, MutationError},
    grid::BudgetGrid,
    ledger::LedgerStore,
    models::{CategoryId, CellKey, CellUpdate},
    money::{apply_percent, format_currency, Percent},
    month::Month,
    status::StatusResult,
};

/// How each targeted cell's new value is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Replace with a fixed amount.
    SetAmount(i64),
    /// Grow by a percentage (negative values shrink).
    IncreasePercent(Percent),
    /// Shrink by a percentage.
    DecreasePercent(Percent),
    /// Take the budget of the preceding month.
    CopyFromPrevious,
}

impl Operation {
    /// Short description for summaries.
    pub fn describe(&self, symbol: &str) -> String {
        match self {
            Operation::SetAmount(cents) => {
                format!("Set to {}", format_currency(*cents, symbol))
            }
            Operation::IncreasePercent(p) => format!("Increase by {p}"),
            Operation::DecreasePercent(p) => format!("Decrease by {p}"),
            Operation::CopyFromPrevious => "Copy from previous period".to_string(),
        }
    }

    fn after(&self, before: i64, previous: Option<i64>) -> i64 {
        match *self {
            Operation::SetAmount(cents) => cents,
            Operation::IncreasePercent(p) => apply_percent(before, p),
            Operation::DecreasePercent(p) => apply_percent(before, p.negate()),
            Operation::CopyFromPrevious => previous.unwrap_or(before),
        }
    }
}

/// Which category rows a request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryScope {
    /// Every loaded row.
    All,
    /// An explicit list; order is irrelevant, grid order wins.
    Only(Vec<CategoryId>),
}

impl CategoryScope {
    /// Loaded rows in grid order.
    pub fn resolve(&self, grid: &BudgetGrid) -> Vec<CategoryId> {
        match self {
            CategoryScope::All => grid.categories().iter().map(|c| c.id.clone()).collect(),
            CategoryScope::Only(ids) => {
                let wanted: HashSet<&CategoryId> = ids.iter().collect();
                grid.categories()
                    .iter()
                    .filter(|c| wanted.contains(&c.id))
                    .map(|c| c.id.clone())
                    .collect()
            }
        }
    }
}

/// Category × month scope plus the operation to run over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRequest {
    /// Target rows.
    pub categories: CategoryScope,
    /// Target months.
    pub months: Vec<Month>,
    /// Value rule.
    pub operation: Operation,
}

impl MutationRequest {
    /// The context-menu shape: one row, from the cell's month onward.
    pub fn future_months(grid: &BudgetGrid, origin: &CellKey, operation: Operation) -> Self {
        Self {
            categories: CategoryScope::Only(vec![origin.category.clone()]),
            months: grid
                .months()
                .iter()
                .copied()
                .filter(|month| *month >= origin.month)
                .collect(),
            operation,
        }
    }
}

/// One previewed cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewCell {
    /// Target cell.
    pub key: CellKey,
    /// Current budget.
    pub before_cents: i64,
    /// Budget after the operation.
    pub after_cents: i64,
}

impl PreviewCell {
    /// Whether the operation changes this cell.
    pub fn changes(&self) -> bool {
        self.before_cents != self.after_cents
    }
}

/// Non-persisted effect of a request on the loaded grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationPreview {
    cells: Vec<PreviewCell>,
}

impl MutationPreview {
    /// Number of loaded cells in scope.
    pub fn affected_count(&self) -> usize {
        self.cells.len()
    }

    /// Whether nothing is in scope.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells ordered by row, then month.
    pub fn cells(&self) -> &[PreviewCell] {
        &self.cells
    }

    /// First `limit` cells and how many were left out.
    pub fn head(&self, limit: usize) -> (&[PreviewCell], usize) {
        let shown = limit.min(self.cells.len());
        (&self.cells[..shown], self.cells.len() - shown)
    }

    /// Sum of `after - before` across the scope.
    pub fn net_change_cents(&self) -> i64 {
        self.cells
            .iter()
            .map(|cell| cell.after_cents.saturating_sub(cell.before_cents))
            .fold(0_i64, i64::saturating_add)
    }

    /// Values to hand to the store.
    pub fn updates(&self) -> Vec<CellUpdate> {
        self.cells
            .iter()
            .map(|cell| CellUpdate {
                key: cell.key.clone(),
                budgeted_cents: cell.after_cents,
            })
            .collect()
    }
}

/// Compute the effect of `request` without touching any state.
///
/// Only cells loaded into `grid` count. `CopyFromPrevious` reads every source
/// value before any target changes; a month whose predecessor is not loaded
/// keeps its value.
pub fn compute_preview(grid: &BudgetGrid, request: &MutationRequest) -> MutationPreview {
    let mut months: Vec<Month> = request.months.clone();
    months.sort();
    months.dedup();

    let mut cells = Vec::new();
    for category in request.categories.resolve(grid) {
        for month in &months {
            let key = CellKey::new(category.clone(), *month);
            let Some(before) = grid.budgeted(&key) else {
                continue;
            };
            let previous = grid.budgeted(&CellKey::new(category.clone(), month.previous()));
            cells.push(PreviewCell {
                after_cents: request.operation.after(before, previous),
                before_cents: before,
                key,
            });
        }
    }
    MutationPreview { cells }
}

/// Handle for a batch waiting on the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchApply {
    /// Correlates the store answer with this batch.
    pub ticket: u64,
    /// Values to persist.
    pub updates: Vec<CellUpdate>,
}

/// Result of a fully stored batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    /// Cells written.
    pub applied: usize,
    /// Fresh classification of every written cell.
    pub statuses: Vec<(CellKey, StatusResult)>,
}

#[derive(Debug, Clone)]
struct PendingBatch {
    ticket: u64,
    updates: Vec<CellUpdate>,
}

/// Runs one batch at a time against the grid and the store.
#[derive(Debug, Default)]
pub struct BulkMutationEngine {
    pending: Option<PendingBatch>,
    next_ticket: u64,
}

impl BulkMutationEngine {
    /// Idle engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a batch is waiting on the store.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Freeze the preview of `request` into a batch for the store.
    pub fn begin_apply(
        &mut self,
        grid: &BudgetGrid,
        cells: &CellStateController,
        request: &MutationRequest,
    ) -> Result<BatchApply, MutationError> {
        if self.pending.is_some() {
            return Err(MutationError::Busy);
        }
        let preview = compute_preview(grid, request);
        if preview.is_empty() {
            return Err(MutationError::EmptyScope);
        }
        let open = [cells.editing(), cells.in_flight_key()];
        if let Some(conflict) = preview
            .cells()
            .iter()
            .find(|cell| open.contains(&Some(&cell.key)))
        {
            warn!(cell = %conflict.key, "batch blocked by open edit");
            return Err(MutationError::EditInProgress(conflict.key.clone()));
        }

        self.next_ticket += 1;
        let updates = preview.updates();
        self.pending = Some(PendingBatch {
            ticket: self.next_ticket,
            updates: updates.clone(),
        });
        info!(
            count = updates.len(),
            net_cents = preview.net_change_cents(),
            "batch dispatched"
        );
        Ok(BatchApply {
            ticket: self.next_ticket,
            updates,
        })
    }

    /// Apply the store's answer to the grid.
    pub fn complete_apply(
        &mut self,
        grid: &mut BudgetGrid,
        ticket: u64,
        result: Result<usize, BatchError>,
    ) -> Result<ApplyReport, MutationError> {
        match &self.pending {
            Some(pending) if pending.ticket == ticket => {}
            _ => return Err(MutationError::StaleTicket),
        }
        let Some(pending) = self.pending.take() else {
            return Err(MutationError::StaleTicket);
        };
        let total = pending.updates.len();

        match result {
            Ok(_) => {
                grid.apply_updates(&pending.updates);
                let statuses = pending
                    .updates
                    .iter()
                    .filter_map(|update| grid.status(&update.key).map(|s| (update.key.clone(), s)))
                    .collect();
                info!(count = total, "batch applied");
                Ok(ApplyReport {
                    applied: total,
                    statuses,
                })
            }
            Err(BatchError::Rejected(source)) => {
                warn!(error = %source, "batch rejected");
                Err(MutationError::Persistence(source))
            }
            Err(BatchError::Partial { applied, source }) => {
                let committed: HashSet<&CellKey> = applied.iter().collect();
                grid.apply_updates(
                    pending
                        .updates
                        .iter()
                        .filter(|update| committed.contains(&update.key)),
                );
                warn!(applied = applied.len(), total, error = %source, "batch partially applied");
                Err(MutationError::PartialFailure {
                    applied: applied.len(),
                    total,
                    source,
                })
            }
        }
    }

    /// Begin, store and complete in one call.
    pub async fn apply<L: LedgerStore>(
        &mut self,
        grid: &mut BudgetGrid,
        cells: &CellStateController,
        ledger: &L,
        request: &MutationRequest,
    ) -> Result<ApplyReport, MutationError> {
        let batch = self.begin_apply(grid, cells, request)?;
        let result = ledger.save_batch(&batch.updates).await;
        self.complete_apply(grid, batch.ticket, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::{Fault, InMemoryLedger},
        models::{Category, CategoryKind},
        status::BudgetStatus,
    };

    fn m(s: &str) -> Month {
        s.parse().expect("valid month")
    }

    fn categories() -> Vec<Category> {
        vec![
            Category::new("rent", "Rent", CategoryKind::Expense),
            Category::new("food", "Food", CategoryKind::Expense),
            Category::new("salary", "Salary", CategoryKind::Income),
        ]
    }

    fn grid() -> BudgetGrid {
        let mut grid = BudgetGrid::new(categories(), m("2025-01").range_to(m("2025-06")));
        for (i, month) in m("2025-01").range_to(m("2025-06")).into_iter().enumerate() {
            grid.set_budget(&CellKey::new("rent", month), 100_000 + i as i64 * 1_000);
            grid.set_budget(&CellKey::new("food", month), 40_000);
        }
        grid
    }

    #[test]
    fn future_months_cover_the_rest_of_the_row() {
        let grid = grid();
        let origin = CellKey::new("food", m("2025-04"));
        let request = MutationRequest::future_months(
            &grid,
            &origin,
            Operation::IncreasePercent(Percent::whole(5)),
        );
        let preview = compute_preview(&grid, &request);
        assert_eq!(preview.affected_count(), 3);
        assert!(preview.cells().iter().all(|c| c.after_cents == 42_000));
        assert_eq!(grid.budgeted(&origin), Some(40_000));
    }

    #[test]
    fn empty_scope_previews_nothing() {
        let grid = grid();
        for months in [vec![], m("2025-01").range_to(m("2025-06"))] {
            let request = MutationRequest {
                categories: CategoryScope::Only(vec![]),
                months,
                operation: Operation::SetAmount(50_000),
            };
            assert_eq!(compute_preview(&grid, &request).affected_count(), 0);
        }
    }

    #[test]
    fn scope_is_restricted_to_loaded_cells() {
        let grid = grid();
        let request = MutationRequest {
            categories: CategoryScope::All,
            months: m("2025-05").range_to(m("2025-08")),
            operation: Operation::SetAmount(1),
        };
        let preview = compute_preview(&grid, &request);
        assert_eq!(preview.affected_count(), 2 * 3);
        assert_eq!(preview.cells()[0].key, CellKey::new("rent", m("2025-05")));
        assert_eq!(preview.cells()[2].key, CellKey::new("food", m("2025-05")));
    }

    #[test]
    fn copy_from_previous_reads_each_predecessor() {
        let grid = grid();
        let request = MutationRequest {
            categories: CategoryScope::Only(vec![CategoryId::from("rent")]),
            months: m("2025-01").range_to(m("2025-03")),
            operation: Operation::CopyFromPrevious,
        };
        let preview = compute_preview(&grid, &request);
        let afters: Vec<i64> = preview.cells().iter().map(|c| c.after_cents).collect();
        // january has no loaded predecessor
        assert_eq!(afters, vec![100_000, 100_000, 101_000]);
    }

    #[test]
    fn net_change_saturates_on_extreme_values() {
        let preview = MutationPreview {
            cells: vec![
                PreviewCell {
                    key: CellKey::new("rent", m("2025-01")),
                    before_cents: 0,
                    after_cents: i64::MAX,
                },
                PreviewCell {
                    key: CellKey::new("food", m("2025-01")),
                    before_cents: 0,
                    after_cents: i64::MAX,
                },
            ],
        };
        assert_eq!(preview.net_change_cents(), i64::MAX);
    }

    #[test]
    fn decrease_never_goes_negative() {
        let grid = grid();
        let request = MutationRequest {
            categories: CategoryScope::Only(vec![CategoryId::from("food")]),
            months: vec![m("2025-01")],
            operation: Operation::DecreasePercent(Percent::whole(150)),
        };
        assert_eq!(compute_preview(&grid, &request).cells()[0].after_cents, 0);
    }

    #[test]
    fn open_edit_inside_scope_blocks_apply() -> anyhow::Result<()> {
        let grid = grid();
        let mut cells = CellStateController::new();
        let key = CellKey::new("food", m("2025-02"));
        cells.begin_edit(&grid, &key)?;
        let mut engine = BulkMutationEngine::new();
        let request = MutationRequest {
            categories: CategoryScope::All,
            months: m("2025-01").range_to(m("2025-03")),
            operation: Operation::SetAmount(1),
        };
        assert_eq!(
            engine.begin_apply(&grid, &cells, &request),
            Err(MutationError::EditInProgress(key))
        );
        assert!(!engine.is_busy());
        Ok(())
    }

    #[tokio::test]
    async fn all_categories_next_three_months_scenario() -> anyhow::Result<()> {
        let mut grid = grid();
        let ledger = InMemoryLedger::new(categories());
        let cells = CellStateController::new();
        let mut engine = BulkMutationEngine::new();
        let request = MutationRequest {
            categories: CategoryScope::All,
            months: m("2025-02").range_to(m("2025-04")),
            operation: Operation::SetAmount(50_000),
        };
        assert_eq!(compute_preview(&grid, &request).affected_count(), 3 * 3);

        let report = engine.apply(&mut grid, &cells, &ledger, &request).await?;
        assert_eq!(report.applied, 9);
        assert_eq!(report.statuses.len(), 9);
        assert!(report
            .statuses
            .iter()
            .all(|(_, status)| status.status == BudgetStatus::Under));
        for month in m("2025-02").range_to(m("2025-04")) {
            let key = CellKey::new("salary", month);
            assert_eq!(grid.budgeted(&key), Some(50_000));
            assert_eq!(ledger.get_cell(&key).await?.budgeted_cents, 50_000);
        }
        assert_eq!(grid.budgeted(&CellKey::new("salary", m("2025-05"))), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn rejected_batch_changes_nothing() -> anyhow::Result<()> {
        let mut grid = grid();
        let before = grid.clone();
        let ledger = InMemoryLedger::new(categories());
        ledger.inject(Fault::FailNext("offline".to_string()));
        let mut engine = BulkMutationEngine::new();
        let request = MutationRequest {
            categories: CategoryScope::All,
            months: vec![m("2025-01")],
            operation: Operation::SetAmount(1),
        };
        let result = engine
            .apply(&mut grid, &CellStateController::new(), &ledger, &request)
            .await;
        assert!(matches!(result, Err(MutationError::Persistence(_))));
        for key in request.months.iter().map(|mo| CellKey::new("rent", *mo)) {
            assert_eq!(grid.budgeted(&key), before.budgeted(&key));
        }
        assert!(!engine.is_busy());
        Ok(())
    }

    #[tokio::test]
    async fn partial_batch_is_surfaced_not_reported_as_success() -> anyhow::Result<()> {
        let mut grid = grid();
        let ledger = InMemoryLedger::new(categories());
        ledger.inject(Fault::StopBatchAfter {
            cells: 2,
            message: "connection reset".to_string(),
        });
        let mut engine = BulkMutationEngine::new();
        let request = MutationRequest {
            categories: CategoryScope::Only(vec![CategoryId::from("food")]),
            months: m("2025-01").range_to(m("2025-04")),
            operation: Operation::SetAmount(7_700),
        };
        let result = engine
            .apply(&mut grid, &CellStateController::new(), &ledger, &request)
            .await;
        assert!(matches!(
            result,
            Err(MutationError::PartialFailure { applied: 2, total: 4, .. })
        ));
        assert_eq!(grid.budgeted(&CellKey::new("food", m("2025-02"))), Some(7_700));
        assert_eq!(grid.budgeted(&CellKey::new("food", m("2025-03"))), Some(40_000));
        Ok(())
    }

    #[test]
    fn stale_ticket_is_rejected() -> anyhow::Result<()> {
        let mut grid = grid();
        let mut engine = BulkMutationEngine::new();
        let request = MutationRequest {
            categories: CategoryScope::All,
            months: vec![m("2025-01")],
            operation: Operation::SetAmount(1),
        };
        let batch = engine.begin_apply(&grid, &CellStateController::new(), &request)?;
        assert_eq!(
            engine.begin_apply(&grid, &CellStateController::new(), &request),
            Err(MutationError::Busy)
        );
        assert_eq!(
            engine.complete_apply(&mut grid, batch.ticket + 7, Ok(3)),
            Err(MutationError::StaleTicket)
        );
        assert!(engine.complete_apply(&mut grid, batch.ticket, Ok(3)).is_ok());
        Ok(())
    }
}
