use std::{collections::VecDeque, sync::Arc};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::{
    error::{BatchError, PersistenceError},
    models::{BudgetCell, Category, CellKey, CellUpdate, Transaction},
    month::Month,
};

use super::{LedgerDocument, LedgerSnapshot, LedgerStore};

/// Scripted failure consumed by the next matching call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The next call of any kind fails without side effects.
    FailNext(String),
    /// The next batch commits this many cells, then fails.
    StopBatchAfter {
        /// Cells committed before the failure.
        cells: usize,
        /// Reported cause.
        message: String,
    },
}

/// Thread-safe store kept entirely in memory.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    document: LedgerDocument,
    faults: VecDeque<Fault>,
    writes: usize,
}

impl InMemoryLedger {
    /// Empty ledger with the given category rows.
    pub fn new(categories: Vec<Category>) -> Self {
        Self::from_document(LedgerDocument::new(categories))
    }

    /// Ledger seeded from an existing document.
    pub fn from_document(document: LedgerDocument) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                document,
                ..Inner::default()
            })),
        }
    }

    /// Queue a failure for an upcoming call.
    pub fn inject(&self, fault: Fault) {
        self.inner.write().faults.push_back(fault);
    }

    /// Number of write calls received so far, failed ones included.
    pub fn write_count(&self) -> usize {
        self.inner.read().writes
    }

    /// Copy of the current contents.
    pub fn document(&self) -> LedgerDocument {
        self.inner.read().document.clone()
    }

    fn take_failure(inner: &mut Inner) -> Option<PersistenceError> {
        if let Some(Fault::FailNext(message)) = inner.faults.front() {
            let error = PersistenceError::new(message.clone());
            inner.faults.pop_front();
            warn!(error = %error, "injected ledger failure");
            return Some(error);
        }
        None
    }
}

impl LedgerStore for InMemoryLedger {
    async fn categories(&self) -> Result<Vec<Category>, PersistenceError> {
        let mut inner = self.inner.write();
        if let Some(error) = Self::take_failure(&mut inner) {
            return Err(error);
        }
        Ok(inner.document.categories().to_vec())
    }

    async fn load_range(&self, months: &[Month]) -> Result<LedgerSnapshot, PersistenceError> {
        let mut inner = self.inner.write();
        if let Some(error) = Self::take_failure(&mut inner) {
            return Err(error);
        }
        Ok(inner.document.snapshot(months))
    }

    async fn get_cell(&self, key: &CellKey) -> Result<BudgetCell, PersistenceError> {
        let mut inner = self.inner.write();
        if let Some(error) = Self::take_failure(&mut inner) {
            return Err(error);
        }
        Ok(inner.document.cell(key))
    }

    async fn save_cell(&self, key: &CellKey, budgeted_cents: i64) -> Result<(), PersistenceError> {
        let mut inner = self.inner.write();
        inner.writes += 1;
        if let Some(error) = Self::take_failure(&mut inner) {
            return Err(error);
        }
        let update = CellUpdate {
            key: key.clone(),
            budgeted_cents,
        };
        inner.document.validate(&update)?;
        inner.document.set_budget(&update);
        debug!(cell = %key, cents = budgeted_cents, "cell stored");
        Ok(())
    }

    async fn save_batch(&self, updates: &[CellUpdate]) -> Result<usize, BatchError> {
        let mut inner = self.inner.write();
        inner.writes += 1;
        if let Some(error) = Self::take_failure(&mut inner) {
            return Err(BatchError::Rejected(error));
        }
        for update in updates {
            inner.document.validate(update)?;
        }

        if let Some(Fault::StopBatchAfter { cells, message }) = inner.faults.front().cloned() {
            inner.faults.pop_front();
            let committed = cells.min(updates.len());
            let mut applied = Vec::with_capacity(committed);
            for update in &updates[..committed] {
                inner.document.set_budget(update);
                applied.push(update.key.clone());
            }
            warn!(applied = committed, total = updates.len(), "injected partial batch");
            return Err(BatchError::Partial {
                applied,
                source: PersistenceError::new(message),
            });
        }

        for update in updates {
            inner.document.set_budget(update);
        }
        debug!(count = updates.len(), "batch stored");
        Ok(updates.len())
    }

    async fn get_transactions(&self, key: &CellKey) -> Result<Vec<Transaction>, PersistenceError> {
        let mut inner = self.inner.write();
        if let Some(error) = Self::take_failure(&mut inner) {
            return Err(error);
        }
        Ok(inner.document.transactions_for(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryKind;

    fn m(s: &str) -> Month {
        s.parse().expect("valid month")
    }

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(vec![
            Category::new("rent", "Rent", CategoryKind::Expense),
            Category::new("food", "Food", CategoryKind::Expense),
        ])
    }

    fn update(category: &str, month: &str, cents: i64) -> CellUpdate {
        CellUpdate {
            key: CellKey::new(category, m(month)),
            budgeted_cents: cents,
        }
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing_on_invalid_input() {
        let ledger = ledger();
        let updates = [update("rent", "2025-01", 100), update("ghost", "2025-01", 100)];
        let result = ledger.save_batch(&updates).await;
        assert!(matches!(result, Err(BatchError::Rejected(_))));
        let cell = ledger
            .get_cell(&CellKey::new("rent", m("2025-01")))
            .await
            .expect("readable");
        assert_eq!(cell.budgeted_cents, 0);
    }

    #[tokio::test]
    async fn fail_next_is_consumed_once() {
        let ledger = ledger();
        let key = CellKey::new("rent", m("2025-01"));
        ledger.inject(Fault::FailNext("offline".to_string()));
        assert!(ledger.save_cell(&key, 500).await.is_err());
        assert!(ledger.save_cell(&key, 500).await.is_ok());
        assert_eq!(ledger.write_count(), 2);
        assert_eq!(ledger.get_cell(&key).await.map(|c| c.budgeted_cents), Ok(500));
    }

    #[tokio::test]
    async fn partial_batch_reports_committed_cells() {
        let ledger = ledger();
        ledger.inject(Fault::StopBatchAfter {
            cells: 1,
            message: "connection reset".to_string(),
        });
        let updates = [update("rent", "2025-01", 100), update("food", "2025-01", 200)];
        let Err(BatchError::Partial { applied, .. }) = ledger.save_batch(&updates).await else {
            panic!("expected partial failure");
        };
        assert_eq!(applied, vec![CellKey::new("rent", m("2025-01"))]);
        let food = ledger
            .get_cell(&CellKey::new("food", m("2025-01")))
            .await
            .expect("readable");
        assert_eq!(food.budgeted_cents, 0);
    }
}
