//! Ledger persistence behind the grid.

/// Serialized ledger contents shared by the store implementations.
pub mod document;
/// File-backed store.
pub mod json;
/// In-process store with failure injection.
pub mod memory;

use std::future::Future;

use crate::{
    error::{BatchError, PersistenceError},
    grid::BudgetGrid,
    models::{BudgetCell, Category, CellKey, CellUpdate, Transaction},
    month::Month,
};

pub use document::LedgerDocument;
pub use json::JsonLedger;
pub use memory::{Fault, InMemoryLedger};

/// Categories and cell values for a month window.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSnapshot {
    /// Category rows in display order.
    pub categories: Vec<Category>,
    /// Requested months.
    pub months: Vec<Month>,
    /// Values for every category × month pair.
    pub cells: Vec<(CellKey, BudgetCell)>,
}

impl LedgerSnapshot {
    /// Materialize the snapshot as a grid.
    pub fn into_grid(self) -> BudgetGrid {
        BudgetGrid::with_cells(self.categories, self.months, self.cells)
    }
}

/// Asynchronous storage of budget values and transactions.
///
/// `save_batch` is all-or-nothing: an implementation either stores every
/// update and returns the count, or reports which cells it managed to commit
/// via [`BatchError::Partial`].
pub trait LedgerStore: Send + Sync {
    /// Category rows in display order.
    fn categories(&self) -> impl Future<Output = Result<Vec<Category>, PersistenceError>> + Send;

    /// Load categories and values for the given months.
    fn load_range(
        &self,
        months: &[Month],
    ) -> impl Future<Output = Result<LedgerSnapshot, PersistenceError>> + Send;

    /// Read one cell.
    fn get_cell(
        &self,
        key: &CellKey,
    ) -> impl Future<Output = Result<BudgetCell, PersistenceError>> + Send;

    /// Write one budget value.
    fn save_cell(
        &self,
        key: &CellKey,
        budgeted_cents: i64,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Write several budget values as one unit.
    fn save_batch(
        &self,
        updates: &[CellUpdate],
    ) -> impl Future<Output = Result<usize, BatchError>> + Send;

    /// Transactions filed under a cell, newest first.
    fn get_transactions(
        &self,
        key: &CellKey,
    ) -> impl Future<Output = Result<Vec<Transaction>, PersistenceError>> + Send;
}
