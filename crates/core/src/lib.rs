#![warn(clippy::all, missing_docs)]

//! Core logic of the budget grid.
//!
//! This crate hosts the cell editing state machine, grid navigation,
//! validation and status classification, bulk mutations with their
//! previews, and the ledger stores the terminal UI persists through.

pub mod bulk;
pub mod cell;
pub mod config;
pub mod detail;
pub mod error;
pub mod grid;
pub mod ledger;
pub mod menu;
pub mod modal;
pub mod models;
pub mod money;
pub mod month;
pub mod navigation;
pub mod range;
pub mod schedule;
pub mod shortcuts;
pub mod status;
pub mod tooltip;
pub mod totals;
pub mod view;

pub use config::AppConfig;
pub use error::{BatchError, CellError, MutationError, PersistenceError, RangeError, ValidationError};
pub use grid::BudgetGrid;
pub use ledger::{InMemoryLedger, JsonLedger, LedgerDocument, LedgerSnapshot, LedgerStore};
pub use models::{BudgetCell, Category, CategoryId, CategoryKind, CellKey, CellUpdate, Transaction};
pub use month::Month;
pub use view::{BudgetView, Effect, InteractionMode, ViewSettings};
