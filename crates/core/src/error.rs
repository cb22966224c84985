//! Error types shared across the grid components.

use thiserror::Error;

use crate::models::CellKey;

/// Rejection produced while parsing user-entered currency text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The amount parsed but is below zero.
    #[error("Budget cannot be negative")]
    Negative,
    /// The text is not a plain decimal amount after stripping symbols.
    #[error("Please enter a valid number")]
    NotANumber,
    /// The amount exceeds [`crate::money::MAX_CENTS`].
    #[error("Amount is too large")]
    TooLarge,
}

/// Rejection produced while resolving a month range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    /// The range spans more months than a custom selection may cover.
    #[error("range covers {months} months; at most {max} are allowed")]
    ExceedsMaxMonths {
        /// Months covered by the rejected range.
        months: usize,
        /// Upper bound that was exceeded.
        max: usize,
    },
    /// The end month lies before the start month.
    #[error("range end is before its start")]
    Inverted,
}

/// Failure reported by the ledger store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ledger store failed: {message}")]
pub struct PersistenceError {
    /// Human readable cause forwarded from the store.
    pub message: String,
}

impl PersistenceError {
    /// Build an error from any displayable cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for PersistenceError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

/// Outcome of a batch write that did not fully succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// Nothing was written.
    #[error(transparent)]
    Rejected(#[from] PersistenceError),
    /// Some cells were written before the store failed.
    #[error("batch stopped after {} cells: {source}", applied.len())]
    Partial {
        /// Cells that were committed before the failure.
        applied: Vec<CellKey>,
        /// Underlying store failure.
        source: PersistenceError,
    },
}

/// Reasons a cell interaction request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    /// The addressed cell is not part of the loaded grid.
    #[error("cell {0} is not loaded")]
    UnknownCell(CellKey),
    /// A previous commit has not resolved yet.
    #[error("a save is still in progress")]
    CommitPending,
    /// Another cell already has an open editor.
    #[error("cell {0} is already being edited")]
    AlreadyEditing(CellKey),
    /// The request needs an active edit session.
    #[error("no cell is being edited")]
    NotEditing,
    /// The draft failed validation; the session stays open.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Reasons a bulk mutation was refused or failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    /// Scope resolves to zero cells.
    #[error("no cells are affected")]
    EmptyScope,
    /// The operation value failed validation.
    #[error(transparent)]
    InvalidValue(#[from] ValidationError),
    /// The month range could not be resolved.
    #[error(transparent)]
    Range(#[from] RangeError),
    /// A single-cell edit is open on a cell inside the scope.
    #[error("cell {0} is being edited")]
    EditInProgress(CellKey),
    /// Another apply is still running.
    #[error("an adjustment is already being applied")]
    Busy,
    /// The ticket does not match the in-flight apply.
    #[error("unknown or stale apply ticket")]
    StaleTicket,
    /// The store rejected the whole batch.
    #[error(transparent)]
    Persistence(PersistenceError),
    /// The store committed only part of the batch.
    #[error("only {applied} of {total} cells were saved: {source}")]
    PartialFailure {
        /// Number of cells committed before the failure.
        applied: usize,
        /// Number of cells in the approved preview.
        total: usize,
        /// Underlying store failure.
        source: PersistenceError,
    },
}
