//! Per-cell interaction state and the single-cell save pipeline.
//!
//! The controller owns at most one [`EditSession`] and at most one expanded
//! cell for the whole grid, so both exclusivity rules hold by construction.
//! Persistence is split in two halves: [`CellStateController::commit`]
//! validates synchronously and hands back a [`CellCommit`] to send to the
//! ledger, and [`CellStateController::resolve`] applies the store's answer.

use tracing::{info, warn};

use crate::{
    error::{CellError, PersistenceError, ValidationError},
    grid::{BudgetGrid, Direction},
    ledger::LedgerStore,
    models::CellKey,
    money::{format_cents, parse_cents},
    status::StatusResult,
};

/// What a single cell currently shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellState<'a> {
    /// Plain display.
    Idle,
    /// Inline editor open.
    Editing(&'a EditSession),
    /// Transaction detail open.
    Expanded,
}

impl CellState<'_> {
    /// Whether the cell has an open editor.
    pub fn is_editing(&self) -> bool {
        matches!(self, CellState::Editing(_))
    }

    /// Whether the editor shows a validation error.
    pub fn has_error(&self) -> bool {
        matches!(self, CellState::Editing(session) if session.error.is_some())
    }
}

/// The inline editor of the one cell being edited.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    target: CellKey,
    draft: String,
    seed: String,
    committed_cents: i64,
    select_all: bool,
    error: Option<ValidationError>,
    persist_error: Option<PersistenceError>,
    pending: Option<u64>,
}

impl EditSession {
    fn new(target: CellKey, committed_cents: i64) -> Self {
        let seed = format_cents(committed_cents);
        Self {
            target,
            draft: seed.clone(),
            seed,
            committed_cents,
            select_all: true,
            error: None,
            persist_error: None,
            pending: None,
        }
    }

    /// Cell being edited.
    pub fn target(&self) -> &CellKey {
        &self.target
    }

    /// Raw text typed so far.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Last known-good value, restored on cancel.
    pub fn committed_cents(&self) -> i64 {
        self.committed_cents
    }

    /// Whether the draft is still fully selected (next keystroke replaces it).
    pub fn is_selected(&self) -> bool {
        self.select_all
    }

    /// Inline validation error.
    pub fn error(&self) -> Option<ValidationError> {
        self.error
    }

    /// Message to show under the editor, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.map(|err| err.to_string())
    }

    /// Non-blocking indicator left by a failed save.
    pub fn persist_error(&self) -> Option<&PersistenceError> {
        self.persist_error.as_ref()
    }

    /// Whether a save for this session is in flight.
    pub fn is_saving(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the draft differs from what the editor was seeded with.
    pub fn is_dirty(&self) -> bool {
        self.draft != self.seed
    }
}

/// Input that asks the editor to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitTrigger {
    /// Enter key.
    Enter,
    /// Focus left the editor.
    Blur,
    /// Tab or Shift+Tab.
    Tab(Direction),
}

/// A validated value waiting to be written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellCommit {
    /// Correlates the store answer with this request.
    pub ticket: u64,
    /// Target cell.
    pub key: CellKey,
    /// Value to persist.
    pub budgeted_cents: i64,
}

/// Result of asking the editor to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStep {
    /// Nothing to persist; the editor closed.
    Closed(CellKey),
    /// Persist this value, then call [`CellStateController::resolve`].
    Dispatched(CellCommit),
}

/// Result of applying the store's answer to a dispatched commit.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Value stored; grid updated and status recomputed.
    Saved {
        /// Cell that changed.
        key: CellKey,
        /// Fresh classification.
        status: Option<StatusResult>,
    },
    /// Store failed; the editor (if still open) keeps its draft.
    Failed {
        /// Cell whose save failed.
        key: CellKey,
        /// Store error.
        error: PersistenceError,
        /// Whether the editor is still open for a retry.
        retained: bool,
    },
    /// The answer does not belong to the in-flight commit.
    Stale,
}

#[derive(Debug, Clone)]
struct InFlight {
    ticket: u64,
    key: CellKey,
    budgeted_cents: i64,
}

/// Owner of the edit session, the expansion and the in-flight save.
#[derive(Debug, Default)]
pub struct CellStateController {
    session: Option<EditSession>,
    expanded: Option<CellKey>,
    in_flight: Option<InFlight>,
    last_error: Option<PersistenceError>,
    next_ticket: u64,
}

impl CellStateController {
    /// Controller with everything idle.
    pub fn new() -> Self {
        Self::default()
    }

    /// State of one cell.
    pub fn state(&self, key: &CellKey) -> CellState<'_> {
        match &self.session {
            Some(session) if &session.target == key => CellState::Editing(session),
            _ if self.expanded.as_ref() == Some(key) => CellState::Expanded,
            _ => CellState::Idle,
        }
    }

    /// Open edit session, if any.
    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    /// Cell currently being edited.
    pub fn editing(&self) -> Option<&CellKey> {
        self.session.as_ref().map(|session| &session.target)
    }

    /// Expanded cell, if any.
    pub fn expanded(&self) -> Option<&CellKey> {
        self.expanded.as_ref()
    }

    /// Whether a single-cell save is in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Cell whose save is in flight.
    pub fn in_flight_key(&self) -> Option<&CellKey> {
        self.in_flight.as_ref().map(|flight| &flight.key)
    }

    /// Save failure that outlived its editor (Escape during a save).
    pub fn last_error(&self) -> Option<&PersistenceError> {
        self.last_error.as_ref()
    }

    /// Dismiss the detached save failure.
    pub fn clear_last_error(&mut self) {
        self.last_error = None;
    }

    /// Keyboard reachability: `-1` while the cell is being edited.
    pub fn tab_index(&self, key: &CellKey) -> i32 {
        if self.editing() == Some(key) {
            -1
        } else {
            0
        }
    }

    /// Open the editor on `key`, seeded from its committed budget.
    pub fn begin_edit(&mut self, grid: &BudgetGrid, key: &CellKey) -> Result<(), CellError> {
        if self.in_flight.is_some() {
            return Err(CellError::CommitPending);
        }
        if let Some(current) = self.editing() {
            if current == key {
                return Ok(());
            }
            return Err(CellError::AlreadyEditing(current.clone()));
        }
        let committed = grid
            .budgeted(key)
            .ok_or_else(|| CellError::UnknownCell(key.clone()))?;
        if self.expanded.as_ref() == Some(key) {
            self.expanded = None;
        }
        self.session = Some(EditSession::new(key.clone(), committed));
        info!(category = %key.category, month = %key.month, cents = committed, "edit started");
        Ok(())
    }

    /// Type one character into the editor.
    pub fn insert_char(&mut self, ch: char) {
        if ch.is_control() {
            return;
        }
        self.edit_draft(|draft, select_all| {
            if select_all {
                draft.clear();
            }
            draft.push(ch);
        });
    }

    /// Delete the last character (or the whole selection).
    pub fn backspace(&mut self) {
        self.edit_draft(|draft, select_all| {
            if select_all {
                draft.clear();
            } else {
                draft.pop();
            }
        });
    }

    /// Replace the draft text wholesale.
    pub fn set_draft(&mut self, text: &str) {
        self.edit_draft(|draft, _| {
            draft.clear();
            draft.push_str(text);
        });
    }

    fn edit_draft(&mut self, apply: impl FnOnce(&mut String, bool)) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.pending.is_some() {
            return;
        }
        apply(&mut session.draft, session.select_all);
        session.select_all = false;
        session.persist_error = None;
        if session.error.is_some() {
            session.error = parse_cents(&session.draft).err();
        }
    }

    /// Discard the draft and close the editor without persisting.
    ///
    /// A save already dispatched keeps running; its answer still updates the
    /// grid.
    pub fn cancel(&mut self) -> Option<CellKey> {
        let session = self.session.take()?;
        info!(
            category = %session.target.category,
            month = %session.target.month,
            restored = session.committed_cents,
            "edit cancelled"
        );
        Some(session.target)
    }

    /// Validate the draft and decide whether anything must be persisted.
    pub fn commit(&mut self, trigger: CommitTrigger) -> Result<CommitStep, CellError> {
        if self.in_flight.is_some() {
            return Err(CellError::CommitPending);
        }
        let session = self.session.as_mut().ok_or(CellError::NotEditing)?;

        if trigger == CommitTrigger::Blur && !session.is_dirty() {
            let target = session.target.clone();
            self.session = None;
            return Ok(CommitStep::Closed(target));
        }

        let cents = match parse_cents(&session.draft) {
            Ok(cents) => cents,
            Err(err) => {
                warn!(cell = %session.target, draft = %session.draft, error = %err, "draft rejected");
                session.error = Some(err);
                return Err(CellError::Invalid(err));
            }
        };
        session.error = None;

        if cents == session.committed_cents {
            let target = session.target.clone();
            self.session = None;
            return Ok(CommitStep::Closed(target));
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        session.pending = Some(ticket);
        session.persist_error = None;
        let commit = CellCommit {
            ticket,
            key: session.target.clone(),
            budgeted_cents: cents,
        };
        self.in_flight = Some(InFlight {
            ticket,
            key: commit.key.clone(),
            budgeted_cents: cents,
        });
        info!(cell = %commit.key, cents, ?trigger, "commit dispatched");
        Ok(CommitStep::Dispatched(commit))
    }

    /// Apply the ledger's answer for a dispatched commit.
    pub fn resolve(
        &mut self,
        grid: &mut BudgetGrid,
        ticket: u64,
        result: Result<(), PersistenceError>,
    ) -> CommitOutcome {
        if self.in_flight.as_ref().map(|flight| flight.ticket) != Some(ticket) {
            return CommitOutcome::Stale;
        }
        let Some(flight) = self.in_flight.take() else {
            return CommitOutcome::Stale;
        };

        let session_open = self
            .session
            .as_ref()
            .map(|session| session.pending == Some(ticket))
            .unwrap_or(false);

        match result {
            Ok(()) => {
                grid.set_budget(&flight.key, flight.budgeted_cents);
                if session_open {
                    self.session = None;
                }
                info!(cell = %flight.key, cents = flight.budgeted_cents, "commit saved");
                CommitOutcome::Saved {
                    status: grid.status(&flight.key),
                    key: flight.key,
                }
            }
            Err(error) => {
                warn!(cell = %flight.key, error = %error, "commit failed");
                if let Some(session) = self.session.as_mut().filter(|_| session_open) {
                    session.pending = None;
                    session.persist_error = Some(error.clone());
                } else {
                    self.last_error = Some(error.clone());
                }
                CommitOutcome::Failed {
                    key: flight.key,
                    error,
                    retained: session_open,
                }
            }
        }
    }

    /// Commit and wait for the ledger in one call.
    pub async fn commit_with<L: LedgerStore>(
        &mut self,
        grid: &mut BudgetGrid,
        ledger: &L,
        trigger: CommitTrigger,
    ) -> Result<CommitOutcome, CellError> {
        match self.commit(trigger)? {
            CommitStep::Closed(key) => Ok(CommitOutcome::Saved {
                status: grid.status(&key),
                key,
            }),
            CommitStep::Dispatched(commit) => {
                let result = ledger.save_cell(&commit.key, commit.budgeted_cents).await;
                Ok(self.resolve(grid, commit.ticket, result))
            }
        }
    }

    /// Click on a cell that is not being edited: open or close its detail.
    ///
    /// Returns `true` when the cell ends up expanded.
    pub fn toggle_expansion(&mut self, key: &CellKey) -> bool {
        if self.editing() == Some(key) {
            return false;
        }
        if self.expanded.as_ref() == Some(key) {
            self.expanded = None;
            false
        } else {
            self.expanded = Some(key.clone());
            true
        }
    }

    /// Close the expanded cell, returning it.
    pub fn close_expansion(&mut self) -> Option<CellKey> {
        self.expanded.take()
    }
}
