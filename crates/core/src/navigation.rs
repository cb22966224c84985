//! Grid-wide focus and the save-then-move Tab protocol.

use tracing::{debug, info};

use crate::{
    cell::{CellCommit, CellStateController, CommitOutcome, CommitStep, CommitTrigger},
    error::{CellError, PersistenceError},
    grid::{BudgetGrid, Direction},
    models::CellKey,
};

/// Where Tab or Shift+Tab took the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabOutcome {
    /// No edit was open; focus followed reading order (`None` left the grid).
    Deferred(Option<CellKey>),
    /// Editing continued on this cell.
    Editing(CellKey),
    /// The row ended; the session closed and focus left the grid.
    LeftGrid,
    /// The value must be saved first; the move happens on resolution.
    Saving(CellCommit),
}

/// A commit answer together with the move it unblocked.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// What happened to the saved cell.
    pub outcome: CommitOutcome,
    /// The deferred Tab move, when one was waiting and the save succeeded.
    pub moved: Option<TabOutcome>,
}

/// Arrow-key travel of the focus cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrow {
    /// Previous category row.
    Up,
    /// Next category row.
    Down,
    /// Earlier month.
    Left,
    /// Later month.
    Right,
}

/// Owns the focused cell and sequences edits across cells.
#[derive(Debug, Default)]
pub struct GridNavigationCoordinator {
    cells: CellStateController,
    cursor: Option<CellKey>,
    pending_move: Option<(u64, Direction)>,
}

impl GridNavigationCoordinator {
    /// Coordinator with nothing focused.
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-cell state.
    pub fn cells(&self) -> &CellStateController {
        &self.cells
    }

    /// Mutable per-cell state, for typing into the editor.
    pub fn cells_mut(&mut self) -> &mut CellStateController {
        &mut self.cells
    }

    /// Focused cell.
    pub fn cursor(&self) -> Option<&CellKey> {
        self.cursor.as_ref()
    }

    /// Move focus without touching any edit.
    pub fn focus(&mut self, key: Option<CellKey>) {
        self.cursor = key;
    }

    /// Arrow keys move focus while nothing is being edited.
    pub fn move_cursor(&mut self, grid: &BudgetGrid, arrow: Arrow) -> Option<&CellKey> {
        if self.cells.editing().is_some() {
            return self.cursor.as_ref();
        }
        let next = match &self.cursor {
            None => grid.first_cell(),
            Some(current) => match arrow {
                Arrow::Up => grid.neighbor_in_column(current, Direction::Backward),
                Arrow::Down => grid.neighbor_in_column(current, Direction::Forward),
                Arrow::Left => grid.neighbor_in_row(current, Direction::Backward),
                Arrow::Right => grid.neighbor_in_row(current, Direction::Forward),
            },
        };
        if let Some(next) = next {
            self.cursor = Some(next);
        }
        self.cursor.as_ref()
    }

    /// Enter on the focused cell opens its editor.
    pub fn enter(&mut self, grid: &BudgetGrid) -> Result<CellKey, CellError> {
        let key = self.cursor.clone().ok_or(CellError::NotEditing)?;
        self.cells.begin_edit(grid, &key)?;
        Ok(key)
    }

    /// Double-click: leave any other editor, focus `key` and edit it.
    pub fn double_click(
        &mut self,
        grid: &BudgetGrid,
        key: &CellKey,
    ) -> Result<Option<CellCommit>, CellError> {
        let commit = self.blur_other(key)?;
        if self.cells.is_busy() {
            return Err(CellError::CommitPending);
        }
        self.cursor = Some(key.clone());
        self.cells.begin_edit(grid, key)?;
        Ok(commit)
    }

    /// Single click: leave any other editor, focus `key` and toggle its detail.
    ///
    /// Returns the commit to persist (if leaving an editor dispatched one) and
    /// whether the cell ends up expanded.
    pub fn click(&mut self, key: &CellKey) -> Result<(Option<CellCommit>, bool), CellError> {
        let commit = self.blur_other(key)?;
        self.cursor = Some(key.clone());
        let expanded = self.cells.toggle_expansion(key);
        Ok((commit, expanded))
    }

    /// Space on the focused cell toggles its detail, never its editor.
    pub fn space(&mut self) -> Option<bool> {
        let key = self.cursor.clone()?;
        if self.cells.editing() == Some(&key) {
            return None;
        }
        Some(self.cells.toggle_expansion(&key))
    }

    /// Enter while editing.
    pub fn commit(&mut self) -> Result<CommitStep, CellError> {
        self.cells.commit(CommitTrigger::Enter)
    }

    /// Focus left the editor.
    pub fn blur(&mut self) -> Result<CommitStep, CellError> {
        self.cells.commit(CommitTrigger::Blur)
    }

    /// Escape while editing.
    pub fn cancel(&mut self) -> Option<CellKey> {
        self.pending_move = None;
        self.cells.cancel()
    }

    fn blur_other(&mut self, key: &CellKey) -> Result<Option<CellCommit>, CellError> {
        match self.cells.editing() {
            Some(current) if current != key => match self.blur()? {
                CommitStep::Closed(_) => Ok(None),
                CommitStep::Dispatched(commit) => Ok(Some(commit)),
            },
            _ => Ok(None),
        }
    }

    /// Tab (forward) or Shift+Tab (backward).
    pub fn tab(&mut self, grid: &BudgetGrid, direction: Direction) -> Result<TabOutcome, CellError> {
        let Some(origin) = self.cells.editing().cloned() else {
            let next = match &self.cursor {
                Some(current) => grid.neighbor_in_document(current, direction),
                None if direction == Direction::Forward => grid.first_cell(),
                None => None,
            };
            debug!(to = ?next, "tab deferred to reading order");
            self.cursor = next.clone();
            return Ok(TabOutcome::Deferred(next));
        };

        match self.cells.commit(CommitTrigger::Tab(direction))? {
            CommitStep::Closed(_) => self.continue_in_row(grid, &origin, direction),
            CommitStep::Dispatched(commit) => {
                self.pending_move = Some((commit.ticket, direction));
                Ok(TabOutcome::Saving(commit))
            }
        }
    }

    /// Apply a store answer, then perform any Tab move that was waiting on it.
    pub fn resolve(
        &mut self,
        grid: &mut BudgetGrid,
        ticket: u64,
        result: Result<(), PersistenceError>,
    ) -> Resolved {
        let outcome = self.cells.resolve(grid, ticket, result);
        let waiting = match self.pending_move {
            Some((pending, direction)) if pending == ticket => {
                self.pending_move = None;
                Some(direction)
            }
            _ => None,
        };

        let moved = match (&outcome, waiting) {
            (CommitOutcome::Saved { key, .. }, Some(direction)) => {
                let origin = key.clone();
                self.continue_in_row(grid, &origin, direction).ok()
            }
            _ => None,
        };
        Resolved { outcome, moved }
    }

    fn continue_in_row(
        &mut self,
        grid: &BudgetGrid,
        origin: &CellKey,
        direction: Direction,
    ) -> Result<TabOutcome, CellError> {
        match grid.neighbor_in_row(origin, direction) {
            Some(next) => {
                self.cells.begin_edit(grid, &next)?;
                self.cursor = Some(next.clone());
                info!(from = %origin, to = %next, "edit moved along row");
                Ok(TabOutcome::Editing(next))
            }
            None => {
                self.cursor = None;
                debug!(from = %origin, "row ended, focus left grid");
                Ok(TabOutcome::LeftGrid)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cell::CellState,
        error::ValidationError,
        models::{Category, CategoryKind},
        month::Month,
    };

    fn m(s: &str) -> Month {
        s.parse().expect("valid month")
    }

    fn grid() -> BudgetGrid {
        BudgetGrid::new(
            vec![
                Category::new("rent", "Rent", CategoryKind::Expense),
                Category::new("food", "Food", CategoryKind::Expense),
            ],
            vec![m("2025-01"), m("2025-02"), m("2025-03")],
        )
    }

    fn key(category: &str, month: &str) -> CellKey {
        CellKey::new(category, m(month))
    }

    fn editing_count(nav: &GridNavigationCoordinator, grid: &BudgetGrid) -> usize {
        grid.categories()
            .iter()
            .flat_map(|c| grid.months().iter().map(move |mo| CellKey::new(c.id.clone(), *mo)))
            .filter(|k| nav.cells().state(k).is_editing())
            .count()
    }

    #[test]
    fn tab_without_change_moves_edit_to_next_month() -> anyhow::Result<()> {
        let grid = grid();
        let mut nav = GridNavigationCoordinator::new();
        nav.double_click(&grid, &key("rent", "2025-01"))?;
        let outcome = nav.tab(&grid, Direction::Forward)?;
        assert_eq!(outcome, TabOutcome::Editing(key("rent", "2025-02")));
        assert_eq!(nav.cursor(), Some(&key("rent", "2025-02")));
        assert_eq!(editing_count(&nav, &grid), 1);
        Ok(())
    }

    #[test]
    fn tab_saves_then_moves() -> anyhow::Result<()> {
        let mut grid = grid();
        let mut nav = GridNavigationCoordinator::new();
        nav.double_click(&grid, &key("rent", "2025-02"))?;
        nav.cells_mut().set_draft("950");
        let TabOutcome::Saving(commit) = nav.tab(&grid, Direction::Backward)? else {
            panic!("expected save before move");
        };
        let resolved = nav.resolve(&mut grid, commit.ticket, Ok(()));
        assert_eq!(resolved.moved, Some(TabOutcome::Editing(key("rent", "2025-01"))));
        assert_eq!(grid.budgeted(&key("rent", "2025-02")), Some(95_000));
        assert_eq!(editing_count(&nav, &grid), 1);
        Ok(())
    }

    #[test]
    fn invalid_draft_blocks_tab_and_keeps_cursor() -> anyhow::Result<()> {
        let grid = grid();
        let mut nav = GridNavigationCoordinator::new();
        let origin = key("rent", "2025-01");
        nav.double_click(&grid, &origin)?;
        nav.cells_mut().set_draft("abc");
        assert_eq!(
            nav.tab(&grid, Direction::Forward),
            Err(CellError::Invalid(ValidationError::NotANumber))
        );
        assert_eq!(nav.cursor(), Some(&origin));
        let state = nav.cells().state(&origin);
        assert!(state.is_editing());
        assert!(state.has_error());
        Ok(())
    }

    #[test]
    fn end_of_row_closes_the_session() -> anyhow::Result<()> {
        let grid = grid();
        let mut nav = GridNavigationCoordinator::new();
        nav.double_click(&grid, &key("rent", "2025-03"))?;
        assert_eq!(nav.tab(&grid, Direction::Forward)?, TabOutcome::LeftGrid);
        assert_eq!(editing_count(&nav, &grid), 0);
        assert_eq!(nav.cursor(), None);
        Ok(())
    }

    #[test]
    fn tab_without_edit_follows_reading_order() -> anyhow::Result<()> {
        let grid = grid();
        let mut nav = GridNavigationCoordinator::new();
        nav.focus(Some(key("rent", "2025-03")));
        assert_eq!(
            nav.tab(&grid, Direction::Forward)?,
            TabOutcome::Deferred(Some(key("food", "2025-01")))
        );
        assert_eq!(editing_count(&nav, &grid), 0);
        Ok(())
    }

    #[test]
    fn failed_save_keeps_editing_without_moving() -> anyhow::Result<()> {
        let mut grid = grid();
        let mut nav = GridNavigationCoordinator::new();
        let origin = key("food", "2025-01");
        nav.double_click(&grid, &origin)?;
        nav.cells_mut().set_draft("12");
        let TabOutcome::Saving(commit) = nav.tab(&grid, Direction::Forward)? else {
            panic!("expected save before move");
        };
        let resolved = nav.resolve(
            &mut grid,
            commit.ticket,
            Err(PersistenceError::new("timeout")),
        );
        assert_eq!(resolved.moved, None);
        assert!(matches!(nav.cells().state(&origin), CellState::Editing(s) if s.draft() == "12"));
        assert_eq!(nav.cursor(), Some(&origin));
        Ok(())
    }

    #[test]
    fn escape_during_save_drops_the_pending_move() -> anyhow::Result<()> {
        let mut grid = grid();
        let mut nav = GridNavigationCoordinator::new();
        nav.double_click(&grid, &key("food", "2025-01"))?;
        nav.cells_mut().set_draft("30");
        let TabOutcome::Saving(commit) = nav.tab(&grid, Direction::Forward)? else {
            panic!("expected save before move");
        };
        nav.cancel();
        let resolved = nav.resolve(&mut grid, commit.ticket, Ok(()));
        assert_eq!(resolved.moved, None);
        assert_eq!(editing_count(&nav, &grid), 0);
        assert_eq!(grid.budgeted(&key("food", "2025-01")), Some(3_000));
        Ok(())
    }

    #[test]
    fn clicking_another_cell_blurs_the_editor() -> anyhow::Result<()> {
        let grid = grid();
        let mut nav = GridNavigationCoordinator::new();
        nav.double_click(&grid, &key("rent", "2025-01"))?;
        nav.cells_mut().set_draft("70");
        let (commit, expanded) = nav.click(&key("food", "2025-02"))?;
        assert!(commit.is_some());
        assert!(expanded);
        assert_eq!(nav.cells().expanded(), Some(&key("food", "2025-02")));
        assert_eq!(
            nav.double_click(&grid, &key("food", "2025-03")),
            Err(CellError::CommitPending)
        );
        Ok(())
    }

    #[test]
    fn arrows_stop_at_edges() {
        let grid = grid();
        let mut nav = GridNavigationCoordinator::new();
        assert_eq!(nav.move_cursor(&grid, Arrow::Right), Some(&key("rent", "2025-01")));
        nav.move_cursor(&grid, Arrow::Up);
        assert_eq!(nav.cursor(), Some(&key("rent", "2025-01")));
        nav.move_cursor(&grid, Arrow::Down);
        nav.move_cursor(&grid, Arrow::Right);
        assert_eq!(nav.cursor(), Some(&key("food", "2025-02")));
    }
}
