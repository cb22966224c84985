//! Input dispatcher tying the grid components together.
//!
//! [`BudgetView`] owns every piece of grid state and a single
//! [`InteractionMode`]. Front ends feed it [`Input`]s and run the returned
//! [`Effect`]s against the ledger, then report results back through the
//! `*_resolved`/`*_loaded` methods.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{
    bulk::{BatchApply, BulkMutationEngine, MutationRequest},
    cell::{CellCommit, CommitOutcome, CommitStep},
    detail::ExpansionDetail,
    error::{BatchError, CellError, MutationError, PersistenceError},
    grid::{BudgetGrid, Direction},
    ledger::LedgerSnapshot,
    menu::{ContextMenu, FutureAction, FuturePrompt, MenuAction},
    modal::{BatchModal, ModalFocus},
    models::{CellKey, Transaction},
    month::Month,
    navigation::{Arrow, GridNavigationCoordinator, TabOutcome},
    range::{DateRange, DateRangeStore, RangePreset},
    shortcuts::{self, Input, KeyCode, KeyPress, Pointer, PointerTarget},
    tooltip::{TooltipContent, TooltipController, DEFAULT_DELAY},
    totals::{trailing_months, TotalsTable},
};

/// Presentation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSettings {
    /// Currency symbol used in every amount.
    pub currency_symbol: String,
    /// Preview rows listed before "...and N more".
    pub preview_rows: usize,
    /// Hover time before a tooltip shows.
    pub tooltip_show_delay: Duration,
    /// Grace time before a tooltip hides.
    pub tooltip_hide_delay: Duration,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            currency_symbol: "€".to_string(),
            preview_rows: 5,
            tooltip_show_delay: DEFAULT_DELAY,
            tooltip_hide_delay: DEFAULT_DELAY,
        }
    }
}

/// What currently receives input. Modes other than [`InteractionMode::Grid`]
/// block grid shortcuts.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionMode {
    /// The grid itself.
    Grid,
    /// Cell context menu.
    ContextMenu(ContextMenu),
    /// Future-months prompt opened from the menu.
    FuturePrompt(FuturePrompt),
    /// Batch adjustment form.
    BatchModal(BatchModal),
}

impl InteractionMode {
    /// Whether a popup or modal is open.
    pub fn is_modal(&self) -> bool {
        !matches!(self, InteractionMode::Grid)
    }
}

/// Work the front end must perform for the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Persist one cell, then call [`BudgetView::commit_resolved`].
    SaveCell(CellCommit),
    /// Persist a batch, then call [`BudgetView::batch_resolved`].
    SaveBatch(BatchApply),
    /// Fetch transactions, then call [`BudgetView::transactions_loaded`].
    LoadTransactions(CellKey),
    /// Load these months, then call [`BudgetView::reload`].
    LoadMonths(Vec<Month>),
    /// Keyboard focus moved past the end of the grid.
    LeftGrid,
    /// Leave the application.
    Quit,
}

/// Months to request for `range`: the visible span plus the trailing window
/// of its last month.
pub fn months_to_load(range: &DateRange) -> Vec<Month> {
    let mut months = trailing_months(range.end());
    months.extend(range.months());
    months.sort();
    months.dedup();
    months
}

/// Complete state of the budget grid screen.
#[derive(Debug)]
pub struct BudgetView {
    settings: ViewSettings,
    range: DateRangeStore,
    grid: BudgetGrid,
    totals: TotalsTable,
    nav: GridNavigationCoordinator,
    bulk: BulkMutationEngine,
    mode: InteractionMode,
    tooltip: TooltipController,
    detail: Option<ExpansionDetail>,
    batch_keys: Vec<CellKey>,
    cursor_anchor: (u16, u16),
    status: Option<String>,
}

impl BudgetView {
    /// View over a snapshot loaded with [`months_to_load`].
    pub fn new(settings: ViewSettings, range: DateRangeStore, snapshot: LedgerSnapshot) -> Self {
        let tooltip =
            TooltipController::new(settings.tooltip_show_delay, settings.tooltip_hide_delay);
        let mut view = Self {
            settings,
            range,
            grid: BudgetGrid::default(),
            totals: TotalsTable::default(),
            nav: GridNavigationCoordinator::new(),
            bulk: BulkMutationEngine::new(),
            mode: InteractionMode::Grid,
            tooltip,
            detail: None,
            batch_keys: Vec::new(),
            cursor_anchor: (0, 0),
            status: None,
        };
        view.reload(snapshot);
        view
    }

    /// Replace the grid contents after a range change.
    pub fn reload(&mut self, snapshot: LedgerSnapshot) {
        let end = self.range.range().end();
        self.totals = TotalsTable::from_snapshot(end, &snapshot);
        self.grid = BudgetGrid::with_cells(snapshot.categories, self.range.months(), snapshot.cells);
        let cursor = self
            .nav
            .cursor()
            .filter(|key| self.grid.contains(key))
            .cloned()
            .or_else(|| self.grid.first_cell());
        self.nav.focus(cursor);
        self.nav.cells_mut().close_expansion();
        self.detail = None;
        info!(
            categories = self.grid.categories().len(),
            months = self.grid.months().len(),
            "grid loaded"
        );
    }

    /// Presentation settings.
    pub fn settings(&self) -> &ViewSettings {
        &self.settings
    }

    /// Loaded cells.
    pub fn grid(&self) -> &BudgetGrid {
        &self.grid
    }

    /// Trailing totals.
    pub fn totals(&self) -> &TotalsTable {
        &self.totals
    }

    /// Focus and editing state.
    pub fn navigator(&self) -> &GridNavigationCoordinator {
        &self.nav
    }

    /// Active range.
    pub fn range(&self) -> &DateRangeStore {
        &self.range
    }

    /// What receives input.
    pub fn mode(&self) -> &InteractionMode {
        &self.mode
    }

    /// Expanded cell panel.
    pub fn detail(&self) -> Option<&ExpansionDetail> {
        self.detail.as_ref()
    }

    /// Status line message.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Whether a batch is waiting on the store.
    pub fn is_applying(&self) -> bool {
        self.bulk.is_busy()
    }

    /// Screen position of the focused cell, used to place keyboard-opened menus.
    pub fn set_cursor_anchor(&mut self, anchor: (u16, u16)) {
        self.cursor_anchor = anchor;
    }

    /// Visible tooltip and its figures.
    pub fn tooltip(&self) -> Option<(&CellKey, TooltipContent)> {
        let key = self.tooltip.visible()?;
        let cell = self.grid.cell(key)?;
        let kind = self.grid.kind_of(&key.category);
        Some((
            key,
            TooltipContent::for_cell(cell, kind, &self.settings.currency_symbol),
        ))
    }

    /// Time until the tooltip needs another tick.
    pub fn next_timer(&self) -> Option<Duration> {
        self.tooltip.next_due()
    }

    /// Advance timers; `true` when a redraw is needed.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        self.tooltip.advance(elapsed)
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    /// Route one input.
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        let effects = match input {
            Input::Key(press) => match self.mode {
                InteractionMode::Grid => self.grid_key(press),
                InteractionMode::ContextMenu(_) => self.menu_key(press),
                InteractionMode::FuturePrompt(_) => self.prompt_key(press),
                InteractionMode::BatchModal(_) => self.modal_key(press),
            },
            Input::Pointer(pointer) => self.pointer(pointer),
        };
        self.sync_detail();
        effects
    }

    fn grid_key(&mut self, press: KeyPress) -> Vec<Effect> {
        if self.nav.cells().session().is_some() {
            return self.editor_key(press);
        }
        match shortcuts::matching(&press) {
            Some(shortcuts::ADJUST_BUDGETS) => return self.open_batch_modal(),
            Some(shortcuts::QUIT) => return vec![Effect::Quit],
            Some("range") => return self.cycle_range(),
            Some("cell-menu") => {
                if let Some(target) = self.nav.cursor().cloned() {
                    self.open_menu(target, self.cursor_anchor);
                }
                return Vec::new();
            }
            _ => {}
        }
        match press.code {
            KeyCode::Enter => {
                match self.nav.enter(&self.grid) {
                    Ok(key) => {
                        self.tooltip.dismiss();
                        debug!(cell = %key, "editing via keyboard");
                    }
                    Err(err) => self.set_status(err.to_string()),
                }
                Vec::new()
            }
            KeyCode::Char(' ') => match self.nav.space() {
                Some(true) => self.expand_focused(),
                _ => Vec::new(),
            },
            KeyCode::Tab => {
                let direction = tab_direction(&press);
                match self.nav.tab(&self.grid, direction) {
                    Ok(TabOutcome::Deferred(None)) => vec![Effect::LeftGrid],
                    _ => Vec::new(),
                }
            }
            KeyCode::Up => self.arrow(Arrow::Up),
            KeyCode::Down => self.arrow(Arrow::Down),
            KeyCode::Left => self.arrow(Arrow::Left),
            KeyCode::Right => self.arrow(Arrow::Right),
            KeyCode::Esc => {
                self.nav.cells_mut().close_expansion();
                self.nav.cells_mut().clear_last_error();
                self.status = None;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn editor_key(&mut self, press: KeyPress) -> Vec<Effect> {
        if shortcuts::matching(&press) == Some(shortcuts::ADJUST_BUDGETS) {
            self.set_status("Finish editing before adjusting budgets");
            return Vec::new();
        }
        match press.code {
            KeyCode::Enter => {
                let step = self.nav.commit();
                self.commit_step(step)
            }
            KeyCode::Esc => {
                self.nav.cancel();
                Vec::new()
            }
            KeyCode::Tab => match self.nav.tab(&self.grid, tab_direction(&press)) {
                Ok(TabOutcome::Saving(commit)) => vec![Effect::SaveCell(commit)],
                Ok(TabOutcome::LeftGrid) => vec![Effect::LeftGrid],
                Ok(_) => Vec::new(),
                Err(err) => self.cell_error(err),
            },
            KeyCode::Backspace => {
                self.nav.cells_mut().backspace();
                Vec::new()
            }
            KeyCode::Char(ch) if !press.modifiers.command() => {
                self.nav.cells_mut().insert_char(ch);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn commit_step(&mut self, step: Result<CommitStep, CellError>) -> Vec<Effect> {
        match step {
            Ok(CommitStep::Dispatched(commit)) => vec![Effect::SaveCell(commit)],
            Ok(CommitStep::Closed(_)) => Vec::new(),
            Err(err) => self.cell_error(err),
        }
    }

    fn cell_error(&mut self, err: CellError) -> Vec<Effect> {
        match err {
            // the editor shows validation errors inline
            CellError::Invalid(_) => {}
            other => self.set_status(other.to_string()),
        }
        Vec::new()
    }

    fn arrow(&mut self, arrow: Arrow) -> Vec<Effect> {
        self.nav.move_cursor(&self.grid, arrow);
        Vec::new()
    }

    fn expand_focused(&mut self) -> Vec<Effect> {
        let Some(key) = self.nav.cells().expanded().cloned() else {
            return Vec::new();
        };
        let name = self
            .grid
            .category(&key.category)
            .map(|category| category.name.clone())
            .unwrap_or_else(|| key.category.to_string());
        self.detail = Some(ExpansionDetail::loading(key.clone(), name));
        vec![Effect::LoadTransactions(key)]
    }

    fn sync_detail(&mut self) {
        let expanded = self.nav.cells().expanded();
        if self.detail.as_ref().map(ExpansionDetail::key) != expanded {
            self.detail = None;
        }
    }

    fn open_menu(&mut self, target: CellKey, anchor: (u16, u16)) {
        if self.nav.cells().session().is_some() || !self.grid.contains(&target) {
            return;
        }
        self.tooltip.dismiss();
        self.nav.focus(Some(target.clone()));
        self.mode = InteractionMode::ContextMenu(ContextMenu::new(target, anchor));
    }

    fn open_batch_modal(&mut self) -> Vec<Effect> {
        if self.mode.is_modal() {
            return Vec::new();
        }
        if self.nav.cells().session().is_some() || self.nav.cells().is_busy() {
            self.set_status("Finish editing before adjusting budgets");
            return Vec::new();
        }
        if self.bulk.is_busy() {
            self.set_status(MutationError::Busy.to_string());
            return Vec::new();
        }
        self.tooltip.dismiss();
        self.mode = InteractionMode::BatchModal(BatchModal::open(&self.grid, self.range.today()));
        info!("batch adjustment opened");
        Vec::new()
    }

    fn cycle_range(&mut self) -> Vec<Effect> {
        let presets = RangePreset::NAMED;
        let next = presets
            .iter()
            .position(|preset| *preset == self.range.preset())
            .map(|index| presets[(index + 1) % presets.len()])
            .unwrap_or(presets[0]);
        self.select_range(next)
    }

    /// Switch the visible range; the grid reloads once the months arrive.
    pub fn select_range(&mut self, preset: RangePreset) -> Vec<Effect> {
        if self.nav.cells().session().is_some() || self.nav.cells().is_busy() || self.bulk.is_busy()
        {
            self.set_status("Finish saving before changing the range");
            return Vec::new();
        }
        match self.range.select(preset) {
            Ok(range) => {
                self.set_status(range.label());
                vec![Effect::LoadMonths(months_to_load(&range))]
            }
            Err(err) => {
                self.set_status(err.to_string());
                Vec::new()
            }
        }
    }

    fn menu_key(&mut self, press: KeyPress) -> Vec<Effect> {
        let InteractionMode::ContextMenu(menu) = &mut self.mode else {
            return Vec::new();
        };
        match press.code {
            KeyCode::Down => menu.highlight_next(),
            KeyCode::Up => menu.highlight_previous(),
            KeyCode::Enter => {
                if let Some(action) = menu.activate() {
                    let target = menu.target().clone();
                    return self.menu_action(target, action);
                }
            }
            KeyCode::Esc => self.mode = InteractionMode::Grid,
            _ => {}
        }
        Vec::new()
    }

    fn menu_action(&mut self, target: CellKey, action: MenuAction) -> Vec<Effect> {
        debug!(cell = %target, action = action.label(), "menu action");
        let action = match action {
            MenuAction::EditThisMonth => {
                self.mode = InteractionMode::Grid;
                return match self.nav.double_click(&self.grid, &target) {
                    Ok(Some(commit)) => vec![Effect::SaveCell(commit)],
                    Ok(None) => Vec::new(),
                    Err(err) => self.cell_error(err),
                };
            }
            MenuAction::SetFutureMonths => FutureAction::SetAmount,
            MenuAction::IncreaseFutureMonths => FutureAction::IncreasePercent,
        };
        self.mode = InteractionMode::FuturePrompt(FuturePrompt::new(target, action));
        Vec::new()
    }

    fn prompt_key(&mut self, press: KeyPress) -> Vec<Effect> {
        let busy = self.bulk.is_busy();
        let InteractionMode::FuturePrompt(prompt) = &mut self.mode else {
            return Vec::new();
        };
        match press.code {
            KeyCode::Esc if !busy => self.mode = InteractionMode::Grid,
            KeyCode::Backspace if !busy => prompt.backspace(&self.grid),
            KeyCode::Char(ch) if !busy && !press.modifiers.command() => {
                prompt.insert_char(&self.grid, ch)
            }
            KeyCode::Enter if !busy && prompt.can_apply() => {
                let request = prompt.request(&self.grid);
                return self.begin_batch(request);
            }
            _ => {}
        }
        Vec::new()
    }

    fn modal_key(&mut self, press: KeyPress) -> Vec<Effect> {
        let InteractionMode::BatchModal(modal) = &mut self.mode else {
            return Vec::new();
        };
        if modal.is_busy() {
            return Vec::new();
        }
        let grid = &self.grid;
        match (press.code, modal.focus()) {
            (KeyCode::Esc, _) => self.mode = InteractionMode::Grid,
            (KeyCode::Tab, _) if press.modifiers.shift => modal.focus_previous(),
            (KeyCode::Tab, _) => modal.focus_next(),
            (KeyCode::Enter, _) => {
                if modal.can_apply() {
                    let request = modal.request();
                    return self.begin_batch(request);
                }
            }
            (KeyCode::Up, ModalFocus::Categories) => modal.move_row(-1),
            (KeyCode::Down, ModalFocus::Categories) => modal.move_row(1),
            (KeyCode::Char(' '), ModalFocus::Categories) => modal.toggle_row(grid),
            (KeyCode::Left, ModalFocus::Range) => modal.cycle_range(grid, false),
            (KeyCode::Right, ModalFocus::Range) => modal.cycle_range(grid, true),
            (KeyCode::Char('+'), ModalFocus::Range) => modal.extend_range(grid, 1),
            (KeyCode::Char('-'), ModalFocus::Range) => modal.extend_range(grid, -1),
            (KeyCode::Left, ModalFocus::Operation) => modal.cycle_operation(grid, false),
            (KeyCode::Right, ModalFocus::Operation) => modal.cycle_operation(grid, true),
            (KeyCode::Backspace, ModalFocus::Value) => modal.backspace(grid),
            (KeyCode::Char(ch), ModalFocus::Value) if !press.modifiers.command() => {
                modal.insert_char(grid, ch)
            }
            (KeyCode::Char('m'), _) => modal.show_all(),
            _ => {}
        }
        Vec::new()
    }

    fn begin_batch(
        &mut self,
        request: Result<MutationRequest, MutationError>,
    ) -> Vec<Effect> {
        let batch = request.and_then(|request| {
            self.bulk
                .begin_apply(&self.grid, self.nav.cells(), &request)
        });
        match batch {
            Ok(batch) => {
                self.batch_keys = batch.updates.iter().map(|update| update.key.clone()).collect();
                if let InteractionMode::BatchModal(modal) = &mut self.mode {
                    modal.set_busy(true);
                    modal.set_failure(None);
                }
                vec![Effect::SaveBatch(batch)]
            }
            Err(err) => {
                warn!(error = %err, "batch not started");
                self.report_batch_failure(err.to_string());
                Vec::new()
            }
        }
    }

    fn report_batch_failure(&mut self, message: String) {
        match &mut self.mode {
            InteractionMode::BatchModal(modal) => {
                modal.set_busy(false);
                modal.set_failure(Some(message));
            }
            _ => self.set_status(message),
        }
    }

    fn pointer(&mut self, pointer: Pointer) -> Vec<Effect> {
        let outside = matches!(pointer, Pointer::Click(PointerTarget::Outside));
        match &mut self.mode {
            InteractionMode::Grid => self.grid_pointer(pointer),
            InteractionMode::ContextMenu(menu) => match pointer {
                Pointer::Hover(PointerTarget::MenuItem(index)) => {
                    menu.highlight(index);
                    Vec::new()
                }
                Pointer::Click(PointerTarget::MenuItem(index)) => {
                    menu.highlight(index);
                    let target = menu.target().clone();
                    match menu.activate() {
                        Some(action) => self.menu_action(target, action),
                        None => Vec::new(),
                    }
                }
                Pointer::Hover(_) => Vec::new(),
                _ => {
                    self.mode = InteractionMode::Grid;
                    Vec::new()
                }
            },
            InteractionMode::FuturePrompt(_) => {
                if outside && !self.bulk.is_busy() {
                    self.mode = InteractionMode::Grid;
                }
                Vec::new()
            }
            InteractionMode::BatchModal(modal) => {
                if outside && !modal.is_busy() {
                    self.mode = InteractionMode::Grid;
                }
                Vec::new()
            }
        }
    }

    fn grid_pointer(&mut self, pointer: Pointer) -> Vec<Effect> {
        match pointer {
            Pointer::Hover(PointerTarget::Cell(key)) => {
                if self.nav.cells().editing() == Some(&key) {
                    self.tooltip.pointer_leave();
                } else {
                    self.tooltip.tooltip_hover(false);
                    self.tooltip.pointer_enter(&key);
                }
                Vec::new()
            }
            Pointer::Hover(PointerTarget::Tooltip) => {
                self.tooltip.tooltip_hover(true);
                Vec::new()
            }
            Pointer::Hover(_) => {
                self.tooltip.pointer_leave();
                self.tooltip.tooltip_hover(false);
                Vec::new()
            }
            Pointer::Click(PointerTarget::Cell(key)) => {
                self.tooltip.dismiss();
                match self.nav.click(&key) {
                    Ok((commit, expanded)) => {
                        let mut effects: Vec<Effect> =
                            commit.into_iter().map(Effect::SaveCell).collect();
                        if expanded {
                            effects.extend(self.expand_focused());
                        }
                        effects
                    }
                    Err(err) => self.cell_error(err),
                }
            }
            Pointer::DoubleClick(PointerTarget::Cell(key)) => {
                self.tooltip.dismiss();
                match self.nav.double_click(&self.grid, &key) {
                    Ok(commit) => commit.into_iter().map(Effect::SaveCell).collect(),
                    Err(err) => self.cell_error(err),
                }
            }
            Pointer::ContextClick(PointerTarget::Cell(key), anchor) => {
                self.open_menu(key, anchor);
                Vec::new()
            }
            Pointer::Click(_) | Pointer::DoubleClick(_) => {
                if self.nav.cells().session().is_some() {
                    let step = self.nav.blur();
                    return self.commit_step(step);
                }
                Vec::new()
            }
            Pointer::ContextClick(..) => Vec::new(),
        }
    }

    /// Ledger answer for a [`Effect::SaveCell`].
    pub fn commit_resolved(&mut self, ticket: u64, result: Result<(), PersistenceError>) -> Vec<Effect> {
        let resolved = self.nav.resolve(&mut self.grid, ticket, result);
        match &resolved.outcome {
            CommitOutcome::Saved { key, .. } => {
                if let Some(cents) = self.grid.budgeted(key) {
                    self.totals.record_budget(key, cents);
                }
                self.status = None;
            }
            CommitOutcome::Failed { error, retained, .. } => {
                let message = if *retained {
                    format!("{error}; press Enter to retry")
                } else {
                    error.to_string()
                };
                self.set_status(message);
            }
            CommitOutcome::Stale => debug!(ticket, "stale commit answer ignored"),
        }
        match resolved.moved {
            Some(TabOutcome::LeftGrid) => vec![Effect::LeftGrid],
            _ => Vec::new(),
        }
    }

    /// Ledger answer for a [`Effect::SaveBatch`].
    pub fn batch_resolved(&mut self, ticket: u64, result: Result<usize, BatchError>) {
        let outcome = self.bulk.complete_apply(&mut self.grid, ticket, result);
        if matches!(outcome, Err(MutationError::StaleTicket)) {
            debug!(ticket, "stale batch answer ignored");
            return;
        }
        for key in std::mem::take(&mut self.batch_keys) {
            if let Some(cents) = self.grid.budgeted(&key) {
                self.totals.record_budget(&key, cents);
            }
        }
        match outcome {
            Ok(report) => {
                self.mode = InteractionMode::Grid;
                self.set_status(match report.applied {
                    1 => "1 cell updated".to_string(),
                    n => format!("{n} cells updated"),
                });
            }
            Err(err) => self.report_batch_failure(err.to_string()),
        }
    }

    /// Ledger answer for a [`Effect::LoadTransactions`].
    pub fn transactions_loaded(
        &mut self,
        key: &CellKey,
        result: Result<Vec<Transaction>, PersistenceError>,
    ) {
        if let Some(detail) = self.detail.as_mut().filter(|detail| detail.key() == key) {
            detail.load(result.map_err(|err| err.to_string()));
        }
    }
}

fn tab_direction(press: &KeyPress) -> Direction {
    if press.modifiers.shift {
        Direction::Backward
    } else {
        Direction::Forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cell::CellState,
        ledger::{Fault, InMemoryLedger, LedgerStore},
        models::{Category, CategoryKind, CellUpdate},
        shortcuts::Modifiers,
    };

    fn m(s: &str) -> Month {
        s.parse().expect("valid month")
    }

    fn key(code: KeyCode) -> Input {
        Input::Key(KeyPress::plain(code))
    }

    fn typed(view: &mut BudgetView, text: &str) {
        for ch in text.chars() {
            view.handle(key(KeyCode::Char(ch)));
        }
    }

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(vec![
            Category::new("rent", "Rent", CategoryKind::Expense).in_section("Housing"),
            Category::new("food", "Food", CategoryKind::Expense).in_section("Daily"),
        ])
    }

    async fn view_over(ledger: &InMemoryLedger) -> anyhow::Result<BudgetView> {
        let range = DateRangeStore::new(m("2025-03"), RangePreset::ThisQuarter)?;
        let snapshot = ledger.load_range(&months_to_load(&range.range())).await?;
        Ok(BudgetView::new(ViewSettings::default(), range, snapshot))
    }

    /// Run every effect against the ledger like a front end would.
    async fn drive(view: &mut BudgetView, ledger: &InMemoryLedger, effects: Vec<Effect>) -> Vec<Effect> {
        let mut rest = Vec::new();
        for effect in effects {
            match effect {
                Effect::SaveCell(commit) => {
                    let result = ledger.save_cell(&commit.key, commit.budgeted_cents).await;
                    rest.extend(view.commit_resolved(commit.ticket, result));
                }
                Effect::SaveBatch(batch) => {
                    let result = ledger.save_batch(&batch.updates).await;
                    view.batch_resolved(batch.ticket, result);
                }
                Effect::LoadTransactions(cell) => {
                    let result = ledger.get_transactions(&cell).await;
                    view.transactions_loaded(&cell, result);
                }
                other => rest.push(other),
            }
        }
        rest
    }

    #[tokio::test]
    async fn enter_edit_and_tab_saves_then_moves() -> anyhow::Result<()> {
        let ledger = ledger();
        let mut view = view_over(&ledger).await?;
        let start = CellKey::new("rent", m("2025-01"));
        assert_eq!(view.navigator().cursor(), Some(&start));

        view.handle(key(KeyCode::Enter));
        typed(&mut view, "1200");
        let effects = view.handle(key(KeyCode::Tab));
        assert!(matches!(effects.as_slice(), [Effect::SaveCell(_)]));
        drive(&mut view, &ledger, effects).await;

        assert_eq!(view.grid().budgeted(&start), Some(120_000));
        let next = CellKey::new("rent", m("2025-02"));
        assert!(matches!(view.navigator().cells().state(&next), CellState::Editing(_)));
        assert_eq!(
            view.totals().row(&"rent".into()).budgeted_cents,
            120_000
        );
        Ok(())
    }

    #[tokio::test]
    async fn invalid_draft_blocks_tab() -> anyhow::Result<()> {
        let ledger = ledger();
        let mut view = view_over(&ledger).await?;
        view.handle(key(KeyCode::Enter));
        typed(&mut view, "-5");
        assert!(view.handle(key(KeyCode::Tab)).is_empty());
        let origin = CellKey::new("rent", m("2025-01"));
        assert!(view.navigator().cells().state(&origin).has_error());
        assert_eq!(view.navigator().cursor(), Some(&origin));
        assert_eq!(ledger.write_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn batch_shortcut_blocked_while_editing_or_modal_open() -> anyhow::Result<()> {
        let ledger = ledger();
        let mut view = view_over(&ledger).await?;
        let shortcut = Input::Key(KeyPress::with(KeyCode::Char('B'), Modifiers::CTRL_SHIFT));

        view.handle(key(KeyCode::Enter));
        view.handle(shortcut.clone());
        assert_eq!(view.mode(), &InteractionMode::Grid);
        assert!(view.navigator().cells().session().is_some());

        view.handle(key(KeyCode::Esc));
        view.handle(shortcut.clone());
        assert!(matches!(view.mode(), InteractionMode::BatchModal(_)));

        view.handle(shortcut);
        view.handle(key(KeyCode::Esc));
        assert_eq!(view.mode(), &InteractionMode::Grid);
        Ok(())
    }

    #[tokio::test]
    async fn batch_modal_applies_next_three_months() -> anyhow::Result<()> {
        let ledger = ledger();
        let mut view = view_over(&ledger).await?;
        view.handle(Input::Key(KeyPress::with(KeyCode::Char('b'), Modifiers::CTRL_SHIFT)));

        // "All categories" is the first checklist line
        view.handle(key(KeyCode::Char(' ')));
        view.handle(key(KeyCode::Tab));
        view.handle(key(KeyCode::Tab));
        view.handle(key(KeyCode::Tab));
        typed(&mut view, "250");
        let InteractionMode::BatchModal(modal) = view.mode() else {
            panic!("modal should be open");
        };
        assert_eq!(modal.preview_label(), "2 cells affected");

        let effects = view.handle(key(KeyCode::Enter));
        assert!(matches!(effects.as_slice(), [Effect::SaveBatch(_)]));
        drive(&mut view, &ledger, effects).await;

        assert_eq!(view.mode(), &InteractionMode::Grid);
        assert_eq!(view.status(), Some("2 cells updated"));
        assert_eq!(view.grid().budgeted(&CellKey::new("food", m("2025-03"))), Some(25_000));
        Ok(())
    }

    #[tokio::test]
    async fn failed_batch_keeps_modal_open() -> anyhow::Result<()> {
        let ledger = ledger();
        let mut view = view_over(&ledger).await?;
        view.handle(Input::Key(KeyPress::with(KeyCode::Char('b'), Modifiers::CTRL_SHIFT)));
        view.handle(key(KeyCode::Char(' ')));
        for _ in 0..3 {
            view.handle(key(KeyCode::Tab));
        }
        typed(&mut view, "10");
        ledger.inject(Fault::FailNext("disk full".into()));
        let effects = view.handle(key(KeyCode::Enter));
        drive(&mut view, &ledger, effects).await;

        let InteractionMode::BatchModal(modal) = view.mode() else {
            panic!("modal should stay open");
        };
        assert!(!modal.is_busy());
        assert!(modal.failure().is_some_and(|f| f.contains("disk full")));
        assert_eq!(view.grid().budgeted(&CellKey::new("rent", m("2025-03"))), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn context_menu_sets_future_months() -> anyhow::Result<()> {
        let ledger = ledger();
        let mut view = view_over(&ledger).await?;
        let origin = CellKey::new("food", m("2025-02"));
        view.handle(Input::Pointer(Pointer::ContextClick(
            PointerTarget::Cell(origin.clone()),
            (10, 4),
        )));
        assert!(matches!(view.mode(), InteractionMode::ContextMenu(_)));

        view.handle(key(KeyCode::Down));
        view.handle(key(KeyCode::Down));
        view.handle(key(KeyCode::Enter));
        assert!(matches!(view.mode(), InteractionMode::FuturePrompt(_)));

        typed(&mut view, "80");
        let effects = view.handle(key(KeyCode::Enter));
        drive(&mut view, &ledger, effects).await;

        assert_eq!(view.mode(), &InteractionMode::Grid);
        assert_eq!(view.grid().budgeted(&CellKey::new("food", m("2025-01"))), Some(0));
        assert_eq!(view.grid().budgeted(&origin), Some(8_000));
        assert_eq!(view.grid().budgeted(&CellKey::new("food", m("2025-03"))), Some(8_000));
        Ok(())
    }

    #[tokio::test]
    async fn context_menu_ignored_while_editing() -> anyhow::Result<()> {
        let ledger = ledger();
        let mut view = view_over(&ledger).await?;
        view.handle(key(KeyCode::Enter));
        view.handle(Input::Key(KeyPress::with(KeyCode::F(10), Modifiers::SHIFT)));
        assert_eq!(view.mode(), &InteractionMode::Grid);
        Ok(())
    }

    #[tokio::test]
    async fn space_expands_and_loads_transactions() -> anyhow::Result<()> {
        let ledger = ledger();
        let mut view = view_over(&ledger).await?;
        let effects = view.handle(key(KeyCode::Char(' ')));
        assert_eq!(
            effects,
            vec![Effect::LoadTransactions(CellKey::new("rent", m("2025-01")))]
        );
        drive(&mut view, &ledger, effects).await;
        let detail = view.detail().expect("panel open");
        assert_eq!(detail.placeholder(), Some("No transactions for this month"));

        view.handle(key(KeyCode::Char(' ')));
        assert!(view.detail().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn tooltip_follows_hover_after_delay() -> anyhow::Result<()> {
        let ledger = ledger();
        ledger
            .save_batch(&[CellUpdate {
                key: CellKey::new("food", m("2025-01")),
                budgeted_cents: 50_000,
            }])
            .await?;
        let mut view = view_over(&ledger).await?;
        let cell = CellKey::new("food", m("2025-01"));
        view.handle(Input::Pointer(Pointer::Hover(PointerTarget::Cell(cell.clone()))));
        assert!(view.tooltip().is_none());
        assert!(view.tick(Duration::from_millis(200)));
        let (shown, content) = view.tooltip().expect("tooltip visible");
        assert_eq!(shown, &cell);
        assert_eq!(content.budget, "€500.00");
        assert_eq!(content.usage, "0.0%");
        Ok(())
    }

    #[tokio::test]
    async fn range_change_requests_reload() -> anyhow::Result<()> {
        let ledger = ledger();
        let mut view = view_over(&ledger).await?;
        let effects = view.select_range(RangePreset::ThisYear);
        let [Effect::LoadMonths(months)] = effects.as_slice() else {
            panic!("expected a reload");
        };
        assert_eq!(months.first(), Some(&m("2025-01")));
        assert_eq!(months.last(), Some(&m("2025-12")));
        let snapshot = ledger.load_range(months).await?;
        view.reload(snapshot);
        assert_eq!(view.grid().months().len(), 12);
        Ok(())
    }
}
