use std::{
    io,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use budgetgrid_core::{
    error::{BatchError, PersistenceError},
    ledger::{LedgerSnapshot, LedgerStore},
    models::{CellKey, Transaction},
    shortcuts::{self as keys, Input, KeyPress, Modifiers, Pointer, PointerTarget},
    view::{BudgetView, Effect},
};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, KeyboardEnhancementFlags, MouseButton, MouseEvent, MouseEventKind,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use tokio::{spawn, sync::mpsc};
use tracing::{debug, error, info, warn};

use crate::{
    theme::{load_theme, Theme},
    ui::{self, HitMap, Viewport},
};

const TICK_RATE: Duration = Duration::from_millis(50);
const DOUBLE_CLICK: Duration = Duration::from_millis(400);

enum AppEvent {
    Input(Event),
    Tick,
    CellSaved {
        ticket: u64,
        result: Result<(), PersistenceError>,
    },
    BatchSaved {
        ticket: u64,
        result: Result<usize, BatchError>,
    },
    TransactionsLoaded {
        key: CellKey,
        result: Result<Vec<Transaction>, PersistenceError>,
    },
    MonthsLoaded(Result<LedgerSnapshot, PersistenceError>),
}

/// Terminal front end driving a [`BudgetView`] against a ledger.
pub struct BudgetApp<L> {
    ledger: Arc<L>,
    view: BudgetView,
    theme: Theme,
    state: UiState,
    viewport: Viewport,
    hits: HitMap,
    event_tx: Option<mpsc::Sender<AppEvent>>,
    last_tick: Instant,
    last_click: Option<(Instant, CellKey)>,
}

impl<L> BudgetApp<L>
where
    L: LedgerStore + 'static,
{
    pub fn new(ledger: Arc<L>, view: BudgetView) -> Self {
        let (theme, theme_status) = load_theme();
        let mut state = UiState::default();
        state.set_status(format!(
            "{} categories loaded • {theme_status}",
            view.grid().categories().len()
        ));
        Self {
            ledger,
            view,
            theme,
            state,
            viewport: Viewport::default(),
            hits: HitMap::default(),
            event_tx: None,
            last_tick: Instant::now(),
            last_click: None,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
            .context("failed to enter alternate screen")?;
        // Ctrl+Shift+B is only distinguishable with the kitty protocol
        let enhanced_keys = matches!(supports_keyboard_enhancement(), Ok(true));
        if enhanced_keys {
            execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
            )
            .context("failed to enable keyboard enhancement")?;
        }
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);
        self.last_tick = Instant::now();
        info!("terminal ready");

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if let Some(anchor) = self.hits.cursor_anchor {
                self.view.set_cursor_anchor(anchor);
            }
            if self.state.should_quit {
                break;
            }

            let maybe_event = event_rx.recv().await;
            if !self.process_app_event(maybe_event) {
                break;
            }

            if self.state.should_quit {
                break;
            }
        }

        restore_terminal(&mut terminal, enhanced_keys)?;
        self.event_tx = None;
        Ok(())
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        self.advance_clock();
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                if let Err(err) = self.handle_input(event) {
                    self.state.set_status(format!("Error: {err}"));
                }
                true
            }
            Some(AppEvent::Tick) => true,
            Some(AppEvent::CellSaved { ticket, result }) => {
                if let Err(err) = &result {
                    warn!(ticket, error = %err, "cell save failed");
                }
                let effects = self.view.commit_resolved(ticket, result);
                if let Err(err) = self.run_effects(effects) {
                    self.state.set_status(format!("Error: {err}"));
                }
                true
            }
            Some(AppEvent::BatchSaved { ticket, result }) => {
                if let Err(err) = &result {
                    warn!(ticket, error = %err, "batch save failed");
                }
                self.view.batch_resolved(ticket, result);
                true
            }
            Some(AppEvent::TransactionsLoaded { key, result }) => {
                self.view.transactions_loaded(&key, result);
                true
            }
            Some(AppEvent::MonthsLoaded(result)) => {
                match result {
                    Ok(snapshot) => {
                        self.view.reload(snapshot);
                        self.viewport = Viewport::default();
                    }
                    Err(err) => {
                        error!(error = %err, "month reload failed");
                        self.state.set_status(format!("Failed to load months: {err}"));
                    }
                }
                true
            }
            None => false,
        }
    }

    fn advance_clock(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick);
        self.last_tick = now;
        if self.view.tick(elapsed) {
            debug!("tooltip visibility changed");
        }
    }

    fn handle_input(&mut self, event: Event) -> Result<()> {
        let input = match event {
            Event::Key(key) => {
                if key.kind == KeyEventKind::Release {
                    return Ok(());
                }
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    self.state.should_quit = true;
                    return Ok(());
                }
                translate_key(&key).map(Input::Key)
            }
            Event::Mouse(mouse) => self.translate_mouse(mouse).map(Input::Pointer),
            Event::Resize(_, _) | Event::FocusGained | Event::FocusLost | Event::Paste(_) => None,
        };
        let Some(input) = input else {
            return Ok(());
        };
        let effects = self.view.handle(input);
        self.run_effects(effects)
    }

    fn translate_mouse(&mut self, mouse: MouseEvent) -> Option<Pointer> {
        let target = self.hits.target(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let now = Instant::now();
                if let PointerTarget::Cell(key) = &target {
                    let repeated = self.last_click.as_ref().is_some_and(|(at, last)| {
                        last == key && now.duration_since(*at) <= DOUBLE_CLICK
                    });
                    if repeated {
                        self.last_click = None;
                        return Some(Pointer::DoubleClick(target));
                    }
                    self.last_click = Some((now, key.clone()));
                } else {
                    self.last_click = None;
                }
                Some(Pointer::Click(target))
            }
            MouseEventKind::Down(MouseButton::Right) => {
                Some(Pointer::ContextClick(target, (mouse.column, mouse.row)))
            }
            MouseEventKind::Moved => Some(Pointer::Hover(target)),
            _ => None,
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<AppEvent>> {
        self.event_tx
            .clone()
            .context("event loop is not running")
    }

    /// Run view effects; ledger calls go to tokio tasks that report back
    /// through the event channel.
    fn run_effects(&mut self, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::SaveCell(commit) => {
                    debug!(cell = %commit.key, cents = commit.budgeted_cents, "saving cell");
                    let ledger = Arc::clone(&self.ledger);
                    let tx = self.sender()?;
                    spawn(async move {
                        let result = ledger.save_cell(&commit.key, commit.budgeted_cents).await;
                        let event = AppEvent::CellSaved {
                            ticket: commit.ticket,
                            result,
                        };
                        if tx.send(event).await.is_err() {
                            debug!("event loop closed before the cell save finished");
                        }
                    });
                }
                Effect::SaveBatch(batch) => {
                    info!(count = batch.updates.len(), "saving batch");
                    let ledger = Arc::clone(&self.ledger);
                    let tx = self.sender()?;
                    spawn(async move {
                        let result = ledger.save_batch(&batch.updates).await;
                        let event = AppEvent::BatchSaved {
                            ticket: batch.ticket,
                            result,
                        };
                        if tx.send(event).await.is_err() {
                            debug!("event loop closed before the batch save finished");
                        }
                    });
                }
                Effect::LoadTransactions(key) => {
                    let ledger = Arc::clone(&self.ledger);
                    let tx = self.sender()?;
                    spawn(async move {
                        let result = ledger.get_transactions(&key).await;
                        if tx
                            .send(AppEvent::TransactionsLoaded { key, result })
                            .await
                            .is_err()
                        {
                            debug!("event loop closed before transactions loaded");
                        }
                    });
                }
                Effect::LoadMonths(months) => {
                    info!(months = months.len(), "loading months");
                    let ledger = Arc::clone(&self.ledger);
                    let tx = self.sender()?;
                    spawn(async move {
                        let result = ledger.load_range(&months).await;
                        if tx.send(AppEvent::MonthsLoaded(result)).await.is_err() {
                            debug!("event loop closed before months loaded");
                        }
                    });
                }
                Effect::LeftGrid => {
                    self.state
                        .set_status("Left the grid; Tab returns to the first cell".to_string());
                }
                Effect::Quit => self.state.should_quit = true,
            }
        }
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        ui::draw(
            frame,
            &self.view,
            &self.theme,
            &self.state.status,
            &mut self.viewport,
            &mut self.hits,
        );
    }
}

/// Map a crossterm key onto the grid's key vocabulary.
fn translate_key(key: &KeyEvent) -> Option<KeyPress> {
    let mut modifiers = Modifiers {
        ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
        shift: key.modifiers.contains(KeyModifiers::SHIFT),
        alt: key.modifiers.contains(KeyModifiers::ALT),
        meta: key
            .modifiers
            .intersects(KeyModifiers::SUPER | KeyModifiers::META),
    };
    let code = match key.code {
        KeyCode::Char(ch) => {
            if ch.is_ascii_uppercase() {
                modifiers.shift = true;
            }
            keys::KeyCode::Char(ch)
        }
        KeyCode::Enter => keys::KeyCode::Enter,
        KeyCode::Esc => keys::KeyCode::Esc,
        KeyCode::Tab => keys::KeyCode::Tab,
        KeyCode::BackTab => {
            modifiers.shift = true;
            keys::KeyCode::Tab
        }
        KeyCode::Backspace => keys::KeyCode::Backspace,
        KeyCode::Up => keys::KeyCode::Up,
        KeyCode::Down => keys::KeyCode::Down,
        KeyCode::Left => keys::KeyCode::Left,
        KeyCode::Right => keys::KeyCode::Right,
        KeyCode::F(n) => keys::KeyCode::F(n),
        _ => return None,
    };
    Some(KeyPress::with(code, modifiers))
}

fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    enhanced_keys: bool,
) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    if enhanced_keys {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to reset keyboard mode")?;
    }
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

struct UiState {
    status: String,
    should_quit: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            status: "Ready".to_string(),
            should_quit: false,
        }
    }
}

impl UiState {
    fn set_status(&mut self, message: String) {
        self.status = message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn back_tab_becomes_shift_tab() {
        let press = translate_key(&key(KeyCode::BackTab, KeyModifiers::SHIFT)).expect("mapped");
        assert_eq!(press.code, keys::KeyCode::Tab);
        assert!(press.modifiers.shift);
        assert_eq!(keys::matching(&press), Some("prev-field"));
    }

    #[test]
    fn uppercase_control_letter_counts_as_shifted() {
        let press = translate_key(&key(KeyCode::Char('B'), KeyModifiers::CONTROL)).expect("mapped");
        assert_eq!(keys::matching(&press), Some(keys::ADJUST_BUDGETS));

        let plain = translate_key(&key(KeyCode::Char('b'), KeyModifiers::CONTROL)).expect("mapped");
        assert_eq!(keys::matching(&plain), None);
    }

    #[test]
    fn function_keys_keep_modifiers() {
        let press = translate_key(&key(KeyCode::F(10), KeyModifiers::SHIFT)).expect("mapped");
        assert_eq!(keys::matching(&press), Some("cell-menu"));
        assert!(translate_key(&key(KeyCode::Home, KeyModifiers::NONE)).is_none());
    }
}
