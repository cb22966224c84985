//! Hover tooltip: delayed show/hide and the figures it displays.

use std::time::Duration;

use crate::{
    models::{BudgetCell, CategoryKind, CellKey},
    money::{div_round_half_away, format_currency},
    schedule::{Scheduler, TimerToken},
};

/// Default delay before showing and before hiding.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
enum TooltipEvent {
    Show(CellKey),
    Hide,
}

/// Tracks pointer hover and decides which cell's tooltip is visible.
#[derive(Debug)]
pub struct TooltipController {
    show_delay: Duration,
    hide_delay: Duration,
    scheduler: Scheduler<TooltipEvent>,
    hovered: Option<CellKey>,
    over_tooltip: bool,
    visible: Option<CellKey>,
    show_timer: Option<TimerToken>,
    hide_timer: Option<TimerToken>,
}

impl Default for TooltipController {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY, DEFAULT_DELAY)
    }
}

impl TooltipController {
    /// Controller with explicit delays.
    pub fn new(show_delay: Duration, hide_delay: Duration) -> Self {
        Self {
            show_delay,
            hide_delay,
            scheduler: Scheduler::new(),
            hovered: None,
            over_tooltip: false,
            visible: None,
            show_timer: None,
            hide_timer: None,
        }
    }

    /// Cell whose tooltip is showing.
    pub fn visible(&self) -> Option<&CellKey> {
        self.visible.as_ref()
    }

    /// Time until the next pending show or hide.
    pub fn next_due(&self) -> Option<Duration> {
        self.scheduler.next_due()
    }

    /// Pointer moved onto a cell.
    pub fn pointer_enter(&mut self, key: &CellKey) {
        if self.hovered.as_ref() == Some(key) {
            return;
        }
        self.cancel_hide();
        self.cancel_show();
        self.hovered = Some(key.clone());
        if self.visible.as_ref() != Some(key) {
            self.show_timer = Some(
                self.scheduler
                    .schedule(self.show_delay, TooltipEvent::Show(key.clone())),
            );
        }
    }

    /// Pointer left the cell it was on.
    pub fn pointer_leave(&mut self) {
        if self.hovered.take().is_none() {
            return;
        }
        self.cancel_show();
        self.schedule_hide();
    }

    /// Pointer moved onto or off the tooltip itself, which keeps it open.
    pub fn tooltip_hover(&mut self, inside: bool) {
        self.over_tooltip = inside;
        if inside {
            self.cancel_hide();
        } else if self.hovered.is_none() {
            self.schedule_hide();
        }
    }

    /// Close immediately (editing started, a modal opened).
    pub fn dismiss(&mut self) {
        self.cancel_show();
        self.cancel_hide();
        self.hovered = None;
        self.over_tooltip = false;
        self.visible = None;
    }

    /// Advance the clock; returns `true` when the visible tooltip changed.
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        let before = self.visible.clone();
        for event in self.scheduler.advance(elapsed) {
            match event {
                TooltipEvent::Show(key) => {
                    self.show_timer = None;
                    if self.hovered.as_ref() == Some(&key) {
                        self.visible = Some(key);
                    }
                }
                TooltipEvent::Hide => {
                    self.hide_timer = None;
                    if self.hovered.is_none() && !self.over_tooltip {
                        self.visible = None;
                    }
                }
            }
        }
        before != self.visible
    }

    fn schedule_hide(&mut self) {
        self.cancel_hide();
        self.hide_timer = Some(self.scheduler.schedule(self.hide_delay, TooltipEvent::Hide));
    }

    fn cancel_show(&mut self) {
        if let Some(token) = self.show_timer.take() {
            self.scheduler.cancel(token);
        }
    }

    fn cancel_hide(&mut self) {
        if let Some(token) = self.hide_timer.take() {
            self.scheduler.cancel(token);
        }
    }
}

/// Budget-versus-actual line of a tooltip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Difference {
    /// Money left (`+€150.00 remaining`).
    Remaining(i64),
    /// Overspend (`-€25.00 over`).
    Over(i64),
    /// Exactly on budget.
    OnBudget,
}

/// Figures shown in a cell tooltip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TooltipContent {
    /// `Actual:` value.
    pub actual: String,
    /// `Budget:` value.
    pub budget: String,
    /// `Difference:` kind and magnitude.
    pub difference: Difference,
    /// `Usage:` value (`70.0%` or `N/A`).
    pub usage: String,
}

impl TooltipContent {
    /// Build the tooltip figures for one cell.
    pub fn for_cell(cell: &BudgetCell, kind: CategoryKind, symbol: &str) -> Self {
        let remaining = cell.remaining_cents();
        let difference = match remaining {
            0 => Difference::OnBudget,
            r if r > 0 => Difference::Remaining(r),
            r => Difference::Over(-r),
        };
        let usage = if cell.budgeted_cents <= 0 {
            "N/A".to_string()
        } else {
            let used = match kind {
                CategoryKind::Income => i128::from(cell.actual_cents),
                _ => i128::from(cell.actual_cents).abs(),
            };
            let tenths = div_round_half_away(used * 1_000, i128::from(cell.budgeted_cents));
            let sign = if tenths < 0 { "-" } else { "" };
            let abs = tenths.abs();
            format!("{sign}{}.{}%", abs / 10, abs % 10)
        };
        Self {
            actual: format_currency(cell.actual_cents, symbol),
            budget: format_currency(cell.budgeted_cents, symbol),
            difference,
            usage,
        }
    }

    /// Text of the difference line.
    pub fn difference_text(&self, symbol: &str) -> String {
        match self.difference {
            Difference::Remaining(cents) => {
                format!("+{} remaining", format_currency(cents, symbol))
            }
            Difference::Over(cents) => format!("-{} over", format_currency(cents, symbol)),
            Difference::OnBudget => "On budget".to_string(),
        }
    }
}
