//! Trailing twelve-month totals shown next to each category row.

use std::collections::HashMap;

use crate::{
    ledger::LedgerSnapshot,
    models::{BudgetCell, Category, CategoryId, CellKey},
    money::{div_round_half_away, format_compact, format_currency},
    month::Month,
};

/// Months in a trailing total.
pub const TRAILING_MONTHS: usize = 12;

/// The twelve months ending at `end` (inclusive).
pub fn trailing_months(end: Month) -> Vec<Month> {
    end.offset(-(TRAILING_MONTHS as i32 - 1)).range_to(end)
}

/// Sign of a totals difference, used for coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifferenceClass {
    /// Under budget.
    Positive,
    /// Over budget.
    Negative,
    /// Exactly on budget.
    Neutral,
}

/// Summed actual and budget over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    /// Sum of absolute actuals.
    pub actual_cents: i64,
    /// Sum of budgets.
    pub budgeted_cents: i64,
}

impl Totals {
    fn add_cell(&mut self, cell: &BudgetCell) {
        self.actual_cents = self.actual_cents.saturating_add(cell.actual_cents.saturating_abs());
        self.budgeted_cents = self.budgeted_cents.saturating_add(cell.budgeted_cents);
    }

    fn add(&mut self, other: Totals) {
        self.actual_cents = self.actual_cents.saturating_add(other.actual_cents);
        self.budgeted_cents = self.budgeted_cents.saturating_add(other.budgeted_cents);
    }

    /// Budget minus actual.
    pub fn difference_cents(&self) -> i64 {
        self.budgeted_cents.saturating_sub(self.actual_cents)
    }

    /// Share of the budget used; zero without a budget.
    pub fn percent_used(&self) -> f64 {
        if self.budgeted_cents > 0 {
            self.actual_cents as f64 / self.budgeted_cents as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Coloring of the difference.
    pub fn difference_class(&self) -> DifferenceClass {
        match self.difference_cents() {
            0 => DifferenceClass::Neutral,
            d if d > 0 => DifferenceClass::Positive,
            _ => DifferenceClass::Negative,
        }
    }

    /// Difference with an explicit `+` when under budget.
    pub fn difference_text(&self, symbol: &str) -> String {
        let difference = self.difference_cents();
        let text = format_currency(difference, symbol);
        if difference > 0 {
            format!("+{text}")
        } else {
            text
        }
    }

    /// Monthly average, rounded to the nearest cent.
    pub fn average(&self) -> Totals {
        let months = TRAILING_MONTHS as i128;
        Totals {
            actual_cents: div_round_half_away(i128::from(self.actual_cents), months) as i64,
            budgeted_cents: div_round_half_away(i128::from(self.budgeted_cents), months) as i64,
        }
    }

    /// Compact rendering of the average difference (`+€25`).
    pub fn compact_difference(&self, symbol: &str) -> String {
        let difference = self.difference_cents();
        let text = format_compact(difference, symbol);
        if difference > 0 {
            format!("+{text}")
        } else {
            text
        }
    }
}

/// Cell values over the trailing window, kept in step with saved budgets.
#[derive(Debug, Clone, Default)]
pub struct TotalsTable {
    months: Vec<Month>,
    cells: HashMap<CellKey, BudgetCell>,
}

impl TotalsTable {
    /// Table for the window ending at `end`, filled from stored values.
    pub fn new(end: Month, values: impl IntoIterator<Item = (CellKey, BudgetCell)>) -> Self {
        let months = trailing_months(end);
        let cells = values
            .into_iter()
            .filter(|(key, _)| months.contains(&key.month))
            .collect();
        Self { months, cells }
    }

    /// Table from a snapshot loaded for at least the trailing window.
    pub fn from_snapshot(end: Month, snapshot: &LedgerSnapshot) -> Self {
        Self::new(end, snapshot.cells.iter().cloned())
    }

    /// Window months.
    pub fn months(&self) -> &[Month] {
        &self.months
    }

    /// Reflect a saved budget; ignored outside the window.
    pub fn record_budget(&mut self, key: &CellKey, budgeted_cents: i64) {
        if self.months.contains(&key.month) {
            self.cells.entry(key.clone()).or_default().budgeted_cents = budgeted_cents;
        }
    }

    /// Totals for one category.
    pub fn row(&self, category: &CategoryId) -> Totals {
        let mut totals = Totals::default();
        for month in &self.months {
            if let Some(cell) = self.cells.get(&CellKey::new(category.clone(), *month)) {
                totals.add_cell(cell);
            }
        }
        totals
    }

    /// Totals over several categories (a section or the whole grid).
    pub fn sum<'a>(&self, categories: impl IntoIterator<Item = &'a Category>) -> Totals {
        let mut totals = Totals::default();
        for category in categories {
            totals.add(self.row(&category.id));
        }
        totals
    }
}
