//! In-memory cell table for the loaded category × month window.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    models::{BudgetCell, Category, CategoryId, CategoryKind, CellKey, CellUpdate},
    month::Month,
    status::{classify, status_class, StatusClass, StatusResult},
};

/// Direction of travel along a category row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Later months (Tab).
    Forward,
    /// Earlier months (Shift+Tab).
    Backward,
}

/// Loaded categories, months and their cells.
///
/// Mutated only through [`BudgetGrid::set_budget`] after a successful store
/// write; reads never wait on persistence.
#[derive(Debug, Clone, Default)]
pub struct BudgetGrid {
    months: Vec<Month>,
    categories: Vec<Category>,
    cells: HashMap<CellKey, BudgetCell>,
}

impl BudgetGrid {
    /// Build a grid; months are sorted chronologically and deduplicated.
    pub fn new(categories: Vec<Category>, mut months: Vec<Month>) -> Self {
        months.sort();
        months.dedup();
        let mut cells = HashMap::with_capacity(categories.len() * months.len());
        for category in &categories {
            for month in &months {
                cells.insert(CellKey::new(category.id.clone(), *month), BudgetCell::default());
            }
        }
        Self {
            months,
            categories,
            cells,
        }
    }

    /// Build a grid and populate it from stored values.
    pub fn with_cells(
        categories: Vec<Category>,
        months: Vec<Month>,
        values: impl IntoIterator<Item = (CellKey, BudgetCell)>,
    ) -> Self {
        let mut grid = Self::new(categories, months);
        for (key, cell) in values {
            if let Some(slot) = grid.cells.get_mut(&key) {
                *slot = cell;
            }
        }
        grid
    }

    /// Loaded months in chronological order.
    pub fn months(&self) -> &[Month] {
        &self.months
    }

    /// Category rows in display order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Look up a category row.
    pub fn category(&self, id: &CategoryId) -> Option<&Category> {
        self.categories.iter().find(|category| &category.id == id)
    }

    /// Kind of a category, defaulting to expense for unknown ids.
    pub fn kind_of(&self, id: &CategoryId) -> CategoryKind {
        self.category(id)
            .map(|category| category.kind)
            .unwrap_or_default()
    }

    /// Whether the key addresses a loaded cell.
    pub fn contains(&self, key: &CellKey) -> bool {
        self.cells.contains_key(key)
    }

    /// Cell values.
    pub fn cell(&self, key: &CellKey) -> Option<&BudgetCell> {
        self.cells.get(key)
    }

    /// Budgeted cents for a loaded cell.
    pub fn budgeted(&self, key: &CellKey) -> Option<i64> {
        self.cells.get(key).map(|cell| cell.budgeted_cents)
    }

    /// Store a committed budget value.
    pub fn set_budget(&mut self, key: &CellKey, budgeted_cents: i64) -> bool {
        match self.cells.get_mut(key) {
            Some(cell) => {
                cell.budgeted_cents = budgeted_cents;
                true
            }
            None => false,
        }
    }

    /// Apply committed updates, ignoring cells outside the window.
    pub fn apply_updates<'a>(&mut self, updates: impl IntoIterator<Item = &'a CellUpdate>) {
        for update in updates {
            self.set_budget(&update.key, update.budgeted_cents);
        }
    }

    /// Replace the observed actual for a cell.
    pub fn set_actual(&mut self, key: &CellKey, actual_cents: i64) -> bool {
        match self.cells.get_mut(key) {
            Some(cell) => {
                cell.actual_cents = actual_cents;
                true
            }
            None => false,
        }
    }

    /// Status computed from the current values.
    pub fn status(&self, key: &CellKey) -> Option<StatusResult> {
        let cell = self.cells.get(key)?;
        Some(classify(
            cell.actual_cents,
            cell.budgeted_cents,
            self.kind_of(&key.category),
        ))
    }

    /// Color class computed from the current values.
    pub fn status_class(&self, key: &CellKey) -> StatusClass {
        self.status(key)
            .map(|result| status_class(result.status, self.kind_of(&key.category)))
            .unwrap_or(StatusClass::None)
    }

    /// Next loaded month in the same row, by calendar order.
    pub fn neighbor_in_row(&self, key: &CellKey, direction: Direction) -> Option<CellKey> {
        if !self.contains(key) {
            return None;
        }
        let month = match direction {
            Direction::Forward => self.months.iter().find(|month| **month > key.month),
            Direction::Backward => self.months.iter().rev().find(|month| **month < key.month),
        }?;
        let next = CellKey::new(key.category.clone(), *month);
        debug!(from = %key, to = %next, "row neighbor resolved");
        Some(next)
    }

    /// Next cell in reading order (row by row), used when no edit is open.
    pub fn neighbor_in_document(&self, key: &CellKey, direction: Direction) -> Option<CellKey> {
        let order = self.document_order();
        let index = order.iter().position(|candidate| candidate == key)?;
        match direction {
            Direction::Forward => order.get(index + 1).cloned(),
            Direction::Backward => index.checked_sub(1).and_then(|i| order.get(i).cloned()),
        }
    }

    /// Adjacent category row at the same month.
    pub fn neighbor_in_column(&self, key: &CellKey, direction: Direction) -> Option<CellKey> {
        let index = self
            .categories
            .iter()
            .position(|category| category.id == key.category)?;
        let target = match direction {
            Direction::Forward => self.categories.get(index + 1),
            Direction::Backward => index.checked_sub(1).and_then(|i| self.categories.get(i)),
        }?;
        Some(CellKey::new(target.id.clone(), key.month))
    }

    /// First cell of the grid, if any.
    pub fn first_cell(&self) -> Option<CellKey> {
        let category = self.categories.first()?;
        let month = self.months.first()?;
        Some(CellKey::new(category.id.clone(), *month))
    }

    fn document_order(&self) -> Vec<CellKey> {
        self.categories
            .iter()
            .flat_map(|category| {
                self.months
                    .iter()
                    .map(move |month| CellKey::new(category.id.clone(), *month))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Month {
        s.parse().expect("valid month")
    }

    fn sample() -> BudgetGrid {
        BudgetGrid::new(
            vec![
                Category::new("rent", "Rent", CategoryKind::Expense),
                Category::new("salary", "Salary", CategoryKind::Income),
            ],
            // deliberately out of order
            vec![m("2025-03"), m("2025-01"), m("2025-02")],
        )
    }

    #[test]
    fn months_are_kept_in_calendar_order() {
        let grid = sample();
        assert_eq!(grid.months(), &[m("2025-01"), m("2025-02"), m("2025-03")]);
        assert!(grid.contains(&CellKey::new("rent", m("2025-02"))));
        assert!(!grid.contains(&CellKey::new("rent", m("2025-04"))));
    }

    #[test]
    fn row_neighbors_follow_months() {
        let grid = sample();
        let key = CellKey::new("rent", m("2025-02"));
        assert_eq!(
            grid.neighbor_in_row(&key, Direction::Forward),
            Some(CellKey::new("rent", m("2025-03")))
        );
        assert_eq!(
            grid.neighbor_in_row(&key, Direction::Backward),
            Some(CellKey::new("rent", m("2025-01")))
        );
        let last = CellKey::new("rent", m("2025-03"));
        assert_eq!(grid.neighbor_in_row(&last, Direction::Forward), None);
    }

    #[test]
    fn document_order_wraps_rows() {
        let grid = sample();
        let last_of_row = CellKey::new("rent", m("2025-03"));
        assert_eq!(
            grid.neighbor_in_document(&last_of_row, Direction::Forward),
            Some(CellKey::new("salary", m("2025-01")))
        );
    }

    #[test]
    fn status_reflects_committed_values() {
        let mut grid = sample();
        let key = CellKey::new("rent", m("2025-01"));
        assert_eq!(grid.status_class(&key), StatusClass::None);
        grid.set_actual(&key, -50_000);
        grid.set_budget(&key, 100_000);
        assert_eq!(grid.status_class(&key), StatusClass::Success);
        grid.set_budget(&key, 40_000);
        assert_eq!(grid.status_class(&key), StatusClass::Danger);
    }
}
