//! Cell context menu and the future-months prompt it opens.

use crate::{
    bulk::{compute_preview, MutationPreview, MutationRequest, Operation},
    error::{MutationError, ValidationError},
    grid::BudgetGrid,
    models::CellKey,
    money::{parse_cents, parse_percent},
};

/// Entries of the cell context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    /// Open the inline editor.
    EditThisMonth,
    /// Prompt for an amount applied to this and later months.
    SetFutureMonths,
    /// Prompt for a percentage applied to this and later months.
    IncreaseFutureMonths,
}

impl MenuAction {
    /// Menu text.
    pub fn label(&self) -> &'static str {
        match self {
            MenuAction::EditThisMonth => "Edit this month",
            MenuAction::SetFutureMonths => "Set for all future months...",
            MenuAction::IncreaseFutureMonths => "Increase future months by %...",
        }
    }
}

/// Open context menu anchored on one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextMenu {
    target: CellKey,
    anchor: (u16, u16),
    highlighted: Option<usize>,
}

impl ContextMenu {
    /// Entries in display order.
    pub const ITEMS: [MenuAction; 3] = [
        MenuAction::EditThisMonth,
        MenuAction::SetFutureMonths,
        MenuAction::IncreaseFutureMonths,
    ];

    /// Menu for `target` drawn at `anchor`, nothing highlighted.
    pub fn new(target: CellKey, anchor: (u16, u16)) -> Self {
        Self {
            target,
            anchor,
            highlighted: None,
        }
    }

    /// Cell the menu acts on.
    pub fn target(&self) -> &CellKey {
        &self.target
    }

    /// Highlighted entry index.
    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    /// Arrow Down; wraps past the last entry.
    pub fn highlight_next(&mut self) {
        self.highlighted = Some(match self.highlighted {
            Some(index) => (index + 1) % Self::ITEMS.len(),
            None => 0,
        });
    }

    /// Arrow Up; wraps past the first entry.
    pub fn highlight_previous(&mut self) {
        self.highlighted = Some(match self.highlighted {
            Some(0) | None => Self::ITEMS.len() - 1,
            Some(index) => index - 1,
        });
    }

    /// Mouse hover.
    pub fn highlight(&mut self, index: usize) {
        if index < Self::ITEMS.len() {
            self.highlighted = Some(index);
        }
    }

    /// Enter: the highlighted entry, if any.
    pub fn activate(&self) -> Option<MenuAction> {
        self.highlighted.map(|index| Self::ITEMS[index])
    }

    /// Top-left corner that keeps a `size` box inside `viewport`.
    pub fn position(&self, size: (u16, u16), viewport: (u16, u16)) -> (u16, u16) {
        let (x, y) = self.anchor;
        let x = if x.saturating_add(size.0) > viewport.0 {
            viewport.0.saturating_sub(size.0)
        } else {
            x
        };
        let y = if y.saturating_add(size.1) > viewport.1 {
            viewport.1.saturating_sub(size.1)
        } else {
            y
        };
        (x, y)
    }
}

/// Value kind asked for by the future-months prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureAction {
    /// A fixed amount.
    SetAmount,
    /// A percentage change.
    IncreasePercent,
}

/// Input form opened from the context menu.
#[derive(Debug, Clone, PartialEq)]
pub struct FuturePrompt {
    target: CellKey,
    action: FutureAction,
    input: String,
    error: Option<ValidationError>,
    preview: MutationPreview,
}

impl FuturePrompt {
    /// Empty prompt for `target`.
    pub fn new(target: CellKey, action: FutureAction) -> Self {
        Self {
            target,
            action,
            input: String::new(),
            error: None,
            preview: MutationPreview::default(),
        }
    }

    /// Title line.
    pub fn title(&self) -> &'static str {
        match self.action {
            FutureAction::SetAmount => "Set for all future months",
            FutureAction::IncreasePercent => "Increase future months by %",
        }
    }

    /// Cell the prompt was opened on.
    pub fn target(&self) -> &CellKey {
        &self.target
    }

    /// Requested value kind.
    pub fn action(&self) -> FutureAction {
        self.action
    }

    /// Raw input.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Validation error of the current input.
    pub fn error(&self) -> Option<ValidationError> {
        self.error
    }

    /// Live preview of the current input.
    pub fn preview(&self) -> &MutationPreview {
        &self.preview
    }

    /// Type one character.
    pub fn insert_char(&mut self, grid: &BudgetGrid, ch: char) {
        self.input.push(ch);
        self.refresh(grid);
    }

    /// Delete the last character.
    pub fn backspace(&mut self, grid: &BudgetGrid) {
        self.input.pop();
        self.refresh(grid);
    }

    /// Replace the whole input.
    pub fn set_input(&mut self, grid: &BudgetGrid, text: &str) {
        self.input = text.to_string();
        self.refresh(grid);
    }

    fn operation(&self) -> Result<Operation, ValidationError> {
        match self.action {
            FutureAction::SetAmount => {
                if self.input.trim().is_empty() {
                    return Err(ValidationError::NotANumber);
                }
                parse_cents(&self.input).map(Operation::SetAmount)
            }
            FutureAction::IncreasePercent => parse_percent(&self.input).map(Operation::IncreasePercent),
        }
    }

    fn refresh(&mut self, grid: &BudgetGrid) {
        match self.operation() {
            Ok(operation) => {
                self.error = None;
                self.preview = compute_preview(
                    grid,
                    &MutationRequest::future_months(grid, &self.target, operation),
                );
            }
            Err(err) => {
                self.error = (!self.input.trim().is_empty()).then_some(err);
                self.preview = MutationPreview::default();
            }
        }
    }

    /// Whether Apply is enabled.
    pub fn can_apply(&self) -> bool {
        self.error.is_none() && !self.preview.is_empty()
    }

    /// Request for the current input.
    pub fn request(&self, grid: &BudgetGrid) -> Result<MutationRequest, MutationError> {
        let operation = self.operation()?;
        let request = MutationRequest::future_months(grid, &self.target, operation);
        if request.months.is_empty() {
            return Err(MutationError::EmptyScope);
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Category, CategoryKind},
        month::Month,
    };

    fn m(s: &str) -> Month {
        s.parse().expect("valid month")
    }

    fn grid() -> BudgetGrid {
        let mut grid = BudgetGrid::new(
            vec![Category::new("food", "Food", CategoryKind::Expense)],
            m("2025-01").range_to(m("2025-04")),
        );
        for month in m("2025-01").range_to(m("2025-04")) {
            grid.set_budget(&CellKey::new("food", month), 40_000);
        }
        grid
    }

    #[test]
    fn highlight_wraps_both_ways() {
        let mut menu = ContextMenu::new(CellKey::new("food", m("2025-01")), (0, 0));
        assert_eq!(menu.activate(), None);
        menu.highlight_previous();
        assert_eq!(menu.activate(), Some(MenuAction::IncreaseFutureMonths));
        menu.highlight_next();
        assert_eq!(menu.activate(), Some(MenuAction::EditThisMonth));
        for _ in 0..3 {
            menu.highlight_next();
        }
        assert_eq!(menu.highlighted(), Some(0));
    }

    #[test]
    fn position_stays_inside_viewport() {
        let menu = ContextMenu::new(CellKey::new("food", m("2025-01")), (70, 20));
        assert_eq!(menu.position((30, 5), (80, 24)), (50, 19));
        assert_eq!(menu.position((5, 2), (80, 24)), (70, 20));
    }

    #[test]
    fn percent_prompt_previews_future_months() -> anyhow::Result<()> {
        let grid = grid();
        let origin = CellKey::new("food", m("2025-02"));
        let mut prompt = FuturePrompt::new(origin, FutureAction::IncreasePercent);
        assert!(!prompt.can_apply());
        assert_eq!(prompt.error(), None);

        prompt.set_input(&grid, "2.5");
        assert!(prompt.can_apply());
        assert_eq!(prompt.preview().affected_count(), 3);
        assert!(prompt.preview().cells().iter().all(|c| c.after_cents == 41_000));

        let request = prompt.request(&grid)?;
        assert_eq!(request.months, m("2025-02").range_to(m("2025-04")));
        Ok(())
    }

    #[test]
    fn amount_prompt_rejects_negative_values() {
        let grid = grid();
        let mut prompt = FuturePrompt::new(CellKey::new("food", m("2025-01")), FutureAction::SetAmount);
        for ch in "-5".chars() {
            prompt.insert_char(&grid, ch);
        }
        assert_eq!(prompt.error(), Some(ValidationError::Negative));
        assert!(!prompt.can_apply());
        assert_eq!(
            prompt.request(&grid),
            Err(MutationError::InvalidValue(ValidationError::Negative))
        );
        prompt.backspace(&grid);
        prompt.backspace(&grid);
        prompt.insert_char(&grid, '5');
        assert!(prompt.can_apply());
    }
}
