//! Batch adjustment form: category, range and operation selection with a
//! live preview.

use tracing::debug;

use crate::{
    bulk::{compute_preview, CategoryScope, MutationPreview, MutationRequest, Operation, PreviewCell},
    error::{MutationError, RangeError, ValidationError},
    grid::BudgetGrid,
    models::{Category, CategoryId},
    money::{parse_cents, parse_percent, Percent},
    month::Month,
    range::BatchRange,
};

/// Operation choices of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Fixed amount.
    SetAmount,
    /// Percentage up.
    IncreasePercent,
    /// Percentage down.
    DecreasePercent,
    /// Predecessor's budget.
    CopyFromPrevious,
}

impl OperationKind {
    /// Choices in display order.
    pub const ALL: [OperationKind; 4] = [
        OperationKind::SetAmount,
        OperationKind::IncreasePercent,
        OperationKind::DecreasePercent,
        OperationKind::CopyFromPrevious,
    ];

    /// Selector text.
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::SetAmount => "Set amount",
            OperationKind::IncreasePercent => "Increase by %",
            OperationKind::DecreasePercent => "Decrease by %",
            OperationKind::CopyFromPrevious => "Copy from previous period",
        }
    }

    /// Whether the operation reads the value input.
    pub fn needs_value(&self) -> bool {
        !matches!(self, OperationKind::CopyFromPrevious)
    }
}

/// Checkbox state of a group of categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Nothing selected.
    None,
    /// Some selected.
    Partial,
    /// Everything selected.
    All,
}

/// Selected/total counter for a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSummary {
    /// Section name, `None` for the global counter.
    pub section: Option<String>,
    /// Selected rows.
    pub selected: usize,
    /// Selectable rows.
    pub total: usize,
}

impl SelectionSummary {
    /// `1 of 2 selected`.
    pub fn label(&self) -> String {
        format!("{} of {} selected", self.selected, self.total)
    }

    /// Checkbox state.
    pub fn state(&self) -> Selection {
        match self.selected {
            0 => Selection::None,
            n if n == self.total => Selection::All,
            _ => Selection::Partial,
        }
    }
}

/// Line of the category checklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecklistRow {
    /// "All categories".
    All,
    /// Section header.
    Section(String),
    /// One category, by index into the form's categories.
    Category(usize),
}

/// Part of the form that receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalFocus {
    /// Category checklist.
    Categories,
    /// Month range selector.
    Range,
    /// Operation selector.
    Operation,
    /// Amount or percentage input.
    Value,
}

impl ModalFocus {
    fn next(self) -> Self {
        match self {
            ModalFocus::Categories => ModalFocus::Range,
            ModalFocus::Range => ModalFocus::Operation,
            ModalFocus::Operation => ModalFocus::Value,
            ModalFocus::Value => ModalFocus::Categories,
        }
    }

    fn previous(self) -> Self {
        match self {
            ModalFocus::Categories => ModalFocus::Value,
            ModalFocus::Range => ModalFocus::Categories,
            ModalFocus::Operation => ModalFocus::Range,
            ModalFocus::Value => ModalFocus::Operation,
        }
    }
}

/// State of an open batch adjustment form.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchModal {
    today: Month,
    categories: Vec<Category>,
    selected: Vec<bool>,
    range: BatchRange,
    range_error: Option<RangeError>,
    operation: OperationKind,
    value: String,
    value_error: Option<ValidationError>,
    preview: MutationPreview,
    show_all: bool,
    busy: bool,
    failure: Option<String>,
    focus: ModalFocus,
    row: usize,
}

impl BatchModal {
    /// Fresh form: nothing selected, next three months, set amount.
    pub fn open(grid: &BudgetGrid, today: Month) -> Self {
        let categories = grid.categories().to_vec();
        let selected = vec![false; categories.len()];
        let mut modal = Self {
            today,
            categories,
            selected,
            range: BatchRange::Next3,
            range_error: None,
            operation: OperationKind::SetAmount,
            value: String::new(),
            value_error: None,
            preview: MutationPreview::default(),
            show_all: false,
            busy: false,
            failure: None,
            focus: ModalFocus::Categories,
            row: 0,
        };
        modal.refresh(grid);
        modal
    }

    /// Categories offered, in grid order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Whether the category at `index` is selected.
    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.get(index).copied().unwrap_or(false)
    }

    /// Flip one category.
    pub fn toggle_category(&mut self, grid: &BudgetGrid, id: &CategoryId) {
        if let Some(index) = self.categories.iter().position(|c| &c.id == id) {
            self.selected[index] = !self.selected[index];
            self.refresh(grid);
        }
    }

    /// "All categories": select everything, or clear when all are selected.
    pub fn toggle_all(&mut self, grid: &BudgetGrid) {
        let target = self.global_summary().state() != Selection::All;
        self.selected.iter_mut().for_each(|flag| *flag = target);
        self.refresh(grid);
    }

    /// Section header: select its rows, or clear them when all are selected.
    pub fn toggle_section(&mut self, grid: &BudgetGrid, section: &str) {
        let target = self.section_summary(section).state() != Selection::All;
        for (category, flag) in self.categories.iter().zip(self.selected.iter_mut()) {
            if category.section.as_deref() == Some(section) {
                *flag = target;
            }
        }
        self.refresh(grid);
    }

    /// Section names in first-appearance order.
    pub fn sections(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for category in &self.categories {
            if let Some(section) = &category.section {
                if !names.contains(section) {
                    names.push(section.clone());
                }
            }
        }
        names
    }

    /// Counter for one section.
    pub fn section_summary(&self, section: &str) -> SelectionSummary {
        let (selected, total) = self
            .categories
            .iter()
            .zip(&self.selected)
            .filter(|(category, _)| category.section.as_deref() == Some(section))
            .fold((0, 0), |(sel, tot), (_, flag)| (sel + usize::from(*flag), tot + 1));
        SelectionSummary {
            section: Some(section.to_string()),
            selected,
            total,
        }
    }

    /// Counter over every category.
    pub fn global_summary(&self) -> SelectionSummary {
        SelectionSummary {
            section: None,
            selected: self.selected.iter().filter(|flag| **flag).count(),
            total: self.selected.len(),
        }
    }

    /// Checklist lines: "All", then each section header followed by its rows,
    /// then rows without a section.
    pub fn checklist(&self) -> Vec<ChecklistRow> {
        let mut rows = vec![ChecklistRow::All];
        for section in self.sections() {
            let members: Vec<usize> = self
                .categories
                .iter()
                .enumerate()
                .filter(|(_, c)| c.section.as_deref() == Some(section.as_str()))
                .map(|(index, _)| index)
                .collect();
            rows.push(ChecklistRow::Section(section));
            rows.extend(members.into_iter().map(ChecklistRow::Category));
        }
        rows.extend(
            self.categories
                .iter()
                .enumerate()
                .filter(|(_, c)| c.section.is_none())
                .map(|(index, _)| ChecklistRow::Category(index)),
        );
        rows
    }

    /// Selected month window.
    pub fn range(&self) -> BatchRange {
        self.range
    }

    /// Range error, which disables Apply.
    pub fn range_error(&self) -> Option<RangeError> {
        self.range_error
    }

    /// Months the current range resolves to (empty when invalid).
    pub fn months(&self) -> Vec<Month> {
        self.range.resolve(self.today).unwrap_or_default()
    }

    /// Pick a month window.
    pub fn select_range(&mut self, grid: &BudgetGrid, range: BatchRange) {
        self.range = range;
        self.refresh(grid);
    }

    /// Grow or shrink the window's end, switching to a custom range.
    pub fn extend_range(&mut self, grid: &BudgetGrid, delta: i32) {
        let (start, end) = match self.range {
            BatchRange::Custom { start, end } => (start, end),
            preset => {
                let months = preset.resolve(self.today).unwrap_or_default();
                let end = months.last().copied().unwrap_or(self.today);
                (self.today, end)
            }
        };
        let end = end.offset(delta);
        self.select_range(grid, BatchRange::Custom { start, end });
    }

    /// Selected operation.
    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    /// Pick an operation; the value input is kept.
    pub fn select_operation(&mut self, grid: &BudgetGrid, operation: OperationKind) {
        self.operation = operation;
        self.refresh(grid);
    }

    /// Raw value input.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Value validation error.
    pub fn value_error(&self) -> Option<ValidationError> {
        self.value_error
    }

    /// Replace the value input.
    pub fn set_value(&mut self, grid: &BudgetGrid, text: &str) {
        self.value = text.to_string();
        self.refresh(grid);
    }

    /// Type into the value input.
    pub fn insert_char(&mut self, grid: &BudgetGrid, ch: char) {
        self.value.push(ch);
        self.refresh(grid);
    }

    /// Delete from the value input.
    pub fn backspace(&mut self, grid: &BudgetGrid) {
        self.value.pop();
        self.refresh(grid);
    }

    /// Live preview.
    pub fn preview(&self) -> &MutationPreview {
        &self.preview
    }

    /// `N cells affected`.
    pub fn preview_label(&self) -> String {
        match self.preview.affected_count() {
            1 => "1 cell affected".to_string(),
            n => format!("{n} cells affected"),
        }
    }

    /// Rows to list and how many are hidden behind "...and N more".
    pub fn visible_preview(&self, limit: usize) -> (&[PreviewCell], usize) {
        if self.show_all {
            (self.preview.cells(), 0)
        } else {
            self.preview.head(limit)
        }
    }

    /// "Show N more".
    pub fn show_all(&mut self) {
        self.show_all = true;
    }

    /// Whether Apply is enabled.
    pub fn can_apply(&self) -> bool {
        !self.busy
            && self.range_error.is_none()
            && self.value_error.is_none()
            && self.operation_value().is_ok()
            && !self.preview.is_empty()
    }

    /// Whether an apply is waiting on the store.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Mark the form busy while the store works.
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Store failure kept on the form so the user can retry.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Record or clear a store failure.
    pub fn set_failure(&mut self, failure: Option<String>) {
        self.failure = failure;
    }

    /// Request for the current inputs.
    pub fn request(&self) -> Result<MutationRequest, MutationError> {
        let months = self.range.resolve(self.today)?;
        let operation = self.operation_value()?;
        let ids: Vec<CategoryId> = self
            .categories
            .iter()
            .zip(&self.selected)
            .filter(|(_, flag)| **flag)
            .map(|(category, _)| category.id.clone())
            .collect();
        let categories = if !ids.is_empty() && ids.len() == self.categories.len() {
            CategoryScope::All
        } else {
            CategoryScope::Only(ids)
        };
        Ok(MutationRequest {
            categories,
            months,
            operation,
        })
    }

    fn operation_value(&self) -> Result<Operation, ValidationError> {
        let raw = self.value.trim();
        match self.operation {
            OperationKind::CopyFromPrevious => Ok(Operation::CopyFromPrevious),
            _ if raw.is_empty() => Err(ValidationError::NotANumber),
            OperationKind::SetAmount => parse_cents(raw).map(Operation::SetAmount),
            OperationKind::IncreasePercent => magnitude(raw).map(Operation::IncreasePercent),
            OperationKind::DecreasePercent => magnitude(raw).map(Operation::DecreasePercent),
        }
    }

    fn refresh(&mut self, grid: &BudgetGrid) {
        self.range_error = self.range.resolve(self.today).err();
        self.value_error = match self.operation_value() {
            Err(err) if !self.value.trim().is_empty() => Some(err),
            _ => None,
        };
        // without a usable value the scope still counts, unchanged
        let operation = self
            .operation_value()
            .unwrap_or(Operation::IncreasePercent(Default::default()));
        self.preview = match self.request_with(operation) {
            Some(request) => compute_preview(grid, &request),
            None => MutationPreview::default(),
        };
        self.show_all = false;
        debug!(affected = self.preview.affected_count(), "batch preview refreshed");
    }

    fn request_with(&self, operation: Operation) -> Option<MutationRequest> {
        let months = self.range.resolve(self.today).ok()?;
        let ids = self
            .categories
            .iter()
            .zip(&self.selected)
            .filter(|(_, flag)| **flag)
            .map(|(category, _)| category.id.clone())
            .collect();
        Some(MutationRequest {
            categories: CategoryScope::Only(ids),
            months,
            operation,
        })
    }

    /// Field receiving keys.
    pub fn focus(&self) -> ModalFocus {
        self.focus
    }

    /// Tab inside the form.
    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    /// Shift+Tab inside the form.
    pub fn focus_previous(&mut self) {
        self.focus = self.focus.previous();
    }

    /// Highlighted checklist line.
    pub fn checklist_row(&self) -> usize {
        self.row
    }

    /// Move the checklist highlight.
    pub fn move_row(&mut self, delta: isize) {
        let len = self.checklist().len() as isize;
        if len == 0 {
            return;
        }
        self.row = (self.row as isize + delta).rem_euclid(len) as usize;
    }

    /// Space on the highlighted checklist line.
    pub fn toggle_row(&mut self, grid: &BudgetGrid) {
        match self.checklist().get(self.row).cloned() {
            Some(ChecklistRow::All) => self.toggle_all(grid),
            Some(ChecklistRow::Section(name)) => self.toggle_section(grid, &name),
            Some(ChecklistRow::Category(index)) => {
                if let Some(id) = self.categories.get(index).map(|c| c.id.clone()) {
                    self.toggle_category(grid, &id);
                }
            }
            None => {}
        }
    }

    /// Step through the preset ranges.
    pub fn cycle_range(&mut self, grid: &BudgetGrid, forward: bool) {
        let presets = BatchRange::PRESETS;
        let index = presets.iter().position(|p| *p == self.range);
        let next = match (index, forward) {
            (Some(i), true) => presets[(i + 1) % presets.len()],
            (Some(i), false) => presets[(i + presets.len() - 1) % presets.len()],
            (None, _) => presets[0],
        };
        self.select_range(grid, next);
    }

    /// Step through the operations.
    pub fn cycle_operation(&mut self, grid: &BudgetGrid, forward: bool) {
        let all = OperationKind::ALL;
        let i = all.iter().position(|op| *op == self.operation).unwrap_or(0);
        let next = if forward {
            all[(i + 1) % all.len()]
        } else {
            all[(i + all.len() - 1) % all.len()]
        };
        self.select_operation(grid, next);
    }
}

/// Percent for an operation whose name already carries the direction.
fn magnitude(raw: &str) -> Result<Percent, ValidationError> {
    let percent = parse_percent(raw)?;
    if percent.hundredths() < 0 {
        return Err(ValidationError::Negative);
    }
    Ok(percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryKind, CellKey};

    fn m(s: &str) -> Month {
        s.parse().expect("valid month")
    }

    fn grid() -> BudgetGrid {
        let categories = vec![
            Category::new("salary", "Salary", CategoryKind::Income).in_section("Income"),
            Category::new("rent", "Rent", CategoryKind::Expense).in_section("Housing"),
            Category::new("utilities", "Utilities", CategoryKind::Expense).in_section("Housing"),
            Category::new("misc", "Misc", CategoryKind::Expense),
        ];
        let mut grid = BudgetGrid::new(categories, m("2025-01").range_to(m("2025-12")));
        for month in m("2025-01").range_to(m("2025-12")) {
            grid.set_budget(&CellKey::new("rent", month), 40_000);
        }
        grid
    }

    #[test]
    fn opens_with_defaults_and_empty_preview() {
        let grid = grid();
        let modal = BatchModal::open(&grid, m("2025-03"));
        assert_eq!(modal.global_summary().label(), "0 of 4 selected");
        assert_eq!(modal.preview_label(), "0 cells affected");
        assert_eq!(modal.range(), BatchRange::Next3);
        assert_eq!(modal.operation(), OperationKind::SetAmount);
        assert!(!modal.can_apply());
    }

    #[test]
    fn all_categories_next_three_months_set_amount() -> anyhow::Result<()> {
        let grid = grid();
        let mut modal = BatchModal::open(&grid, m("2025-03"));
        modal.toggle_all(&grid);
        assert_eq!(modal.preview().affected_count(), 3 * 4);
        assert!(!modal.can_apply());

        modal.set_value(&grid, "500.00");
        assert!(modal.can_apply());
        assert!(modal.preview().cells().iter().all(|c| c.after_cents == 50_000));
        let request = modal.request()?;
        assert_eq!(request.categories, CategoryScope::All);
        assert_eq!(request.months, m("2025-03").range_to(m("2025-05")));
        Ok(())
    }

    #[test]
    fn section_header_toggles_its_members() {
        let grid = grid();
        let mut modal = BatchModal::open(&grid, m("2025-03"));
        assert_eq!(modal.section_summary("Housing").label(), "0 of 2 selected");
        modal.toggle_category(&grid, &CategoryId::from("rent"));
        assert_eq!(modal.section_summary("Housing").state(), Selection::Partial);
        modal.toggle_section(&grid, "Housing");
        assert_eq!(modal.section_summary("Housing").label(), "2 of 2 selected");
        modal.toggle_section(&grid, "Housing");
        assert_eq!(modal.section_summary("Housing").state(), Selection::None);
        assert_eq!(modal.global_summary().selected, 0);
    }

    #[test]
    fn operation_change_keeps_value_and_updates_preview() {
        let grid = grid();
        let mut modal = BatchModal::open(&grid, m("2025-01"));
        modal.toggle_category(&grid, &CategoryId::from("rent"));
        modal.set_value(&grid, "10");
        modal.select_operation(&grid, OperationKind::DecreasePercent);
        assert_eq!(modal.value(), "10");
        assert!(modal.preview().cells().iter().all(|c| c.after_cents == 36_000));
        modal.select_operation(&grid, OperationKind::IncreasePercent);
        assert!(modal.preview().cells().iter().all(|c| c.after_cents == 44_000));
    }

    #[test]
    fn signed_percent_is_rejected_for_directional_operations() {
        let grid = grid();
        let mut modal = BatchModal::open(&grid, m("2025-01"));
        modal.toggle_category(&grid, &CategoryId::from("rent"));
        modal.select_operation(&grid, OperationKind::DecreasePercent);
        modal.set_value(&grid, "-10");
        assert_eq!(modal.value_error(), Some(ValidationError::Negative));
        assert!(!modal.can_apply());
        assert!(modal.preview().cells().iter().all(|c| c.after_cents == 40_000));

        modal.select_operation(&grid, OperationKind::IncreasePercent);
        assert_eq!(modal.value_error(), Some(ValidationError::Negative));
        assert!(!modal.can_apply());

        modal.set_value(&grid, "0");
        assert_eq!(modal.value_error(), None);
        assert!(modal.can_apply());
    }

    #[test]
    fn oversized_custom_range_disables_apply() {
        let grid = grid();
        let mut modal = BatchModal::open(&grid, m("2025-01"));
        modal.toggle_all(&grid);
        modal.set_value(&grid, "1");
        assert!(modal.can_apply());
        modal.select_range(
            &grid,
            BatchRange::Custom {
                start: m("2025-01"),
                end: m("2028-01"),
            },
        );
        assert_eq!(
            modal.range_error(),
            Some(RangeError::ExceedsMaxMonths { months: 37, max: 36 })
        );
        assert!(!modal.can_apply());
        assert!(matches!(modal.request(), Err(MutationError::Range(_))));
    }

    #[test]
    fn preview_shows_first_rows_then_the_rest() {
        let grid = grid();
        let mut modal = BatchModal::open(&grid, m("2025-01"));
        modal.toggle_category(&grid, &CategoryId::from("rent"));
        modal.select_range(&grid, BatchRange::Next6);
        let (rows, more) = modal.visible_preview(5);
        assert_eq!((rows.len(), more), (5, 1));
        modal.show_all();
        assert_eq!(modal.visible_preview(5), (modal.preview().cells(), 0));
    }

    #[test]
    fn checklist_groups_sections() {
        let grid = grid();
        let modal = BatchModal::open(&grid, m("2025-01"));
        assert_eq!(
            modal.checklist(),
            vec![
                ChecklistRow::All,
                ChecklistRow::Section("Income".to_string()),
                ChecklistRow::Category(0),
                ChecklistRow::Section("Housing".to_string()),
                ChecklistRow::Category(1),
                ChecklistRow::Category(2),
                ChecklistRow::Category(3),
            ]
        );
    }

    #[test]
    fn copy_from_previous_needs_no_value() {
        let grid = grid();
        let mut modal = BatchModal::open(&grid, m("2025-02"));
        modal.toggle_category(&grid, &CategoryId::from("rent"));
        modal.select_operation(&grid, OperationKind::CopyFromPrevious);
        assert!(modal.can_apply());
    }
}
