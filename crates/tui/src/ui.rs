//! Rendering of the budget grid and its popups.

use budgetgrid_core::{
    bulk::PreviewCell,
    cell::CellState,
    detail::{DetailState, ExpansionDetail},
    grid::BudgetGrid,
    menu::{ContextMenu, FutureAction, FuturePrompt},
    modal::{BatchModal, ChecklistRow, ModalFocus, OperationKind, Selection},
    models::{Category, CategoryId, CellKey},
    money::{format_compact, format_currency},
    month::Month,
    shortcuts::{self, PointerTarget, ShortcutGroup},
    tooltip::Difference,
    totals::Totals,
    view::{BudgetView, InteractionMode},
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::theme::Theme;

const NAME_WIDTH: u16 = 20;
const MONTH_WIDTH: u16 = 10;
const TOTALS_WIDTH: u16 = 34;
const DETAIL_HEIGHT: u16 = 13;
const STATUS_HEIGHT: u16 = 4;
const TOOLTIP_WIDTH: u16 = 32;

/// Scroll position of the grid, kept across frames.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    month_offset: usize,
    row_offset: usize,
}

impl Viewport {
    fn follow(&mut self, column: Option<usize>, row: Option<usize>, fits: (usize, usize), total: (usize, usize)) {
        self.month_offset = scroll_to(self.month_offset, column, fits.0, total.0);
        self.row_offset = scroll_to(self.row_offset, row, fits.1, total.1);
    }
}

fn scroll_to(offset: usize, target: Option<usize>, visible: usize, total: usize) -> usize {
    let visible = visible.max(1);
    let offset = match target {
        Some(index) if index < offset => index,
        Some(index) if index >= offset + visible => index + 1 - visible,
        _ => offset,
    };
    offset.min(total.saturating_sub(visible))
}

/// Screen regions of the last frame, used to resolve mouse positions.
#[derive(Debug, Default)]
pub struct HitMap {
    cells: Vec<(Rect, CellKey)>,
    tooltip: Option<Rect>,
    menu_items: Vec<Rect>,
    dialog: Option<Rect>,
    /// Bottom-left corner of the focused cell.
    pub cursor_anchor: Option<(u16, u16)>,
}

impl HitMap {
    pub fn target(&self, column: u16, row: u16) -> PointerTarget {
        if let Some(index) = self
            .menu_items
            .iter()
            .position(|rect| contains(*rect, column, row))
        {
            return PointerTarget::MenuItem(index);
        }
        if let Some(dialog) = self.dialog {
            return if contains(dialog, column, row) {
                PointerTarget::Dialog
            } else {
                PointerTarget::Outside
            };
        }
        if self.tooltip.is_some_and(|rect| contains(rect, column, row)) {
            return PointerTarget::Tooltip;
        }
        self.cells
            .iter()
            .find(|(rect, _)| contains(*rect, column, row))
            .map(|(_, key)| PointerTarget::Cell(key.clone()))
            .unwrap_or(PointerTarget::Outside)
    }

    fn cell_rect(&self, key: &CellKey) -> Option<Rect> {
        self.cells
            .iter()
            .find(|(_, cell)| cell == key)
            .map(|(rect, _)| *rect)
    }
}

fn contains(rect: Rect, column: u16, row: u16) -> bool {
    column >= rect.x && column < rect.right() && row >= rect.y && row < rect.bottom()
}

pub fn draw(
    frame: &mut Frame,
    view: &BudgetView,
    theme: &Theme,
    fallback_status: &str,
    viewport: &mut Viewport,
    hits: &mut HitMap,
) {
    *hits = HitMap::default();
    let area = frame.size();
    frame.render_widget(
        Block::default().style(Style::default().bg(theme.primary_bg).fg(theme.primary_fg)),
        area,
    );

    let detail_height = if view.detail().is_some() { DETAIL_HEIGHT } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(detail_height),
            Constraint::Length(STATUS_HEIGHT),
        ])
        .split(area);

    render_header(frame, chunks[0], view, theme);
    render_grid(frame, chunks[1], view, theme, viewport, hits);
    if let Some(detail) = view.detail() {
        render_detail(frame, chunks[2], detail, view, theme);
    }
    render_status(frame, chunks[3], view, theme, fallback_status);

    match view.mode() {
        InteractionMode::Grid => render_tooltip(frame, view, theme, hits),
        InteractionMode::ContextMenu(menu) => render_context_menu(frame, menu, theme, hits),
        InteractionMode::FuturePrompt(prompt) => render_future_prompt(frame, prompt, view, theme, hits),
        InteractionMode::BatchModal(modal) => render_batch_modal(frame, modal, view, theme, hits),
    }
}

fn render_header(frame: &mut Frame, area: Rect, view: &BudgetView, theme: &Theme) {
    let range = view.range();
    let line = Line::from(vec![
        Span::styled(
            range.preset().label(),
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::raw(range.range().label()),
        Span::styled(
            format!("  (totals: 12 months to {})", range.range().end().long_label()),
            Style::default().fg(theme.muted),
        ),
    ]);
    let paragraph = Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("budgetgrid"));
    frame.render_widget(paragraph, area);
}

enum GridRow<'a> {
    Section(&'a str),
    Category(&'a Category),
}

fn grid_rows(categories: &[Category]) -> Vec<GridRow<'_>> {
    let mut rows = Vec::with_capacity(categories.len());
    let mut last_section = None;
    for category in categories {
        let section = category.section.as_deref();
        if section.is_some() && section != last_section {
            rows.extend(section.map(GridRow::Section));
        }
        last_section = section;
        rows.push(GridRow::Category(category));
    }
    rows
}

fn render_grid(
    frame: &mut Frame,
    area: Rect,
    view: &BudgetView,
    theme: &Theme,
    viewport: &mut Viewport,
    hits: &mut HitMap,
) {
    let block = Block::default().borders(Borders::ALL).title("Budget");
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width < NAME_WIDTH + MONTH_WIDTH || inner.height < 3 {
        return;
    }

    let grid = view.grid();
    let months = grid.months();
    let rows = grid_rows(grid.categories());
    let totals_width = if inner.width >= NAME_WIDTH + MONTH_WIDTH + TOTALS_WIDTH {
        TOTALS_WIDTH
    } else {
        0
    };
    let month_slots = usize::from((inner.width - NAME_WIDTH - totals_width) / MONTH_WIDTH).max(1);
    let body_height = usize::from(inner.height - 2);

    let cursor = view.navigator().cursor();
    let cursor_column = cursor.and_then(|key| months.iter().position(|month| *month == key.month));
    let cursor_row = cursor.and_then(|key| {
        rows.iter()
            .position(|row| matches!(row, GridRow::Category(c) if c.id == key.category))
    });
    viewport.follow(
        cursor_column,
        cursor_row,
        (month_slots, body_height),
        (months.len(), rows.len()),
    );
    let visible_months: Vec<Month> = months
        .iter()
        .copied()
        .skip(viewport.month_offset)
        .take(month_slots)
        .collect();
    let totals_x = inner.right() - totals_width;
    let symbol = view.settings().currency_symbol.as_str();

    // header
    let today = view.range().today();
    let header_style = Style::default().fg(theme.muted).add_modifier(Modifier::BOLD);
    put(frame, Rect::new(inner.x, inner.y, NAME_WIDTH, 1), Span::styled("Category", header_style));
    for (slot, month) in visible_months.iter().enumerate() {
        let label = format!("{} {:02}", month.short_name(), month.year().rem_euclid(100));
        let style = if *month == today {
            header_style.fg(theme.accent)
        } else {
            header_style
        };
        put(
            frame,
            month_rect(inner, slot, inner.y),
            Span::styled(fit(&label, usize::from(MONTH_WIDTH) - 1), style),
        );
    }
    if totals_width > 0 {
        let label = format!(" {:>8} {:>8} {:>8} {:>5}", "12M act", "budget", "diff", "used");
        put(frame, Rect::new(totals_x, inner.y, totals_width, 1), Span::styled(label, header_style));
    }

    // body
    for (line, row) in rows
        .iter()
        .enumerate()
        .skip(viewport.row_offset)
        .take(body_height)
        .map(|(index, row)| (index - viewport.row_offset, row))
    {
        let y = inner.y + 1 + line as u16;
        match row {
            GridRow::Section(name) => put(
                frame,
                Rect::new(inner.x, y, inner.width, 1),
                Span::styled(
                    name.to_string(),
                    Style::default().fg(theme.accent_alt).add_modifier(Modifier::BOLD),
                ),
            ),
            GridRow::Category(category) => {
                put(
                    frame,
                    Rect::new(inner.x, y, NAME_WIDTH, 1),
                    Span::raw(truncate(&format!(" {}", category.name), usize::from(NAME_WIDTH) - 1)),
                );
                for (slot, month) in visible_months.iter().enumerate() {
                    let key = CellKey::new(category.id.clone(), *month);
                    let rect = month_rect(inner, slot, y);
                    let (text, style) = cell_text(view, &key, theme);
                    put(frame, rect, Span::styled(fit(&text, usize::from(MONTH_WIDTH) - 1), style));
                    if cursor == Some(&key) {
                        hits.cursor_anchor = Some((rect.x, rect.y + 1));
                    }
                    hits.cells.push((rect, key));
                }
                if totals_width > 0 {
                    let totals = view.totals().row(&category.id);
                    put_totals(frame, Rect::new(totals_x, y, totals_width, 1), &totals, symbol, theme, false);
                }
            }
        }
    }

    // grand total
    let y = inner.bottom() - 1;
    let bold = Style::default().add_modifier(Modifier::BOLD);
    put(frame, Rect::new(inner.x, y, NAME_WIDTH, 1), Span::styled(" Total", bold));
    for (slot, month) in visible_months.iter().enumerate() {
        let budgeted: i64 = grid
            .categories()
            .iter()
            .filter_map(|category| grid.budgeted(&CellKey::new(category.id.clone(), *month)))
            .sum();
        put(
            frame,
            month_rect(inner, slot, y),
            Span::styled(fit(&format_compact(budgeted, symbol), usize::from(MONTH_WIDTH) - 1), bold),
        );
    }
    if totals_width > 0 {
        let totals = view.totals().sum(grid.categories());
        put_totals(frame, Rect::new(totals_x, y, totals_width, 1), &totals, symbol, theme, true);
    }
}

fn month_rect(inner: Rect, slot: usize, y: u16) -> Rect {
    Rect::new(inner.x + NAME_WIDTH + slot as u16 * MONTH_WIDTH, y, MONTH_WIDTH, 1)
}

fn put(frame: &mut Frame, area: Rect, span: Span<'_>) {
    frame.render_widget(Paragraph::new(Line::from(span)), area);
}

fn put_totals(frame: &mut Frame, area: Rect, totals: &Totals, symbol: &str, theme: &Theme, bold: bool) {
    let base = if bold {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let line = Line::from(vec![
        Span::styled(
            format!(
                " {:>8} {:>8} ",
                format_compact(totals.actual_cents, symbol),
                format_compact(totals.budgeted_cents, symbol)
            ),
            base,
        ),
        Span::styled(
            format!("{:>8}", totals.compact_difference(symbol)),
            base.fg(theme.difference(totals.difference_class())),
        ),
        Span::styled(format!(" {:>4.0}%", totals.percent_used()), base.fg(theme.muted)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn cell_text(view: &BudgetView, key: &CellKey, theme: &Theme) -> (String, Style) {
    let cells = view.navigator().cells();
    match cells.state(key) {
        CellState::Editing(session) => {
            let mut style = Style::default()
                .fg(theme.selection_fg)
                .bg(theme.selection_bg)
                .add_modifier(Modifier::BOLD);
            if session.error().is_some() || session.persist_error().is_some() {
                style = style.fg(theme.danger);
            }
            let caret = if session.is_saving() { '…' } else { '▏' };
            (format!("{}{caret}", session.draft()), style)
        }
        state => {
            let grid = view.grid();
            let budgeted = grid.budgeted(key).unwrap_or_default();
            let mut style = Style::default().fg(theme.status(grid.status_class(key)));
            if matches!(state, CellState::Expanded) {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            if view.navigator().cursor() == Some(key) {
                style = style.bg(theme.selection_bg).add_modifier(Modifier::BOLD);
            }
            (format_compact(budgeted, &view.settings().currency_symbol), style)
        }
    }
}

/// Right-align into `width` columns, keeping the tail when too long.
fn fit(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count > width {
        text.chars().skip(count - width).collect()
    } else {
        format!("{text:>width$}")
    }
}

/// Left-align into `width` columns, eliding the end when too long.
fn truncate(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count > width && width > 0 {
        let mut cut: String = text.chars().take(width - 1).collect();
        cut.push('…');
        cut
    } else {
        format!("{text:<width$}")
    }
}

fn category_name<'a>(grid: &'a BudgetGrid, id: &'a CategoryId) -> &'a str {
    grid.category(id)
        .map(|category| category.name.as_str())
        .unwrap_or(id.as_str())
}

fn month_label(month: Month) -> String {
    format!("{} {}", month.short_name(), month.year())
}

fn render_detail(frame: &mut Frame, area: Rect, detail: &ExpansionDetail, view: &BudgetView, theme: &Theme) {
    let (name, month) = detail.title();
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("{name} • {month}"));
    let mut lines = Vec::new();
    if let Some(placeholder) = detail.placeholder() {
        let color = if matches!(detail.state(), DetailState::Failed(_)) {
            theme.danger
        } else {
            theme.muted
        };
        lines.push(Line::styled(placeholder.to_string(), Style::default().fg(color)));
    }
    for row in detail.rows(&view.settings().currency_symbol) {
        let color = if row.amount.starts_with('-') {
            theme.danger
        } else {
            theme.success
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<8}", row.date), Style::default().fg(theme.muted)),
            Span::raw(truncate(&row.payee, 28)),
            Span::styled(format!("{:>14}", row.amount), Style::default().fg(color)),
        ]));
    }
    if let Some(label) = detail.view_all_label() {
        lines.push(Line::styled(label, Style::default().fg(theme.accent)));
    }
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status(frame: &mut Frame, area: Rect, view: &BudgetView, theme: &Theme, fallback: &str) {
    let cells = view.navigator().cells();
    let primary = if let Some(message) = cells.session().and_then(|session| session.error_message()) {
        Line::styled(message, Style::default().fg(theme.danger))
    } else if let Some(status) = view.status() {
        Line::from(status.to_string())
    } else if let Some(err) = cells.last_error() {
        Line::styled(err.to_string(), Style::default().fg(theme.danger))
    } else {
        Line::from(fallback.to_string())
    };

    let mut help: Vec<Span> = Vec::new();
    if cells.is_busy() || view.is_applying() {
        help.push(Span::styled("Saving... ", Style::default().fg(theme.warning)));
    }
    let bindings = shortcuts::in_group(ShortcutGroup::Navigation)
        .chain(shortcuts::in_group(ShortcutGroup::Action))
        .map(|shortcut| format!("{shortcut} {}", shortcut.description))
        .collect::<Vec<_>>()
        .join(" • ");
    help.push(Span::styled(bindings, Style::default().fg(theme.muted)));

    let paragraph = Paragraph::new(vec![primary, Line::from(help)])
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_tooltip(frame: &mut Frame, view: &BudgetView, theme: &Theme, hits: &mut HitMap) {
    let Some((key, content)) = view.tooltip() else {
        return;
    };
    let Some(anchor) = hits.cell_rect(key) else {
        return;
    };
    let area = frame.size();
    let width = TOOLTIP_WIDTH.min(area.width);
    let height = 6.min(area.height);
    let x = anchor.x.min(area.right().saturating_sub(width));
    let y = if anchor.bottom() + height <= area.bottom() {
        anchor.bottom()
    } else {
        anchor.y.saturating_sub(height)
    };
    let rect = Rect::new(x, y, width, height);

    let symbol = view.settings().currency_symbol.as_str();
    let difference_color = match content.difference {
        Difference::Remaining(_) => theme.success,
        Difference::Over(_) => theme.danger,
        Difference::OnBudget => theme.accent_alt,
    };
    let muted = Style::default().fg(theme.muted);
    let lines = vec![
        Line::from(vec![Span::styled("Actual  ", muted), Span::raw(content.actual.clone())]),
        Line::from(vec![Span::styled("Budget  ", muted), Span::raw(content.budget.clone())]),
        Line::styled(content.difference_text(symbol), Style::default().fg(difference_color)),
        Line::from(vec![Span::styled("Usage   ", muted), Span::raw(content.usage.clone())]),
    ];
    let title = format!(
        "{} • {}",
        category_name(view.grid(), &key.category),
        month_label(key.month)
    );
    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.accent))
                .title(title),
        ),
        rect,
    );
    hits.tooltip = Some(rect);
}

fn render_context_menu(frame: &mut Frame, menu: &ContextMenu, theme: &Theme, hits: &mut HitMap) {
    let width = ContextMenu::ITEMS
        .iter()
        .map(|action| action.label().chars().count())
        .max()
        .unwrap_or_default() as u16
        + 4;
    let height = ContextMenu::ITEMS.len() as u16 + 2;
    let area = frame.size();
    let (x, y) = menu.position((width, height), (area.width, area.height));
    let rect = Rect::new(x, y, width.min(area.width), height.min(area.height));
    frame.render_widget(Clear, rect);
    frame.render_widget(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent)),
        rect,
    );
    for (index, action) in ContextMenu::ITEMS.iter().enumerate() {
        let line = Rect::new(rect.x + 1, rect.y + 1 + index as u16, rect.width.saturating_sub(2), 1);
        if line.bottom() >= rect.bottom() {
            break;
        }
        let style = if menu.highlighted() == Some(index) {
            Style::default().fg(theme.selection_fg).bg(theme.selection_bg)
        } else {
            Style::default()
        };
        put(frame, line, Span::styled(format!(" {:<w$}", action.label(), w = usize::from(line.width) - 1), style));
        hits.menu_items.push(line);
    }
}

fn preview_lines(grid: &BudgetGrid, cells: &[PreviewCell], hidden: usize, symbol: &str, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = cells
        .iter()
        .map(|cell| {
            let changed = if cell.changes() {
                Style::default().fg(theme.accent)
            } else {
                Style::default().fg(theme.muted)
            };
            Line::from(vec![
                Span::raw(truncate(category_name(grid, &cell.key.category), 16)),
                Span::styled(format!(" {:<9}", month_label(cell.key.month)), Style::default().fg(theme.muted)),
                Span::raw(format!("{:>12}", format_currency(cell.before_cents, symbol))),
                Span::raw(" → "),
                Span::styled(format!("{:>12}", format_currency(cell.after_cents, symbol)), changed),
            ])
        })
        .collect();
    if hidden > 0 {
        lines.push(Line::styled(
            format!("...and {hidden} more"),
            Style::default().fg(theme.muted),
        ));
    }
    lines
}

fn render_future_prompt(frame: &mut Frame, prompt: &FuturePrompt, view: &BudgetView, theme: &Theme, hits: &mut HitMap) {
    let grid = view.grid();
    let settings = view.settings();
    let height = 10 + settings.preview_rows as u16;
    let rect = centered_rect(64, height, frame.size());
    let target = prompt.target();

    let suffix = match prompt.action() {
        FutureAction::SetAmount => "",
        FutureAction::IncreasePercent => " %",
    };
    let mut lines = vec![
        Line::styled(
            format!(
                "{} from {}",
                category_name(grid, &target.category),
                target.month.long_label()
            ),
            Style::default().fg(theme.muted),
        ),
        Line::from(vec![
            Span::raw("Value: "),
            Span::styled(
                format!("{}▏{suffix}", prompt.input()),
                Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
            ),
        ]),
    ];
    if let Some(error) = prompt.error() {
        lines.push(Line::styled(error.to_string(), Style::default().fg(theme.danger)));
    }
    lines.push(Line::from(""));
    let preview = prompt.preview();
    lines.push(Line::styled(
        format!("{} cells affected", preview.affected_count()),
        Style::default().add_modifier(Modifier::BOLD),
    ));
    let (shown, hidden) = preview.head(settings.preview_rows);
    lines.extend(preview_lines(grid, shown, hidden, &settings.currency_symbol, theme));
    lines.push(Line::from(""));
    lines.push(if view.is_applying() {
        Line::styled("Applying...", Style::default().fg(theme.warning))
    } else {
        Line::styled("Enter apply • Esc cancel", Style::default().fg(theme.muted))
    });

    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.accent))
                .title(prompt.title()),
        ),
        rect,
    );
    hits.dialog = Some(rect);
}

fn checkbox(selection: Selection) -> &'static str {
    match selection {
        Selection::None => "[ ]",
        Selection::Partial => "[-]",
        Selection::All => "[x]",
    }
}

fn section_title(label: &str, focused: bool, theme: &Theme) -> Line<'static> {
    let style = if focused {
        Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let marker = if focused { "› " } else { "  " };
    Line::styled(format!("{marker}{label}"), style)
}

fn render_batch_modal(frame: &mut Frame, modal: &BatchModal, view: &BudgetView, theme: &Theme, hits: &mut HitMap) {
    let grid = view.grid();
    let settings = view.settings();
    let rect = centered_rect(100, 30, frame.size());
    frame.render_widget(Clear, rect);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.accent))
        .title("Budget Adjustment");
    let inner = block.inner(rect);
    frame.render_widget(block, rect);
    hits.dialog = Some(rect);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(inner);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(38), Constraint::Min(20)])
        .split(rows[0]);

    // categories
    let focus = modal.focus();
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let items: Vec<ListItem> = modal
        .checklist()
        .into_iter()
        .map(|row| match row {
            ChecklistRow::All => {
                let summary = modal.global_summary();
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{} All categories", checkbox(summary.state())), bold),
                    Span::styled(format!("  {}", summary.label()), Style::default().fg(theme.muted)),
                ]))
            }
            ChecklistRow::Section(section) => {
                let summary = modal.section_summary(&section);
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{} {section}", checkbox(summary.state())), bold),
                    Span::styled(
                        format!("  {}/{}", summary.selected, summary.total),
                        Style::default().fg(theme.muted),
                    ),
                ]))
            }
            ChecklistRow::Category(index) => {
                let category = &modal.categories()[index];
                let indent = if category.section.is_some() { "  " } else { "" };
                let mark = if modal.is_selected(index) { "[x]" } else { "[ ]" };
                ListItem::new(format!("{indent}{mark} {}", category.name))
            }
        })
        .collect();
    let focused = focus == ModalFocus::Categories;
    let list_block = Block::default()
        .borders(Borders::ALL)
        .title("Categories")
        .border_style(if focused {
            Style::default().fg(theme.accent)
        } else {
            Style::default().fg(theme.muted)
        });
    let highlight = if focused {
        Style::default().fg(theme.selection_fg).bg(theme.selection_bg)
    } else {
        Style::default()
    };
    let list = List::new(items).block(list_block).highlight_style(highlight);
    let mut list_state = ListState::default();
    list_state.select(Some(modal.checklist_row()));
    frame.render_stateful_widget(list, columns[0], &mut list_state);

    // form
    let muted = Style::default().fg(theme.muted);
    let danger = Style::default().fg(theme.danger);
    let mut lines = vec![section_title("Range", focus == ModalFocus::Range, theme)];
    let months = modal.months();
    let span = match (months.first(), months.last()) {
        (Some(first), Some(last)) => format!(
            "{} - {} ({} months)",
            month_label(*first),
            month_label(*last),
            months.len()
        ),
        _ => String::new(),
    };
    lines.push(Line::from(vec![
        Span::raw(format!("  ◀ {} ▶  ", modal.range().label())),
        Span::styled(span, muted),
    ]));
    if let Some(error) = modal.range_error() {
        lines.push(Line::styled(format!("  {error}"), danger));
    }

    lines.push(section_title("Operation", focus == ModalFocus::Operation, theme));
    let operation = modal.operation();
    lines.push(Line::from(format!("  ◀ {} ▶", operation.label())));

    lines.push(section_title("Value", focus == ModalFocus::Value, theme));
    if operation.needs_value() {
        let suffix = match operation {
            OperationKind::IncreasePercent | OperationKind::DecreasePercent => " %",
            _ => "",
        };
        lines.push(Line::styled(
            format!("  {}▏{suffix}", modal.value()),
            Style::default().fg(theme.accent),
        ));
        if let Some(error) = modal.value_error() {
            lines.push(Line::styled(format!("  {error}"), danger));
        }
    } else {
        lines.push(Line::styled("  not used", muted));
    }

    lines.push(Line::from(""));
    let preview = modal.preview();
    lines.push(Line::from(vec![
        Span::styled(modal.preview_label(), bold),
        Span::styled(
            format!("  net {}", format_currency(preview.net_change_cents(), &settings.currency_symbol)),
            muted,
        ),
    ]));
    let (shown, hidden) = modal.visible_preview(settings.preview_rows);
    lines.extend(preview_lines(grid, shown, hidden, &settings.currency_symbol, theme));

    if let Some(failure) = modal.failure() {
        lines.push(Line::from(""));
        lines.push(Line::styled(failure.to_string(), danger));
    }
    lines.push(Line::from(""));
    lines.push(if modal.is_busy() {
        Line::styled("Applying...", Style::default().fg(theme.warning))
    } else if modal.can_apply() {
        Line::styled(
            "[ Apply ]",
            Style::default().fg(theme.on_accent).bg(theme.accent).add_modifier(Modifier::BOLD),
        )
    } else {
        Line::styled("[ Apply ]", muted)
    });
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::LEFT)),
        columns[1],
    );

    let hint = "Tab section • Space toggle • ←/→ change • +/- extend • m show all • Enter apply • Esc cancel";
    frame.render_widget(
        Paragraph::new(Line::styled(hint, muted)).alignment(Alignment::Center),
        rows[1],
    );
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use budgetgrid_core::{
        ledger::LedgerSnapshot,
        models::CategoryKind,
        range::{DateRangeStore, RangePreset},
        view::ViewSettings,
    };
    use ratatui::{backend::TestBackend, Terminal};

    fn m(s: &str) -> Month {
        s.parse().expect("valid month")
    }

    fn view() -> anyhow::Result<BudgetView> {
        let range = DateRangeStore::new(m("2025-03"), RangePreset::ThisQuarter)?;
        let snapshot = LedgerSnapshot {
            categories: vec![
                Category::new("rent", "Rent", CategoryKind::Expense).in_section("Housing"),
                Category::new("food", "Food", CategoryKind::Expense).in_section("Daily"),
            ],
            months: range.months(),
            cells: Vec::new(),
        };
        Ok(BudgetView::new(ViewSettings::default(), range, snapshot))
    }

    #[test]
    fn scroll_keeps_target_visible() {
        assert_eq!(scroll_to(0, Some(7), 5, 12), 3);
        assert_eq!(scroll_to(3, Some(1), 5, 12), 1);
        assert_eq!(scroll_to(9, None, 5, 12), 7);
        assert_eq!(scroll_to(2, Some(3), 5, 3), 0);
    }

    #[test]
    fn fit_and_truncate_respect_width() {
        assert_eq!(fit("€500", 6), "  €500");
        assert_eq!(fit("1234567", 4), "4567");
        assert_eq!(truncate("Groceries", 5), "Groc…");
        assert_eq!(truncate("Rent", 6), "Rent  ");
    }

    #[test]
    fn sections_head_their_rows() {
        let categories = vec![
            Category::new("rent", "Rent", CategoryKind::Expense).in_section("Housing"),
            Category::new("power", "Power", CategoryKind::Expense).in_section("Housing"),
            Category::new("misc", "Misc", CategoryKind::Expense),
        ];
        let rows = grid_rows(&categories);
        assert_eq!(rows.len(), 4);
        assert!(matches!(rows[0], GridRow::Section("Housing")));
        assert!(matches!(rows[3], GridRow::Category(c) if c.name == "Misc"));
    }

    #[test]
    fn dialog_turns_everything_else_outside() {
        let key = CellKey::new("rent", m("2025-01"));
        let mut hits = HitMap {
            cells: vec![(Rect::new(20, 2, 10, 1), key.clone())],
            ..HitMap::default()
        };
        assert_eq!(hits.target(22, 2), PointerTarget::Cell(key));
        assert_eq!(hits.target(5, 5), PointerTarget::Outside);

        hits.dialog = Some(Rect::new(0, 0, 10, 10));
        assert_eq!(hits.target(5, 5), PointerTarget::Dialog);
        assert_eq!(hits.target(22, 2), PointerTarget::Outside);

        hits.menu_items = vec![Rect::new(40, 3, 8, 1)];
        assert_eq!(hits.target(41, 3), PointerTarget::MenuItem(0));
    }

    #[test]
    fn draw_records_every_visible_cell() -> anyhow::Result<()> {
        let view = view()?;
        let mut terminal = Terminal::new(TestBackend::new(120, 40))?;
        let mut viewport = Viewport::default();
        let mut hits = HitMap::default();
        terminal.draw(|frame| {
            draw(frame, &view, &Theme::default(), "Ready", &mut viewport, &mut hits)
        })?;

        assert_eq!(hits.cells.len(), 6);
        let first = hits.cell_rect(&CellKey::new("rent", m("2025-01"))).expect("drawn");
        assert_eq!(hits.cursor_anchor, Some((first.x, first.y + 1)));
        assert_eq!(
            hits.target(first.x + 1, first.y),
            PointerTarget::Cell(CellKey::new("rent", m("2025-01")))
        );
        Ok(())
    }

    #[test]
    fn narrow_grid_scrolls_to_the_cursor_month() -> anyhow::Result<()> {
        let view = view()?;
        // room for one month column without totals
        let mut terminal = Terminal::new(TestBackend::new(34, 20))?;
        let mut viewport = Viewport {
            month_offset: 2,
            row_offset: 0,
        };
        let mut hits = HitMap::default();
        terminal.draw(|frame| {
            draw(frame, &view, &Theme::default(), "Ready", &mut viewport, &mut hits)
        })?;
        assert_eq!(viewport.month_offset, 0);
        assert!(hits.cells.iter().all(|(_, key)| key.month == m("2025-01")));
        Ok(())
    }
}
