//! Terminal-independent input events and the shortcut table.

use std::fmt;

use crate::models::CellKey;

/// Modifier keys held during a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Control.
    pub ctrl: bool,
    /// Shift.
    pub shift: bool,
    /// Alt / Option.
    pub alt: bool,
    /// Command / Super.
    pub meta: bool,
}

impl Modifiers {
    /// No modifiers.
    pub const NONE: Self = Self {
        ctrl: false,
        shift: false,
        alt: false,
        meta: false,
    };
    /// Shift only.
    pub const SHIFT: Self = Self {
        shift: true,
        ..Self::NONE
    };
    /// Control only.
    pub const CTRL: Self = Self {
        ctrl: true,
        ..Self::NONE
    };
    /// Control (or Command) with Shift.
    pub const CTRL_SHIFT: Self = Self {
        ctrl: true,
        shift: true,
        ..Self::NONE
    };

    /// Control or Command; the two are interchangeable for shortcuts.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Keys the grid reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    /// Printable character.
    Char(char),
    /// Return.
    Enter,
    /// Escape.
    Esc,
    /// Tab; Shift+Tab arrives with [`Modifiers::shift`] set.
    Tab,
    /// Backspace.
    Backspace,
    /// Arrow up.
    Up,
    /// Arrow down.
    Down,
    /// Arrow left.
    Left,
    /// Arrow right.
    Right,
    /// Function key.
    F(u8),
}

/// One key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    /// Key.
    pub code: KeyCode,
    /// Held modifiers.
    pub modifiers: Modifiers,
}

impl KeyPress {
    /// Unmodified key.
    pub fn plain(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
        }
    }

    /// Key with modifiers.
    pub fn with(code: KeyCode, modifiers: Modifiers) -> Self {
        Self { code, modifiers }
    }
}

/// What the pointer is over, resolved by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    /// A grid cell.
    Cell(CellKey),
    /// The visible tooltip.
    Tooltip,
    /// Context menu entry by index.
    MenuItem(usize),
    /// Inside an open modal or prompt.
    Dialog,
    /// Anywhere else.
    Outside,
}

/// Pointer events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pointer {
    /// Primary button click.
    Click(PointerTarget),
    /// Primary button double click.
    DoubleClick(PointerTarget),
    /// Secondary button click; `anchor` is the screen position.
    ContextClick(PointerTarget, (u16, u16)),
    /// Pointer moved.
    Hover(PointerTarget),
}

/// Any user input delivered to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Keyboard.
    Key(KeyPress),
    /// Mouse.
    Pointer(Pointer),
}

/// Help grouping of a shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutGroup {
    /// Moving around the grid.
    Navigation,
    /// Commands.
    Action,
    /// Keys that work everywhere.
    Universal,
}

impl ShortcutGroup {
    /// Help heading.
    pub fn label(&self) -> &'static str {
        match self {
            ShortcutGroup::Navigation => "Navigation",
            ShortcutGroup::Action => "Actions",
            ShortcutGroup::Universal => "Universal",
        }
    }
}

/// A registered key binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
    /// Stable identifier.
    pub id: &'static str,
    /// Key.
    pub key: KeyCode,
    /// Required modifiers; `ctrl` also matches Command.
    pub modifiers: Modifiers,
    /// Help grouping.
    pub group: ShortcutGroup,
    /// Help text.
    pub description: &'static str,
}

impl Shortcut {
    /// Whether `press` triggers this shortcut.
    pub fn matches(&self, press: &KeyPress) -> bool {
        let key_matches = match (self.key, press.code) {
            (KeyCode::Char(want), KeyCode::Char(got)) => want.eq_ignore_ascii_case(&got),
            (want, got) => want == got,
        };
        key_matches
            && self.modifiers.command() == press.modifiers.command()
            && self.modifiers.shift == press.modifiers.shift
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.shift {
            f.write_str("Shift+")?;
        }
        match self.key {
            KeyCode::Char(' ') => f.write_str("Space"),
            KeyCode::Char(ch) => write!(f, "{}", ch.to_ascii_uppercase()),
            KeyCode::Enter => f.write_str("Enter"),
            KeyCode::Esc => f.write_str("Esc"),
            KeyCode::Tab => f.write_str("Tab"),
            KeyCode::Backspace => f.write_str("Backspace"),
            KeyCode::Up => f.write_str("↑"),
            KeyCode::Down => f.write_str("↓"),
            KeyCode::Left => f.write_str("←"),
            KeyCode::Right => f.write_str("→"),
            KeyCode::F(n) => write!(f, "F{n}"),
        }
    }
}

/// Identifier of the batch adjustment shortcut.
pub const ADJUST_BUDGETS: &str = "adjust-budgets";
/// Identifier of the quit shortcut.
pub const QUIT: &str = "quit";

/// Every shortcut the grid understands.
pub const SHORTCUTS: &[Shortcut] = &[
    Shortcut {
        id: "edit-cell",
        key: KeyCode::Enter,
        modifiers: Modifiers::NONE,
        group: ShortcutGroup::Navigation,
        description: "Edit focused cell",
    },
    Shortcut {
        id: "toggle-details",
        key: KeyCode::Char(' '),
        modifiers: Modifiers::NONE,
        group: ShortcutGroup::Navigation,
        description: "Show transactions",
    },
    Shortcut {
        id: "cell-menu",
        key: KeyCode::F(10),
        modifiers: Modifiers::SHIFT,
        group: ShortcutGroup::Navigation,
        description: "Cell actions",
    },
    Shortcut {
        id: ADJUST_BUDGETS,
        key: KeyCode::Char('b'),
        modifiers: Modifiers::CTRL_SHIFT,
        group: ShortcutGroup::Action,
        description: "Budget Adjustment",
    },
    Shortcut {
        id: "range",
        key: KeyCode::Char('r'),
        modifiers: Modifiers::NONE,
        group: ShortcutGroup::Action,
        description: "Change date range",
    },
    Shortcut {
        id: QUIT,
        key: KeyCode::Char('q'),
        modifiers: Modifiers::NONE,
        group: ShortcutGroup::Action,
        description: "Quit",
    },
    Shortcut {
        id: "close",
        key: KeyCode::Esc,
        modifiers: Modifiers::NONE,
        group: ShortcutGroup::Universal,
        description: "Close / Cancel",
    },
    Shortcut {
        id: "next-field",
        key: KeyCode::Tab,
        modifiers: Modifiers::NONE,
        group: ShortcutGroup::Universal,
        description: "Save and next month",
    },
    Shortcut {
        id: "prev-field",
        key: KeyCode::Tab,
        modifiers: Modifiers::SHIFT,
        group: ShortcutGroup::Universal,
        description: "Save and previous month",
    },
];

/// Look up a shortcut by identifier.
pub fn shortcut(id: &str) -> Option<&'static Shortcut> {
    SHORTCUTS.iter().find(|shortcut| shortcut.id == id)
}

/// Identifier of the shortcut `press` triggers.
pub fn matching(press: &KeyPress) -> Option<&'static str> {
    SHORTCUTS
        .iter()
        .find(|shortcut| shortcut.matches(press))
        .map(|shortcut| shortcut.id)
}

/// Shortcuts of one group, in table order.
pub fn in_group(group: ShortcutGroup) -> impl Iterator<Item = &'static Shortcut> {
    SHORTCUTS.iter().filter(move |shortcut| shortcut.group == group)
}
