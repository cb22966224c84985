use std::fs;

use budgetgrid_core::{config, status::StatusClass, totals::DifferenceClass};
use ratatui::style::Color;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary_bg: Color,
    pub primary_fg: Color,
    pub accent: Color,
    pub accent_alt: Color,
    pub muted: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,
    pub success: Color,
    pub warning: Color,
    pub danger: Color,
    pub on_accent: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_bg: Color::Black,
            primary_fg: Color::White,
            accent: Color::Cyan,
            accent_alt: Color::Blue,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            selection_fg: Color::White,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
            on_accent: Color::Black,
        }
    }
}

impl Theme {
    /// Foreground for a cell's status class.
    pub fn status(&self, class: StatusClass) -> Color {
        match class {
            StatusClass::None => self.primary_fg,
            StatusClass::Success => self.success,
            StatusClass::Warning => self.warning,
            StatusClass::Neutral => self.accent_alt,
            StatusClass::Danger => self.danger,
        }
    }

    pub fn difference(&self, class: DifferenceClass) -> Color {
        match class {
            DifferenceClass::Positive => self.success,
            DifferenceClass::Negative => self.danger,
            DifferenceClass::Neutral => self.muted,
        }
    }
}

/// Palette plus a status note describing where it came from.
pub fn load_theme() -> (Theme, String) {
    let path = match config::config_dir() {
        Ok(dir) => dir.join(THEME_FILE),
        Err(err) => {
            return (
                Theme::default(),
                format!("No config directory ({err}); using default palette."),
            )
        }
    };
    if !path.exists() {
        return (
            Theme::default(),
            "No theme file found; using default palette.".to_string(),
        );
    }

    let json: Value = match fs::read_to_string(&path)
        .map_err(|err| err.to_string())
        .and_then(|data| serde_json::from_str(&data).map_err(|err| err.to_string()))
    {
        Ok(value) => value,
        Err(err) => {
            return (
                Theme::default(),
                format!(
                    "Failed to load {} ({err}); using default palette.",
                    path.display()
                ),
            )
        }
    };

    let (theme, applied) = palette_from(&json);
    let summary = if applied == 0 {
        format!(
            "Loaded theme from {} but no recognized color keys were applied.",
            path.display()
        )
    } else {
        format!("Loaded theme from {} ({applied} colors).", path.display())
    };
    (theme, summary)
}

const THEME_FILE: &str = "theme.json";

/// Overlay the colors found in `json` on the default palette; returns how
/// many keys applied.
fn palette_from(json: &Value) -> (Theme, usize) {
    let mut theme = Theme::default();
    let mut applied = 0;
    let mut selection_fg_set = false;
    {
        let slots: [(&mut Color, &[&str]); 10] = [
            (&mut theme.primary_bg, &["background"]),
            (&mut theme.primary_fg, &["foreground"]),
            (&mut theme.muted, &["muted"]),
            (&mut theme.accent, &["accent"]),
            (&mut theme.accent_alt, &["neutral"]),
            (&mut theme.success, &["success"]),
            (&mut theme.warning, &["warning"]),
            (&mut theme.danger, &["danger"]),
            (&mut theme.selection_bg, &["selection", "background"]),
            (&mut theme.selection_fg, &["selection", "foreground"]),
        ];
        for (slot, path) in slots {
            if let Some(color) = color_at_path(json, path) {
                *slot = color;
                applied += 1;
                selection_fg_set |= path == ["selection", "foreground"];
            }
        }
    }

    theme.on_accent = contrast_color(&theme.accent, Color::Black);
    if !selection_fg_set {
        theme.selection_fg = contrast_color(&theme.selection_bg, theme.selection_fg);
    }
    (theme, applied)
}

fn color_at_path(value: &Value, path: &[&str]) -> Option<Color> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    value_to_color(current)
}

fn value_to_color(value: &Value) -> Option<Color> {
    match value {
        Value::String(text) => parse_hex_color(text),
        Value::Array(items) if items.len() >= 3 => {
            let mut rgb = [0u8; 3];
            for (idx, component) in items.iter().take(3).enumerate() {
                rgb[idx] = u8::try_from(component.as_u64()?).ok()?;
            }
            Some(Color::Rgb(rgb[0], rgb[1], rgb[2]))
        }
        _ => None,
    }
}

fn parse_hex_color(input: &str) -> Option<Color> {
    let trimmed = input.trim();
    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

fn contrast_color(color: &Color, fallback: Color) -> Color {
    match color {
        Color::Rgb(r, g, b) => {
            let luminance =
                0.299 * f64::from(*r) + 0.587 * f64::from(*g) + 0.114 * f64::from(*b);
            if luminance > 186.0 {
                Color::Black
            } else {
                Color::White
            }
        }
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!(parse_hex_color("#ff8800"), Some(Color::Rgb(255, 136, 0)));
        assert_eq!(parse_hex_color("0x0a0b0c"), Some(Color::Rgb(10, 11, 12)));
        assert_eq!(parse_hex_color("#fff"), Some(Color::Rgb(255, 255, 255)));
        assert_eq!(parse_hex_color("teal"), None);
    }

    #[test]
    fn reads_nested_and_array_colors() {
        let value = json!({
            "colors": { "terminal": { "green": "#00ff00" } },
            "danger": [200, 10, 10]
        });
        assert_eq!(
            color_at_path(&value, &["colors", "terminal", "green"]),
            Some(Color::Rgb(0, 255, 0))
        );
        assert_eq!(color_at_path(&value, &["danger"]), Some(Color::Rgb(200, 10, 10)));
        assert_eq!(color_at_path(&value, &["missing"]), None);
    }

    #[test]
    fn contrast_picks_readable_text() {
        assert_eq!(contrast_color(&Color::Rgb(250, 250, 250), Color::Red), Color::Black);
        assert_eq!(contrast_color(&Color::Rgb(10, 10, 10), Color::Red), Color::White);
        assert_eq!(contrast_color(&Color::Cyan, Color::Red), Color::Red);
    }

    #[test]
    fn palette_overlays_known_keys_only() {
        let value = json!({
            "accent": "#ffffff",
            "danger": [200, 10, 10],
            "selection": { "background": "#101010" },
            "colors": { "terminal": { "green": "#00ff00" } }
        });
        let (theme, applied) = palette_from(&value);
        assert_eq!(applied, 3);
        assert_eq!(theme.accent, Color::Rgb(255, 255, 255));
        assert_eq!(theme.on_accent, Color::Black);
        assert_eq!(theme.danger, Color::Rgb(200, 10, 10));
        assert_eq!(theme.selection_bg, Color::Rgb(16, 16, 16));
        assert_eq!(theme.selection_fg, Color::White);
        assert_eq!(theme.success, Theme::default().success);
    }
}
