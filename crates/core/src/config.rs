//! Application configuration.
//!
//! Values are layered: built-in defaults, then
//! `~/.config/budgetgrid/config.toml` when present, then `BUDGETGRID_*`
//! environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{range::RangePreset, view::ViewSettings};

const APP_DIR: &str = "budgetgrid";

const DEFAULT_CONFIG: &str = r#"# budgetgrid configuration
# Every key is optional; uncomment to override the built-in default.
# Environment variables with the BUDGETGRID_ prefix take precedence
# (e.g. BUDGETGRID_CURRENCY_SYMBOL=$).

# ledger_path = "/path/to/ledger.json"
# currency_symbol = "€"
# default_range = "rolling-12"   # rolling-12 | this-year | last-year | this-quarter
# tooltip_show_delay_ms = 200
# tooltip_hide_delay_ms = 200
# preview_rows = 5
# seed_demo_data = true
"#;

/// Runtime settings for the terminal front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// JSON ledger file.
    pub ledger_path: PathBuf,
    /// Symbol printed in front of amounts.
    pub currency_symbol: String,
    /// Range preset shown at startup.
    pub default_range: String,
    /// Hover time before a tooltip shows.
    pub tooltip_show_delay_ms: u64,
    /// Grace time before a tooltip hides.
    pub tooltip_hide_delay_ms: u64,
    /// Preview rows listed before "...and N more".
    pub preview_rows: usize,
    /// Fill a missing ledger with sample categories.
    pub seed_demo_data: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            ledger_path: data_dir.join(APP_DIR).join("ledger.json"),
            currency_symbol: "€".to_string(),
            default_range: RangePreset::Rolling12.id().to_string(),
            tooltip_show_delay_ms: 200,
            tooltip_hide_delay_ms: 200,
            preview_rows: 5,
            seed_demo_data: true,
        }
    }
}

impl AppConfig {
    /// Load from the user config file and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load with `path` as the (optional) config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let defaults = Config::try_from(&AppConfig::default())
            .context("failed to encode default configuration")?;
        let config: AppConfig = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("BUDGETGRID"))
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?
            .try_deserialize()
            .context("invalid configuration")?;
        info!(ledger = %config.ledger_path.display(), range = %config.default_range, "configuration loaded");
        Ok(config)
    }

    /// Startup range preset.
    pub fn range_preset(&self) -> Result<RangePreset> {
        RangePreset::from_id(&self.default_range)
            .with_context(|| format!("unknown default_range `{}`", self.default_range))
    }

    /// Presentation settings for the grid view.
    pub fn view_settings(&self) -> ViewSettings {
        ViewSettings {
            currency_symbol: self.currency_symbol.clone(),
            preview_rows: self.preview_rows.max(1),
            tooltip_show_delay: Duration::from_millis(self.tooltip_show_delay_ms),
            tooltip_hide_delay: Duration::from_millis(self.tooltip_hide_delay_ms),
        }
    }
}

/// `~/.config/budgetgrid`.
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .context("could not determine the user config directory")
}

/// `~/.config/budgetgrid/config.toml`.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Write the commented default config if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    ensure_default_config_at(&config_path()?).map(|_| ())
}

/// Write the commented default config to `path`; `true` when it was created.
pub fn ensure_default_config_at(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "default configuration written");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_file_is_written_once_and_loads_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("config.toml");
        assert!(ensure_default_config_at(&path)?);
        assert!(!ensure_default_config_at(&path)?);

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.default_range, "rolling-12");
        assert_eq!(config.preview_rows, 5);
        assert_eq!(config.range_preset()?, RangePreset::Rolling12);
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "currency_symbol = \"$\"\npreview_rows = 8\ndefault_range = \"this-quarter\"\ntooltip_show_delay_ms = 350\n",
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.range_preset()?, RangePreset::ThisQuarter);
        let settings = config.view_settings();
        assert_eq!(settings.currency_symbol, "$");
        assert_eq!(settings.preview_rows, 8);
        assert_eq!(settings.tooltip_show_delay, Duration::from_millis(350));
        assert_eq!(settings.tooltip_hide_delay, Duration::from_millis(200));
        Ok(())
    }

    #[test]
    fn unknown_range_is_reported() {
        let config = AppConfig {
            default_range: "fortnight".to_string(),
            ..AppConfig::default()
        };
        assert!(config.range_preset().is_err());
    }
}
