//! Configuration loader/writer
//!
//! `config.toml` holds the bounded console, history and UI variables. Every
//! value is clamped to its [`VarSpec`] range on load. Key bindings and
//! completions are not TOML; they persist as script lines in `binds.cfg`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::binds::KeyBindingTable;
use crate::core::completion::TextCompletionIndex;

const DEFAULT_CONFIG: &str = include_str!("../defaults/config.toml");

/// Environment variable that overrides the data directory
pub const DATA_DIR_ENV: &str = "CUBEUI_DIR";

/// Range and default of one bounded variable
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VarSpec<T> {
    pub name: &'static str,
    pub min: T,
    pub default: T,
    pub max: T,
}

impl<T: PartialOrd + Copy + Display> VarSpec<T> {
    pub const fn new(name: &'static str, min: T, default: T, max: T) -> Self {
        Self {
            name,
            min,
            default,
            max,
        }
    }

    /// `value` pulled into range, with a warning when it had to move
    pub fn clamp(&self, value: T) -> T {
        if value < self.min {
            tracing::warn!(
                "{} = {} is below the minimum, using {}",
                self.name,
                value,
                self.min
            );
            self.min
        } else if value > self.max {
            tracing::warn!(
                "{} = {} is above the maximum, using {}",
                self.name,
                value,
                self.max
            );
            self.max
        } else {
            value
        }
    }
}

pub const MAXCON: VarSpec<i64> = VarSpec::new("console.maxcon", 10, 200, 1000);
pub const CONSIZE: VarSpec<i64> = VarSpec::new("console.consize", 0, 5, 100);
pub const MINICONSIZE: VarSpec<i64> = VarSpec::new("console.miniconsize", 0, 5, 100);
pub const MINICONWIDTH: VarSpec<i64> = VarSpec::new("console.miniconwidth", 0, 40, 100);
pub const CONFADE: VarSpec<i64> = VarSpec::new("console.confade", 0, 30, 60);
pub const MINICONFADE: VarSpec<i64> = VarSpec::new("console.miniconfade", 0, 30, 60);
pub const CONFILTER: VarSpec<i64> = VarSpec::new("console.confilter", 0, 0xFFFFFF, 0xFFFFFF);
pub const FULLCONFILTER: VarSpec<i64> =
    VarSpec::new("console.fullconfilter", 0, 0xFFFFFF, 0xFFFFFF);
pub const MINICONFILTER: VarSpec<i64> = VarSpec::new("console.miniconfilter", 0, 0, 0xFFFFFF);
pub const MAXHISTORY: VarSpec<i64> = VarSpec::new("history.maxhistory", 0, 1000, 10000);
pub const SCROLLSTEPTIME: VarSpec<i64> = VarSpec::new("ui.scrollsteptime", 0, 50, 1000);
pub const SLIDERSTEPTIME: VarSpec<i64> = VarSpec::new("ui.slidersteptime", 0, 50, 1000);
pub const TEXTROWS: VarSpec<i64> = VarSpec::new("ui.textrows", 1, 24, 200);
pub const SENSITIVITY: VarSpec<f64> = VarSpec::new("ui.sensitivity", 1e-4, 1.0, 1e4);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Scrollback capacity in lines
    pub maxcon: i64,
    /// Visible rows of the full console
    pub consize: i64,
    pub miniconsize: i64,
    /// Mini console width, percent of the screen
    pub miniconwidth: i64,
    /// Seconds before a line fades out of the console
    pub confade: i64,
    pub miniconfade: i64,
    pub confilter: i64,
    pub fullconfilter: i64,
    pub miniconfilter: i64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            maxcon: MAXCON.default,
            consize: CONSIZE.default,
            miniconsize: MINICONSIZE.default,
            miniconwidth: MINICONWIDTH.default,
            confade: CONFADE.default,
            miniconfade: MINICONFADE.default,
            confilter: CONFILTER.default,
            fullconfilter: FULLCONFILTER.default,
            miniconfilter: MINICONFILTER.default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub maxhistory: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            maxhistory: MAXHISTORY.default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Milliseconds between scroll arrow steps
    pub scrollsteptime: i64,
    /// Milliseconds between slider arrow steps
    pub slidersteptime: i64,
    /// Text lines that fit the screen height
    pub textrows: i64,
    pub sensitivity: f64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            scrollsteptime: SCROLLSTEPTIME.default,
            slidersteptime: SLIDERSTEPTIME.default,
            textrows: TEXTROWS.default,
            sensitivity: SENSITIVITY.default,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub console: ConsoleConfig,
    pub history: HistoryConfig,
    pub ui: UiConfig,
}

impl Config {
    /// Load `config.toml` from the data directory, writing the embedded
    /// default there first if it is missing
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            Self::write_default(&path)?;
        }
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Parse and clamp
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        config.clamp();
        Ok(config)
    }

    /// The embedded default configuration
    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_CONFIG).context("Failed to parse embedded default config")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    fn write_default(path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create data directory")?;
        }
        fs::write(path, DEFAULT_CONFIG).context("Failed to write default config")?;
        tracing::info!("Wrote default config to {:?}", path);
        Ok(())
    }

    /// Pull every variable into its range
    pub fn clamp(&mut self) {
        let c = &mut self.console;
        c.maxcon = MAXCON.clamp(c.maxcon);
        c.consize = CONSIZE.clamp(c.consize);
        c.miniconsize = MINICONSIZE.clamp(c.miniconsize);
        c.miniconwidth = MINICONWIDTH.clamp(c.miniconwidth);
        c.confade = CONFADE.clamp(c.confade);
        c.miniconfade = MINICONFADE.clamp(c.miniconfade);
        c.confilter = CONFILTER.clamp(c.confilter);
        c.fullconfilter = FULLCONFILTER.clamp(c.fullconfilter);
        c.miniconfilter = MINICONFILTER.clamp(c.miniconfilter);
        self.history.maxhistory = MAXHISTORY.clamp(self.history.maxhistory);
        let u = &mut self.ui;
        u.scrollsteptime = SCROLLSTEPTIME.clamp(u.scrollsteptime);
        u.slidersteptime = SLIDERSTEPTIME.clamp(u.slidersteptime);
        u.textrows = TEXTROWS.clamp(u.textrows);
        u.sensitivity = SENSITIVITY.clamp(u.sensitivity);
    }

    /// The data directory (`~/.cubeui`), overridable with `CUBEUI_DIR`
    pub fn base_dir() -> Result<PathBuf> {
        if let Ok(custom_dir) = std::env::var(DATA_DIR_ENV) {
            return Ok(PathBuf::from(custom_dir));
        }
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".cubeui"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.toml"))
    }

    pub fn binds_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("binds.cfg"))
    }
}

/// The persisted `binds.cfg` text: bindings, then completions
pub fn binds_script(binds: &KeyBindingTable, completion: &TextCompletionIndex) -> String {
    let mut out = binds.write_binds();
    out.push_str(&completion.write_completions());
    out
}

pub fn save_binds(path: &Path, binds: &KeyBindingTable, completion: &TextCompletionIndex) -> Result<()> {
    fs::write(path, binds_script(binds, completion)).context("Failed to write binds.cfg")?;
    tracing::debug!("Saved bindings to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::binds::BindMode;

    #[test]
    fn test_embedded_default_matches_struct_default() {
        assert_eq!(Config::embedded().unwrap(), Config::default());
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let config = Config::from_toml("[ui]\ntextrows = 40\n").unwrap();
        assert_eq!(config.ui.textrows, 40);
        assert_eq!(config.ui.scrollsteptime, 50);
        assert_eq!(config.console.maxcon, 200);
        assert_eq!(config.history.maxhistory, 1000);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let config = Config::from_toml(
            "[console]\nmaxcon = 5\nconfade = 900\n[ui]\nsensitivity = 0.0\ntextrows = 0\n",
        )
        .unwrap();
        assert_eq!(config.console.maxcon, 10);
        assert_eq!(config.console.confade, 60);
        assert_eq!(config.ui.sensitivity, 1e-4);
        assert_eq!(config.ui.textrows, 1);
    }

    #[test]
    fn test_var_spec_keeps_in_range_values() {
        assert_eq!(CONSIZE.clamp(7), 7);
        assert_eq!(CONSIZE.clamp(-3), 0);
        assert_eq!(CONSIZE.clamp(101), 100);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = std::env::temp_dir().join(format!("cubeui-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut config = Config::default();
        config.console.consize = 12;
        config.save(&path).unwrap();
        assert_eq!(Config::load_from_path(&path).unwrap(), config);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_binds_script_lists_binds_then_completions() {
        let mut binds = KeyBindingTable::with_keymap([(103, "G".to_string())]);
        binds.bind("G", "say hello", BindMode::Default).unwrap();
        let mut completion = TextCompletionIndex::new();
        completion.add_list_complete("map", "a b");
        let text = binds_script(&binds, &completion);
        let bind_at = text.find("bind \"G\" [say hello]").unwrap();
        let complete_at = text.find("listcomplete map").unwrap();
        assert!(bind_at < complete_at);
    }
}
