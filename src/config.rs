//! Runtime configuration — sizes, persistence, and paging policy for a
//! terminal core instance.
//!
//! Loaded from (and saved to) a JSON file via `serde_json`, in the same
//! load/save-with-context style the teacher used for its own config.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tunables for a single terminal core instance.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RuntimeConfig {
    /// Resident scrollback cap, in logical lines, before the oldest is
    /// evicted (to disk, if `persist_dir` is set).
    pub max_memory_lines: usize,
    /// Lines to page in above the resident window's oldest line whenever
    /// the viewport scrolls near it.
    pub margin_above: usize,
    /// Lines to keep paged in below the viewport, symmetric with
    /// `margin_above`.
    pub margin_below: usize,
    /// Boot default for DECAWM autowrap.
    pub autowrap: bool,
    /// Boot default for cursor blink. Cosmetic only — the core tracks
    /// cursor visibility, not blink phase; rendering that is a
    /// compositor concern.
    pub default_cursor_blink: bool,
    /// Input bytes typed since the last OSC 133;B before
    /// `VTerm::input_overflowed` starts reporting truncation. `None`
    /// disables the check.
    pub input_length_threshold: Option<usize>,
    /// Disk history location. Empty disables disk history entirely.
    pub persist_dir: PathBuf,
    /// Semantic default background, exposed to callers (e.g. to paint
    /// unoccupied chrome); never baked into cells.
    pub palette_default_bg: crate::cell::Color,
    /// Semantic default foreground, exposed to callers; never baked into
    /// cells.
    pub palette_default_fg: crate::cell::Color,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_memory_lines: 100_000,
            margin_above: 1_000,
            margin_below: 200,
            autowrap: true,
            default_cursor_blink: true,
            input_length_threshold: None,
            persist_dir: PathBuf::new(),
            palette_default_bg: crate::cell::Color::Default,
            palette_default_fg: crate::cell::Color::Default,
        }
    }
}

impl RuntimeConfig {
    /// Whether `persist_dir` names a disk history location.
    pub fn disk_history_enabled(&self) -> bool {
        !self.persist_dir.as_os_str().is_empty()
    }

    /// Where disk history lives if a caller opts in without naming a
    /// directory explicitly.
    pub fn default_persist_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("texelterm").join("history"))
            .unwrap_or_else(|| PathBuf::from(".texelterm/history"))
    }
}

impl RuntimeConfig {
    /// Load configuration from `path`, falling back to defaults if the
    /// file doesn't exist.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing config at {}", path.display()))
    }

    /// Persist configuration to `path`, creating parent directories as
    /// needed.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self).context("serializing config")?;
        std::fs::write(path, data).with_context(|| format!("writing config to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_sizes() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.max_memory_lines, 100_000);
        assert!(cfg.autowrap);
        assert!(!cfg.disk_history_enabled());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let cfg = RuntimeConfig::load(&path).unwrap();
        assert_eq!(cfg, RuntimeConfig::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.json");
        let mut cfg = RuntimeConfig::default();
        cfg.max_memory_lines = 500;
        cfg.persist_dir = dir.path().join("history");
        cfg.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
        assert!(loaded.disk_history_enabled());
    }
}
