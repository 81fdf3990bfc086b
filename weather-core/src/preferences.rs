//! Persisted user preferences.
//!
//! Loaded once when the session starts and written back on every change.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::config::Config;

pub const PREFERENCES_FILE: &str = "preferences.toml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct Stored {
    dark_mode: bool,
}

#[derive(Debug, Clone)]
pub struct Preferences {
    path: PathBuf,
    stored: Stored,
}

impl Preferences {
    /// Load preferences from the platform config dir.
    pub fn load() -> Result<Self> {
        Self::load_from(Config::config_dir()?.join(PREFERENCES_FILE))
    }

    /// Load preferences from `path`. A missing file yields defaults bound to that path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let stored = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read preferences: {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse preferences: {}", path.display()))?
        } else {
            Stored::default()
        };

        tracing::debug!(path = %path.display(), dark_mode = stored.dark_mode, "preferences loaded");
        Ok(Self { path, stored })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dark_mode(&self) -> bool {
        self.stored.dark_mode
    }

    /// Flip dark mode and persist it. Returns the new value.
    ///
    /// The in-memory value only changes once the write succeeded.
    pub fn toggle_dark_mode(&mut self) -> Result<bool> {
        self.set_dark_mode(!self.stored.dark_mode)?;
        Ok(self.stored.dark_mode)
    }

    pub fn set_dark_mode(&mut self, enabled: bool) -> Result<()> {
        let next = Stored { dark_mode: enabled };
        write_stored(&self.path, &next)?;
        self.stored = next;
        Ok(())
    }
}

fn write_stored(path: &Path, stored: &Stored) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create preferences directory: {}", parent.display())
        })?;
    }

    let toml = toml::to_string_pretty(stored).context("Failed to serialize preferences")?;
    fs::write(path, toml)
        .with_context(|| format!("Failed to write preferences: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_defaults_to_light_mode() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::load_from(dir.path().join(PREFERENCES_FILE)).unwrap();
        assert!(!prefs.dark_mode());
    }

    #[test]
    fn toggle_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join(PREFERENCES_FILE);

        let mut prefs = Preferences::load_from(&path).unwrap();
        assert!(prefs.toggle_dark_mode().unwrap());

        let reloaded = Preferences::load_from(&path).unwrap();
        assert!(reloaded.dark_mode());

        let mut reloaded = reloaded;
        assert!(!reloaded.toggle_dark_mode().unwrap());
        assert!(!Preferences::load_from(&path).unwrap().dark_mode());
    }

    #[test]
    fn stored_under_fixed_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);

        let mut prefs = Preferences::load_from(&path).unwrap();
        prefs.set_dark_mode(true).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("dark_mode = true"));
    }

    #[test]
    fn failed_write_leaves_value_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the write fail.
        let path = dir.path().join(PREFERENCES_FILE);
        fs::create_dir_all(&path).unwrap();

        let mut prefs = Preferences {
            path,
            stored: Stored::default(),
        };
        assert!(prefs.toggle_dark_mode().is_err());
        assert!(!prefs.dark_mode());
    }
}
