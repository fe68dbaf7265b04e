//! TOML-backed settings store.
//!
//! The core treats settings as a value object; this store owns the file
//! location and format. Malformed entries are recovered field by field so
//! a damaged config file degrades to defaults instead of failing a batch.

use std::path::PathBuf;

use mdforge_core::{OutputMode, Settings, SettingsStore, StoreError};

/// Settings persisted at `<config dir>/mdforge/config.toml`.
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    /// Store at an explicit path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the default per-user location, if one exists.
    pub fn default_location() -> Option<Self> {
        Some(Self::new(default_path()?))
    }

    /// Path this store reads and writes.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Salvage what deserializes from a TOML document, defaulting the rest.
    ///
    /// Entry-level recovery: a bad `output_mode` or a non-string override
    /// value only resets that entry.
    fn recover(value: toml::Value) -> Settings {
        let mut settings = Settings::default();
        let Some(table) = value.as_table() else {
            return settings;
        };

        if let Some(overrides) = table.get("overrides").and_then(|v| v.as_table()) {
            for (ext, engine) in overrides {
                match engine.as_str() {
                    Some(engine) => settings.set_engine_for(ext, engine),
                    None => {
                        tracing::warn!(extension = %ext, "ignoring malformed engine override")
                    }
                }
            }
        }

        if let Some(mode) = table.get("output_mode") {
            match mode.clone().try_into::<OutputMode>() {
                Ok(mode) => settings.output_mode = mode,
                Err(_) => tracing::warn!("ignoring malformed output_mode, using default"),
            }
        }

        if let Some(dir) = table.get("output_dir").and_then(|v| v.as_str()) {
            settings.output_dir = Some(PathBuf::from(dir));
        }

        settings
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<Settings, StoreError> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Read(format!("{}: {}", self.path.display(), e)))?;

        match toml::from_str::<Settings>(&contents) {
            Ok(settings) => Ok(settings),
            Err(parse_err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %parse_err,
                    "settings file malformed, recovering defaults for affected entries"
                );
                match toml::from_str::<toml::Value>(&contents) {
                    Ok(value) => Ok(Self::recover(value)),
                    Err(_) => Ok(Settings::default()),
                }
            }
        }
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| StoreError::Write(format!("{}: {}", dir.display(), e)))?;
        }
        let contents = toml::to_string_pretty(settings)
            .map_err(|e| StoreError::Write(e.to_string()))?;
        std::fs::write(&self.path, contents)
            .map_err(|e| StoreError::Write(format!("{}: {}", self.path.display(), e)))
    }
}

/// Default config file path: `<config dir>/mdforge/config.toml`.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("mdforge").join("config.toml"))
}
