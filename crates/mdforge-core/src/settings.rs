//! Settings value object and the injected persistence boundary.
//!
//! The core treats settings as a plain value: where and how they are
//! persisted is the store's concern. Batches read settings under a shared
//! lock; saves take the exclusive lock, so a reader sees either the old or
//! the new value, never a partial write.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::format::normalize_extension;

/// Where converted files are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Next to the input file.
    #[default]
    SameFolder,
    /// Into a fixed folder (`output_dir`).
    FixedFolder,
    /// The boundary prompts per batch; the core never sees this mode at
    /// conversion time.
    Prompt,
}

/// User preferences: per-format engine overrides and output location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Extension (normalized) to preferred engine id.
    pub overrides: IndexMap<String, String>,
    /// Output location policy.
    pub output_mode: OutputMode,
    /// Fixed output folder, used when `output_mode` is `FixedFolder`.
    pub output_dir: Option<PathBuf>,
}

impl Settings {
    /// User's preferred engine for an extension, if any.
    pub fn engine_for(&self, extension: &str) -> Option<&str> {
        self.overrides
            .get(&normalize_extension(extension))
            .map(String::as_str)
    }

    /// Set the preferred engine for an extension.
    pub fn set_engine_for(&mut self, extension: &str, engine: impl Into<String>) {
        self.overrides
            .insert(normalize_extension(extension), engine.into());
    }

    /// Remove one override, reverting the extension to the default engine.
    pub fn clear_override(&mut self, extension: &str) {
        self.overrides.shift_remove(&normalize_extension(extension));
    }

    /// Remove every override.
    pub fn clear_all_overrides(&mut self) {
        self.overrides.clear();
    }
}

/// Errors from a settings store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read settings: {0}")]
    Read(String),

    #[error("failed to write settings: {0}")]
    Write(String),

    #[error("persisted settings are malformed: {0}")]
    Corrupt(String),
}

/// Injected persistence for [`Settings`].
///
/// Implementations recover from a corrupt persisted form by falling back
/// to defaults for the affected entries and surfacing a non-fatal warning;
/// `load` only fails on I/O-level problems.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings, StoreError>;
    fn save(&self, settings: &Settings) -> Result<(), StoreError>;
}

/// Settings shared between a long-lived boundary and in-flight batches.
///
/// For callers that mutate settings while batches run (a GUI preferences
/// pane, a daemon reloading config): readers take the shared lock during
/// selection, saves take the exclusive lock, so a batch never observes a
/// partial write. A one-shot caller like the CLI snapshots a plain
/// [`Settings`] per invocation instead.
pub type SharedSettings = Arc<RwLock<Settings>>;

/// Wrap settings for shared read / exclusive write access.
pub fn shared(settings: Settings) -> SharedSettings {
    Arc::new(RwLock::new(settings))
}
