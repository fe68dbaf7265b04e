//! Engine selection policy.
//!
//! Resolution is a layered fallback evaluated independently per job:
//! user override, then the default mapping's primary, then its declared
//! fallback, then the first available capable engine. A tier whose engine
//! is incapable or uninstalled is skipped silently; only exhausting every
//! tier is an error.

use indexmap::IndexMap;

use crate::format::{EnginePreference, normalize_extension};
use crate::registry::Registry;

/// Selection failure: every tier exhausted.
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("no available engine for .{format}")]
    NoEngineAvailable {
        format: String,
        /// Engines that claim the format but whose dependency is missing.
        unavailable: Vec<String>,
    },
}

/// Resolve the engine to use for a format.
///
/// `overrides` maps extension to a user-preferred engine id; `defaults`
/// is the built-in mapping. An override or default is honored only if the
/// named engine is in `registry.lookup(format)`, i.e. both capable and
/// currently available.
pub fn resolve(
    format: &str,
    overrides: &IndexMap<String, String>,
    defaults: &IndexMap<String, EnginePreference>,
    registry: &Registry,
) -> Result<String, SelectError> {
    let ext = normalize_extension(format);
    let capable = registry.lookup(&ext);

    // Tier 1: user override
    if let Some(id) = overrides.get(&ext) {
        if capable.iter().any(|c| c == id) {
            return Ok(id.clone());
        }
        tracing::debug!(format = %ext, engine = %id, "override not usable, falling through");
    }

    if let Some(pref) = defaults.get(&ext) {
        // Tier 2: default mapping primary
        if capable.iter().any(|c| *c == pref.primary) {
            return Ok(pref.primary.clone());
        }
        // Tier 3: declared fallback
        if let Some(fallback) = &pref.fallback {
            if capable.iter().any(|c| c == fallback) {
                return Ok(fallback.clone());
            }
        }
    }

    // Tier 4: first available capable engine, registration order
    if let Some(first) = capable.first() {
        return Ok(first.clone());
    }

    Err(SelectError::NoEngineAvailable {
        format: ext.clone(),
        unavailable: registry.unavailable_for(&ext),
    })
}
