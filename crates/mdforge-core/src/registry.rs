//! Registry of engines and their probed availability.
//!
//! Built once at startup; availability is snapshotted at construction so
//! lookups are pure and lock-free. A dependency appearing mid-session is
//! only picked up by an explicit re-probe.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::engine::Engine;
use crate::format::normalize_extension;

/// Immutable registry mapping formats to capable engines.
#[derive(Clone)]
pub struct Registry {
    /// Engines in registration order, indexed by id.
    engines: IndexMap<String, Arc<dyn Engine>>,
    /// Availability snapshot taken at construction.
    available: IndexMap<String, bool>,
}

impl Registry {
    /// Build a registry, probing each engine's availability once.
    ///
    /// Registration order is preserved and defines the deterministic
    /// tie-break used by selection.
    pub fn probe(engines: Vec<Arc<dyn Engine>>) -> Self {
        let mut by_id = IndexMap::new();
        let mut available = IndexMap::new();

        for engine in engines {
            let id = engine.descriptor().id.clone();
            let ok = engine.is_available();
            if !ok {
                tracing::info!(engine = %id, "engine registered but dependency missing");
            }
            available.insert(id.clone(), ok);
            by_id.insert(id, engine);
        }

        Self {
            engines: by_id,
            available,
        }
    }

    /// Get an engine by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Engine>> {
        self.engines.get(id).cloned()
    }

    /// Whether an engine's dependency was present at probe time.
    pub fn is_available(&self, id: &str) -> bool {
        self.available.get(id).copied().unwrap_or(false)
    }

    /// Available engines claiming the format, first-registered-first.
    pub fn lookup(&self, extension: &str) -> Vec<String> {
        let ext = normalize_extension(extension);
        self.engines
            .iter()
            .filter(|(id, engine)| self.is_available(id) && engine.descriptor().supports(&ext))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Engines claiming the format whose dependency is missing.
    ///
    /// Lets diagnostics distinguish "no engine exists" from "an engine
    /// exists but is not installed".
    pub fn unavailable_for(&self, extension: &str) -> Vec<String> {
        let ext = normalize_extension(extension);
        self.engines
            .iter()
            .filter(|(id, engine)| !self.is_available(id) && engine.descriptor().supports(&ext))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Whether any available engine can handle the format.
    pub fn is_supported(&self, extension: &str) -> bool {
        !self.lookup(extension).is_empty()
    }

    /// Iterate over all registered engines in registration order.
    pub fn engines(&self) -> impl Iterator<Item = &Arc<dyn Engine>> {
        self.engines.values()
    }

    /// Number of registered engines.
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
