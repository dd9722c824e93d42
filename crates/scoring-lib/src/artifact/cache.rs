//! Read-mostly cache of loaded models keyed by model identifier
//!
//! Handles are immutable, so readers only clone an `Arc`. A miss decodes the
//! artifact without holding any map lock; two requests missing on the same
//! model may both decode it, and the first insert wins.

use super::{ArtifactLocation, LoadedModel, ModelLoader};
use crate::error::Result;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
pub struct ModelCache {
    entries: DashMap<String, LoadedModel>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached model for an identifier, if present
    pub fn get(&self, model: &str) -> Option<LoadedModel> {
        self.entries.get(model).map(|entry| entry.value().clone())
    }

    /// Return the cached model for `location`, loading it on a miss
    ///
    /// The boolean is `true` when the model was served from the cache.
    pub fn get_or_load(
        &self,
        location: &ArtifactLocation,
        loader: &ModelLoader,
    ) -> Result<(LoadedModel, bool)> {
        if let Some(loaded) = self.get(&location.model) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((loaded, true));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let loaded = loader.load(location)?;
        let stored = self
            .entries
            .entry(location.model.clone())
            .or_insert(loaded)
            .value()
            .clone();

        debug!(model = %location.model, "Model cached");
        Ok((stored, false))
    }

    /// Drop one model so the next request reloads it from disk
    pub fn invalidate(&self, model: &str) -> bool {
        self.entries.remove(model).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}
