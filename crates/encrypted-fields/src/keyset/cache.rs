//! In-memory cache of loaded keysets, keyed by key source and location.
//!
//! Every field bound to the same location shares one loaded keyset. The cache
//! uses `arc-swap` so lookups never block.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use arc_swap::ArcSwap;

use super::{KeyLoadError, Keyset, KeysetSource};

type CacheKey = (String, PathBuf);

/// Shared, lock-free cache of loaded keysets.
#[derive(Clone)]
pub struct KeysetCache {
    inner: Arc<ArcSwap<HashMap<CacheKey, Arc<dyn Keyset>>>>,
}

impl KeysetCache {
    /// Create a new, empty [`KeysetCache`].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::new(Arc::new(HashMap::new()))),
        }
    }

    /// Return the number of keysets currently cached.
    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    /// Return `true` if no keysets are cached.
    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }

    /// Look up a previously loaded keyset.
    pub fn get(&self, source_name: &str, location: &Path) -> Option<Arc<dyn Keyset>> {
        self.inner
            .load()
            .get(&(source_name.to_owned(), location.to_path_buf()))
            .cloned()
    }

    /// Return the cached keyset for `(source_name, location)`, loading it
    /// through `source` on a miss.
    ///
    /// The returned flag is `true` when this call performed the load. Two
    /// threads racing on the same miss may both load; the first insert wins
    /// and both receive the winning keyset.
    ///
    /// # Errors
    ///
    /// Propagates the [`KeyLoadError`] from `source`; nothing is cached on failure.
    pub fn get_or_load(
        &self,
        source_name: &str,
        location: &Path,
        source: &dyn KeysetSource,
    ) -> Result<(Arc<dyn Keyset>, bool), KeyLoadError> {
        if let Some(hit) = self.get(source_name, location) {
            return Ok((hit, false));
        }

        let loaded = source.load(location)?;
        let key: CacheKey = (source_name.to_owned(), location.to_path_buf());
        self.inner.rcu(|current| {
            let mut next: HashMap<CacheKey, Arc<dyn Keyset>> = (**current).clone();
            next.entry(key.clone()).or_insert_with(|| Arc::clone(&loaded));
            next
        });
        let winner = self.get(source_name, location).unwrap_or(loaded);
        Ok((winner, true))
    }
}

impl Default for KeysetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeysetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeysetCache")
            .field("len", &self.len())
            .finish()
    }
}
