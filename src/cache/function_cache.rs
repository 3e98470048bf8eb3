use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;

use crate::stub::StubKey;
use crate::synth::Implementation;

type Slot = Arc<OnceCell<Arc<Implementation>>>;

/// In-memory implementations keyed by stub identity.
///
/// Each key owns a slot that is filled at most once; concurrent first
/// callers of the same key wait on the slot while one of them synthesizes.
#[derive(Default)]
pub struct ImplementationCache {
    slots: Mutex<HashMap<StubKey, Slot>>,
    hits: AtomicU64,
    syntheses: AtomicU64,
    failures: AtomicU64,
}

static GLOBAL: Lazy<ImplementationCache> = Lazy::new(ImplementationCache::new);

impl ImplementationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache used by `ai_implement`.
    pub fn global() -> &'static ImplementationCache {
        &GLOBAL
    }

    fn slot(&self, key: &StubKey) -> Slot {
        let mut slots = self.slots.lock();
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Returns the cached implementation, running `synthesize` only when the
    /// key has none. A failed synthesis leaves the key empty.
    pub fn get_or_synthesize<E>(
        &self,
        key: &StubKey,
        synthesize: impl FnOnce() -> Result<Implementation, E>,
    ) -> Result<Arc<Implementation>, E> {
        let slot = self.slot(key);
        if let Some(implementation) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(implementation));
        }

        let mut ran = false;
        let result = slot.get_or_try_init(|| {
            ran = true;
            synthesize().map(Arc::new)
        });
        match &result {
            Ok(_) if ran => {
                self.syntheses.fetch_add(1, Ordering::Relaxed);
            }
            Ok(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        result.map(Arc::clone)
    }

    pub fn get(&self, key: &StubKey) -> Option<Arc<Implementation>> {
        self.slots
            .lock()
            .get(key)
            .and_then(|slot| slot.get().cloned())
    }

    pub fn contains(&self, key: &StubKey) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&self, key: &StubKey) -> Option<Arc<Implementation>> {
        self.slots
            .lock()
            .remove(key)
            .and_then(|slot| slot.get().cloned())
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self
            .slots
            .lock()
            .values()
            .filter(|slot| slot.get().is_some())
            .count();
        CacheStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            syntheses: self.syntheses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ImplementationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImplementationCache")
            .field("stats", &self.stats())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub syntheses: u64,
    pub failures: u64,
}
