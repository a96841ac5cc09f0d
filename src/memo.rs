use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use serde::Serialize;
use tracing::trace;

use crate::error::Result;

/// Content hash of a stage's inputs. Logically equal inputs produce equal
/// fingerprints no matter which allocation they live in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(blake3::Hash);

impl Fingerprint {
    pub fn of<T: Serialize + ?Sized>(stage: &str, input: &T) -> Result<Self> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(stage.as_bytes());
        hasher.update(&[0]);
        serde_json::to_writer(&mut hasher, input)?;
        Ok(Self(hasher.finalize()))
    }

    /// Key for a downstream stage: this fingerprint plus the stage's own
    /// parameters.
    pub fn derive<T: Serialize + ?Sized>(&self, stage: &str, params: &T) -> Result<Self> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.0.as_bytes());
        hasher.update(stage.as_bytes());
        hasher.update(&[0]);
        serde_json::to_writer(&mut hasher, params)?;
        Ok(Self(hasher.finalize()))
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Bounded least-recently-used memo table for one pipeline stage.
pub struct MemoCache<V> {
    name: &'static str,
    entries: LruCache<Fingerprint, Arc<V>>,
    hits: usize,
    misses: usize,
}

impl<V> MemoCache<V> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get_or_insert(&mut self, key: Fingerprint, compute: impl FnOnce() -> V) -> Arc<V> {
        match self.get_or_try_insert(key, || Ok::<_, std::convert::Infallible>(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Returns the cached value for `key`, or runs `compute` and caches its
    /// result. Failures are returned as-is and never cached.
    pub fn get_or_try_insert<E>(
        &mut self,
        key: Fingerprint,
        compute: impl FnOnce() -> std::result::Result<V, E>,
    ) -> std::result::Result<Arc<V>, E> {
        if let Some(value) = self.entries.get(&key) {
            self.hits += 1;
            trace!(cache = self.name, "hit");
            return Ok(Arc::clone(value));
        }

        self.misses += 1;
        trace!(cache = self.name, key = %key.to_hex(), "miss");
        let value = Arc::new(compute()?);
        self.entries.put(key, Arc::clone(&value));
        Ok(value)
    }

    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn key(value: u32) -> Fingerprint {
        Fingerprint::of("test", &value).expect("fingerprint")
    }

    #[test]
    fn equal_content_shares_a_fingerprint() {
        let first = vec![json!({ "child": "a" })];
        let second = vec![json!({ "child": "a" })];

        assert_eq!(
            Fingerprint::of("remap", &first).expect("fingerprint"),
            Fingerprint::of("remap", &second).expect("fingerprint")
        );
        assert_ne!(
            Fingerprint::of("remap", &first).expect("fingerprint"),
            Fingerprint::of("nodes", &first).expect("fingerprint")
        );
    }

    #[test]
    fn derived_keys_depend_on_params() {
        let base = key(1);
        assert_eq!(
            base.derive("size", &(1.0, 2.0)).expect("fingerprint"),
            base.derive("size", &(1.0, 2.0)).expect("fingerprint")
        );
        assert_ne!(
            base.derive("size", &(1.0, 2.0)).expect("fingerprint"),
            base.derive("size", &(1.0, 3.0)).expect("fingerprint")
        );
    }

    #[test]
    fn second_lookup_skips_compute() {
        let mut cache = MemoCache::new("test", 4);
        let mut calls = 0;

        let first = cache.get_or_insert(key(1), || {
            calls += 1;
            "value"
        });
        let second = cache.get_or_insert(key(1), || {
            calls += 1;
            "other"
        });

        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, entries: 1 });
        assert_eq!(cache.hit_rate(), 0.5);
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = MemoCache::new("test", 2);
        cache.get_or_insert(key(1), || 1);
        cache.get_or_insert(key(2), || 2);
        cache.get_or_insert(key(1), || 1);
        cache.get_or_insert(key(3), || 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&key(1)));
        assert!(!cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
    }

    #[test]
    fn failures_are_not_cached() {
        let mut cache: MemoCache<u32> = MemoCache::new("test", 2);

        let failed = cache.get_or_try_insert(key(1), || Err("not yet"));
        assert_eq!(failed, Err("not yet"));
        assert!(cache.is_empty());

        let value = cache.get_or_try_insert(key(1), || Ok::<_, &str>(5));
        assert_eq!(value.map(|value| *value), Ok(5));
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn zero_capacity_still_holds_one_entry() {
        let mut cache = MemoCache::new("test", 0);
        cache.get_or_insert(key(1), || 1);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.hits(), 0);
    }
}
