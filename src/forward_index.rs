//! Per-segment forward index and the cache-gated reader combinator (C3).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::error::Result;
use crate::space_usage::SpaceUsage;
use crate::sparse_vector::SparseVector;
use crate::wire::CircuitBreakerSettings;

/// `read(doc_id) -> Option<SparseVector>`; `None` means the document does
/// not exist in this segment or has no value for this field.
pub trait ForwardIndexReader {
    fn read(&self, doc_id: u32) -> Result<Option<SparseVector>>;
}

pub trait ForwardIndexWriter {
    fn write(&mut self, doc_id: u32, vector: SparseVector) -> Result<()>;
}

/// In-memory, per-segment `doc_id -> SparseVector` mapping. Built at flush
/// or merge time and dropped when the segment is released.
#[derive(Debug, Default)]
pub struct ForwardIndex {
    values: Vec<Option<SparseVector>>,
}

impl ForwardIndex {
    pub fn with_capacity(num_docs: usize) -> Self {
        let mut values = Vec::with_capacity(num_docs);
        values.resize_with(num_docs, || None);
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates the vectors actually present, skipping docs with no value
    /// for this field. Used by [`crate::space_usage`] byte accounting.
    pub fn iter_present(&self) -> impl Iterator<Item = &SparseVector> {
        self.values.iter().filter_map(|slot| slot.as_ref())
    }
}

impl ForwardIndexReader for ForwardIndex {
    fn read(&self, doc_id: u32) -> Result<Option<SparseVector>> {
        Ok(self
            .values
            .get(doc_id as usize)
            .and_then(|slot| slot.clone()))
    }
}

impl ForwardIndexWriter for ForwardIndex {
    fn write(&mut self, doc_id: u32, vector: SparseVector) -> Result<()> {
        if doc_id as usize >= self.values.len() {
            self.values.resize_with(doc_id as usize + 1, || None);
        }
        self.values[doc_id as usize] = Some(vector);
        Ok(())
    }
}

/// A reader that never has data for this field — the combinator applied to
/// a null source, rather than a bespoke type.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSource;

impl ForwardIndexReader for NullSource {
    fn read(&self, _doc_id: u32) -> Result<Option<SparseVector>> {
        Ok(None)
    }
}

/// Shared interface for the process-wide forward-index cache. Must tolerate
/// being globally disabled (circuit-breaker at 0%): every lookup then
/// misses, and results must be identical to the pass-through source.
pub trait ForwardIndexCache: Send + Sync {
    fn get(&self, doc_id: u32) -> Option<SparseVector>;
    fn insert(&self, doc_id: u32, vector: SparseVector);
    fn disabled(&self) -> bool;
}

/// Simple process-wide cache keyed only by `doc_id` within one
/// `(segment, field)` scope — callers key one instance per
/// `(segment-id, field)` pair.
pub struct MapCache {
    enabled: bool,
    entries: RwLock<HashMap<u32, SparseVector>>,
}

impl MapCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn disabled_cache() -> Self {
        Self::new(false)
    }
}

impl ForwardIndexCache for MapCache {
    fn get(&self, doc_id: u32) -> Option<SparseVector> {
        if !self.enabled {
            return None;
        }
        self.entries.read().expect("cache lock poisoned").get(&doc_id).cloned()
    }

    fn insert(&self, doc_id: u32, vector: SparseVector) {
        if !self.enabled {
            return;
        }
        self.entries
            .write()
            .expect("cache lock poisoned")
            .entry(doc_id)
            .or_insert(vector);
    }

    fn disabled(&self) -> bool {
        !self.enabled
    }
}

/// `MapCache` wrapped with a byte budget derived from a
/// [`CircuitBreakerSettings`] percentage: once occupied bytes would exceed
/// the budget, further inserts are dropped rather than growing the cache
/// unbounded. Eviction policy stays external — this only gates growth, it
/// never evicts.
pub struct BudgetedCache {
    inner: MapCache,
    budget_bytes: usize,
    occupied_bytes: AtomicUsize,
}

impl BudgetedCache {
    pub fn new(settings: CircuitBreakerSettings, total_memory_bytes: usize) -> Self {
        let budget_bytes = if settings.cache_disabled() {
            0
        } else {
            ((settings.cache_limit_percent / 100.0) * total_memory_bytes as f32) as usize
        };
        Self {
            inner: MapCache::new(!settings.cache_disabled()),
            budget_bytes,
            occupied_bytes: AtomicUsize::new(0),
        }
    }

    pub fn occupied_bytes(&self) -> usize {
        self.occupied_bytes.load(Ordering::Relaxed)
    }
}

impl ForwardIndexCache for BudgetedCache {
    fn get(&self, doc_id: u32) -> Option<SparseVector> {
        self.inner.get(doc_id)
    }

    fn insert(&self, doc_id: u32, vector: SparseVector) {
        if self.disabled() {
            return;
        }
        let size = vector.space_usage_byte();
        if self.occupied_bytes.load(Ordering::Relaxed) + size > self.budget_bytes {
            return;
        }
        self.inner.insert(doc_id, vector);
        self.occupied_bytes.fetch_add(size, Ordering::Relaxed);
    }

    fn disabled(&self) -> bool {
        self.inner.disabled()
    }
}

/// "First try cache, else populate from fallback" combinator. A
/// `NoopReader` is simply `CacheGatedReader<MapCache::disabled_cache, NullSource>`.
pub struct CacheGatedReader<C, F> {
    cache: C,
    fallback: F,
}

impl<C, F> CacheGatedReader<C, F>
where
    C: ForwardIndexCache,
    F: ForwardIndexReader,
{
    pub fn new(cache: C, fallback: F) -> Self {
        Self { cache, fallback }
    }
}

impl<C, F> ForwardIndexReader for CacheGatedReader<C, F>
where
    C: ForwardIndexCache,
    F: ForwardIndexReader,
{
    fn read(&self, doc_id: u32) -> Result<Option<SparseVector>> {
        if let Some(hit) = self.cache.get(doc_id) {
            return Ok(Some(hit));
        }
        let value = self.fallback.read(doc_id)?;
        if let Some(ref vector) = value {
            self.cache.insert(doc_id, vector.clone());
        }
        Ok(value)
    }
}

pub type NoopReader = CacheGatedReader<MapCache, NullSource>;

pub fn noop_reader() -> NoopReader {
    CacheGatedReader::new(MapCache::disabled_cache(), NullSource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_reader_returns_none_for_every_doc() {
        let reader = noop_reader();
        assert_eq!(reader.read(0).unwrap(), None);
        assert_eq!(reader.read(9999).unwrap(), None);
    }

    #[test]
    fn budgeted_cache_at_zero_percent_behaves_disabled() {
        let settings = CircuitBreakerSettings::new(0.0).unwrap();
        let cache = BudgetedCache::new(settings, 1_000_000);
        assert!(cache.disabled());
        let v = SparseVector::from_sorted_items(vec![(1, 5)]).unwrap();
        cache.insert(0, v);
        assert_eq!(cache.get(0), None);
        assert_eq!(cache.occupied_bytes(), 0);
    }

    #[test]
    fn budgeted_cache_rejects_inserts_once_budget_exceeded() {
        let settings = CircuitBreakerSettings::new(100.0).unwrap();
        // budget tiny enough that a single non-empty vector exceeds it.
        let cache = BudgetedCache::new(settings, 1);
        let v = SparseVector::from_sorted_items(vec![(1, 5), (2, 9)]).unwrap();
        cache.insert(0, v);
        assert_eq!(cache.get(0), None);
        assert_eq!(cache.occupied_bytes(), 0);
    }

    #[test]
    fn cache_equivalence_enabled_vs_disabled() {
        let mut forward = ForwardIndex::with_capacity(3);
        let v = SparseVector::from_sorted_items(vec![(1, 5)]).unwrap();
        forward.write(1, v.clone()).unwrap();

        let enabled = CacheGatedReader::new(MapCache::new(true), forward_clone(&forward));
        let disabled = CacheGatedReader::new(MapCache::new(false), forward_clone(&forward));

        for doc in 0..3u32 {
            assert_eq!(enabled.read(doc).unwrap(), disabled.read(doc).unwrap());
        }
        // populate the cache and re-read: still equal to the pass-through.
        assert_eq!(enabled.read(1).unwrap(), Some(v));
    }

    // helper: ForwardIndex doesn't implement Clone (SparseVector does), build a copy manually.
    fn forward_clone(src: &ForwardIndex) -> ForwardIndex {
        let mut copy = ForwardIndex::with_capacity(src.len());
        for doc_id in 0..src.len() as u32 {
            if let Some(v) = src.read(doc_id).unwrap() {
                copy.write(doc_id, v).unwrap();
            }
        }
        copy
    }
}
