//! Mixdown Cache (§4.8): a per-session LRU keyed by track file path, whose
//! eviction order is insertion order, not recency — matching the "front of
//! an ordered list" eviction teacher's [`crate::corpus`] uses for the
//! corpus's own `index_by_id` lookup table shape (insertion-ordered map).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use drift_types::MixdownCacheEntry;

/// Cache hit/miss counters (§4.8 "Stats").
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    #[must_use]
    pub fn hit_rate(self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

/// LRU-by-insertion-order map from track path to its cached mixdown.
pub struct MixdownCache {
    max_size: usize,
    order: Vec<PathBuf>,
    entries: HashMap<PathBuf, MixdownCacheEntry>,
    stats: CacheStats,
}

impl MixdownCache {
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self { max_size: max_size.max(1), order: Vec::new(), entries: HashMap::new(), stats: CacheStats::default() }
    }

    #[must_use]
    pub fn get(&mut self, path: &Path) -> Option<&MixdownCacheEntry> {
        if self.entries.contains_key(path) {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        self.entries.get(path)
    }

    /// Insert an entry, evicting the oldest (front of insertion order) once
    /// `size >= max_size`.
    pub fn insert(&mut self, path: PathBuf, entry: MixdownCacheEntry) {
        if !self.entries.contains_key(&path) {
            self.order.push(path.clone());
        }
        self.entries.insert(path, entry);
        while self.entries.len() > self.max_size {
            let oldest = self.order.remove(0);
            self.entries.remove(&oldest);
        }
    }

    /// Drop every entry (§3 lifecycle: "cleared entirely on a 'new
    /// neighborhood' transition signal").
    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Basenames of currently cached track paths, for diagnostics.
    #[must_use]
    pub fn cached_basenames(&self) -> Vec<String> {
        self.order.iter().map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_types::AnalysisResult;
    use pretty_assertions::assert_eq;

    fn entry() -> MixdownCacheEntry {
        MixdownCacheEntry {
            encoded_buffer: std::sync::Arc::from(vec![0u8; 4]),
            bpm: 120,
            key: None,
            analysis: AnalysisResult {
                bpm: 120,
                key: None,
                nominal_duration_seconds: 180.0,
                actual_duration_seconds: 179.0,
                rms: 0.1,
                peaks: Vec::new(),
                crossfade_lead_time_seconds: 6.0,
            },
            timestamp_unix_ms: 0,
        }
    }

    #[test]
    fn oldest_entry_is_evicted_first() {
        let mut cache = MixdownCache::new(2);
        cache.insert(PathBuf::from("a"), entry());
        cache.insert(PathBuf::from("b"), entry());
        cache.insert(PathBuf::from("c"), entry());
        assert_eq!(cache.size(), 2);
        assert!(cache.get(&PathBuf::from("a")).is_none());
        assert!(cache.get(&PathBuf::from("c")).is_some());
    }

    #[test]
    fn hit_rate_tracks_gets() {
        let mut cache = MixdownCache::new(4);
        cache.insert(PathBuf::from("a"), entry());
        let _ = cache.get(&PathBuf::from("a"));
        let _ = cache.get(&PathBuf::from("missing"));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
        assert!((cache.stats().hit_rate() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn clear_drops_everything() {
        let mut cache = MixdownCache::new(4);
        cache.insert(PathBuf::from("a"), entry());
        cache.clear();
        assert_eq!(cache.size(), 0);
        assert!(cache.cached_basenames().is_empty());
    }
}
