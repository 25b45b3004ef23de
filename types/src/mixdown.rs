use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;

/// A cached, fully-processed mixdown for one track path: the re-encoded
/// byte buffer plus its analysis. `timestamp_unix_ms` records insertion
/// time for diagnostics; eviction order in the cache is insertion order,
/// not recency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixdownCacheEntry {
    pub encoded_buffer: std::sync::Arc<[u8]>,
    pub bpm: u32,
    pub key: Option<String>,
    pub analysis: AnalysisResult,
    pub timestamp_unix_ms: u64,
}
