//! Codec string normalisation.
//!
//! Manifests carry full RFC 6381 codec strings (`avc1.64001f`, `mp4a.40.2`).
//! Comparisons between representations only care about the codec family, so
//! callers normalise through a [`CodecCache`] they own.

use std::collections::HashMap;

/// Default number of entries kept before the cache is flushed.
const DEFAULT_CAPACITY: usize = 256;

/// Bounded memo cache for [`normalize_codec`].
#[derive(Debug, Clone)]
pub struct CodecCache {
    entries: HashMap<String, String>,
    capacity: usize,
}

impl CodecCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Normalise a codec string, reusing a previous result when present.
    pub fn normalize(&mut self, codec: &str) -> String {
        if let Some(hit) = self.entries.get(codec) {
            return hit.clone();
        }

        let normalized = normalize_codec(codec);
        if self.entries.len() >= self.capacity {
            self.entries.clear();
        }
        self.entries.insert(codec.to_string(), normalized.clone());
        normalized
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for CodecCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Map a full codec string to its family name.
pub fn normalize_codec(codec: &str) -> String {
    let lower = codec.trim().to_lowercase();
    let (base, profile) = match lower.split_once('.') {
        Some((base, profile)) => (base, profile),
        None => (lower.as_str(), ""),
    };

    let family = match (base, profile) {
        ("mp4a", "69" | "6b" | "40.34") => "mp3",
        ("mp4a", "66" | "67" | "68" | "40.2" | "40.02" | "40.5" | "40.05" | "40.29" | "40.42") => {
            "aac"
        }
        ("mp4a", "a5") | ("ac-3" | "ac3", _) => "ac-3",
        ("mp4a", "a6") | ("ec-3" | "ec3", _) => "ec-3",
        ("mp4a", "b2") | ("dtsx", _) => "dtsx",
        ("mp4a", "a9") | ("dtsc", _) => "dtsc",
        ("ac-4" | "ac4", _) => "ac-4",
        ("vp09" | "vp9", _) => "vp9",
        ("vp08" | "vp8", _) => "vp8",
        ("avc1" | "avc3", _) => "avc",
        ("hvc1" | "hev1", _) => "hevc",
        ("dvh1" | "dvhe", _) => "dovi-hevc",
        ("dva1" | "dvav", _) => "dovi-avc",
        ("dav1", _) => "dovi-av1",
        ("av01", _) => "av1",
        _ => return lower,
    };
    family.to_string()
}
