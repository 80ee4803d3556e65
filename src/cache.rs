use crate::transform::{transpile, TranspiledUnit};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::trace;

struct CacheEntry {
    hash: String,
    unit: TranspiledUnit,
    pass: u64,
}

/// Transform results keyed by source path, valid while the content hash
/// matches. Entries not touched during a pass are evicted by [`sweep`].
///
/// [`sweep`]: TransformCache::sweep
#[derive(Default)]
pub struct TransformCache {
    entries: HashMap<String, CacheEntry>,
    pass: u64,
    hits: u64,
    misses: u64,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_hash(source: &str, is_root: bool) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([is_root as u8]);
        format!("{:x}", hasher.finalize())
    }

    /// Start a new assembly pass.
    pub fn begin_pass(&mut self) {
        self.pass += 1;
    }

    pub fn get(&mut self, file_path: &str, source: &str, is_root: bool) -> Option<TranspiledUnit> {
        let pass = self.pass;
        let entry = self.entries.get_mut(file_path)?;
        if entry.hash != Self::compute_hash(source, is_root) {
            return None;
        }
        entry.pass = pass;
        Some(entry.unit.clone())
    }

    pub fn set(&mut self, file_path: &str, source: &str, is_root: bool, unit: TranspiledUnit) {
        let hash = Self::compute_hash(source, is_root);
        self.entries.insert(
            file_path.to_string(),
            CacheEntry {
                hash,
                unit,
                pass: self.pass,
            },
        );
    }

    /// Cached transform of one file, computing it on a miss.
    pub fn transpile(&mut self, file_path: &str, source: &str, is_root: bool) -> TranspiledUnit {
        if let Some(unit) = self.get(file_path, source, is_root) {
            self.hits += 1;
            trace!("transform cache hit for {}", file_path);
            return unit;
        }
        self.misses += 1;
        let unit = transpile(file_path, source, is_root);
        self.set(file_path, source, is_root, unit.clone());
        unit
    }

    /// Drop entries for files that were not part of the current pass.
    pub fn sweep(&mut self) -> usize {
        let pass = self.pass;
        let before = self.entries.len();
        self.entries.retain(|_, e| e.pass == pass);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_requires_same_content_and_role() {
        let mut cache = TransformCache::new();
        cache.begin_pass();
        let a = cache.transpile("App.jsx", "export default () => null;", false);
        let b = cache.transpile("App.jsx", "export default () => null;", false);
        assert_eq!(a, b);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));

        cache.transpile("App.jsx", "export default () => null;", true);
        cache.transpile("App.jsx", "export default () => 1;", true);
        assert_eq!(cache.misses(), 3);
    }

    #[test]
    fn test_sweep_evicts_unused() {
        let mut cache = TransformCache::new();
        cache.begin_pass();
        cache.transpile("a.js", "const a = 1;", false);
        cache.transpile("b.js", "const b = 1;", false);

        cache.begin_pass();
        cache.transpile("a.js", "const a = 1;", false);
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
    }
}
