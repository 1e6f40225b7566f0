//! Correspondence cache: resolved mappings keyed by the sorted header sets
//! of the two tables involved, persisted write-through as JSON.
//!
//! File layout (compatible with caches written by earlier tools, which lack
//! the `orders` object):
//!
//! ```json
//! {
//!   "姓名,学号,序号|姓名,学号": {
//!     "1_to_2": { "0": "2", "1": "1" },
//!     "last_updated": "2026-01-07T09:30:00.000000",
//!     "orders": { "1_to_2": { "left": ["序号", "学号", "姓名"], "right": ["姓名", "学号"] } }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MergeError;
use crate::model::{ColumnMapping, MappingType};

/// Capability set of a correspondence store.
///
/// `lookup(a, b, t)` returns a mapping `{index in b: index in a}` that refers
/// to the lists exactly as passed in.
pub trait MappingStore {
    fn lookup(&self, left: &[String], right: &[String], mapping_type: MappingType) -> Option<ColumnMapping>;

    fn store(
        &mut self,
        left: &[String],
        right: &[String],
        mapping_type: MappingType,
        mapping: &ColumnMapping,
    ) -> Result<(), MergeError>;

    fn clear(&mut self) -> Result<(), MergeError>;
}

/// Header lists in their order at store time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct HeaderOrder {
    left: Vec<String>,
    right: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    orders: BTreeMap<String, HeaderOrder>,
    /// mapping type tag → { "source index" → "target index" }
    #[serde(flatten)]
    mappings: BTreeMap<String, BTreeMap<String, String>>,
}

/// Summary row for listing a cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntrySummary {
    pub key: String,
    pub mapping_types: Vec<String>,
    pub last_updated: Option<String>,
}

/// JSON-file backed [`MappingStore`]. One instance owns the in-memory state
/// for a run; every `store` flushes the whole cache.
#[derive(Debug)]
pub struct MappingCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, CacheEntry>,
}

impl MappingCache {
    /// Load from `path`. A missing file is an empty cache. An unreadable file
    /// degrades to an empty cache; a malformed entry is dropped on its own.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path);
        log::debug!("cache {}: {} entries", path.display(), entries.len());
        Self {
            path: Some(path),
            entries,
        }
    }

    /// Cache that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> Vec<CacheEntrySummary> {
        self.entries
            .iter()
            .map(|(key, entry)| CacheEntrySummary {
                key: key.clone(),
                mapping_types: entry.mappings.keys().cloned().collect(),
                last_updated: entry.last_updated.clone(),
            })
            .collect()
    }

    fn persist(&self) -> Result<(), MergeError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    MergeError::Io(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| MergeError::Io(format!("cannot serialize cache: {e}")))?;

        // Write beside the target, then rename over it: a crash mid-write
        // leaves the previous file intact.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| MergeError::Io(format!("cannot write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, path)
            .map_err(|e| MergeError::Io(format!("cannot replace {}: {e}", path.display())))
    }
}

impl MappingStore for MappingCache {
    fn lookup(&self, left: &[String], right: &[String], mapping_type: MappingType) -> Option<ColumnMapping> {
        let key = cache_key(left, right);
        let entry = self.entries.get(&key)?;
        let stored = entry.mappings.get(mapping_type.tag())?;

        let mut pairs = Vec::with_capacity(stored.len());
        for (k, v) in stored {
            match (k.trim().parse::<usize>(), v.trim().parse::<usize>()) {
                (Ok(s), Ok(t)) => pairs.push((s, t)),
                _ => {
                    log::warn!("cache entry '{key}' [{mapping_type}]: non-numeric pair {k:?} -> {v:?}, ignoring entry");
                    return None;
                }
            }
        }

        if let Some(order) = entry.orders.get(mapping_type.tag()) {
            if order.left != left || order.right != right {
                log::debug!("cache entry '{key}' [{mapping_type}]: column order changed, remapping by label");
                pairs = remap_pairs(&pairs, order, left, right)?;
            }
        }

        let mapping: ColumnMapping = pairs.into_iter().collect();
        if !mapping.fits(right.len(), left.len()) {
            log::warn!("cache entry '{key}' [{mapping_type}]: index out of range, ignoring entry");
            return None;
        }
        Some(mapping)
    }

    fn store(
        &mut self,
        left: &[String],
        right: &[String],
        mapping_type: MappingType,
        mapping: &ColumnMapping,
    ) -> Result<(), MergeError> {
        let key = cache_key(left, right);
        let entry = self.entries.entry(key).or_default();

        entry.mappings.insert(
            mapping_type.tag().to_string(),
            mapping
                .iter()
                .map(|(s, t)| (s.to_string(), t.to_string()))
                .collect(),
        );
        entry.orders.insert(
            mapping_type.tag().to_string(),
            HeaderOrder {
                left: left.to_vec(),
                right: right.to_vec(),
            },
        );
        entry.last_updated = Some(
            chrono::Local::now()
                .naive_local()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
        );

        self.persist()
    }

    fn clear(&mut self) -> Result<(), MergeError> {
        self.entries.clear();
        self.persist()
    }
}

/// Order-insensitive key: both lists sorted, comma-joined, pipe-separated.
pub fn cache_key(left: &[String], right: &[String]) -> String {
    let mut l: Vec<&str> = left.iter().map(String::as_str).collect();
    let mut r: Vec<&str> = right.iter().map(String::as_str).collect();
    l.sort_unstable();
    r.sort_unstable();
    format!("{}|{}", l.join(","), r.join(","))
}

fn load_entries(path: &Path) -> BTreeMap<String, CacheEntry> {
    if !path.exists() {
        return BTreeMap::new();
    }

    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("cannot read cache {}: {e}; starting cold", path.display());
            return BTreeMap::new();
        }
    };

    let root: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(m) => m,
        Err(e) => {
            log::warn!("cache {} is corrupt ({e}); starting cold", path.display());
            return BTreeMap::new();
        }
    };

    let mut entries = BTreeMap::new();
    for (key, value) in root {
        match serde_json::from_value::<CacheEntry>(value) {
            Ok(entry) => {
                entries.insert(key, entry);
            }
            Err(e) => log::warn!("dropping malformed cache entry '{key}': {e}"),
        }
    }
    entries
}

/// Re-express stored indices against the current lists by label identity:
/// the k-th occurrence of a label maps to its k-th occurrence now.
fn remap_pairs(
    pairs: &[(usize, usize)],
    order: &HeaderOrder,
    left: &[String],
    right: &[String],
) -> Option<Vec<(usize, usize)>> {
    pairs
        .iter()
        .map(|&(s, t)| {
            let s = relocate(s, &order.right, right)?;
            let t = relocate(t, &order.left, left)?;
            Some((s, t))
        })
        .collect()
}

fn relocate(index: usize, stored: &[String], current: &[String]) -> Option<usize> {
    let label = stored.get(index)?;
    let occurrence = stored[..index].iter().filter(|h| *h == label).count();
    current
        .iter()
        .enumerate()
        .filter(|(_, h)| *h == label)
        .nth(occurrence)
        .map(|(i, _)| i)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn h(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn key_is_sorted_and_pipe_separated() {
        let key = cache_key(&h(&["序号", "学号", "姓名"]), &h(&["姓名", "学号"]));
        let mut l = vec!["序号", "学号", "姓名"];
        l.sort();
        let mut r = vec!["姓名", "学号"];
        r.sort();
        assert_eq!(key, format!("{}|{}", l.join(","), r.join(",")));
    }

    #[test]
    fn store_then_lookup_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let canonical = h(&["序号", "学号", "姓名"]);
        let secondary = h(&["姓名", "学号"]);
        let mapping: ColumnMapping = [(0, 2), (1, 1)].into_iter().collect();

        let mut cache = MappingCache::open(&path);
        cache
            .store(&canonical, &secondary, MappingType::CanonicalSecondary, &mapping)
            .unwrap();

        let reopened = MappingCache::open(&path);
        assert_eq!(
            reopened.lookup(&canonical, &secondary, MappingType::CanonicalSecondary),
            Some(mapping)
        );
        assert_eq!(
            reopened.lookup(&canonical, &secondary, MappingType::CanonicalEnrichment),
            None
        );
    }

    #[test]
    fn persisted_form_is_textual() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = MappingCache::open(&path);
        let mapping: ColumnMapping = [(0, 2)].into_iter().collect();
        cache
            .store(&h(&["a", "b", "c"]), &h(&["c"]), MappingType::CanonicalSecondary, &mapping)
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let entry = &raw["a,b,c|c"];
        assert_eq!(entry["1_to_2"]["0"], "2");
        assert!(entry["last_updated"].is_string());
    }

    #[test]
    fn reordered_headers_hit_and_are_remapped() {
        let mut cache = MappingCache::in_memory();
        let canonical = h(&["序号", "学号", "姓名"]);
        let secondary = h(&["姓名", "学号"]);
        let mapping: ColumnMapping = [(0, 2), (1, 1)].into_iter().collect();
        cache
            .store(&canonical, &secondary, MappingType::CanonicalSecondary, &mapping)
            .unwrap();

        let canonical2 = h(&["姓名", "序号", "学号"]);
        let secondary2 = h(&["学号", "姓名"]);
        let got = cache
            .lookup(&canonical2, &secondary2, MappingType::CanonicalSecondary)
            .unwrap();
        // 姓名: secondary2[1] -> canonical2[0]; 学号: secondary2[0] -> canonical2[2]
        assert_eq!(got.target_for(1), Some(0));
        assert_eq!(got.target_for(0), Some(2));
    }

    #[test]
    fn legacy_entries_without_orders_are_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(
            &path,
            r#"{
  "a,b|x,y": { "1_to_3": { "1": "0" }, "last_updated": "2025-01-01T00:00:00" },
  "broken": { "1_to_2": 7 }
}"#,
        )
        .unwrap();

        let cache = MappingCache::open(&path);
        assert_eq!(cache.len(), 1, "malformed entry is dropped alone");
        let got = cache
            .lookup(&h(&["b", "a"]), &h(&["y", "x"]), MappingType::CanonicalEnrichment)
            .unwrap();
        assert_eq!(got.target_for(1), Some(0));
    }

    #[test]
    fn corrupt_file_degrades_to_cold_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();
        let cache = MappingCache::open(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_persists_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let mut cache = MappingCache::open(&path);
        let mapping: ColumnMapping = [(0, 0)].into_iter().collect();
        cache
            .store(&h(&["a"]), &h(&["b"]), MappingType::CanonicalSecondary, &mapping)
            .unwrap();
        cache.clear().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "{}");
        assert!(MappingCache::open(&path).is_empty());
    }

    #[test]
    fn store_overwrites_previous_mapping() {
        let mut cache = MappingCache::in_memory();
        let l = h(&["a", "b"]);
        let r = h(&["x", "y"]);
        let first: ColumnMapping = [(0, 0)].into_iter().collect();
        let second: ColumnMapping = [(1, 0), (0, 1)].into_iter().collect();
        cache.store(&l, &r, MappingType::CanonicalSecondary, &first).unwrap();
        cache.store(&l, &r, MappingType::CanonicalSecondary, &second).unwrap();
        assert_eq!(cache.lookup(&l, &r, MappingType::CanonicalSecondary), Some(second));
    }

    proptest! {
        #[test]
        fn key_ignores_column_order(
            left in proptest::collection::vec("[a-z]{1,4}", 1..8),
            right in proptest::collection::vec("[a-z]{1,4}", 1..8),
            seed in any::<u64>(),
        ) {
            let mut l2 = left.clone();
            let mut r2 = right.clone();
            let n = l2.len();
            l2.rotate_left((seed as usize) % n);
            let m = r2.len();
            r2.reverse();
            r2.rotate_left((seed as usize >> 8) % m);
            prop_assert_eq!(cache_key(&left, &right), cache_key(&l2, &r2));
        }

        #[test]
        fn store_lookup_round_trip(
            left in proptest::collection::vec("[a-z]{1,3}", 1..6),
            right in proptest::collection::vec("[a-z]{1,3}", 1..6),
        ) {
            let mapping: ColumnMapping = (0..right.len().min(left.len()))
                .map(|i| (i, left.len() - 1 - i))
                .collect();
            let mut cache = MappingCache::in_memory();
            cache.store(&left, &right, MappingType::CanonicalEnrichment, &mapping).unwrap();
            prop_assert_eq!(
                cache.lookup(&left, &right, MappingType::CanonicalEnrichment),
                Some(mapping)
            );
        }
    }
}
