use std::cell::Cell;
use std::path::PathBuf;

use rosterlink_merge::model::{MappingOrigin, MappingType, MergeSources, Table};
use rosterlink_merge::{run, MappingCache, MergeConfig, MergeError, OfflineOracle, Oracle};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_config() -> MergeConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("winter-break.merge.toml")).unwrap();
    MergeConfig::from_toml(&toml).unwrap()
}

fn s(v: &[&str]) -> Vec<String> {
    v.iter().map(|x| x.to_string()).collect()
}

fn sources() -> MergeSources {
    MergeSources {
        canonical: s(&["序号", "学号", "姓名", "班级", "离校时间"]),
        secondary: Table::new(
            s(&["姓名", "学号", "离校时间"]),
            vec![s(&["Wang", "002", "1月20日"]), s(&["Li", "001", "1月18号"])],
        ),
        enrichment: Table::new(
            s(&["学号", "班级"]),
            vec![s(&["001", "AI-1"]), s(&["002", "AI-2"]), s(&["003", "AI-3"])],
        ),
    }
}

/// Answers like a well-behaved classification service.
struct Scripted {
    classify_calls: Cell<usize>,
    date_calls: Cell<usize>,
}

impl Scripted {
    fn new() -> Self {
        Self {
            classify_calls: Cell::new(0),
            date_calls: Cell::new(0),
        }
    }
}

impl Oracle for Scripted {
    fn classify(&self, _: &[String], _: &[String], t: MappingType) -> Result<String, String> {
        self.classify_calls.set(self.classify_calls.get() + 1);
        Ok(match t {
            MappingType::CanonicalSecondary => "根据表头分析，对应关系如下：\n\
                 1. 表1的第3列 对应 表2的第1列\n\
                 2. 表1的第2列 对应 表2的第2列\n\
                 3. 表1的第5列 对应 表2的第3列。"
                .to_string(),
            MappingType::CanonicalEnrichment => {
                "表1的第2列 对应 表3的第1列\n表1的第4列 对应 表3的第2列".to_string()
            }
            MappingType::SecondaryEnrichment => String::new(),
        })
    }

    fn normalize_dates(&self, values: &[String]) -> Result<String, String> {
        self.date_calls.set(self.date_calls.get() + 1);
        assert_eq!(values, &s(&["1月18号"]));
        Ok("01.18\n".into())
    }
}

// -------------------------------------------------------------------------
// End to end
// -------------------------------------------------------------------------

#[test]
fn cold_cache_merges_and_persists_mappings() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("mapping_cache.json");
    let config = load_config();
    let oracle = Scripted::new();

    let mut cache = MappingCache::open(&cache_path);
    let (table, report) = run(&config, &sources(), &mut cache, &oracle).unwrap();

    assert_eq!(
        table.rows(),
        &[
            s(&["1", "001", "Li", "AI-1", "01.18"]),
            s(&["2", "002", "Wang", "AI-2", "01.20"]),
        ]
    );
    assert_eq!(report.meta.config_name, "Winter break roster");
    assert_eq!(report.stats.rows, 2);
    assert_eq!(report.stats.joined_rows, 2);
    assert_eq!(report.stats.dropped_rows, 1);
    assert_eq!(report.stats.dates_local, 1);
    assert_eq!(report.stats.dates_oracle, 1);
    assert!(report.mappings.iter().all(|m| m.origin == MappingOrigin::Oracle));
    assert_eq!(oracle.classify_calls.get(), 2);

    let persisted: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&cache_path).unwrap()).unwrap();
    let entries = persisted.as_object().unwrap();
    assert_eq!(entries.len(), 2);
}

#[test]
fn warm_cache_skips_classification() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("mapping_cache.json");
    let config = load_config();

    let first = Scripted::new();
    let mut cache = MappingCache::open(&cache_path);
    let (expected, _) = run(&config, &sources(), &mut cache, &first).unwrap();

    let second = Scripted::new();
    let mut reopened = MappingCache::open(&cache_path);
    let (table, report) = run(&config, &sources(), &mut reopened, &second).unwrap();

    assert_eq!(table, expected);
    assert_eq!(second.classify_calls.get(), 0);
    assert!(report.mappings.iter().all(|m| m.origin == MappingOrigin::Cache));
}

#[test]
fn warm_cache_survives_reordered_secondary_columns() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("mapping_cache.json");
    let config = load_config();

    let mut cache = MappingCache::open(&cache_path);
    run(&config, &sources(), &mut cache, &Scripted::new()).unwrap();

    let mut reordered = sources();
    reordered.secondary = Table::new(
        s(&["学号", "离校时间", "姓名"]),
        vec![s(&["002", "1月20日", "Wang"]), s(&["001", "1月18号", "Li"])],
    );
    let oracle = Scripted::new();
    let (table, _) = run(&config, &reordered, &mut cache, &oracle).unwrap();

    assert_eq!(oracle.classify_calls.get(), 0);
    assert_eq!(table.value(0, "姓名"), Some("Li"));
    assert_eq!(table.value(1, "离校时间"), Some("01.20"));
}

// -------------------------------------------------------------------------
// Failures
// -------------------------------------------------------------------------

#[test]
fn offline_with_cold_cache_fails_before_merging() {
    let config = load_config();
    let mut cache = MappingCache::in_memory();
    let err = run(&config, &sources(), &mut cache, &OfflineOracle).unwrap_err();
    assert!(matches!(
        err,
        MergeError::OracleUnavailable {
            mapping: MappingType::CanonicalSecondary,
            ..
        }
    ));
    assert!(cache.is_empty());
}

#[test]
fn enrichment_mapping_without_key_is_unresolved() {
    struct NoKey;
    impl Oracle for NoKey {
        fn classify(&self, _: &[String], _: &[String], t: MappingType) -> Result<String, String> {
            Ok(match t {
                MappingType::CanonicalSecondary => "表1的第3列 对应 表2的第1列\n表1的第2列 对应 表2的第2列",
                _ => "表1的第4列 对应 表3的第2列",
            }
            .to_string())
        }
        fn normalize_dates(&self, _: &[String]) -> Result<String, String> {
            Err("offline".into())
        }
    }

    let config = load_config();
    let mut cache = MappingCache::in_memory();
    let err = run(&config, &sources(), &mut cache, &NoKey).unwrap_err();
    assert!(matches!(
        err,
        MergeError::MappingUnresolved {
            mapping: MappingType::CanonicalEnrichment,
            ..
        }
    ));
}
