use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::cache::MappingStore;
use crate::config::{ColumnRoles, DuplicateKeyPolicy, MergeConfig};
use crate::dates::normalize_column;
use crate::error::MergeError;
use crate::model::{
    CanonicalTable, ColumnMapping, HeaderList, MappingType, MergeMeta, MergeReport, MergeSources,
    MergeStats, Table,
};
use crate::oracle::Oracle;
use crate::resolve::{resolve_mapping, Requirement};

/// Resolve both mappings, then merge. Nothing is returned unless every
/// phase succeeded.
pub fn run(
    config: &MergeConfig,
    sources: &MergeSources,
    store: &mut dyn MappingStore,
    oracle: &dyn Oracle,
) -> Result<(CanonicalTable, MergeReport), MergeError> {
    let engine = MergeEngine::new(
        sources.canonical.clone(),
        config.columns.clone(),
        config.join.duplicate_keys,
    );

    let secondary = resolve_mapping(
        store,
        oracle,
        &sources.canonical,
        &sources.secondary.headers,
        MappingType::CanonicalSecondary,
        Requirement::default(),
    )?;

    let key_requirement = Requirement {
        target: engine
            .key_column()
            .map(|c| (c, engine.roles.natural_key.as_str())),
    };
    let enrichment = resolve_mapping(
        store,
        oracle,
        &sources.canonical,
        &sources.enrichment.headers,
        MappingType::CanonicalEnrichment,
        key_requirement,
    )?;

    let (table, stats) = engine.merge(
        &sources.secondary,
        &sources.enrichment,
        &secondary.mapping,
        &enrichment.mapping,
        oracle,
    )?;

    let report = MergeReport {
        meta: MergeMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        mappings: vec![secondary, enrichment],
        stats,
        output: None,
    };

    Ok((table, report))
}

/// Builds the canonical table from the secondary and enrichment tables.
///
/// Phases run strictly in order on a table owned by the call:
/// 1. projection of secondary columns into canonical columns,
/// 2. natural-key join of enrichment rows (overwrite, never insert),
/// 3. ordering by natural key and renumbering.
pub struct MergeEngine {
    canonical: HeaderList,
    roles: ColumnRoles,
    duplicate_keys: DuplicateKeyPolicy,
}

impl MergeEngine {
    pub fn new(canonical: HeaderList, roles: ColumnRoles, duplicate_keys: DuplicateKeyPolicy) -> Self {
        Self {
            canonical,
            roles,
            duplicate_keys,
        }
    }

    pub fn canonical(&self) -> &[String] {
        &self.canonical
    }

    pub fn key_column(&self) -> Option<usize> {
        self.column(&self.roles.natural_key)
    }

    pub fn sequence_column(&self) -> Option<usize> {
        self.roles
            .sequence
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(|s| self.column(s))
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.canonical.iter().position(|h| h == name)
    }

    pub fn merge(
        &self,
        secondary: &Table,
        enrichment: &Table,
        secondary_mapping: &ColumnMapping,
        enrichment_mapping: &ColumnMapping,
        oracle: &dyn Oracle,
    ) -> Result<(CanonicalTable, MergeStats), MergeError> {
        let width = self.canonical.len();
        check_mapping(MappingType::CanonicalSecondary, secondary_mapping, secondary.width(), width)?;
        check_mapping(MappingType::CanonicalEnrichment, enrichment_mapping, enrichment.width(), width)?;

        let mut stats = MergeStats::default();
        let mut out = self.project(secondary, secondary_mapping, &mut stats);

        if let Some(kc) = out.key_column {
            for row in &mut out.table.rows {
                row[kc] = normalize_key(&row[kc]);
            }
        }
        self.normalize_dates(&mut out, oracle, &mut stats);

        self.join(&mut out, enrichment, enrichment_mapping, &mut stats)?;
        order_rows(&mut out);

        stats.rows = out.row_count();
        Ok((out, stats))
    }

    // -----------------------------------------------------------------------
    // Phase 1
    // -----------------------------------------------------------------------

    fn project(&self, secondary: &Table, mapping: &ColumnMapping, stats: &mut MergeStats) -> CanonicalTable {
        let width = self.canonical.len();
        let n = secondary.row_count();
        let sequence_column = self.sequence_column();

        let mut rows = vec![vec![String::new(); width]; n];
        if let Some(sc) = sequence_column {
            for (i, row) in rows.iter_mut().enumerate() {
                row[sc] = (i + 1).to_string();
            }
        }

        for (source, target) in mapping.iter() {
            for (i, row) in rows.iter_mut().enumerate() {
                row[target] = secondary.cell(i, source).to_string();
            }
        }
        stats.projected_columns = mapping.len();

        CanonicalTable {
            table: Table::new(self.canonical.clone(), rows),
            key_column: self.key_column(),
            sequence_column,
        }
    }

    fn normalize_dates(&self, out: &mut CanonicalTable, oracle: &dyn Oracle, stats: &mut MergeStats) {
        for name in &self.roles.dates {
            let Some(col) = self.column(name) else {
                continue;
            };
            let values = out.table.column(col);
            let (normalized, date_stats) = normalize_column(&values, oracle);
            for (row, value) in out.table.rows.iter_mut().zip(normalized) {
                row[col] = value;
            }
            stats.dates_local += date_stats.local;
            stats.dates_oracle += date_stats.oracle;
        }
    }

    // -----------------------------------------------------------------------
    // Phase 2
    // -----------------------------------------------------------------------

    fn join(
        &self,
        out: &mut CanonicalTable,
        enrichment: &Table,
        mapping: &ColumnMapping,
        stats: &mut MergeStats,
    ) -> Result<(), MergeError> {
        stats.enrichment_rows = enrichment.row_count();

        let Some(kc) = out.key_column else {
            log::info!(
                "canonical schema has no '{}' column, skipping the key join",
                self.roles.natural_key
            );
            return Ok(());
        };
        let ek = mapping.source_for(kc).ok_or_else(|| MergeError::MappingUnresolved {
            mapping: MappingType::CanonicalEnrichment,
            reason: format!("no correspondence for key column '{}'", self.roles.natural_key),
        })?;

        let keys: Vec<String> = (0..enrichment.row_count())
            .map(|r| normalize_key(enrichment.cell(r, ek)))
            .collect();

        let mut seen: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (r, key) in keys.iter().enumerate() {
            if !key.is_empty() {
                seen.entry(key.as_str()).or_default().push(r);
            }
        }
        for (key, rows) in seen.iter().filter(|(_, rows)| rows.len() > 1) {
            if self.duplicate_keys == DuplicateKeyPolicy::Reject {
                return Err(MergeError::DuplicateKey {
                    key: key.to_string(),
                    rows: rows.clone(),
                });
            }
            log::warn!("key '{key}' appears {} times in the enrichment table; last row wins", rows.len());
            stats.duplicate_keys.push(key.to_string());
        }

        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, row) in out.table.rows.iter().enumerate() {
            if !row[kc].is_empty() {
                by_key.entry(row[kc].clone()).or_default().push(i);
            }
        }

        for (r, key) in keys.iter().enumerate() {
            let Some(targets) = by_key.get(key.as_str()).filter(|_| !key.is_empty()) else {
                log::debug!("enrichment row {}: key '{key}' not in roster, dropped", r + 1);
                stats.dropped_rows += 1;
                continue;
            };
            for &i in targets {
                let row = &mut out.table.rows[i];
                for (source, target) in mapping.iter() {
                    row[target] = if target == kc {
                        key.clone()
                    } else {
                        enrichment.cell(r, source).to_string()
                    };
                }
            }
            stats.joined_rows += 1;
        }

        Ok(())
    }
}

fn check_mapping(
    mapping_type: MappingType,
    mapping: &ColumnMapping,
    source_width: usize,
    target_width: usize,
) -> Result<(), MergeError> {
    if mapping.is_empty() {
        return Err(MergeError::MappingUnresolved {
            mapping: mapping_type,
            reason: "mapping is empty".into(),
        });
    }
    if !mapping.fits(source_width, target_width) {
        return Err(MergeError::MappingUnresolved {
            mapping: mapping_type,
            reason: "mapping refers to columns the tables do not have".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Phase 3
// ---------------------------------------------------------------------------

/// Stable sort by natural key (byte order, empty keys last), then renumber.
fn order_rows(out: &mut CanonicalTable) {
    let Some(kc) = out.key_column else {
        return;
    };

    out.table.rows.sort_by(|a, b| compare_keys(&a[kc], &b[kc]));

    if let Some(sc) = out.sequence_column {
        for (i, row) in out.table.rows.iter_mut().enumerate() {
            row[sc] = (i + 1).to_string();
        }
    }
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

/// Comparable text form of a natural-key cell. Numeric renderings such as
/// `2021001.0` or `2.021001E6` collapse to `2021001`; leading zeros in plain
/// digit strings are kept.
pub fn normalize_key(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.to_string();
    }
    if trimmed.contains(['.', 'e', 'E']) {
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                return format!("{}", n as i64);
            }
        }
    }
    trimmed.to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OfflineOracle;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(s(headers), rows.iter().map(|r| s(r)).collect())
    }

    fn engine(canonical: &[&str]) -> MergeEngine {
        MergeEngine::new(s(canonical), ColumnRoles::default(), DuplicateKeyPolicy::LastWriteWins)
    }

    fn mapping(pairs: &[(usize, usize)]) -> ColumnMapping {
        pairs.iter().copied().collect()
    }

    #[test]
    fn projection_copies_mapped_columns_and_numbers_rows() {
        let e = engine(&["序号", "学号", "姓名"]);
        let secondary = table(&["姓名", "学号"], &[&["Li", "001"], &["Wang", "002"]]);
        let enrichment = table(&["学号"], &[]);
        let (out, stats) = e
            .merge(
                &secondary,
                &enrichment,
                &mapping(&[(0, 2), (1, 1)]),
                &mapping(&[(0, 1)]),
                &OfflineOracle,
            )
            .unwrap();

        assert_eq!(out.rows(), &[s(&["1", "001", "Li"]), s(&["2", "002", "Wang"])]);
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.projected_columns, 2);
    }

    #[test]
    fn unmapped_columns_stay_empty() {
        let e = engine(&["学号", "备注"]);
        let secondary = table(&["id"], &[&["7"]]);
        let enrichment = table(&["id"], &[]);
        let (out, _) = e
            .merge(&secondary, &enrichment, &mapping(&[(0, 0)]), &mapping(&[(0, 0)]), &OfflineOracle)
            .unwrap();
        assert_eq!(out.rows(), &[s(&["7", ""])]);
    }

    #[test]
    fn join_overwrites_and_drops_unknown_keys() {
        let e = engine(&["序号", "学号", "姓名", "班级"]);
        let secondary = table(&["学号", "姓名"], &[&["002", "Wang"], &["001", "Li"]]);
        let enrichment = table(
            &["class", "sid", "name"],
            &[&["AI-1", "001", "Li Lei"], &["AI-2", "999", "Ghost"]],
        );
        let (out, stats) = e
            .merge(
                &secondary,
                &enrichment,
                &mapping(&[(0, 1), (1, 2)]),
                &mapping(&[(0, 3), (1, 1), (2, 2)]),
                &OfflineOracle,
            )
            .unwrap();

        assert_eq!(out.row_count(), 2);
        assert_eq!(out.rows()[0], s(&["1", "001", "Li Lei", "AI-1"]));
        assert_eq!(out.rows()[1], s(&["2", "002", "Wang", ""]));
        assert_eq!(stats.joined_rows, 1);
        assert_eq!(stats.dropped_rows, 1);
    }

    #[test]
    fn one_to_one_mapping_fills_every_canonical_column() {
        let e = engine(&["学号", "姓名", "班级"]);
        let secondary = table(
            &["class", "sid", "name"],
            &[&["AI-2", "002", "Wang"], &["AI-1", "001", "Li"]],
        );
        let enrichment = table(&["sid"], &[]);
        let (out, stats) = e
            .merge(
                &secondary,
                &enrichment,
                &mapping(&[(0, 2), (1, 0), (2, 1)]),
                &mapping(&[(0, 0)]),
                &OfflineOracle,
            )
            .unwrap();

        assert_eq!(stats.projected_columns, 3);
        assert_eq!(out.rows(), &[s(&["001", "Li", "AI-1"]), s(&["002", "Wang", "AI-2"])]);
        assert!(out.rows().iter().flatten().all(|cell| !cell.is_empty()));
    }

    #[test]
    fn shared_roster_key_enriches_every_matching_row() {
        let e = engine(&["序号", "学号", "姓名", "班级"]);
        let secondary = table(
            &["学号", "姓名"],
            &[&["001", "Li"], &["002", "Wang"], &["001", "Li (retake)"]],
        );
        let enrichment = table(&["sid", "class"], &[&["001", "AI-1"]]);
        let (out, stats) = e
            .merge(
                &secondary,
                &enrichment,
                &mapping(&[(0, 1), (1, 2)]),
                &mapping(&[(0, 1), (1, 3)]),
                &OfflineOracle,
            )
            .unwrap();

        assert_eq!(
            out.rows(),
            &[
                s(&["1", "001", "Li", "AI-1"]),
                s(&["2", "001", "Li (retake)", "AI-1"]),
                s(&["3", "002", "Wang", ""]),
            ]
        );
        assert_eq!(stats.joined_rows, 1);
        assert_eq!(stats.dropped_rows, 0);
    }

    #[test]
    fn duplicate_enrichment_keys_last_write_wins() {
        let e = engine(&["学号", "班级"]);
        let secondary = table(&["学号"], &[&["001"]]);
        let enrichment = table(&["sid", "class"], &[&["001", "A"], &["001", "B"]]);
        let (out, stats) = e
            .merge(&secondary, &enrichment, &mapping(&[(0, 0)]), &mapping(&[(0, 0), (1, 1)]), &OfflineOracle)
            .unwrap();
        assert_eq!(out.rows()[0], s(&["001", "B"]));
        assert_eq!(stats.duplicate_keys, s(&["001"]));
    }

    #[test]
    fn duplicate_enrichment_keys_rejected_under_strict_policy() {
        let e = MergeEngine::new(s(&["学号", "班级"]), ColumnRoles::default(), DuplicateKeyPolicy::Reject);
        let secondary = table(&["学号"], &[&["001"]]);
        let enrichment = table(&["sid", "class"], &[&["001", "A"], &["1", "X"], &["001", "B"]]);
        let err = e
            .merge(&secondary, &enrichment, &mapping(&[(0, 0)]), &mapping(&[(0, 0), (1, 1)]), &OfflineOracle)
            .unwrap_err();
        match err {
            MergeError::DuplicateKey { key, rows } => {
                assert_eq!(key, "001");
                assert_eq!(rows, vec![0, 2]);
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn numeric_keys_match_their_text_form() {
        let e = engine(&["学号", "班级"]);
        let secondary = table(&["学号"], &[&["2021001"]]);
        let enrichment = table(&["sid", "class"], &[&["2021001.0", "A"]]);
        let (out, stats) = e
            .merge(&secondary, &enrichment, &mapping(&[(0, 0)]), &mapping(&[(0, 0), (1, 1)]), &OfflineOracle)
            .unwrap();
        assert_eq!(out.rows()[0], s(&["2021001", "A"]));
        assert_eq!(stats.joined_rows, 1);
    }

    #[test]
    fn rows_sorted_by_key_and_renumbered() {
        let e = engine(&["序号", "学号"]);
        let secondary = table(&["学号"], &[&["003"], &[""], &["001"], &["002"]]);
        let enrichment = table(&["学号"], &[]);
        let (out, _) = e
            .merge(&secondary, &enrichment, &mapping(&[(0, 1)]), &mapping(&[(0, 1)]), &OfflineOracle)
            .unwrap();
        let keys: Vec<&str> = (0..out.row_count()).map(|r| out.key_of(r).unwrap()).collect();
        let seq: Vec<&str> = out.rows().iter().map(|r| r[0].as_str()).collect();
        assert_eq!(keys, vec!["001", "002", "003", ""]);
        assert_eq!(seq, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn no_key_column_skips_join_and_keeps_order() {
        let e = engine(&["序号", "姓名"]);
        let secondary = table(&["name"], &[&["B"], &["A"]]);
        let enrichment = table(&["name"], &[&["A"]]);
        let (out, stats) = e
            .merge(&secondary, &enrichment, &mapping(&[(0, 1)]), &mapping(&[(0, 1)]), &OfflineOracle)
            .unwrap();
        assert_eq!(out.rows(), &[s(&["1", "B"]), s(&["2", "A"])]);
        assert_eq!(stats.joined_rows, 0);
    }

    #[test]
    fn empty_mapping_aborts() {
        let e = engine(&["学号"]);
        let t = table(&["学号"], &[&["1"]]);
        let err = e
            .merge(&t, &t, &ColumnMapping::new(), &mapping(&[(0, 0)]), &OfflineOracle)
            .unwrap_err();
        assert!(matches!(
            err,
            MergeError::MappingUnresolved { mapping: MappingType::CanonicalSecondary, .. }
        ));
    }

    #[test]
    fn out_of_range_mapping_aborts() {
        let e = engine(&["学号"]);
        let t = table(&["学号"], &[&["1"]]);
        let err = e
            .merge(&t, &t, &mapping(&[(3, 0)]), &mapping(&[(0, 0)]), &OfflineOracle)
            .unwrap_err();
        assert!(err.is_resolution_failure());
    }

    #[test]
    fn key_normalization() {
        assert_eq!(normalize_key(" 001 "), "001");
        assert_eq!(normalize_key("2021001.0"), "2021001");
        assert_eq!(normalize_key("2.021001E6"), "2021001");
        assert_eq!(normalize_key("12.5"), "12.5");
        assert_eq!(normalize_key("S-01"), "S-01");
        assert_eq!(normalize_key(""), "");
    }
}
