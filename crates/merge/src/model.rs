use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Ordered header labels of one source, verbatim from the document.
/// Labels need not be unique.
pub type HeaderList = Vec<String>;

/// A loaded source table. Cells are text; an empty string is a missing value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub headers: HeaderList,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: HeaderList, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell text, or "" for cells past the end of a short row.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// First column whose label equals `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, col: usize) -> Vec<String> {
        (0..self.rows.len()).map(|r| self.cell(r, col).to_string()).collect()
    }
}

/// The three tables of a merge run.
#[derive(Debug, Clone)]
pub struct MergeSources {
    /// Reference layout. Only its headers shape the output.
    pub canonical: HeaderList,
    /// Rows projected into the canonical layout (table 2).
    pub secondary: Table,
    /// Rows joined onto projected rows by natural key (table 3).
    pub enrichment: Table,
}

// ---------------------------------------------------------------------------
// Mapping types
// ---------------------------------------------------------------------------

/// Which pair of sources a [`ColumnMapping`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MappingType {
    /// canonical ↔ secondary
    #[serde(rename = "1_to_2")]
    CanonicalSecondary,
    /// canonical ↔ enrichment
    #[serde(rename = "1_to_3")]
    CanonicalEnrichment,
    /// secondary ↔ enrichment
    #[serde(rename = "2_to_3")]
    SecondaryEnrichment,
}

impl MappingType {
    pub const ALL: [MappingType; 3] = [
        Self::CanonicalSecondary,
        Self::CanonicalEnrichment,
        Self::SecondaryEnrichment,
    ];

    /// Persisted tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::CanonicalSecondary => "1_to_2",
            Self::CanonicalEnrichment => "1_to_3",
            Self::SecondaryEnrichment => "2_to_3",
        }
    }

    /// Table labels as they appear in the prompt, left side first.
    /// The left side is always the side mapped *into*.
    pub fn table_labels(&self) -> (&'static str, &'static str) {
        match self {
            Self::CanonicalSecondary => ("表1", "表2"),
            Self::CanonicalEnrichment => ("表1", "表3"),
            Self::SecondaryEnrichment => ("表2", "表3"),
        }
    }
}

impl std::fmt::Display for MappingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for MappingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.tag() == s)
            .ok_or_else(|| format!("unknown mapping type '{s}' (expected 1_to_2, 1_to_3 or 2_to_3)"))
    }
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// Why a correspondence could not be added to a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingConflict {
    /// The source column already maps somewhere.
    SourceTaken { source: usize, target: usize },
    /// The target column already receives another source column.
    TargetTaken { target: usize, source: usize },
}

/// Partial injection from source-column index to target-column index
/// (secondary → canonical for the canonical mapping types). 0-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    pairs: BTreeMap<usize, usize>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `source → target`, refusing anything that would break injectivity.
    pub fn insert(&mut self, source: usize, target: usize) -> Result<(), MappingConflict> {
        if let Some(&existing) = self.pairs.get(&source) {
            return Err(MappingConflict::SourceTaken { source, target: existing });
        }
        if let Some(existing) = self.source_for(target) {
            return Err(MappingConflict::TargetTaken { target, source: existing });
        }
        self.pairs.insert(source, target);
        Ok(())
    }

    pub fn target_for(&self, source: usize) -> Option<usize> {
        self.pairs.get(&source).copied()
    }

    pub fn source_for(&self, target: usize) -> Option<usize> {
        self.pairs
            .iter()
            .find(|(_, &t)| t == target)
            .map(|(&s, _)| s)
    }

    /// `(source, target)` pairs in ascending source order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.pairs.iter().map(|(&s, &t)| (s, t))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// True when every index fits the given widths.
    pub fn fits(&self, source_width: usize, target_width: usize) -> bool {
        self.iter().all(|(s, t)| s < source_width && t < target_width)
    }
}

impl FromIterator<(usize, usize)> for ColumnMapping {
    /// Collects pairs, silently skipping ones that conflict with earlier pairs.
    fn from_iter<I: IntoIterator<Item = (usize, usize)>>(iter: I) -> Self {
        let mut mapping = ColumnMapping::new();
        for (s, t) in iter {
            let _ = mapping.insert(s, t);
        }
        mapping
    }
}

/// Where a resolved mapping came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingOrigin {
    Cache,
    Oracle,
}

/// A mapping plus its origin.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedMapping {
    pub mapping_type: MappingType,
    pub origin: MappingOrigin,
    pub mapping: ColumnMapping,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Rows shaped exactly like the canonical header list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalTable {
    pub table: Table,
    /// Natural-key column index, when the canonical schema has one.
    pub key_column: Option<usize>,
    /// Sequential row-number column index, when the canonical schema has one.
    pub sequence_column: Option<usize>,
}

impl CanonicalTable {
    pub fn headers(&self) -> &[String] {
        &self.table.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.table.rows
    }

    pub fn row_count(&self) -> usize {
        self.table.rows.len()
    }

    /// Natural-key value of a row, if the schema has a key column.
    pub fn key_of(&self, row: usize) -> Option<&str> {
        self.key_column.map(|c| self.table.cell(row, c))
    }

    /// Value of the named column in a row.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        self.table.column_index(column).map(|c| self.table.cell(row, c))
    }
}

/// Per-run statistics returned alongside the canonical table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeStats {
    pub rows: usize,
    pub projected_columns: usize,
    pub enrichment_rows: usize,
    pub joined_rows: usize,
    pub dropped_rows: usize,
    pub duplicate_keys: Vec<String>,
    pub dates_local: usize,
    pub dates_oracle: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub meta: MergeMeta,
    pub mappings: Vec<ResolvedMapping>,
    pub stats: MergeStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
