use serde::Deserialize;

use crate::error::MergeError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// A merge run, usually loaded from a `*.merge.toml` file.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeConfig {
    pub name: String,
    pub sources: SourcesConfig,
    #[serde(default)]
    pub columns: ColumnRoles,
    #[serde(default)]
    pub join: JoinConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// Reference layout (table 1).
    pub canonical: SourceConfig,
    /// Rows to project (table 2).
    pub secondary: SourceConfig,
    /// Rows joined by natural key (table 3).
    pub enrichment: SourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub file: String,
    /// 0-based row holding the header labels; rows above it are title rows.
    #[serde(default)]
    pub header_row: usize,
    /// Worksheet name; the first sheet when omitted.
    #[serde(default)]
    pub sheet: Option<String>,
}

// ---------------------------------------------------------------------------
// Column roles
// ---------------------------------------------------------------------------

/// Named columns with special treatment, looked up in the canonical schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnRoles {
    /// Natural key used for the join and for ordering.
    #[serde(default = "default_natural_key")]
    pub natural_key: String,
    /// Sequential row-number column, renumbered after ordering.
    #[serde(default = "default_sequence")]
    pub sequence: Option<String>,
    /// Columns rewritten to `MM.DD`.
    #[serde(default = "default_dates")]
    pub dates: Vec<String>,
}

fn default_natural_key() -> String {
    "学号".into()
}

fn default_sequence() -> Option<String> {
    Some("序号".into())
}

fn default_dates() -> Vec<String> {
    vec!["离校时间".into(), "返校时间".into()]
}

impl Default for ColumnRoles {
    fn default() -> Self {
        Self {
            natural_key: default_natural_key(),
            sequence: default_sequence(),
            dates: default_dates(),
        }
    }
}

// ---------------------------------------------------------------------------
// Join + Output + Cache
// ---------------------------------------------------------------------------

/// What to do when several enrichment rows carry the same natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Apply every row in source order; the last one wins.
    #[default]
    LastWriteWins,
    /// Abort the merge.
    Reject,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct JoinConfig {
    #[serde(default)]
    pub duplicate_keys: DuplicateKeyPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Output directory; the canonical file's directory when omitted.
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Copy the canonical file's title row above the headers.
    #[serde(default = "default_true")]
    pub keep_title: bool,
}

fn default_prefix() -> String {
    "Merged_result".into()
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            prefix: default_prefix(),
            keep_title: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    /// Cache file; the user settings default when omitted.
    #[serde(default)]
    pub path: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl MergeConfig {
    pub fn from_toml(input: &str) -> Result<Self, MergeError> {
        let config: MergeConfig =
            toml::from_str(input).map_err(|e| MergeError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MergeError> {
        for (role, source) in [
            ("canonical", &self.sources.canonical),
            ("secondary", &self.sources.secondary),
            ("enrichment", &self.sources.enrichment),
        ] {
            if source.file.trim().is_empty() {
                return Err(MergeError::ConfigValidation(format!(
                    "sources.{role}: file must not be empty"
                )));
            }
        }

        self.columns.validate()?;

        if self.output.prefix.trim().is_empty() {
            return Err(MergeError::ConfigValidation(
                "output.prefix must not be empty".into(),
            ));
        }

        Ok(())
    }
}

impl ColumnRoles {
    pub fn validate(&self) -> Result<(), MergeError> {
        if self.natural_key.trim().is_empty() {
            return Err(MergeError::ConfigValidation(
                "columns.natural_key must not be empty".into(),
            ));
        }
        if self.sequence.as_deref() == Some(self.natural_key.as_str()) {
            return Err(MergeError::ConfigValidation(format!(
                "columns.sequence and columns.natural_key are both '{}'",
                self.natural_key
            )));
        }
        if self.dates.iter().any(|d| d == &self.natural_key) {
            return Err(MergeError::ConfigValidation(format!(
                "columns.dates must not contain the natural key '{}'",
                self.natural_key
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
