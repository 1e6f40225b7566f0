use std::fmt;

use crate::model::MappingType;

#[derive(Debug)]
pub enum MergeError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (missing file, empty column name, etc.).
    ConfigValidation(String),
    /// A source document or its header row could not be read.
    ExtractionFailure { source: String, reason: String },
    /// The classification call failed or returned nothing.
    OracleUnavailable { mapping: MappingType, reason: String },
    /// The oracle answered but no usable correspondence came out of it.
    MappingUnresolved { mapping: MappingType, reason: String },
    /// Duplicate natural key in the enrichment table under the `reject` join policy.
    DuplicateKey { key: String, rows: Vec<usize> },
    /// IO error (cache file, output file, etc.).
    Io(String),
}

impl MergeError {
    /// True for the failures that stop a merge before anything is written.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Self::OracleUnavailable { .. } | Self::MappingUnresolved { .. }
        )
    }
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::ExtractionFailure { source, reason } => {
                write!(f, "cannot read source '{source}': {reason}")
            }
            Self::OracleUnavailable { mapping, reason } => {
                write!(f, "mapping {mapping}: classification unavailable: {reason}")
            }
            Self::MappingUnresolved { mapping, reason } => {
                write!(f, "mapping {mapping}: unresolved: {reason}")
            }
            Self::DuplicateKey { key, rows } => {
                let rows: Vec<String> = rows.iter().map(|r| (r + 1).to_string()).collect();
                write!(
                    f,
                    "natural key '{key}' appears in enrichment rows {}",
                    rows.join(", ")
                )
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for MergeError {}
