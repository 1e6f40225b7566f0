//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                              |
//! |---------|------------|------------------------------------------|
//! | 0       | Universal  | Success                                  |
//! | 1       | Universal  | General error (unspecified)              |
//! | 2       | Universal  | CLI usage error (bad args, bad config)   |
//! | 3-9     | merge      | Merge-specific codes                     |
//! | 10-19   | ai         | AI provider/keychain codes               |

use rosterlink_merge::MergeError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, invalid merge config.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Merge (3-9)
// =============================================================================

/// A source document or its header row could not be read.
pub const EXIT_MERGE_EXTRACTION: u8 = 3;

/// The classification service failed or answered nothing, with no cached mapping.
pub const EXIT_MERGE_ORACLE: u8 = 4;

/// The answer held no usable correspondence, or lacked the natural key.
pub const EXIT_MERGE_UNRESOLVED: u8 = 5;

/// Duplicate natural key in the enrichment table (`duplicate_keys = "reject"`).
pub const EXIT_MERGE_DUPLICATE: u8 = 6;

/// Output file could not be written.
pub const EXIT_MERGE_WRITE: u8 = 7;

// =============================================================================
// AI (10-19)
// =============================================================================

/// AI disabled (provider=none).
pub const EXIT_AI_DISABLED: u8 = 10;

/// AI provider configured but API key missing.
pub const EXIT_AI_MISSING_KEY: u8 = 11;

/// Map an engine error to its exit code.
pub fn merge_exit_code(err: &MergeError) -> u8 {
    match err {
        MergeError::ConfigParse(_) | MergeError::ConfigValidation(_) => EXIT_USAGE,
        MergeError::ExtractionFailure { .. } => EXIT_MERGE_EXTRACTION,
        MergeError::OracleUnavailable { .. } => EXIT_MERGE_ORACLE,
        MergeError::MappingUnresolved { .. } => EXIT_MERGE_UNRESOLVED,
        MergeError::DuplicateKey { .. } => EXIT_MERGE_DUPLICATE,
        MergeError::Io(_) => EXIT_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosterlink_merge::MappingType;

    #[test]
    fn merge_errors_have_distinct_codes() {
        let codes = [
            merge_exit_code(&MergeError::ExtractionFailure {
                source: "a.xlsx".into(),
                reason: "missing".into(),
            }),
            merge_exit_code(&MergeError::OracleUnavailable {
                mapping: MappingType::CanonicalSecondary,
                reason: "timeout".into(),
            }),
            merge_exit_code(&MergeError::MappingUnresolved {
                mapping: MappingType::CanonicalEnrichment,
                reason: "no key".into(),
            }),
            merge_exit_code(&MergeError::DuplicateKey {
                key: "001".into(),
                rows: vec![0, 1],
            }),
        ];
        assert_eq!(codes, [3, 4, 5, 6]);
        assert_eq!(merge_exit_code(&MergeError::ConfigParse("x".into())), EXIT_USAGE);
    }
}
