//! Boundary to the external classification service.

use crate::model::MappingType;

/// The classification service, treated as a black box.
///
/// Both calls may be slow, may fail, and may answer with ill-formed text.
/// An `Ok` with blank text counts as no answer.
pub trait Oracle {
    /// Describe correspondences between `left` and `right` using the prompt
    /// template selected by `mapping_type`.
    fn classify(
        &self,
        left: &[String],
        right: &[String],
        mapping_type: MappingType,
    ) -> Result<String, String>;

    /// Rewrite each value to `MM.DD`, one output line per input value, in order.
    fn normalize_dates(&self, values: &[String]) -> Result<String, String>;
}

/// Oracle that is never reachable. Runs with a warm cache and no date
/// columns need nothing more.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineOracle;

impl Oracle for OfflineOracle {
    fn classify(&self, _: &[String], _: &[String], _: MappingType) -> Result<String, String> {
        Err("classification service is not configured".into())
    }

    fn normalize_dates(&self, _: &[String]) -> Result<String, String> {
        Err("classification service is not configured".into())
    }
}
