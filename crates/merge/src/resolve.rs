use std::time::Instant;

use crate::cache::MappingStore;
use crate::error::MergeError;
use crate::model::{ColumnMapping, MappingOrigin, MappingType, ResolvedMapping};
use crate::oracle::Oracle;
use crate::parser::{parse_response, PromptShape};

/// What a resolved mapping must contain to be usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct Requirement<'a> {
    /// Target column that must receive a source column, with its label for messages.
    pub target: Option<(usize, &'a str)>,
}

impl Requirement<'_> {
    fn check(&self, mapping: &ColumnMapping) -> Result<(), String> {
        if mapping.is_empty() {
            return Err("no usable correspondences".into());
        }
        if let Some((target, label)) = self.target {
            if mapping.source_for(target).is_none() {
                return Err(format!("no correspondence for key column '{label}'"));
            }
        }
        Ok(())
    }
}

/// Resolve the mapping `{index in right: index in left}` for one pair of
/// header lists: cache first, then the oracle. A fresh mapping is written
/// back to the store before it is returned.
pub fn resolve_mapping(
    store: &mut dyn MappingStore,
    oracle: &dyn Oracle,
    left: &[String],
    right: &[String],
    mapping_type: MappingType,
    requirement: Requirement<'_>,
) -> Result<ResolvedMapping, MergeError> {
    if let Some(mapping) = store.lookup(left, right, mapping_type) {
        match requirement.check(&mapping) {
            Ok(()) => {
                log::info!("{mapping_type}: using cached mapping ({} columns)", mapping.len());
                return Ok(ResolvedMapping {
                    mapping_type,
                    origin: MappingOrigin::Cache,
                    mapping,
                });
            }
            Err(reason) => log::warn!("{mapping_type}: cached mapping unusable ({reason}), asking oracle"),
        }
    } else {
        log::info!("{mapping_type}: no cached mapping, asking oracle");
    }

    let started = Instant::now();
    let answer = oracle
        .classify(left, right, mapping_type)
        .map_err(|reason| MergeError::OracleUnavailable { mapping: mapping_type, reason })?;
    log::debug!("{mapping_type}: oracle answered in {:.2?}", started.elapsed());

    if answer.trim().is_empty() {
        return Err(MergeError::OracleUnavailable {
            mapping: mapping_type,
            reason: "empty response".into(),
        });
    }

    let outcome = parse_response(
        &answer,
        PromptShape {
            mapping_type,
            left_width: left.len(),
            right_width: right.len(),
        },
    );
    if !outcome.rejected.is_empty() {
        log::warn!(
            "{mapping_type}: {} response line(s) rejected",
            outcome.rejected.len()
        );
    }

    requirement.check(&outcome.mapping).map_err(|reason| MergeError::MappingUnresolved {
        mapping: mapping_type,
        reason,
    })?;

    if let Err(e) = store.store(left, right, mapping_type, &outcome.mapping) {
        log::warn!("{mapping_type}: cannot cache mapping: {e}");
    }

    Ok(ResolvedMapping {
        mapping_type,
        origin: MappingOrigin::Oracle,
        mapping: outcome.mapping,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
