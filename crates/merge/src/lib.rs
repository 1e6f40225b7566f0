//! `rosterlink-merge`: schema-correspondence resolution and roster merge.
//!
//! Pure engine crate: receives header lists and pre-loaded tables, asks an
//! [`Oracle`] for column correspondences when the cache has none, and returns
//! the merged canonical table. No spreadsheet or network dependencies.

pub mod cache;
pub mod config;
pub mod dates;
pub mod engine;
pub mod error;
pub mod model;
pub mod oracle;
pub mod parser;
pub mod resolve;

pub use cache::{cache_key, MappingCache, MappingStore};
pub use config::{ColumnRoles, DuplicateKeyPolicy, MergeConfig};
pub use engine::{run, MergeEngine};
pub use error::MergeError;
pub use model::{
    CanonicalTable, ColumnMapping, HeaderList, MappingOrigin, MappingType, MergeReport,
    MergeSources, MergeStats, ResolvedMapping, Table,
};
pub use oracle::{OfflineOracle, Oracle};
pub use parser::{parse_response, ParseOutcome, PromptShape};
pub use resolve::{resolve_mapping, Requirement};
