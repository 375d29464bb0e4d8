//! Context memory for glimpse.
//!
//! A bounded log of recent activity with three policies layered on top:
//! lexical deduplication ([`similarity`]), importance scoring
//! ([`ImportanceAssessor`]) and capacity-triggered consolidation
//! ([`Consolidator`]). [`MemoryStore`] ties them together.

pub mod consolidator;
pub mod importance;
pub mod similarity;
pub mod store;

pub use consolidator::{Consolidation, ConsolidationPath, Consolidator, SUMMARY_IMPORTANCE};
pub use importance::{parse_importance, ImportanceAssessor, DEFAULT_IMPORTANCE};
pub use similarity::similarity;
pub use store::{AddOutcome, MemoryPolicy, MemoryStore};
