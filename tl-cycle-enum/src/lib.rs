//! Bounded-depth simple cycle enumeration, deduplication, and scoring (C5)
#![deny(missing_docs)]

mod dedup;
mod enumerate;
mod scoring;
mod select;

pub use dedup::DedupGate;
pub use enumerate::{enumerate_community, CommunityResult, EnumConfig};
pub use scoring::{score_cycle, ScoreBreakdown, ScoringWeights};
pub use select::select_items;
