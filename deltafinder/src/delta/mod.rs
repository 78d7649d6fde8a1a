pub mod config;
pub mod lsq;
pub mod hit_table;
pub mod seed;
pub mod seed_builder;
pub mod prune;
pub mod candidate;
pub mod event;
pub mod chain;
pub mod recovery;
pub mod merge;
pub mod output;
pub mod finder;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types
pub use candidate::DeltaCandidate;
pub use config::{DeltaFinderConfig, HitMasks};
pub use event::{DeltaEvent, DeltaFinderStats};
pub use finder::DeltaFinder;
pub use output::{DeltaCandidateSummary, DeltaFinderOutput};
pub use seed::DeltaSeed;
