/*!
# Engine configuration
All knobs for the point-variant vote and the breakpoint matcher/filter live in one `EngineConfig` that is handed to each pass at construction time.

## Example usage
```rust
use quorum::data_types::callers::PointCaller;
use quorum::engine_config::{EngineConfigBuilder, IndelPolicy};

let config = EngineConfigBuilder::default()
    .vote_threshold(3)
    .indel_policy(IndelPolicy::Positional)
    .build().unwrap();
assert_eq!(config.vote_threshold(), 3);
assert_eq!(config.caller_priority()[0], PointCaller::Museq);
assert_eq!(config.foldback_threshold(), 30000);

// priority lists must name every caller exactly once
let bad = EngineConfigBuilder::default()
    .caller_priority(vec![PointCaller::Mutect, PointCaller::Mutect])
    .build();
assert!(bad.is_err());
```
*/
use derive_builder::Builder;
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::data_types::callers::PointCaller;

/// Number of distinct callers that must agree on a point variant
pub const DEFAULT_VOTE_THRESHOLD: usize = 2;
/// Symmetric window (bp) applied to breakends without an explicit confidence interval
pub const DEFAULT_CONFIDENCE_INTERVAL: u32 = 500;
/// Maximum breakend distance (bp) for an inversion to be reclassified as a foldback
pub const DEFAULT_FOLDBACK_THRESHOLD: u64 = 30000;
/// Minimum supporting reads for a breakpoint
pub const DEFAULT_READSUPPORT_THRESHOLD: u32 = 4;
/// Minimum size (bp) of a reported deletion
pub const DEFAULT_DELETION_SIZE_THRESHOLD: u64 = 1000;
/// Minimum distance (bp) between the two breakends of any intrachromosomal event
pub const DEFAULT_BREAK_DISTANCE_THRESHOLD: u64 = 30;

/// How indels from different callers are compared
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, strum_macros::Display, clap::ValueEnum)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IndelPolicy {
    /// Normalized alleles must be identical; indels are voted on exactly like SNVs
    #[default]
    #[clap(name = "exact")]
    ExactAllele,
    /// Enough callers placing any indel at a position accepts every indel allele called there
    #[clap(name = "positional")]
    Positional
}

/// Controls both consensus pipelines
#[derive(Builder, Clone, Debug, PartialEq, Serialize)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Minimum number of distinct callers for a point variant
    vote_threshold: usize,
    /// Metrics and columns of a consensus call come from the first supporting caller in this list
    caller_priority: Vec<PointCaller>,
    /// Indel comparison policy
    indel_policy: IndelPolicy,
    /// If true, only PASS (or unfiltered) records vote
    require_pass: bool,
    /// Window applied to breakends lacking a caller-provided confidence interval
    confidence_interval_size: u32,
    /// Inversions with breakends at most this far apart become foldbacks
    foldback_threshold: u64,
    /// Drop breakpoints with fewer supporting reads; None disables
    readsupport_threshold: Option<u32>,
    /// Drop breakpoints with either end outside this set; None disables
    allowed_chromosomes: Option<Vec<String>>,
    /// Drop deletions shorter than this; None disables
    deletion_size_threshold: Option<u64>,
    /// Drop intrachromosomal events with closer breakends; None disables
    break_distance_threshold: Option<u64>
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vote_threshold: DEFAULT_VOTE_THRESHOLD,
            caller_priority: PointCaller::iter().collect(),
            indel_policy: IndelPolicy::default(),
            require_pass: false,
            confidence_interval_size: DEFAULT_CONFIDENCE_INTERVAL,
            foldback_threshold: DEFAULT_FOLDBACK_THRESHOLD,
            readsupport_threshold: Some(DEFAULT_READSUPPORT_THRESHOLD),
            allowed_chromosomes: None,
            deletion_size_threshold: Some(DEFAULT_DELETION_SIZE_THRESHOLD),
            break_distance_threshold: Some(DEFAULT_BREAK_DISTANCE_THRESHOLD)
        }
    }
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(threshold) = self.vote_threshold {
            if threshold == 0 {
                return Err("vote_threshold must be >= 1".to_string());
            }
        }

        if let Some(priority) = self.caller_priority.as_ref() {
            for caller in PointCaller::iter() {
                let count = priority.iter().filter(|&&c| c == caller).count();
                if count != 1 {
                    return Err(format!("caller_priority must list {caller} exactly once, found {count}"));
                }
            }
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Rank of a caller in the priority list, lower is preferred
    pub fn priority_rank(&self, caller: PointCaller) -> usize {
        // validation guarantees presence
        self.caller_priority.iter()
            .position(|&c| c == caller)
            .unwrap_or(usize::MAX)
    }

    /// True if the chromosome passes the allow-list, or if there is no allow-list
    pub fn is_allowed_chromosome(&self, chromosome: &str) -> bool {
        match self.allowed_chromosomes.as_ref() {
            Some(allowed) => allowed.iter().any(|c| c == chromosome),
            None => true
        }
    }

    // getters
    pub fn vote_threshold(&self) -> usize {
        self.vote_threshold
    }

    pub fn caller_priority(&self) -> &[PointCaller] {
        &self.caller_priority
    }

    pub fn indel_policy(&self) -> IndelPolicy {
        self.indel_policy
    }

    pub fn require_pass(&self) -> bool {
        self.require_pass
    }

    pub fn confidence_interval_size(&self) -> u32 {
        self.confidence_interval_size
    }

    pub fn foldback_threshold(&self) -> u64 {
        self.foldback_threshold
    }

    pub fn readsupport_threshold(&self) -> Option<u32> {
        self.readsupport_threshold
    }

    pub fn allowed_chromosomes(&self) -> Option<&[String]> {
        self.allowed_chromosomes.as_deref()
    }

    pub fn deletion_size_threshold(&self) -> Option<u64> {
        self.deletion_size_threshold
    }

    pub fn break_distance_threshold(&self) -> Option<u64> {
        self.break_distance_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.vote_threshold(), 2);
        assert_eq!(config.caller_priority(), &[PointCaller::Museq, PointCaller::Strelka, PointCaller::Mutect, PointCaller::Freebayes]);
        assert_eq!(config.confidence_interval_size(), 500);
        assert_eq!(config.readsupport_threshold(), Some(4));
        assert!(config.is_allowed_chromosome("chrUn_random"));
        assert_eq!(EngineConfigBuilder::default().build().unwrap(), config);
    }

    #[test]
    fn test_validation() {
        assert!(EngineConfigBuilder::default().vote_threshold(0).build().is_err());
        assert!(EngineConfigBuilder::default()
            .caller_priority(vec![PointCaller::Freebayes, PointCaller::Mutect, PointCaller::Strelka])
            .build().is_err());

        let config = EngineConfigBuilder::default()
            .caller_priority(vec![PointCaller::Freebayes, PointCaller::Mutect, PointCaller::Strelka, PointCaller::Museq])
            .allowed_chromosomes(Some(vec!["1".to_string()]))
            .build().unwrap();
        assert_eq!(config.priority_rank(PointCaller::Freebayes), 0);
        assert_eq!(config.priority_rank(PointCaller::Museq), 3);
        assert!(config.is_allowed_chromosome("1"));
        assert!(!config.is_allowed_chromosome("2"));
    }
}
