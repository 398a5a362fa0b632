use std::collections::BTreeMap;
use strum_macros::{AsRefStr, Display};

/// Which consensus pass produced a report
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[strum(serialize_all = "lowercase")]
pub enum Pipeline {
    Points,
    Breakpoints
}

/// Non-fatal conditions worth surfacing to the user
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChromosomeWarning {
    /// The caller produced no records here and contributes no votes
    EmptyInput { caller: String }
}

/// Why a candidate breakpoint did not make it into the output
#[derive(AsRefStr, Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[strum(serialize_all = "snake_case")]
pub enum RejectionReason {
    /// At least one end had no compatible interval from the other caller
    Unmatched,
    LowReadSupport,
    ExcludedChromosome,
    SmallDeletion,
    ShortBreakDistance
}

/// Per-caller tallies on one chromosome
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CallerTally {
    /// Records read for this chromosome
    pub input_records: u64,
    /// Records that could not be normalized or matched
    pub errored_records: u64,
    /// Records that ended up represented in the consensus
    pub accepted_records: u64,
    /// Records skipped because their FILTER was not PASS
    pub filtered_records: u64,
    /// Repeat calls of a key this caller had already voted for
    pub duplicate_records: u64
}

impl CallerTally {
    /// Everything that was read and never got a chance to vote, or voted and lost
    pub fn rejected_records(&self) -> u64 {
        let skipped = self.errored_records + self.accepted_records + self.filtered_records + self.duplicate_records;
        self.input_records.saturating_sub(skipped)
    }

    /// Fraction of usable records that were accepted
    pub fn acceptance_rate(&self) -> Option<f64> {
        let denom = self.input_records.saturating_sub(self.errored_records);
        if denom > 0 {
            Some(self.accepted_records as f64 / denom as f64)
        } else {
            None
        }
    }
}

/// Audit record for one chromosome of one pipeline.
/// Consensus calling only removes calls, so these counts are what tells a user how much was dropped and why.
#[derive(Clone, Debug, PartialEq)]
pub struct ChromosomeReport {
    /// The chromosome this covers
    chromosome: String,
    /// The pass that produced it
    pipeline: Pipeline,
    /// Tallies keyed by caller label
    caller_tallies: BTreeMap<String, CallerTally>,
    /// Consensus records emitted
    accepted: u64,
    /// Candidates that were discarded
    rejected: u64,
    /// Breakdown of discarded breakpoint candidates
    rejection_reasons: BTreeMap<RejectionReason, u64>,
    /// Non-fatal conditions
    warnings: Vec<ChromosomeWarning>
}

impl ChromosomeReport {
    /// Constructor
    pub fn new(chromosome: String, pipeline: Pipeline) -> Self {
        Self {
            chromosome,
            pipeline,
            caller_tallies: Default::default(),
            accepted: 0,
            rejected: 0,
            rejection_reasons: Default::default(),
            warnings: vec![]
        }
    }

    /// Mutable access to a caller's tally, creating it if needed
    pub fn tally_mut(&mut self, caller: &str) -> &mut CallerTally {
        self.caller_tallies.entry(caller.to_string()).or_default()
    }

    pub fn add_accepted(&mut self, count: u64) {
        self.accepted += count;
    }

    pub fn add_rejected(&mut self, reason: Option<RejectionReason>) {
        self.rejected += 1;
        if let Some(r) = reason {
            *self.rejection_reasons.entry(r).or_default() += 1;
        }
    }

    pub fn add_warning(&mut self, warning: ChromosomeWarning) {
        self.warnings.push(warning);
    }

    /// Short "reason=count" summary of the rejection breakdown, e.g. "unmatched=3;small_deletion=1"
    pub fn rejection_detail(&self) -> String {
        self.rejection_reasons.iter()
            .map(|(reason, count)| format!("{}={count}", reason.as_ref()))
            .collect::<Vec<String>>()
            .join(";")
    }

    // getters
    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    pub fn caller_tallies(&self) -> &BTreeMap<String, CallerTally> {
        &self.caller_tallies
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn rejection_reasons(&self) -> &BTreeMap<RejectionReason, u64> {
        &self.rejection_reasons
    }

    pub fn warnings(&self) -> &[ChromosomeWarning] {
        &self.warnings
    }
}
