/*!
# Breakpoint consensus
Matches breakpoints from a base caller against the interval index built from a reference caller.
A base breakpoint is kept only if both of its breakends hit a type-compatible window; it is then classified and filtered.
The base and reference roles are not interchangeable, swapping them can change the output.
*/
use log::{debug, trace, warn};

use crate::breakpoint_filter::{classify, filter};
use crate::breakpoint_index::BreakpointIndex;
use crate::data_types::breakpoint::BreakpointRecord;
use crate::data_types::callers::BreakpointCaller;
use crate::data_types::chromosome_report::{ChromosomeReport, ChromosomeWarning, Pipeline, RejectionReason};
use crate::engine_config::EngineConfig;
use crate::errors::ConsensusError;

/// Output of one chromosome's breakpoint pass
#[derive(Debug)]
pub struct BreakpointChromosomeResult {
    /// Chromosome of the first breakend of every record here
    pub chromosome: String,
    /// Accepted breakpoints, sorted by position
    pub records: Vec<BreakpointRecord>,
    /// Audit counts for this chromosome
    pub report: ChromosomeReport
}

/// Returns true if both breakends of `record` hit a compatible window in `index`.
/// # Errors
/// * if the record's type cannot be matched, or the index cannot answer for one of its chromosomes
pub fn is_consensus(index: &BreakpointIndex, record: &BreakpointRecord) -> Result<bool, ConsensusError> {
    for breakend in record.breakends() {
        if !index.matches(&breakend.chromosome, breakend.position, record.rearrangement_type())? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Runs the breakpoint match/classify/filter pass with a fixed configuration
#[derive(Clone, Debug)]
pub struct BreakpointConsensus {
    config: EngineConfig,
    /// Caller whose records are queried and reported
    base_caller: BreakpointCaller
}

impl BreakpointConsensus {
    pub fn new(config: EngineConfig, base_caller: BreakpointCaller) -> Self {
        Self { config, base_caller }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Processes the base caller's records for one chromosome.
    /// # Arguments
    /// * `chromosome` - chromosome of the first breakend of every record
    /// * `base` - base caller records, or the parse failure that invalidated them
    /// * `index` - windows from the reference caller
    /// # Errors
    /// * if the base caller failed to parse this chromosome
    /// * if a record is on a different chromosome or came from a caller other than the base caller
    /// * if matching fails for any record
    pub fn process_chromosome(&self, chromosome: &str, base: Result<Vec<BreakpointRecord>, ConsensusError>, index: &BreakpointIndex) -> Result<BreakpointChromosomeResult, ConsensusError> {
        let base = base?;
        let mut report = ChromosomeReport::new(chromosome.to_string(), Pipeline::Breakpoints);
        let caller_label = self.base_caller.to_string();
        report.tally_mut(&caller_label).input_records = base.len() as u64;
        if base.is_empty() {
            warn!("{chromosome}: no records from {caller_label}");
            report.add_warning(ChromosomeWarning::EmptyInput { caller: caller_label.clone() });
        }
        debug!("{chromosome}: {} reference windows indexed", index.interval_count(chromosome));

        let mut records = vec![];
        for record in base.into_iter() {
            if record.breakend_1().chromosome != chromosome {
                return Err(ConsensusError::ChromosomeMismatch {
                    expected: chromosome.to_string(),
                    found: record.breakend_1().chromosome.clone()
                });
            }
            if record.caller() != self.base_caller {
                return Err(ConsensusError::CallerMismatch {
                    expected: caller_label,
                    found: record.caller().to_string()
                });
            }

            if !is_consensus(index, &record)? {
                trace!("\tUnmatched {}", record.id());
                report.add_rejected(Some(RejectionReason::Unmatched));
                continue;
            }

            let record = classify(record, self.config.foldback_threshold());
            match filter(&record, &self.config) {
                Some(reason) => {
                    trace!("\tFiltered {} ({})", record.id(), reason.as_ref());
                    report.add_rejected(Some(reason));
                },
                None => records.push(record)
            }
        }

        // stable, so ties keep input order
        records.sort_by_key(|r| r.breakend_1().position);
        report.tally_mut(&caller_label).accepted_records = records.len() as u64;
        report.add_accepted(records.len() as u64);
        debug!("{chromosome}: {} consensus breakpoints, rejected {}", records.len(), report.rejection_detail());

        Ok(BreakpointChromosomeResult {
            chromosome: chromosome.to_string(),
            records,
            report
        })
    }
}
