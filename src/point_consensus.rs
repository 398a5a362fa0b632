/*!
# Point consensus
Votes across point-variant callers for a single chromosome.
Every record is normalized into a `NormalizedKey`, each caller contributes at most one vote per key, and keys that reach the vote threshold become `ConsensusPointRecord`s.
Columns and metrics of a consensus record come from the highest-priority supporting caller.
*/
use log::{debug, trace, warn};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::data_types::call_record::{CallRecord, ConsensusPointRecord, NormalizedKey};
use crate::data_types::callers::PointCaller;
use crate::data_types::chromosome_report::{ChromosomeReport, ChromosomeWarning, Pipeline};
use crate::engine_config::{EngineConfig, IndelPolicy};
use crate::errors::ConsensusError;
use crate::normalize::normalize;

/// Output of one chromosome's vote
#[derive(Debug)]
pub struct PointChromosomeResult {
    /// The chromosome that was voted on
    pub chromosome: String,
    /// Consensus records, sorted by key
    pub records: Vec<ConsensusPointRecord>,
    /// Audit counts for this chromosome
    pub report: ChromosomeReport
}

/// Runs the point-variant vote with a fixed configuration
#[derive(Clone, Debug)]
pub struct PointConsensus {
    config: EngineConfig
}

/// One caller's vote for a key, along with the record that cast it
type Vote<'a> = (PointCaller, &'a CallRecord);

impl PointConsensus {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Votes on one chromosome.
    /// # Arguments
    /// * `chromosome` - the chromosome being processed, every record must be on it
    /// * `inputs` - for each caller, its records on this chromosome or the parse failure that invalidated them
    /// # Errors
    /// * if any caller failed to parse this chromosome
    /// * if a record is on a different chromosome
    pub fn vote_chromosome(&self, chromosome: &str, inputs: Vec<(PointCaller, Result<Vec<CallRecord>, ConsensusError>)>) -> Result<PointChromosomeResult, ConsensusError> {
        let mut report = ChromosomeReport::new(chromosome.to_string(), Pipeline::Points);

        let mut caller_records: Vec<(PointCaller, Vec<CallRecord>)> = Vec::with_capacity(inputs.len());
        for (caller, result) in inputs.into_iter() {
            let records = result?;
            if let Some(bad) = records.iter().find(|r| r.chromosome() != chromosome) {
                return Err(ConsensusError::ChromosomeMismatch {
                    expected: chromosome.to_string(),
                    found: bad.chromosome().to_string()
                });
            }
            caller_records.push((caller, records));
        }

        // tally distinct callers per key
        let mut votes: FxHashMap<NormalizedKey, Vec<Vote>> = Default::default();
        for (caller, records) in caller_records.iter() {
            let caller = *caller;
            let tally = report.tally_mut(&caller.to_string());
            tally.input_records += records.len() as u64;
            if records.is_empty() {
                warn!("{chromosome}: no records from {caller}, it contributes no votes");
                report.add_warning(ChromosomeWarning::EmptyInput { caller: caller.to_string() });
                continue;
            }

            for record in records.iter() {
                if self.config.require_pass() && !record.is_passing() {
                    trace!("\tSkipping non-PASS {record:?}");
                    report.tally_mut(&caller.to_string()).filtered_records += 1;
                    continue;
                }

                let (reference, alternate) = match normalize(record.reference_allele(), record.alternate_allele()) {
                    Ok(alleles) => alleles,
                    Err(e) => {
                        let error = ConsensusError::Normalization {
                            chromosome: chromosome.to_string(),
                            position: record.position(),
                            reference: record.reference_allele().to_string(),
                            alternate: record.alternate_allele().to_string(),
                            source: e
                        };
                        warn!("{caller}: {error}");
                        report.tally_mut(&caller.to_string()).errored_records += 1;
                        continue;
                    }
                };

                let key = NormalizedKey::new(chromosome.to_string(), record.position(), reference, alternate);
                let supporters = votes.entry(key).or_default();
                if supporters.iter().all(|&(c, _r)| c != caller) {
                    supporters.push((caller, record));
                } else {
                    trace!("\tDuplicate call from {caller} at {}:{}", chromosome, record.position());
                    report.tally_mut(&caller.to_string()).duplicate_records += 1;
                }
            }
        }

        let accepted_keys = self.select_keys(&votes);

        let mut records = vec![];
        for (key, supporters) in votes.into_iter() {
            let indel_conflict = match accepted_keys.get(&key) {
                Some(&conflict) => conflict,
                None => {
                    report.add_rejected(None);
                    continue;
                }
            };

            let mut supporters = supporters;
            supporters.sort_by_key(|&(caller, _r)| self.config.priority_rank(caller));
            for &(caller, _r) in supporters.iter() {
                report.tally_mut(&caller.to_string()).accepted_records += 1;
            }
            let chosen = supporters[0].1;
            let callers: Vec<PointCaller> = supporters.iter().map(|&(c, _r)| c).collect();
            records.push(ConsensusPointRecord::new(key, callers, chosen, indel_conflict));
        }
        records.sort_by(|a, b| a.key().cmp(b.key()));
        report.add_accepted(records.len() as u64);

        debug!("{chromosome}: {} consensus point calls, {} rejected candidates", report.accepted(), report.rejected());
        Ok(PointChromosomeResult {
            chromosome: chromosome.to_string(),
            records,
            report
        })
    }

    /// Picks the keys that make it into the consensus, mapped to their conflict flag
    fn select_keys(&self, votes: &FxHashMap<NormalizedKey, Vec<Vote>>) -> FxHashMap<NormalizedKey, bool> {
        let threshold = self.config.vote_threshold();
        let mut accepted: FxHashMap<NormalizedKey, bool> = votes.iter()
            .filter(|(_key, supporters)| supporters.len() >= threshold)
            .map(|(key, _s)| (key.clone(), false))
            .collect();

        if self.config.indel_policy() == IndelPolicy::Positional {
            // union of callers placing any indel at a position
            let mut position_callers: FxHashMap<u64, FxHashSet<PointCaller>> = Default::default();
            let mut position_keys: FxHashMap<u64, Vec<&NormalizedKey>> = Default::default();
            for (key, supporters) in votes.iter().filter(|(key, _s)| key.is_indel()) {
                position_callers.entry(key.position).or_default()
                    .extend(supporters.iter().map(|&(c, _r)| c));
                position_keys.entry(key.position).or_default().push(key);
            }

            for (position, callers) in position_callers.iter() {
                if callers.len() < threshold {
                    continue;
                }
                let keys = &position_keys[position];
                let conflict = keys.len() > 1;
                if conflict {
                    debug!("Indel allele conflict at {}:{position} across {} alleles", keys[0].chromosome, keys.len());
                }
                for &key in keys.iter() {
                    accepted.insert(key.clone(), conflict);
                }
            }
        }
        accepted
    }
}
