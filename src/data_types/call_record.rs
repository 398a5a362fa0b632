use serde::Serialize;
use std::collections::BTreeMap;

use crate::data_types::callers::{PointCaller, SampleRole};

/// Read support for one sample at one call
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SampleMetrics {
    /// Reads supporting the reference allele
    pub ref_count: Option<u32>,
    /// Reads supporting the alternate allele
    pub alt_count: Option<u32>,
    /// Total depth as reported (or derived) for the caller
    pub depth: Option<u32>
}

impl SampleMetrics {
    /// Constructor
    pub fn new(ref_count: Option<u32>, alt_count: Option<u32>, depth: Option<u32>) -> Self {
        Self { ref_count, alt_count, depth }
    }
}

/// A single point variant call as reported by one caller.
/// Multi-allelic rows are split so that each record has exactly one ALT.
#[derive(Clone, Debug, PartialEq)]
pub struct CallRecord {
    /// The caller that produced this record
    caller: PointCaller,
    /// 1-based ordinal of the data row in the caller's stream, used for provenance IDs
    record_index: u64,
    /// Contig name
    chromosome: String,
    /// 1-based position, as written in the input
    position: u64,
    /// REF allele, exactly as reported
    reference_allele: String,
    /// ALT allele, exactly as reported
    alternate_allele: String,
    /// QUAL column, None if "."
    quality: Option<f64>,
    /// FILTER column
    filter_status: String,
    /// Read counts per sample role
    sample_metrics: BTreeMap<SampleRole, SampleMetrics>
}

impl CallRecord {
    /// Creates a bare record; optional columns are added with the `with_*` chain before the record is handed off.
    /// # Arguments
    /// * `caller` - the source caller
    /// * `record_index` - 1-based ordinal of the row in the source stream
    /// * `chromosome` - contig name
    /// * `position` - 1-based position
    /// * `reference_allele` - REF
    /// * `alternate_allele` - a single ALT
    pub fn new(
        caller: PointCaller, record_index: u64,
        chromosome: String, position: u64,
        reference_allele: String, alternate_allele: String
    ) -> Self {
        Self {
            caller,
            record_index,
            chromosome,
            position,
            reference_allele,
            alternate_allele,
            quality: None,
            filter_status: ".".to_string(),
            sample_metrics: Default::default()
        }
    }

    pub fn with_quality(mut self, quality: Option<f64>) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_filter(mut self, filter_status: String) -> Self {
        self.filter_status = filter_status;
        self
    }

    pub fn with_metrics(mut self, role: SampleRole, metrics: SampleMetrics) -> Self {
        self.sample_metrics.insert(role, metrics);
        self
    }

    /// Returns true if FILTER is PASS or unset
    pub fn is_passing(&self) -> bool {
        self.filter_status == "PASS" || self.filter_status == "."
    }

    // getters
    pub fn caller(&self) -> PointCaller {
        self.caller
    }

    pub fn record_index(&self) -> u64 {
        self.record_index
    }

    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn reference_allele(&self) -> &str {
        &self.reference_allele
    }

    pub fn alternate_allele(&self) -> &str {
        &self.alternate_allele
    }

    pub fn quality(&self) -> Option<f64> {
        self.quality
    }

    pub fn filter_status(&self) -> &str {
        &self.filter_status
    }

    pub fn sample_metrics(&self) -> &BTreeMap<SampleRole, SampleMetrics> {
        &self.sample_metrics
    }
}

/// Aggregation key; two records with equal keys are the same biological call.
/// Field order matters, sorting keys gives position order within a chromosome.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NormalizedKey {
    pub chromosome: String,
    pub position: u64,
    pub reference_allele: String,
    pub alternate_allele: String
}

impl NormalizedKey {
    /// Constructor
    pub fn new(chromosome: String, position: u64, reference_allele: String, alternate_allele: String) -> Self {
        Self { chromosome, position, reference_allele, alternate_allele }
    }

    /// Insertions, deletions, and complex length-changing events
    pub fn is_indel(&self) -> bool {
        self.reference_allele.len() != self.alternate_allele.len()
    }
}

/// A call that reached the vote threshold. Never modified after the vote that created it.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsensusPointRecord {
    /// The normalized call
    key: NormalizedKey,
    /// Callers that reported this exact key, in priority order
    supporting_callers: Vec<PointCaller>,
    /// The supporting caller with the highest priority; metrics and columns come from it
    chosen_caller: PointCaller,
    /// Provenance identifier, `<caller>_<record_index>`
    id: String,
    /// QUAL from the chosen caller
    quality: Option<f64>,
    /// FILTER from the chosen caller
    filter_status: String,
    /// Read counts from the chosen caller
    chosen_metrics: BTreeMap<SampleRole, SampleMetrics>,
    /// True if other indels were called at this position under positional indel voting
    indel_conflict: bool
}

impl ConsensusPointRecord {
    /// Builds the consensus record from its highest-priority supporting record.
    /// # Arguments
    /// * `key` - the normalized key that was voted on
    /// * `supporting_callers` - every caller that reported `key`, in priority order
    /// * `chosen` - the record from the first caller in `supporting_callers`
    /// * `indel_conflict` - flags positional indel votes with disagreeing alleles
    pub fn new(key: NormalizedKey, supporting_callers: Vec<PointCaller>, chosen: &CallRecord, indel_conflict: bool) -> Self {
        let chosen_caller = chosen.caller();
        let id = format!("{}_{}", chosen_caller, chosen.record_index());
        Self {
            key,
            supporting_callers,
            chosen_caller,
            id,
            quality: chosen.quality(),
            filter_status: chosen.filter_status().to_string(),
            chosen_metrics: chosen.sample_metrics().clone(),
            indel_conflict
        }
    }

    // getters
    pub fn key(&self) -> &NormalizedKey {
        &self.key
    }

    pub fn supporting_callers(&self) -> &[PointCaller] {
        &self.supporting_callers
    }

    pub fn chosen_caller(&self) -> PointCaller {
        self.chosen_caller
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn quality(&self) -> Option<f64> {
        self.quality
    }

    pub fn filter_status(&self) -> &str {
        &self.filter_status
    }

    pub fn chosen_metrics(&self) -> &BTreeMap<SampleRole, SampleMetrics> {
        &self.chosen_metrics
    }

    pub fn metrics_for(&self, role: SampleRole) -> SampleMetrics {
        self.chosen_metrics.get(&role).copied().unwrap_or_default()
    }

    pub fn indel_conflict(&self) -> bool {
        self.indel_conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consensus_from_chosen() {
        let chosen = CallRecord::new(PointCaller::Strelka, 17, "chr1".to_string(), 1000, "A".to_string(), "T".to_string())
            .with_quality(Some(40.0))
            .with_filter("PASS".to_string())
            .with_metrics(SampleRole::Sample, SampleMetrics::new(Some(12), Some(8), Some(20)));
        let key = NormalizedKey::new("chr1".to_string(), 1000, "A".to_string(), "T".to_string());
        let record = ConsensusPointRecord::new(key, vec![PointCaller::Strelka, PointCaller::Freebayes], &chosen, false);

        assert_eq!(record.id(), "strelka_17");
        assert_eq!(record.chosen_caller(), PointCaller::Strelka);
        assert_eq!(record.quality(), Some(40.0));
        assert_eq!(record.metrics_for(SampleRole::Sample), SampleMetrics::new(Some(12), Some(8), Some(20)));
        assert_eq!(record.metrics_for(SampleRole::Tumor), SampleMetrics::default());
    }

    #[test]
    fn test_key_order() {
        let mut keys = vec![
            NormalizedKey::new("chr1".to_string(), 20, "A".to_string(), "T".to_string()),
            NormalizedKey::new("chr1".to_string(), 5, "G".to_string(), "GA".to_string()),
            NormalizedKey::new("chr1".to_string(), 5, "G".to_string(), "C".to_string()),
        ];
        keys.sort();
        assert_eq!(keys.iter().map(|k| k.position).collect::<Vec<_>>(), vec![5, 5, 20]);
        assert_eq!(keys[0].alternate_allele, "C");
        assert!(keys[1].is_indel());
        assert!(!keys[2].is_indel());
    }
}
