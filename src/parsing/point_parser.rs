use log::{debug, trace};
use noodles::vcf::variant::RecordBuf;
use std::collections::{BTreeMap, VecDeque};
use std::io::BufRead;
use std::path::Path;

use crate::data_types::call_record::CallRecord;
use crate::data_types::callers::{PointCaller, SampleFields, SampleLayout, SampleRole};
use crate::errors::ConsensusError;
use crate::parsing::noodles_helper::VcfRecordReader;
use crate::parsing::{open_caller_file, partition_by_chromosome, ChromCalls};

/// Lazily reads one caller's VCF output into `CallRecord`s.
/// The header provides sample names, and multi-ALT records yield one call per ALT.
pub struct PointCallReader<R: BufRead> {
    /// The caller this stream came from, selects the metric layout
    caller: PointCaller,
    /// Line-framed noodles reader
    vcf_reader: VcfRecordReader<R>,
    /// Sample columns to pull metrics from, as indices into the header samples
    sample_columns: Vec<(SampleRole, usize)>,
    /// Calls split off a multi-ALT record that have not been returned yet
    pending: VecDeque<CallRecord>,
    /// Number of data lines read so far, failures included
    record_index: u64
}

impl<R: BufRead> PointCallReader<R> {
    /// Creates the reader and consumes the header.
    /// # Arguments
    /// * `inner` - the raw stream
    /// * `caller` - which caller produced the stream
    /// * `layout` - which sample columns to read metrics from
    /// * `source_label` - label for error messages
    /// # Errors
    /// * if the stream or its header cannot be read
    /// * if the requested samples are not in the header
    pub fn new(inner: R, caller: PointCaller, layout: &SampleLayout, source_label: &str) -> Result<Self, ConsensusError> {
        let vcf_reader = VcfRecordReader::new(inner, source_label)?;
        let header_samples = vcf_reader.sample_names();
        let sample_columns = layout.resolve(&header_samples)
            .map_err(|reason| vcf_reader.error(None, reason))?;
        debug!("{source_label}: {caller} samples {header_samples:?} resolved to {sample_columns:?}");

        Ok(Self {
            caller,
            vcf_reader,
            sample_columns,
            pending: Default::default(),
            record_index: 0
        })
    }

    /// Converts a parsed record into one call per called ALT
    fn parse_record(&self, record: &RecordBuf) -> Result<Vec<CallRecord>, ConsensusError> {
        let chrom = record.reference_sequence_name();
        let chromosome = Some(chrom);
        let position = record.variant_start()
            .map(|p| p.get() as u64)
            .ok_or_else(|| self.vcf_reader.error(chromosome, "invalid POS, must be at least 1".to_string()))?;
        let reference = record.reference_bases();
        if reference.is_empty() {
            return Err(self.vcf_reader.error(chromosome, "missing mandatory column REF".to_string()));
        }

        let quality = record.quality_score().map(f64::from);
        let filters = record.filters().as_ref();
        let filter_status = if filters.is_empty() {
            ".".to_string()
        } else {
            filters.iter().map(|f| f.as_str()).collect::<Vec<&str>>().join(";")
        };

        let mut calls = vec![];
        for (i, alternate) in record.alternate_bases().as_ref().iter().enumerate() {
            if alternate == "." {
                // reference-only site, nothing was called
                continue;
            }
            let alt_index = i + 1;

            let mut metrics = BTreeMap::new();
            for &(role, sample_index) in self.sample_columns.iter() {
                let sample = record.samples().get_index(sample_index)
                    .ok_or_else(|| self.vcf_reader.error(chromosome, format!("missing sample column for {role}")))?;
                let fields = SampleFields::new(sample);
                let sample_metrics = self.caller.extract_metrics(reference, alternate, alt_index, &fields)
                    .map_err(|e| self.vcf_reader.error(chromosome, format!("{role}: {e}")))?;
                metrics.insert(role, sample_metrics);
            }

            let call = metrics.into_iter().fold(
                CallRecord::new(
                    self.caller, self.record_index,
                    chrom.to_string(), position,
                    reference.to_string(), alternate.to_string()
                )
                .with_quality(quality)
                .with_filter(filter_status.clone()),
                |call, (role, m)| call.with_metrics(role, m)
            );
            trace!("\tParsed {call:?}");
            calls.push(call);
        }
        Ok(calls)
    }
}

impl<R: BufRead> Iterator for PointCallReader<R> {
    type Item = Result<CallRecord, ConsensusError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(call) = self.pending.pop_front() {
                return Some(Ok(call));
            }

            let record = self.vcf_reader.next()?;
            self.record_index += 1;
            match record.and_then(|r| self.parse_record(&r)) {
                Ok(calls) => self.pending.extend(calls),
                Err(e) => return Some(Err(e))
            }
        }
    }
}

/// Loads an entire point-variant caller output, grouped by chromosome.
/// # Arguments
/// * `filename` - the caller output, optionally gzipped
/// * `caller` - which caller produced it
/// * `layout` - which sample columns to read metrics from
pub fn load_point_calls(filename: &Path, caller: PointCaller, layout: &SampleLayout) -> anyhow::Result<BTreeMap<String, ChromCalls<CallRecord>>> {
    let source_label = format!("{}", filename.display());
    let reader = PointCallReader::new(open_caller_file(filename)?, caller, layout, &source_label)?;
    let partitions = partition_by_chromosome(reader, CallRecord::chromosome)?;
    Ok(partitions)
}
