/*!
# Pipeline
Runs the consensus passes over every chromosome in parallel and writes the outputs in natural chromosome order.
Chromosomes are independent work units: a failure on one is reported and the rest continue.
*/
use indexmap::IndexMap;
use indicatif::ParallelProgressIterator;
use itertools::Itertools;
use log::{debug, error};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::io::Write;

use crate::breakpoint_consensus::{BreakpointChromosomeResult, BreakpointConsensus};
use crate::breakpoint_index::BreakpointIndex;
use crate::data_types::breakpoint::BreakpointRecord;
use crate::data_types::call_record::CallRecord;
use crate::data_types::callers::PointCaller;
use crate::data_types::chromosome_report::Pipeline;
use crate::errors::ConsensusError;
use crate::parsing::ChromCalls;
use crate::point_consensus::{PointChromosomeResult, PointConsensus};
use crate::util::chrom_order::compare_chromosomes;
use crate::util::progress_bar::get_progress_style;
use crate::writers::breakpoint_writer::BreakpointTableWriter;
use crate::writers::point_writer::{ConsensusCallWriter, CountsWriter};
use crate::writers::summary::SummaryWriter;

/// Result of one chromosome work unit
#[derive(Debug)]
pub enum ChromosomeOutcome<T> {
    Completed(T),
    Failed {
        chromosome: String,
        error: ConsensusError
    }
}

impl<T> ChromosomeOutcome<T> {
    fn from_result(chromosome: &str, result: Result<T, ConsensusError>) -> Self {
        match result {
            Ok(r) => Self::Completed(r),
            Err(error) => {
                error!("Error while processing {chromosome}: {error}");
                Self::Failed { chromosome: chromosome.to_string(), error }
            }
        }
    }
}

/// Per-caller point calls, grouped by chromosome
pub type PointInputs = IndexMap<PointCaller, BTreeMap<String, ChromCalls<CallRecord>>>;

/// Sorted union of the chromosome keys, optionally restricted to an allow-list
fn chromosome_order<'a, I>(keys: I, restrict: Option<&[String]>) -> Vec<String>
where
    I: Iterator<Item = &'a String>
{
    keys.filter(|c| restrict.map_or(true, |allowed| allowed.contains(c)))
        .unique()
        .cloned()
        .sorted_by(|a, b| compare_chromosomes(a, b))
        .collect()
}

/// Votes on every chromosome any caller reported.
/// # Arguments
/// * `engine` - the configured vote
/// * `inputs` - calls from each caller; a caller missing a chromosome contributes no votes there
/// * `restrict` - if provided, only these chromosomes are processed
pub fn run_point_consensus(engine: &PointConsensus, inputs: PointInputs, restrict: Option<&[String]>) -> Vec<ChromosomeOutcome<PointChromosomeResult>> {
    let chromosomes = chromosome_order(inputs.values().flat_map(|m| m.keys()), restrict);
    debug!("Point consensus over {} chromosomes", chromosomes.len());

    // split the per-caller maps into per-chromosome work units
    let mut inputs = inputs;
    let work_units: Vec<(String, Vec<(PointCaller, Result<Vec<CallRecord>, ConsensusError>)>)> = chromosomes.into_iter()
        .map(|chrom| {
            let unit = inputs.iter_mut()
                .map(|(&caller, by_chrom)| {
                    let calls = by_chrom.remove(&chrom).unwrap_or_default();
                    (caller, calls.into_result())
                })
                .collect();
            (chrom, unit)
        })
        .collect();

    let style = get_progress_style();
    work_units.into_par_iter()
        .map(|(chrom, unit)| {
            let result = engine.vote_chromosome(&chrom, unit);
            ChromosomeOutcome::from_result(&chrom, result)
        })
        .progress_with_style(style)
        .collect()
}

/// Matches every base-caller chromosome against an index of the reference caller's calls.
/// # Arguments
/// * `engine` - the configured matcher and filter
/// * `base` - calls from the base caller, these are what get reported
/// * `reference` - calls from the reference caller, these only populate the index; windows that cannot be indexed fail only their own chromosome
pub fn run_breakpoint_consensus(
    engine: &BreakpointConsensus,
    base: BTreeMap<String, ChromCalls<BreakpointRecord>>,
    reference: &BTreeMap<String, ChromCalls<BreakpointRecord>>
) -> Vec<ChromosomeOutcome<BreakpointChromosomeResult>> {
    let failed_reference: Vec<String> = reference.iter()
        .filter(|(_c, calls)| calls.failure().is_some())
        .map(|(c, _calls)| c.clone())
        .collect();
    let index = BreakpointIndex::build(
        reference.values().flat_map(|calls| calls.records()),
        Some(engine.config().confidence_interval_size()),
        &failed_reference
    );

    let chromosomes = chromosome_order(base.keys(), None);
    let mut base = base;
    let work_units: Vec<(String, Result<Vec<BreakpointRecord>, ConsensusError>)> = chromosomes.into_iter()
        .map(|chrom| {
            let calls = base.remove(&chrom).unwrap_or_default();
            (chrom, calls.into_result())
        })
        .collect();

    let style = get_progress_style();
    work_units.into_par_iter()
        .map(|(chrom, records)| {
            let result = engine.process_chromosome(&chrom, records, &index);
            ChromosomeOutcome::from_result(&chrom, result)
        })
        .progress_with_style(style)
        .collect()
}

/// Chromosomes to declare as contigs in the call file, in output order
pub fn output_contigs(outcomes: &[ChromosomeOutcome<PointChromosomeResult>]) -> Vec<String> {
    outcomes.iter()
        .map(|outcome| match outcome {
            ChromosomeOutcome::Completed(result) => result.chromosome.clone(),
            ChromosomeOutcome::Failed { chromosome, .. } => chromosome.clone()
        })
        .collect()
}

/// Writes point consensus outcomes in order, appending one chromosome at a time.
/// # Arguments
/// * `outcomes` - results in output order
/// * `call_writer` - the consensus call file
/// * `counts_writer` - optional counts side table
/// * `summary_writer` - collects the audit rows
pub fn write_point_outputs<W: Write, C: Write>(
    outcomes: &[ChromosomeOutcome<PointChromosomeResult>],
    call_writer: &mut ConsensusCallWriter<W>,
    mut counts_writer: Option<&mut CountsWriter<C>>,
    summary_writer: &mut SummaryWriter
) -> anyhow::Result<()> {
    for outcome in outcomes.iter() {
        match outcome {
            ChromosomeOutcome::Completed(result) => {
                call_writer.write_chromosome(&result.records)?;
                if let Some(writer) = counts_writer.as_mut() {
                    writer.write_chromosome(&result.records)?;
                }
                summary_writer.add_report(&result.report);
            },
            ChromosomeOutcome::Failed { chromosome, error } => {
                summary_writer.add_failure(Pipeline::Points, chromosome, &error.to_string());
            }
        }
    }
    Ok(())
}

/// Writes breakpoint consensus outcomes in order, appending one chromosome at a time.
pub fn write_breakpoint_outputs<W: Write>(
    outcomes: &[ChromosomeOutcome<BreakpointChromosomeResult>],
    table_writer: &mut BreakpointTableWriter<W>,
    summary_writer: &mut SummaryWriter
) -> csv::Result<()> {
    for outcome in outcomes.iter() {
        match outcome {
            ChromosomeOutcome::Completed(result) => {
                table_writer.write_chromosome(&result.records)?;
                summary_writer.add_report(&result.report);
            },
            ChromosomeOutcome::Failed { chromosome, error } => {
                summary_writer.add_failure(Pipeline::Breakpoints, chromosome, &error.to_string());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::callers::{BreakpointCaller, SampleLayout};
    use crate::engine_config::EngineConfig;
    use crate::parsing::breakpoint_parser::BreakpointReader;
    use crate::parsing::partition_by_chromosome;
    use crate::parsing::point_parser::PointCallReader;
    use std::io::Cursor;

    const HEADER: &str = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\n";

    fn load(caller: PointCaller, body: &str) -> BTreeMap<String, ChromCalls<CallRecord>> {
        let text = format!("{HEADER}{body}");
        let reader = PointCallReader::new(Cursor::new(text), caller, &SampleLayout::default(), "mem").unwrap();
        partition_by_chromosome(reader, CallRecord::chromosome).unwrap()
    }

    fn first_chromosome(record: &BreakpointRecord) -> &str {
        &record.breakend_1().chromosome
    }

    fn point_inputs() -> PointInputs {
        let mut inputs = PointInputs::default();
        inputs.insert(PointCaller::Museq, load(PointCaller::Museq,
            "chr10\t500\t.\tC\tG\t20\tPASS\t.\tRC:AC\t8:4\n\
            chr2\t100\t.\tA\tT\t20\tPASS\t.\tRC:AC\t10:5\n\
            chr2\t300\t.\tACGT\tAGT\t20\tPASS\t.\tRC:AC\t9:3\n\
            chrX\t77\t.\tG\tA\t20\tPASS\t.\tRC:AC\t1:1\n"
        ));
        inputs.insert(PointCaller::Freebayes, load(PointCaller::Freebayes,
            "chr2\t300\t.\tACG\tAG\t15\t.\t.\tRO:AO:DP\t9:2:11\n\
            chr2\t100\t.\tA\tT\t15\t.\t.\tRO:AO:DP\t11:6:17\n\
            chr10\t500\t.\tC\tG\t15\t.\t.\tRO:AO:DP\t7:5:12\n\
            chr3\t1\t.\tA\n"
        ));
        inputs
    }

    fn run_points() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let engine = PointConsensus::new(EngineConfig::default());
        let outcomes = run_point_consensus(&engine, point_inputs(), None);

        let mut call_writer = ConsensusCallWriter::new(vec![], "quorum-test", &output_contigs(&outcomes)).unwrap();
        let mut counts_writer = CountsWriter::new(vec![], &SampleLayout::default()).unwrap();
        let mut summary = SummaryWriter::new();
        write_point_outputs(&outcomes, &mut call_writer, Some(&mut counts_writer), &mut summary).unwrap();
        let mut summary_bytes = vec![];
        summary.write_to(&mut summary_bytes, b'\t').unwrap();
        (call_writer.finish().unwrap(), counts_writer.finish().unwrap(), summary_bytes)
    }

    #[test]
    fn test_point_pipeline() {
        let (calls, counts, summary) = run_points();
        let calls = String::from_utf8(calls).unwrap();
        assert!(calls.contains("##contig=<ID=chr3>"));
        let records: Vec<&str> = calls.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(records, vec![
            "chr2\t100\tmuseq_2\tA\tT\t20\tPASS\tCALLERS=museq,freebayes",
            "chr2\t300\tmuseq_3\tAC\tA\t20\tPASS\tCALLERS=museq,freebayes",
            "chr10\t500\tmuseq_1\tC\tG\t20\tPASS\tCALLERS=museq,freebayes",
        ]);

        let counts = String::from_utf8(counts).unwrap();
        assert_eq!(counts.lines().nth(1), Some("chr2\t100\tmuseq_2\t10\t5\t15"));

        // chr3 failed to parse in one caller, chrX only had one vote
        let summary = String::from_utf8(summary).unwrap();
        assert!(summary.lines().any(|l| l.starts_with("chr3\tpoints\tALL\tfailed")));
        assert!(summary.lines().any(|l| l.starts_with("chrX\tpoints\tALL\twarning\t1\t0\t0\t1")));
    }

    #[test]
    fn test_point_pipeline_is_deterministic() {
        let first = run_points();
        let second = run_points();
        assert!(!first.0.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_restrict() {
        let engine = PointConsensus::new(EngineConfig::default());
        let outcomes = run_point_consensus(&engine, point_inputs(), Some(&["chr10".to_string()]));
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            ChromosomeOutcome::Completed(result) => {
                assert_eq!(result.chromosome, "chr10");
                assert_eq!(result.records.len(), 1);
            },
            ChromosomeOutcome::Failed { .. } => panic!("chr10 should complete")
        }
    }

    #[test]
    fn test_breakpoint_pipeline() {
        let lumpy = "##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
1\t10000\t1\tN\t<DEL>\t.\t.\tSVTYPE=DEL;END=50000;SU=7
2\t500\t2\tN\t<DUP>\t.\t.\tSVTYPE=DUP;END=8000;SU=7
2\tbad\t3\tN\t<DUP>\t.\t.\tSVTYPE=DUP;END=8000;SU=7
";
        let destruct = "prediction_id\tchromosome_1\tposition_1\tstrand_1\tchromosome_2\tposition_2\tstrand_2\trearrangement_type\tnum_reads
a\t1\t10100\t+\t1\t49800\t-\tdeletion\t12
b\t2\t510\t-\t2\t7990\t+\tduplication\t12
c\t1\t90000\t+\t1\t95000\t-\tdeletion\t12
";
        let load_bp = |caller: BreakpointCaller, text: &str| {
            let reader = BreakpointReader::new(Cursor::new(text.to_string()), caller, "mem").unwrap();
            partition_by_chromosome(reader, first_chromosome).unwrap()
        };
        let reference = load_bp(BreakpointCaller::Lumpy, lumpy);
        let base = load_bp(BreakpointCaller::Destruct, destruct);

        let engine = BreakpointConsensus::new(EngineConfig::default(), BreakpointCaller::Destruct);
        let outcomes = run_breakpoint_consensus(&engine, base, &reference);
        assert_eq!(outcomes.len(), 2);

        let mut table = BreakpointTableWriter::new(vec![]).unwrap();
        let mut summary = SummaryWriter::new();
        write_breakpoint_outputs(&outcomes, &mut table, &mut summary).unwrap();
        let text = String::from_utf8(table.finish().unwrap()).unwrap();
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(rows, vec!["a\t1\t10100\t+\t1\t49800\t-\tdeletion\t12"]);

        // the reference failed on chromosome 2, so nothing there can be trusted
        assert_eq!(summary.failed_chromosomes(), 1);
    }

    #[test]
    fn test_unindexable_reference_window() {
        let lumpy = "##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
1\t10000\t1\tN\t<DEL>\t.\t.\tSVTYPE=DEL;END=50000;SU=7
big\t3000000000\t2\tN\t<DEL>\t.\t.\tSVTYPE=DEL;END=3000005000;SU=7
";
        let destruct = "prediction_id\tchromosome_1\tposition_1\tstrand_1\tchromosome_2\tposition_2\tstrand_2\trearrangement_type\tnum_reads
a\t1\t10100\t+\t1\t49800\t-\tdeletion\t12
";
        let reference = partition_by_chromosome(
            BreakpointReader::new(Cursor::new(lumpy.to_string()), BreakpointCaller::Lumpy, "mem").unwrap(),
            first_chromosome
        ).unwrap();
        let base = partition_by_chromosome(
            BreakpointReader::new(Cursor::new(destruct.to_string()), BreakpointCaller::Destruct, "mem").unwrap(),
            first_chromosome
        ).unwrap();

        // a contig past the coordinate range only fails itself
        let engine = BreakpointConsensus::new(EngineConfig::default(), BreakpointCaller::Destruct);
        let outcomes = run_breakpoint_consensus(&engine, base, &reference);
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            ChromosomeOutcome::Completed(result) => {
                assert_eq!(result.chromosome, "1");
                assert_eq!(result.records.len(), 1);
            },
            ChromosomeOutcome::Failed { error, .. } => panic!("chromosome 1 should complete: {error}")
        }
    }
}
