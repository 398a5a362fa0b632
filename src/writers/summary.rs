use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::data_types::chromosome_report::{CallerTally, ChromosomeReport, ChromosomeWarning, Pipeline};

/// Caller label used for the per-chromosome total row
pub const ALL_CALLERS: &str = "ALL";

/// Status values in the summary
pub const STATUS_OK: &str = "ok";
pub const STATUS_WARNING: &str = "warning";
pub const STATUS_FAILED: &str = "failed";

/// Contains all the data written to each row of our summary file
#[derive(Clone, Debug, PartialEq, Serialize)]
struct SummaryRow {
    /// Chromosome the row describes
    chromosome: String,
    /// points or breakpoints
    pipeline: String,
    /// Caller label, or ALL for the chromosome total
    caller: String,
    /// ok, warning, or failed
    status: String,
    /// Records read
    input_records: u64,
    /// Records that could not be normalized or matched
    errored_records: u64,
    /// Records represented in the consensus (for ALL, the number of consensus records)
    accepted_records: u64,
    /// Records or candidates that were dropped
    rejected_records: u64,
    /// Free-text breakdown, e.g. the rejection reasons or the failure message
    detail: String
}

impl SummaryRow {
    fn from_tally(report: &ChromosomeReport, caller: &str, tally: &CallerTally) -> Self {
        let is_empty = report.warnings().iter()
            .any(|w| matches!(w, ChromosomeWarning::EmptyInput { caller: c } if c == caller));
        Self {
            chromosome: report.chromosome().to_string(),
            pipeline: report.pipeline().to_string(),
            caller: caller.to_string(),
            status: if is_empty { STATUS_WARNING } else { STATUS_OK }.to_string(),
            input_records: tally.input_records,
            errored_records: tally.errored_records,
            accepted_records: tally.accepted_records,
            rejected_records: tally.rejected_records(),
            detail: tally_detail(tally, is_empty)
        }
    }
}

/// Detail column for a caller row, e.g. "filtered=2;acceptance_rate=0.667"
fn tally_detail(tally: &CallerTally, is_empty: bool) -> String {
    let mut parts = vec![];
    if is_empty {
        parts.push("empty_input".to_string());
    }
    for (label, count) in [("filtered", tally.filtered_records), ("duplicate", tally.duplicate_records)] {
        if count > 0 {
            parts.push(format!("{label}={count}"));
        }
    }
    if let Some(rate) = tally.acceptance_rate() {
        parts.push(format!("acceptance_rate={rate:.3}"));
    }
    parts.join(";")
}

/// Accumulates the per-chromosome audit and writes it out as one table
#[derive(Debug, Default)]
pub struct SummaryWriter {
    /// Rows in insertion order
    rows: Vec<SummaryRow>,
    /// Number of chromosomes that failed
    failed_chromosomes: u64
}

impl SummaryWriter {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds the rows for a chromosome that completed: one per caller, then the total
    pub fn add_report(&mut self, report: &ChromosomeReport) {
        let mut total = CallerTally::default();
        for (caller, tally) in report.caller_tallies().iter() {
            self.rows.push(SummaryRow::from_tally(report, caller, tally));
            total.input_records += tally.input_records;
            total.errored_records += tally.errored_records;
        }

        let status = if report.warnings().is_empty() { STATUS_OK } else { STATUS_WARNING };
        self.rows.push(SummaryRow {
            chromosome: report.chromosome().to_string(),
            pipeline: report.pipeline().to_string(),
            caller: ALL_CALLERS.to_string(),
            status: status.to_string(),
            input_records: total.input_records,
            errored_records: total.errored_records,
            accepted_records: report.accepted(),
            rejected_records: report.rejected(),
            detail: report.rejection_detail()
        });
    }

    /// Adds the row for a chromosome whose processing aborted
    /// # Arguments
    /// * `pipeline` - the pass that failed
    /// * `chromosome` - the failed chromosome
    /// * `error` - the failure, written to the detail column
    pub fn add_failure(&mut self, pipeline: Pipeline, chromosome: &str, error: &str) {
        self.failed_chromosomes += 1;
        self.rows.push(SummaryRow {
            chromosome: chromosome.to_string(),
            pipeline: pipeline.to_string(),
            caller: ALL_CALLERS.to_string(),
            status: STATUS_FAILED.to_string(),
            input_records: 0,
            errored_records: 0,
            accepted_records: 0,
            rejected_records: 0,
            detail: error.to_string()
        });
    }

    pub fn failed_chromosomes(&self) -> u64 {
        self.failed_chromosomes
    }

    /// Total consensus records across all completed chromosomes
    pub fn total_accepted(&self) -> u64 {
        self.rows.iter()
            .filter(|r| r.caller == ALL_CALLERS)
            .map(|r| r.accepted_records)
            .sum()
    }

    /// Writes all rows to a generic writer
    /// # Arguments
    /// * `writer` - destination
    /// * `delimiter` - field delimiter
    pub fn write_to<W: Write>(&self, writer: W, delimiter: u8) -> csv::Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);
        for row in self.rows.iter() {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Will write the summary out to the given file path
    /// # Arguments
    /// * `filename` - the filename for the output (tsv/csv)
    pub fn write_summary(&self, filename: &Path) -> csv::Result<()> {
        // modify the delimiter to "," if it ends with .csv
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let file = File::create(filename)?;
        self.write_to(file, delimiter)
    }
}
