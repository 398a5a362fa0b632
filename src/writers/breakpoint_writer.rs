use serde::Serialize;
use std::io::Write;

use crate::data_types::breakpoint::BreakpointRecord;

/// One row of the consensus breakpoint table, same columns as the tabular breakpoint input
#[derive(Serialize)]
struct BreakpointRow<'a> {
    prediction_id: &'a str,
    chromosome_1: &'a str,
    position_1: u64,
    strand_1: String,
    chromosome_2: &'a str,
    position_2: u64,
    strand_2: String,
    rearrangement_type: String,
    num_reads: u32
}

impl<'a> BreakpointRow<'a> {
    fn new(record: &'a BreakpointRecord) -> Self {
        let [b1, b2] = record.breakends();
        Self {
            prediction_id: record.id(),
            chromosome_1: &b1.chromosome,
            position_1: b1.position,
            strand_1: b1.strand.to_string(),
            chromosome_2: &b2.chromosome,
            position_2: b2.position,
            strand_2: b2.strand.to_string(),
            rearrangement_type: record.rearrangement_type().to_string(),
            num_reads: record.num_reads()
        }
    }
}

/// Writes consensus breakpoints as a tab-delimited table with a header
pub struct BreakpointTableWriter<W: Write> {
    csv_writer: csv::Writer<W>
}

impl<W: Write> BreakpointTableWriter<W> {
    pub fn new(inner: W) -> csv::Result<Self> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(inner);
        csv_writer.write_record([
            "prediction_id",
            "chromosome_1", "position_1", "strand_1",
            "chromosome_2", "position_2", "strand_2",
            "rearrangement_type", "num_reads"
        ])?;
        Ok(Self { csv_writer })
    }

    /// Appends one chromosome's breakpoints
    pub fn write_chromosome(&mut self, records: &[BreakpointRecord]) -> csv::Result<()> {
        for record in records.iter() {
            self.csv_writer.serialize(BreakpointRow::new(record))?;
        }
        Ok(())
    }

    /// Flushes and returns the inner writer
    pub fn finish(self) -> anyhow::Result<W> {
        let inner = self.csv_writer.into_inner()
            .map_err(|e| anyhow::anyhow!("Error while flushing breakpoint writer: {}", e.error()))?;
        Ok(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::breakpoint::{Breakend, RearrangementType, Strand};
    use crate::data_types::callers::BreakpointCaller;

    #[test]
    fn test_breakpoint_table() {
        let record = BreakpointRecord::new(
            "42".to_string(), BreakpointCaller::Destruct,
            Breakend::new("3".to_string(), 4000, Strand::Plus, None),
            Breakend::new("3".to_string(), 20000, Strand::Plus, None),
            RearrangementType::Foldback, 6
        );
        let mut writer = BreakpointTableWriter::new(vec![]).unwrap();
        writer.write_chromosome(&[record]).unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(
            text,
            "prediction_id\tchromosome_1\tposition_1\tstrand_1\tchromosome_2\tposition_2\tstrand_2\trearrangement_type\tnum_reads\n\
            42\t3\t4000\t+\t3\t20000\t+\tfoldback\t6\n"
        );
    }

    #[test]
    fn test_empty_table() {
        let writer = BreakpointTableWriter::new(vec![]).unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
