use anyhow::Context;
use log::trace;
use noodles::vcf;
use noodles::vcf::variant::RecordBuf;
use noodles_util::variant::io::reader::Builder as VariantReaderBuilder;
use std::io::BufRead;
use std::path::Path;

use crate::errors::ConsensusError;
use crate::parsing::open_caller_file;

/// Number of fixed columns every data line must have, CHROM through INFO
const FIXED_COLUMNS: usize = 8;

/// Reads VCF records one line at a time.
/// The header is parsed by noodles up front; each data line is then handed to noodles on its own, so a malformed line can still be attributed to the chromosome in its first column.
pub struct VcfRecordReader<R: BufRead> {
    /// Label used in error messages, usually the file path
    source_label: String,
    /// The raw stream
    inner: R,
    /// Parsed header, used to type the INFO and FORMAT values
    header: vcf::Header,
    /// Current line, including the newline
    line: String,
    /// 1-based number of `line` in the stream
    line_number: u64,
    /// If true, `line` holds a data line that was read while scanning the header
    has_pending_line: bool
}

impl<R: BufRead> VcfRecordReader<R> {
    /// Creates the reader and parses the header.
    /// # Arguments
    /// * `inner` - the raw stream
    /// * `source_label` - label for error messages
    /// # Errors
    /// * if the stream cannot be read
    /// * if the header is missing or invalid while data lines are present
    pub fn new(mut inner: R, source_label: &str) -> Result<Self, ConsensusError> {
        let mut raw_header = String::new();
        let mut line = String::new();
        let mut line_number = 0;
        let mut has_pending_line = false;
        loop {
            line.clear();
            if inner.read_line(&mut line)? == 0 {
                break;
            }
            line_number += 1;
            if line.starts_with('#') {
                raw_header.push_str(&line);
            } else if !line.trim().is_empty() {
                has_pending_line = true;
                break;
            }
        }

        let header = if raw_header.is_empty() && !has_pending_line {
            // empty stream, nothing will be read from it
            vcf::Header::default()
        } else {
            raw_header.parse::<vcf::Header>()
                .map_err(|e| ConsensusError::Parse {
                    source_label: source_label.to_string(),
                    line: line_number,
                    chromosome: None,
                    reason: format!("invalid VCF header: {e}")
                })?
        };

        Ok(Self {
            source_label: source_label.to_string(),
            inner,
            header,
            line,
            line_number,
            has_pending_line
        })
    }

    /// Builds a parse error for the current line
    pub fn error(&self, chromosome: Option<&str>, reason: String) -> ConsensusError {
        ConsensusError::Parse {
            source_label: self.source_label.clone(),
            line: self.line_number,
            chromosome: chromosome.map(|c| c.to_string()),
            reason
        }
    }

    /// Parses the current line into a typed record
    fn parse_line(&self) -> Result<RecordBuf, ConsensusError> {
        let chromosome = self.line.split('\t').next()
            .map(|c| c.trim_end())
            .filter(|c| !c.is_empty());
        let num_columns = self.line.trim_end().split('\t').count();
        if num_columns < FIXED_COLUMNS {
            return Err(self.error(chromosome, format!("expected at least {FIXED_COLUMNS} columns, found {num_columns}")));
        }

        let mut record = vcf::Record::default();
        let mut line_reader = vcf::io::Reader::new(self.line.as_bytes());
        line_reader.read_record(&mut record)
            .and_then(|_n| RecordBuf::try_from_variant_record(&self.header, &record))
            .map_err(|e| self.error(chromosome, e.to_string()))
    }

    // getters
    pub fn header(&self) -> &vcf::Header {
        &self.header
    }

    /// Sample names from the `#CHROM` line, in column order
    pub fn sample_names(&self) -> Vec<String> {
        self.header.sample_names().iter().cloned().collect()
    }
}

impl<R: BufRead> Iterator for VcfRecordReader<R> {
    type Item = Result<RecordBuf, ConsensusError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.has_pending_line {
                self.has_pending_line = false;
            } else {
                self.line.clear();
                match self.inner.read_line(&mut self.line) {
                    Ok(0) => return None,
                    Ok(_n) => self.line_number += 1,
                    Err(e) => return Some(Err(e.into()))
                }
            }

            if self.line.starts_with('#') || self.line.trim().is_empty() {
                continue;
            }
            trace!("{}:{} {}", self.source_label, self.line_number, self.line.trim_end());
            return Some(self.parse_line());
        }
    }
}

/// This will open a caller output and return the sample names from its header
/// # Arguments
/// * `filename` - the caller output, optionally gzipped
pub fn get_vcf_sample_names(filename: &Path) -> anyhow::Result<Vec<String>> {
    let mut vcf_reader = VariantReaderBuilder::default()
        .build_from_reader(open_caller_file(filename)?)
        .with_context(|| format!("Error while opening {filename:?}:"))?;

    let vcf_header = vcf_reader.read_header()
        .with_context(|| format!("Error while reading header of {filename:?}:"))?;
    Ok(vcf_header.sample_names().iter().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const VCF: &str = "##fileformat=VCFv4.2
##contig=<ID=chr1,length=248956422>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2

chr1\t100\trs1\tA\tC\t30\tPASS\tDP=12\tGT\t0/1\t0/0
chr1\t200\t.\tG
chr2\t0x10\t.\tG\tT\t.\t.\t.\tGT\t0/1\t0/0
";

    #[test]
    fn test_line_framing() {
        let reader = VcfRecordReader::new(Cursor::new(VCF.to_string()), "test.vcf").unwrap();
        assert_eq!(reader.sample_names(), vec!["S1".to_string(), "S2".to_string()]);
        assert_eq!(reader.header().contigs().len(), 1);

        let results: Vec<_> = reader.collect();
        assert_eq!(results.len(), 3);
        let record = results[0].as_ref().unwrap();
        assert_eq!(record.reference_sequence_name(), "chr1");
        assert_eq!(record.quality_score(), Some(30.0));

        // short rows and bad positions both name their chromosome
        match &results[1] {
            Err(ConsensusError::Parse { chromosome, line, .. }) => {
                assert_eq!(chromosome.as_deref(), Some("chr1"));
                assert_eq!(*line, 6);
            },
            other => panic!("unexpected {other:?}")
        }
        assert!(matches!(&results[2], Err(ConsensusError::Parse { chromosome: Some(c), .. }) if c == "chr2"));
    }

    #[test]
    fn test_bad_header() {
        let vcf = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\nchr1\t1\t.\tA\tC\t.\t.\t.\n";
        let result = VcfRecordReader::new(Cursor::new(vcf.to_string()), "test.vcf");
        assert!(matches!(result, Err(ConsensusError::Parse { chromosome: None, .. })));

        // a stream with nothing in it is just empty
        let reader = VcfRecordReader::new(Cursor::new(String::new()), "test.vcf").unwrap();
        assert_eq!(reader.count(), 0);
    }

    #[test]
    fn test_sample_names_from_file() {
        let filename = std::env::temp_dir().join(format!("quorum_samples_{}.vcf", std::process::id()));
        std::fs::write(&filename, VCF.lines().take(3).collect::<Vec<&str>>().join("\n") + "\n").unwrap();
        let samples = get_vcf_sample_names(&filename).unwrap();
        std::fs::remove_file(&filename).unwrap();
        assert_eq!(samples, vec!["S1".to_string(), "S2".to_string()]);
    }
}
