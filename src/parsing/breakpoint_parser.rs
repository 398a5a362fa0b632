use log::{debug, trace};
use noodles::vcf::variant::RecordBuf;
use noodles::vcf::variant::record_buf::Info;
use noodles::vcf::variant::record_buf::info::field::Value as InfoValue;
use noodles::vcf::variant::record_buf::info::field::value::Array as InfoArray;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::io::{BufRead, Read};
use std::path::Path;

use crate::data_types::breakpoint::{Breakend, BreakpointRecord, ConfidenceInterval, RearrangementType, Strand, SvTypeTag};
use crate::data_types::callers::BreakpointCaller;
use crate::errors::ConsensusError;
use crate::parsing::noodles_helper::VcfRecordReader;
use crate::parsing::{open_caller_file, partition_by_chromosome, ChromCalls};

/// Columns required in a tabular breakpoint table, `prediction_id` is optional
const TABLE_COLUMNS: [&str; 8] = [
    "chromosome_1", "position_1", "strand_1",
    "chromosome_2", "position_2", "strand_2",
    "rearrangement_type", "num_reads"
];

fn make_error(source_label: &str, row: &csv::StringRecord, chromosome: Option<&str>, reason: String) -> ConsensusError {
    ConsensusError::Parse {
        source_label: source_label.to_string(),
        line: row.position().map(|p| p.line()).unwrap_or_default(),
        chromosome: chromosome.map(|c| c.to_string()),
        reason
    }
}

/// Parses a strictly positive 1-based coordinate
fn parse_position(value: &str) -> Option<u64> {
    value.parse::<u64>().ok().filter(|&p| p > 0)
}

fn parse_strand_pair(value: &str) -> Option<(Strand, Strand)> {
    let mut chars = value.chars();
    let s1 = chars.next()?.to_string().parse().ok()?;
    let s2 = chars.next()?.to_string().parse().ok()?;
    Some((s1, s2))
}

/// Extracts the mate location from a BND ALT such as `N[chr2:3000[` or `]chr2:3000]N`
fn parse_bnd_mate(alt: &str) -> Option<(String, u64)> {
    let first = alt.find(['[', ']'])?;
    let bracket = alt[first..].chars().next()?;
    let second = alt[first + 1..].find(bracket)? + first + 1;
    let (contig, pos) = alt[first + 1..second].rsplit_once(':')?;
    Some((contig.to_string(), parse_position(pos)?))
}

/// Breakend orientation implied by the BND ALT bracket placement
fn parse_bnd_strands(alt: &str) -> Option<(Strand, Strand)> {
    if alt.starts_with('[') {
        Some((Strand::Minus, Strand::Minus))
    } else if alt.starts_with(']') {
        Some((Strand::Minus, Strand::Plus))
    } else if alt.contains('[') {
        Some((Strand::Plus, Strand::Minus))
    } else if alt.contains(']') {
        Some((Strand::Plus, Strand::Plus))
    } else {
        None
    }
}

/// First text entry of an INFO field, typed or not
fn info_text<'a>(info: &'a Info, key: &str) -> Option<&'a str> {
    match info.get(key).flatten()? {
        InfoValue::String(s) => Some(s.as_str()),
        InfoValue::Array(InfoArray::String(values)) => values.first()?.as_deref(),
        _ => None
    }
}

/// Every integer of an INFO field. Fields missing from the header arrive as text and are parsed here.
fn info_integers(info: &Info, key: &str) -> Result<Option<Vec<i64>>, String> {
    let value = match info.get(key).flatten() {
        Some(v) => v,
        None => return Ok(None)
    };
    let invalid = || format!("invalid {key} {value:?}");
    let values = match value {
        InfoValue::Integer(n) => vec![i64::from(*n)],
        InfoValue::Array(InfoArray::Integer(values)) => values.iter()
            .map(|v| v.map(i64::from).ok_or_else(invalid))
            .collect::<Result<_, _>>()?,
        InfoValue::String(text) => text.split(',')
            .map(|v| v.trim().parse::<i64>().map_err(|_e| invalid()))
            .collect::<Result<_, _>>()?,
        InfoValue::Array(InfoArray::String(values)) => values.iter()
            .map(|v| v.as_deref().and_then(|v| v.trim().parse::<i64>().ok()).ok_or_else(invalid))
            .collect::<Result<_, _>>()?,
        _ => return Err(invalid())
    };
    Ok(Some(values))
}

/// A single INFO integer, lists are rejected
fn info_single(info: &Info, key: &str) -> Result<Option<i64>, String> {
    match info_integers(info, key)? {
        None => Ok(None),
        Some(values) if values.len() == 1 => Ok(Some(values[0])),
        Some(values) => Err(format!("expected one value for {key}, found {values:?}"))
    }
}

/// Read counts must fit in a u32
fn info_count(info: &Info, key: &str) -> Option<u32> {
    info_single(info, key).ok().flatten().and_then(|n| u32::try_from(n).ok())
}

/// Lazily reads VCF breakpoint calls.
/// Paired BND records sharing a MATEID are reported once, from whichever mate is seen first.
pub struct LumpyReader<R: BufRead> {
    vcf_reader: VcfRecordReader<R>,
    /// IDs of BND records already emitted, so the mate can be skipped
    emitted_ids: FxHashSet<String>,
    record_index: u64
}

impl<R: BufRead> LumpyReader<R> {
    /// # Errors
    /// * if the header cannot be read
    pub fn new(inner: R, source_label: &str) -> Result<Self, ConsensusError> {
        Ok(Self {
            vcf_reader: VcfRecordReader::new(inner, source_label)?,
            emitted_ids: Default::default(),
            record_index: 0
        })
    }

    fn error(&self, chromosome: Option<&str>, reason: String) -> ConsensusError {
        self.vcf_reader.error(chromosome, reason)
    }

    /// Parses one record; returns None if it is the second half of an already emitted pair
    fn parse_record(&mut self, record: &RecordBuf) -> Result<Option<BreakpointRecord>, ConsensusError> {
        let chrom = record.reference_sequence_name();
        let chromosome = Some(chrom);
        let pos = record.variant_start()
            .map(|p| p.get() as u64)
            .ok_or_else(|| self.error(chromosome, "invalid POS, must be at least 1".to_string()))?;
        let alt = record.alternate_bases().as_ref().first()
            .map(|a| a.as_str())
            .unwrap_or_default();
        let info = record.info();

        let svtype = info_text(info, "SVTYPE")
            .ok_or_else(|| self.error(chromosome, "missing SVTYPE".to_string()))?;
        let tag: SvTypeTag = svtype.parse()
            .map_err(|_e| self.error(chromosome, format!("unsupported SVTYPE {svtype:?}")))?;

        let id = match record.ids().as_ref().first() {
            Some(id) => id.clone(),
            None => format!("{}_{}", BreakpointCaller::Lumpy, self.record_index)
        };

        let (chrom_2, pos_2) = if tag == SvTypeTag::Bnd {
            if let Some(mate_id) = info_text(info, "MATEID") {
                if self.emitted_ids.contains(mate_id) {
                    trace!("\tSkipping mate {id} of {mate_id}");
                    return Ok(None);
                }
            }
            parse_bnd_mate(alt)
                .ok_or_else(|| self.error(chromosome, format!("BND ALT does not name a mate: {alt:?}")))?
        } else {
            let end = info_single(info, "END")
                .map_err(|reason| self.error(chromosome, reason))?
                .ok_or_else(|| self.error(chromosome, "missing END".to_string()))?;
            let end = u64::try_from(end).ok()
                .filter(|&e| e > 0)
                .ok_or_else(|| self.error(chromosome, format!("invalid END {end}")))?;
            (chrom.to_string(), end)
        };

        // STRANDS looks like "+-:7" and may list several orientations; the first is used
        let strands = match info_text(info, "STRANDS") {
            Some(value) => Some(
                parse_strand_pair(value)
                    .ok_or_else(|| self.error(chromosome, format!("invalid STRANDS {value:?}")))?
            ),
            None if tag == SvTypeTag::Bnd => parse_bnd_strands(alt),
            None => None
        };
        let (strand_1, strand_2) = strands.unwrap_or((Strand::Plus, Strand::Minus));

        let mut ci = [None, None];
        for (i, key) in ["CIPOS", "CIEND"].into_iter().enumerate() {
            let values = info_integers(info, key)
                .map_err(|reason| self.error(chromosome, reason))?;
            if let Some(values) = values {
                ci[i] = match values.as_slice() {
                    &[lower, upper] => Some(ConfidenceInterval::new(lower, upper)),
                    _ => return Err(self.error(chromosome, format!("invalid {key} {values:?}")))
                };
            }
        }

        let su = info_count(info, "SU");
        let pe = info_count(info, "PE");
        let sr = info_count(info, "SR");
        let num_reads = match (su, pe, sr) {
            (Some(su), _, _) => Some(su),
            (None, Some(pe), Some(sr)) => pe.checked_add(sr),
            _ => None
        }.ok_or_else(|| self.error(chromosome, "missing or invalid read support (SU)".to_string()))?;

        let record = BreakpointRecord::new(
            id, BreakpointCaller::Lumpy,
            Breakend::new(chrom.to_string(), pos, strand_1, ci[0]),
            Breakend::new(chrom_2, pos_2, strand_2, ci[1]),
            tag.rearrangement_type(), num_reads
        );
        if tag == SvTypeTag::Bnd {
            self.emitted_ids.insert(record.id().to_string());
        }
        Ok(Some(record))
    }
}

impl<R: BufRead> Iterator for LumpyReader<R> {
    type Item = Result<BreakpointRecord, ConsensusError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.vcf_reader.next()? {
                Ok(r) => r,
                Err(e) => {
                    self.record_index += 1;
                    return Some(Err(e));
                }
            };

            self.record_index += 1;
            match self.parse_record(&record) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e))
            }
        }
    }
}

/// Lazily reads a tab-delimited breakpoint table with a header row
pub struct DestructReader<R: Read> {
    source_label: String,
    csv_reader: csv::Reader<R>,
    row: csv::StringRecord,
    /// Index of each entry in `TABLE_COLUMNS`
    columns: [usize; 8],
    /// Index of the optional `prediction_id` column
    id_column: Option<usize>,
    record_index: u64
}

impl<R: Read> DestructReader<R> {
    /// Creates the reader and validates the header
    /// # Errors
    /// * if the header cannot be read or is missing a required column
    pub fn new(inner: R, source_label: &str) -> Result<Self, ConsensusError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .quoting(false)
            .from_reader(inner);

        let headers = csv_reader.headers()?.clone();
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let mut columns = [0; 8];
        if headers.is_empty() {
            // empty file, the iterator will yield nothing
            debug!("{source_label}: empty breakpoint table");
        } else {
            for (slot, name) in columns.iter_mut().zip(TABLE_COLUMNS) {
                *slot = find(name).ok_or_else(|| ConsensusError::Parse {
                    source_label: source_label.to_string(),
                    line: 1,
                    chromosome: None,
                    reason: format!("header is missing column {name:?}")
                })?;
            }
        }
        let id_column = find("prediction_id");
        debug!("{source_label}: breakpoint table columns {columns:?}, id column {id_column:?}");

        Ok(Self {
            source_label: source_label.to_string(),
            csv_reader,
            row: csv::StringRecord::new(),
            columns,
            id_column,
            record_index: 0
        })
    }

    fn error(&self, chromosome: Option<&str>, reason: String) -> ConsensusError {
        make_error(&self.source_label, &self.row, chromosome, reason)
    }

    fn field(&self, slot: usize, chromosome: Option<&str>) -> Result<&str, ConsensusError> {
        match self.row.get(self.columns[slot]) {
            Some(v) if !v.is_empty() => Ok(v.trim()),
            _ => Err(self.error(chromosome, format!("missing value for {}", TABLE_COLUMNS[slot])))
        }
    }

    fn parse_row(&self) -> Result<BreakpointRecord, ConsensusError> {
        let chrom_1 = self.field(0, None)?;
        let chromosome = Some(chrom_1);

        let mut ends = vec![];
        for offset in [0, 3] {
            let chrom = self.field(offset, chromosome)?;
            let raw_pos = self.field(offset + 1, chromosome)?;
            let pos = parse_position(raw_pos)
                .ok_or_else(|| self.error(chromosome, format!("invalid {} {raw_pos:?}", TABLE_COLUMNS[offset + 1])))?;
            let raw_strand = self.field(offset + 2, chromosome)?;
            let strand: Strand = raw_strand.parse()
                .map_err(|_e| self.error(chromosome, format!("invalid {} {raw_strand:?}", TABLE_COLUMNS[offset + 2])))?;
            ends.push(Breakend::new(chrom.to_string(), pos, strand, None));
        }

        let raw_type = self.field(6, chromosome)?;
        let rearrangement_type = RearrangementType::from_label(raw_type)
            .map_err(|e| self.error(chromosome, e.to_string()))?;
        let raw_reads = self.field(7, chromosome)?;
        let num_reads: u32 = raw_reads.parse()
            .map_err(|_e| self.error(chromosome, format!("invalid num_reads {raw_reads:?}")))?;

        let id = match self.id_column.and_then(|c| self.row.get(c)).filter(|v| !v.is_empty()) {
            Some(v) => v.to_string(),
            None => format!("{}_{}", BreakpointCaller::Destruct, self.record_index)
        };

        let breakend_2 = ends.pop();
        let breakend_1 = ends.pop();
        match (breakend_1, breakend_2) {
            (Some(b1), Some(b2)) => Ok(BreakpointRecord::new(
                id, BreakpointCaller::Destruct, b1, b2, rearrangement_type, num_reads
            )),
            _ => Err(self.error(chromosome, "incomplete breakend pair".to_string()))
        }
    }
}

impl<R: Read> Iterator for DestructReader<R> {
    type Item = Result<BreakpointRecord, ConsensusError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.csv_reader.read_record(&mut self.row) {
            Ok(true) => {},
            Ok(false) => return None,
            Err(e) => return Some(Err(e.into()))
        }
        self.record_index += 1;
        Some(self.parse_row())
    }
}

/// Dispatches to the reader matching a breakpoint caller's output format
pub enum BreakpointReader<R: BufRead> {
    Lumpy(LumpyReader<R>),
    Destruct(DestructReader<R>)
}

impl<R: BufRead> BreakpointReader<R> {
    /// # Errors
    /// * if the caller's header is unusable
    pub fn new(inner: R, caller: BreakpointCaller, source_label: &str) -> Result<Self, ConsensusError> {
        Ok(match caller {
            BreakpointCaller::Lumpy => Self::Lumpy(LumpyReader::new(inner, source_label)?),
            BreakpointCaller::Destruct => Self::Destruct(DestructReader::new(inner, source_label)?)
        })
    }
}

impl<R: BufRead> Iterator for BreakpointReader<R> {
    type Item = Result<BreakpointRecord, ConsensusError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Lumpy(r) => r.next(),
            Self::Destruct(r) => r.next()
        }
    }
}

fn first_chromosome(record: &BreakpointRecord) -> &str {
    &record.breakend_1().chromosome
}

/// Loads an entire breakpoint caller output, grouped by the chromosome of the first breakend.
/// # Arguments
/// * `filename` - the caller output, optionally gzipped
/// * `caller` - which caller produced it
pub fn load_breakpoints(filename: &Path, caller: BreakpointCaller) -> anyhow::Result<BTreeMap<String, ChromCalls<BreakpointRecord>>> {
    let source_label = format!("{}", filename.display());
    let reader = BreakpointReader::new(open_caller_file(filename)?, caller, &source_label)?;
    let partitions = partition_by_chromosome(reader, first_chromosome)?;
    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const LUMPY_VCF: &str = "##fileformat=VCFv4.2
##source=LUMPY
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
1\t10000\t1\tN\t<DEL>\t.\t.\tSVTYPE=DEL;SVLEN=-5000;END=15000;STRANDS=+-:7;CIPOS=-10,8;CIEND=-5,5;SU=7;PE=4;SR=3
2\t500\t2_1\tN\tN[5:9000[\t.\t.\tSVTYPE=BND;STRANDS=+-:5;MATEID=2_2;EVENT=2;SU=5
5\t9000\t2_2\tN\t]2:500]N\t.\t.\tSVTYPE=BND;STRANDS=+-:5;MATEID=2_1;EVENT=2;SECONDARY;SU=5
3\t4000\t3\tN\t<INV>\t.\t.\tSVTYPE=INV;END=9000;PE=2;SR=2
";

    fn read_lumpy(text: &str) -> Vec<Result<BreakpointRecord, ConsensusError>> {
        LumpyReader::new(Cursor::new(text.to_string()), "test.vcf").unwrap().collect()
    }

    #[test]
    fn test_lumpy_records() {
        let records: Vec<BreakpointRecord> = read_lumpy(LUMPY_VCF).into_iter().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 3);

        let del = &records[0];
        assert_eq!(del.id(), "1");
        assert_eq!(del.rearrangement_type(), RearrangementType::Deletion);
        assert_eq!(del.breakend_2().position, 15000);
        assert_eq!(del.breakend_1().confidence_interval, Some(ConfidenceInterval::new(-10, 8)));
        assert_eq!(del.breakend_2().confidence_interval, Some(ConfidenceInterval::new(-5, 5)));
        assert_eq!((del.breakend_1().strand, del.breakend_2().strand), (Strand::Plus, Strand::Minus));
        assert_eq!(del.num_reads(), 7);

        // second mate is not reported again
        let bnd = &records[1];
        assert_eq!(bnd.rearrangement_type(), RearrangementType::Translocation);
        assert_eq!(bnd.breakend_2().chromosome, "5");
        assert_eq!(bnd.breakend_2().position, 9000);
        assert!(bnd.breakend_1().confidence_interval.is_none());

        // PE + SR when SU is absent, no STRANDS falls back to +-
        let inv = &records[2];
        assert_eq!(inv.num_reads(), 4);
        assert_eq!(inv.rearrangement_type(), RearrangementType::Inversion);
    }

    #[test]
    fn test_bnd_alt() {
        assert_eq!(parse_bnd_mate("N[chr2:3000["), Some(("chr2".to_string(), 3000)));
        assert_eq!(parse_bnd_mate("]HLA-A*01:01:1000]T"), Some(("HLA-A*01:01".to_string(), 1000)));
        assert_eq!(parse_bnd_mate("<DEL>"), None);
        assert_eq!(parse_bnd_mate("N[chr2:0["), None);
        assert_eq!(parse_bnd_strands("N[chr2:3000["), Some((Strand::Plus, Strand::Minus)));
        assert_eq!(parse_bnd_strands("[chr2:3000[N"), Some((Strand::Minus, Strand::Minus)));
        assert_eq!(parse_bnd_strands("N]chr2:3000]"), Some((Strand::Plus, Strand::Plus)));
    }

    #[test]
    fn test_lumpy_errors() {
        let vcf = "##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
4\t100\t1\tN\t<INS>\t.\t.\tSVTYPE=INS;END=100;SU=3
4\t100\t2\tN\t<DEL>\t.\t.\tSVTYPE=DEL;SU=3
6\t100\t3\tN\t<DEL>\t.\t.\tSVTYPE=DEL;END=900;SU=3
6\t100\t.\tN\t<DEL>\t.\t.\tSVTYPE=DEL;END=900;CIPOS=5;SU=3
";
        let results = read_lumpy(vcf);
        assert_eq!(results.len(), 4);
        assert!(matches!(&results[0], Err(ConsensusError::Parse { chromosome: Some(c), .. }) if c == "4"));
        assert!(matches!(&results[1], Err(ConsensusError::Parse { chromosome: Some(c), .. }) if c == "4"));
        assert!(results[2].is_ok());
        // a confidence interval needs both offsets
        assert!(matches!(&results[3], Err(ConsensusError::Parse { chromosome: Some(c), .. }) if c == "6"));
    }

    #[test]
    fn test_read_support_overflow() {
        let vcf = "##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
7\t100\t4\tN\t<DEL>\t.\t.\tSVTYPE=DEL;END=5000;PE=4294967295;SR=1
7\t100\t.\tN\t<DEL>\t.\t.\tSVTYPE=DEL;END=5000;PE=4294967294;SR=1
";
        let results = read_lumpy(vcf);
        assert_eq!(results.len(), 2);
        match &results[0] {
            Err(ConsensusError::Parse { chromosome, reason, .. }) => {
                assert_eq!(chromosome.as_deref(), Some("7"));
                assert!(reason.contains("read support"));
            },
            other => panic!("unexpected {other:?}")
        }
        let record = results[1].as_ref().unwrap();
        assert_eq!(record.num_reads(), u32::MAX);
        assert_eq!(record.id(), "lumpy_2");
    }

    const DESTRUCT_TABLE: &str = "prediction_id\tchromosome_1\tstrand_1\tposition_1\tchromosome_2\tstrand_2\tposition_2\ttype\trearrangement_type\tnum_reads
11\t1\t+\t10005\t1\t-\t15002\tdeletion\tdeletion\t12
12\t7\t-\t200\t1\t+\t300\ttranslocation\ttranslocation\t9
13\t3\t+\t4000\t3\t+\t20000\tinversion\tfoldback\t6
";

    #[test]
    fn test_destruct_records() {
        let reader = DestructReader::new(Cursor::new(DESTRUCT_TABLE.to_string()), "test.tsv").unwrap();
        let records: Vec<BreakpointRecord> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id(), "11");
        assert_eq!(records[0].breakend_1().position, 10005);
        assert_eq!(records[0].breakend_2().strand, Strand::Minus);
        assert_eq!(records[0].num_reads(), 12);
        assert!(!records[1].is_intrachromosomal());
        assert_eq!(records[2].rearrangement_type(), RearrangementType::Foldback);
    }

    #[test]
    fn test_destruct_header() {
        let table = "chromosome_1\tposition_1\tstrand_1\tchromosome_2\tposition_2\tstrand_2\tnum_reads\n1\t1\t+\t1\t2\t-\t5\n";
        let result = DestructReader::new(Cursor::new(table.to_string()), "test.tsv");
        assert!(matches!(result, Err(ConsensusError::Parse { chromosome: None, .. })));

        // no prediction_id column means generated identifiers
        let table = "chromosome_1\tposition_1\tstrand_1\tchromosome_2\tposition_2\tstrand_2\trearrangement_type\tnum_reads
1\t100\t+\t1\t5000\t-\tdeletion\t5
2\tx\t+\t2\t5000\t-\tdeletion\t5
";
        let results: Vec<_> = DestructReader::new(Cursor::new(table.to_string()), "test.tsv").unwrap().collect();
        assert_eq!(results[0].as_ref().unwrap().id(), "destruct_1");
        assert!(matches!(&results[1], Err(ConsensusError::Parse { chromosome: Some(c), .. }) if c == "2"));
    }

    #[test]
    fn test_dispatch() {
        let reader = BreakpointReader::new(Cursor::new(LUMPY_VCF.to_string()), BreakpointCaller::Lumpy, "x").unwrap();
        assert_eq!(reader.count(), 3);
        let reader = BreakpointReader::new(Cursor::new(DESTRUCT_TABLE.to_string()), BreakpointCaller::Destruct, "x").unwrap();
        assert_eq!(reader.count(), 3);
    }
}
