/*!
# Parsing module
Contains the logic for reading caller outputs into normalized in-memory records.
*/
/// Readers for VCF and tabular structural variant caller outputs
pub mod breakpoint_parser;
/// Helper functions for noodles
pub mod noodles_helper;
/// Reader for point variant caller VCFs
pub mod point_parser;

use anyhow::Context;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::ConsensusError;

/// Wrapper function that handles both gzip/bgzip compressed and uncompressed caller outputs
/// # Arguments
/// * `filename` - path to the file to open, ".gz" means compressed
pub fn open_caller_file(filename: &Path) -> anyhow::Result<Box<dyn BufRead>> {
    let is_compressed = match filename.extension() {
        Some(extension) => {
            extension == "gz"
        },
        None => false
    };

    let file = File::open(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;
    let reader: Box<dyn BufRead> = if is_compressed {
        // multi-member decoding also covers BGZF
        Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// One caller's records for a single chromosome.
/// If any record on the chromosome failed to parse, `failure` holds the first error and the chromosome must not be used.
#[derive(Debug)]
pub struct ChromCalls<T> {
    /// Records in stream order
    records: Vec<T>,
    /// First parse error attributed to this chromosome
    failure: Option<ConsensusError>
}

impl<T> Default for ChromCalls<T> {
    fn default() -> Self {
        Self {
            records: vec![],
            failure: None
        }
    }
}

impl<T> ChromCalls<T> {
    /// Converts into the records, or the error that invalidated them
    pub fn into_result(self) -> Result<Vec<T>, ConsensusError> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(self.records)
        }
    }

    // getters
    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn failure(&self) -> Option<&ConsensusError> {
        self.failure.as_ref()
    }
}

/// Drains a record stream into per-chromosome buckets.
/// Parse errors that name a chromosome only invalidate that chromosome; the rest of the stream keeps loading.
/// # Arguments
/// * `records` - lazily parsed records
/// * `chromosome_of` - extracts the chromosome a record is bucketed under
/// # Errors
/// * if an error cannot be attributed to a chromosome (e.g. unreadable stream, bad header)
pub fn partition_by_chromosome<T, I, F>(records: I, chromosome_of: F) -> Result<BTreeMap<String, ChromCalls<T>>, ConsensusError>
where
    I: Iterator<Item = Result<T, ConsensusError>>,
    F: Fn(&T) -> &str
{
    let mut partitions: BTreeMap<String, ChromCalls<T>> = Default::default();
    for result in records {
        match result {
            Ok(record) => {
                let entry = partitions.entry(chromosome_of(&record).to_string()).or_default();
                if entry.failure.is_none() {
                    entry.records.push(record);
                }
            },
            Err(e) => {
                let chrom = match e.parse_chromosome() {
                    Some(c) => c.to_string(),
                    None => return Err(e)
                };
                let entry = partitions.entry(chrom.clone()).or_default();
                if entry.failure.is_none() {
                    warn!("Invalidating {chrom}: {e}");
                    entry.records.clear();
                    entry.failure = Some(e);
                } else {
                    debug!("Additional error on {chrom}: {e}");
                }
            }
        }
    }
    Ok(partitions)
}
