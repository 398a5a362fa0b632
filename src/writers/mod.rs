/*!
# Writers module
Contains the logic for writing the consensus outputs and the per-chromosome audit summary.
All table writers are generic over `Write` and are appended to one chromosome at a time.
*/
/// Consensus breakpoint table
pub mod breakpoint_writer;
/// Consensus point-variant calls and the companion counts table
pub mod point_writer;
/// Per-chromosome provenance summary
pub mod summary;

use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::Path;

use noodles::bgzf;

/// Opens an output file for writing; ".gz" outputs are BGZF compressed.
/// # Arguments
/// * `filename` - the output path
/// * `threads` - compression workers for BGZF outputs, clamped to 1-4
pub fn create_output(filename: &Path, threads: usize) -> anyhow::Result<Box<dyn Write + Send>> {
    let file = File::create(filename)
        .with_context(|| format!("Error while creating {filename:?}:"))?;
    let is_compressed = filename.extension().unwrap_or_default() == "gz";
    let writer: Box<dyn Write + Send> = if is_compressed {
        let w_threads = NonZeroUsize::new(threads.clamp(1, 4)).unwrap_or(NonZeroUsize::MIN);
        Box::new(bgzf::io::MultithreadedWriter::with_worker_count(w_threads, file))
    } else {
        Box::new(BufWriter::new(file))
    };
    Ok(writer)
}
