
use log::{LevelFilter, error, info, warn};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use quorum::breakpoint_consensus::BreakpointConsensus;
use quorum::cli::breakpoints::{BreakpointsSettings, check_breakpoints_settings};
use quorum::cli::core::{Commands, FULL_VERSION, get_cli};
use quorum::cli::points::{PointsSettings, check_points_settings};
use quorum::engine_config::EngineConfig;
use quorum::parsing::breakpoint_parser::load_breakpoints;
use quorum::parsing::point_parser::load_point_calls;
use quorum::pipeline::{PointInputs, output_contigs, run_breakpoint_consensus, run_point_consensus, write_breakpoint_outputs, write_point_outputs};
use quorum::point_consensus::PointConsensus;
use quorum::util::json_io::save_json;
use quorum::writers::breakpoint_writer::BreakpointTableWriter;
use quorum::writers::create_output;
use quorum::writers::point_writer::{ConsensusCallWriter, CountsWriter};
use quorum::writers::summary::SummaryWriter;

/// Sets up logging before we check the other settings
fn init_logging(verbosity: u8) {
    let filter_level: LevelFilter = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();
}

/// Sets up the number of threads for rayon
fn init_thread_pool(threads: usize) {
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
        Ok(()) => {},
        Err(e) => {
            error!("Error while building thread pool: {e}");
            std::process::exit(exitcode::OSERR);
        }
    };
}

/// Creates a debug folder if specified and saves the CLI options and engine configuration into it
fn init_debug_folder<T: serde::Serialize>(debug_folder: Option<&Path>, settings: &T, config: &EngineConfig) {
    if let Some(debug_folder) = debug_folder {
        info!("Creating debug folder at {debug_folder:?}...");
        match std::fs::create_dir_all(debug_folder) {
            Ok(()) => {},
            Err(e) => {
                error!("Error while creating debug folder: {e}");
                std::process::exit(exitcode::IOERR);
            }
        }

        // save the CLI options
        let cli_json = debug_folder.join("cli_settings.json");
        info!("Saving CLI options to {cli_json:?}...");
        if let Err(e) = save_json(settings, &cli_json) {
            error!("Error while saving CLI options: {e}");
            std::process::exit(exitcode::IOERR);
        }

        let config_json = debug_folder.join("engine_config.json");
        info!("Saving engine configuration to {config_json:?}...");
        if let Err(e) = save_json(config, &config_json) {
            error!("Error while saving engine configuration: {e}");
            std::process::exit(exitcode::IOERR);
        }
    }
}

/// Opens an output or exits
fn open_output(filename: &Path, threads: usize) -> Box<dyn Write + Send> {
    match create_output(filename, threads) {
        Ok(w) => w,
        Err(e) => {
            error!("Error while creating output file: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    }
}

/// Flushes a finished output or exits
fn close_output(writer: anyhow::Result<Box<dyn Write + Send>>, label: &str) {
    let result = writer.and_then(|mut w| {
        w.flush()?;
        Ok(())
    });
    if let Err(e) = result {
        error!("Error while finalizing {label}: {e:#}");
        std::process::exit(exitcode::IOERR);
    }
}

/// Writes the summary file if requested
fn save_summary(summary_writer: &SummaryWriter, summary_fn: Option<&Path>) {
    if let Some(summary_fn) = summary_fn {
        info!("Saving output summary to {summary_fn:?}...");
        if let Err(e) = summary_writer.write_summary(summary_fn) {
            error!("Error while saving summary file: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    }

    let failed = summary_writer.failed_chromosomes();
    if failed > 0 {
        warn!("{failed} chromosome(s) failed and were left out of the outputs, see the summary for details.");
    }
}

fn run_points(settings: PointsSettings) {
    // start the timer
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_points_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    let config = match settings.engine_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Error while building engine config: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    init_thread_pool(settings.threads);
    init_debug_folder(settings.debug_folder.as_deref(), &settings, &config);

    // load every caller up front
    let mut inputs = PointInputs::default();
    for (filename, &caller) in settings.input_filenames.iter().zip(settings.callers.iter()) {
        info!("Loading {caller} calls from {filename:?}...");
        match load_point_calls(filename, caller, &settings.sample_layout) {
            Ok(by_chrom) => {
                info!("\tFound {} chromosomes.", by_chrom.len());
                inputs.insert(caller, by_chrom);
            },
            Err(e) => {
                error!("Error while loading {caller} calls: {e:#}");
                std::process::exit(exitcode::IOERR);
            }
        };
    }

    info!("Voting on point variants...");
    let engine = PointConsensus::new(config);
    let outcomes = run_point_consensus(&engine, inputs, settings.restrict());
    info!("Voting complete, saving all outputs...");

    let source = format!("quorum-{}", *FULL_VERSION);
    let contigs = output_contigs(&outcomes);
    let mut call_writer = match ConsensusCallWriter::new(open_output(&settings.output_calls, settings.threads), &source, &contigs) {
        Ok(w) => w,
        Err(e) => {
            error!("Error while writing call header: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };
    let mut counts_writer = settings.output_counts.as_deref().map(|counts_fn| {
        match CountsWriter::new(open_output(counts_fn, settings.threads), &settings.sample_layout) {
            Ok(w) => w,
            Err(e) => {
                error!("Error while writing counts header: {e}");
                std::process::exit(exitcode::IOERR);
            }
        }
    });
    let mut summary_writer = SummaryWriter::new();

    if let Err(e) = write_point_outputs(&outcomes, &mut call_writer, counts_writer.as_mut(), &mut summary_writer) {
        error!("Error while writing consensus calls: {e:#}");
        std::process::exit(exitcode::IOERR);
    }
    info!("Wrote {} consensus calls.", call_writer.records_written());
    close_output(call_writer.finish(), "consensus calls");
    if let Some(writer) = counts_writer {
        close_output(writer.finish(), "counts table");
    }
    save_summary(&summary_writer, settings.output_summary.as_deref());

    info!("Point consensus completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_breakpoints(settings: BreakpointsSettings) {
    // start the timer
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_breakpoints_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    let config = match settings.engine_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Error while building engine config: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    init_thread_pool(settings.threads);
    init_debug_folder(settings.debug_folder.as_deref(), &settings, &config);

    info!("Loading {} reference calls from {:?}...", settings.reference_caller, settings.reference_filename);
    let reference = match load_breakpoints(&settings.reference_filename, settings.reference_caller) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while loading reference calls: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };
    info!("Loading {} base calls from {:?}...", settings.base_caller, settings.base_filename);
    let base = match load_breakpoints(&settings.base_filename, settings.base_caller) {
        Ok(b) => b,
        Err(e) => {
            error!("Error while loading base calls: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    info!("Matching breakpoints...");
    let engine = BreakpointConsensus::new(config, settings.base_caller);
    let outcomes = run_breakpoint_consensus(&engine, base, &reference);
    info!("Matching complete, saving all outputs...");

    let mut table_writer = match BreakpointTableWriter::new(open_output(&settings.output_breakpoints, settings.threads)) {
        Ok(w) => w,
        Err(e) => {
            error!("Error while writing breakpoint header: {e}");
            std::process::exit(exitcode::IOERR);
        }
    };
    let mut summary_writer = SummaryWriter::new();
    if let Err(e) = write_breakpoint_outputs(&outcomes, &mut table_writer, &mut summary_writer) {
        error!("Error while writing consensus breakpoints: {e}");
        std::process::exit(exitcode::IOERR);
    }
    info!("Wrote {} consensus breakpoints.", summary_writer.total_accepted());
    close_output(table_writer.finish(), "consensus breakpoints");
    save_summary(&summary_writer, settings.output_summary.as_deref());

    info!("Breakpoint consensus completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::Points(settings) => {
            run_points(*settings);
        },
        Commands::Breakpoints(settings) => {
            run_breakpoints(*settings);
        }
    }

    info!("Process finished successfully.");
}
