use anyhow::ensure;
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, optional_threshold, AFTER_HELP, FULL_VERSION};
use crate::data_types::callers::BreakpointCaller;
use crate::engine_config::{
    EngineConfig, EngineConfigBuilder,
    DEFAULT_BREAK_DISTANCE_THRESHOLD, DEFAULT_CONFIDENCE_INTERVAL, DEFAULT_DELETION_SIZE_THRESHOLD,
    DEFAULT_FOLDBACK_THRESHOLD, DEFAULT_READSUPPORT_THRESHOLD
};

#[derive(Args, Clone, Debug, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct BreakpointsSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    quorum_version: String,

    /// Breakpoints that are matched and reported
    #[clap(required = true)]
    #[clap(long = "base-calls")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub base_filename: PathBuf,

    /// The caller that produced --base-calls; only tabular callers are accepted since the output keeps their columns
    #[clap(long = "base-caller")]
    #[clap(value_name = "CALLER")]
    #[clap(help_heading = Some("Input/Output"))]
    #[clap(default_value = "destruct")]
    pub base_caller: BreakpointCaller,

    /// Breakpoints that confirm the base calls, never reported themselves
    #[clap(required = true)]
    #[clap(long = "reference-calls")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub reference_filename: PathBuf,

    /// The caller that produced --reference-calls
    #[clap(long = "reference-caller")]
    #[clap(value_name = "CALLER")]
    #[clap(help_heading = Some("Input/Output"))]
    #[clap(default_value = "lumpy")]
    pub reference_caller: BreakpointCaller,

    /// Output consensus breakpoints (TSV, ".gz" for BGZF)
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-breakpoints")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_breakpoints: PathBuf,

    /// Output summary file (CSV/TSV)
    #[clap(long = "output-summary")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_summary: Option<PathBuf>,

    /// Optional output debug folder
    #[clap(long = "output-debug")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub debug_folder: Option<PathBuf>,

    /// Window (bp) around reference breakends that lack their own confidence interval
    #[clap(long = "confidence-interval")]
    #[clap(value_name = "BP")]
    #[clap(help_heading = Some("Matching parameters"))]
    #[clap(default_value_t = DEFAULT_CONFIDENCE_INTERVAL)]
    pub confidence_interval: u32,

    /// Inversions with breakends at most this far apart are reported as foldbacks
    #[clap(long = "foldback-threshold")]
    #[clap(value_name = "BP")]
    #[clap(help_heading = Some("Matching parameters"))]
    #[clap(default_value_t = DEFAULT_FOLDBACK_THRESHOLD)]
    pub foldback_threshold: u64,

    /// Minimum supporting reads, 0 disables
    #[clap(long = "min-read-support")]
    #[clap(value_name = "INT")]
    #[clap(help_heading = Some("Filter parameters"))]
    #[clap(default_value_t = DEFAULT_READSUPPORT_THRESHOLD)]
    pub min_read_support: u32,

    /// Both breakends must be on one of these chromosomes [default: any]
    #[clap(long = "allowed-chromosome")]
    #[clap(value_name = "CHROM")]
    #[clap(help_heading = Some("Filter parameters"))]
    pub allowed_chromosomes: Vec<String>,

    /// Minimum deletion size, 0 disables
    #[clap(long = "min-deletion-size")]
    #[clap(value_name = "BP")]
    #[clap(help_heading = Some("Filter parameters"))]
    #[clap(default_value_t = DEFAULT_DELETION_SIZE_THRESHOLD)]
    pub min_deletion_size: u64,

    /// Minimum distance between the breakends of an intrachromosomal event, 0 disables
    #[clap(long = "min-break-distance")]
    #[clap(value_name = "BP")]
    #[clap(help_heading = Some("Filter parameters"))]
    #[clap(default_value_t = DEFAULT_BREAK_DISTANCE_THRESHOLD)]
    pub min_break_distance: u64,

    /// Number of threads to use for chromosome processing
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8
}

impl BreakpointsSettings {
    /// Builds the engine configuration from the matching and filter parameters
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let allowed_chromosomes = if self.allowed_chromosomes.is_empty() {
            None
        } else {
            Some(self.allowed_chromosomes.clone())
        };
        let config = EngineConfigBuilder::default()
            .confidence_interval_size(self.confidence_interval)
            .foldback_threshold(self.foldback_threshold)
            .readsupport_threshold(optional_threshold(self.min_read_support))
            .allowed_chromosomes(allowed_chromosomes)
            .deletion_size_threshold(optional_threshold(self.min_deletion_size))
            .break_distance_threshold(optional_threshold(self.min_break_distance))
            .build()?;
        Ok(config)
    }
}

pub fn check_breakpoints_settings(mut settings: BreakpointsSettings) -> anyhow::Result<BreakpointsSettings> {
    // hard code the version in
    settings.quorum_version = FULL_VERSION.clone();
    info!("quorum version: {:?}", &settings.quorum_version);
    info!("Sub-command: breakpoints");
    info!("Inputs:");

    // the output table is written in the tabular breakpoint schema, which VCF-like calls cannot fill
    ensure!(
        settings.base_caller != BreakpointCaller::Lumpy,
        "--base-caller {} is not supported, the base calls must come from a tabular caller such as {}",
        settings.base_caller, BreakpointCaller::Destruct
    );

    check_required_filename(&settings.base_filename, "Base calls")?;
    info!("\tBase calls: {:?} ({})", &settings.base_filename, settings.base_caller);
    check_required_filename(&settings.reference_filename, "Reference calls")?;
    info!("\tReference calls: {:?} ({})", &settings.reference_filename, settings.reference_caller);
    ensure!(
        settings.base_filename != settings.reference_filename,
        "--base-calls and --reference-calls must be different files"
    );

    // outputs
    info!("Outputs:");
    info!("\tBreakpoints: {:?}", &settings.output_breakpoints);
    info!("\tSummary: {:?}", &settings.output_summary);
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("\tDebug folder: {debug_folder:?}");
    }

    let config = settings.engine_config()?;
    info!("Matching parameters:");
    info!("\tConfidence interval: {}", config.confidence_interval_size());
    info!("\tFoldback threshold: {}", config.foldback_threshold());
    info!("Filter parameters:");
    info!("\tMinimum read support: {:?}", config.readsupport_threshold());
    info!("\tAllowed chromosomes: {:?}", config.allowed_chromosomes());
    info!("\tMinimum deletion size: {:?}", config.deletion_size_threshold());
    info!("\tMinimum break distance: {:?}", config.break_distance_threshold());

    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}
