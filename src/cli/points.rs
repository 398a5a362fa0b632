use anyhow::{bail, ensure};
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::data_types::callers::{PointCaller, SampleLayout};
use crate::engine_config::{EngineConfig, EngineConfigBuilder, IndelPolicy, DEFAULT_VOTE_THRESHOLD};
use crate::parsing::noodles_helper::get_vcf_sample_names;

#[derive(Args, Clone, Debug, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct PointsSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    quorum_version: String,

    /// Input point-variant calls (VCF-like, optionally gzipped), one per caller
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input-calls")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub input_filenames: Vec<PathBuf>,

    /// The caller that produced the corresponding input, in the same order as --input-calls
    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "caller")]
    #[clap(value_name = "CALLER")]
    #[clap(help_heading = Some("Input/Output"))]
    pub callers: Vec<PointCaller>,

    /// Germline sample to read counts from [default: first sample]
    #[clap(long = "sample")]
    #[clap(value_name = "SAMPLE")]
    #[clap(conflicts_with_all = ["tumor_sample", "normal_sample"])]
    #[clap(help_heading = Some("Input/Output"))]
    pub sample: Option<String>,

    /// Tumor sample, enables somatic mode [default: TUMOR]
    #[clap(long = "tumor-sample")]
    #[clap(value_name = "SAMPLE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub tumor_sample: Option<String>,

    /// Normal sample, enables somatic mode [default: NORMAL]
    #[clap(long = "normal-sample")]
    #[clap(value_name = "SAMPLE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub normal_sample: Option<String>,

    /// Output consensus calls (VCF-like, ".gz" for BGZF)
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-calls")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_calls: PathBuf,

    /// Output read counts side table (TSV)
    #[clap(long = "output-counts")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_counts: Option<PathBuf>,

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

    /// Restricts processing to these chromosomes
    #[clap(long = "chromosome")]
    #[clap(value_name = "CHROM")]
    #[clap(help_heading = Some("Input/Output"))]
    pub chromosomes: Vec<String>,

    /// Minimum number of distinct callers reporting a variant
    #[clap(long = "vote-threshold")]
    #[clap(value_name = "INT")]
    #[clap(help_heading = Some("Consensus parameters"))]
    #[clap(default_value_t = DEFAULT_VOTE_THRESHOLD)]
    pub vote_threshold: usize,

    /// Caller order used to pick the reported columns and counts, comma separated [default: museq,strelka,mutect,freebayes]
    #[clap(long = "caller-priority")]
    #[clap(value_name = "CALLERS")]
    #[clap(value_delimiter = ',')]
    #[clap(help_heading = Some("Consensus parameters"))]
    pub caller_priority: Vec<PointCaller>,

    /// How indel alleles from different callers are compared
    #[clap(long = "indel-policy")]
    #[clap(value_name = "POLICY")]
    #[clap(help_heading = Some("Consensus parameters"))]
    #[clap(default_value = "exact")]
    pub indel_policy: IndelPolicy,

    /// Only records with FILTER of PASS or "." vote
    #[clap(long = "require-pass")]
    #[clap(help_heading = Some("Consensus parameters"))]
    pub require_pass: bool,

    /// Number of threads to use for chromosome processing
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Resolved from the sample options
    #[clap(skip)]
    pub sample_layout: SampleLayout
}

impl PointsSettings {
    /// Builds the engine configuration from the consensus parameters
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut builder = EngineConfigBuilder::default();
        builder.vote_threshold(self.vote_threshold)
            .indel_policy(self.indel_policy)
            .require_pass(self.require_pass);
        if !self.caller_priority.is_empty() {
            builder.caller_priority(self.caller_priority.clone());
        }
        Ok(builder.build()?)
    }

    /// Chromosome restriction, if any
    pub fn restrict(&self) -> Option<&[String]> {
        if self.chromosomes.is_empty() {
            None
        } else {
            Some(&self.chromosomes)
        }
    }
}

pub fn check_points_settings(mut settings: PointsSettings) -> anyhow::Result<PointsSettings> {
    // hard code the version in
    settings.quorum_version = FULL_VERSION.clone();
    info!("quorum version: {:?}", &settings.quorum_version);
    info!("Sub-command: points");
    info!("Inputs:");

    ensure!(
        settings.input_filenames.len() == settings.callers.len(),
        "--input-calls and --caller must be provided the same number of times, found {} and {}",
        settings.input_filenames.len(), settings.callers.len()
    );
    for (i, (filename, caller)) in settings.input_filenames.iter().zip(settings.callers.iter()).enumerate() {
        check_required_filename(filename, format!("Input calls #{i}").as_str())?;
        if settings.callers[..i].contains(caller) {
            bail!("--caller {caller} was provided more than once");
        }
        info!("\tInput calls #{i}: {filename:?} ({caller})");
    }

    settings.sample_layout = if settings.tumor_sample.is_some() || settings.normal_sample.is_some() {
        SampleLayout::Somatic {
            tumor: settings.tumor_sample.clone().unwrap_or_else(|| "TUMOR".to_string()),
            normal: settings.normal_sample.clone().unwrap_or_else(|| "NORMAL".to_string())
        }
    } else {
        SampleLayout::Germline { sample: settings.sample.clone() }
    };
    info!("\tSample layout: {:?}", settings.sample_layout);
    for (i, filename) in settings.input_filenames.iter().enumerate() {
        let samples = get_vcf_sample_names(filename)?;
        info!("\tInput calls #{i} samples: {samples:?}");
        if let Err(e) = settings.sample_layout.resolve(&samples) {
            bail!("Input calls #{i} ({filename:?}): {e}");
        }
    }
    if let Some(allowed) = settings.restrict() {
        info!("\tChromosomes: {allowed:?}");
    } else {
        info!("\tChromosomes: ALL");
    }

    // outputs
    info!("Outputs:");
    info!("\tCalls: {:?}", &settings.output_calls);
    info!("\tCounts: {:?}", &settings.output_counts);
    info!("\tSummary: {:?}", &settings.output_summary);
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("\tDebug folder: {debug_folder:?}");
    }

    info!("Consensus parameters:");
    ensure!(settings.vote_threshold > 0, "--vote-threshold must be >0");
    info!("\tVote threshold: {}", settings.vote_threshold);
    let config = settings.engine_config()?;
    info!("\tCaller priority: {:?}", config.caller_priority());
    info!("\tIndel policy: {}", settings.indel_policy);
    info!("\tRequire PASS: {}", if settings.require_pass { "ENABLED" } else { "DISABLED" });

    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::core::{Cli, Commands};

    fn parse(args: &[&str]) -> PointsSettings {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Points(settings) => *settings,
            _ => panic!("expected the points subcommand")
        }
    }

    #[test]
    fn test_parse_points() {
        let settings = parse(&[
            "quorum", "points",
            "-i", "a.vcf", "-c", "museq",
            "-i", "b.vcf", "-c", "strelka",
            "-o", "out.vcf",
            "--caller-priority", "strelka,museq,mutect,freebayes",
            "--indel-policy", "positional"
        ]);
        assert_eq!(settings.callers, vec![PointCaller::Museq, PointCaller::Strelka]);
        assert_eq!(settings.vote_threshold, 2);
        assert!(settings.restrict().is_none());

        let config = settings.engine_config().unwrap();
        assert_eq!(config.caller_priority()[0], PointCaller::Strelka);
        assert_eq!(config.indel_policy(), IndelPolicy::Positional);
    }

    #[test]
    fn test_bad_priority() {
        let settings = parse(&[
            "quorum", "points", "-i", "a.vcf", "-c", "museq", "-o", "out.vcf",
            "--caller-priority", "strelka,museq"
        ]);
        assert!(settings.engine_config().is_err());
    }

    #[test]
    fn test_sample_conflicts() {
        let result = Cli::try_parse_from([
            "quorum", "points", "-i", "a.vcf", "-c", "museq", "-o", "out.vcf",
            "--sample", "S1", "--tumor-sample", "T"
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sample_checked_against_header() {
        let filename = std::env::temp_dir().join(format!("quorum_points_cli_{}.vcf", std::process::id()));
        std::fs::write(&filename, "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\n").unwrap();
        let input = filename.to_string_lossy().to_string();

        let settings = parse(&["quorum", "points", "-i", &input, "-c", "museq", "-o", "out.vcf", "--sample", "S1"]);
        let found = check_points_settings(settings);
        let settings = parse(&["quorum", "points", "-i", &input, "-c", "museq", "-o", "out.vcf", "--sample", "NA12878"]);
        let missing = check_points_settings(settings);
        std::fs::remove_file(&filename).unwrap();

        assert!(found.is_ok());
        assert!(missing.unwrap_err().to_string().contains("Input calls #0"));
    }
}
