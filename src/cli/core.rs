
use anyhow::bail;
use clap::{Parser, Subcommand};
use chrono::Datelike;
use lazy_static::lazy_static;
use std::path::Path;

use crate::cli::breakpoints::BreakpointsSettings;
use crate::cli::points::PointsSettings;

lazy_static! {
    /// Stores the full version string we plan to use, which is generated in build.rs
    /// # Examples
    /// * `0.3.0-6bb9635-dirty` - while on a dirty branch
    /// * `0.3.0-6bb9635` - with a fresh commit
    pub static ref FULL_VERSION: String = format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("VERGEN_GIT_DESCRIBE"));

    /// Shared after help string
    pub static ref AFTER_HELP: String = format!("Copyright (C) 2020-{}     The quorum developers
This program comes with ABSOLUTELY NO WARRANTY; it is intended for
research use only.", chrono::Utc::now().year());
}

#[derive(Parser)]
#[clap(author,
    version = &**FULL_VERSION,
    about,
    after_help = &**AFTER_HELP)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

/// quorum, consensus calls from independent variant callers.
/// Select a subcommand to see more usage information:
#[derive(Subcommand)]
pub enum Commands {
    /// Votes on SNVs and indels reported by several point-variant callers
    Points(Box<PointsSettings>),
    /// Keeps structural variant breakpoints from one caller that a second caller confirms
    Breakpoints(Box<BreakpointsSettings>)
}

pub fn get_cli() -> Cli {
    Cli::parse()
}

/// Checks if a file exists and will otherwise exit
/// # Arguments
/// * `filename` - the file path to check for
/// * `label` - the label to use for error messages
pub fn check_required_filename(filename: &Path, label: &str) -> anyhow::Result<()> {
    if !filename.exists() {
        bail!("{} does not exist: \"{}\"", label, filename.display());
    }

    // file exists
    Ok(())
}

/// Converts a user threshold into an optional filter, 0 is the sentinel for disabled
pub fn optional_threshold<T: Default + PartialEq>(value: T) -> Option<T> {
    if value == T::default() {
        None
    } else {
        Some(value)
    }
}
