/*!
# CLI module
Command line interface functionality that is specific to quorum.
*/

/// The main CLI module that contains the top-level CLI parser and help text
pub mod core;
/// The breakpoints CLI subcommand
pub mod breakpoints;
/// The points CLI subcommand
pub mod points;
