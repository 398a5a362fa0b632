
/// Matching base-caller breakpoints against the reference-caller index
pub mod breakpoint_consensus;
/// Foldback classification and the post-match filters
pub mod breakpoint_filter;
/// Per-chromosome, per-type interval index of reference breakpoints
pub mod breakpoint_index;
/// Command line interface functionality
pub mod cli;
/// Contains various shared data types
pub mod data_types;
/// Configuration shared by both consensus passes
pub mod engine_config;
/// Library error types
pub mod errors;
/// Allele trimming into a canonical representation
pub mod normalize;
/// Tooling for parsing caller outputs into meaningful structs / data
pub mod parsing;
/// Parallel per-chromosome orchestration of both passes
pub mod pipeline;
/// Core logic for the point-variant vote
pub mod point_consensus;
/// Various utility functions that tend to be very generic
pub mod util;
/// All output writers
pub mod writers;
