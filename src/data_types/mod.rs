
/// Structural variant breakpoints, breakends, and rearrangement vocabulary
pub mod breakpoint;
/// Parsed point-variant calls, normalized keys, and consensus records
pub mod call_record;
/// Supported callers and the sample layouts they report
pub mod callers;
/// Per-chromosome audit counts
pub mod chromosome_report;
