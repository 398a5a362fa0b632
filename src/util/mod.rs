/// Natural ordering for chromosome names
pub mod chrom_order;
/// Helper functions for writing JSON via serde
pub mod json_io;
/// Helper functions for generating the progress bars
pub mod progress_bar;
