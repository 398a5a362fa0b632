use std::cmp::Ordering;

/// Sort key for a chromosome name: autosomes numerically, then X, Y, and mitochondria, then everything else by name.
/// A leading "chr" is ignored, so "chr2" and "2" sort together.
fn chromosome_rank(chromosome: &str) -> (u8, u32) {
    let stripped = chromosome.strip_prefix("chr").unwrap_or(chromosome);
    if let Ok(number) = stripped.parse::<u32>() {
        return (0, number);
    }
    match stripped {
        "X" => (1, 0),
        "Y" => (2, 0),
        "M" | "MT" => (3, 0),
        _ => (4, 0)
    }
}

/// Orders chromosome names naturally, e.g. chr1 < chr2 < chr10 < chrX < chrY < chrM < chrUn_xyz
pub fn compare_chromosomes(a: &str, b: &str) -> Ordering {
    chromosome_rank(a).cmp(&chromosome_rank(b))
        .then_with(|| a.cmp(b))
}
