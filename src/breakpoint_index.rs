/*!
# Breakpoint interval index
Interval lookup over the breakends of the reference breakpoint caller.
Each breakend contributes one window, `[position + ci.lower, position + ci.upper]` (1-based, inclusive), to a tree keyed by its chromosome and SVTYPE tag.
An explicit caller-provided confidence interval always wins over the symmetric default window.
*/
use coitrees::{COITree, Interval, IntervalTree};
use log::{debug, warn};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use crate::data_types::breakpoint::{BreakpointRecord, ConfidenceInterval, RearrangementType, SvTypeTag};
use crate::engine_config::DEFAULT_CONFIDENCE_INTERVAL;
use crate::errors::ConsensusError;

/// Reasons a chromosome cannot be queried
#[derive(Clone, Debug, Eq, PartialEq)]
enum IndexGap {
    /// The reference caller failed to parse this chromosome
    ParseFailure,
    /// A reference record here had a type with no SVTYPE counterpart
    UnknownType { label: String },
    /// A reference window here fell outside the supported coordinate range
    PositionOverflow { position: i64 }
}

/// Per-chromosome interval trees over reference breakends
pub struct BreakpointIndex {
    /// chromosome -> SVTYPE -> tree; COITree ranges are inclusive
    trees: BTreeMap<String, FxHashMap<SvTypeTag, COITree<(), usize>>>,
    /// Chromosomes where a query would be unreliable
    gaps: BTreeMap<String, IndexGap>
}

impl std::fmt::Debug for BreakpointIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // COITree does not have Debug, so report interval counts instead
        let counts: BTreeMap<&str, usize> = self.trees.iter()
            .map(|(chrom, by_tag)| (chrom.as_str(), by_tag.values().map(|t| t.len()).sum()))
            .collect();
        f.debug_struct("BreakpointIndex")
            .field("interval_counts", &counts)
            .field("gaps", &self.gaps)
            .finish()
    }
}

/// Converts a 1-based coordinate plus offset into the tree's coordinate space
fn to_coordinate(chromosome: &str, position: i64) -> Result<i32, ConsensusError> {
    i32::try_from(position)
        .map_err(|_e| ConsensusError::PositionOverflow { chromosome: chromosome.to_string(), position })
}

impl BreakpointIndex {
    /// Builds the index from every reference breakpoint.
    /// # Arguments
    /// * `breakpoints` - reference caller records, from any chromosome
    /// * `confidence_interval` - symmetric window for breakends without their own interval, defaults to 500
    /// * `failed_chromosomes` - chromosomes the reference caller failed to load, queries against these are errors
    ///
    /// A window outside the supported coordinate range marks its chromosome as a gap instead of being indexed.
    pub fn build<'a, I>(breakpoints: I, confidence_interval: Option<u32>, failed_chromosomes: &[String]) -> Self
    where
        I: IntoIterator<Item = &'a BreakpointRecord>
    {
        let default_ci = ConfidenceInterval::symmetric(confidence_interval.unwrap_or(DEFAULT_CONFIDENCE_INTERVAL));
        let mut gaps: BTreeMap<String, IndexGap> = failed_chromosomes.iter()
            .map(|c| (c.clone(), IndexGap::ParseFailure))
            .collect();

        let mut intervals: BTreeMap<String, FxHashMap<SvTypeTag, Vec<Interval<()>>>> = Default::default();
        let mut record_count = 0;
        for record in breakpoints.into_iter() {
            record_count += 1;
            let tag = match record.rearrangement_type().compatible_tag() {
                Ok(tag) => tag,
                Err(_e) => {
                    let label = record.rearrangement_type().to_string();
                    for breakend in record.breakends() {
                        gaps.entry(breakend.chromosome.clone())
                            .or_insert_with(|| IndexGap::UnknownType { label: label.clone() });
                    }
                    continue;
                }
            };

            for breakend in record.breakends() {
                let ci = breakend.confidence_interval.unwrap_or(default_ci);
                let position = i64::try_from(breakend.position).unwrap_or(i64::MAX);
                let window = to_coordinate(&breakend.chromosome, position.saturating_add(ci.lower))
                    .and_then(|first| {
                        to_coordinate(&breakend.chromosome, position.saturating_add(ci.upper))
                            .map(|last| (first, last))
                    });
                let (first, last) = match window {
                    Ok(w) => w,
                    Err(e) => {
                        warn!("Skipping reference window for {}: {e}", record.id());
                        gaps.entry(breakend.chromosome.clone())
                            .or_insert(IndexGap::PositionOverflow { position });
                        continue;
                    }
                };
                intervals.entry(breakend.chromosome.clone()).or_default()
                    .entry(tag).or_default()
                    .push(Interval::new(first, last, ()));
            }
        }

        let trees = intervals.into_iter()
            .map(|(chrom, by_tag)| {
                let by_tag = by_tag.into_iter()
                    .map(|(tag, tag_intervals)| (tag, COITree::new(&tag_intervals)))
                    .collect();
                (chrom, by_tag)
            })
            .collect();

        let index = Self { trees, gaps };
        debug!("Built breakpoint index from {record_count} records: {index:?}");
        index
    }

    /// Returns true if a window of a compatible type on `chromosome` covers `position`.
    /// # Arguments
    /// * `chromosome` - breakend chromosome
    /// * `position` - breakend position, 1-based
    /// * `rearrangement_type` - the queried record's type
    /// # Errors
    /// * if `rearrangement_type` has no SVTYPE counterpart
    /// * if the reference caller could not provide a complete index for `chromosome`
    /// * if `position` is outside the supported coordinate range
    pub fn matches(&self, chromosome: &str, position: u64, rearrangement_type: RearrangementType) -> Result<bool, ConsensusError> {
        let tag = rearrangement_type.compatible_tag()?;
        match self.gaps.get(chromosome) {
            Some(IndexGap::ParseFailure) => {
                return Err(ConsensusError::IncompleteIndex { chromosome: chromosome.to_string() });
            },
            Some(IndexGap::UnknownType { label }) => {
                return Err(ConsensusError::UnknownType { label: label.clone() });
            },
            Some(&IndexGap::PositionOverflow { position }) => {
                return Err(ConsensusError::PositionOverflow { chromosome: chromosome.to_string(), position });
            },
            None => {}
        };

        let position = to_coordinate(chromosome, i64::try_from(position).unwrap_or(i64::MAX))?;
        let found = match self.trees.get(chromosome).and_then(|by_tag| by_tag.get(&tag)) {
            Some(tree) => tree.query_count(position, position) > 0,
            None => false
        };
        Ok(found)
    }

    /// Number of indexed windows on a chromosome
    pub fn interval_count(&self, chromosome: &str) -> usize {
        self.trees.get(chromosome)
            .map(|by_tag| by_tag.values().map(|t| t.len()).sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::breakpoint::{Breakend, Strand};
    use crate::data_types::callers::BreakpointCaller;

    fn lumpy(chrom_1: &str, pos_1: u64, chrom_2: &str, pos_2: u64, tag: SvTypeTag, ci: Option<ConfidenceInterval>) -> BreakpointRecord {
        BreakpointRecord::new(
            "ref".to_string(), BreakpointCaller::Lumpy,
            Breakend::new(chrom_1.to_string(), pos_1, Strand::Plus, ci),
            Breakend::new(chrom_2.to_string(), pos_2, Strand::Minus, ci),
            tag.rearrangement_type(), 10
        )
    }

    #[test]
    fn test_window_boundaries() {
        let records = vec![lumpy("1", 10000, "1", 20000, SvTypeTag::Del, None)];
        let index = BreakpointIndex::build(&records, Some(500), &[]);
        assert_eq!(index.interval_count("1"), 2);

        for (pos, expected) in [(9499, false), (9500, true), (10000, true), (10500, true), (10501, false), (20500, true), (20501, false)] {
            assert_eq!(index.matches("1", pos, RearrangementType::Deletion).unwrap(), expected, "pos {pos}");
        }

        // wrong type or chromosome never matches
        assert!(!index.matches("1", 10000, RearrangementType::Duplication).unwrap());
        assert!(!index.matches("2", 10000, RearrangementType::Deletion).unwrap());
    }

    #[test]
    fn test_explicit_interval_wins() {
        let records = vec![lumpy("1", 10000, "1", 20000, SvTypeTag::Inv, Some(ConfidenceInterval::new(-10, 20)))];

        // the 500bp default window is ignored in favor of -10,20
        let index = BreakpointIndex::build(&records, None, &[]);
        assert!(index.matches("1", 9990, RearrangementType::Inversion).unwrap());
        assert!(!index.matches("1", 9989, RearrangementType::Inversion).unwrap());
        assert!(index.matches("1", 10020, RearrangementType::Inversion).unwrap());
        assert!(!index.matches("1", 10021, RearrangementType::Inversion).unwrap());
    }

    #[test]
    fn test_translocation_ends() {
        let records = vec![lumpy("2", 500, "5", 9000, SvTypeTag::Bnd, None)];
        let index = BreakpointIndex::build(&records, Some(100), &[]);
        assert!(index.matches("2", 550, RearrangementType::Translocation).unwrap());
        assert!(index.matches("5", 8950, RearrangementType::Translocation).unwrap());
        assert!(!index.matches("5", 550, RearrangementType::Translocation).unwrap());
    }

    #[test]
    fn test_query_errors() {
        let records = vec![lumpy("1", 10000, "1", 20000, SvTypeTag::Del, None)];
        let index = BreakpointIndex::build(&records, None, &["3".to_string()]);
        assert!(matches!(
            index.matches("1", 10000, RearrangementType::Foldback),
            Err(ConsensusError::UnknownType { .. })
        ));
        assert!(matches!(
            index.matches("1", 10000, RearrangementType::Balanced),
            Err(ConsensusError::UnknownType { .. })
        ));
        assert!(matches!(
            index.matches("3", 10000, RearrangementType::Deletion),
            Err(ConsensusError::IncompleteIndex { .. })
        ));
        assert!(matches!(
            index.matches("1", u64::MAX, RearrangementType::Deletion),
            Err(ConsensusError::PositionOverflow { .. })
        ));
    }

    #[test]
    fn test_unmapped_reference_type() {
        let foldback = BreakpointRecord::new(
            "fb".to_string(), BreakpointCaller::Destruct,
            Breakend::new("4".to_string(), 100, Strand::Plus, None),
            Breakend::new("4".to_string(), 900, Strand::Plus, None),
            RearrangementType::Foldback, 10
        );
        let index = BreakpointIndex::build([&foldback], None, &[]);
        assert!(matches!(
            index.matches("4", 100, RearrangementType::Inversion),
            Err(ConsensusError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_window_overflow_is_local() {
        let records = vec![
            lumpy("1", 10000, "1", 50000, SvTypeTag::Del, None),
            lumpy("big", 3_000_000_000, "big", 3_000_001_000, SvTypeTag::Del, None)
        ];
        let index = BreakpointIndex::build(&records, None, &[]);
        assert_eq!(index.interval_count("1"), 2);
        assert_eq!(index.interval_count("big"), 0);
        assert!(index.matches("1", 10100, RearrangementType::Deletion).unwrap());
        assert!(matches!(
            index.matches("big", 100, RearrangementType::Deletion),
            Err(ConsensusError::PositionOverflow { ref chromosome, .. }) if chromosome == "big"
        ));
    }
}
