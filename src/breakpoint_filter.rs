use crate::data_types::breakpoint::{BreakpointRecord, RearrangementType};
use crate::data_types::chromosome_report::RejectionReason;
use crate::engine_config::EngineConfig;

/// Relabels short intrachromosomal inversions as foldbacks, everything else is returned unchanged.
/// # Arguments
/// * `record` - a matched breakpoint
/// * `foldback_threshold` - maximum breakend distance (inclusive) for a foldback
pub fn classify(record: BreakpointRecord, foldback_threshold: u64) -> BreakpointRecord {
    let is_short_inversion = record.rearrangement_type() == RearrangementType::Inversion &&
        record.break_distance().is_some_and(|d| d <= foldback_threshold);
    if is_short_inversion {
        record.relabeled(RearrangementType::Foldback)
    } else {
        record
    }
}

/// Returns the first filter a classified breakpoint fails, or None if it passes all of them.
/// Filters run in a fixed order: read support, chromosome allow-list, deletion size, then break distance.
/// Distance filters only apply to intrachromosomal events.
/// # Arguments
/// * `record` - the classified breakpoint
/// * `config` - thresholds, any of which may be disabled
pub fn filter(record: &BreakpointRecord, config: &EngineConfig) -> Option<RejectionReason> {
    if let Some(min_reads) = config.readsupport_threshold() {
        if record.num_reads() < min_reads {
            return Some(RejectionReason::LowReadSupport);
        }
    }

    if record.breakends().iter().any(|b| !config.is_allowed_chromosome(&b.chromosome)) {
        return Some(RejectionReason::ExcludedChromosome);
    }

    let distance = record.break_distance();
    if let (Some(min_size), Some(d)) = (config.deletion_size_threshold(), distance) {
        if record.rearrangement_type() == RearrangementType::Deletion && d < min_size {
            return Some(RejectionReason::SmallDeletion);
        }
    }

    if let (Some(min_distance), Some(d)) = (config.break_distance_threshold(), distance) {
        if d < min_distance {
            return Some(RejectionReason::ShortBreakDistance);
        }
    }

    None
}
