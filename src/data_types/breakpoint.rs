use strum_macros::{Display, EnumString};

use crate::data_types::callers::BreakpointCaller;
use crate::errors::ConsensusError;

/// Orientation of a breakend
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, Hash, PartialEq)]
pub enum Strand {
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus
}

/// Rearrangement vocabulary used by tabular breakpoint callers
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[strum(serialize_all = "lowercase")]
pub enum RearrangementType {
    Deletion,
    Inversion,
    Duplication,
    Translocation,
    /// Short intrachromosomal inversion; only produced by reclassification or by the caller itself
    Foldback,
    Balanced,
    Unbalanced
}

/// SVTYPE vocabulary used by VCF-like breakpoint callers
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, Hash, PartialEq)]
#[strum(serialize_all = "UPPERCASE")]
pub enum SvTypeTag {
    Del,
    Inv,
    Dup,
    Bnd
}

impl SvTypeTag {
    /// The rearrangement type this tag is read as
    pub fn rearrangement_type(&self) -> RearrangementType {
        match self {
            SvTypeTag::Del => RearrangementType::Deletion,
            SvTypeTag::Inv => RearrangementType::Inversion,
            SvTypeTag::Dup => RearrangementType::Duplication,
            SvTypeTag::Bnd => RearrangementType::Translocation
        }
    }
}

impl RearrangementType {
    /// Returns the SVTYPE this type is allowed to match.
    /// This is the only place type compatibility is defined: deletion-DEL, inversion-INV, duplication-DUP, translocation-BND.
    /// # Errors
    /// * if the type has no SVTYPE counterpart; these are never treated as a silent non-match
    pub fn compatible_tag(&self) -> Result<SvTypeTag, ConsensusError> {
        match self {
            RearrangementType::Deletion => Ok(SvTypeTag::Del),
            RearrangementType::Inversion => Ok(SvTypeTag::Inv),
            RearrangementType::Duplication => Ok(SvTypeTag::Dup),
            RearrangementType::Translocation => Ok(SvTypeTag::Bnd),
            RearrangementType::Foldback |
            RearrangementType::Balanced |
            RearrangementType::Unbalanced => Err(ConsensusError::UnknownType { label: self.to_string() })
        }
    }

    /// Parses either vocabulary, e.g. "deletion" or "DEL".
    /// # Errors
    /// * if the label is in neither vocabulary
    pub fn from_label(label: &str) -> Result<Self, ConsensusError> {
        if let Ok(rt) = label.parse::<RearrangementType>() {
            Ok(rt)
        } else if let Ok(tag) = label.parse::<SvTypeTag>() {
            Ok(tag.rearrangement_type())
        } else {
            Err(ConsensusError::UnknownType { label: label.to_string() })
        }
    }
}

/// Window around a reported breakend, relative to the breakend position (e.g. CIPOS=-10,25)
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConfidenceInterval {
    pub lower: i64,
    pub upper: i64
}

impl ConfidenceInterval {
    /// Constructor, swaps the bounds if they were provided backwards
    pub fn new(lower: i64, upper: i64) -> Self {
        Self {
            lower: lower.min(upper),
            upper: lower.max(upper)
        }
    }

    /// A symmetric +-`size` window
    pub fn symmetric(size: u32) -> Self {
        Self::new(-(size as i64), size as i64)
    }
}

/// One end of a breakpoint
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Breakend {
    pub chromosome: String,
    pub position: u64,
    pub strand: Strand,
    /// Explicit caller-provided confidence interval, if any
    pub confidence_interval: Option<ConfidenceInterval>
}

impl Breakend {
    pub fn new(chromosome: String, position: u64, strand: Strand, confidence_interval: Option<ConfidenceInterval>) -> Self {
        Self { chromosome, position, strand, confidence_interval }
    }
}

/// A structural variant breakpoint: an ordered pair of breakends
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BreakpointRecord {
    /// Caller-provided identifier
    id: String,
    /// Source caller
    caller: BreakpointCaller,
    /// End 1
    breakend_1: Breakend,
    /// End 2
    breakend_2: Breakend,
    /// Classification as reported (or reclassified)
    rearrangement_type: RearrangementType,
    /// Number of supporting reads
    num_reads: u32
}

impl BreakpointRecord {
    /// Constructor
    pub fn new(
        id: String, caller: BreakpointCaller,
        breakend_1: Breakend, breakend_2: Breakend,
        rearrangement_type: RearrangementType, num_reads: u32
    ) -> Self {
        Self {
            id, caller,
            breakend_1, breakend_2,
            rearrangement_type, num_reads
        }
    }

    /// Returns a copy of this record with a new classification, used by the reclassification step
    pub fn relabeled(&self, rearrangement_type: RearrangementType) -> Self {
        Self {
            rearrangement_type,
            ..self.clone()
        }
    }

    /// True if both ends are on the same chromosome
    pub fn is_intrachromosomal(&self) -> bool {
        self.breakend_1.chromosome == self.breakend_2.chromosome
    }

    /// Distance between the two ends; undefined for interchromosomal events
    pub fn break_distance(&self) -> Option<u64> {
        if self.is_intrachromosomal() {
            Some(self.breakend_1.position.abs_diff(self.breakend_2.position))
        } else {
            None
        }
    }

    // getters
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn caller(&self) -> BreakpointCaller {
        self.caller
    }

    pub fn breakend_1(&self) -> &Breakend {
        &self.breakend_1
    }

    pub fn breakend_2(&self) -> &Breakend {
        &self.breakend_2
    }

    pub fn breakends(&self) -> [&Breakend; 2] {
        [&self.breakend_1, &self.breakend_2]
    }

    pub fn rearrangement_type(&self) -> RearrangementType {
        self.rearrangement_type
    }

    pub fn num_reads(&self) -> u32 {
        self.num_reads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_labels() {
        assert_eq!(RearrangementType::from_label("deletion").unwrap(), RearrangementType::Deletion);
        assert_eq!(RearrangementType::from_label("BND").unwrap(), RearrangementType::Translocation);
        assert_eq!(RearrangementType::from_label("foldback").unwrap(), RearrangementType::Foldback);
        assert!(matches!(
            RearrangementType::from_label("INS"),
            Err(ConsensusError::UnknownType { .. })
        ));
        assert_eq!(RearrangementType::Duplication.to_string(), "duplication");
        assert_eq!(SvTypeTag::Inv.to_string(), "INV");
    }

    #[test]
    fn test_compatibility_closure() {
        assert_eq!(RearrangementType::Deletion.compatible_tag().unwrap(), SvTypeTag::Del);
        assert_eq!(RearrangementType::Translocation.compatible_tag().unwrap(), SvTypeTag::Bnd);
        for unmapped in [RearrangementType::Foldback, RearrangementType::Balanced, RearrangementType::Unbalanced] {
            assert!(matches!(unmapped.compatible_tag(), Err(ConsensusError::UnknownType { .. })));
        }

        // mapping is bidirectional
        for tag in [SvTypeTag::Del, SvTypeTag::Inv, SvTypeTag::Dup, SvTypeTag::Bnd] {
            assert_eq!(tag.rearrangement_type().compatible_tag().unwrap(), tag);
        }
    }

    #[test]
    fn test_break_distance() {
        let bp = BreakpointRecord::new(
            "1".to_string(), BreakpointCaller::Destruct,
            Breakend::new("1".to_string(), 5000, Strand::Plus, None),
            Breakend::new("1".to_string(), 2000, Strand::Minus, None),
            RearrangementType::Deletion, 10
        );
        assert!(bp.is_intrachromosomal());
        assert_eq!(bp.break_distance(), Some(3000));

        let tra = BreakpointRecord::new(
            "2".to_string(), BreakpointCaller::Destruct,
            Breakend::new("1".to_string(), 5000, Strand::Plus, None),
            Breakend::new("7".to_string(), 5000, Strand::Minus, None),
            RearrangementType::Translocation, 10
        );
        assert_eq!(tra.break_distance(), None);
        assert_eq!(tra.relabeled(RearrangementType::Balanced).rearrangement_type(), RearrangementType::Balanced);
    }

    #[test]
    fn test_confidence_interval() {
        assert_eq!(ConfidenceInterval::symmetric(500), ConfidenceInterval { lower: -500, upper: 500 });
        assert_eq!(ConfidenceInterval::new(10, -4), ConfidenceInterval { lower: -4, upper: 10 });
    }
}
