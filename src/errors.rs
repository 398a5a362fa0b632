/*!
# Errors
Error types shared by the consensus engine.
Chromosome-level processing is the error boundary: any `ConsensusError` returned from a chromosome pass aborts that chromosome only.
*/

/// Failures while reducing a REF/ALT pair to its minimal representation
#[derive(thiserror::Error, Clone, Debug, Eq, PartialEq)]
pub enum NormalizationError {
    #[error("allele is empty")]
    EmptyAllele,
    #[error("symbolic or placeholder allele {allele:?} cannot be normalized")]
    SymbolicAllele { allele: String },
    #[error("alleles of different length do not share an anchor base")]
    MissingAnchor,
}

#[derive(thiserror::Error, Debug)]
pub enum ConsensusError {
    /// A record (or the stream header) is missing a mandatory field or has a malformed one
    #[error("{source_label} line {line}: {reason}")]
    Parse {
        source_label: String,
        line: u64,
        chromosome: Option<String>,
        reason: String
    },
    /// A single record could not be normalized; this is counted and logged, not fatal
    #[error("cannot normalize {reference}>{alternate} at {chromosome}:{position}: {source}")]
    Normalization {
        chromosome: String,
        position: u64,
        reference: String,
        alternate: String,
        #[source]
        source: NormalizationError
    },
    /// A rearrangement type outside the matching vocabulary
    #[error("unknown rearrangement type {label:?}")]
    UnknownType { label: String },
    #[error("record on {found} was provided to the {expected} pass")]
    ChromosomeMismatch { expected: String, found: String },
    #[error("{found} record was provided to the {expected} breakpoint pass")]
    CallerMismatch { expected: String, found: String },
    /// The reference caller failed to load this chromosome, so any query against it is unreliable
    #[error("breakpoint index is incomplete for {chromosome}; the reference caller failed to load it")]
    IncompleteIndex { chromosome: String },
    #[error("{chromosome}:{position} is outside the supported coordinate range")]
    PositionOverflow { chromosome: String, position: i64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl ConsensusError {
    /// Returns the chromosome a parse failure is attributed to, if any.
    /// Failures without a chromosome cannot be isolated and fail the whole stream.
    pub fn parse_chromosome(&self) -> Option<&str> {
        match self {
            ConsensusError::Parse { chromosome, .. } => chromosome.as_deref(),
            _ => None
        }
    }
}
