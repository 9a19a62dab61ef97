use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors surfaced by the metric-projection pipeline.
///
/// Integrity errors mean the movie and the archive do not describe the
/// same data; bounds errors mean an implementation defect. Both are
/// always fatal. Availability errors may be downgraded to warnings by
/// the driver's missing-data policy.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("metric {0} is not supported")]
    UnknownMetric(String),

    #[error("metric {0} can only be loaded by metric, not by read")]
    ByReadRestricted(&'static str),

    #[error("insufficient data to compute metric {metric} from movie {movie}")]
    InsufficientData {
        metric: &'static str,
        movie: String,
    },

    #[error("movie does not include the {0} field")]
    MissingField(&'static str),

    #[error("movie field {field} holds {len} elements, need {needed}")]
    FieldTooShort {
        field: &'static str,
        len: usize,
        needed: usize,
    },

    #[error("alignment {alignment} references reference group {ref_group_id}, which is not in the archive")]
    UnknownRefGroup {
        alignment: usize,
        ref_group_id: u32,
    },

    #[error("alignment {alignment} references alignment group {aln_group_id}, which is not in the archive")]
    UnknownAlnGroup {
        alignment: usize,
        aln_group_id: u32,
    },

    #[error("alignment {alignment} references read group {name}, which is not under its reference group")]
    UnknownReadGroup { alignment: usize, name: String },

    #[error("alignment has hole number {hole_number}, which is not in the movie")]
    HoleNotInMovie { hole_number: u32 },

    #[error(
        "aligned query does not match basecalls \
         (hole {hole_number}, read {read_index}, query {query_start}..{query_end})"
    )]
    SequenceMismatch {
        hole_number: u32,
        read_index: usize,
        query_start: usize,
        query_end: usize,
    },

    #[error("alignments are not grouped by reference group and read group")]
    UngroupedAlignments,

    #[error("column range {offset}..{end} exceeds group length {len}")]
    ColumnOutOfRange {
        offset: usize,
        end: usize,
        len: usize,
    },

    #[error("pulse index {index} is out of range for {len} pulses")]
    PulseIndexOutOfRange { index: usize, len: usize },

    #[error("column element type mismatch for metric {0}")]
    ElementTypeMismatch(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
