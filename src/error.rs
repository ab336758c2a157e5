use thiserror::Error;

/// Failure modes of the prediction engine.
///
/// Fatal variants abort the Manager run they occur in; partially written
/// predictions must not be read after a failure.
#[derive(Debug, Error)]
pub enum Error {
    /// Empty timetable, or a timetable too short for the requested ride.
    #[error("degenerate timetable for train {train_id}: {reason}")]
    DegenerateTimetable { train_id: i64, reason: String },

    /// Dispatcher and journey disagree about the action protocol. Indicates
    /// a bug, not bad input data.
    #[error("dispatch protocol violation: {0}")]
    Protocol(String),

    /// Time arithmetic outside the supported window (8 hours, same day).
    #[error("time out of range: {0}")]
    OutOfRange(String),

    /// The minimum-stop-time table has no global fallback rule.
    #[error("minimum stop time table lacks a global default rule")]
    NoDefault,

    /// A location id is not of the `CODE#variant` form.
    #[error("malformed location id {0:?}: expected exactly one `#`")]
    MalformedLocationId(String),

    /// Two elements on the same line share an id.
    #[error("duplicate element id {0:?} on line")]
    DuplicateElementId(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
