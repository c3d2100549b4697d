use thiserror::Error;

/// A structural invariant of the data model was violated (§3, §7
/// `InvariantViolation`). Distinct from the engine's runtime `EngineError`
/// so this crate has no dependency on the engine crate; the engine wraps
/// this error when surfacing it to a command caller.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ModelError {
    #[error("{field} must be > 0, got {value}")]
    MustBePositive { field: &'static str, value: f64 },

    #[error("{field} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("trimStart ({trim_start}) must be <= trimEnd ({trim_end})")]
    TrimOutOfOrder { trim_start: f64, trim_end: f64 },

    #[error("cuePoint ({cue_point}) must be within [trimStart ({trim_start}), trimEnd ({trim_end})]")]
    CuePointOutOfRange {
        cue_point: f64,
        trim_start: f64,
        trim_end: f64,
    },

    #[error("source id appears in its own target set")]
    SourceTargetsItself,

    #[error("duplicate element id within track: {0}")]
    DuplicateElementId(String),
}
