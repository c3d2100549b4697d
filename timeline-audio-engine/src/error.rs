use timeline_audio_api::ModelError;

/// The five error kinds of §7, each with its own propagation policy. Most
/// of these are never returned from scheduler internals (that layer skips
/// and logs per §7); they exist for code paths that do need to report
/// failure, mainly command execution and explicit manager queries.
#[derive(thiserror::Error, Debug, Clone)]
pub enum EngineError {
    /// A scene/state/config/definition/marker id was missing on update or
    /// delete. Surfaced to the command caller; never retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// Audio fetch or decode failed. Logged; the affected clip/one-shot is
    /// skipped for the session; non-fatal.
    #[error("decode failed for {source_key}: {reason}")]
    DecodeFailure { source_key: String, reason: String },

    /// Same policy as `DecodeFailure`.
    #[error("sink init failed for {source_key}: {reason}")]
    SinkInitFailure { source_key: String, reason: String },

    /// Input torn down mid-iteration due to a timeline edit. Swallowed by
    /// the scheduler; the affected iterator exits cleanly.
    #[error("input disposed mid-iteration")]
    Disposed,

    /// Trim/cue out of order, volume out of range, `timeScale <= 0`, etc.
    /// Rejected at the command boundary; the command does not mutate the
    /// scene.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl From<ModelError> for EngineError {
    fn from(e: ModelError) -> Self {
        EngineError::InvariantViolation(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
