use thiserror::Error;

/// Failure kinds the engine reports outward. Recoverable conditions
/// (analysis fallback, synthesis fallback, simplified video encode) are
/// handled in place and surfaced on the render outcome or as log warnings;
/// only these kinds abort a job.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Any failure inside the three mixing passes. Fatal: the job produces
    /// no output.
    #[error("mixing pipeline failed: {0}")]
    Pipeline(#[from] anyhow::Error),

    /// ffmpeg could not produce an artifact even after the simplified
    /// fallback encode.
    #[error("encoding failed: {0}")]
    Encode(String),
}
