use thiserror::Error;

/// Errors surfaced while assembling a predictor. All of these indicate a
/// configuration inconsistent with the model roster; none occur after
/// construction succeeds.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("vocabulary admits no symbols")]
    EmptyVocabulary,

    #[error("mixer expects {expected} inputs but its layer provides {found}")]
    MixerShape { expected: usize, found: usize },

    #[error("context id space of {size} cells exceeds the addressable range for a dense table")]
    ContextSize { size: u64 },
}
