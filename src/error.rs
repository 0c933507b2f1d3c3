use thiserror::Error;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("auction context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("gas price unavailable: {0}")]
    GasPriceUnavailable(String),

    #[error("submission failed: {0}")]
    SubmissionFailed(String),
}
