use thiserror::Error;

/// Failures of the signal-conditioning core.
///
/// Every variant describes a problem with a single recording. Callers
/// processing a batch are expected to log the error and move on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EcgError {
    /// Flat or monotonic input, a zero-energy band, or too little history
    /// for a statistic.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// A statistic came out non-finite or cannot be computed stably.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    /// The signal (or peak list) is too short for the requested stage.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A configuration value is outside what the stage can honour.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, EcgError>;
