use thiserror::Error;

/// Errors caused by bad build parameters or an unknown catalogue entry.
///
/// These signal a configuration bug, never a data condition to recover from.
#[non_exhaustive]
#[derive(Debug, Error, Clone)]
pub enum ConfigError {
    #[error("node kind `{0}` is not in the catalogue")]
    UnknownNodeKind(String),
    #[error("unknown limb kind `{0}`")]
    UnknownLimbKind(String),
    #[error("{count} extra joints exceed the alphabetic segment range (max {max})")]
    SegmentRangeExceeded { count: u32, max: u32 },
    #[error("missing required input: {0}")]
    MissingInput(String),
    #[error("invalid parameter record: {0}")]
    InvalidParameters(String),
}
