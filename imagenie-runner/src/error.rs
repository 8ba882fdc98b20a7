//! Run-level errors and exit code mapping.

use imagenie_core::error::ImagenieError;
use imagenie_scanner::ScannerError;

/// Error that ends a run.
///
/// Container-level failures never surface here; they end up in the run
/// report as `failed` dispositions.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Configuration could not be loaded, overridden or validated.
    #[error("configuration error: {0}")]
    Config(String),

    /// Vulnerability database preparation exhausted its retries.
    #[error("aborting run: {0}")]
    DbPreparation(#[source] ScannerError),

    /// Cancelled before every container was attempted.
    #[error("run cancelled: {0}")]
    Cancelled(String),

    /// A production collaborator could not be constructed.
    #[error("setup error: {0}")]
    Setup(String),

    /// Report serialisation failed.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// Writing the report failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other fatal error (logging or metrics initialisation).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RunError {
    /// Process exit code.
    ///
    /// | Code | Meaning |
    /// |------|---------|
    /// | 1 | Other fatal error |
    /// | 2 | Configuration error |
    /// | 3 | Vulnerability DB preparation exhausted |
    /// | 4 | Cancelled before all containers were attempted |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::DbPreparation(_) => 3,
            Self::Cancelled(_) => 4,
            Self::Setup(_) | Self::JsonSerialize(_) | Self::Io(_) | Self::Other(_) => 1,
        }
    }
}

impl From<ImagenieError> for RunError {
    fn from(err: ImagenieError) -> Self {
        match err {
            ImagenieError::Config(e) => Self::Config(e.to_string()),
            other => Self::Setup(other.to_string()),
        }
    }
}
