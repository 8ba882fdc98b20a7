//! Artifact error types.
//!
//! Every variant ends the current container task only; the orchestrator
//! records it as the task's failure reason.

use imagenie_core::error::ProcessError;

/// Errors from staging, pulling, converting or uploading an artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// The container name cannot be used as a file name or command argument.
    #[error("invalid container name '{name}': {reason}")]
    InvalidName {
        /// Rejected name
        name: String,
        /// Validation failure
        reason: String,
    },

    /// The artifact extension would reuse the staging archive's path.
    #[error("artifact extension '{extension}' collides with the staging archive")]
    ExtensionCollision {
        /// Configured artifact extension
        extension: String,
    },

    /// Local staging filesystem error.
    #[error("staging error at {path}: {source}")]
    Staging {
        /// Affected path
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Pulling the image into the staging path failed.
    #[error("pull of {image} failed: {source}")]
    Pull {
        /// Source image reference
        image: String,
        /// Underlying process error
        source: ProcessError,
    },

    /// Converting the staging archive failed.
    #[error("conversion of {path} failed: {source}")]
    Convert {
        /// Staging archive
        path: String,
        /// Underlying process error
        source: ProcessError,
    },

    /// Conversion reported success but produced no artifact.
    #[error("converter produced no artifact at {0}")]
    MissingArtifact(String),

    /// Uploading the artifact failed.
    #[error("upload of {key} failed: {reason}")]
    Upload {
        /// Destination key
        key: String,
        /// Failure description
        reason: String,
    },

    /// The configured destination could not be parsed.
    #[error("invalid destination '{destination}': {reason}")]
    InvalidDestination {
        /// Raw destination string
        destination: String,
        /// Parse failure
        reason: String,
    },
}

impl ArtifactError {
    pub(crate) fn staging(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Staging {
            path: path.display().to_string(),
            source,
        }
    }
}
