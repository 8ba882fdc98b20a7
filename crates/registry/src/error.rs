//! Registry error types.
//!
//! Discovery never propagates a [`RegistryError`]: a failed page ends
//! pagination and is logged.

/// Errors returned by a [`RegistryClient`](crate::RegistryClient).
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The registry answered with a non-success HTTP status.
    #[error("registry returned status {status} for page {page}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Requested page number
        page: u32,
    },

    /// The request never produced a response (DNS, TLS, timeout, reset).
    #[error("registry transport error: {0}")]
    Transport(String),

    /// The response body was not a repository listing.
    #[error("malformed registry response: {0}")]
    Decode(String),

    /// The namespace failed validation before any request was sent.
    #[error("invalid namespace '{namespace}': {reason}")]
    InvalidNamespace {
        /// Rejected namespace
        namespace: String,
        /// Validation failure
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(String),
}

impl RegistryError {
    /// True when a later retry of the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
