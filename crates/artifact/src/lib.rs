#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Artifact errors (`ArtifactError`)
//! - [`workspace`]: Per-task staging paths and cleanup (`TaskWorkspace`)
//! - [`pull`]: Registry pull (`ImagePuller`, `SkopeoPuller`)
//! - [`convert`]: Archive conversion (`ImageConverter`, `SingularityConverter`)
//! - [`upload`]: Durable storage (`ObjectStore`, `Store`, `Uploader`)

pub mod convert;
pub mod error;
pub mod pull;
pub mod upload;
pub mod workspace;

// --- Public API Re-exports ---

pub use convert::{ImageConverter, SingularityConverter};
pub use error::ArtifactError;
pub use pull::{ImagePuller, ImageRef, SkopeoPuller};
pub use upload::{
    DestinationKey, GcsCliStore, LocalDirStore, ObjectStore, StorageLocation, Store, Uploader,
};
pub use workspace::{ARCHIVE_EXTENSION, TaskWorkspace};
