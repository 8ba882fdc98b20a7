//! Per-task staging workspace.
//!
//! A [`TaskWorkspace`] owns two paths derived from the container name:
//! the pulled archive `<staging_dir>/<name>.tar` and the converted artifact
//! `<staging_dir>/<name>.<ext>`. Both are removed by [`TaskWorkspace::cleanup`],
//! which is idempotent. If a workspace is dropped without cleanup (panic,
//! cancellation), `Drop` removes whatever is left synchronously.

use std::io;
use std::path::{Path, PathBuf};

pub use imagenie_core::types::ARCHIVE_EXTENSION;
use imagenie_core::types::validate_image_name;
use tracing::{debug, warn};

use crate::error::ArtifactError;

/// Staging paths owned by one container task.
#[derive(Debug)]
pub struct TaskWorkspace {
    name: String,
    staging_path: PathBuf,
    artifact_path: PathBuf,
    cleaned: bool,
}

impl TaskWorkspace {
    /// Derives the task's paths without touching the filesystem.
    ///
    /// Rejects names that are not valid registry repository names, since the
    /// name becomes part of a file path and of external command arguments.
    /// Also rejects an extension that would make both paths the same file.
    pub fn paths_for(
        staging_dir: &Path,
        name: &str,
        extension: &str,
    ) -> Result<(PathBuf, PathBuf), ArtifactError> {
        validate_image_name(name).map_err(|reason| ArtifactError::InvalidName {
            name: name.to_owned(),
            reason,
        })?;
        if extension.eq_ignore_ascii_case(ARCHIVE_EXTENSION) {
            return Err(ArtifactError::ExtensionCollision {
                extension: extension.to_owned(),
            });
        }
        Ok((
            staging_dir.join(format!("{name}.{ARCHIVE_EXTENSION}")),
            staging_dir.join(format!("{name}.{extension}")),
        ))
    }

    /// Creates the staging directory, removes stale files at the task's paths
    /// and returns the task's workspace.
    pub async fn acquire(
        staging_dir: &Path,
        name: &str,
        extension: &str,
    ) -> Result<Self, ArtifactError> {
        let (staging_path, artifact_path) = Self::paths_for(staging_dir, name, extension)?;
        tokio::fs::create_dir_all(staging_dir)
            .await
            .map_err(|e| ArtifactError::staging(staging_dir, e))?;

        // leftovers from an interrupted run; skopeo will not overwrite an archive
        for path in [&staging_path, &artifact_path] {
            remove_if_present(path)
                .await
                .map_err(|e| ArtifactError::staging(path, e))?;
        }

        debug!(
            container = name,
            staging = %staging_path.display(),
            artifact = %artifact_path.display(),
            "workspace acquired"
        );

        Ok(Self {
            name: name.to_owned(),
            staging_path,
            artifact_path,
            cleaned: false,
        })
    }

    /// Container name this workspace belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the pulled image archive.
    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Path of the converted artifact.
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// True once [`cleanup`](Self::cleanup) has succeeded.
    pub fn is_cleaned(&self) -> bool {
        self.cleaned
    }

    /// Removes both local files. Missing files are not an error.
    ///
    /// Both removals are attempted even if the first fails; the first error
    /// is returned. Calling this again after success does nothing.
    pub async fn cleanup(&mut self) -> Result<(), ArtifactError> {
        if self.cleaned {
            return Ok(());
        }

        let staging = remove_if_present(&self.staging_path).await;
        let artifact = remove_if_present(&self.artifact_path).await;

        staging.map_err(|e| ArtifactError::staging(&self.staging_path, e))?;
        artifact.map_err(|e| ArtifactError::staging(&self.artifact_path, e))?;

        self.cleaned = true;
        debug!(container = self.name.as_str(), "workspace cleaned");
        Ok(())
    }
}

impl Drop for TaskWorkspace {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        for path in [&self.staging_path, &self.artifact_path] {
            match std::fs::remove_file(path) {
                Ok(()) => warn!(
                    container = self.name.as_str(),
                    path = %path.display(),
                    "removed leftover staging file on drop"
                ),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    container = self.name.as_str(),
                    path = %path.display(),
                    error = %e,
                    "failed to remove leftover staging file"
                ),
            }
        }
    }
}

async fn remove_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
