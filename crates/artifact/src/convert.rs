//! Archive-format conversion.
//!
//! [`ImageConverter`] turns a pulled image archive into the archival artifact.
//! [`SingularityConverter`] runs `singularity build` (or `apptainer build`).

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use imagenie_core::config::ConvertConfig;
use imagenie_core::process::{self, CommandSpec};
use tracing::info;

use crate::error::ArtifactError;

/// Converts a staging archive into an artifact file.
pub trait ImageConverter: Send + Sync + 'static {
    /// Builds `artifact` from `staging`.
    fn convert(
        &self,
        staging: &Path,
        artifact: &Path,
    ) -> impl Future<Output = Result<(), ArtifactError>> + Send;
}

/// `singularity build` adapter.
#[derive(Debug, Clone)]
pub struct SingularityConverter {
    program: String,
    timeout: Duration,
}

impl SingularityConverter {
    /// Creates a converter running `program` with a per-call timeout.
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Builds a converter from the `[convert]` config section.
    pub fn from_config(config: &ConvertConfig) -> Self {
        Self::new(config.program.clone(), config.timeout())
    }

    /// `singularity build --force <artifact> docker-archive:<staging>`
    pub fn command(&self, staging: &Path, artifact: &Path) -> CommandSpec {
        CommandSpec::new(&self.program, self.timeout).args([
            "build".to_owned(),
            "--force".to_owned(),
            artifact.display().to_string(),
            format!("docker-archive:{}", staging.display()),
        ])
    }
}

impl ImageConverter for SingularityConverter {
    async fn convert(&self, staging: &Path, artifact: &Path) -> Result<(), ArtifactError> {
        let spec = self.command(staging, artifact);
        process::run_checked(&spec)
            .await
            .map_err(|source| ArtifactError::Convert {
                path: staging.display().to_string(),
                source,
            })?;

        if !tokio::fs::try_exists(artifact).await.unwrap_or(false) {
            return Err(ArtifactError::MissingArtifact(
                artifact.display().to_string(),
            ));
        }

        info!(artifact = %artifact.display(), "artifact built");
        Ok(())
    }
}
