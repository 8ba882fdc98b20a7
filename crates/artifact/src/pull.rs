//! Image puller.
//!
//! [`ImagePuller`] copies a registry image into a local archive. The
//! production [`SkopeoPuller`] shells out to `skopeo copy`.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use imagenie_core::config::PullConfig;
use imagenie_core::process::{self, CommandSpec};
use tracing::{debug, info};

use crate::error::ArtifactError;

/// A registry image reference: `docker://<namespace>/<name>:<tag>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    /// Registry namespace (organisation).
    pub namespace: String,
    /// Repository name.
    pub name: String,
    /// Tag.
    pub tag: String,
}

impl ImageRef {
    /// Builds a reference from its parts.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "docker://{}/{}:{}", self.namespace, self.name, self.tag)
    }
}

/// Copies an image into a local archive.
pub trait ImagePuller: Send + Sync + 'static {
    /// Pulls `image` into `dest`. A pre-existing `dest` is replaced.
    fn pull(
        &self,
        image: &ImageRef,
        dest: &Path,
    ) -> impl Future<Output = Result<(), ArtifactError>> + Send;
}

/// `skopeo copy` adapter.
#[derive(Debug, Clone)]
pub struct SkopeoPuller {
    program: String,
    timeout: Duration,
}

impl SkopeoPuller {
    /// Creates a puller running `program` with a per-call timeout.
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Builds a puller from the `[pull]` config section.
    pub fn from_config(config: &PullConfig) -> Self {
        Self::new(config.program.clone(), config.timeout())
    }

    /// `skopeo copy --quiet docker://<ns>/<name>:<tag> docker-archive:<dest>`
    pub fn command(&self, image: &ImageRef, dest: &Path) -> CommandSpec {
        CommandSpec::new(&self.program, self.timeout).args([
            "copy".to_owned(),
            "--quiet".to_owned(),
            image.to_string(),
            format!("docker-archive:{}", dest.display()),
        ])
    }
}

impl ImagePuller for SkopeoPuller {
    async fn pull(&self, image: &ImageRef, dest: &Path) -> Result<(), ArtifactError> {
        // docker-archive 대상은 기존 파일이 있으면 실패하므로 먼저 제거
        match tokio::fs::remove_file(dest).await {
            Ok(()) => debug!(dest = %dest.display(), "removed stale staging archive"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ArtifactError::staging(dest, e)),
        }

        let spec = self.command(image, dest);
        process::run_checked(&spec)
            .await
            .map_err(|source| ArtifactError::Pull {
                image: image.to_string(),
                source,
            })?;

        info!(image = %image, dest = %dest.display(), "image pulled");
        Ok(())
    }
}
