//! Uploading artifacts to durable storage.
//!
//! - [`DestinationKey`]: `<prefix>/<name>.<ext>` object key
//! - [`ObjectStore`]: storage seam, implemented by [`GcsCliStore`] and [`LocalDirStore`]
//! - [`StorageLocation`]: parses the configured destination into a [`Store`]
//! - [`Uploader`]: per-attempt timeout and retry around any store

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use imagenie_core::config::UploadConfig;
use imagenie_core::process::{self, CommandSpec};
use imagenie_core::retry::RetryPolicy;
use tracing::{debug, info};

use crate::error::ArtifactError;

/// Object key under the destination: `<prefix>/<name>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationKey(String);

impl DestinationKey {
    /// Builds a key. Slashes around `prefix` are trimmed; an empty prefix
    /// yields `<name>.<ext>`.
    pub fn new(prefix: &str, name: &str, extension: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            Self(format!("{name}.{extension}"))
        } else {
            Self(format!("{prefix}/{name}.{extension}"))
        }
    }

    /// Key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable storage for artifacts.
pub trait ObjectStore: Send + Sync + 'static {
    /// Stores the file at `local` under `key`, replacing any existing object.
    fn put(
        &self,
        key: &DestinationKey,
        local: &Path,
    ) -> impl Future<Output = Result<(), ArtifactError>> + Send;

    /// Human-readable URI of `key` in this store.
    fn uri(&self, key: &DestinationKey) -> String;
}

/// Google Cloud Storage through the `gcloud` CLI.
#[derive(Debug, Clone)]
pub struct GcsCliStore {
    program: String,
    bucket: String,
    base: String,
    timeout: Duration,
}

impl GcsCliStore {
    /// Creates a store writing to `gs://<bucket>/<base>/<key>`.
    pub fn new(
        program: impl Into<String>,
        bucket: impl Into<String>,
        base: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            bucket: bucket.into(),
            base: base.into().trim_matches('/').to_owned(),
            timeout,
        }
    }

    /// `gcloud storage cp <local> gs://bucket/<base>/<key>`
    pub fn command(&self, key: &DestinationKey, local: &Path) -> CommandSpec {
        CommandSpec::new(&self.program, self.timeout).args([
            "storage".to_owned(),
            "cp".to_owned(),
            local.display().to_string(),
            self.uri(key),
        ])
    }
}

impl ObjectStore for GcsCliStore {
    async fn put(&self, key: &DestinationKey, local: &Path) -> Result<(), ArtifactError> {
        let spec = self.command(key, local);
        process::run_checked(&spec)
            .await
            .map(|_| ())
            .map_err(|e| ArtifactError::Upload {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn uri(&self, key: &DestinationKey) -> String {
        if self.base.is_empty() {
            format!("gs://{}/{}", self.bucket, key)
        } else {
            format!("gs://{}/{}/{}", self.bucket, self.base, key)
        }
    }
}

/// A local (or mounted) directory.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    /// Creates a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute path `key` maps to.
    pub fn path_for(&self, key: &DestinationKey) -> PathBuf {
        self.root.join(key.as_str())
    }
}

impl ObjectStore for LocalDirStore {
    async fn put(&self, key: &DestinationKey, local: &Path) -> Result<(), ArtifactError> {
        let upload_err = |e: std::io::Error| ArtifactError::Upload {
            key: key.to_string(),
            reason: e.to_string(),
        };

        let dest = self.path_for(key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(upload_err)?;
        }

        // 부분 복사본이 최종 경로에 남지 않도록 임시 파일에 쓰고 rename
        let partial = dest.with_extension("partial");
        if let Err(e) = tokio::fs::copy(local, &partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(upload_err(e));
        }
        tokio::fs::rename(&partial, &dest)
            .await
            .map_err(upload_err)?;
        Ok(())
    }

    fn uri(&self, key: &DestinationKey) -> String {
        format!("file://{}", self.path_for(key).display())
    }
}

/// Parsed upload destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// `gs://bucket[/base]`
    Gcs {
        /// Bucket name
        bucket: String,
        /// Path inside the bucket (may be empty)
        base: String,
    },
    /// `file:///dir` or a plain path
    LocalDir(PathBuf),
}

impl StorageLocation {
    /// Parses a destination string.
    pub fn parse(destination: &str) -> Result<Self, ArtifactError> {
        let invalid = |reason: &str| ArtifactError::InvalidDestination {
            destination: destination.to_owned(),
            reason: reason.to_owned(),
        };

        let destination = destination.trim();
        if destination.is_empty() {
            return Err(invalid("destination is empty"));
        }

        if let Some(rest) = destination.strip_prefix("gs://") {
            let (bucket, base) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                return Err(invalid("missing bucket name"));
            }
            let valid_char =
                |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.');
            if !bucket.chars().all(valid_char) {
                return Err(invalid("bucket name contains invalid characters"));
            }
            return Ok(Self::Gcs {
                bucket: bucket.to_owned(),
                base: base.trim_matches('/').to_owned(),
            });
        }

        if let Some(path) = destination.strip_prefix("file://") {
            if !path.starts_with('/') {
                return Err(invalid("file:// destination must be an absolute path"));
            }
            return Ok(Self::LocalDir(PathBuf::from(path)));
        }

        if destination.contains("://") {
            return Err(invalid("unsupported scheme (expected gs:// or file://)"));
        }
        Ok(Self::LocalDir(PathBuf::from(destination)))
    }

    /// Builds the store for this location.
    pub fn into_store(self, config: &UploadConfig) -> Store {
        match self {
            Self::Gcs { bucket, base } => Store::Gcs(GcsCliStore::new(
                config.program.clone(),
                bucket,
                base,
                config.timeout(),
            )),
            Self::LocalDir(root) => Store::Local(LocalDirStore::new(root)),
        }
    }
}

/// Any supported store, selected at runtime from the destination.
#[derive(Debug, Clone)]
pub enum Store {
    /// Google Cloud Storage
    Gcs(GcsCliStore),
    /// Local directory
    Local(LocalDirStore),
}

impl Store {
    /// Parses `config.destination` and builds the matching store.
    pub fn from_config(config: &UploadConfig) -> Result<Self, ArtifactError> {
        Ok(StorageLocation::parse(&config.destination)?.into_store(config))
    }
}

impl ObjectStore for Store {
    async fn put(&self, key: &DestinationKey, local: &Path) -> Result<(), ArtifactError> {
        match self {
            Self::Gcs(store) => store.put(key, local).await,
            Self::Local(store) => store.put(key, local).await,
        }
    }

    fn uri(&self, key: &DestinationKey) -> String {
        match self {
            Self::Gcs(store) => store.uri(key),
            Self::Local(store) => store.uri(key),
        }
    }
}

/// Uploads artifacts through an [`ObjectStore`] with timeout and retry.
pub struct Uploader<S: ObjectStore> {
    store: Arc<S>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl<S: ObjectStore> Uploader<S> {
    /// Creates an uploader.
    pub fn new(store: Arc<S>, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            store,
            policy,
            timeout,
        }
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Uploads `local` under `key`. Returns the destination URI.
    pub async fn upload(&self, key: &DestinationKey, local: &Path) -> Result<String, ArtifactError> {
        let uri = self.store.uri(key);
        debug!(key = %key, local = %local.display(), "uploading artifact");

        self.policy
            .run("upload", |attempt| async move {
                match tokio::time::timeout(self.timeout, self.store.put(key, local)).await {
                    Ok(result) => result,
                    Err(_elapsed) => Err(ArtifactError::Upload {
                        key: key.to_string(),
                        reason: format!(
                            "attempt {attempt} timed out after {}s",
                            self.timeout.as_secs()
                        ),
                    }),
                }
            })
            .await
            .map_err(|e| e.last)?;

        info!(uri = uri.as_str(), "artifact uploaded");
        Ok(uri)
    }
}
