//! Wires the mocks into an `Orchestrator` over a temporary staging directory.

use std::path::Path;
use std::sync::Arc;

use imagenie_core::ImagenieConfig;
use imagenie_runner::{Collaborators, Disposition, Orchestrator, RunError, RunReport};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use super::mocks::{MockConverter, MockPuller, MockRegistry, MockScanner, MockStore};

pub type MockOrchestrator =
    Orchestrator<MockRegistry, MockPuller, MockScanner, MockConverter, MockStore>;

pub struct Harness {
    pub registry: Arc<MockRegistry>,
    pub puller: Arc<MockPuller>,
    pub scanner: Arc<MockScanner>,
    pub converter: Arc<MockConverter>,
    pub store: Arc<MockStore>,
    pub config: ImagenieConfig,
    staging: TempDir,
}

impl Harness {
    /// A harness whose registry lists `names` on a single page.
    pub fn with_names(names: &[&str]) -> Self {
        let harness = Self::empty();
        if !names.is_empty() {
            harness.registry.push_page(names);
        }
        harness
    }

    /// A harness with an empty registry listing.
    pub fn empty() -> Self {
        let staging = tempfile::tempdir().expect("create staging dir");
        let mut config = ImagenieConfig::default();
        config.registry.namespace = "ghtrecontainers".to_owned();
        config.runner.staging_dir = staging.path().display().to_string();
        config.upload.prefix = "containers".to_owned();

        Self {
            registry: Arc::new(MockRegistry::new()),
            puller: Arc::new(MockPuller::new()),
            scanner: Arc::new(MockScanner::new()),
            converter: Arc::new(MockConverter::new()),
            store: Arc::new(MockStore::new()),
            config,
            staging,
        }
    }

    pub fn orchestrator(&self) -> MockOrchestrator {
        Orchestrator::new(
            self.config.clone(),
            Collaborators {
                registry: Arc::clone(&self.registry),
                puller: Arc::clone(&self.puller),
                scanner: Arc::clone(&self.scanner),
                converter: Arc::clone(&self.converter),
                store: Arc::clone(&self.store),
            },
        )
        .expect("valid test configuration")
    }

    pub async fn run(&self) -> Result<RunReport, RunError> {
        self.run_with(CancellationToken::new()).await
    }

    pub async fn run_with(&self, token: CancellationToken) -> Result<RunReport, RunError> {
        self.orchestrator().run(token).await
    }

    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    /// Files left in the staging directory.
    pub fn residual_files(&self) -> Vec<String> {
        std::fs::read_dir(self.staging.path())
            .expect("read staging dir")
            .map(|entry| {
                entry
                    .expect("dir entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }
}

/// Disposition label per container, in report order.
pub fn dispositions(report: &RunReport) -> Vec<(String, &'static str)> {
    report
        .containers
        .iter()
        .map(|c| (c.name.clone(), c.disposition.as_str()))
        .collect()
}

/// Disposition of `name`, panicking if it is missing from the report.
pub fn disposition_of<'a>(report: &'a RunReport, name: &str) -> &'a Disposition {
    &report
        .container(name)
        .unwrap_or_else(|| panic!("{name} missing from report"))
        .disposition
}

pub fn owned(pairs: &[(&str, &'static str)]) -> Vec<(String, &'static str)> {
    pairs.iter().map(|(n, d)| ((*n).to_owned(), *d)).collect()
}
