//! In-memory collaborators.
//!
//! Each mock records the calls it receives and can be told to fail for
//! specific container names.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use imagenie_artifact::{
    ArtifactError, DestinationKey, ImageConverter, ImagePuller, ImageRef, ObjectStore,
};
use imagenie_core::config::ScannerConfig;
use imagenie_core::error::ProcessError;
use imagenie_core::types::ScanOutcome;
use imagenie_registry::{RegistryClient, RegistryError, RegistryPage};
use imagenie_scanner::{ScannerError, VulnScanner};
use tokio_util::sync::CancellationToken;

fn name_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn failed_process(program: &str, stderr: &str) -> ProcessError {
    ProcessError::NonZeroExit {
        program: program.to_owned(),
        status: "status 1".to_owned(),
        stderr: stderr.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// One scripted listing page.
#[derive(Debug, Clone)]
pub enum ScriptedPage {
    Names(Vec<String>),
    Status(u16),
}

/// Serves scripted pages; any page past the script is empty.
pub struct MockRegistry {
    pages: Mutex<Vec<ScriptedPage>>,
    pub calls: AtomicU32,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn push_page(&self, names: &[&str]) {
        self.pages.lock().unwrap().push(ScriptedPage::Names(
            names.iter().map(|n| (*n).to_owned()).collect(),
        ));
    }

    pub fn push_status(&self, status: u16) {
        self.pages.lock().unwrap().push(ScriptedPage::Status(status));
    }
}

impl RegistryClient for MockRegistry {
    async fn fetch_page(&self, _namespace: &str, page: u32) -> Result<RegistryPage, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .pages
            .lock()
            .unwrap()
            .get(page as usize - 1)
            .cloned();
        match scripted {
            Some(ScriptedPage::Names(names)) => Ok(RegistryPage {
                names,
                has_next: true,
            }),
            Some(ScriptedPage::Status(status)) => Err(RegistryError::Status { status, page }),
            None => Ok(RegistryPage::default()),
        }
    }
}

// ---------------------------------------------------------------------------
// Puller
// ---------------------------------------------------------------------------

/// Writes a fake archive into the staging path.
pub struct MockPuller {
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    delay: Mutex<Duration>,
    pub pulls: Mutex<Vec<String>>,
}

impl MockPuller {
    pub fn new() -> Self {
        Self {
            failing: Mutex::new(HashSet::new()),
            panicking: Mutex::new(HashSet::new()),
            delay: Mutex::new(Duration::ZERO),
            pulls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_for(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_owned());
    }

    /// The pull writes the archive, then panics.
    pub fn panic_for(&self, name: &str) {
        self.panicking.lock().unwrap().insert(name.to_owned());
    }

    /// Makes every pull take `delay` (virtual time under `start_paused`).
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn pulled(&self) -> Vec<String> {
        self.pulls.lock().unwrap().clone()
    }
}

impl ImagePuller for MockPuller {
    async fn pull(&self, image: &ImageRef, dest: &Path) -> Result<(), ArtifactError> {
        self.pulls.lock().unwrap().push(image.name.clone());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(&image.name) {
            return Err(ArtifactError::Pull {
                image: image.to_string(),
                source: failed_process("skopeo", "manifest unknown"),
            });
        }
        std::fs::write(dest, format!("archive of {}", image.name)).map_err(|e| {
            ArtifactError::Staging {
                path: dest.display().to_string(),
                source: e,
            }
        })?;

        let panics = self.panicking.lock().unwrap().contains(&image.name);
        if panics {
            panic!("puller crashed on {}", image.name);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Classifies archives by container name.
pub struct MockScanner {
    db_failures: AtomicU32,
    pub db_calls: AtomicU32,
    critical: Mutex<HashSet<String>>,
    non_critical: Mutex<HashSet<String>>,
    broken: Mutex<HashSet<String>>,
    cancel_on: Mutex<Option<(String, CancellationToken)>>,
    pub scans: Mutex<Vec<String>>,
}

impl MockScanner {
    pub fn new() -> Self {
        Self {
            db_failures: AtomicU32::new(0),
            db_calls: AtomicU32::new(0),
            critical: Mutex::new(HashSet::new()),
            non_critical: Mutex::new(HashSet::new()),
            broken: Mutex::new(HashSet::new()),
            cancel_on: Mutex::new(None),
            scans: Mutex::new(Vec::new()),
        }
    }

    /// The first `n` database preparation calls fail.
    pub fn fail_db_times(&self, n: u32) {
        self.db_failures.store(n, Ordering::SeqCst);
    }

    pub fn mark_critical(&self, name: &str) {
        self.critical.lock().unwrap().insert(name.to_owned());
    }

    pub fn mark_non_critical(&self, name: &str) {
        self.non_critical.lock().unwrap().insert(name.to_owned());
    }

    /// Scanning `name` yields a scan error (as if trivy timed out).
    pub fn mark_broken(&self, name: &str) {
        self.broken.lock().unwrap().insert(name.to_owned());
    }

    /// Cancels `token` while scanning `name`.
    pub fn cancel_while_scanning(&self, name: &str, token: CancellationToken) {
        *self.cancel_on.lock().unwrap() = Some((name.to_owned(), token));
    }

    pub fn scanned(&self) -> Vec<String> {
        self.scans.lock().unwrap().clone()
    }
}

impl VulnScanner for MockScanner {
    async fn prepare_db(&self) -> Result<(), ScannerError> {
        let call = self.db_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.db_failures.load(Ordering::SeqCst) {
            return Err(ScannerError::DbDownload(failed_process(
                "trivy",
                "TOO_MANY_REQUESTS",
            )));
        }
        Ok(())
    }

    async fn scan(&self, archive: &Path) -> ScanOutcome {
        let name = name_of(archive);
        self.scans.lock().unwrap().push(name.clone());

        if let Some((target, token)) = self.cancel_on.lock().unwrap().as_ref() {
            if *target == name {
                token.cancel();
            }
        }

        if !archive.exists() {
            return ScanOutcome::scan_error(format!("{} not found", archive.display()));
        }

        let rules = ScannerConfig::default().classification_rules();
        if self.broken.lock().unwrap().contains(&name) {
            ScanOutcome::scan_error("'trivy' timed out after 1800s")
        } else if self.critical.lock().unwrap().contains(&name) {
            ScanOutcome::classify(
                Some(0),
                r#"{"Results": [{"Vulnerabilities": [{"Severity": "CRITICAL"}]}]}"#,
                &rules,
            )
        } else if self.non_critical.lock().unwrap().contains(&name) {
            ScanOutcome::classify(
                Some(0),
                r#"{"Results": [{"Vulnerabilities": [{"Severity": "HIGH"}]}]}"#,
                &rules,
            )
        } else {
            ScanOutcome::classify(Some(0), r#"{"Results": []}"#, &rules)
        }
    }
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Writes a fake SIF next to the staging archive.
pub struct MockConverter {
    failing: Mutex<HashSet<String>>,
    pub converts: Mutex<Vec<String>>,
}

impl MockConverter {
    pub fn new() -> Self {
        Self {
            failing: Mutex::new(HashSet::new()),
            converts: Mutex::new(Vec::new()),
        }
    }

    /// Conversion of `name` writes a partial artifact and then fails.
    pub fn fail_for(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_owned());
    }

    pub fn converted(&self) -> Vec<String> {
        self.converts.lock().unwrap().clone()
    }
}

impl ImageConverter for MockConverter {
    async fn convert(&self, staging: &Path, artifact: &Path) -> Result<(), ArtifactError> {
        let name = name_of(staging);
        self.converts.lock().unwrap().push(name.clone());

        let write = |contents: String| {
            std::fs::write(artifact, contents).map_err(|e| ArtifactError::Staging {
                path: artifact.display().to_string(),
                source: e,
            })
        };

        if self.failing.lock().unwrap().contains(&name) {
            write("partial".to_owned())?;
            return Err(ArtifactError::Convert {
                path: staging.display().to_string(),
                source: failed_process("singularity", "FATAL: no space left on device"),
            });
        }
        write(format!("SIF from {name}"))
    }
}

// ---------------------------------------------------------------------------
// Object store
// ---------------------------------------------------------------------------

/// Keeps uploaded objects in memory.
pub struct MockStore {
    failing: Mutex<HashSet<String>>,
    pub puts: AtomicU32,
    pub objects: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            failing: Mutex::new(HashSet::new()),
            puts: AtomicU32::new(0),
            objects: Mutex::new(Vec::new()),
        }
    }

    /// Uploads under `key` fail.
    pub fn fail_for_key(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_owned());
    }

    pub fn put_calls(&self) -> u32 {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

impl ObjectStore for MockStore {
    async fn put(&self, key: &DestinationKey, local: &Path) -> Result<(), ArtifactError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(key.as_str()) {
            return Err(ArtifactError::Upload {
                key: key.to_string(),
                reason: "403 Forbidden".to_owned(),
            });
        }
        let bytes = std::fs::read(local).map_err(|e| ArtifactError::Upload {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.objects
            .lock()
            .unwrap()
            .push((key.as_str().to_owned(), bytes));
        Ok(())
    }

    fn uri(&self, key: &DestinationKey) -> String {
        format!("mem://{key}")
    }
}
