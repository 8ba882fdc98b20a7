//! Run report: one line per container plus discovery and totals.

use std::io::Write;

use imagenie_core::types::SeverityClass;
use imagenie_registry::StopReason;
use serde::Serialize;

use crate::output::Render;
use crate::task::{Disposition, Step};

/// How discovery ended.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoverySummary {
    /// Listing pages fetched successfully
    pub pages_fetched: u32,
    /// Containers after duplicate removal
    pub containers: usize,
    /// Duplicate names dropped
    pub duplicates: usize,
    /// Why pagination stopped
    pub stopped: String,
    /// True if the listing may be incomplete
    pub truncated: bool,
}

impl DiscoverySummary {
    pub fn new(pages_fetched: u32, containers: usize, duplicates: usize, stopped: &StopReason) -> Self {
        Self {
            pages_fetched,
            containers,
            duplicates,
            stopped: stopped.to_string(),
            truncated: stopped.is_truncated(),
        }
    }
}

/// Outcome of one container.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerReport {
    pub name: String,
    #[serde(flatten)]
    pub disposition: Disposition,
    /// Scan classification, if the image was scanned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan: Option<SeverityClass>,
    /// Cleanup failure, if local files could not be removed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_error: Option<String>,
    pub duration_secs: f64,
}

impl ContainerReport {
    /// Report for a container that was never started.
    pub fn not_attempted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            disposition: Disposition::NotAttempted,
            scan: None,
            cleanup_error: None,
            duration_secs: 0.0,
        }
    }

    fn detail(&self) -> String {
        match &self.disposition {
            Disposition::Uploaded { destination } => destination.clone(),
            Disposition::SkippedCritical => "critical vulnerability".to_owned(),
            Disposition::Failed { step, reason } => format!("{step}: {reason}"),
            Disposition::NotAttempted => String::new(),
        }
    }
}

/// Count of containers per disposition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub uploaded: usize,
    pub skipped_critical: usize,
    pub failed: usize,
    pub not_attempted: usize,
}

/// Result of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub namespace: String,
    pub destination: String,
    /// Attempts used to prepare the vulnerability database
    pub db_prepare_attempts: u32,
    pub discovery: DiscoverySummary,
    pub containers: Vec<ContainerReport>,
    pub totals: Totals,
    /// True if a signal or the run deadline cancelled the run
    pub cancelled: bool,
    pub duration_secs: f64,
}

impl RunReport {
    /// Recomputes [`Totals`] from the container list.
    pub fn tally(containers: &[ContainerReport]) -> Totals {
        let mut totals = Totals::default();
        for c in containers {
            match c.disposition {
                Disposition::Uploaded { .. } => totals.uploaded += 1,
                Disposition::SkippedCritical => totals.skipped_critical += 1,
                Disposition::Failed { .. } => totals.failed += 1,
                Disposition::NotAttempted => totals.not_attempted += 1,
            }
        }
        totals
    }

    /// Looks up a container by name.
    pub fn container(&self, name: &str) -> Option<&ContainerReport> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// True if cancellation left some container unfinished.
    pub fn interrupted(&self) -> bool {
        self.cancelled
            && self.containers.iter().any(|c| {
                matches!(
                    c.disposition,
                    Disposition::NotAttempted
                        | Disposition::Failed {
                            step: Step::Cancelled,
                            ..
                        }
                )
            })
    }

    /// Process exit code: 4 if interrupted by cancellation, else 0.
    ///
    /// Failed and skipped containers do not affect the exit code.
    pub fn exit_code(&self) -> u8 {
        if self.interrupted() { 4 } else { 0 }
    }
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "run {}  namespace={}  destination={}",
            self.run_id, self.namespace, self.destination
        )?;
        writeln!(
            w,
            "discovery: {} container(s), {} page(s), stopped: {}{}",
            self.discovery.containers,
            self.discovery.pages_fetched,
            self.discovery.stopped,
            if self.discovery.truncated {
                " (listing may be incomplete)"
            } else {
                ""
            }
        )?;
        writeln!(w)?;

        let width = self
            .containers
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0)
            .max("CONTAINER".len());
        writeln!(w, "{:<width$}  {:<16}  DETAIL", "CONTAINER", "DISPOSITION")?;
        for c in &self.containers {
            writeln!(
                w,
                "{:<width$}  {:<16}  {}",
                c.name,
                c.disposition.as_str(),
                c.detail()
            )?;
        }

        writeln!(w)?;
        writeln!(
            w,
            "{} uploaded, {} skipped_critical, {} failed, {} not_attempted in {:.1}s{}",
            self.totals.uploaded,
            self.totals.skipped_critical,
            self.totals.failed,
            self.totals.not_attempted,
            self.duration_secs,
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}

/// Result of `--validate`.
#[derive(Debug, Serialize)]
pub struct ConfigCheck<'a> {
    /// File read, or `None` when built-in defaults were used
    pub config_path: Option<String>,
    pub valid: bool,
    pub effective: &'a imagenie_core::ImagenieConfig,
}

impl Render for ConfigCheck<'_> {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let source = self.config_path.as_deref().unwrap_or("built-in defaults");
        writeln!(w, "configuration OK ({source})")?;
        writeln!(w, "  namespace:   {}", self.effective.registry.namespace)?;
        writeln!(w, "  destination: {}", self.effective.upload.destination)?;
        writeln!(w, "  staging dir: {}", self.effective.runner.staging_dir)?;
        writeln!(w, "  concurrency: {}", self.effective.runner.concurrency)
    }
}
