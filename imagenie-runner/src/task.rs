//! Per-container task state machine.
//!
//! ```text
//! Discovered → Pulled → Scanned → Skipped ─────────────┐
//!                               └→ Converted → Uploaded ┴→ Cleaned
//!     (any non-terminal state) → Failed → Cleaned
//! ```
//!
//! [`ContainerTask::advance`] rejects every transition not drawn above.

use std::fmt;
use std::path::{Path, PathBuf};

use imagenie_artifact::ImageRef;
use imagenie_core::types::ScanOutcome;
use serde::Serialize;

/// Lifecycle state of one container task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Listed by discovery, nothing done yet.
    Discovered,
    /// Image archive is in the staging path.
    Pulled,
    /// Scan finished with a classifiable outcome.
    Scanned,
    /// Critical finding; not converted.
    Skipped,
    /// Artifact built.
    Converted,
    /// Artifact stored at the destination.
    Uploaded,
    /// A step failed.
    Failed,
    /// Local files removed. Terminal.
    Cleaned,
}

impl TaskState {
    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Discovered, Pulled)
                | (Pulled, Scanned)
                | (Scanned, Skipped)
                | (Scanned, Converted)
                | (Converted, Uploaded)
                | (Skipped, Cleaned)
                | (Uploaded, Cleaned)
                | (Failed, Cleaned)
                | (Discovered | Pulled | Scanned | Converted, Failed)
        )
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Pulled => "pulled",
            Self::Scanned => "scanned",
            Self::Skipped => "skipped",
            Self::Converted => "converted",
            Self::Uploaded => "uploaded",
            Self::Failed => "failed",
            Self::Cleaned => "cleaned",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Name validation and staging directory setup.
    Prepare,
    /// Image pull.
    Pull,
    /// Vulnerability scan.
    Scan,
    /// Archive conversion.
    Convert,
    /// Artifact upload.
    Upload,
    /// The run was cancelled before the task finished.
    Cancelled,
    /// The worker itself failed (panic, invalid transition).
    Internal,
}

impl Step {
    /// Lowercase name, used as a metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Pull => "pull",
            Self::Scan => "scan",
            Self::Convert => "convert",
            Self::Upload => "upload",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of a container within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum Disposition {
    /// Converted and stored.
    Uploaded {
        /// Destination URI
        destination: String,
    },
    /// Critical vulnerability found; nothing stored.
    SkippedCritical,
    /// A step failed.
    Failed {
        /// Step that failed
        step: Step,
        /// Cause
        reason: String,
    },
    /// Never started (run aborted or cancelled first).
    NotAttempted,
}

impl Disposition {
    /// Label used in reports and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded { .. } => "uploaded",
            Self::SkippedCritical => "skipped_critical",
            Self::Failed { .. } => "failed",
            Self::NotAttempted => "not_attempted",
        }
    }
}

/// Rejected state transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition for '{container}': {from} -> {to}")]
pub struct TransitionError {
    /// Container name
    pub container: String,
    /// Current state
    pub from: TaskState,
    /// Requested state
    pub to: TaskState,
}

/// One container's progress through the pipeline. Owned by a single worker.
#[derive(Debug)]
pub struct ContainerTask {
    name: String,
    image: ImageRef,
    staging_path: PathBuf,
    artifact_path: PathBuf,
    state: TaskState,
    scan: Option<ScanOutcome>,
    destination: Option<String>,
    failure: Option<(Step, String)>,
}

impl ContainerTask {
    /// Creates a task in [`TaskState::Discovered`].
    pub fn new(image: ImageRef, staging_path: PathBuf, artifact_path: PathBuf) -> Self {
        Self {
            name: image.name.clone(),
            image,
            staging_path,
            artifact_path,
            state: TaskState::Discovered,
            scan: None,
            destination: None,
            failure: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Most recent scan outcome, if the task was scanned.
    pub fn scan_outcome(&self) -> Option<&ScanOutcome> {
        self.scan.as_ref()
    }

    /// Moves to `next`, or returns an error leaving the state unchanged.
    pub fn advance(&mut self, next: TaskState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                container: self.name.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Records the scan outcome and moves to [`TaskState::Scanned`].
    pub fn record_scan(&mut self, outcome: ScanOutcome) -> Result<(), TransitionError> {
        self.advance(TaskState::Scanned)?;
        self.scan = Some(outcome);
        Ok(())
    }

    /// Moves to [`TaskState::Uploaded`].
    ///
    /// Refused unless the recorded scan passed the critical gate.
    pub fn record_upload(&mut self, destination: String) -> Result<(), TransitionError> {
        let passed = self
            .scan
            .as_ref()
            .is_some_and(|outcome| outcome.class.passes_gate());
        if !passed {
            return Err(TransitionError {
                container: self.name.clone(),
                from: self.state,
                to: TaskState::Uploaded,
            });
        }
        self.advance(TaskState::Uploaded)?;
        self.destination = Some(destination);
        Ok(())
    }

    /// Moves to [`TaskState::Failed`], attributing the failure to `step`.
    pub fn fail(&mut self, step: Step, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.advance(TaskState::Failed)?;
        self.failure = Some((step, reason.into()));
        Ok(())
    }

    /// Disposition implied by the states visited so far.
    pub fn disposition(&self) -> Disposition {
        if let Some((step, reason)) = &self.failure {
            return Disposition::Failed {
                step: *step,
                reason: reason.clone(),
            };
        }
        if let Some(destination) = &self.destination {
            return Disposition::Uploaded {
                destination: destination.clone(),
            };
        }
        match self.state {
            TaskState::Skipped | TaskState::Cleaned => Disposition::SkippedCritical,
            _ => Disposition::NotAttempted,
        }
    }
}
