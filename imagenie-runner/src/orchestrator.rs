//! Pipeline orchestration.
//!
//! The [`Orchestrator`] drives one batch run:
//!
//! 1. Prepare the vulnerability database (retried; exhaustion aborts the run
//!    before any container is touched)
//! 2. Discover container names (errors truncate the listing, never abort)
//! 3. Process each container in a bounded worker pool. Every task runs
//!    pull → scan → decide → convert + upload (or skip) and always cleans up.
//!    A failing task is recorded and the batch continues.
//!
//! Cancellation (signal or run deadline) stops new tasks from launching;
//! running tasks stop at their next step boundary and still clean up.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use imagenie_artifact::{
    ArtifactError, DestinationKey, ImageConverter, ImagePuller, ImageRef, ObjectStore,
    SingularityConverter, SkopeoPuller, Store, TaskWorkspace, Uploader,
};
use imagenie_core::config::ImagenieConfig;
use imagenie_core::metrics as m;
use imagenie_core::process::{self, STDERR_TAIL_LEN};
use imagenie_core::retry::RetryPolicy;
use imagenie_registry::{Discovery, HubRegistryClient, RegistryClient};
use imagenie_scanner::{ScanAction, TrivyScanner, VulnDbPreparer, VulnScanner, decide};

use crate::error::RunError;
use crate::report::{ContainerReport, DiscoverySummary, RunReport};
use crate::run::PipelineRun;
use crate::task::{ContainerTask, Disposition, Step, TaskState, TransitionError};

/// External collaborators of a run, injected at construction.
pub struct Collaborators<R, P, S, C, O> {
    pub registry: Arc<R>,
    pub puller: Arc<P>,
    pub scanner: Arc<S>,
    pub converter: Arc<C>,
    pub store: Arc<O>,
}

/// Orchestrator wired to the real registry, Skopeo, Trivy, Singularity and storage.
pub type ProductionOrchestrator =
    Orchestrator<HubRegistryClient, SkopeoPuller, TrivyScanner, SingularityConverter, Store>;

/// Runs the batch pipeline over a set of collaborators.
pub struct Orchestrator<R, P, S, C, O>
where
    R: RegistryClient,
    P: ImagePuller,
    S: VulnScanner,
    C: ImageConverter,
    O: ObjectStore,
{
    config: ImagenieConfig,
    registry: Arc<R>,
    scanner: Arc<S>,
    worker: Arc<Worker<P, S, C, O>>,
}

impl ProductionOrchestrator {
    /// Builds the production collaborators from configuration.
    pub fn from_config(config: ImagenieConfig) -> Result<Self, RunError> {
        let registry = HubRegistryClient::from_config(&config.registry)
            .map_err(|e| RunError::Setup(format!("registry client: {e}")))?;
        let scanner = TrivyScanner::from_config(&config.scanner)
            .map_err(|e| RunError::Config(e.to_string()))?;
        let store = Store::from_config(&config.upload).map_err(|e| match e {
            ArtifactError::InvalidDestination { .. } => RunError::Config(e.to_string()),
            other => RunError::Setup(other.to_string()),
        })?;

        let collaborators = Collaborators {
            registry: Arc::new(registry),
            puller: Arc::new(SkopeoPuller::from_config(&config.pull)),
            scanner: Arc::new(scanner),
            converter: Arc::new(SingularityConverter::from_config(&config.convert)),
            store: Arc::new(store),
        };
        Self::new(config, collaborators)
    }
}

impl<R, P, S, C, O> Orchestrator<R, P, S, C, O>
where
    R: RegistryClient,
    P: ImagePuller,
    S: VulnScanner,
    C: ImageConverter,
    O: ObjectStore,
{
    /// Validates `config` and assembles the orchestrator.
    pub fn new(
        config: ImagenieConfig,
        collaborators: Collaborators<R, P, S, C, O>,
    ) -> Result<Self, RunError> {
        config.validate()?;

        let worker = Worker {
            namespace: config.registry.namespace.clone(),
            tag: config.registry.image_tag.clone(),
            staging_dir: PathBuf::from(&config.runner.staging_dir),
            extension: config.convert.extension.clone(),
            prefix: config.upload.prefix.clone(),
            pull_policy: config.pull.retry_policy(),
            puller: collaborators.puller,
            scanner: Arc::clone(&collaborators.scanner),
            converter: collaborators.converter,
            uploader: Uploader::new(
                collaborators.store,
                config.upload.retry_policy(),
                config.upload.timeout(),
            ),
        };

        Ok(Self {
            registry: collaborators.registry,
            scanner: collaborators.scanner,
            worker: Arc::new(worker),
            config,
        })
    }

    /// The effective configuration.
    pub fn config(&self) -> &ImagenieConfig {
        &self.config
    }

    /// Executes one run to completion or cancellation.
    ///
    /// Returns `Err` only for run-level failures: vulnerability database
    /// preparation exhausted, or cancellation before discovery finished.
    /// Container failures are reported in the [`RunReport`].
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport, RunError> {
        let started = Instant::now();
        let mut run = PipelineRun::new(
            self.config.registry.namespace.clone(),
            self.config.upload.destination.clone(),
            self.config.scanner.db_retry_policy(),
        );

        let token = cancel.child_token();
        let deadline = self
            .config
            .runner
            .run_timeout()
            .map(|limit| spawn_deadline(limit, token.clone()));

        let span = info_span!("run", run_id = %run.run_id());
        let result = self
            .execute(&mut run, &token, started)
            .instrument(span)
            .await;

        if let Some(handle) = deadline {
            handle.abort();
        }
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::RUN_DURATION_SECONDS).set(started.elapsed().as_secs_f64());
        result
    }

    async fn execute(
        &self,
        run: &mut PipelineRun,
        token: &CancellationToken,
        started: Instant,
    ) -> Result<RunReport, RunError> {
        info!(
            namespace = run.namespace(),
            destination = run.destination(),
            concurrency = self.config.runner.concurrency,
            "run started"
        );

        // 1. 취약점 DB 준비. 소진되면 어떤 컨테이너도 처리하지 않음
        let preparer = VulnDbPreparer::new(Arc::clone(&self.scanner), *run.db_policy());
        let db_prepare_attempts = tokio::select! {
            biased;
            () = token.cancelled() => {
                return Err(RunError::Cancelled(
                    "cancelled during vulnerability database preparation".to_owned(),
                ));
            }
            result = preparer.prepare() => result.map_err(|e| {
                error!(error = %e, "vulnerability database unavailable, aborting run");
                RunError::DbPreparation(e)
            })?,
        };

        // 2. 탐색
        let discovery =
            Discovery::new(Arc::clone(&self.registry)).with_max_pages(self.config.registry.max_pages);
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => {
                return Err(RunError::Cancelled("cancelled during discovery".to_owned()));
            }
            outcome = discovery.discover_detailed(run.namespace()) => outcome,
        };
        let pages_fetched = outcome.pages_fetched;
        let stopped = outcome.stopped.clone();
        let duplicates = run.set_containers(outcome.names);

        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::CONTAINERS_DISCOVERED).set(run.containers().len() as f64);
        info!(
            containers = run.containers().len(),
            pages = pages_fetched,
            duplicates,
            stopped = %stopped,
            "discovery finished"
        );

        // 3. 컨테이너 처리
        let containers = self.dispatch(run.containers(), token).await;

        let cancelled = token.is_cancelled();
        let report = RunReport {
            run_id: run.run_id().to_string(),
            namespace: run.namespace().to_owned(),
            destination: run.destination().to_owned(),
            db_prepare_attempts,
            discovery: DiscoverySummary::new(
                pages_fetched,
                run.containers().len(),
                duplicates,
                &stopped,
            ),
            totals: RunReport::tally(&containers),
            containers,
            cancelled,
            duration_secs: started.elapsed().as_secs_f64(),
        };

        info!(
            uploaded = report.totals.uploaded,
            skipped_critical = report.totals.skipped_critical,
            failed = report.totals.failed,
            not_attempted = report.totals.not_attempted,
            cancelled,
            "run finished"
        );
        Ok(report)
    }

    /// Runs every container through the worker pool, in listing order.
    async fn dispatch(&self, names: &[String], token: &CancellationToken) -> Vec<ContainerReport> {
        let semaphore = Arc::new(Semaphore::new(self.config.runner.concurrency));
        let mut tasks = JoinSet::new();
        let mut slots: Vec<Option<ContainerReport>> = vec![None; names.len()];
        let mut launched = vec![false; names.len()];

        for (index, name) in names.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                () = token.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let worker = Arc::clone(&self.worker);
            let token = token.clone();
            let name = name.clone();
            tasks.spawn(
                async move {
                    let _permit = permit;
                    (index, worker.process(name, token).await)
                }
                .in_current_span(),
            );
            launched[index] = true;
        }

        if token.is_cancelled() {
            let remaining = launched.iter().filter(|l| !**l).count();
            if remaining > 0 {
                warn!(remaining, "run cancelled, remaining containers will not be attempted");
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => error!(error = %e, "container worker terminated abnormally"),
            }
        }

        names
            .iter()
            .zip(slots)
            .zip(launched)
            .map(|((name, slot), launched)| match slot {
                Some(report) => report,
                None if launched => {
                    let disposition = Disposition::Failed {
                        step: Step::Internal,
                        reason: "worker terminated abnormally".to_owned(),
                    };
                    record_disposition(&disposition);
                    ContainerReport {
                        name: name.clone(),
                        disposition,
                        scan: None,
                        cleanup_error: None,
                        duration_secs: 0.0,
                    }
                }
                None => {
                    record_disposition(&Disposition::NotAttempted);
                    ContainerReport::not_attempted(name.clone())
                }
            })
            .collect()
    }
}

/// Per-container work shared by all spawned tasks.
struct Worker<P, S, C, O>
where
    O: ObjectStore,
{
    namespace: String,
    tag: String,
    staging_dir: PathBuf,
    extension: String,
    prefix: String,
    pull_policy: RetryPolicy,
    puller: Arc<P>,
    scanner: Arc<S>,
    converter: Arc<C>,
    uploader: Uploader<O>,
}

/// Step failure that ends a task.
struct StepFailure {
    step: Step,
    reason: String,
}

impl StepFailure {
    fn new(step: Step, reason: impl ToString) -> Self {
        Self {
            step,
            reason: reason.to_string(),
        }
    }
}

impl From<TransitionError> for StepFailure {
    fn from(err: TransitionError) -> Self {
        Self::new(Step::Internal, err)
    }
}

impl<P, S, C, O> Worker<P, S, C, O>
where
    P: ImagePuller,
    S: VulnScanner,
    C: ImageConverter,
    O: ObjectStore,
{
    async fn process(&self, name: String, cancel: CancellationToken) -> ContainerReport {
        let span = info_span!("task", container = %name);
        self.process_in_span(name, cancel).instrument(span).await
    }

    async fn process_in_span(&self, name: String, cancel: CancellationToken) -> ContainerReport {
        let started = Instant::now();

        let mut workspace =
            match TaskWorkspace::acquire(&self.staging_dir, &name, &self.extension).await {
                Ok(workspace) => workspace,
                Err(e) => {
                    error!(container = name.as_str(), step = "prepare", error = %e, "container task failed");
                    let disposition = Disposition::Failed {
                        step: Step::Prepare,
                        reason: e.to_string(),
                    };
                    record_disposition(&disposition);
                    return ContainerReport {
                        name,
                        disposition,
                        scan: None,
                        cleanup_error: None,
                        duration_secs: started.elapsed().as_secs_f64(),
                    };
                }
            };

        let mut task = ContainerTask::new(
            ImageRef::new(&self.namespace, &name, &self.tag),
            workspace.staging_path().to_owned(),
            workspace.artifact_path().to_owned(),
        );

        if let Err(failure) = self.execute(&mut task, &cancel).await {
            error!(
                container = name.as_str(),
                step = failure.step.as_str(),
                error = failure.reason.as_str(),
                "container task failed"
            );
            if let Err(e) = task.fail(failure.step, failure.reason) {
                error!(error = %e, "could not record task failure");
            }
        }

        // 결과와 무관하게 항상 정리
        let cleanup_error = match workspace.cleanup().await {
            Ok(()) => None,
            Err(e) => {
                warn!(container = name.as_str(), error = %e, "staging cleanup failed");
                Some(e.to_string())
            }
        };
        if let Err(e) = task.advance(TaskState::Cleaned) {
            error!(error = %e, "could not mark task cleaned");
        }

        let disposition = task.disposition();
        record_disposition(&disposition);
        info!(disposition = disposition.as_str(), "container task finished");

        ContainerReport {
            name,
            disposition,
            scan: task.scan_outcome().map(|outcome| outcome.class),
            cleanup_error,
            duration_secs: started.elapsed().as_secs_f64(),
        }
    }

    async fn execute(
        &self,
        task: &mut ContainerTask,
        cancel: &CancellationToken,
    ) -> Result<(), StepFailure> {
        let image = task.image().clone();
        let staging = task.staging_path().to_owned();
        let artifact = task.artifact_path().to_owned();

        checkpoint(cancel)?;
        timed(
            Step::Pull,
            self.pull_policy
                .run("pull", |_| self.puller.pull(&image, &staging)),
        )
        .await
        .map_err(|e| StepFailure::new(Step::Pull, e.last))?;
        task.advance(TaskState::Pulled)?;

        checkpoint(cancel)?;
        let outcome = timed(Step::Scan, self.scanner.scan(&staging)).await;
        let action = decide(&outcome);
        debug!(
            class = %outcome.class,
            critical_count = outcome.critical_count,
            action = %action,
            "scan classified"
        );
        let diagnostic = outcome.diagnostic.clone();
        task.record_scan(outcome)?;

        match action {
            ScanAction::Proceed => {}
            ScanAction::Skip => {
                info!("critical vulnerability found, skipping conversion and upload");
                task.advance(TaskState::Skipped)?;
                return Ok(());
            }
            ScanAction::ReportError => {
                return Err(StepFailure::new(Step::Scan, scan_failure_reason(&diagnostic)));
            }
        }

        checkpoint(cancel)?;
        timed(Step::Convert, self.converter.convert(&staging, &artifact))
            .await
            .map_err(|e| StepFailure::new(Step::Convert, e))?;
        task.advance(TaskState::Converted)?;

        checkpoint(cancel)?;
        let key = DestinationKey::new(&self.prefix, task.name(), &self.extension);
        let uri = timed(Step::Upload, self.uploader.upload(&key, &artifact))
            .await
            .map_err(|e| StepFailure::new(Step::Upload, e))?;
        task.record_upload(uri)?;
        Ok(())
    }
}

/// Keeps the end of the scanner output, where the error usually is.
fn scan_failure_reason(diagnostic: &str) -> String {
    let diagnostic = diagnostic.trim();
    if diagnostic.is_empty() {
        return "scanner did not complete".to_owned();
    }
    process::tail(diagnostic, STDERR_TAIL_LEN).to_owned()
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), StepFailure> {
    if cancel.is_cancelled() {
        return Err(StepFailure::new(Step::Cancelled, "run cancelled"));
    }
    Ok(())
}

async fn timed<F: Future>(step: Step, fut: F) -> F::Output {
    let started = Instant::now();
    let output = fut.await;
    metrics::histogram!(m::STEP_DURATION_SECONDS, m::LABEL_STEP => step.as_str())
        .record(started.elapsed().as_secs_f64());
    output
}

fn record_disposition(disposition: &Disposition) {
    metrics::counter!(m::TASKS_TOTAL, m::LABEL_DISPOSITION => disposition.as_str()).increment(1);
}

/// Cancels `token` once `limit` has elapsed, unless it is cancelled first.
fn spawn_deadline(limit: Duration, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(limit) => {
                warn!(limit_secs = limit.as_secs(), "run deadline reached, cancelling");
                token.cancel();
            }
            () = token.cancelled() => {}
        }
    })
}
