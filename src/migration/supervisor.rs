//! Plan execution: submission, polling, aggregation.
//!
//! The supervisor owns every [`MigrationJob`] for the duration of one
//! run. Queue submissions may fan out concurrently (bounded, to respect
//! remote rate limits); waits poll each job to a terminal state in
//! enumeration order. Nothing in a single job's failure path stops the
//! batch: the contract is best-effort complete the whole batch, then
//! report.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::batch::BatchResult;
use crate::error::{MigrateError, Result};
use crate::migration::api::{MigrationApi, MigrationState, StartMigrationRequest};
use crate::plan::{
    ExecutionPlan, JobState, MigrationJob, MigrationOptions, PlanMode, SourceDescriptor, Step,
    StepKind,
};

/// Polling knobs for the wait phase.
///
/// The service publishes no timing contract beyond "poll until
/// terminal", so both values are caller-tunable rather than fixed.
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    /// Delay between consecutive status queries for one job.
    pub poll_interval: Duration,
    /// A job still not terminal after this long is treated as failed.
    pub max_wait: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(4 * 60 * 60),
        }
    }
}

/// Everything a finished run reports: the per-job terminal states and
/// the aggregate counts derived from them.
#[derive(Debug)]
pub struct RunReport {
    pub jobs: Vec<MigrationJob>,
    pub result: BatchResult,
}

/// Executes an [`ExecutionPlan`] against a migration service.
pub struct Supervisor<A> {
    api: Arc<A>,
    wait: WaitOptions,
    max_queue_concurrency: usize,
    shutdown: watch::Receiver<bool>,
    // Keeps the channel alive when no external shutdown is wired up.
    _shutdown_tx: Option<watch::Sender<bool>>,
}

impl<A: MigrationApi + 'static> Supervisor<A> {
    pub fn new(api: A) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            api: Arc::new(api),
            wait: WaitOptions::default(),
            max_queue_concurrency: 4,
            shutdown: rx,
            _shutdown_tx: Some(tx),
        }
    }

    pub fn wait_options(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Cap on concurrent queue submissions in parallel mode.
    pub fn max_queue_concurrency(mut self, limit: usize) -> Self {
        self.max_queue_concurrency = limit.max(1);
        self
    }

    /// Wire up an external cancellation signal. In-flight polls observe
    /// it within one polling interval.
    pub fn shutdown_signal(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self._shutdown_tx = None;
        self
    }

    fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once cancellation is signalled; pends forever otherwise.
    async fn cancelled(mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            if shutdown.changed().await.is_err() {
                // Sender gone: no signal can ever arrive.
                std::future::pending::<()>().await;
            }
        }
    }

    fn start_request(
        source: &SourceDescriptor,
        options: &MigrationOptions,
        job: &MigrationJob,
    ) -> StartMigrationRequest {
        StartMigrationRequest {
            source_repo_url: source.repo_url(&job.repo),
            target_org: options.target_org.clone(),
            target_repo: job.target_repo.clone(),
            visibility: job.repo.visibility,
            skip_releases: options.skip_releases,
            lock_source: options.lock_source_repo,
        }
    }

    /// Execute the plan to completion and aggregate the outcome.
    pub async fn run(self, plan: ExecutionPlan) -> RunReport {
        let ExecutionPlan {
            source,
            options,
            mode,
            mut jobs,
            steps,
            ..
        } = plan;

        match mode {
            PlanMode::Sequential => {
                self.run_sequential(&source, &options, &mut jobs, &steps).await;
            }
            PlanMode::Parallel => {
                self.run_parallel(&source, &options, &mut jobs, &steps).await;
            }
        }

        let mut result = BatchResult::default();
        for job in &mut jobs {
            // Anything not driven to a terminal state (cancellation,
            // queue rejection) is a failure in the summary.
            if !job.state.is_terminal() {
                job.state = JobState::Failed;
            }
            result.record(job.state);
        }

        RunReport { jobs, result }
    }

    async fn run_sequential(
        &self,
        source: &SourceDescriptor,
        options: &MigrationOptions,
        jobs: &mut [MigrationJob],
        steps: &[Step],
    ) {
        for step in steps {
            if self.is_cancelled() {
                warn!("Cancellation requested; skipping remaining steps");
                return;
            }
            match step.kind {
                StepKind::Queue => {
                    let request = Self::start_request(source, options, &jobs[step.job]);
                    Self::queue_job(&*self.api, &request, &mut jobs[step.job]).await;
                }
                StepKind::Wait => {
                    self.wait_job(&mut jobs[step.job]).await;
                }
                StepKind::DownloadLogs => {
                    self.report_log_url(&options.target_org, &jobs[step.job]).await;
                }
            }
        }
    }

    async fn run_parallel(
        &self,
        source: &SourceDescriptor,
        options: &MigrationOptions,
        jobs: &mut [MigrationJob],
        steps: &[Step],
    ) {
        let queue_jobs: Vec<usize> = steps
            .iter()
            .filter(|s| s.kind == StepKind::Queue)
            .map(|s| s.job)
            .collect();

        // Fan out submissions; they are independent and cheap, but the
        // remote API is rate limited, so cap the in-flight count.
        let outcomes: Vec<(usize, Option<Result<String>>)> = stream::iter(queue_jobs)
            .map(|index| {
                let api = Arc::clone(&self.api);
                let shutdown = self.shutdown.clone();
                let request = Self::start_request(source, options, &jobs[index]);
                async move {
                    if *shutdown.borrow() {
                        return (index, None);
                    }
                    (index, Some(api.start_migration(&request).await))
                }
            })
            .buffer_unordered(self.max_queue_concurrency)
            .collect()
            .await;

        for (index, outcome) in outcomes {
            let job = &mut jobs[index];
            match outcome {
                Some(Ok(id)) => Self::mark_queued(job, id),
                Some(Err(e)) => Self::mark_unqueued(job, &e),
                None => warn!(repo = %job.repo.name, "Skipped queuing due to cancellation"),
            }
        }

        for step in steps.iter().filter(|s| s.kind != StepKind::Queue) {
            if self.is_cancelled() {
                warn!("Cancellation requested; skipping remaining waits");
                return;
            }
            match step.kind {
                StepKind::Wait => self.wait_job(&mut jobs[step.job]).await,
                StepKind::DownloadLogs => {
                    self.report_log_url(&options.target_org, &jobs[step.job]).await;
                }
                StepKind::Queue => unreachable!("queue steps handled in the fan-out phase"),
            }
        }
    }

    async fn queue_job(api: &A, request: &StartMigrationRequest, job: &mut MigrationJob) {
        info!(repo = %job.repo.name, "Queuing migration");
        match api.start_migration(request).await {
            Ok(id) => Self::mark_queued(job, id),
            Err(e) => Self::mark_unqueued(job, &e),
        }
    }

    fn mark_queued(job: &mut MigrationJob, id: String) {
        // The "(ID: ...)" shape is load-bearing: generated scripts
        // capture the migration id from this line.
        info!("Migration queued for {} (ID: {})", job.target_repo, id);
        job.migration_id = Some(id);
        job.state = JobState::Queued;
        job.queued_at = Some(Instant::now());
    }

    fn mark_unqueued(job: &mut MigrationJob, error: &MigrateError) {
        warn!(
            repo = %job.repo.name,
            "Failed to queue migration, it will be counted as failed: {}", error
        );
        job.state = JobState::NotQueued;
    }

    /// Poll one job to a terminal state.
    ///
    /// A job that never got a migration id is a guarded no-op: it fails
    /// without blocking and without touching the network. Transport
    /// errors and timeouts fail this job only.
    async fn wait_job(&self, job: &mut MigrationJob) {
        let Some(migration_id) = job.migration_id.clone() else {
            warn!(repo = %job.repo.name, "Migration was never queued, counting as failed");
            job.state = JobState::Failed;
            return;
        };

        info!("Waiting for migration of {} (ID: {})", job.target_repo, migration_id);
        job.state = JobState::Polling;
        job.state = self.poll_to_terminal(&migration_id, &job.target_repo).await;
    }

    /// Poll a migration id until terminal, timeout or cancellation.
    async fn poll_to_terminal(&self, migration_id: &str, label: &str) -> JobState {
        let deadline = Instant::now() + self.wait.max_wait;

        loop {
            match self.api.get_migration_status(migration_id).await {
                Ok(status) => match status.state {
                    MigrationState::Succeeded => {
                        info!("Migration of {} succeeded (ID: {})", label, migration_id);
                        return JobState::Succeeded;
                    }
                    MigrationState::Failed => {
                        error!(
                            "Migration of {} failed (ID: {}): {}",
                            label,
                            migration_id,
                            status.failure_reason.as_deref().unwrap_or("unknown reason")
                        );
                        return JobState::Failed;
                    }
                    state => {
                        info!("Migration of {} is {} (ID: {})", label, state, migration_id);
                    }
                },
                Err(e) => {
                    error!(
                        "Failed to poll migration of {} (ID: {}): {}",
                        label, migration_id, e
                    );
                    return JobState::Failed;
                }
            }

            if Instant::now() >= deadline {
                error!(
                    "Migration of {} did not reach a terminal state within {:?}, counting as failed (ID: {})",
                    label, self.wait.max_wait, migration_id
                );
                return JobState::Failed;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.wait.poll_interval) => {}
                _ = Self::cancelled(self.shutdown.clone()) => {
                    warn!("Cancellation requested while waiting for {}", label);
                    return JobState::Failed;
                }
            }
        }
    }

    async fn report_log_url(&self, target_org: &str, job: &MigrationJob) {
        match self.api.get_migration_log_url(target_org, &job.target_repo).await {
            Ok(Some(url)) => info!("Migration log for {} available at {}", job.target_repo, url),
            Ok(None) => warn!("No migration log available for {}", job.target_repo),
            Err(e) => warn!("Could not fetch migration log for {}: {}", job.target_repo, e),
        }
    }

    /// Wait on a single migration id from an earlier queue-only run.
    /// Semantics match one wait step of a plan.
    pub async fn wait_for(&self, migration_id: &str) -> JobState {
        self.poll_to_terminal(migration_id, migration_id).await
    }
}
