//! Execution plan model.
//!
//! A plan is the in-memory description of one migration batch: the jobs
//! to run, in enumeration order, and the ordered steps that drive them.
//! The same plan backs both execution paths (rendered to a script for
//! external execution, or handed to the supervisor and run directly),
//! so the two stay observably identical.

mod builder;

pub use builder::Planner;

use std::time::Instant;

use crate::sources::SourceRepo;

/// Where repositories are migrated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    Github { org: String },
    AzureDevOps {
        org: String,
        /// Set when migrating from an on-premises ADO Server; the
        /// organization then names a collection on that server.
        server_url: Option<String>,
    },
}

impl SourceDescriptor {
    pub fn org(&self) -> &str {
        match self {
            SourceDescriptor::Github { org } => org,
            SourceDescriptor::AzureDevOps { org, .. } => org,
        }
    }

    /// Browsable URL of a source repository, used as the migration
    /// service's source reference.
    pub fn repo_url(&self, repo: &SourceRepo) -> String {
        match self {
            SourceDescriptor::Github { org } => {
                format!("https://github.com/{}/{}", org, repo.name)
            }
            SourceDescriptor::AzureDevOps { org, server_url } => {
                let server = server_url.as_deref().unwrap_or("https://dev.azure.com");
                let project = repo.team_project.as_deref().unwrap_or_default();
                format!("{}/{}/{}/_git/{}", server, org, project, repo.name)
            }
        }
    }
}

/// GHES blob-storage options for the archive upload leg.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GhesOptions {
    pub api_url: String,
    pub aws_bucket_name: Option<String>,
    pub aws_region: Option<String>,
    pub no_ssl_verify: bool,
    pub keep_archive: bool,
}

impl GhesOptions {
    /// AWS S3 is the blob store when any AWS option is set; Azure Blob
    /// Storage otherwise.
    pub fn uses_aws(&self) -> bool {
        self.aws_bucket_name.is_some() || self.aws_region.is_some()
    }
}

/// Options applied to every migration in a batch.
#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    pub target_org: String,
    pub ghes: Option<GhesOptions>,
    pub skip_releases: bool,
    pub lock_source_repo: bool,
    pub download_migration_logs: bool,
    pub sequential: bool,
    pub verbose: bool,
}

/// Lifecycle of a single tracked migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    NotQueued,
    Queued,
    Polling,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// One repository's migration, tracked from submission to terminal state.
#[derive(Debug, Clone)]
pub struct MigrationJob {
    pub repo: SourceRepo,
    pub target_repo: String,
    /// Opaque identifier handed back by the migration service on queue.
    pub migration_id: Option<String>,
    pub state: JobState,
    pub queued_at: Option<Instant>,
}

impl MigrationJob {
    pub fn new(repo: SourceRepo, target_repo: String) -> Self {
        Self {
            repo,
            target_repo,
            migration_id: None,
            state: JobState::NotQueued,
            queued_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Queue,
    Wait,
    DownloadLogs,
}

/// One unit of work; `job` indexes into the plan's job table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub kind: StepKind,
    pub job: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    /// Queue, wait and download each repository before the next one.
    Sequential,
    /// Queue everything, then wait on everything in the same order.
    Parallel,
}

/// One organizational unit in the plan, with the indexes of its jobs.
/// Units with no jobs are kept so the renderer can call them out.
#[derive(Debug, Clone)]
pub struct PlanUnit {
    pub name: Option<String>,
    pub jobs: Vec<usize>,
}

/// An ordered, executable description of a migration batch.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub source: SourceDescriptor,
    pub options: MigrationOptions,
    pub mode: PlanMode,
    pub units: Vec<PlanUnit>,
    pub jobs: Vec<MigrationJob>,
    pub steps: Vec<Step>,
}

impl ExecutionPlan {
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}
