//! # repo-migrate
//!
//! Bulk repository migrations into a GitHub organization, from Azure
//! DevOps or from GitHub Enterprise Server, driven through GitHub's
//! migration service.
//!
//! The migration service performs the actual data transfer. This crate
//! enumerates what must move, plans how to sequence the work, submits
//! migrations, polls each one to a terminal state and reports the
//! aggregate outcome, for potentially hundreds of independent
//! long-running remote jobs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use repo_migrate::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! // Enumerate a source organization and plan a fan-out/fan-in batch.
//! let source = GithubSource::new("ghp_source_token")?;
//! let inventory = source.enumerate("my-source-org").await?;
//!
//! let options = MigrationOptions {
//!     target_org: "my-target-org".into(),
//!     ..Default::default()
//! };
//! let plan = Planner::new(
//!     SourceDescriptor::Github { org: "my-source-org".into() },
//!     options,
//! )
//! .build(&inventory)?;
//!
//! // Either render the plan as an auditable script...
//! let script = ScriptRenderer::new(&plan, "0.1.0").render();
//!
//! // ...or execute it directly and inspect the aggregate outcome.
//! let api = GithubMigrationClient::new("ghp_target_token", "ghp_source_token");
//! let report = Supervisor::new(api).run(plan).await;
//! std::process::exit(report.result.exit_code());
//! # }
//! ```
//!
//! ## Plan shapes
//!
//! A batch runs in one of two shapes, chosen by the `sequential` flag:
//!
//! - **Sequential**: each repository is queued, waited on and (optionally)
//!   has its log downloaded before the next one starts. Total run time is
//!   the sum of the individual migrations.
//! - **Parallel**: every migration is queued first, then each is waited
//!   on in the same order. The remote service runs jobs concurrently, so
//!   total run time collapses toward the slowest single migration.
//!
//! Either way the batch runs to completion: a repository that fails to
//! queue, fails to migrate, times out or hits a transport error is
//! counted as failed in the summary and never aborts the others.

pub mod batch;
pub mod credentials;
pub mod error;
pub mod migration;
pub mod naming;
pub mod plan;
pub mod script;
pub mod sources;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::batch::BatchResult;
    pub use crate::error::{MigrateError, Result};
    pub use crate::migration::{
        GithubMigrationClient, MigrationApi, MigrationState, MigrationStatus, RunReport,
        StartMigrationRequest, Supervisor, WaitOptions,
    };
    pub use crate::naming::{ado_target_repo_name, sanitize_repo_name};
    pub use crate::plan::{
        ExecutionPlan, GhesOptions, JobState, MigrationJob, MigrationOptions, PlanMode, PlanUnit,
        Planner, SourceDescriptor, Step, StepKind,
    };
    pub use crate::script::{ScriptRenderer, render_summary};
    pub use crate::sources::{
        AdoClient, GithubSource, Inventory, RepoGroup, SourceRepo, Visibility,
    };
}

pub use prelude::*;
