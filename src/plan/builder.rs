//! Execution planning.

use crate::error::{MigrateError, Result};
use crate::naming;
use crate::plan::{
    ExecutionPlan, MigrationJob, MigrationOptions, PlanMode, PlanUnit, SourceDescriptor, Step,
    StepKind,
};
use crate::sources::{Inventory, SourceRepo};

/// Builds an [`ExecutionPlan`] from an enumerated inventory.
///
/// The planner never talks to the network; it only decides ordering.
pub struct Planner {
    source: SourceDescriptor,
    options: MigrationOptions,
}

impl Planner {
    pub fn new(source: SourceDescriptor, options: MigrationOptions) -> Self {
        Self { source, options }
    }

    fn target_repo_name(&self, repo: &SourceRepo) -> String {
        match &repo.team_project {
            Some(project) => naming::ado_target_repo_name(project, &repo.name),
            None => repo.name.clone(),
        }
    }

    /// Build the plan. An inventory with no repositories at all aborts
    /// planning; the caller gets an error instead of a vacuous artifact.
    pub fn build(self, inventory: &Inventory) -> Result<ExecutionPlan> {
        if inventory.is_empty() {
            return Err(MigrateError::NoMigratableRepos);
        }

        let mut jobs = Vec::with_capacity(inventory.repo_count());
        let mut units = Vec::with_capacity(inventory.groups.len());

        for group in &inventory.groups {
            let mut unit_jobs = Vec::with_capacity(group.repos.len());
            for repo in &group.repos {
                let target = self.target_repo_name(repo);
                unit_jobs.push(jobs.len());
                jobs.push(MigrationJob::new(repo.clone(), target));
            }
            units.push(PlanUnit {
                name: group.unit.clone(),
                jobs: unit_jobs,
            });
        }

        let mode = if self.options.sequential {
            PlanMode::Sequential
        } else {
            PlanMode::Parallel
        };

        let steps = match mode {
            PlanMode::Sequential => Self::sequential_steps(&jobs, &self.options),
            PlanMode::Parallel => Self::parallel_steps(&jobs, &self.options),
        };

        Ok(ExecutionPlan {
            source: self.source,
            options: self.options,
            mode,
            units,
            jobs,
            steps,
        })
    }

    /// Queue, wait, then optionally download logs for each repository
    /// before moving to the next one.
    fn sequential_steps(jobs: &[MigrationJob], options: &MigrationOptions) -> Vec<Step> {
        let mut steps = Vec::new();
        for job in 0..jobs.len() {
            steps.push(Step { kind: StepKind::Queue, job });
            steps.push(Step { kind: StepKind::Wait, job });
            if options.download_migration_logs {
                steps.push(Step { kind: StepKind::DownloadLogs, job });
            }
        }
        steps
    }

    /// Fan-out/fan-in: every queue step precedes every wait step, both
    /// phases in enumeration order. Submission is cheap and the remote
    /// service runs jobs concurrently, so total run time collapses
    /// toward the slowest single job instead of the sum.
    fn parallel_steps(jobs: &[MigrationJob], options: &MigrationOptions) -> Vec<Step> {
        let mut steps = Vec::new();
        for job in 0..jobs.len() {
            steps.push(Step { kind: StepKind::Queue, job });
        }
        for job in 0..jobs.len() {
            steps.push(Step { kind: StepKind::Wait, job });
            if options.download_migration_logs {
                steps.push(Step { kind: StepKind::DownloadLogs, job });
            }
        }
        steps
    }
}
