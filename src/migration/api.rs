//! The migration service API boundary.

use async_trait::async_trait;

use crate::error::Result;
use crate::sources::Visibility;

/// Remote migration state as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Queued,
    InProgress,
    Succeeded,
    Failed,
}

impl MigrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MigrationState::Succeeded | MigrationState::Failed)
    }
}

impl std::fmt::Display for MigrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MigrationState::Queued => "QUEUED",
            MigrationState::InProgress => "IN_PROGRESS",
            MigrationState::Succeeded => "SUCCEEDED",
            MigrationState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// One status reply for a tracked migration.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub state: MigrationState,
    pub failure_reason: Option<String>,
}

/// Everything the service needs to start migrating one repository.
///
/// Access tokens are a client concern: the implementation talking to the
/// real service carries them, fakes ignore them.
#[derive(Debug, Clone)]
pub struct StartMigrationRequest {
    /// Source reference understood by the migration service.
    pub source_repo_url: String,
    pub target_org: String,
    pub target_repo: String,
    pub visibility: Visibility,
    pub skip_releases: bool,
    pub lock_source: bool,
}

/// Operations this system issues against the migration service.
#[async_trait]
pub trait MigrationApi: Send + Sync {
    /// Submit a migration; returns the service's opaque migration id.
    async fn start_migration(&self, request: &StartMigrationRequest) -> Result<String>;

    /// Query the current status of a migration by id.
    async fn get_migration_status(&self, migration_id: &str) -> Result<MigrationStatus>;

    /// URL of the migration log for a migrated repository, if the
    /// service has produced one yet.
    async fn get_migration_log_url(&self, org: &str, target_repo: &str)
    -> Result<Option<String>>;
}

#[async_trait]
impl<A: MigrationApi + ?Sized> MigrationApi for std::sync::Arc<A> {
    async fn start_migration(&self, request: &StartMigrationRequest) -> Result<String> {
        (**self).start_migration(request).await
    }

    async fn get_migration_status(&self, migration_id: &str) -> Result<MigrationStatus> {
        (**self).get_migration_status(migration_id).await
    }

    async fn get_migration_log_url(
        &self,
        org: &str,
        target_repo: &str,
    ) -> Result<Option<String>> {
        (**self).get_migration_log_url(org, target_repo).await
    }
}
