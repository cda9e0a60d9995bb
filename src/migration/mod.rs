//! Target-platform migration service integration.
//!
//! The migration service does the actual data transfer; this crate only
//! starts migrations, polls their status and fetches log locations.
//! [`MigrationApi`] is the seam: the supervisor drives any
//! implementation, which keeps the orchestration logic testable without
//! a network.

mod api;
mod client;
mod supervisor;

pub use api::{MigrationApi, MigrationState, MigrationStatus, StartMigrationRequest};
pub use client::GithubMigrationClient;
pub use supervisor::{RunReport, Supervisor, WaitOptions};
