//! Error types for migration operations.

use thiserror::Error;

/// The main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("No migratable repos found")]
    NoMigratableRepos,

    #[error("{name} environment variable is not set")]
    MissingCredential { name: &'static str },

    #[error("Azure DevOps API error: {message}")]
    Ado { message: String },

    #[error("GitHub API error: {message}")]
    GitHub { message: String },

    #[error("Migration API error: {message}")]
    Migration { message: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub client error: {0}")]
    Octocrab(#[from] octocrab::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// A specialized Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
