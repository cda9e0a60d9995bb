//! Personal access token resolution.
//!
//! Tokens are resolved once, before any planning happens, through an
//! explicit fallback chain: command-line override first, then the
//! source-specific environment variable, then the target token. A chain
//! that bottoms out with nothing set is a configuration error naming the
//! variable the user should export.

use std::env;

use crate::error::{MigrateError, Result};

/// Personal access token for the GitHub target organization.
pub const GH_PAT: &str = "GH_PAT";

/// Personal access token for the GitHub source organization.
pub const GH_SOURCE_PAT: &str = "GH_SOURCE_PAT";

/// Personal access token for the Azure DevOps source organization.
pub const ADO_PAT: &str = "ADO_PAT";

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// First set value in an ordered chain of optional tokens.
fn first_of<I>(chain: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    chain.into_iter().flatten().next()
}

/// Resolve the target GitHub token: `--github-target-pat`, else `GH_PAT`.
pub fn github_target_pat(override_pat: Option<&str>) -> Result<String> {
    first_of([override_pat.map(str::to_owned), env_var(GH_PAT)])
        .ok_or(MigrateError::MissingCredential { name: GH_PAT })
}

/// Resolve the source GitHub token: `--github-source-pat`, else
/// `GH_SOURCE_PAT`, else the target chain.
pub fn github_source_pat(
    override_pat: Option<&str>,
    target_override: Option<&str>,
) -> Result<String> {
    match first_of([override_pat.map(str::to_owned), env_var(GH_SOURCE_PAT)]) {
        Some(pat) => Ok(pat),
        None => github_target_pat(target_override),
    }
}

/// Resolve the Azure DevOps token: `--ado-pat`, else `ADO_PAT`.
pub fn ado_pat(override_pat: Option<&str>) -> Result<String> {
    first_of([override_pat.map(str::to_owned), env_var(ADO_PAT)])
        .ok_or(MigrateError::MissingCredential { name: ADO_PAT })
}
