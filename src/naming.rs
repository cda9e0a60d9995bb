//! Target repository naming.
//!
//! Azure DevOps repositories land on GitHub as `<team-project>-<repo>`,
//! with every character GitHub does not allow in a repository name
//! replaced by a dash. GitHub-to-GitHub migrations keep the source name.
//! Names are computed by construction, never checked for collisions
//! after the fact: the team-project prefix keeps two repos with the same
//! name in different projects from mapping to the same target.

/// Returns true for characters GitHub allows in repository names.
fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Replace every disallowed character with a dash.
///
/// Total and idempotent: sanitizing an already-sanitized name is a no-op.
pub fn sanitize_repo_name(name: &str) -> String {
    name.chars()
        .map(|c| if is_allowed(c) { c } else { '-' })
        .collect()
}

/// Target name for a repository migrated from an Azure DevOps team project.
pub fn ado_target_repo_name(team_project: &str, repo: &str) -> String {
    sanitize_repo_name(&format!("{team_project}-{repo}"))
}
