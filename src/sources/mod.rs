//! Source-platform repository enumeration.
//!
//! This module lists the candidate repositories for a migration run:
//! - Azure DevOps organizations, grouped by team project, excluding
//!   disabled repositories
//! - GitHub (cloud or Enterprise Server) organizations, with each
//!   repository's visibility
//!
//! Enumeration is observability-friendly: one log line per discovered
//! unit and per repository. The resulting [`Inventory`] preserves
//! discovery order, which downstream planning relies on.

mod ado;
mod github;

pub use ado::AdoClient;
pub use github::GithubSource;

use serde::{Deserialize, Serialize};

/// Repository visibility on the target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
        }
    }

    /// Parse a visibility string as reported by the source platform.
    /// Unknown values map to the most restrictive option.
    pub fn parse(value: &str) -> Self {
        match value {
            "public" => Visibility::Public,
            "internal" => Visibility::Internal,
            _ => Visibility::Private,
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A migratable repository discovered on the source platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRepo {
    pub name: String,
    /// Team project the repository belongs to. Present for Azure DevOps
    /// sources, absent for GitHub sources.
    pub team_project: Option<String>,
    pub visibility: Visibility,
}

impl SourceRepo {
    /// A repository from a flat (GitHub) enumeration.
    pub fn flat(name: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            team_project: None,
            visibility,
        }
    }

    /// A repository belonging to an Azure DevOps team project.
    pub fn in_project(name: impl Into<String>, team_project: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            team_project: Some(team_project.into()),
            visibility: Visibility::Private,
        }
    }
}

/// One organizational unit worth of repositories.
///
/// GitHub enumerations produce a single group with no unit name. Azure
/// DevOps enumerations produce one group per team project, including
/// projects with no Git repositories at all (the rendered script calls
/// those out as skipped rather than silently dropping them).
#[derive(Debug, Clone, Default)]
pub struct RepoGroup {
    pub unit: Option<String>,
    pub repos: Vec<SourceRepo>,
}

/// The ordered result of one enumeration pass.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub groups: Vec<RepoGroup>,
}

impl Inventory {
    /// Single anonymous group, for flat enumerations and single-repo runs.
    pub fn flat(repos: Vec<SourceRepo>) -> Self {
        Self {
            groups: vec![RepoGroup { unit: None, repos }],
        }
    }

    /// Total number of repositories across all groups.
    pub fn repo_count(&self) -> usize {
        self.groups.iter().map(|g| g.repos.len()).sum()
    }

    /// True when no group contains any repository.
    pub fn is_empty(&self) -> bool {
        self.repo_count() == 0
    }

    /// All repositories in enumeration order.
    pub fn repos(&self) -> impl Iterator<Item = &SourceRepo> {
        self.groups.iter().flat_map(|g| g.repos.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_counts_across_groups() {
        let inventory = Inventory {
            groups: vec![
                RepoGroup {
                    unit: Some("ProjA".into()),
                    repos: vec![SourceRepo::in_project("one", "ProjA")],
                },
                RepoGroup {
                    unit: Some("Empty".into()),
                    repos: vec![],
                },
                RepoGroup {
                    unit: Some("ProjB".into()),
                    repos: vec![
                        SourceRepo::in_project("two", "ProjB"),
                        SourceRepo::in_project("three", "ProjB"),
                    ],
                },
            ],
        };

        assert_eq!(inventory.repo_count(), 3);
        assert!(!inventory.is_empty());
        let names: Vec<&str> = inventory.repos().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_inventory_with_only_empty_groups_is_empty() {
        let inventory = Inventory {
            groups: vec![RepoGroup {
                unit: Some("Empty".into()),
                repos: vec![],
            }],
        };
        assert!(inventory.is_empty());
    }

    #[test]
    fn test_visibility_parse_defaults_to_private() {
        assert_eq!(Visibility::parse("public"), Visibility::Public);
        assert_eq!(Visibility::parse("internal"), Visibility::Internal);
        assert_eq!(Visibility::parse("whatever"), Visibility::Private);
    }
}
