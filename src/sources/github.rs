//! GitHub source enumeration.

use octocrab::Octocrab;
use octocrab::models::Repository;
use tracing::info;

use crate::error::{MigrateError, Result};
use crate::sources::{Inventory, SourceRepo, Visibility};

/// Lists the repositories of a source organization on GitHub, either
/// github.com or a GitHub Enterprise Server instance.
pub struct GithubSource {
    octocrab: Octocrab,
}

impl GithubSource {
    /// Create a source for github.com with the given token.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let octocrab = Octocrab::builder()
            .personal_token(token.into())
            .build()?;
        Ok(Self { octocrab })
    }

    /// Create a source for a GHES instance with a custom API base URL.
    pub fn with_api_url(token: impl Into<String>, api_url: &str) -> Result<Self> {
        let octocrab = Octocrab::builder()
            .base_uri(api_url)?
            .personal_token(token.into())
            .build()?;
        Ok(Self { octocrab })
    }

    fn to_source_repo(repo: &Repository) -> SourceRepo {
        let visibility = repo
            .visibility
            .as_deref()
            .map(Visibility::parse)
            .unwrap_or_default();
        SourceRepo::flat(repo.name.clone(), visibility)
    }

    /// List all repositories of the organization, in API order.
    pub async fn list_repos(&self, org: &str) -> Result<Vec<SourceRepo>> {
        let mut repos = Vec::new();
        let mut page = self
            .octocrab
            .orgs(org)
            .list_repos()
            .per_page(100)
            .send()
            .await?;

        loop {
            repos.extend(page.items.iter().map(Self::to_source_repo));
            match self.octocrab.get_page::<Repository>(&page.next).await? {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(repos)
    }

    /// Enumerate the migratable repositories of the organization as a
    /// single flat group.
    pub async fn enumerate(&self, org: &str) -> Result<Inventory> {
        debug_assert!(!org.trim().is_empty(), "enumerate called without an organization");
        if org.trim().is_empty() {
            return Err(MigrateError::InvalidArgs(
                "GitHub organization must not be empty".into(),
            ));
        }

        info!("GITHUB ORG: {}", org);
        let repos = self.list_repos(org).await?;
        for repo in &repos {
            info!("    Repo: {}", repo.name);
        }

        Ok(Inventory::flat(repos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo_json(id: u64, name: &str, visibility: &str) -> serde_json::Value {
        json!({
            "id": id,
            "node_id": format!("R_{id}"),
            "name": name,
            "full_name": format!("my-org/{name}"),
            "url": format!("https://api.github.com/repos/my-org/{name}"),
            "private": visibility != "public",
            "visibility": visibility,
        })
    }

    #[tokio::test]
    async fn test_list_repos_maps_visibility() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orgs/my-org/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                repo_json(1, "open", "public"),
                repo_json(2, "closed", "private"),
                repo_json(3, "shared", "internal"),
            ])))
            .mount(&server)
            .await;

        let source = GithubSource::with_api_url("pat", &server.uri()).unwrap();
        let repos = source.list_repos("my-org").await.unwrap();

        assert_eq!(repos.len(), 3);
        assert_eq!(repos[0].visibility, Visibility::Public);
        assert_eq!(repos[1].visibility, Visibility::Private);
        assert_eq!(repos[2].visibility, Visibility::Internal);
        assert!(repos.iter().all(|r| r.team_project.is_none()));
    }

    #[tokio::test]
    async fn test_enumerate_produces_single_flat_group() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orgs/my-org/repos"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([repo_json(1, "only", "private")])),
            )
            .mount(&server)
            .await;

        let source = GithubSource::with_api_url("pat", &server.uri()).unwrap();
        let inventory = source.enumerate("my-org").await.unwrap();

        assert_eq!(inventory.groups.len(), 1);
        assert_eq!(inventory.groups[0].unit, None);
        assert_eq!(inventory.repo_count(), 1);
    }
}
