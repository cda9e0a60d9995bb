//! Azure DevOps enumeration client.

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::{MigrateError, Result};
use crate::sources::{Inventory, RepoGroup, SourceRepo};

const DEFAULT_SERVER_URL: &str = "https://dev.azure.com";
const API_VERSION: &str = "7.1";

/// ADO paginates project listings through this response header.
const CONTINUATION_HEADER: &str = "x-ms-continuationtoken";

/// Client for the Azure DevOps REST API.
#[derive(Clone)]
pub struct AdoClient {
    token: String,
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TeamProject {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GitRepo {
    name: String,
    #[serde(default)]
    is_disabled: bool,
}

impl AdoClient {
    /// Create a client for Azure DevOps Services (dev.azure.com).
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: DEFAULT_SERVER_URL.into(),
            client: Client::new(),
        }
    }

    /// Create a client for an on-premises Azure DevOps Server.
    pub fn with_server(token: impl Into<String>, server_url: impl Into<String>) -> Self {
        let mut url = server_url.into();
        // Remove trailing slash if present
        if url.ends_with('/') {
            url.pop();
        }
        Self {
            token: token.into(),
            base_url: url,
            client: Client::new(),
        }
    }

    /// Make a GET request, returning the body and the continuation token.
    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<(T, Option<String>)> {
        let response = self
            .client
            .get(url)
            .basic_auth("", Some(&self.token))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MigrateError::Ado {
                message: format!("API request failed ({}): {}", status, body),
            });
        }

        let continuation = response
            .headers()
            .get(CONTINUATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = response.json().await.map_err(|e| MigrateError::Ado {
            message: format!("Failed to parse response: {}", e),
        })?;

        Ok((body, continuation))
    }

    /// List all team projects in an organization, in server order.
    pub async fn list_team_projects(&self, org: &str) -> Result<Vec<String>> {
        let mut projects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let url = match &continuation {
                Some(token) => format!(
                    "{}/{}/_apis/projects?api-version={}&continuationToken={}",
                    self.base_url, org, API_VERSION, token
                ),
                None => format!(
                    "{}/{}/_apis/projects?api-version={}",
                    self.base_url, org, API_VERSION
                ),
            };

            let (page, next): (ListResponse<TeamProject>, _) = self.get(&url).await?;
            projects.extend(page.value.into_iter().map(|p| p.name));

            match next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        Ok(projects)
    }

    /// List enabled Git repositories in a team project.
    ///
    /// The Git endpoint only reports Git repositories, so TFVC never
    /// shows up here; disabled repositories are filtered out.
    pub async fn list_enabled_git_repos(&self, org: &str, team_project: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/{}/{}/_apis/git/repositories?api-version={}",
            self.base_url, org, team_project, API_VERSION
        );

        let (response, _): (ListResponse<GitRepo>, _) = self.get(&url).await?;

        Ok(response
            .value
            .into_iter()
            .filter(|r| !r.is_disabled)
            .map(|r| r.name)
            .collect())
    }

    /// Enumerate the migratable repositories of an organization, grouped
    /// by team project.
    ///
    /// When a filter is given, only the team project matching it exactly
    /// (case-insensitively) is enumerated; a filter matching nothing
    /// yields an empty inventory, not an error.
    pub async fn enumerate(&self, org: &str, team_project_filter: Option<&str>) -> Result<Inventory> {
        debug_assert!(!org.trim().is_empty(), "enumerate called without an organization");
        if org.trim().is_empty() {
            return Err(MigrateError::InvalidArgs(
                "ADO organization must not be empty".into(),
            ));
        }

        let mut team_projects = self.list_team_projects(org).await?;

        if let Some(filter) = team_project_filter {
            team_projects.retain(|p| p.eq_ignore_ascii_case(filter));
        }

        let mut groups = Vec::new();
        for team_project in team_projects {
            info!("Team Project: {}", team_project);
            let mut repos = Vec::new();
            for repo in self.list_enabled_git_repos(org, &team_project).await? {
                info!("  Repo: {}", repo);
                repos.push(SourceRepo::in_project(repo, team_project.clone()));
            }
            groups.push(RepoGroup {
                unit: Some(team_project),
                repos,
            });
        }

        Ok(Inventory { groups })
    }

    /// Base URL of the server this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
