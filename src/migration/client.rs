//! GitHub migration API client.
//!
//! Talks GraphQL to the target platform: one mutation to start a
//! repository migration, one query to poll it, one query to locate its
//! log. The target organization's node id is resolved once per
//! organization and cached for the lifetime of the client.

use std::collections::HashMap;

use reqwest::Client;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::error::{MigrateError, Result};
use crate::migration::api::{
    MigrationApi, MigrationState, MigrationStatus, StartMigrationRequest,
};

const DEFAULT_API_URL: &str = "https://api.github.com";

/// Client for the GitHub migration (GraphQL) API.
pub struct GithubMigrationClient {
    target_pat: String,
    source_pat: String,
    base_url: String,
    client: Client,
    org_ids: Mutex<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

impl GithubMigrationClient {
    /// Create a client against api.github.com.
    ///
    /// The target token authenticates the GraphQL calls; the source
    /// token is handed to the service so it can pull from the source
    /// platform.
    pub fn new(target_pat: impl Into<String>, source_pat: impl Into<String>) -> Self {
        Self::with_base_url(target_pat, source_pat, DEFAULT_API_URL)
    }

    /// Create a client with a custom API base URL.
    pub fn with_base_url(
        target_pat: impl Into<String>,
        source_pat: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let mut url = base_url.into();
        // Remove trailing slash if present
        if url.ends_with('/') {
            url.pop();
        }
        Self {
            target_pat: target_pat.into(),
            source_pat: source_pat.into(),
            base_url: url,
            client: Client::new(),
            org_ids: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a GraphQL request and unwrap the response envelope.
    async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let url = format!("{}/graphql", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.target_pat)
            .header(USER_AGENT, "repo-migrate")
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MigrateError::Migration {
                message: format!("API request failed ({}): {}", status, body),
            });
        }

        let envelope: GraphqlResponse =
            response.json().await.map_err(|e| MigrateError::Migration {
                message: format!("Failed to parse response: {}", e),
            })?;

        if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(MigrateError::Migration {
                message: messages.join("; "),
            });
        }

        envelope.data.ok_or_else(|| MigrateError::Migration {
            message: "Response contained no data".into(),
        })
    }

    /// Required string field of a GraphQL reply, by JSON pointer.
    fn str_at(data: &Value, pointer: &str) -> Result<String> {
        data.pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| MigrateError::Migration {
                message: format!("Missing field in response: {}", pointer),
            })
    }

    /// Node id of the target organization, cached per organization.
    async fn organization_id(&self, org: &str) -> Result<String> {
        if let Some(id) = self.org_ids.lock().await.get(org) {
            return Ok(id.clone());
        }

        let data = self
            .graphql(
                "query($login: String!) { organization(login: $login) { id } }",
                json!({ "login": org }),
            )
            .await?;
        let id = Self::str_at(&data, "/organization/id")?;

        self.org_ids
            .lock()
            .await
            .insert(org.to_owned(), id.clone());
        Ok(id)
    }

    fn parse_state(state: &str) -> MigrationState {
        match state {
            "SUCCEEDED" => MigrationState::Succeeded,
            "FAILED" | "FAILED_VALIDATION" => MigrationState::Failed,
            "IN_PROGRESS" => MigrationState::InProgress,
            _ => MigrationState::Queued,
        }
    }
}

const START_MIGRATION: &str = "\
mutation startRepositoryMigration(
    $ownerId: ID!,
    $sourceRepositoryUrl: URI!,
    $repositoryName: String!,
    $targetRepoVisibility: String!,
    $skipReleases: Boolean!,
    $lockSource: Boolean!,
    $accessToken: String!,
    $githubPat: String!
) {
    startRepositoryMigration(input: {
        ownerId: $ownerId,
        sourceRepositoryUrl: $sourceRepositoryUrl,
        repositoryName: $repositoryName,
        targetRepoVisibility: $targetRepoVisibility,
        skipReleases: $skipReleases,
        lockSource: $lockSource,
        accessToken: $accessToken,
        githubPat: $githubPat,
        continueOnError: true
    }) {
        repositoryMigration { id }
    }
}";

const MIGRATION_STATUS: &str = "\
query($id: ID!) {
    node(id: $id) {
        ... on Migration { id state failureReason }
    }
}";

const MIGRATION_LOG_URL: &str = "\
query($org: String!, $repo: String!) {
    organization(login: $org) {
        repositoryMigrations(last: 1, repositoryName: $repo) {
            nodes { migrationLogUrl }
        }
    }
}";

#[async_trait::async_trait]
impl MigrationApi for GithubMigrationClient {
    async fn start_migration(&self, request: &StartMigrationRequest) -> Result<String> {
        let owner_id = self.organization_id(&request.target_org).await?;

        let variables = json!({
            "ownerId": owner_id,
            "sourceRepositoryUrl": request.source_repo_url,
            "repositoryName": request.target_repo,
            "targetRepoVisibility": request.visibility.as_str(),
            "skipReleases": request.skip_releases,
            "lockSource": request.lock_source,
            "accessToken": self.source_pat,
            "githubPat": self.target_pat,
        });

        let data = self.graphql(START_MIGRATION, variables).await?;
        Self::str_at(&data, "/startRepositoryMigration/repositoryMigration/id")
    }

    async fn get_migration_status(&self, migration_id: &str) -> Result<MigrationStatus> {
        let data = self
            .graphql(MIGRATION_STATUS, json!({ "id": migration_id }))
            .await?;

        let state = Self::str_at(&data, "/node/state")?;
        let failure_reason = data
            .pointer("/node/failureReason")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        Ok(MigrationStatus {
            state: Self::parse_state(&state),
            failure_reason,
        })
    }

    async fn get_migration_log_url(
        &self,
        org: &str,
        target_repo: &str,
    ) -> Result<Option<String>> {
        let data = self
            .graphql(MIGRATION_LOG_URL, json!({ "org": org, "repo": target_repo }))
            .await?;

        Ok(data
            .pointer("/organization/repositoryMigrations/nodes/0/migrationLogUrl")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::Visibility;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> StartMigrationRequest {
        StartMigrationRequest {
            source_repo_url: "https://github.com/src-org/repo1".into(),
            target_org: "tgt-org".into(),
            target_repo: "repo1".into(),
            visibility: Visibility::Private,
            skip_releases: false,
            lock_source: false,
        }
    }

    #[tokio::test]
    async fn test_start_migration_returns_migration_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_string_contains("startRepositoryMigration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "startRepositoryMigration": {
                        "repositoryMigration": { "id": "RM_kg123" }
                    }
                }
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "organization": { "id": "O_org1" } }
            })))
            .mount(&server)
            .await;

        let client = GithubMigrationClient::with_base_url("tgt", "src", server.uri());
        let id = client.start_migration(&request()).await.unwrap();

        assert_eq!(id, "RM_kg123");
    }

    #[tokio::test]
    async fn test_graphql_errors_are_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": null,
                "errors": [{ "message": "Resource not accessible" }]
            })))
            .mount(&server)
            .await;

        let client = GithubMigrationClient::with_base_url("tgt", "src", server.uri());
        let err = client.get_migration_status("RM_x").await.unwrap_err();

        match err {
            MigrateError::Migration { message } => {
                assert!(message.contains("Resource not accessible"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_state_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "node": { "id": "RM_x", "state": "FAILED", "failureReason": "boom" }
                }
            })))
            .mount(&server)
            .await;

        let client = GithubMigrationClient::with_base_url("tgt", "src", server.uri());
        let status = client.get_migration_status("RM_x").await.unwrap();

        assert_eq!(status.state, MigrationState::Failed);
        assert_eq!(status.failure_reason.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_unknown_states_are_not_terminal() {
        assert!(!GithubMigrationClient::parse_state("PENDING_VALIDATION").is_terminal());
        assert!(!GithubMigrationClient::parse_state("QUEUED").is_terminal());
        assert!(GithubMigrationClient::parse_state("SUCCEEDED").is_terminal());
        assert!(GithubMigrationClient::parse_state("FAILED_VALIDATION").is_terminal());
    }

    #[tokio::test]
    async fn test_log_url_absent_when_service_has_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "organization": { "repositoryMigrations": { "nodes": [] } }
                }
            })))
            .mount(&server)
            .await;

        let client = GithubMigrationClient::with_base_url("tgt", "src", server.uri());
        let url = client.get_migration_log_url("tgt-org", "repo1").await.unwrap();

        assert_eq!(url, None);
    }
}
