//! End-to-end planning and rendering scenarios.

use repo_migrate::prelude::*;
use repo_migrate::sources::RepoGroup;

fn github_inventory(names: &[&str]) -> Inventory {
    Inventory::flat(
        names
            .iter()
            .map(|n| SourceRepo::flat(*n, Visibility::Private))
            .collect(),
    )
}

fn plan_for(inventory: &Inventory, sequential: bool) -> ExecutionPlan {
    let options = MigrationOptions {
        target_org: "target-org".into(),
        sequential,
        ..Default::default()
    };
    Planner::new(SourceDescriptor::Github { org: "source-org".into() }, options)
        .build(inventory)
        .unwrap()
}

#[test]
fn test_sequential_github_script_is_three_ordered_blocks() {
    // Three repos, sequential: the artifact is three Queue+Wait blocks
    // (one Exec invocation each, aborting on non-zero exit), with no
    // parallel bookkeeping and no trailing summary.
    let plan = plan_for(&github_inventory(&["alpha", "beta", "gamma"]), true);
    let script = ScriptRenderer::new(&plan, "0.1.0").render();

    let exec_lines: Vec<&str> = script.lines().filter(|l| l.starts_with("Exec {")).collect();
    assert_eq!(exec_lines.len(), 3);
    assert!(exec_lines[0].contains("--source-repo \"alpha\""));
    assert!(exec_lines[1].contains("--source-repo \"beta\""));
    assert!(exec_lines[2].contains("--source-repo \"gamma\""));

    assert!(!script.contains("$RepoMigrations"));
    assert!(!script.contains("$Succeeded"));
    assert!(!script.contains("=============== Summary ==============="));
    // The Exec function carries the per-invocation exit check.
    assert!(script.contains("if ($lastexitcode -ne 0) {"));
}

#[test]
fn test_parallel_plan_and_script_share_the_same_phase_order() {
    let plan = plan_for(&github_inventory(&["alpha", "beta", "gamma"]), false);

    // In-memory plan: all queue steps strictly precede all wait steps.
    let first_wait = plan
        .steps
        .iter()
        .position(|s| s.kind == StepKind::Wait)
        .unwrap();
    assert!(
        plan.steps[..first_wait]
            .iter()
            .all(|s| s.kind == StepKind::Queue)
    );
    assert_eq!(
        plan.steps[..first_wait].len(),
        plan.job_count(),
        "every job queues before any job waits"
    );

    // Rendered artifact: same shape as text.
    let script = ScriptRenderer::new(&plan, "0.1.0").render();
    let last_queue = script.rfind("--queue-only").unwrap();
    let first_wait = script.find("wait-for-migration").unwrap();
    assert!(last_queue < first_wait);
    assert!(script.contains("=============== Summary ==============="));
    assert!(script.contains("if ($Failed -ne 0) {\n    exit 1\n}"));
}

#[test]
fn test_empty_enumeration_aborts_without_an_artifact() {
    // A team-project filter that matched nothing produces an empty
    // inventory; planning must abort instead of emitting a vacuous
    // script.
    let err = Planner::new(
        SourceDescriptor::AzureDevOps { org: "ado-org".into(), server_url: None },
        MigrationOptions { target_org: "target-org".into(), ..Default::default() },
    )
    .build(&Inventory::default())
    .unwrap_err();

    assert!(matches!(err, MigrateError::NoMigratableRepos));
    assert!(err.to_string().contains("No migratable repos"));
}

#[test]
fn test_ado_names_are_prefixed_and_sanitized() {
    let inventory = Inventory {
        groups: vec![RepoGroup {
            unit: Some("Proj A".into()),
            repos: vec![SourceRepo::in_project("My Repo!", "Proj A")],
        }],
    };
    let plan = Planner::new(
        SourceDescriptor::AzureDevOps { org: "ado-org".into(), server_url: None },
        MigrationOptions { target_org: "target-org".into(), ..Default::default() },
    )
    .build(&inventory)
    .unwrap();

    assert_eq!(plan.jobs[0].target_repo, "Proj-A-My-Repo-");

    // Resolving the resolved name again changes nothing.
    assert_eq!(sanitize_repo_name(&plan.jobs[0].target_repo), plan.jobs[0].target_repo);

    let script = ScriptRenderer::new(&plan, "0.1.0").render();
    assert!(script.contains("--target-repo \"Proj-A-My-Repo-\""));
}

#[test]
fn test_target_names_are_collision_free_across_team_projects() {
    // Same repo name under two projects must map to distinct targets.
    let inventory = Inventory {
        groups: vec![
            RepoGroup {
                unit: Some("ProjA".into()),
                repos: vec![SourceRepo::in_project("api", "ProjA")],
            },
            RepoGroup {
                unit: Some("ProjB".into()),
                repos: vec![SourceRepo::in_project("api", "ProjB")],
            },
        ],
    };
    let plan = Planner::new(
        SourceDescriptor::AzureDevOps { org: "ado-org".into(), server_url: None },
        MigrationOptions { target_org: "target-org".into(), ..Default::default() },
    )
    .build(&inventory)
    .unwrap();

    assert_eq!(plan.jobs[0].target_repo, "ProjA-api");
    assert_eq!(plan.jobs[1].target_repo, "ProjB-api");
}

#[test]
fn test_generated_artifact_round_trips_through_a_file() {
    let plan = plan_for(&github_inventory(&["alpha"]), false);
    let script = ScriptRenderer::new(&plan, "0.1.0").render();

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("migrate.ps1");
    std::fs::write(&path, &script).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, script);
    assert!(written.starts_with("#!/usr/bin/env pwsh"));
}

#[test]
fn test_source_urls_follow_the_platform_layout() {
    let github = SourceDescriptor::Github { org: "src".into() };
    let repo = SourceRepo::flat("repo1", Visibility::Private);
    assert_eq!(github.repo_url(&repo), "https://github.com/src/repo1");

    let ado = SourceDescriptor::AzureDevOps { org: "org".into(), server_url: None };
    let repo = SourceRepo::in_project("repo1", "Proj");
    assert_eq!(ado.repo_url(&repo), "https://dev.azure.com/org/Proj/_git/repo1");

    let ado_server = SourceDescriptor::AzureDevOps {
        org: "collection".into(),
        server_url: Some("https://ado.contoso.com".into()),
    };
    assert_eq!(
        ado_server.repo_url(&repo),
        "https://ado.contoso.com/collection/Proj/_git/repo1"
    );
}
