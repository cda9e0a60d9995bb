//! Migration script rendering.
//!
//! Turns an [`ExecutionPlan`] into a self-contained PowerShell script
//! that can be audited, edited and executed outside this tool. The
//! script drives the same CLI (`migrate migrate-repo`,
//! `migrate wait-for-migration`, `migrate download-logs`), so running
//! the artifact and running the plan directly are observably the same
//! batch. Rendering is pure: the caller decides where the text goes.

use std::fmt::Write as _;

use crate::batch::BatchResult;
use crate::plan::{ExecutionPlan, MigrationJob, PlanMode, PlanUnit, SourceDescriptor};

const PWSH_SHEBANG: &str = "#!/usr/bin/env pwsh";

const EXEC_FUNCTION_BLOCK: &str = "
function Exec {
    param (
        [scriptblock]$ScriptBlock
    )
    & @ScriptBlock
    if ($lastexitcode -ne 0) {
        exit $lastexitcode
    }
}";

const EXEC_AND_GET_MIGRATION_ID_FUNCTION_BLOCK: &str = "
function ExecAndGetMigrationID {
    param (
        [scriptblock]$ScriptBlock
    )
    $MigrationID = & @ScriptBlock | ForEach-Object {
        Write-Host $_
        $_
    } | Select-String -Pattern \"\\(ID: (.+)\\)\" | ForEach-Object { $_.matches.groups[1] }
    return $MigrationID
}";

const VALIDATE_GH_PAT: &str = "
if (-not $env:GH_PAT) {
    Write-Error \"GH_PAT environment variable must be set to a valid GitHub Personal Access Token with the appropriate scopes.\"
    exit 1
} else {
    Write-Host \"GH_PAT environment variable is set and will be used to authenticate to GitHub.\"
}";

const VALIDATE_AZURE_STORAGE_CONNECTION_STRING: &str = "
if (-not $env:AZURE_STORAGE_CONNECTION_STRING) {
    Write-Error \"AZURE_STORAGE_CONNECTION_STRING environment variable must be set to a valid Azure Storage Connection String that will be used to upload the migration archive to Azure Blob Storage.\"
    exit 1
} else {
    Write-Host \"AZURE_STORAGE_CONNECTION_STRING environment variable is set and will be used to upload the migration archive to Azure Blob Storage.\"
}";

const VALIDATE_AWS_ACCESS_KEY_ID: &str = "
if (-not $env:AWS_ACCESS_KEY_ID) {
    Write-Error \"AWS_ACCESS_KEY_ID environment variable must be set to a valid AWS Access Key ID that will be used to upload the migration archive to AWS S3.\"
    exit 1
} else {
    Write-Host \"AWS_ACCESS_KEY_ID environment variable is set and will be used to upload the migration archive to AWS S3.\"
}";

const VALIDATE_AWS_SECRET_ACCESS_KEY: &str = "
if (-not $env:AWS_SECRET_ACCESS_KEY) {
    Write-Error \"AWS_SECRET_ACCESS_KEY environment variable must be set to a valid AWS Secret Access Key that will be used to upload the migration archive to AWS S3.\"
    exit 1
} else {
    Write-Host \"AWS_SECRET_ACCESS_KEY environment variable is set and will be used to upload the migration archive to AWS S3.\"
}";

/// Renders an execution plan as a runnable PowerShell script.
pub struct ScriptRenderer<'a> {
    plan: &'a ExecutionPlan,
    version: &'a str,
}

impl<'a> ScriptRenderer<'a> {
    pub fn new(plan: &'a ExecutionPlan, version: &'a str) -> Self {
        Self { plan, version }
    }

    pub fn render(&self) -> String {
        match self.plan.mode {
            PlanMode::Sequential => self.render_sequential(),
            PlanMode::Parallel => self.render_parallel(),
        }
    }

    fn render_preamble(&self, out: &mut String, exec_block: &str) {
        let _ = writeln!(out, "{PWSH_SHEBANG}");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "# =========== Created with CLI version {} ===========",
            self.version
        );
        let _ = writeln!(out, "{exec_block}");

        let _ = writeln!(out, "{VALIDATE_GH_PAT}");
        if let Some(ghes) = &self.plan.options.ghes {
            if ghes.uses_aws() {
                let _ = writeln!(out, "{VALIDATE_AWS_ACCESS_KEY_ID}");
                let _ = writeln!(out, "{VALIDATE_AWS_SECRET_ACCESS_KEY}");
            } else {
                let _ = writeln!(out, "{VALIDATE_AZURE_STORAGE_CONNECTION_STRING}");
            }
        }
    }

    fn render_sequential(&self) -> String {
        let mut out = String::new();
        self.render_preamble(&mut out, EXEC_FUNCTION_BLOCK);

        let _ = writeln!(
            out,
            "# =========== Organization: {} ===========",
            self.plan.source.org()
        );

        for unit in &self.plan.units {
            self.render_unit_header(&mut out, unit, "");
            for &job in &unit.jobs {
                let job = &self.plan.jobs[job];
                let _ = writeln!(out, "Exec {{ {} }}", self.migrate_repo_invocation(job, true));
                if self.plan.options.download_migration_logs {
                    let _ = writeln!(out, "Exec {{ {} }}", self.download_logs_invocation(job));
                }
            }
        }

        out
    }

    fn render_parallel(&self) -> String {
        let mut out = String::new();
        self.render_preamble(&mut out, EXEC_AND_GET_MIGRATION_ID_FUNCTION_BLOCK);

        let _ = writeln!(out);
        let _ = writeln!(out, "$Succeeded = 0");
        let _ = writeln!(out, "$Failed = 0");
        let _ = writeln!(out, "$RepoMigrations = [ordered]@{{}}");

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "# =========== Organization: {} ===========",
            self.plan.source.org()
        );

        // Queue phase: every submission before any wait.
        for unit in &self.plan.units {
            self.render_unit_header(&mut out, unit, "Queuing repo migrations for ");
            for &job in &unit.jobs {
                let job = &self.plan.jobs[job];
                let _ = writeln!(
                    out,
                    "$MigrationID = ExecAndGetMigrationID {{ {} }}",
                    self.migrate_repo_invocation(job, false)
                );
                let _ = writeln!(out, "$RepoMigrations[\"{}\"] = $MigrationID", job.target_repo);
                let _ = writeln!(out);
            }
        }

        // Wait phase: same order; a repo that never produced a
        // migration id skips the wait but still lands in $Failed.
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "# =========== Waiting for all migrations to finish for Organization: {} ===========",
            self.plan.source.org()
        );

        for unit in &self.plan.units {
            if !unit.jobs.is_empty() {
                if let Some(name) = &unit.name {
                    let _ = writeln!(out);
                    let _ = writeln!(
                        out,
                        "# === Migration status for Team Project: {}/{} ===",
                        self.plan.source.org(),
                        name
                    );
                }
            }
            for &job in &unit.jobs {
                let job = &self.plan.jobs[job];
                let key = &job.target_repo;
                let _ = writeln!(
                    out,
                    "if ($RepoMigrations[\"{key}\"]) {{ migrate wait-for-migration --migration-id $RepoMigrations[\"{key}\"] }}"
                );
                let _ = writeln!(
                    out,
                    "if ($RepoMigrations[\"{key}\"] -and $lastexitcode -eq 0) {{ $Succeeded++ }} else {{ $Failed++ }}"
                );
                if self.plan.options.download_migration_logs {
                    let _ = writeln!(out, "{}", self.download_logs_invocation(job));
                }
                let _ = writeln!(out);
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Write-Host =============== Summary ===============");
        let _ = writeln!(out, "Write-Host Total number of successful migrations: $Succeeded");
        let _ = writeln!(out, "Write-Host Total number of failed migrations: $Failed");
        let _ = writeln!(out, "\nif ($Failed -ne 0) {{\n    exit 1\n}}");

        out
    }

    fn render_unit_header(&self, out: &mut String, unit: &PlanUnit, phase_prefix: &str) {
        let Some(name) = &unit.name else {
            return;
        };
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "# === {}Team Project: {}/{} ===",
            phase_prefix,
            self.plan.source.org(),
            name
        );
        if unit.jobs.is_empty() {
            let _ = writeln!(out, "# Skipping this Team Project because it has no git repos");
        }
    }

    /// One `migrate migrate-repo` invocation mirroring the plan options.
    fn migrate_repo_invocation(&self, job: &MigrationJob, wait: bool) -> String {
        let options = &self.plan.options;
        let mut cmd = String::from("migrate migrate-repo");

        match &self.plan.source {
            SourceDescriptor::Github { org } => {
                let _ = write!(cmd, " --github-source-org \"{org}\"");
            }
            SourceDescriptor::AzureDevOps { org, server_url } => {
                if let Some(server_url) = server_url {
                    let _ = write!(cmd, " --ado-server-url \"{server_url}\"");
                }
                let _ = write!(cmd, " --ado-source-org \"{org}\"");
                if let Some(project) = &job.repo.team_project {
                    let _ = write!(cmd, " --ado-team-project \"{project}\"");
                }
            }
        }

        let _ = write!(cmd, " --source-repo \"{}\"", job.repo.name);
        let _ = write!(cmd, " --github-target-org \"{}\"", options.target_org);
        let _ = write!(cmd, " --target-repo \"{}\"", job.target_repo);

        if let Some(ghes) = &options.ghes {
            let _ = write!(cmd, " --ghes-api-url \"{}\"", ghes.api_url);
            if let Some(bucket) = &ghes.aws_bucket_name {
                let _ = write!(cmd, " --aws-bucket-name \"{bucket}\"");
            }
            if let Some(region) = &ghes.aws_region {
                let _ = write!(cmd, " --aws-region \"{region}\"");
            }
            if ghes.no_ssl_verify {
                cmd.push_str(" --no-ssl-verify");
            }
            if ghes.keep_archive {
                cmd.push_str(" --keep-archive");
            }
        }

        if options.verbose {
            cmd.push_str(" --verbose");
        }
        if !wait {
            cmd.push_str(" --queue-only");
        }
        if options.skip_releases {
            cmd.push_str(" --skip-releases");
        }
        if options.lock_source_repo {
            cmd.push_str(" --lock-source-repo");
        }
        if matches!(self.plan.source, SourceDescriptor::Github { .. }) {
            let _ = write!(cmd, " --target-repo-visibility {}", job.repo.visibility);
        }

        cmd
    }

    fn download_logs_invocation(&self, job: &MigrationJob) -> String {
        format!(
            "migrate download-logs --github-target-org \"{}\" --target-repo \"{}\"",
            self.plan.options.target_org, job.target_repo
        )
    }
}

/// The summary block reported at the end of a direct (live) run.
pub fn render_summary(result: &BatchResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=============== Summary ===============");
    let _ = writeln!(out, "Total number of successful migrations: {}", result.succeeded);
    let _ = writeln!(out, "Total number of failed migrations: {}", result.failed);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{GhesOptions, MigrationOptions, Planner, SourceDescriptor};
    use crate::sources::{Inventory, RepoGroup, SourceRepo, Visibility};

    fn github_plan(sequential: bool, ghes: Option<GhesOptions>) -> ExecutionPlan {
        let inventory = Inventory::flat(vec![
            SourceRepo::flat("one", Visibility::Public),
            SourceRepo::flat("two", Visibility::Private),
            SourceRepo::flat("three", Visibility::Internal),
        ]);
        let options = MigrationOptions {
            target_org: "tgt-org".into(),
            ghes,
            sequential,
            ..Default::default()
        };
        Planner::new(SourceDescriptor::Github { org: "src-org".into() }, options)
            .build(&inventory)
            .unwrap()
    }

    #[test]
    fn test_sequential_script_has_no_parallel_bookkeeping() {
        let plan = github_plan(true, None);
        let script = ScriptRenderer::new(&plan, "0.1.0").render();

        assert!(script.starts_with("#!/usr/bin/env pwsh"));
        assert!(script.contains("function Exec {"));
        assert!(!script.contains("ExecAndGetMigrationID"));
        assert!(!script.contains("$Succeeded"));
        assert!(!script.contains("=============== Summary ==============="));

        // One Exec block per repo, in enumeration order.
        let execs: Vec<&str> = script
            .lines()
            .filter(|l| l.starts_with("Exec {"))
            .collect();
        assert_eq!(execs.len(), 3);
        assert!(execs[0].contains("--source-repo \"one\""));
        assert!(execs[1].contains("--source-repo \"two\""));
        assert!(execs[2].contains("--source-repo \"three\""));
        // Sequential invocations wait inline rather than queueing.
        assert!(!script.contains("--queue-only"));
        assert!(execs[0].contains("--target-repo-visibility public"));
    }

    #[test]
    fn test_parallel_script_queues_everything_then_waits() {
        let plan = github_plan(false, None);
        let script = ScriptRenderer::new(&plan, "0.1.0").render();

        assert!(script.contains("function ExecAndGetMigrationID {"));
        assert!(script.contains("$RepoMigrations = [ordered]@{}"));
        assert!(script.contains("--queue-only"));
        assert!(script.contains(
            "if ($RepoMigrations[\"two\"]) { migrate wait-for-migration --migration-id $RepoMigrations[\"two\"] }"
        ));
        assert!(script.contains(
            "if ($RepoMigrations[\"two\"] -and $lastexitcode -eq 0) { $Succeeded++ } else { $Failed++ }"
        ));
        assert!(script.contains("if ($Failed -ne 0) {\n    exit 1\n}"));

        // Every queue line comes before every wait line.
        let last_queue = script.rfind("--queue-only").unwrap();
        let first_wait = script.find("wait-for-migration").unwrap();
        assert!(last_queue < first_wait);
    }

    #[test]
    fn test_gh_pat_is_always_validated() {
        let script = ScriptRenderer::new(&github_plan(false, None), "0.1.0").render();
        assert!(script.contains("if (-not $env:GH_PAT)"));
        assert!(!script.contains("AZURE_STORAGE_CONNECTION_STRING"));
        assert!(!script.contains("AWS_ACCESS_KEY_ID"));
    }

    #[test]
    fn test_ghes_without_aws_validates_azure_connection_string() {
        let ghes = GhesOptions {
            api_url: "https://ghes.example.com/api/v3".into(),
            ..Default::default()
        };
        let script = ScriptRenderer::new(&github_plan(true, Some(ghes)), "0.1.0").render();

        assert!(script.contains("if (-not $env:AZURE_STORAGE_CONNECTION_STRING)"));
        assert!(!script.contains("AWS_ACCESS_KEY_ID"));
        assert!(script.contains("--ghes-api-url \"https://ghes.example.com/api/v3\""));
    }

    #[test]
    fn test_ghes_with_aws_validates_key_pair() {
        let ghes = GhesOptions {
            api_url: "https://ghes.example.com/api/v3".into(),
            aws_bucket_name: Some("archives".into()),
            aws_region: Some("eu-west-1".into()),
            no_ssl_verify: true,
            keep_archive: true,
        };
        let script = ScriptRenderer::new(&github_plan(true, Some(ghes)), "0.1.0").render();

        assert!(script.contains("if (-not $env:AWS_ACCESS_KEY_ID)"));
        assert!(script.contains("if (-not $env:AWS_SECRET_ACCESS_KEY)"));
        assert!(!script.contains("AZURE_STORAGE_CONNECTION_STRING"));
        assert!(script.contains("--aws-bucket-name \"archives\""));
        assert!(script.contains("--aws-region \"eu-west-1\""));
        assert!(script.contains("--no-ssl-verify"));
        assert!(script.contains("--keep-archive"));
    }

    #[test]
    fn test_ado_script_renders_team_project_sections() {
        let inventory = Inventory {
            groups: vec![
                RepoGroup {
                    unit: Some("ProjA".into()),
                    repos: vec![SourceRepo::in_project("repo1", "ProjA")],
                },
                RepoGroup { unit: Some("EmptyProj".into()), repos: vec![] },
            ],
        };
        let options = MigrationOptions {
            target_org: "tgt-org".into(),
            sequential: false,
            ..Default::default()
        };
        let source = SourceDescriptor::AzureDevOps { org: "ado-org".into(), server_url: None };
        let plan = Planner::new(source, options).build(&inventory).unwrap();
        let script = ScriptRenderer::new(&plan, "0.1.0").render();

        assert!(script.contains("# === Queuing repo migrations for Team Project: ado-org/ProjA ==="));
        assert!(script.contains("# Skipping this Team Project because it has no git repos"));
        assert!(script.contains("--ado-source-org \"ado-org\""));
        assert!(script.contains("--ado-team-project \"ProjA\""));
        assert!(script.contains("--target-repo \"ProjA-repo1\""));
        // ADO migrations never pass a visibility flag.
        assert!(!script.contains("--target-repo-visibility"));
    }

    #[test]
    fn test_version_comment_present() {
        let script = ScriptRenderer::new(&github_plan(true, None), "1.2.3").render();
        assert!(script.contains("# =========== Created with CLI version 1.2.3 ==========="));
    }

    #[test]
    fn test_summary_rendering() {
        let result = BatchResult { succeeded: 2, failed: 1 };
        let summary = render_summary(&result);
        assert!(summary.contains("Total number of successful migrations: 2"));
        assert!(summary.contains("Total number of failed migrations: 1"));
    }
}
