//! CLI for the repo-migrate tool.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use repo_migrate::prelude::*;
use repo_migrate::credentials;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "migrate")]
#[command(author, version, about = "Bulk repository migrations into GitHub", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a migration script so the steps can be reviewed, and
    /// optionally edited, before running them
    GenerateScript {
        /// Source GitHub organization (github.com or GHES)
        #[arg(long)]
        github_source_org: Option<String>,

        /// Source Azure DevOps organization
        #[arg(long)]
        ado_source_org: Option<String>,

        /// Restrict the ADO enumeration to a single team project
        #[arg(long)]
        ado_team_project: Option<String>,

        /// Required if migrating from ADO Server, e.g. https://myadoserver.contoso.com
        #[arg(long)]
        ado_server_url: Option<String>,

        /// Target GitHub organization
        #[arg(long)]
        github_target_org: String,

        /// Required if migrating from GHES, e.g. https://myghes.com/api/v3
        #[arg(long)]
        ghes_api_url: Option<String>,

        /// If using AWS, the name of the S3 bucket to upload the archive to
        #[arg(long)]
        aws_bucket_name: Option<String>,

        /// If using AWS, the AWS region of the bucket
        #[arg(long)]
        aws_region: Option<String>,

        /// Disable SSL verification when talking to the GHES instance
        #[arg(long)]
        no_ssl_verify: bool,

        /// Keep the archive on this machine after uploading it
        #[arg(long)]
        keep_archive: bool,

        /// Skip releases when migrating
        #[arg(long)]
        skip_releases: bool,

        /// Lock the source repository when migrating
        #[arg(long)]
        lock_source_repo: bool,

        /// Download the migration log for each repository migration
        #[arg(long)]
        download_migration_logs: bool,

        /// Wait for each migration to finish before starting the next one
        #[arg(long)]
        sequential: bool,

        /// Where to write the generated script
        #[arg(long, default_value = "./migrate.ps1")]
        output: PathBuf,

        /// Personal access token for the source. Overrides GH_SOURCE_PAT
        #[arg(long)]
        github_source_pat: Option<String>,

        /// Personal access token for the ADO source. Overrides ADO_PAT
        #[arg(long)]
        ado_pat: Option<String>,

        #[arg(long)]
        verbose: bool,
    },

    /// Migrate a single repository
    MigrateRepo {
        /// Source GitHub organization (github.com or GHES)
        #[arg(long)]
        github_source_org: Option<String>,

        /// Source Azure DevOps organization
        #[arg(long)]
        ado_source_org: Option<String>,

        /// Team project of the source repository (ADO sources only)
        #[arg(long)]
        ado_team_project: Option<String>,

        /// Required if migrating from ADO Server
        #[arg(long)]
        ado_server_url: Option<String>,

        /// Name of the repository on the source platform
        #[arg(long)]
        source_repo: String,

        /// Target GitHub organization
        #[arg(long)]
        github_target_org: String,

        /// Name of the repository on the target. Defaults to the resolved source name
        #[arg(long)]
        target_repo: Option<String>,

        /// Visibility of the target repository
        #[arg(long, default_value = "private")]
        target_repo_visibility: String,

        /// Required if migrating from GHES
        #[arg(long)]
        ghes_api_url: Option<String>,

        /// If using AWS, the name of the S3 bucket to upload the archive to
        #[arg(long)]
        aws_bucket_name: Option<String>,

        /// If using AWS, the AWS region of the bucket
        #[arg(long)]
        aws_region: Option<String>,

        /// Disable SSL verification when talking to the GHES instance
        #[arg(long)]
        no_ssl_verify: bool,

        /// Keep the archive on this machine after uploading it
        #[arg(long)]
        keep_archive: bool,

        /// Skip releases when migrating
        #[arg(long)]
        skip_releases: bool,

        /// Lock the source repository when migrating
        #[arg(long)]
        lock_source_repo: bool,

        /// Synchronously wait for the migration to finish (the default)
        #[arg(long, conflicts_with = "queue_only", hide = true)]
        wait: bool,

        /// Only queue the migration; wait-for-migration picks it up later
        #[arg(long)]
        queue_only: bool,

        /// Personal access token for the source. Overrides GH_SOURCE_PAT
        #[arg(long)]
        github_source_pat: Option<String>,

        /// Personal access token for the target. Overrides GH_PAT
        #[arg(long)]
        github_target_pat: Option<String>,

        /// Personal access token for the ADO source. Overrides ADO_PAT
        #[arg(long)]
        ado_pat: Option<String>,

        #[arg(long)]
        verbose: bool,
    },

    /// Enumerate, queue and wait on every migratable repository of an
    /// organization in one run
    MigrateOrg {
        /// Source GitHub organization (github.com or GHES)
        #[arg(long)]
        github_source_org: Option<String>,

        /// Source Azure DevOps organization
        #[arg(long)]
        ado_source_org: Option<String>,

        /// Restrict the ADO enumeration to a single team project
        #[arg(long)]
        ado_team_project: Option<String>,

        /// Required if migrating from ADO Server
        #[arg(long)]
        ado_server_url: Option<String>,

        /// Target GitHub organization
        #[arg(long)]
        github_target_org: String,

        /// Required if migrating from GHES
        #[arg(long)]
        ghes_api_url: Option<String>,

        /// If using AWS, the name of the S3 bucket to upload the archive to
        #[arg(long)]
        aws_bucket_name: Option<String>,

        /// If using AWS, the AWS region of the bucket
        #[arg(long)]
        aws_region: Option<String>,

        /// Disable SSL verification when talking to the GHES instance
        #[arg(long)]
        no_ssl_verify: bool,

        /// Keep the archive on this machine after uploading it
        #[arg(long)]
        keep_archive: bool,

        /// Skip releases when migrating
        #[arg(long)]
        skip_releases: bool,

        /// Lock each source repository when migrating
        #[arg(long)]
        lock_source_repo: bool,

        /// Download the migration log for each repository migration
        #[arg(long)]
        download_migration_logs: bool,

        /// Wait for each migration to finish before starting the next one
        #[arg(long)]
        sequential: bool,

        /// Concurrent queue submissions in parallel mode
        #[arg(long, default_value_t = 4, hide = true)]
        queue_concurrency: usize,

        /// Seconds between status polls
        #[arg(long, default_value_t = 10, hide = true)]
        poll_interval: u64,

        /// Seconds before a non-terminal migration counts as failed
        #[arg(long, default_value_t = 4 * 60 * 60, hide = true)]
        max_wait: u64,

        /// Personal access token for the source. Overrides GH_SOURCE_PAT
        #[arg(long)]
        github_source_pat: Option<String>,

        /// Personal access token for the target. Overrides GH_PAT
        #[arg(long)]
        github_target_pat: Option<String>,

        /// Personal access token for the ADO source. Overrides ADO_PAT
        #[arg(long)]
        ado_pat: Option<String>,

        #[arg(long)]
        verbose: bool,
    },

    /// Wait for a queued migration to finish and report its outcome
    WaitForMigration {
        /// The migration to wait for
        #[arg(long)]
        migration_id: String,

        /// Seconds between status polls
        #[arg(long, default_value_t = 10, hide = true)]
        poll_interval: u64,

        /// Seconds before a non-terminal migration counts as failed
        #[arg(long, default_value_t = 4 * 60 * 60, hide = true)]
        max_wait: u64,

        /// Personal access token for the target. Overrides GH_PAT
        #[arg(long)]
        github_pat: Option<String>,

        #[arg(long)]
        verbose: bool,
    },

    /// Download the migration log for a migrated repository
    DownloadLogs {
        /// Target GitHub organization
        #[arg(long)]
        github_target_org: String,

        /// Name of the migrated repository
        #[arg(long)]
        target_repo: String,

        /// Where to write the log. Defaults to migration-log-<org>-<repo>.log
        #[arg(long)]
        migration_log_file: Option<PathBuf>,

        /// Personal access token for the target. Overrides GH_PAT
        #[arg(long)]
        github_pat: Option<String>,

        #[arg(long)]
        verbose: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Ctrl-C flips the shutdown channel; in-flight work observes it within
/// one polling interval.
fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight work");
            let _ = tx.send(true);
        }
    });
    rx
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::GenerateScript {
            github_source_org,
            ado_source_org,
            ado_team_project,
            ado_server_url,
            github_target_org,
            ghes_api_url,
            aws_bucket_name,
            aws_region,
            no_ssl_verify,
            keep_archive,
            skip_releases,
            lock_source_repo,
            download_migration_logs,
            sequential,
            output,
            github_source_pat,
            ado_pat,
            verbose,
        } => {
            init_tracing(verbose);
            let source = validate_source_args(
                github_source_org.as_deref(),
                ado_source_org.as_deref(),
                ado_team_project.as_deref(),
                ado_server_url.clone(),
            )?;
            let ghes = validate_ghes_args(
                ghes_api_url,
                aws_bucket_name,
                aws_region,
                no_ssl_verify,
                keep_archive,
            )?;
            let options = MigrationOptions {
                target_org: github_target_org,
                ghes,
                skip_releases,
                lock_source_repo,
                download_migration_logs,
                sequential,
                verbose,
            };
            cmd_generate_script(
                source,
                options,
                ado_team_project.as_deref(),
                output,
                github_source_pat.as_deref(),
                ado_pat.as_deref(),
            )
            .await
        }

        Commands::MigrateRepo {
            github_source_org,
            ado_source_org,
            ado_team_project,
            ado_server_url,
            source_repo,
            github_target_org,
            target_repo,
            target_repo_visibility,
            ghes_api_url,
            aws_bucket_name,
            aws_region,
            no_ssl_verify,
            keep_archive,
            skip_releases,
            lock_source_repo,
            wait: _,
            queue_only,
            github_source_pat,
            github_target_pat,
            ado_pat,
            verbose,
        } => {
            init_tracing(verbose);
            let source = validate_source_args(
                github_source_org.as_deref(),
                ado_source_org.as_deref(),
                ado_team_project.as_deref(),
                ado_server_url,
            )?;
            if matches!(source, SourceDescriptor::AzureDevOps { .. })
                && ado_team_project.is_none()
            {
                bail!("--ado-team-project is required when migrating from Azure DevOps");
            }
            let ghes = validate_ghes_args(
                ghes_api_url,
                aws_bucket_name,
                aws_region,
                no_ssl_verify,
                keep_archive,
            )?;
            let options = MigrationOptions {
                target_org: github_target_org,
                ghes,
                skip_releases,
                lock_source_repo,
                sequential: true,
                verbose,
                ..Default::default()
            };
            cmd_migrate_repo(
                source,
                options,
                source_repo,
                ado_team_project,
                target_repo,
                &target_repo_visibility,
                queue_only,
                github_source_pat.as_deref(),
                github_target_pat.as_deref(),
                ado_pat.as_deref(),
            )
            .await
        }

        Commands::MigrateOrg {
            github_source_org,
            ado_source_org,
            ado_team_project,
            ado_server_url,
            github_target_org,
            ghes_api_url,
            aws_bucket_name,
            aws_region,
            no_ssl_verify,
            keep_archive,
            skip_releases,
            lock_source_repo,
            download_migration_logs,
            sequential,
            queue_concurrency,
            poll_interval,
            max_wait,
            github_source_pat,
            github_target_pat,
            ado_pat,
            verbose,
        } => {
            init_tracing(verbose);
            let source = validate_source_args(
                github_source_org.as_deref(),
                ado_source_org.as_deref(),
                ado_team_project.as_deref(),
                ado_server_url,
            )?;
            let ghes = validate_ghes_args(
                ghes_api_url,
                aws_bucket_name,
                aws_region,
                no_ssl_verify,
                keep_archive,
            )?;
            let options = MigrationOptions {
                target_org: github_target_org,
                ghes,
                skip_releases,
                lock_source_repo,
                download_migration_logs,
                sequential,
                verbose,
            };
            let wait = WaitOptions {
                poll_interval: Duration::from_secs(poll_interval),
                max_wait: Duration::from_secs(max_wait),
            };
            cmd_migrate_org(
                source,
                options,
                ado_team_project.as_deref(),
                wait,
                queue_concurrency,
                github_source_pat.as_deref(),
                github_target_pat.as_deref(),
                ado_pat.as_deref(),
            )
            .await
        }

        Commands::WaitForMigration {
            migration_id,
            poll_interval,
            max_wait,
            github_pat,
            verbose,
        } => {
            init_tracing(verbose);
            let wait = WaitOptions {
                poll_interval: Duration::from_secs(poll_interval),
                max_wait: Duration::from_secs(max_wait),
            };
            cmd_wait_for_migration(&migration_id, wait, github_pat.as_deref()).await
        }

        Commands::DownloadLogs {
            github_target_org,
            target_repo,
            migration_log_file,
            github_pat,
            verbose,
        } => {
            init_tracing(verbose);
            cmd_download_logs(
                &github_target_org,
                &target_repo,
                migration_log_file,
                github_pat.as_deref(),
            )
            .await
        }
    }
}

/// Exactly one source family, with its dependent flags coherent.
fn validate_source_args(
    github_source_org: Option<&str>,
    ado_source_org: Option<&str>,
    ado_team_project: Option<&str>,
    ado_server_url: Option<String>,
) -> Result<SourceDescriptor> {
    match (github_source_org, ado_source_org) {
        (Some(_), Some(_)) => {
            bail!("--github-source-org and --ado-source-org cannot both be provided")
        }
        (Some(org), None) => {
            if ado_team_project.is_some() {
                bail!("--ado-team-project can only be used with --ado-source-org");
            }
            if ado_server_url.is_some() {
                bail!("--ado-server-url can only be used with --ado-source-org");
            }
            Ok(SourceDescriptor::Github { org: org.into() })
        }
        (None, Some(org)) => Ok(SourceDescriptor::AzureDevOps {
            org: org.into(),
            server_url: ado_server_url,
        }),
        (None, None) => {
            bail!("either --github-source-org or --ado-source-org must be provided")
        }
    }
}

/// GHES blob-storage flags only make sense alongside --ghes-api-url.
fn validate_ghes_args(
    ghes_api_url: Option<String>,
    aws_bucket_name: Option<String>,
    aws_region: Option<String>,
    no_ssl_verify: bool,
    keep_archive: bool,
) -> Result<Option<GhesOptions>> {
    let Some(api_url) = ghes_api_url else {
        if aws_bucket_name.is_some() {
            bail!("--aws-bucket-name can only be used with --ghes-api-url");
        }
        if aws_region.is_some() {
            bail!("--aws-region can only be used with --ghes-api-url");
        }
        if no_ssl_verify {
            bail!("--no-ssl-verify can only be used with --ghes-api-url");
        }
        if keep_archive {
            bail!("--keep-archive can only be used with --ghes-api-url");
        }
        return Ok(None);
    };

    url::Url::parse(&api_url).context("--ghes-api-url is not a valid URL")?;

    Ok(Some(GhesOptions {
        api_url,
        aws_bucket_name,
        aws_region,
        no_ssl_verify,
        keep_archive,
    }))
}

async fn enumerate(
    source: &SourceDescriptor,
    options: &MigrationOptions,
    ado_team_project: Option<&str>,
    github_source_pat: Option<&str>,
    ado_pat: Option<&str>,
) -> Result<Inventory> {
    match source {
        SourceDescriptor::Github { org } => {
            let pat = credentials::github_source_pat(github_source_pat, None)?;
            let github = match options.ghes.as_ref() {
                Some(ghes) => GithubSource::with_api_url(pat, &ghes.api_url)?,
                None => GithubSource::new(pat)?,
            };
            Ok(github.enumerate(org).await?)
        }
        SourceDescriptor::AzureDevOps { org, server_url } => {
            let pat = credentials::ado_pat(ado_pat)?;
            let ado = match server_url {
                Some(server_url) => AdoClient::with_server(pat, server_url.clone()),
                None => AdoClient::new(pat),
            };
            Ok(ado.enumerate(org, ado_team_project).await?)
        }
    }
}

async fn cmd_generate_script(
    source: SourceDescriptor,
    options: MigrationOptions,
    ado_team_project: Option<&str>,
    output: PathBuf,
    github_source_pat: Option<&str>,
    ado_pat: Option<&str>,
) -> Result<()> {
    info!("Generating Script...");

    let inventory = enumerate(&source, &options, ado_team_project, github_source_pat, ado_pat)
        .await
        .context("Failed to enumerate source repositories")?;

    let plan = Planner::new(source, options)
        .build(&inventory)
        .context("A migration script could not be generated")?;

    let script = ScriptRenderer::new(&plan, VERSION).render();
    std::fs::write(&output, script)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Script written to {}", output.display());

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_migrate_repo(
    source: SourceDescriptor,
    options: MigrationOptions,
    source_repo: String,
    ado_team_project: Option<String>,
    target_repo: Option<String>,
    target_repo_visibility: &str,
    queue_only: bool,
    github_source_pat: Option<&str>,
    github_target_pat: Option<&str>,
    ado_pat: Option<&str>,
) -> Result<()> {
    let repo = match &ado_team_project {
        Some(project) => SourceRepo {
            name: source_repo,
            team_project: Some(project.clone()),
            visibility: Visibility::parse(target_repo_visibility),
        },
        None => SourceRepo::flat(source_repo, Visibility::parse(target_repo_visibility)),
    };

    let target_repo = target_repo.unwrap_or_else(|| match (&ado_team_project, &repo.name) {
        (Some(project), name) => ado_target_repo_name(project, name),
        (None, name) => name.clone(),
    });

    let source_pat = match source {
        SourceDescriptor::Github { .. } => {
            credentials::github_source_pat(github_source_pat, github_target_pat)?
        }
        SourceDescriptor::AzureDevOps { .. } => credentials::ado_pat(ado_pat)?,
    };
    let target_pat = credentials::github_target_pat(github_target_pat)?;
    let api = GithubMigrationClient::new(target_pat, source_pat);

    let request = StartMigrationRequest {
        source_repo_url: source.repo_url(&repo),
        target_org: options.target_org.clone(),
        target_repo: target_repo.clone(),
        visibility: repo.visibility,
        skip_releases: options.skip_releases,
        lock_source: options.lock_source_repo,
    };

    let migration_id = api
        .start_migration(&request)
        .await
        .context("Failed to queue migration")?;
    // The "(ID: ...)" shape is what generated scripts scrape for.
    info!("Migration queued for {} (ID: {})", target_repo, migration_id);

    if queue_only {
        return Ok(());
    }

    let supervisor = Supervisor::new(api).shutdown_signal(shutdown_channel());
    match supervisor.wait_for(&migration_id).await {
        JobState::Succeeded => Ok(()),
        _ => std::process::exit(1),
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_migrate_org(
    source: SourceDescriptor,
    options: MigrationOptions,
    ado_team_project: Option<&str>,
    wait: WaitOptions,
    queue_concurrency: usize,
    github_source_pat: Option<&str>,
    github_target_pat: Option<&str>,
    ado_pat: Option<&str>,
) -> Result<()> {
    // Resolve the full credential chain up front; a missing token
    // should fail the run before any remote call is made.
    let source_pat = match source {
        SourceDescriptor::Github { .. } => {
            credentials::github_source_pat(github_source_pat, github_target_pat)?
        }
        SourceDescriptor::AzureDevOps { .. } => credentials::ado_pat(ado_pat)?,
    };
    let target_pat = credentials::github_target_pat(github_target_pat)?;

    let inventory = enumerate(&source, &options, ado_team_project, github_source_pat, ado_pat)
        .await
        .context("Failed to enumerate source repositories")?;

    let plan = Planner::new(source, options).build(&inventory)?;
    info!("Migrating {} repositories", plan.job_count());

    let api = GithubMigrationClient::new(target_pat, source_pat);
    let supervisor = Supervisor::new(api)
        .wait_options(wait)
        .max_queue_concurrency(queue_concurrency)
        .shutdown_signal(shutdown_channel());

    let report = supervisor.run(plan).await;
    for line in render_summary(&report.result).lines() {
        info!("{}", line);
    }

    if report.result.is_failure() {
        std::process::exit(report.result.exit_code());
    }
    Ok(())
}

async fn cmd_wait_for_migration(
    migration_id: &str,
    wait: WaitOptions,
    github_pat: Option<&str>,
) -> Result<()> {
    let target_pat = credentials::github_target_pat(github_pat)?;
    let api = GithubMigrationClient::new(target_pat, String::new());

    let supervisor = Supervisor::new(api)
        .wait_options(wait)
        .shutdown_signal(shutdown_channel());

    match supervisor.wait_for(migration_id).await {
        JobState::Succeeded => Ok(()),
        _ => std::process::exit(1),
    }
}

async fn cmd_download_logs(
    github_target_org: &str,
    target_repo: &str,
    migration_log_file: Option<PathBuf>,
    github_pat: Option<&str>,
) -> Result<()> {
    let target_pat = credentials::github_target_pat(github_pat)?;
    let api = GithubMigrationClient::new(target_pat, String::new());

    let url = api
        .get_migration_log_url(github_target_org, target_repo)
        .await
        .context("Failed to look up the migration log")?
        .with_context(|| format!("No migration log available for {target_repo}"))?;

    let path = migration_log_file.unwrap_or_else(|| {
        PathBuf::from(format!("migration-log-{github_target_org}-{target_repo}.log"))
    });

    // Log URLs are pre-signed; no authentication needed for the fetch.
    let log = reqwest::get(&url).await?.error_for_status()?.text().await?;
    std::fs::write(&path, log)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Migration log downloaded to {}", path.display());

    Ok(())
}
