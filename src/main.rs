use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use shipshape::classify::{JobObservation, JobStatus, Stage, classify_failed_stage};
use shipshape::config::Config;
use shipshape::scanner::GapReport;
use shipshape::scoring::MaturityLevel;
use shipshape::service::Service;
use shipshape::store::SecretScope;

#[derive(Parser)]
#[command(name = "shipshape", version, about = "Repository maturity scanning and secret provisioning for GitHub App installations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a repository URL for DevOps artifact gaps and score the result.
    Scan {
        /// Repository URL, e.g. https://github.com/acme/widgets
        url: String,
        #[arg(long, default_value = "main")]
        branch: String,
    },
    /// Score a gap report passed as flags (no network access).
    Score {
        #[arg(long)]
        dockerfile: bool,
        #[arg(long)]
        ci: bool,
        #[arg(long)]
        readme: bool,
        #[arg(long)]
        tests: bool,
    },
    /// Link a GitHub App installation and sync its repository list.
    Link {
        installation_id: i64,
    },
    /// Manage encrypted secrets for an installation or repository scope.
    Secret {
        #[command(subcommand)]
        command: SecretCommand,
    },
    /// Provision a repository's stored secrets to GitHub Actions.
    Sync {
        installation_id: i64,
        /// Target repository as owner/repo.
        repo: String,
    },
    /// Classify a CI job outcome from its status and failed stage.
    Classify {
        #[arg(long, value_enum, default_value_t = CliJobStatus::Failure)]
        status: CliJobStatus,
        /// Canonical stage name, e.g. TEST or DOCKER_BUILD.
        #[arg(long)]
        stage: Option<String>,
    },
}

#[derive(Subcommand)]
enum SecretCommand {
    Set {
        key: String,
        value: String,
        #[arg(long, conflicts_with = "installation")]
        repo: Option<String>,
        #[arg(long)]
        installation: Option<i64>,
    },
    List {
        #[arg(long, conflicts_with = "installation")]
        repo: Option<String>,
        #[arg(long)]
        installation: Option<i64>,
    },
    Delete {
        key: String,
        #[arg(long, conflicts_with = "installation")]
        repo: Option<String>,
        #[arg(long)]
        installation: Option<i64>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliJobStatus {
    Success,
    Failure,
}

fn scope_from_args(
    repo: Option<String>,
    installation: Option<i64>,
) -> anyhow::Result<SecretScope> {
    match (repo, installation) {
        (Some(full_name), None) => Ok(SecretScope::Repository(full_name)),
        (None, Some(id)) => Ok(SecretScope::Installation(id)),
        _ => anyhow::bail!("exactly one of --repo or --installation is required"),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("SHIPSHAPE_LOG").unwrap_or_else(|_| "warn".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load();

    match cli.command {
        Command::Scan { url, branch } => {
            let service = Service::new(config)?;
            let (repo, gaps) = service.scan(&url, &branch).await?;
            let report = Service::score(gaps);
            let level = MaturityLevel::from_score(report.total_score);
            print_json(&serde_json::json!({
                "repository": format!("{}/{}", repo.owner, repo.repo),
                "gaps": gaps,
                "maturity": report,
                "level": level,
            }))?;
        }
        Command::Score {
            dockerfile,
            ci,
            readme,
            tests,
        } => {
            let report = Service::score(GapReport {
                dockerfile,
                ci,
                readme,
                tests,
            });
            print_json(&report)?;
        }
        Command::Link { installation_id } => {
            let service = Service::new(config)?;
            let installation = service.link_installation(installation_id).await?;
            print_json(&installation)?;
        }
        Command::Secret { command } => {
            let service = Service::new(config)?;
            match command {
                SecretCommand::Set {
                    key,
                    value,
                    repo,
                    installation,
                } => {
                    let scope = scope_from_args(repo, installation)?;
                    service.upsert_secret(&scope, &key, &value).await?;
                    println!("ok");
                }
                SecretCommand::List { repo, installation } => {
                    let scope = scope_from_args(repo, installation)?;
                    print_json(&service.list_secrets(&scope).await?)?;
                }
                SecretCommand::Delete {
                    key,
                    repo,
                    installation,
                } => {
                    let scope = scope_from_args(repo, installation)?;
                    service.delete_secret(&scope, &key).await?;
                    println!("ok");
                }
            }
        }
        Command::Sync {
            installation_id,
            repo,
        } => {
            let service = Service::new(config)?;
            let outcome = service.sync_secrets(installation_id, &repo).await?;
            print_json(&outcome)?;
        }
        Command::Classify { status, stage } => {
            let classification = match status {
                CliJobStatus::Success => Service::classify(&JobObservation {
                    status: JobStatus::Success,
                    steps: vec![],
                }),
                CliJobStatus::Failure => {
                    let stage = stage
                        .map(|s| {
                            serde_json::from_value::<Stage>(serde_json::Value::String(s))
                                .unwrap_or(Stage::Unknown)
                        })
                        .unwrap_or(Stage::Unknown);
                    classify_failed_stage(stage)
                }
            };
            print_json(&classification)?;
        }
    }

    Ok(())
}
