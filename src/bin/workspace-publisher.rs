//! Workspace Publisher CLI
//!
//! Publishes the workspace packages whose local version is not yet on the
//! registry and waits until the registry shows them.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{Level, error, info, warn};
use workspace_publisher::core::{
    CancellationToken, ConfigLoadOptions, ConfigLoader, ConfigOverrides, DispatchTarget,
    PackageDescriptor, PublishError, RegistryClientKind,
};
use workspace_publisher::telemetry::init_tracing;
use workspace_publisher::{PluginLoader, PublishOrchestrator, SecureTokenManager};

/// Monorepo publishing helper
#[derive(Parser)]
#[command(name = "workspace-publisher")]
#[command(version)]
#[command(
    about = "Publish unpublished workspace packages and wait for the registry",
    long_about = None
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch a publish for new versions and confirm them on the registry
    Publish {
        /// JSON file with the workspace packages ([{name, version, dir, private}])
        #[arg(long, value_name = "FILE")]
        packages: PathBuf,

        /// Workspace root (defaults to current directory)
        #[arg(long, value_name = "PROJECT_PATH")]
        project_path: Option<PathBuf>,

        /// Comma-separated package names to leave out
        #[arg(long, value_delimiter = ',')]
        skip: Vec<String>,

        /// Config file (defaults to <PROJECT_PATH>/.publish-config.yaml)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Registry base URL
        #[arg(long)]
        registry_url: Option<String>,

        /// Registry lookup (http, pnpm, npm)
        #[arg(long)]
        registry_client: Option<String>,

        /// Confirmation rounds before giving up
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Delay between confirmation rounds in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Publish trigger (github, step-output)
        #[arg(long)]
        dispatch: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(
        cli.json_logs,
        if cli.verbose { Level::DEBUG } else { Level::INFO },
    );

    let exit_code = match run(cli.command).await {
        Ok(()) => 0,
        Err(e) => {
            report_error(&e);
            1
        }
    };
    process::exit(exit_code);
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Publish {
            packages,
            project_path,
            skip,
            config,
            registry_url,
            registry_client,
            max_attempts,
            delay_ms,
            dispatch,
        } => {
            let overrides = ConfigOverrides {
                registry_url,
                registry_client: registry_client
                    .map(|value| {
                        RegistryClientKind::parse(&value).ok_or_else(|| {
                            PublishError::Config(format!(
                                "--registry-client: unknown client '{}'",
                                value
                            ))
                        })
                    })
                    .transpose()?,
                max_attempts,
                delay_ms,
                dispatch_target: dispatch
                    .map(|value| {
                        DispatchTarget::parse(&value).ok_or_else(|| {
                            PublishError::Config(format!("--dispatch: unknown target '{}'", value))
                        })
                    })
                    .transpose()?,
                skip: (!skip.is_empty()).then_some(skip),
            };

            publish_command(
                project_path.unwrap_or_else(|| PathBuf::from(".")),
                packages,
                config,
                overrides,
            )
            .await
        }
    }
}

async fn read_descriptors(path: &Path) -> Result<Vec<PackageDescriptor>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    serde_json::from_str(&content).map_err(|e| {
        PublishError::Config(format!("{}: invalid package list: {}", path.display(), e)).into()
    })
}

async fn publish_command(
    project_path: PathBuf,
    packages: PathBuf,
    config_file: Option<PathBuf>,
    overrides: ConfigOverrides,
) -> Result<()> {
    let env: HashMap<String, String> = std::env::vars().collect();

    let config = ConfigLoader::load(ConfigLoadOptions {
        project_path: project_path.clone(),
        config_file,
        env: env.clone(),
        overrides,
    })
    .await?;

    let descriptors = read_descriptors(&packages).await?;
    info!(
        packages = descriptors.len(),
        registry = %config.registry.url,
        dispatch = config.dispatch.target.as_str(),
        "starting publish"
    );

    let plugins = PluginLoader::new(&project_path).load(&config, SecureTokenManager::new(env))?;
    let orchestrator = PublishOrchestrator::from_plugins(&config, plugins);

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling publish run");
            signal.cancel();
        }
    });

    let outcomes = orchestrator.run_with_cancel(&descriptors, &cancel).await?;

    if outcomes.is_empty() {
        warn!("No unpublished projects to publish");
        return Ok(());
    }

    info!(count = outcomes.len(), "packages published successfully");
    for outcome in &outcomes {
        info!("  {}@{}", outcome.name, outcome.new_version);
    }
    Ok(())
}

fn report_error(e: &anyhow::Error) {
    match e.downcast_ref::<PublishError>() {
        Some(publish_error) => {
            let packages = publish_error.affected_packages();
            if packages.is_empty() {
                error!(code = publish_error.code(), "{}", publish_error);
            } else {
                error!(code = publish_error.code(), packages = ?packages, "{}", publish_error);
            }
            for action in publish_error.suggested_actions() {
                warn!("  - {}", action);
            }
            if publish_error.is_recoverable() {
                info!("この失敗は一時的な可能性があります。同じ内容で再実行できます");
            }
        }
        None => error!("{:#}", e),
    }
}
