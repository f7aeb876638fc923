use anyhow::{Context, Result};
use buildrelay::cli::commands::{BranchesCommand, RunCommand, ServeCommand};
use buildrelay::cli::output::{format_branch, format_status, style, CHECK, CROSS, INFO, ROCKET};
use buildrelay::cli::terminal_output::TerminalSink;
use buildrelay::cli::{Cli, Command};
use buildrelay::repo::{GitClient, RepositoryOps};
use buildrelay::{server, AppConfig, ExecutionStatus, PipelineOrchestrator};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // RUST_LOG wins over --verbose
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Serve(cmd) => serve(cmd).await?,
        Command::Branches(cmd) => list_branches(cmd).await?,
        Command::Run(cmd) => run_pipeline(cmd).await?,
    }

    Ok(())
}

async fn serve(cmd: &ServeCommand) -> Result<()> {
    let mut config = AppConfig::load(&cmd.config);
    if let Some(port) = &cmd.port {
        config.server.port = port.clone();
    }
    server::serve(config).await
}

async fn list_branches(cmd: &BranchesCommand) -> Result<()> {
    let config = AppConfig::load(&cmd.config);
    let identity = config
        .identity(&cmd.git_config)
        .with_context(|| format!("Unknown repository configuration: {}", cmd.git_config))?;

    let client = GitClient::new(config.scripts.interpreter.clone());
    let branches = client
        .list_branches(identity)
        .await
        .context("Failed to list branches")?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&branches)?);
        return Ok(());
    }

    if branches.is_empty() {
        println!("{} No branches found", INFO);
        return Ok(());
    }

    println!(
        "{} Branches of {}:",
        INFO,
        style(&cmd.git_config).bold()
    );
    for branch in &branches {
        println!("{}", format_branch(branch));
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let config = AppConfig::load(&cmd.config);
    config
        .workspace
        .create_dirs()
        .context("Failed to create workspace directories")?;

    let request = cmd.to_request();
    println!(
        "{} Running {} on {} ({})",
        ROCKET,
        style(&request.git_config).bold(),
        style(&request.branch).cyan(),
        style(
            request
                .enabled_stages()
                .iter()
                .map(|stage| stage.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
        .dim()
    );

    let client = GitClient::new(config.scripts.interpreter.clone());
    let orchestrator = PipelineOrchestrator::new(client, Arc::new(config));

    // Ctrl-C cancels the run and kills its script
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling run");
            ctrl_c.cancel();
        }
    });

    let sink = Arc::new(TerminalSink::new());
    let state = orchestrator.execute(&request, sink.clone(), cancel).await;
    sink.finish();

    if state.status == ExecutionStatus::Completed {
        println!(
            "\n{} {} {} ({}%)",
            CHECK,
            style(&request.branch).bold(),
            format_status(state.status),
            state.progress
        );
        Ok(())
    } else {
        println!(
            "\n{} {} {}",
            CROSS,
            style(&request.branch).bold(),
            format_status(state.status)
        );
        std::process::exit(1);
    }
}
