// ABOUTME: Entry point for the zeroshift CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::App;
use std::env;
use tracing_subscriber::EnvFilter;
use zeroshift::config;
use zeroshift::error::Result;
use zeroshift::output::Output;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let output = Output::new(cli.output_mode());
    let error_output = Output::new(cli.output_mode());

    if let Err(e) = run(cli, output).await {
        error_output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let cwd = env::current_dir()?;

    if let Commands::Init { project, force } = &cli.command {
        let path = config::init_config(&cwd, project.as_deref(), *force)?;
        output.success(&format!("Created {}", path.display()));
        return Ok(());
    }

    let app = App::open(&cwd, cli.config.as_deref()).await?;
    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Deploy { project, image } => {
            commands::deploy(app, &project, &image, output).await
        }
        Commands::Rollback { project } => commands::rollback(app, &project, output).await,
        Commands::List { project } => commands::list(app, project.as_deref(), output).await,
        Commands::Status { project } => commands::status(app, &project, output).await,
        Commands::Reconcile => commands::reconcile(app, output).await,
        Commands::Logs { project, tail } => commands::logs(app, &project, tail, output).await,
        Commands::Metrics { project } => commands::metrics(app, &project, output).await,
    }
}
