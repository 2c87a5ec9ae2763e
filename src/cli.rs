// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use zeroshift::deploy::DEFAULT_LOG_LINES;
use zeroshift::output::OutputMode;

#[derive(Parser)]
#[command(name = "zeroshift")]
#[command(about = "Blue-green deployments for containerized applications")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to the configuration file (default: discovered in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new zeroshift.yml configuration file
    Init {
        /// Id of the first project
        #[arg(short, long)]
        project: Option<String>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Deploy an image to a project
    Deploy {
        project: String,
        image: String,
    },

    /// Roll a project back to its previous version
    Rollback { project: String },

    /// List deployments, newest first
    List {
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Show a project's active deployment
    Status { project: String },

    /// Recover interrupted deploys and invalidate dead active containers
    Reconcile,

    /// Print recent output of a project's container
    Logs {
        project: String,

        /// Number of lines from the end
        #[arg(short = 'n', long, default_value_t = DEFAULT_LOG_LINES)]
        tail: usize,
    },

    /// Show resource usage of a project's active container
    Metrics { project: String },
}
