//! nbverify CLI - batch verification of Jupyter notebook corpora.

mod colors;
mod progress;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

/// Exit status for configuration errors, matching clap's usage errors.
const EXIT_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(name = "nbverify")]
#[command(about = "Check that a directory of Jupyter notebooks is well-formed and runs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and execute every notebook
    Run {
        #[command(flatten)]
        corpus: CorpusArgs,

        #[command(flatten)]
        execution: ExecutionArgs,
    },

    /// Validate notebook structure without executing anything
    Check {
        #[command(flatten)]
        corpus: CorpusArgs,
    },
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct CorpusArgs {
    /// Directory containing the notebooks
    pub dir: PathBuf,

    /// Include notebooks in subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Number of failures tolerated before the remaining notebooks are skipped
    #[arg(long, value_name = "N")]
    pub max_failures: Option<usize>,

    /// Write the results as JSON
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write one <name>_error.txt per failing notebook into this directory
    #[arg(long, value_name = "DIR")]
    pub failure_dir: Option<PathBuf>,

    /// Treat lint warnings as failures
    #[arg(long)]
    pub strict: bool,
}

/// Options controlling notebook execution.
#[derive(Args, Debug)]
pub struct ExecutionArgs {
    /// Wall-clock limit per notebook, in seconds (at least 2, so a smaller per-cell limit fits)
    #[arg(
        short,
        long,
        default_value = "600",
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(2..)
    )]
    pub timeout: u64,

    /// Limit per cell, in seconds (default 60, or half the timeout if that is smaller)
    #[arg(long, value_name = "SECS")]
    pub cell_timeout: Option<u64>,

    /// Kernel used when the notebook's own kernel cannot be started
    #[arg(long, default_value = nbverify_core::execute::DEFAULT_KERNEL)]
    pub kernel: String,

    /// Path of the jupyter executable (defaults to $NBVERIFY_JUPYTER, then PATH)
    #[arg(long, value_name = "PATH")]
    pub jupyter: Option<PathBuf>,

    /// Number of notebooks executed at once
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    pub jobs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Commands::Run { corpus, execution } => {
            run::execute(&corpus, &execution, cli.verbose).await
        }
        Commands::Check { corpus } => run::check(&corpus, cli.verbose).await,
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(err) => report_error(err),
    }
}

/// Print an error with its recovery hint and pick the exit status.
fn report_error(err: anyhow::Error) -> ExitCode {
    match err.downcast_ref::<nbverify_core::Error>() {
        Some(core_err) => {
            eprintln!("{}error:{} {}", colors::RED, colors::RESET, core_err.with_hint());
            match core_err {
                nbverify_core::Error::Config(_) | nbverify_core::Error::ToolNotFound(_) => {
                    ExitCode::from(EXIT_CONFIG)
                }
                _ => ExitCode::FAILURE,
            }
        }
        None => {
            eprintln!("{}error:{} {:#}", colors::RED, colors::RESET, err);
            ExitCode::FAILURE
        }
    }
}
