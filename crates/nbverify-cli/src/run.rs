//! Run and check command implementations.
//!
//! Both commands drive a [`BatchRunner`] over the corpus, print the summary
//! and persist whatever the user asked for. Ctrl-C stops the run early but
//! still goes through the summary and persistence path.

use std::time::{Duration, Instant};

use nbverify_core::discover::Depth;
use nbverify_core::execute::{default_cell_timeout, locate_tool};
use nbverify_core::{
    AbortHandle, BatchRunner, ExecutionConfig, ExecutionDriver, InvocationStrategy, RunConfig,
    RunReport,
};

use crate::colors;
use crate::progress::ProgressCallback;
use crate::{CorpusArgs, ExecutionArgs};

/// Validate and execute every notebook in the corpus.
pub async fn execute(corpus: &CorpusArgs, execution: &ExecutionArgs, verbose: bool) -> anyhow::Result<u8> {
    let program = locate_tool(execution.jupyter.as_deref())?;
    let timeout = Duration::from_secs(execution.timeout);
    let cell_timeout = execution
        .cell_timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| default_cell_timeout(timeout));

    let config = ExecutionConfig::new(&program, timeout, cell_timeout)?
        .with_strategies(InvocationStrategy::default_chain(&execution.kernel))?;
    let driver = ExecutionDriver::new(config);

    let mut run_config = run_config(corpus);
    run_config.jobs = usize::try_from(execution.jobs).unwrap_or(1);

    print_header("Running", corpus);
    println!(
        "{}Tool:{} {} {}(timeout {}s, cell timeout {}s, kernel {}){}",
        colors::DIM,
        colors::RESET,
        program.display(),
        colors::DIM,
        timeout.as_secs(),
        cell_timeout.as_secs(),
        execution.kernel,
        colors::RESET
    );

    let runner = BatchRunner::new(run_config);
    let watcher = watch_interrupt(runner.abort_handle());
    let start = Instant::now();
    let report = runner.run(&driver, &ProgressCallback::new(verbose)).await;
    watcher.abort();

    finish(report, corpus, start)
}

/// Validate every notebook without executing anything.
pub async fn check(corpus: &CorpusArgs, verbose: bool) -> anyhow::Result<u8> {
    print_header("Checking", corpus);

    let runner = BatchRunner::new(run_config(corpus));
    let watcher = watch_interrupt(runner.abort_handle());
    let start = Instant::now();
    let report = runner.check(&ProgressCallback::new(verbose)).await;
    watcher.abort();

    finish(report, corpus, start)
}

fn run_config(corpus: &CorpusArgs) -> RunConfig {
    let mut config = RunConfig::new(&corpus.dir);
    config.depth = if corpus.recursive {
        Depth::Recursive
    } else {
        Depth::Shallow
    };
    config.max_failures = corpus.max_failures;
    config.strict = corpus.strict;
    config
}

fn print_header(action: &str, corpus: &CorpusArgs) {
    println!(
        "\n{}{}{} {}{}",
        colors::BOLD,
        action,
        colors::RESET,
        corpus.dir.display(),
        if corpus.recursive { " (recursive)" } else { "" }
    );
}

/// Trip `handle` on the first Ctrl-C.
fn watch_interrupt(handle: AbortHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping run");
            handle.abort();
        }
    })
}

/// Print the summary, write the requested files and pick the exit status.
fn finish(report: RunReport, corpus: &CorpusArgs, start: Instant) -> anyhow::Result<u8> {
    let summary = report.results.summary();
    println!("\n{}", summary.render());
    println!(
        "{}Finished in {:.2}s{}",
        colors::DIM,
        start.elapsed().as_secs_f64(),
        colors::RESET
    );

    if let Some(output) = &corpus.output {
        report.results.persist(output, report.metadata.clone())?;
        println!("Results written to {}", output.display());
    }

    if let Some(dir) = &corpus.failure_dir {
        let written = report.results.write_failure_details(dir)?;
        if !written.is_empty() {
            println!(
                "Wrote {} failure report(s) to {}",
                written.len(),
                dir.display()
            );
        }
    }

    Ok(u8::try_from(report.exit_code()).unwrap_or(1))
}
