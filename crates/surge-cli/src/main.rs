mod cli;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use surge_core::engine::{run_test, EngineConfig, EngineEvent};
use surge_core::results::export::{export_json, export_text, write_summary};
use surge_core::scenario::{
    format_duration, read_scenario, validate_scenario, write_scenario, ScenarioConfig,
};
use surge_core::SurgeError;

use crate::cli::{Cli, Command, OutputFormat, RunArgs};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            let code = e
                .downcast_ref::<SurgeError>()
                .map(SurgeError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

/// Logs go to stderr; stdout carries only the report.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "surge=debug,surge_core=debug"
    } else {
        "surge=info,surge_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => run(args).await,
        Command::Validate { scenario } => validate(&scenario).await,
        Command::Init { path, force } => init(&path, force).await,
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn run(args: RunArgs) -> Result<()> {
    let scenario = args.build_scenario().await.context("loading scenario")?;

    let (event_tx, event_rx) = mpsc::channel(1024);
    let mut config = EngineConfig::new(scenario);
    config.event_tx = Some(event_tx);

    let handle = run_test(config).await?;
    info!(run_id = %handle.run_id(), "press Ctrl-C to stop early");

    let cancel = handle.cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after in-flight requests");
            cancel.cancel();
        }
    });

    let reporter = tokio::spawn(report_progress(event_rx, args.quiet));
    let summary = handle.wait().await?;
    let _ = reporter.await;

    match args.format {
        OutputFormat::Text => print!("{}", export_text(&summary)),
        OutputFormat::Json => println!("{}", export_json(&summary)?),
    }

    if let Some(path) = &args.summary_export {
        write_summary(&summary, path)
            .await
            .with_context(|| format!("writing summary to {}", path.display()))?;
        info!(path = %path.display(), "summary exported");
    }
    Ok(())
}

async fn report_progress(mut rx: mpsc::Receiver<EngineEvent>, quiet: bool) {
    while let Some(event) = rx.recv().await {
        match event {
            EngineEvent::StatusChange { status } => info!(%status, "engine status"),
            EngineEvent::Progress {
                elapsed_ms,
                stage,
                target_users,
                active_users,
                completed_requests,
                total_errors,
                current_rps,
                p95_ms,
                ..
            } if !quiet => {
                info!(
                    elapsed = %format!("{:.1}s", elapsed_ms as f64 / 1000.0),
                    stage = stage.map(|s| s + 1).unwrap_or(0),
                    vus = active_users,
                    target = target_users,
                    requests = completed_requests,
                    errors = total_errors,
                    rps = %format!("{current_rps:.1}"),
                    p95_ms = %format!("{p95_ms:.2}"),
                    "progress"
                );
            }
            EngineEvent::Progress { .. } => {}
            EngineEvent::Complete { summary } => {
                info!(total = summary.total_requests, failed = summary.failed_requests, "complete");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

async fn validate(path: &Path) -> Result<()> {
    let scenario = read_scenario(path)
        .await
        .with_context(|| format!("reading scenario {}", path.display()))?;
    let errors = validate_scenario(&scenario);
    if !errors.is_empty() {
        for err in &errors {
            eprintln!("  - {err}");
        }
        return Err(SurgeError::Config(format!(
            "{} problem(s) in {}",
            errors.len(),
            path.display()
        ))
        .into());
    }
    println!(
        "{}: ok ({} stages, {} total, peak {} virtual users)",
        path.display(),
        scenario.stages.len(),
        format_duration(scenario.total_duration()),
        scenario.peak_target()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

async fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(SurgeError::Config(format!(
            "file already exists: {}. Remove it, pass --force, or choose a different path",
            path.display()
        ))
        .into());
    }
    write_scenario(&ScenarioConfig::healthcheck_template(), path)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Created {}", path.display());
    println!("Run it with: surge run {}", path.display());
    Ok(())
}
