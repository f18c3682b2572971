//! Headless feature host
//!
//! Loads a session, registers the built-in features, evaluates the part
//! history against the in-memory kernel and prints one line per node.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use rk_feature::{CancellationToken, EvaluationConfig, FeatureRegistry, MemoryKernel, PartHistory};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod session;

use session::SessionConfig;

const DEFAULT_FILTER: &str = "rk_feature=info,rk_feature_host=info";

#[derive(Parser)]
#[command(
    name = "rk-feature-host",
    about = "Evaluate a feature history headlessly",
    version
)]
struct Cli {
    /// Session file (RON); the built-in demo session is used when omitted
    #[arg(short, long, env = "RK_FEATURE_SESSION")]
    session: Option<PathBuf>,

    /// Evaluation settings (RON) replacing the session's own
    #[arg(short, long, env = "RK_FEATURE_CONFIG")]
    config: Option<PathBuf>,

    /// Print every registered feature schema as JSON and exit
    #[arg(long)]
    print_schemas: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut session = match &cli.session {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("Failed to load session {}", path.display()))?,
        None => SessionConfig::demo(),
    };
    if let Some(path) = &cli.config {
        session.evaluation = EvaluationConfig::load(path)
            .with_context(|| format!("Failed to load evaluation config {}", path.display()))?;
    }

    let fallback = if cli.verbose {
        "rk_feature=debug,rk_feature_host=debug".to_owned()
    } else {
        session
            .log_filter
            .clone()
            .unwrap_or_else(|| DEFAULT_FILTER.to_owned())
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let registry = FeatureRegistry::with_builtins().context("Failed to register built-in features")?;

    if cli.print_schemas {
        print_schemas(&registry)?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut history = session
        .build_history(&registry)
        .context("Failed to build history from session")?;
    tracing::info!(nodes = history.len(), "Loaded session");

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling evaluation");
                cancel.cancel();
            }
        });
    }

    let kernel = MemoryKernel::new();
    let report = history.evaluate_with_cancel(&kernel, &cancel).await;

    print_report(&history);
    println!(
        "{} completed, {} failed, {} skipped, {} suppressed, {} solids{}",
        report.completed,
        report.failed,
        report.skipped,
        report.suppressed,
        report.solid_count,
        if report.cancelled { " (cancelled)" } else { "" }
    );

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_schemas(registry: &FeatureRegistry) -> anyhow::Result<()> {
    let schemas: serde_json::Map<String, serde_json::Value> = registry
        .classes()
        .map(|class| {
            (
                class.short_name().to_owned(),
                serde_json::json!({
                    "name": class.name(),
                    "inputParamsSchema": class.schema().to_json(),
                }),
            )
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}

fn print_report(history: &PartHistory) {
    for entry in history.entries() {
        let step = entry.step();
        println!(
            "{:<10} {:<6} {:<40} +{} -{} orphaned {}",
            entry.feature_id(),
            entry.short_name(),
            entry.status().to_string(),
            step.created.len(),
            step.consumed.len(),
            step.orphaned.len(),
        );
    }
}
