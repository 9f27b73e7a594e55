//! Panelsim command-line entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use panelsim::services::pipeline::PipelineController;
use panelsim::storage::{load_config, open_store};
use panelsim::PanelsimConfig;
use panelsim_core::{EventSink, PipelineEvent, RunParameters, SimulationKind, StageStatus};
use panelsim_llm::{create_provider, CannedClient, GenerationClient, ProviderClient, ProviderType};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "panelsim")]
#[command(about = "Simulated surveys, focus groups and interviews")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a simulation end to end
    Run(RunArgs),
    /// Print a run's manifest and stage statuses
    Show {
        #[arg(long)]
        run_id: String,
        /// Configuration file (default: ~/.panelsim/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Parser)]
struct RunArgs {
    /// survey, focus-group or interview
    #[arg(long, value_parser = parse_kind)]
    kind: SimulationKind,
    #[arg(long)]
    topic: String,
    /// Target audience description
    #[arg(long)]
    audience: String,
    #[arg(long, default_value = "")]
    objectives: String,
    /// Respondents or participants (interviews always use one)
    #[arg(long)]
    entities: Option<usize>,
    /// Discussion rounds or interview questions
    #[arg(long, default_value = "3")]
    rounds: usize,
    /// Defaults to a random UUID
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Use the canned offline backend
    #[arg(long)]
    offline: bool,
}

fn parse_kind(value: &str) -> Result<SimulationKind, String> {
    value.parse().map_err(|e: panelsim_core::CoreError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Show { run_id, config } => show(&run_id, config.as_deref()).await,
    }
}

fn build_client(settings: &PanelsimConfig, cancel: &CancellationToken) -> Result<Arc<dyn GenerationClient>> {
    if settings.is_offline() {
        return Ok(Arc::new(CannedClient::new()));
    }
    let provider = create_provider(settings.provider.clone())
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("failed to create generation provider")?;
    Ok(Arc::new(
        ProviderClient::new(provider)
            .with_timeout(settings.timeouts.call_timeout())
            .with_cancellation(cancel.clone()),
    ))
}

async fn run(args: RunArgs) -> Result<()> {
    let mut settings = load_config(args.config.as_deref())?;
    if args.offline {
        settings.provider.provider = ProviderType::Canned;
    }

    let parameters = RunParameters {
        kind: args.kind,
        topic: args.topic,
        objectives: args.objectives,
        target_audience: args.audience,
        entity_count: args.entities.unwrap_or(match args.kind {
            SimulationKind::Survey => 10,
            SimulationKind::FocusGroup => 5,
            SimulationKind::Interview => 1,
        }),
        round_count: args.rounds,
    };
    let run_id = args
        .run_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let cancel = CancellationToken::new();
    let client = build_client(&settings, &cancel)?;
    let store = open_store(&settings.storage)?;

    let (events, mut rx) = EventSink::channel(256);
    let listener = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match &event {
                PipelineEvent::ItemDegraded { label, reason } => {
                    tracing::warn!(label = %label, reason = %reason, "Item degraded")
                }
                other => tracing::debug!(event = ?other, "Pipeline event"),
            }
        }
    });

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            ctrl_c.cancel();
        }
    });

    let controller = PipelineController::new(store, client, settings)
        .with_events(events)
        .with_cancellation(cancel);
    let result = controller.run(&run_id, parameters).await?;
    drop(controller);
    let _ = listener.await;

    println!("run {}: {:?}", result.run.id, result.run.status);
    for record in &result.run.stages {
        println!(
            "  {:<22} {:?} (degraded items: {})",
            record.stage.as_str(),
            record.status,
            record.degraded_items
        );
    }
    if !result.succeeded() {
        bail!(
            "run {} did not complete: {}",
            result.run.id,
            result.run.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn show(run_id: &str, config: Option<&std::path::Path>) -> Result<()> {
    let settings = load_config(config)?;
    let store = open_store(&settings.storage)?;
    let Some(run) = store.read_manifest(run_id).await? else {
        bail!("run {} not found", run_id);
    };

    println!("run {}: {:?}", run.id, run.status);
    println!("  kind: {}, topic: {}", run.parameters.kind, run.parameters.topic);
    println!("  started: {}", run.started_at);
    if let Some(finished) = run.finished_at {
        println!("  finished: {}", finished);
    }
    if let Some(error) = &run.error {
        println!("  error: {}", error);
    }
    for record in &run.stages {
        let suffix = match (&record.status, &record.error) {
            (StageStatus::Failed, Some(error)) => format!(" - {}", error),
            _ => String::new(),
        };
        println!(
            "  {:<22} {:?} (degraded items: {}){}",
            record.stage.as_str(),
            record.status,
            record.degraded_items,
            suffix
        );
    }
    Ok(())
}
