use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use roundwatch::config::UpdaterConfig;
use roundwatch::coordinator::CoordinatorVariant;
use roundwatch::telemetry;
use roundwatch::types::{Phase, RoundId};
use roundwatch::updater::RoundStateUpdater;

#[derive(Debug, Parser)]
#[command(name = "roundwatch", about = "Wait until a coordinator round reaches a phase")]
struct Cli {
    #[command(flatten)]
    config: UpdaterConfig,

    /// Round to watch (hex id). Any round when omitted.
    #[arg(long)]
    round: Option<RoundId>,

    /// Phase to wait for.
    #[arg(long, default_value = "transaction_signing")]
    phase: Phase,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize telemetry
    telemetry::init(&cli.config.log_filter);
    info!("Starting roundwatch");
    info!(
        "Configuration: coordinator={:?}, rounds_file={:?}, poll_interval_ms={}",
        cli.config.coordinator, cli.config.rounds_file, cli.config.poll_interval_ms
    );

    let updater = RoundStateUpdater::new(&cli.config, CoordinatorVariant::new(&cli.config));
    updater.start()?;

    let phase = cli.phase;
    let cancel = CancellationToken::new();
    let awaiter = match cli.round {
        Some(round_id) => {
            info!("Waiting for round {} to reach {:?}", round_id, phase);
            updater.create_round_awaiter(round_id, move |s| s.phase == phase, cancel.clone())
        }
        None => {
            info!("Waiting for any round to reach {:?}", phase);
            updater.create_any_round_awaiter(move |s| s.phase == phase, cancel.clone())
        }
    };

    let outcome = tokio::select! {
        res = awaiter => Some(res),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            None
        }
    };

    updater.stop(&CancellationToken::new()).await?;

    match outcome {
        Some(Ok(state)) => {
            println!("{}", serde_json::to_string_pretty(&state)?);
            info!("Roundwatch shutdown complete");
            Ok(())
        }
        Some(Err(e)) => Err(e.into()),
        None => Ok(()),
    }
}
