//! VibeCall Matchmaking Worker
//!
//! Drains the shared match queue on a fixed interval and announces pairs
//! through the broker. Coordinates with the signaling relay solely via
//! broker channels; the two processes share no memory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use vibecall_broker::{MatchBroker, RedisBroker, channels};
use vibecall_core::tracing_init::init_tracing;
use vibecall_store::{NullProfileStore, ProfileStore, SqliteProfileStore};
use vibecall_worker::{MatchWorker, feeds};

#[derive(Parser, Debug)]
#[command(name = "vibecall-worker")]
#[command(version, about = "VibeCall matchmaking worker - queue drain and pairing")]
struct Args {
    /// Broker connection URL.
    #[arg(
        long,
        env = "VIBECALL_BROKER_URL",
        default_value = "redis://127.0.0.1:6379"
    )]
    broker_url: String,

    /// Path to the profile database used for best-effort waitlist cleanup.
    #[arg(long, env = "VIBECALL_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Seconds between queue drain ticks.
    #[arg(long, env = "VIBECALL_TICK_INTERVAL_SECS", default_value_t = 2)]
    tick_interval_secs: u64,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing("vibecall_worker=info", args.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        broker_url = %args.broker_url,
        tick_interval_secs = args.tick_interval_secs,
        "Starting vibecall-worker"
    );

    // The worker is useless without its broker: refuse to start rather
    // than run connection-less.
    let broker: Arc<dyn MatchBroker> = Arc::new(RedisBroker::connect(&args.broker_url).await?);
    let requests_sub = broker.subscribe(channels::MATCH_REQUESTS).await?;
    let matches_sub = broker.subscribe(channels::MATCHES).await?;

    let store: Arc<dyn ProfileStore> = match &args.db_path {
        Some(path) => match SqliteProfileStore::open(path).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(error = %e, "Profile store unavailable; waitlist cleanup disabled");
                Arc::new(NullProfileStore)
            }
        },
        None => {
            info!("No profile store configured; waitlist cleanup disabled");
            Arc::new(NullProfileStore)
        }
    };

    let ingest = tokio::spawn(feeds::run_request_ingest(Arc::clone(&broker), requests_sub));
    let forwarder = tokio::spawn(feeds::run_match_forwarder(Arc::clone(&broker), matches_sub));

    let worker = MatchWorker::new(Arc::clone(&broker), store);

    // Ticks are serialized by construction: the next interval fires only
    // after the previous tick body has completed.
    let mut interval = tokio::time::interval(Duration::from_secs(args.tick_interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                worker.tick().await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    ingest.abort();
    forwarder.abort();
    info!("Worker stopped");
    Ok(())
}
