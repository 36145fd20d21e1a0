//! VibeCall Signaling Relay
//!
//! WebSocket hub brokering WebRTC signaling between matched peers, plus
//! the TURN credential endpoints. Receives match announcements from the
//! worker through the shared broker.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use vibecall_core::tracing_init::init_tracing;
use vibecall_store::{NullProfileStore, ProfileStore, SqliteProfileStore};

use vibecall_relay::auth::SessionValidator;
use vibecall_relay::feed;
use vibecall_relay::hub::SignalingHub;
use vibecall_relay::rate_limit::RateLimiter;
use vibecall_relay::server::{AppState, build_router};
use vibecall_relay::turn::{DEFAULT_TTL_SECS, TurnConfig, TurnIssuer};

#[derive(Parser, Debug)]
#[command(name = "vibecall-relay")]
#[command(
    version,
    about = "VibeCall signaling relay - WebSocket hub and TURN credential issuer"
)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:3001")]
    addr: SocketAddr,

    /// Broker connection URL.
    #[arg(
        long,
        env = "VIBECALL_BROKER_URL",
        default_value = "redis://127.0.0.1:6379"
    )]
    broker_url: String,

    /// Path to the profile database for online flags and ban checks.
    #[arg(long, env = "VIBECALL_DB_PATH")]
    db_path: Option<PathBuf>,

    /// STUN server handed to clients in the WebRTC config.
    #[arg(
        long,
        env = "VIBECALL_STUN_SERVER_URL",
        default_value = "stun:stun.l.google.com:19302"
    )]
    stun_url: String,

    /// TURN relay address, e.g. turn.example.com:3478.
    #[arg(long, env = "VIBECALL_TURN_SERVER_URL")]
    turn_url: Option<String>,

    /// Shared secret enabling ephemeral TURN credentials.
    #[arg(long, env = "VIBECALL_TURN_SHARED_SECRET")]
    turn_shared_secret: Option<String>,

    /// Static TURN username (fallback mode).
    #[arg(long, env = "VIBECALL_TURN_USERNAME")]
    turn_username: Option<String>,

    /// Static TURN password (fallback mode).
    #[arg(long, env = "VIBECALL_TURN_PASSWORD")]
    turn_password: Option<String>,

    /// Lifetime of ephemeral TURN credentials in seconds.
    #[arg(long, env = "VIBECALL_TURN_TTL_SECS", default_value_t = DEFAULT_TTL_SECS)]
    turn_ttl_secs: u64,

    /// Rate-limit window for credential requests in seconds.
    #[arg(long, env = "VIBECALL_RATE_WINDOW_SECS", default_value_t = 60)]
    rate_window_secs: u64,

    /// Maximum credential requests per address per window.
    #[arg(long, env = "VIBECALL_RATE_MAX", default_value_t = 30)]
    rate_max: u32,

    /// Require a validated session on the plain credential route too.
    #[arg(long, env = "VIBECALL_REQUIRE_AUTH")]
    require_auth: bool,

    /// Secret for validating application session tokens.
    #[arg(long, env = "VIBECALL_SESSION_SECRET")]
    session_secret: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing("vibecall_relay=info", args.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        "Starting vibecall-relay"
    );

    // Signaling works without the profile store; presence updates and ban
    // checks just degrade.
    let profiles: Arc<dyn ProfileStore> = match &args.db_path {
        Some(path) => match SqliteProfileStore::open(path).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(error = %e, "Profile store unavailable; running without presence updates");
                Arc::new(NullProfileStore)
            }
        },
        None => {
            info!("No profile store configured; running without presence updates");
            Arc::new(NullProfileStore)
        }
    };

    let hub = Arc::new(SignalingHub::new(Arc::clone(&profiles)));
    let turn = Arc::new(TurnIssuer::new(TurnConfig {
        server_url: args.turn_url,
        shared_secret: args.turn_shared_secret,
        static_username: args.turn_username,
        static_password: args.turn_password,
        ttl_secs: args.turn_ttl_secs,
    }));
    let limiter = Arc::new(RateLimiter::new(
        Duration::from_secs(args.rate_window_secs.max(1)),
        args.rate_max,
    ));
    let sessions = args
        .session_secret
        .as_deref()
        .map(|secret| Arc::new(SessionValidator::new(secret.as_bytes())));

    if args.require_auth && sessions.is_none() {
        warn!("--require-auth set without a session secret; credential routes will refuse");
    }

    let feed_task = tokio::spawn(feed::run_match_feed(
        Arc::clone(&hub),
        args.broker_url.clone(),
    ));

    let state = AppState {
        hub,
        profiles,
        turn,
        limiter,
        sessions,
        stun_url: args.stun_url,
        require_auth: args.require_auth,
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    info!(addr = %args.addr, "Relay listening");

    tokio::select! {
        result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        ) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    feed_task.abort();
    info!("Relay stopped");
    Ok(())
}
