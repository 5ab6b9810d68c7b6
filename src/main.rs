//! Entry point: loads config, opens the sqlite pool and runs migrations,
//! wires the registry/timer/lifecycle stack together behind `AppState`,
//! and hands that state to `server::run`. Grounded on the teacher's
//! `main.rs` (`init_logger` then `rocket::ignite().attach(...).launch()`,
//! each stage given its own setup function) — the shape survives even
//! though the web framework underneath it does not (§1: this crate's only
//! HTTP surface is the two narrow JSON routes in `http.rs` plus the
//! websocket upgrade in `server.rs`, not the teacher's templated site).

mod auth;
mod config;
mod db;
mod domain;
mod error;
mod http;
mod lifecycle;
mod logging;
mod rating;
mod registry;
mod repositories;
mod router;
mod scheduler;
mod server;
mod time_source;
mod timer_engine;
mod transport;

use auth::{GuestIdentityProvider, IdentityProvider};
use chrono::Duration;
use db::sqlite::{LogUnloggedGameSink, NoopRatingAbuseMonitor, SqliteGameRepository};
use lifecycle::Lifecycle;
use registry::{ActivePlayersIndex, GameCount, MatchRegistry};
use registry::game_count::InviteBroadcaster;
use scheduler::Scheduler;
use std::path::Path;
use std::sync::Arc;
use timer_engine::{TimerEngine, TimerEngineConfig};

/// Everything an axum handler might need, cloned cheaply per request per
/// the teacher's own `Router<AppState>` convention (every field behind
/// an `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<Lifecycle>,
    pub registry: Arc<MatchRegistry>,
    pub identity_provider: Arc<dyn IdentityProvider>,
}

/// The invite-matchmaking adapter is external (§1); standalone the
/// coordinator has no subscriber list to fan out to, so `"gamecount"`
/// broadcasts are just logged.
struct LoggingBroadcaster;

impl InviteBroadcaster for LoggingBroadcaster {
    fn broadcast_game_count(&self, active_games: usize) {
        log::debug!("active games now {active_games}");
    }
}

#[tokio::main]
async fn main() {
    let config = config::load_config();
    logging::init_logger(Path::new(&config.log_file));
    log::info!("starting match-coordinator");

    let pool = db::Pool::new(&config.database_path)
        .await
        .unwrap_or_else(|err| panic!("could not open database at {}: {err}", config.database_path));
    sqlx::migrate!("./migrations")
        .run(&pool.0)
        .await
        .unwrap_or_else(|err| panic!("could not run migrations: {err}"));

    let scheduler = Scheduler::spawn(Arc::new(time_source::SystemClock));
    let timer_config = TimerEngineConfig {
        disconnect_forgiveness: Duration::milliseconds(config.disconnect_forgiveness_millis),
        auto_resign_by_choice: Duration::milliseconds(config.auto_resign_by_choice_millis),
        auto_resign_not_by_choice: Duration::milliseconds(config.auto_resign_not_by_choice_millis),
        afk_auto_resign: Duration::milliseconds(config.afk_auto_resign_millis),
    };

    let registry = Arc::new(MatchRegistry::new());
    let lifecycle = Arc::new(Lifecycle {
        registry: registry.clone(),
        active_players: Arc::new(ActivePlayersIndex::new()),
        game_count: Arc::new(GameCount::new(Arc::new(LoggingBroadcaster))),
        timers: Arc::new(TimerEngine::new(scheduler, timer_config)),
        repository: Arc::new(SqliteGameRepository::new(pool)),
        unlogged_sink: Arc::new(LogUnloggedGameSink),
        abuse_monitor: Arc::new(NoopRatingAbuseMonitor),
        delete_cushion: Duration::milliseconds(config.delete_cushion_millis),
    });

    let state = AppState {
        lifecycle: lifecycle.clone(),
        registry,
        identity_provider: Arc::new(GuestIdentityProvider),
    };

    let bind = config.bind.clone();
    tokio::select! {
        _ = server::run(&bind, state) => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("shutdown requested, logging all active games");
            lifecycle.log_all_games().await;
        }
    }
}
