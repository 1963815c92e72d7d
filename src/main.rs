use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use asterax_respawn::config::GameConfig;
use asterax_respawn::game::constants::session::{DT, TICK_RATE};
use asterax_respawn::game::controller::ControllerSlot;
use asterax_respawn::game::respawn::{spawn_search, CancelToken};
use asterax_respawn::game::session::{GameSession, SessionEvent};

/// Seconds of play between scripted ship deaths
const DEATH_INTERVAL_SECS: f32 = 3.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("AsteraX respawn demo v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = GameConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: {} divisions, avoid_edges={}, respawn delay {}s, {} asteroids",
        config.respawn_divisions,
        config.respawn_avoid_edges,
        config.respawn_delay_secs,
        config.initial_asteroids
    );

    let sessions: ControllerSlot<Mutex<GameSession>> = ControllerSlot::new("GameSession");
    let session = sessions.install(Mutex::new(GameSession::new(config)?))?;
    if let SessionEvent::LevelStarted { asteroids } = session.lock().start_level() {
        info!("Level started with {} asteroids", asteroids);
    }

    // One search on the tokio timer, alongside the tick-driven session
    let ctx = session.lock().context().clone();
    let cancel = CancelToken::new();
    let background = spawn_search(ctx, Default::default(), cancel.clone(), |point| {
        info!("Background search placed a ship at {}", point);
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    let run = async {
        let mut ticker = interval(Duration::from_secs_f32(DT));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!("Session loop started at {} Hz", TICK_RATE);

        let mut since_death = 0.0;
        loop {
            ticker.tick().await;
            let mut guard = session.lock();

            since_death += DT;
            if since_death >= DEATH_INTERVAL_SECS && guard.ship().alive {
                since_death = 0.0;
                match guard.kill_ship() {
                    Ok(events) => {
                        if events.contains(&SessionEvent::GameOver) {
                            info!("Out of lives");
                        }
                    }
                    Err(e) => warn!("Could not destroy ship: {}", e),
                }
            }

            for event in guard.tick(DT) {
                match event {
                    SessionEvent::ShipRespawned { position } => {
                        info!(
                            "Respawned at {} with {} asteroids live",
                            position,
                            guard.live().asteroid_count()
                        );
                    }
                    SessionEvent::SceneReloaded => {
                        info!("Scene reloaded, demo finished");
                        return;
                    }
                    _ => {}
                }
            }
        }
    };

    tokio::select! {
        _ = run => {}
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    // Cleanup
    cancel.cancel();
    match background.await {
        Ok(outcome) => info!("Background search finished: {:?}", outcome),
        Err(e) => error!("Background search task failed: {}", e),
    }
    if let Some(session) = sessions.take() {
        session.lock().end_game();
    }
    info!("Demo stopped");

    Ok(())
}
