//! Game session
//!
//! Owns everything one game needs: the respawn context, the live-object
//! registries, the strong handles to asteroids and bullets, the ship, and the
//! phase controller. Driven by `tick`, which advances a virtual clock and
//! returns what happened.
//!
//! A ship has at most one respawn search in flight. The search reports its
//! result through a channel so the callback never touches the session
//! directly.

use crossbeam_channel::{Receiver, Sender};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ConfigError, GameConfig};
use crate::game::constants::asteroid::{MAX_SPAWN_ATTEMPTS, MIN_DIST_FROM_PLAYER_SHIP};
use crate::game::constants::session::MAX_STEP_SECS;
use crate::game::controller::GameController;
use crate::game::entities::{Asteroid, Bullet};
use crate::game::registry::{EntityId, LiveObjects, Obstacle, Registration};
use crate::game::respawn::{
    CancelToken, RespawnContext, RespawnSearch, SearchOutcome, SearchPoll,
};
use crate::game::state::GamePhase;
use crate::util::vec2::Vec2;

/// Session errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("A respawn search is already in flight for this ship")]
    SearchInFlight,
    #[error("Ship is not alive")]
    ShipNotAlive,
    #[error("Asteroid {0} not found")]
    AsteroidNotFound(EntityId),
    #[error("Game is not in progress")]
    NotPlaying,
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Something that happened during a session step
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LevelStarted { asteroids: usize },
    ShipDestroyed { position: Vec2, lives_left: u32 },
    ShipRespawned { position: Vec2 },
    RespawnCancelled,
    AsteroidDestroyed { id: EntityId, children: usize },
    BulletExpired { id: EntityId },
    GameOver,
    SceneReloaded,
}

#[derive(Debug, Clone)]
pub struct Ship {
    pub id: Uuid,
    pub position: Vec2,
    /// Facing (radians)
    pub heading: f32,
    pub alive: bool,
    pub lives: u32,
}

impl Ship {
    fn new(position: Vec2, lives: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            heading: 0.0,
            alive: true,
            lives,
        }
    }
}

pub struct GameSession {
    config: GameConfig,
    ctx: Arc<RespawnContext>,
    live: LiveObjects,
    asteroids: Vec<Arc<Asteroid>>,
    bullets: Vec<Arc<Bullet>>,
    ship: Ship,
    controller: GameController,
    clock: Duration,
    next_entity_id: EntityId,
    respawn: Option<RespawnSearch>,
    respawn_tx: Sender<Vec2>,
    respawn_rx: Receiver<Vec2>,
    rng: StdRng,
}

impl GameSession {
    pub fn new(config: GameConfig) -> Result<Self, SessionError> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic asteroid placement for tests and replays
    pub fn with_seed(config: GameConfig, seed: u64) -> Result<Self, SessionError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, rng: StdRng) -> Result<Self, SessionError> {
        config.validate()?;
        let settings = config.respawn_settings()?;
        let bounds = config.bounds();
        let live = LiveObjects::new();
        let ctx = RespawnContext::new(bounds, settings, live.asteroids.clone())
            .map_err(ConfigError::from)?;
        let (respawn_tx, respawn_rx) = crossbeam_channel::unbounded();

        info!(
            "Game session created: {}x{} play area, {} divisions, respawn delay {:?}",
            bounds.width(),
            bounds.height(),
            settings.divisions,
            settings.respawn_delay
        );

        Ok(Self {
            ship: Ship::new(bounds.center(), config.ship_lives),
            controller: GameController::new(config.reload_delay()?),
            config,
            ctx: Arc::new(ctx),
            live,
            asteroids: Vec::new(),
            bullets: Vec::new(),
            clock: Duration::ZERO,
            next_entity_id: 1,
            respawn: None,
            respawn_tx,
            respawn_rx,
            rng,
        })
    }

    pub fn phase(&self) -> GamePhase {
        self.controller.phase()
    }

    pub fn ship(&self) -> &Ship {
        &self.ship
    }

    /// Session clock
    pub fn clock(&self) -> Duration {
        self.clock
    }

    pub fn live(&self) -> &LiveObjects {
        &self.live
    }

    pub fn context(&self) -> &Arc<RespawnContext> {
        &self.ctx
    }

    pub fn asteroids(&self) -> &[Arc<Asteroid>] {
        &self.asteroids
    }

    pub fn respawn_in_flight(&self) -> bool {
        self.respawn.is_some()
    }

    fn next_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    /// Spawn the parent asteroids and enter the level
    pub fn start_level(&mut self) -> SessionEvent {
        self.controller.set_phase(GamePhase::PreLevel);
        self.spawn_parent_asteroids(self.config.initial_asteroids);
        self.controller.set_phase(GamePhase::Level);
        SessionEvent::LevelStarted {
            asteroids: self.asteroids.len(),
        }
    }

    /// Spawn `count` parent asteroids at random locations away from the ship
    pub fn spawn_parent_asteroids(&mut self, count: usize) {
        let bounds = *self.ctx.bounds();
        let min_dist_sq = MIN_DIST_FROM_PLAYER_SHIP * MIN_DIST_FROM_PLAYER_SHIP;

        for _ in 0..count {
            let mut position = bounds.random_point(&mut self.rng);
            let mut attempts = 1;
            while position.distance_sq_to(self.ship.position) < min_dist_sq {
                if attempts >= MAX_SPAWN_ATTEMPTS {
                    warn!("No asteroid spawn clear of the ship after {} attempts", attempts);
                    break;
                }
                position = bounds.random_point(&mut self.rng);
                attempts += 1;
            }

            let id = self.next_id();
            let asteroid = Arc::new(Asteroid::with_random_velocity(
                id,
                self.config.initial_asteroid_size,
                position,
                &mut self.rng,
            ));
            self.register_asteroid(asteroid);
        }
    }

    fn register_asteroid(&mut self, asteroid: Arc<Asteroid>) {
        asteroid.register(&self.live.asteroids);
        self.asteroids.push(asteroid);
    }

    /// Destroy an asteroid, replacing it with its split children
    pub fn destroy_asteroid(&mut self, id: EntityId) -> Result<SessionEvent, SessionError> {
        let idx = self
            .asteroids
            .iter()
            .position(|a| a.id() == id)
            .ok_or(SessionError::AsteroidNotFound(id))?;
        let asteroid = self.asteroids.swap_remove(idx);
        asteroid.deregister(&self.live.asteroids);

        let mut next = self.next_entity_id;
        let children = asteroid.split(
            || {
                let id = next;
                next += 1;
                id
            },
            &mut self.rng,
        );
        self.next_entity_id = next;

        let count = children.len();
        for child in children {
            self.register_asteroid(child);
        }
        debug!("Asteroid {} destroyed, {} children", id, count);

        Ok(SessionEvent::AsteroidDestroyed { id, children: count })
    }

    /// Fire a bullet from the ship
    pub fn fire_bullet(&mut self) -> Result<EntityId, SessionError> {
        if !self.ship.alive {
            return Err(SessionError::ShipNotAlive);
        }
        let id = self.next_id();
        let bullet = Arc::new(Bullet::fire(id, self.ship.position, self.ship.heading));
        bullet.register(&self.live.bullets);
        self.bullets.push(bullet);
        Ok(id)
    }

    /// Steer the ship (external input glue)
    pub fn move_ship(&mut self, position: Vec2, heading: f32) {
        if self.ship.alive {
            self.ship.position = self.ctx.bounds().wrap(position);
            self.ship.heading = heading;
        }
    }

    /// Destroy the ship. Starts a respawn search, or ends the game when no
    /// lives remain.
    pub fn kill_ship(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        if self.respawn.is_some() {
            return Err(SessionError::SearchInFlight);
        }
        if !self.ship.alive {
            return Err(SessionError::ShipNotAlive);
        }
        if !self.phase().is_playing() {
            return Err(SessionError::NotPlaying);
        }

        self.ship.alive = false;
        self.ship.lives = self.ship.lives.saturating_sub(1);
        let position = self.ship.position;
        let mut events = vec![SessionEvent::ShipDestroyed {
            position,
            lives_left: self.ship.lives,
        }];
        info!("Ship destroyed at {}, {} lives left", position, self.ship.lives);

        if self.ship.lives == 0 {
            self.end_game();
            events.push(SessionEvent::GameOver);
            return Ok(events);
        }

        let tx = self.respawn_tx.clone();
        let mut search = RespawnSearch::new(self.ctx.clone(), position, CancelToken::new(), move |point| {
            let _ = tx.send(point);
        });
        // Anchor the schedule at the moment of death
        search.poll(self.clock);
        self.respawn = Some(search);
        Ok(events)
    }

    /// Switch to game over and cancel any pending respawn
    pub fn end_game(&mut self) {
        if let Some(search) = &self.respawn {
            search.cancel_token().cancel();
        }
        self.controller.end_game(self.clock);
    }

    /// Advance the session by `dt` seconds
    pub fn tick(&mut self, dt: f32) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        // The clock takes the whole step, saturating; motion integrates at most MAX_STEP_SECS
        if dt > 0.0 {
            let step = Duration::try_from_secs_f32(dt).unwrap_or(Duration::MAX);
            self.clock = self.clock.saturating_add(step);
        }
        let dt = if dt.is_finite() { dt.clamp(0.0, MAX_STEP_SECS) } else { 0.0 };

        let bounds = *self.ctx.bounds();
        for asteroid in &self.asteroids {
            asteroid.advance(dt, &bounds);
        }
        self.update_bullets(dt, &mut events);
        self.update_respawn(&mut events);

        if self.controller.poll_reload(self.clock) {
            self.reload_scene();
            events.push(SessionEvent::SceneReloaded);
            events.push(self.start_level());
        }

        events
    }

    fn update_bullets(&mut self, dt: f32, events: &mut Vec<SessionEvent>) {
        let bounds = *self.ctx.bounds();
        let live = &self.live;
        self.bullets.retain(|bullet| {
            bullet.advance(dt, &bounds);
            if bullet.is_expired() {
                bullet.deregister(&live.bullets);
                events.push(SessionEvent::BulletExpired { id: bullet.id() });
                false
            } else {
                true
            }
        });
    }

    fn update_respawn(&mut self, events: &mut Vec<SessionEvent>) {
        let Some(search) = self.respawn.as_mut() else {
            return;
        };

        match search.poll(self.clock) {
            SearchPoll::Pending { .. } => {}
            SearchPoll::Finished(SearchOutcome::Placed(_)) => {
                self.respawn = None;
                // The callback delivered the point through the channel
                while let Ok(point) = self.respawn_rx.try_recv() {
                    self.ship.position = point;
                    self.ship.alive = true;
                    info!("Ship respawned at {}", point);
                    events.push(SessionEvent::ShipRespawned { position: point });
                }
            }
            SearchPoll::Finished(SearchOutcome::Cancelled) => {
                self.respawn = None;
                events.push(SessionEvent::RespawnCancelled);
            }
        }
    }

    /// Reset to a fresh game: clear every live object and the ship
    fn reload_scene(&mut self) {
        info!("Reloading scene");
        if let Some(search) = self.respawn.take() {
            search.cancel_token().cancel();
        }
        self.live.clear();
        self.asteroids.clear();
        self.bullets.clear();
        self.ship = Ship::new(self.ctx.bounds().center(), self.config.ship_lives);
        while self.respawn_rx.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::respawn::{exclusion_cell, select_maximin};

    const DT: f32 = 0.05;

    fn config() -> GameConfig {
        GameConfig {
            respawn_delay_secs: 1.0,
            reload_delay_secs: 2.0,
            ..GameConfig::default()
        }
    }

    fn started(config: GameConfig) -> GameSession {
        let mut session = GameSession::with_seed(config, 7).unwrap();
        session.start_level();
        session
    }

    /// Tick until `pred` matches an event or `max_secs` elapses
    fn run_until(
        session: &mut GameSession,
        max_secs: f32,
        pred: impl Fn(&SessionEvent) -> bool,
    ) -> Option<SessionEvent> {
        let ticks = (max_secs / DT).ceil() as usize;
        for _ in 0..ticks {
            if let Some(e) = session.tick(DT).into_iter().find(|e| pred(e)) {
                return Some(e);
            }
        }
        None
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = GameConfig {
            respawn_avoid_edges: 4,
            ..config()
        };
        assert!(matches!(GameSession::new(bad), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_start_level_spawns_away_from_ship() {
        let session = started(config());
        assert_eq!(session.phase(), GamePhase::Level);
        assert_eq!(session.live().asteroid_count(), 3);

        for asteroid in session.asteroids() {
            assert!(asteroid.position().distance_to(session.ship().position) >= MIN_DIST_FROM_PLAYER_SHIP);
        }
    }

    #[test]
    fn test_destroy_asteroid_splits_and_registers_children() {
        let mut session = started(config());
        let id = session.asteroids()[0].id();

        let event = session.destroy_asteroid(id).unwrap();
        assert_eq!(event, SessionEvent::AsteroidDestroyed { id, children: 2 });
        assert_eq!(session.live().asteroid_count(), 4);
        assert!(!session.live().asteroids.read().contains(id));

        assert_eq!(
            session.destroy_asteroid(id),
            Err(SessionError::AsteroidNotFound(id))
        );
    }

    #[test]
    fn test_bullets_register_and_expire() {
        let mut session = started(config());
        let id = session.fire_bullet().unwrap();
        assert_eq!(session.live().bullet_count(), 1);

        let expired = run_until(&mut session, 3.0, |e| matches!(e, SessionEvent::BulletExpired { .. }));
        assert_eq!(expired, Some(SessionEvent::BulletExpired { id }));
        assert_eq!(session.live().bullet_count(), 0);
    }

    #[test]
    fn test_ship_respawns_after_delay() {
        let mut session = started(config());
        let death = session.ship().position;
        let events = session.kill_ship().unwrap();
        assert!(matches!(events[0], SessionEvent::ShipDestroyed { lives_left: 2, .. }));
        assert!(session.respawn_in_flight());
        let died_at = session.clock();

        let respawned = run_until(&mut session, 2.0, |e| matches!(e, SessionEvent::ShipRespawned { .. }));
        let Some(SessionEvent::ShipRespawned { position }) = respawned else {
            panic!("ship never respawned");
        };

        let waited = session.clock() - died_at;
        assert!(waited >= Duration::from_secs(1));
        assert!(waited < Duration::from_secs_f32(1.0 + DT * 1.5));
        assert!(session.ship().alive);
        assert_eq!(session.ship().position, position);
        assert!(!session.respawn_in_flight());

        // Same answer as the maximin pass over the registry as it is now
        let grid = session.context().grid();
        let exclude = exclusion_cell(grid, 2, death);
        let obstacles = session.live().asteroids.read().snapshot();
        let expected = select_maximin(grid, 2, exclude, &obstacles, death);
        assert_eq!(position, expected.point);
    }

    #[test]
    fn test_second_kill_while_searching_rejected() {
        let mut session = started(config());
        session.kill_ship().unwrap();
        assert_eq!(session.kill_ship(), Err(SessionError::SearchInFlight));
    }

    #[test]
    fn test_respawn_fires_once() {
        let mut session = started(config());
        session.kill_ship().unwrap();

        let mut respawns = 0;
        for _ in 0..100 {
            respawns += session
                .tick(DT)
                .iter()
                .filter(|e| matches!(e, SessionEvent::ShipRespawned { .. }))
                .count();
        }
        assert_eq!(respawns, 1);
    }

    #[test]
    fn test_last_life_ends_game_and_reloads() {
        let mut session = started(GameConfig {
            ship_lives: 1,
            ..config()
        });

        let events = session.kill_ship().unwrap();
        assert!(events.contains(&SessionEvent::GameOver));
        assert_eq!(session.phase(), GamePhase::GameOver);
        assert!(!session.respawn_in_flight());
        assert_eq!(session.kill_ship(), Err(SessionError::ShipNotAlive));

        let reloaded = run_until(&mut session, 3.0, |e| *e == SessionEvent::SceneReloaded);
        assert!(reloaded.is_some());
        assert_eq!(session.phase(), GamePhase::Level);
        assert!(session.ship().alive);
        assert_eq!(session.ship().lives, 1);
        assert_eq!(session.live().asteroid_count(), 3);
    }

    #[test]
    fn test_end_game_cancels_pending_respawn() {
        let mut session = started(config());
        session.kill_ship().unwrap();
        session.end_game();

        let cancelled = run_until(&mut session, 0.5, |e| *e == SessionEvent::RespawnCancelled);
        assert!(cancelled.is_some());
        assert!(!session.ship().alive);
        assert!(run_until(&mut session, 1.0, |e| matches!(e, SessionEvent::ShipRespawned { .. })).is_none());
    }

    #[test]
    fn test_huge_tick_is_absorbed() {
        let mut session = started(config());
        session.fire_bullet().unwrap();
        session.kill_ship().unwrap();

        let events = session.tick(1e30);
        assert!(events.iter().any(|e| matches!(e, SessionEvent::ShipRespawned { .. })));
        assert_eq!(session.clock(), Duration::MAX);
        for asteroid in session.asteroids() {
            assert!(asteroid.position().is_finite());
        }

        // Motion steps are capped, so the bullet outlives one huge tick
        assert_eq!(session.live().bullet_count(), 1);
        let events = session.tick(f32::MAX);
        assert!(events.iter().any(|e| matches!(e, SessionEvent::BulletExpired { .. })));

        // A death at the saturated clock still respawns
        session.kill_ship().unwrap();
        let events = session.tick(f32::INFINITY);
        assert!(events.iter().any(|e| matches!(e, SessionEvent::ShipRespawned { .. })));

        session.tick(f32::NAN);
        session.tick(-1.0);
        assert!(session.ship().alive);
        assert_eq!(session.clock(), Duration::MAX);
    }

    #[test]
    fn test_zero_width_play_area_still_respawns() {
        let mut session = started(GameConfig {
            play_area_width: 0.0,
            ..config()
        });
        session.kill_ship().unwrap();

        let mut respawns = 0;
        for _ in 0..60 {
            respawns += session
                .tick(DT)
                .iter()
                .filter(|e| matches!(e, SessionEvent::ShipRespawned { .. }))
                .count();
        }
        assert_eq!(respawns, 1);
    }
}
