use std::time::Duration;

use crate::game::bounds::PlayAreaBounds;
use crate::game::constants::{asteroid, respawn, session};
use crate::game::respawn::{RespawnError, RespawnSettings};

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid respawn settings: {0}")]
    Respawn(#[from] RespawnError),
    #[error("Play area must have a finite, non-negative size")]
    InvalidPlayArea,
    #[error("Respawn delay must be finite, non-negative and representable")]
    InvalidRespawnDelay,
    #[error("Reload delay must be finite, non-negative and representable")]
    InvalidReloadDelay,
    #[error("Initial asteroid size must be at least 1")]
    InvalidAsteroidSize,
}

/// Game configuration
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Respawn grid divisions per axis
    pub respawn_divisions: usize,
    /// Outer grid rings excluded from respawn candidacy
    pub respawn_avoid_edges: usize,
    /// Pause between ship death and reappearance (seconds)
    pub respawn_delay_secs: f64,
    /// Play area width (world units)
    pub play_area_width: f32,
    /// Play area height (world units)
    pub play_area_height: f32,
    /// Parent asteroids per level
    pub initial_asteroids: usize,
    /// Size of parent asteroids
    pub initial_asteroid_size: u8,
    /// Lives before game over
    pub ship_lives: u32,
    /// Wait between game over and reload (seconds)
    pub reload_delay_secs: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            respawn_divisions: respawn::DIVISIONS,
            respawn_avoid_edges: respawn::AVOID_EDGES,
            respawn_delay_secs: respawn::DELAY_SECS,
            play_area_width: session::PLAY_AREA_WIDTH,
            play_area_height: session::PLAY_AREA_HEIGHT,
            initial_asteroids: asteroid::INITIAL_COUNT,
            initial_asteroid_size: asteroid::INITIAL_SIZE,
            ship_lives: session::SHIP_LIVES,
            reload_delay_secs: session::DELAY_BEFORE_RELOADING_SCENE,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", key, raw);
            None
        }
    }
}

impl GameConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(divisions) = env_parse::<usize>("RESPAWN_DIVISIONS") {
            if divisions > 0 {
                config.respawn_divisions = divisions;
            } else {
                tracing::warn!("RESPAWN_DIVISIONS must be > 0, using default");
            }
        }

        if let Some(avoid) = env_parse::<usize>("RESPAWN_AVOID_EDGES") {
            config.respawn_avoid_edges = avoid;
        }

        if let Some(delay) = env_parse::<f64>("RESPAWN_DELAY_SECS") {
            if delay.is_finite() && delay >= 0.0 {
                config.respawn_delay_secs = delay;
            } else {
                tracing::warn!("RESPAWN_DELAY_SECS must be >= 0, using default");
            }
        }

        if let Some(width) = env_parse::<f32>("PLAY_AREA_WIDTH") {
            config.play_area_width = width;
        }

        if let Some(height) = env_parse::<f32>("PLAY_AREA_HEIGHT") {
            config.play_area_height = height;
        }

        if let Some(count) = env_parse::<usize>("INITIAL_ASTEROIDS") {
            if count <= 1000 {
                config.initial_asteroids = count;
            } else {
                tracing::warn!("INITIAL_ASTEROIDS must be 0-1000, using default");
            }
        }

        if let Some(size) = env_parse::<u8>("INITIAL_ASTEROID_SIZE") {
            config.initial_asteroid_size = size;
        }

        if let Some(lives) = env_parse::<u32>("SHIP_LIVES") {
            config.ship_lives = lives;
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.respawn_settings()?;
        let (w, h) = (self.play_area_width, self.play_area_height);
        if !w.is_finite() || !h.is_finite() || w < 0.0 || h < 0.0 {
            return Err(ConfigError::InvalidPlayArea);
        }
        if self.initial_asteroid_size == 0 {
            return Err(ConfigError::InvalidAsteroidSize);
        }
        self.reload_delay()?;
        Ok(())
    }

    /// Validated respawn settings
    pub fn respawn_settings(&self) -> Result<RespawnSettings, ConfigError> {
        // Rejects NaN, negatives and values past Duration::MAX
        let respawn_delay = Duration::try_from_secs_f64(self.respawn_delay_secs)
            .map_err(|_| ConfigError::InvalidRespawnDelay)?;
        let settings = RespawnSettings {
            divisions: self.respawn_divisions,
            avoid_edges: self.respawn_avoid_edges,
            respawn_delay,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn bounds(&self) -> PlayAreaBounds {
        PlayAreaBounds::from_size(self.play_area_width, self.play_area_height)
    }

    pub fn reload_delay(&self) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(self.reload_delay_secs).map_err(|_| ConfigError::InvalidReloadDelay)
    }
}
