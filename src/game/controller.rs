//! Game controller and single-instance slot
//!
//! `ControllerSlot` holds the one active instance of something (the game
//! session, in practice). Misuse is reported, never fatal: a second install
//! keeps the first instance, and a read before install returns `None`.
//!
//! `GameController` tracks the current phase and the scene reload that
//! follows a game over.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::game::state::GamePhase;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControllerError {
    #[error("Attempt to install an instance when one is already installed")]
    AlreadyInstalled,
    #[error("Attempt to get the instance before it has been installed")]
    NotInstalled,
}

pub struct ControllerSlot<T> {
    name: &'static str,
    inner: RwLock<Option<Arc<T>>>,
}

impl<T> ControllerSlot<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: RwLock::new(None),
        }
    }

    /// Install the instance. The first install wins; later ones are logged
    /// and rejected, leaving the installed one in place.
    pub fn install(&self, value: T) -> Result<Arc<T>, ControllerError> {
        let mut slot = self.inner.write();
        if slot.is_some() {
            error!("{}: {}", self.name, ControllerError::AlreadyInstalled);
            return Err(ControllerError::AlreadyInstalled);
        }
        let value = Arc::new(value);
        *slot = Some(value.clone());
        Ok(value)
    }

    /// Installed instance, or `None` with an error logged
    pub fn get(&self) -> Option<Arc<T>> {
        match self.try_get() {
            Ok(value) => Some(value),
            Err(e) => {
                error!("{}: {}", self.name, e);
                None
            }
        }
    }

    /// Installed instance without logging
    pub fn try_get(&self) -> Result<Arc<T>, ControllerError> {
        self.inner.read().clone().ok_or(ControllerError::NotInstalled)
    }

    pub fn is_installed(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Release the instance so a new one can be installed
    pub fn take(&self) -> Option<Arc<T>> {
        self.inner.write().take()
    }
}

/// Phase tracking plus the delayed reload after game over
#[derive(Debug, Clone)]
pub struct GameController {
    phase: GamePhase,
    reload_delay: Duration,
    reload_at: Option<Duration>,
}

impl GameController {
    pub fn new(reload_delay: Duration) -> Self {
        Self {
            phase: GamePhase::MainMenu,
            reload_delay,
            reload_at: None,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: GamePhase) {
        if self.phase != phase {
            info!("Game phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    /// Switch to game over and schedule the reload. Repeat calls keep the
    /// first schedule.
    pub fn end_game(&mut self, now: Duration) {
        self.set_phase(GamePhase::GameOver);
        if self.reload_at.is_none() {
            let at = now.saturating_add(self.reload_delay);
            info!("Scene reload scheduled at {:.2}s", at.as_secs_f32());
            self.reload_at = Some(at);
        }
    }

    pub fn reload_pending(&self) -> bool {
        self.reload_at.is_some()
    }

    /// True exactly once, when the scheduled reload falls due
    pub fn poll_reload(&mut self, now: Duration) -> bool {
        match self.reload_at {
            Some(at) if now >= at => {
                self.reload_at = None;
                true
            }
            _ => false,
        }
    }
}
