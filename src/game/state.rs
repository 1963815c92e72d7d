//! Coarse game phase
//!
//! `GamePhase` is the single current phase. `PhaseSet` answers "is the game
//! in any of these phases" for listeners that care about several at once.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamePhase {
    MainMenu,
    PreLevel,
    Level,
    PostLevel,
    GameOver,
}

impl GamePhase {
    pub const ALL: [GamePhase; 5] = [
        GamePhase::MainMenu,
        GamePhase::PreLevel,
        GamePhase::Level,
        GamePhase::PostLevel,
        GamePhase::GameOver,
    ];

    #[inline]
    fn bit(self) -> u8 {
        match self {
            GamePhase::MainMenu => 1 << 0,
            GamePhase::PreLevel => 1 << 1,
            GamePhase::Level => 1 << 2,
            GamePhase::PostLevel => 1 << 3,
            GamePhase::GameOver => 1 << 4,
        }
    }

    /// Whether ships and asteroids are live in this phase
    pub fn is_playing(self) -> bool {
        matches!(self, GamePhase::Level)
    }
}

impl Default for GamePhase {
    fn default() -> Self {
        GamePhase::MainMenu
    }
}

/// Set of phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PhaseSet(u8);

impl PhaseSet {
    pub const NONE: PhaseSet = PhaseSet(0);
    pub const ALL: PhaseSet = PhaseSet(0b1_1111);

    pub fn only(phase: GamePhase) -> Self {
        PhaseSet(phase.bit())
    }

    pub fn with(self, phase: GamePhase) -> Self {
        PhaseSet(self.0 | phase.bit())
    }

    pub fn without(self, phase: GamePhase) -> Self {
        PhaseSet(self.0 & !phase.bit())
    }

    pub fn contains(self, phase: GamePhase) -> bool {
        self.0 & phase.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = GamePhase> {
        GamePhase::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl FromIterator<GamePhase> for PhaseSet {
    fn from_iter<I: IntoIterator<Item = GamePhase>>(iter: I) -> Self {
        iter.into_iter().fold(PhaseSet::NONE, PhaseSet::with)
    }
}
