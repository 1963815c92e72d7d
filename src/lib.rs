//! AsteraX respawn core
//!
//! Obstacle-aware respawn point selection and the live-object registry it
//! reads, for an arcade asteroid game.
//!
//! - [`game::registry`] - live asteroid/bullet membership
//! - [`game::grid`] - lazily built respawn candidate lattice
//! - [`game::respawn`] - the two-stage timed maximin search
//! - [`game::session`] - session glue: ship lifecycle, level reloads

pub mod config;
pub mod util;
pub mod game;
