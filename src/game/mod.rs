pub mod bounds;
pub mod constants;
pub mod controller;
pub mod entities;
pub mod grid;
pub mod registry;
pub mod respawn;
pub mod session;
pub mod state;
