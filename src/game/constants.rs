/// Respawn grid and search constants
pub mod respawn {
    /// Grid divisions per axis; the lattice has (DIVISIONS + 1)^2 points
    pub const DIVISIONS: usize = 8;
    /// Outer rings of grid indices never offered as spawn candidates
    pub const AVOID_EDGES: usize = 2;
    /// Total pause between ship death and reappearance (seconds)
    pub const DELAY_SECS: f64 = 2.0;
    /// Fraction of the delay spent before the exclusion pass
    pub const EXCLUSION_DELAY_FRACTION: f64 = 0.8;
    /// Fraction of the delay spent before the scoring pass
    pub const SCORING_DELAY_FRACTION: f64 = 0.2;
}

/// Asteroid field constants
pub mod asteroid {
    /// Parent asteroids spawned at the start of a level
    pub const INITIAL_COUNT: usize = 3;
    /// Size of a freshly spawned parent asteroid
    pub const INITIAL_SIZE: u8 = 3;
    /// Children spawned when an asteroid larger than 1 is destroyed
    pub const CHILDREN_PER_SPLIT: usize = 2;
    /// Parent asteroids never spawn closer than this to the ship
    pub const MIN_DIST_FROM_PLAYER_SHIP: f32 = 5.0;
    /// Maximum parent drift speed (units per second)
    pub const MAX_SPEED: f32 = 4.0;
    /// Spawn attempts before accepting a position near the ship
    pub const MAX_SPAWN_ATTEMPTS: usize = 64;
}

/// Bullet constants
pub mod bullet {
    /// Muzzle speed (units per second)
    pub const SPEED: f32 = 20.0;
    /// Lifetime before self-destruction (seconds)
    pub const LIFETIME: f32 = 2.0;
}

/// Play area and session constants
pub mod session {
    /// Default play area width (world units)
    pub const PLAY_AREA_WIDTH: f32 = 80.0;
    /// Default play area height (world units)
    pub const PLAY_AREA_HEIGHT: f32 = 80.0;
    /// Ship lives at the start of a game
    pub const SHIP_LIVES: u32 = 3;
    /// Wait between game over and scene reload (seconds)
    pub const DELAY_BEFORE_RELOADING_SCENE: f64 = 4.0;
    /// Demo loop tick rate in Hz
    pub const TICK_RATE: u32 = 30;
    /// Delta time per tick in seconds
    pub const DT: f32 = 1.0 / 30.0;
    /// Longest step entity motion integrates in one tick (seconds)
    pub const MAX_STEP_SECS: f32 = 1.0;
}
