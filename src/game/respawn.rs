//! Respawn point selection
//!
//! Picks where a destroyed ship reappears. The search runs in two timed
//! stages so that obstacle positions are read as late as possible:
//!
//! 1. After `0.8 x respawn_delay`: find the grid cell nearest the death
//!    position. That cell is skipped in the next stage.
//! 2. After a further `0.2 x respawn_delay`: read the live asteroid
//!    registry and pick the in-range cell whose nearest asteroid is
//!    farthest away (maximin placement).
//!
//! The search is an explicit state machine ([`RespawnSearch`]) advanced by
//! a caller-supplied clock. [`spawn_search`] drives the same machine on
//! the tokio timer. Either way the completion callback fires exactly once,
//! unless the search is cancelled first, in which case it never fires.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::game::bounds::PlayAreaBounds;
use crate::game::constants::respawn;
use crate::game::grid::{CellIndex, RespawnGrid, RespawnGridCell};
use crate::game::registry::SharedRegistry;
use crate::util::vec2::Vec2;

/// Respawn configuration errors. These are fatal at setup time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RespawnError {
    #[error("Respawn divisions must be at least 1")]
    NoDivisions,
    #[error("avoid_edges {avoid_edges} leaves no respawn candidates with {divisions} divisions")]
    MarginTooLarge { divisions: usize, avoid_edges: usize },
}

/// Grid and timing parameters for respawn searches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RespawnSettings {
    /// Grid divisions per axis
    pub divisions: usize,
    /// Outer rings of grid indices excluded from candidacy
    pub avoid_edges: usize,
    /// Total pause between death and reappearance
    pub respawn_delay: Duration,
}

impl Default for RespawnSettings {
    fn default() -> Self {
        Self {
            divisions: respawn::DIVISIONS,
            avoid_edges: respawn::AVOID_EDGES,
            respawn_delay: Duration::from_secs_f64(respawn::DELAY_SECS),
        }
    }
}

impl RespawnSettings {
    pub fn validate(&self) -> Result<(), RespawnError> {
        if self.divisions == 0 {
            return Err(RespawnError::NoDivisions);
        }
        if 2 * self.avoid_edges >= self.divisions {
            return Err(RespawnError::MarginTooLarge {
                divisions: self.divisions,
                avoid_edges: self.avoid_edges,
            });
        }
        Ok(())
    }

    /// Wait before the exclusion pass
    pub fn exclusion_delay(&self) -> Duration {
        self.respawn_delay.mul_f64(respawn::EXCLUSION_DELAY_FRACTION)
    }

    /// Wait between the exclusion pass and scoring.
    /// Derived as the remainder so both stages always sum to `respawn_delay`.
    pub fn scoring_delay(&self) -> Duration {
        self.respawn_delay.saturating_sub(self.exclusion_delay())
    }

    /// Number of cells eligible per axis
    pub fn candidates_per_axis(&self) -> usize {
        (self.divisions + 1).saturating_sub(2 * self.avoid_edges)
    }
}

/// Everything a respawn search reads: bounds, settings, the lazily built
/// grid and the live asteroid registry.
pub struct RespawnContext {
    bounds: PlayAreaBounds,
    settings: RespawnSettings,
    grid: RespawnGridCell,
    obstacles: SharedRegistry,
}

impl RespawnContext {
    /// Rejects settings that would leave no candidate cells
    pub fn new(
        bounds: PlayAreaBounds,
        settings: RespawnSettings,
        obstacles: SharedRegistry,
    ) -> Result<Self, RespawnError> {
        settings.validate()?;
        Ok(Self {
            bounds,
            settings,
            grid: RespawnGridCell::new(),
            obstacles,
        })
    }

    pub fn bounds(&self) -> &PlayAreaBounds {
        &self.bounds
    }

    pub fn settings(&self) -> &RespawnSettings {
        &self.settings
    }

    pub fn obstacles(&self) -> &SharedRegistry {
        &self.obstacles
    }

    /// The candidate grid, built on first use
    pub fn grid(&self) -> &RespawnGrid {
        self.grid.ensure_built(&self.bounds, self.settings.divisions)
    }

    pub fn grid_built(&self) -> bool {
        self.grid.is_built()
    }
}

/// Grid cell nearest `prev_pos` among the in-range candidates.
/// The first cell scanned wins ties. None if there are no candidates or
/// no distance compares (non-finite `prev_pos`).
pub fn exclusion_cell(grid: &RespawnGrid, avoid_edges: usize, prev_pos: Vec2) -> Option<CellIndex> {
    let mut closest_sq = f32::MAX;
    let mut cell = None;
    for (index, point) in grid.candidates(avoid_edges) {
        let dist_sq = point.distance_sq_to(prev_pos);
        if dist_sq < closest_sq {
            closest_sq = dist_sq;
            cell = Some(index);
        }
    }
    cell
}

/// Result of the scoring pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Winning cell, or None when the fallback was used
    pub cell: Option<CellIndex>,
    pub point: Vec2,
    /// Squared distance from `point` to its nearest obstacle
    /// (`f32::MAX` with no obstacles)
    pub clearance_sq: f32,
}

/// Maximin placement: the in-range cell (other than `exclude`) whose
/// nearest obstacle is farthest away.
///
/// With no obstacles every cell scores `f32::MAX`, so the first cell
/// scanned wins. If no cell scores above zero, `fallback` is returned.
pub fn select_maximin(
    grid: &RespawnGrid,
    avoid_edges: usize,
    exclude: Option<CellIndex>,
    obstacles: &[Vec2],
    fallback: Vec2,
) -> Placement {
    let mut best = Placement {
        cell: None,
        point: fallback,
        clearance_sq: 0.0,
    };
    for (index, point) in grid.candidates(avoid_edges) {
        if Some(index) == exclude {
            continue;
        }
        let clearance_sq = obstacles
            .iter()
            .map(|o| o.distance_sq_to(point))
            .fold(f32::MAX, f32::min);
        if clearance_sq > best.clearance_sq {
            best = Placement {
                cell: Some(index),
                point,
                clearance_sq,
            };
        }
    }
    best
}

/// Cooperative cancellation shared between a search and whoever started it
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel` has been called on any clone
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so this only returns on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a search is in its timed sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchStage {
    /// Not started; the grid may not exist yet
    Init,
    /// Waiting to run the exclusion pass
    AwaitExclusion { resume_at: Duration },
    /// Waiting to score candidates against the registry
    AwaitScoring {
        resume_at: Duration,
        exclude: Option<CellIndex>,
    },
    Done(SearchOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchOutcome {
    Placed(Vec2),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchPoll {
    /// Nothing to do until the clock reaches `resume_at`
    Pending { resume_at: Duration },
    Finished(SearchOutcome),
}

type RespawnCallback = Box<dyn FnOnce(Vec2) + Send>;

/// One in-flight respawn search.
///
/// Times are offsets on the caller's clock; the first `poll` anchors the
/// schedule. Stage deadlines are chained from the previous deadline rather
/// than from the poll time, so coarse ticks never stretch the total delay.
pub struct RespawnSearch {
    ctx: Arc<RespawnContext>,
    prev_pos: Vec2,
    stage: SearchStage,
    cancel: CancelToken,
    callback: Option<RespawnCallback>,
}

impl RespawnSearch {
    pub fn new<F>(ctx: Arc<RespawnContext>, prev_pos: Vec2, cancel: CancelToken, callback: F) -> Self
    where
        F: FnOnce(Vec2) + Send + 'static,
    {
        Self {
            ctx,
            prev_pos,
            stage: SearchStage::Init,
            cancel,
            callback: Some(Box::new(callback)),
        }
    }

    pub fn stage(&self) -> SearchStage {
        self.stage
    }

    pub fn prev_pos(&self) -> Vec2 {
        self.prev_pos
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.stage, SearchStage::Done(_))
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Advance as far as `now` allows
    pub fn poll(&mut self, now: Duration) -> SearchPoll {
        loop {
            if let SearchStage::Done(outcome) = self.stage {
                return SearchPoll::Finished(outcome);
            }
            if self.cancel.is_cancelled() {
                debug!("Respawn search from {} cancelled in {:?}", self.prev_pos, self.stage);
                self.callback = None;
                self.stage = SearchStage::Done(SearchOutcome::Cancelled);
                continue;
            }

            let settings = *self.ctx.settings();
            match self.stage {
                SearchStage::Init => {
                    self.ctx.grid();
                    self.stage = SearchStage::AwaitExclusion {
                        resume_at: now.saturating_add(settings.exclusion_delay()),
                    };
                }
                SearchStage::AwaitExclusion { resume_at } => {
                    if now < resume_at {
                        return SearchPoll::Pending { resume_at };
                    }
                    let exclude = exclusion_cell(self.ctx.grid(), settings.avoid_edges, self.prev_pos);
                    debug!("Respawn exclusion cell for {}: {:?}", self.prev_pos, exclude);
                    self.stage = SearchStage::AwaitScoring {
                        resume_at: resume_at.saturating_add(settings.scoring_delay()),
                        exclude,
                    };
                }
                SearchStage::AwaitScoring { resume_at, exclude } => {
                    if now < resume_at {
                        return SearchPoll::Pending { resume_at };
                    }
                    // Read the registry now, not at search start
                    let obstacles = self.ctx.obstacles().read().snapshot();
                    let placement = select_maximin(
                        self.ctx.grid(),
                        settings.avoid_edges,
                        exclude,
                        &obstacles,
                        self.prev_pos,
                    );
                    info!(
                        "Respawn point {} chosen (cell {:?}, {} asteroids, clearance {:.1})",
                        placement.point,
                        placement.cell,
                        obstacles.len(),
                        placement.clearance_sq.sqrt()
                    );
                    self.stage = SearchStage::Done(SearchOutcome::Placed(placement.point));
                    if let Some(callback) = self.callback.take() {
                        callback(placement.point);
                    }
                }
                SearchStage::Done(_) => {}
            }
        }
    }
}

/// Run a search on the tokio timer until it places or is cancelled
pub async fn run_search<F>(
    ctx: Arc<RespawnContext>,
    prev_pos: Vec2,
    cancel: CancelToken,
    callback: F,
) -> SearchOutcome
where
    F: FnOnce(Vec2) + Send + 'static,
{
    let started = tokio::time::Instant::now();
    let mut search = RespawnSearch::new(ctx, prev_pos, cancel.clone(), callback);
    loop {
        match search.poll(started.elapsed()) {
            SearchPoll::Finished(outcome) => return outcome,
            SearchPoll::Pending { resume_at } => {
                tokio::select! {
                    _ = tokio::time::sleep_until(started + resume_at) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }
    }
}

/// Spawn [`run_search`] as a background task
pub fn spawn_search<F>(
    ctx: Arc<RespawnContext>,
    prev_pos: Vec2,
    cancel: CancelToken,
    callback: F,
) -> JoinHandle<SearchOutcome>
where
    F: FnOnce(Vec2) + Send + 'static,
{
    info!("Starting respawn search from {}", prev_pos);
    tokio::spawn(run_search(ctx, prev_pos, cancel, callback))
}
