//! Respawn candidate grid
//!
//! A (D+1) x (D+1) lattice of evenly spaced points across the play area.
//! The lattice is built once per context and never rebuilt, even if the
//! bounds passed to later calls differ.

use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::game::bounds::PlayAreaBounds;
use crate::util::vec2::Vec2;

/// (i, j) grid indices
pub type CellIndex = (usize, usize);

#[derive(Debug, Clone)]
pub struct RespawnGrid {
    divisions: usize,
    /// Row-major by i: points[i * (divisions + 1) + j]
    points: Vec<Vec2>,
}

impl RespawnGrid {
    /// Build the lattice over `bounds`.
    ///
    /// Zero-area bounds collapse every point onto `bounds.min`. A division
    /// count of zero yields the single point `bounds.min`.
    pub fn build(bounds: &PlayAreaBounds, divisions: usize) -> Self {
        let step = |extent: f32| -> f32 {
            if divisions == 0 {
                return 0.0;
            }
            let d = extent / divisions as f32;
            if d.is_finite() && d > 0.0 {
                d
            } else {
                0.0
            }
        };
        let dx = step(bounds.width());
        let dy = step(bounds.height());
        if dx == 0.0 || dy == 0.0 {
            warn!(
                "Respawn grid over degenerate bounds {} - {}, points collapse onto an edge",
                bounds.min, bounds.max
            );
        }

        let side = divisions + 1;
        let mut points = Vec::with_capacity(side * side);
        for i in 0..side {
            for j in 0..side {
                points.push(Vec2::new(
                    bounds.min.x + i as f32 * dx,
                    bounds.min.y + j as f32 * dy,
                ));
            }
        }

        Self { divisions, points }
    }

    #[inline]
    pub fn divisions(&self) -> usize {
        self.divisions
    }

    /// Point at (i, j), or None if out of range
    pub fn point(&self, i: usize, j: usize) -> Option<Vec2> {
        if i > self.divisions || j > self.divisions {
            return None;
        }
        self.points.get(i * (self.divisions + 1) + j).copied()
    }

    /// In-range candidate cells, skipping `avoid_edges` outer rings.
    ///
    /// Visits i in the outer loop and j in the inner loop, both over
    /// `[avoid_edges, divisions - avoid_edges]`. Empty if the margin
    /// swallows the whole grid.
    pub fn candidates(&self, avoid_edges: usize) -> impl Iterator<Item = (CellIndex, Vec2)> + '_ {
        let side = self.divisions + 1;
        let hi = self.divisions.checked_sub(avoid_edges);
        let range = match hi {
            Some(hi) if avoid_edges <= hi => avoid_edges..hi + 1,
            _ => 0..0,
        };
        range.clone().flat_map(move |i| {
            range
                .clone()
                .map(move |j| ((i, j), self.points[i * side + j]))
        })
    }
}

/// Lazily built grid, safe to share between concurrent searches
#[derive(Debug, Default)]
pub struct RespawnGridCell {
    grid: OnceLock<RespawnGrid>,
}

impl RespawnGridCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build on first call; every later call returns the existing grid and
    /// ignores its arguments.
    pub fn ensure_built(&self, bounds: &PlayAreaBounds, divisions: usize) -> &RespawnGrid {
        self.grid.get_or_init(|| {
            debug!(
                "Building {}x{} respawn grid over {} - {}",
                divisions + 1,
                divisions + 1,
                bounds.min,
                bounds.max
            );
            RespawnGrid::build(bounds, divisions)
        })
    }

    pub fn get(&self) -> Option<&RespawnGrid> {
        self.grid.get()
    }

    pub fn is_built(&self) -> bool {
        self.grid.get().is_some()
    }
}
