//! Asteroids and bullets
//!
//! Both are shared as `Arc`s: the session owns the strong handles while the
//! registries only observe them. Motion state sits behind a lock so an
//! in-flight respawn search can sample positions while the simulation moves
//! things around.

use parking_lot::RwLock;
use rand::Rng;
use smallvec::SmallVec;
use std::sync::Arc;

use crate::game::bounds::PlayAreaBounds;
use crate::game::constants::{asteroid, bullet};
use crate::game::registry::{EntityId, Obstacle};
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy)]
struct Motion {
    position: Vec2,
    velocity: Vec2,
}

/// Children produced by a split
pub type SplitChildren = SmallVec<[Arc<Asteroid>; asteroid::CHILDREN_PER_SPLIT]>;

#[derive(Debug)]
pub struct Asteroid {
    id: EntityId,
    /// 1 is the smallest; only sizes above 1 split
    pub size: u8,
    motion: RwLock<Motion>,
}

impl Asteroid {
    pub fn new(id: EntityId, size: u8, position: Vec2, velocity: Vec2) -> Self {
        Self {
            id,
            size,
            motion: RwLock::new(Motion { position, velocity }),
        }
    }

    /// Asteroid with a random heading and speed
    pub fn with_random_velocity<R: Rng + ?Sized>(
        id: EntityId,
        size: u8,
        position: Vec2,
        rng: &mut R,
    ) -> Self {
        let heading = rng.gen_range(0.0..std::f32::consts::TAU);
        let speed = rng.gen_range(0.0..=asteroid::MAX_SPEED);
        Self::new(id, size, position, Vec2::from_angle(heading) * speed)
    }

    pub fn velocity(&self) -> Vec2 {
        self.motion.read().velocity
    }

    pub fn set_position(&self, position: Vec2) {
        self.motion.write().position = position;
    }

    /// Integrate one step and wrap around the play area edges
    pub fn advance(&self, dt: f32, bounds: &PlayAreaBounds) {
        let mut motion = self.motion.write();
        let next = motion.position + motion.velocity * dt;
        motion.position = bounds.wrap(next);
    }

    /// Break into smaller asteroids at the current position.
    /// Size-1 asteroids produce no children.
    pub fn split<R: Rng + ?Sized>(
        &self,
        mut next_id: impl FnMut() -> EntityId,
        rng: &mut R,
    ) -> SplitChildren {
        let mut children = SplitChildren::new();
        if self.size <= 1 {
            return children;
        }
        let position = self.position();
        for _ in 0..asteroid::CHILDREN_PER_SPLIT {
            children.push(Arc::new(Asteroid::with_random_velocity(
                next_id(),
                self.size - 1,
                position,
                rng,
            )));
        }
        children
    }
}

impl Obstacle for Asteroid {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Vec2 {
        self.motion.read().position
    }
}

#[derive(Debug)]
pub struct Bullet {
    id: EntityId,
    motion: RwLock<Motion>,
    lifetime: RwLock<f32>,
}

impl Bullet {
    /// Fire from `origin` along `heading` (radians)
    pub fn fire(id: EntityId, origin: Vec2, heading: f32) -> Self {
        Self {
            id,
            motion: RwLock::new(Motion {
                position: origin,
                velocity: Vec2::from_angle(heading) * bullet::SPEED,
            }),
            lifetime: RwLock::new(bullet::LIFETIME),
        }
    }

    pub fn advance(&self, dt: f32, bounds: &PlayAreaBounds) {
        let mut motion = self.motion.write();
        let next = motion.position + motion.velocity * dt;
        motion.position = bounds.wrap(next);
        *self.lifetime.write() -= dt;
    }

    pub fn is_expired(&self) -> bool {
        *self.lifetime.read() <= 0.0
    }
}

impl Obstacle for Bullet {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Vec2 {
        self.motion.read().position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> PlayAreaBounds {
        PlayAreaBounds::new(Vec2::ZERO, Vec2::new(80.0, 80.0))
    }

    #[test]
    fn test_asteroid_advance_wraps() {
        let a = Asteroid::new(1, 3, Vec2::new(79.0, 40.0), Vec2::new(2.0, 0.0));
        a.advance(1.0, &bounds());
        assert!(a.position().approx_eq(Vec2::new(1.0, 40.0), 1e-4));
    }

    #[test]
    fn test_split_produces_smaller_children() {
        let a = Asteroid::new(1, 3, Vec2::new(10.0, 10.0), Vec2::ZERO);
        let mut next = 100;
        let mut rng = rand::thread_rng();
        let children = a.split(
            || {
                next += 1;
                next
            },
            &mut rng,
        );

        assert_eq!(children.len(), asteroid::CHILDREN_PER_SPLIT);
        for child in &children {
            assert_eq!(child.size, 2);
            assert_eq!(child.position(), Vec2::new(10.0, 10.0));
        }
        assert_eq!(children[0].id(), 101);
        assert_eq!(children[1].id(), 102);
    }

    #[test]
    fn test_smallest_asteroid_does_not_split() {
        let a = Asteroid::new(1, 1, Vec2::ZERO, Vec2::ZERO);
        let mut rng = rand::thread_rng();
        assert!(a.split(|| 2, &mut rng).is_empty());
    }

    #[test]
    fn test_random_velocity_respects_max_speed() {
        let mut rng = rand::thread_rng();
        for i in 0..50 {
            let a = Asteroid::with_random_velocity(i, 3, Vec2::ZERO, &mut rng);
            assert!(a.velocity().length() <= asteroid::MAX_SPEED + 1e-4);
        }
    }

    #[test]
    fn test_bullet_expires() {
        let b = Bullet::fire(1, Vec2::new(40.0, 40.0), 0.0);
        assert!(!b.is_expired());
        b.advance(bullet::LIFETIME, &bounds());
        assert!(b.is_expired());
    }
}
