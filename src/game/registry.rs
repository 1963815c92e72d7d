//! Live-object registry
//!
//! Tracks which asteroids (and bullets) are currently alive. Objects register
//! themselves on spawn and deregister on destruction; the registry only holds
//! weak references, so it never keeps an object alive.
//!
//! Iteration follows insertion order, which keeps respawn tie-breaking
//! reproducible for a given sequence of spawns.

use hashbrown::HashSet;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::util::vec2::Vec2;

/// Entity identifier for asteroids and bullets
pub type EntityId = u64;

/// Anything that occupies space and can be queried for its current position
pub trait Obstacle: Send + Sync {
    fn id(&self) -> EntityId;
    fn position(&self) -> Vec2;
}

/// Registry shared between the simulation and in-flight respawn searches
pub type SharedRegistry = Arc<RwLock<ObstacleRegistry>>;

struct Entry {
    id: EntityId,
    obstacle: Weak<dyn Obstacle>,
}

/// Membership set of live obstacles
#[derive(Default)]
pub struct ObstacleRegistry {
    entries: Vec<Entry>,
    members: HashSet<EntityId>,
}

impl ObstacleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh registry for sharing
    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Register an obstacle. Returns false if it was already a member.
    pub fn add<O: Obstacle + 'static>(&mut self, obstacle: &Arc<O>) -> bool {
        let id = obstacle.id();
        if !self.members.insert(id) {
            return false;
        }
        let weak: Weak<O> = Arc::downgrade(obstacle);
        let weak: Weak<dyn Obstacle> = weak;
        self.entries.push(Entry { id, obstacle: weak });
        debug!("Registered obstacle {} ({} live)", id, self.entries.len());
        true
    }

    /// Deregister an obstacle. Returns false if it was not a member.
    pub fn remove(&mut self, id: EntityId) -> bool {
        if !self.members.remove(&id) {
            return false;
        }
        if let Some(idx) = self.entries.iter().position(|e| e.id == id) {
            self.entries.remove(idx);
        }
        debug!("Deregistered obstacle {} ({} live)", id, self.entries.len());
        true
    }

    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.members.contains(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Member IDs in insertion order
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    /// Current positions of every registered obstacle that is still alive.
    ///
    /// This is a point-in-time read: positions are sampled now, and the
    /// registry may change again as soon as the caller releases its lock.
    pub fn snapshot(&self) -> Vec<Vec2> {
        self.entries
            .iter()
            .filter_map(|e| e.obstacle.upgrade())
            .map(|o| o.position())
            .collect()
    }

    /// Drop entries whose obstacle was freed without deregistering.
    /// Returns the number of entries removed.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        let members = &mut self.members;
        self.entries.retain(|e| {
            let alive = e.obstacle.strong_count() > 0;
            if !alive {
                members.remove(&e.id);
            }
            alive
        });
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.members.clear();
    }
}

/// Self-registration for shared obstacles: call `register` on spawn and
/// `deregister` on destruction.
pub trait Registration {
    fn register(&self, registry: &SharedRegistry) -> bool;
    fn deregister(&self, registry: &SharedRegistry) -> bool;
}

impl<O: Obstacle + 'static> Registration for Arc<O> {
    fn register(&self, registry: &SharedRegistry) -> bool {
        registry.write().add(self)
    }

    fn deregister(&self, registry: &SharedRegistry) -> bool {
        registry.write().remove(self.id())
    }
}

/// The two registries a game keeps
#[derive(Clone)]
pub struct LiveObjects {
    /// Asteroids are the obstacles respawn scoring avoids
    pub asteroids: SharedRegistry,
    /// Bullets are tracked for membership only
    pub bullets: SharedRegistry,
}

impl LiveObjects {
    pub fn new() -> Self {
        Self {
            asteroids: ObstacleRegistry::shared(),
            bullets: ObstacleRegistry::shared(),
        }
    }

    pub fn asteroid_count(&self) -> usize {
        self.asteroids.read().len()
    }

    pub fn bullet_count(&self) -> usize {
        self.bullets.read().len()
    }

    pub fn clear(&self) {
        self.asteroids.write().clear();
        self.bullets.write().clear();
    }
}

impl Default for LiveObjects {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rock {
        id: EntityId,
        position: Vec2,
    }

    impl Obstacle for Rock {
        fn id(&self) -> EntityId {
            self.id
        }

        fn position(&self) -> Vec2 {
            self.position
        }
    }

    fn rock(id: EntityId, x: f32, y: f32) -> Arc<Rock> {
        Arc::new(Rock {
            id,
            position: Vec2::new(x, y),
        })
    }

    #[test]
    fn test_add_then_remove_leaves_empty() {
        let mut registry = ObstacleRegistry::new();
        let r = rock(1, 0.0, 0.0);

        assert!(registry.add(&r));
        assert!(registry.remove(r.id()));
        assert!(registry.is_empty());
        assert!(!registry.contains(1));
    }

    #[test]
    fn test_add_twice_keeps_one_entry() {
        let mut registry = ObstacleRegistry::new();
        let r = rock(1, 0.0, 0.0);

        assert!(registry.add(&r));
        assert!(!registry.add(&r));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn test_remove_non_member_is_noop() {
        let mut registry = ObstacleRegistry::new();
        let r = rock(1, 0.0, 0.0);
        registry.add(&r);

        assert!(!registry.remove(42));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let mut registry = ObstacleRegistry::new();
        let a = rock(7, 1.0, 1.0);
        let b = rock(3, 2.0, 2.0);
        let c = rock(5, 3.0, 3.0);
        registry.add(&a);
        registry.add(&b);
        registry.add(&c);
        registry.remove(3);

        assert_eq!(registry.snapshot(), vec![Vec2::new(1.0, 1.0), Vec2::new(3.0, 3.0)]);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec![7, 5]);
    }

    #[test]
    fn test_snapshot_skips_freed_obstacles() {
        let mut registry = ObstacleRegistry::new();
        let kept = rock(1, 1.0, 1.0);
        let dropped = rock(2, 2.0, 2.0);
        registry.add(&kept);
        registry.add(&dropped);
        drop(dropped);

        // Membership is not touched by the drop, only the positions read
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.snapshot(), vec![Vec2::new(1.0, 1.0)]);

        assert_eq!(registry.prune(), 1);
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(2));
    }

    #[test]
    fn test_self_registration() {
        let registry = ObstacleRegistry::shared();
        let r = rock(9, 4.0, 2.0);

        assert!(r.register(&registry));
        assert!(!r.register(&registry));
        assert_eq!(registry.read().snapshot(), vec![Vec2::new(4.0, 2.0)]);
        assert!(r.deregister(&registry));
        assert!(!r.deregister(&registry));
        assert!(registry.read().is_empty());
    }

    struct Debris {
        id: EntityId,
    }

    impl Obstacle for Debris {
        fn id(&self) -> EntityId {
            self.id
        }

        fn position(&self) -> Vec2 {
            Vec2::new(self.id as f32, 0.0)
        }
    }

    #[test]
    fn test_mixed_obstacle_types_share_a_registry() {
        let mut registry = ObstacleRegistry::new();
        let r = rock(1, 5.0, 5.0);
        let d = Arc::new(Debris { id: 2 });

        assert!(registry.add(&r));
        assert!(registry.add(&d));
        assert_eq!(registry.snapshot(), vec![Vec2::new(5.0, 5.0), Vec2::new(2.0, 0.0)]);
    }

    #[test]
    fn test_live_objects_are_independent() {
        let live = LiveObjects::new();
        let r = rock(1, 0.0, 0.0);
        live.asteroids.write().add(&r);

        assert_eq!(live.asteroid_count(), 1);
        assert_eq!(live.bullet_count(), 0);

        live.clear();
        assert_eq!(live.asteroid_count(), 0);
    }
}
