//! Tanks. Player and enemy share one struct; what differs lives in
//! `VehicleKind`.

use glam::{Quat, Vec3};
use tankvox_world::backend::{BodyHandle, BodyKind, ColliderDesc, PhysicsBackend, PhysicsError};

use crate::scene::{ObstacleId, ObstacleSet};

/// Hull half extents in world units.
pub const HULL_HALF_EXTENTS: Vec3 = Vec3::new(0.9, 0.5, 0.9);
const HULL_DENSITY: f32 = 2.0;
const HULL_FRICTION: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleKind {
    Player,
    Enemy,
}

impl VehicleKind {
    pub fn max_health(self) -> f32 {
        match self {
            VehicleKind::Player => 100.0,
            VehicleKind::Enemy => 40.0,
        }
    }

    /// Seconds between shots when nothing overrides it.
    pub fn fire_cooldown(self) -> f32 {
        match self {
            VehicleKind::Player => 0.5,
            VehicleKind::Enemy => 2.0,
        }
    }

    /// Multiplier on incoming damage.
    pub fn armor_factor(self) -> f32 {
        match self {
            VehicleKind::Player => 0.5,
            VehicleKind::Enemy => 1.0,
        }
    }

    pub fn shell_damage(self) -> f32 {
        match self {
            VehicleKind::Player => 20.0,
            VehicleKind::Enemy => 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    Damaged { remaining: f32 },
    Destroyed,
    /// Hits on a wreck change nothing.
    AlreadyDestroyed,
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    pub kind: VehicleKind,
    pub body: BodyHandle,
    pub obstacle: Option<ObstacleId>,
    pub health: f32,
    /// Earliest time the gun can fire again.
    ready_at: f64,
}

impl Vehicle {
    /// Register a hull body at `position` and, with a scene, an obstacle box
    /// other agents can see.
    pub fn spawn(
        kind: VehicleKind,
        physics: &mut dyn PhysicsBackend,
        scene: Option<&mut ObstacleSet>,
        position: Vec3,
    ) -> Result<Self, PhysicsError> {
        let body = physics.create_body(BodyKind::Dynamic, position);
        let mut desc = ColliderDesc::cuboid(HULL_HALF_EXTENTS);
        desc.density = HULL_DENSITY;
        desc.friction = HULL_FRICTION;
        if let Err(e) = physics.create_collider(body, desc) {
            let _ = physics.remove_body(body);
            return Err(e);
        }
        let obstacle = scene.map(|s| s.add_box(position, HULL_HALF_EXTENTS));
        Ok(Self {
            kind,
            body,
            obstacle,
            health: kind.max_health(),
            ready_at: 0.0,
        })
    }

    /// Release the body and the obstacle box.
    pub fn despawn(&self, physics: &mut dyn PhysicsBackend, scene: Option<&mut ObstacleSet>) {
        if let Err(e) = physics.remove_body(self.body) {
            log::debug!("{:?} despawn: {e}", self.kind);
        }
        if let (Some(scene), Some(id)) = (scene, self.obstacle) {
            scene.remove(id);
        }
    }

    pub fn position(&self, physics: &dyn PhysicsBackend) -> Option<Vec3> {
        physics.translation(self.body).ok()
    }

    pub fn take_damage(&mut self, amount: f32) -> DamageOutcome {
        if self.is_destroyed() {
            return DamageOutcome::AlreadyDestroyed;
        }
        self.health -= amount.max(0.0) * self.kind.armor_factor();
        if self.health <= 0.0 {
            self.health = 0.0;
            DamageOutcome::Destroyed
        } else {
            DamageOutcome::Damaged {
                remaining: self.health,
            }
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.health <= 0.0
    }

    pub fn ready_to_fire(&self, now: f64) -> bool {
        !self.is_destroyed() && now >= self.ready_at
    }

    /// Start a cooldown of `cooldown` seconds from `now`.
    pub fn reload(&mut self, now: f64, cooldown: f32) {
        self.ready_at = now + f64::from(cooldown);
    }

    /// Fire with the kind's own cooldown. Returns false while reloading.
    pub fn try_fire(&mut self, now: f64) -> bool {
        if !self.ready_to_fire(now) {
            return false;
        }
        self.reload(now, self.kind.fire_cooldown());
        true
    }

    /// Face the hull along a flat heading.
    pub fn set_heading(&self, physics: &mut dyn PhysicsBackend, heading: Vec3) {
        let yaw = (-heading.z).atan2(heading.x);
        if let Err(e) = physics.set_rotation(self.body, Quat::from_rotation_y(yaw)) {
            log::debug!("{:?} heading: {e}", self.kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tankvox_world::headless::HeadlessPhysics;

    #[test]
    fn test_enemy_destroyed_after_enough_hits() {
        let mut physics = HeadlessPhysics::new();
        let mut v = Vehicle::spawn(VehicleKind::Enemy, &mut physics, None, Vec3::ZERO).unwrap();
        assert_eq!(v.take_damage(15.0), DamageOutcome::Damaged { remaining: 25.0 });
        assert_eq!(v.take_damage(30.0), DamageOutcome::Destroyed);
        assert_eq!(v.health, 0.0);
        assert_eq!(v.take_damage(5.0), DamageOutcome::AlreadyDestroyed);
    }

    #[test]
    fn test_player_armor_halves_damage() {
        let mut physics = HeadlessPhysics::new();
        let mut v = Vehicle::spawn(VehicleKind::Player, &mut physics, None, Vec3::ZERO).unwrap();
        assert_eq!(v.take_damage(20.0), DamageOutcome::Damaged { remaining: 90.0 });
    }

    #[test]
    fn test_cooldown_is_a_ready_at_timestamp() {
        let mut physics = HeadlessPhysics::new();
        let mut v = Vehicle::spawn(VehicleKind::Player, &mut physics, None, Vec3::ZERO).unwrap();
        assert!(v.try_fire(1.0));
        assert!(!v.try_fire(1.2));
        assert!(v.try_fire(1.5));
        v.reload(2.0, 10.0);
        assert!(!v.ready_to_fire(11.9));
        assert!(v.ready_to_fire(12.0));
    }

    #[test]
    fn test_spawn_and_despawn_register_everything() {
        let mut physics = HeadlessPhysics::new();
        let mut scene = ObstacleSet::new();
        let v = Vehicle::spawn(VehicleKind::Enemy, &mut physics, Some(&mut scene), Vec3::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(v.position(&physics), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(scene.len(), 1);
        v.despawn(&mut physics, Some(&mut scene));
        assert!(scene.is_empty());
        assert_eq!(physics.body_count(), 0);
        assert_eq!(v.position(&physics), None);
    }

    #[test]
    fn test_heading_sets_yaw() {
        let mut physics = HeadlessPhysics::new();
        let v = Vehicle::spawn(VehicleKind::Enemy, &mut physics, None, Vec3::ZERO).unwrap();
        v.set_heading(&mut physics, Vec3::new(0.0, 0.0, -1.0));
        let forward = physics.rotation(v.body).unwrap() * Vec3::X;
        assert!(forward.distance(Vec3::new(0.0, 0.0, -1.0)) < 1e-5, "{forward}");
    }
}
