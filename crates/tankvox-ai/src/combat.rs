//! Shells in flight. Each tick a shell sweeps its travel segment against the
//! voxel grid and the vehicle hulls; the first contact explodes.

use glam::Vec3;
use tankvox_world::backend::{BodyHandle, PhysicsBackend};
use tankvox_world::VoxelWorld;

use crate::agent::Shot;
use crate::config::ProjectileConfig;
use crate::vehicle::{DamageOutcome, Vehicle};

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub position: Vec3,
    pub velocity: Vec3,
    pub damage: f32,
    pub shooter: BodyHandle,
    /// Seconds since firing.
    pub age: f32,
    expired: bool,
}

/// One detonation.
#[derive(Debug, Clone, PartialEq)]
pub struct Impact {
    pub point: Vec3,
    pub voxels_destroyed: usize,
    pub hits: Vec<(BodyHandle, DamageOutcome)>,
}

#[derive(Debug, Default)]
pub struct ProjectileSet {
    projectiles: Vec<Projectile>,
}

impl ProjectileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&mut self, shot: Shot, config: &ProjectileConfig) {
        self.projectiles.push(Projectile {
            position: shot.origin,
            velocity: shot.direction.normalize_or_zero() * config.speed,
            damage: shot.damage,
            shooter: shot.shooter,
            age: 0.0,
            expired: false,
        });
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.iter()
    }

    /// Advance every shell by `dt`. Shells that hit something or outlive
    /// their lifetime are removed after the pass.
    pub fn update(
        &mut self,
        dt: f32,
        config: &ProjectileConfig,
        world: &mut VoxelWorld,
        physics: &dyn PhysicsBackend,
        vehicles: &mut [&mut Vehicle],
    ) -> Vec<Impact> {
        let mut impacts = Vec::new();
        let hulls: Vec<Option<Vec3>> = vehicles.iter().map(|v| v.position(physics)).collect();

        for shell in &mut self.projectiles {
            shell.age += dt;
            if shell.age > config.lifetime {
                shell.expired = true;
                continue;
            }
            let step = shell.velocity * dt;
            let length = step.length();
            if length <= f32::EPSILON {
                continue;
            }

            let mut contact: Option<(f32, Option<usize>)> = world
                .raycast(shell.position, step, length)
                .map(|hit| (hit.distance, None));
            for (i, hull) in hulls.iter().enumerate() {
                let Some(center) = hull else {
                    continue;
                };
                if vehicles[i].body == shell.shooter || vehicles[i].is_destroyed() {
                    continue;
                }
                let Some(t) = segment_sphere(shell.position, step, *center, config.hit_radius) else {
                    continue;
                };
                let distance = t * length;
                if contact.map_or(true, |(d, _)| distance < d) {
                    contact = Some((distance, Some(i)));
                }
            }

            let Some((distance, direct)) = contact else {
                shell.position += step;
                continue;
            };
            let point = shell.position + step / length * distance;
            shell.position = point;
            shell.expired = true;

            let destroyed = world.explode(point, config.blast_radius);
            let reach = config.blast_radius + config.hit_radius;
            let mut hits = Vec::new();
            for (i, hull) in hulls.iter().enumerate() {
                let Some(center) = hull else {
                    continue;
                };
                let vehicle = &mut *vehicles[i];
                if vehicle.body == shell.shooter || vehicle.is_destroyed() {
                    continue;
                }
                let amount = if direct == Some(i) {
                    shell.damage
                } else {
                    let d = center.distance(point);
                    if d > reach {
                        continue;
                    }
                    shell.damage * (1.0 - d / reach)
                };
                hits.push((vehicle.body, vehicle.take_damage(amount)));
            }
            log::debug!(
                "shell from {:?} hit at {point}: {} voxels, {} vehicles",
                shell.shooter,
                destroyed.len(),
                hits.len()
            );
            impacts.push(Impact {
                point,
                voxels_destroyed: destroyed.len(),
                hits,
            });
        }

        self.projectiles.retain(|p| !p.expired);
        impacts
    }

    pub fn clear(&mut self) {
        self.projectiles.clear();
    }
}

/// First parameter in `[0, 1]` where `origin + t * step` enters the sphere.
fn segment_sphere(origin: Vec3, step: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let offset = origin - center;
    let a = step.length_squared();
    let b = 2.0 * offset.dot(step);
    let c = offset.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()) / (2.0 * a);
    (0.0..=1.0).contains(&t).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::VehicleKind;
    use glam::IVec3;
    use tankvox_core::config::WorldConfig;
    use tankvox_core::material::{Material, MaterialTable};
    use tankvox_world::headless::HeadlessPhysics;

    const DT: f32 = 1.0 / 30.0;

    fn shot(origin: Vec3, direction: Vec3, shooter: BodyHandle) -> Shot {
        Shot {
            origin,
            direction,
            damage: 10.0,
            shooter,
        }
    }

    fn empty_world() -> VoxelWorld {
        VoxelWorld::new(WorldConfig::default(), MaterialTable::default())
    }

    #[test]
    fn test_segment_sphere_entry() {
        let t = segment_sphere(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0), 1.0);
        assert!((t.unwrap() - 0.4).abs() < 1e-5);
        assert!(segment_sphere(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0), 1.0).is_none());
        assert!(segment_sphere(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::new(5.0, 2.0, 0.0), 1.0).is_none());
        assert_eq!(segment_sphere(Vec3::ZERO, Vec3::X, Vec3::ZERO, 1.0), Some(0.0));
    }

    #[test]
    fn test_shell_blasts_wall() {
        let mut world = empty_world();
        for y in 0..3 {
            for z in -2..=2 {
                world.set_voxel(IVec3::new(5, y, z), Some(Material::Brick));
            }
        }
        let physics = HeadlessPhysics::new();
        let config = ProjectileConfig::default();
        let mut shells = ProjectileSet::new();
        shells.fire(shot(Vec3::new(0.5, 1.5, 0.5), Vec3::X, BodyHandle(99)), &config);

        let mut impacts = Vec::new();
        for _ in 0..30 {
            impacts.extend(shells.update(DT, &config, &mut world, &physics, &mut []));
        }
        assert_eq!(impacts.len(), 1);
        let impact = &impacts[0];
        assert!((impact.point.x - 5.0).abs() < 1e-3, "{}", impact.point);
        assert!(impact.voxels_destroyed > 0);
        assert!(world.get_voxel(IVec3::new(5, 1, 0)).is_none());
        assert!(shells.is_empty());
    }

    #[test]
    fn test_direct_hit_and_splash() {
        let mut world = empty_world();
        let mut physics = HeadlessPhysics::with_gravity(0.0);
        let config = ProjectileConfig::default();
        let mut shooter = Vehicle::spawn(VehicleKind::Player, &mut physics, None, Vec3::ZERO).unwrap();
        let mut target = Vehicle::spawn(VehicleKind::Enemy, &mut physics, None, Vec3::new(10.0, 0.0, 0.0)).unwrap();
        let mut bystander =
            Vehicle::spawn(VehicleKind::Enemy, &mut physics, None, Vec3::new(10.0, 0.0, 1.5)).unwrap();
        let mut far = Vehicle::spawn(VehicleKind::Enemy, &mut physics, None, Vec3::new(10.0, 0.0, 20.0)).unwrap();

        let mut shells = ProjectileSet::new();
        shells.fire(shot(Vec3::new(1.0, 0.0, 0.0), Vec3::X, shooter.body), &config);
        let mut impacts = Vec::new();
        for _ in 0..30 {
            let mut vehicles = [&mut shooter, &mut target, &mut bystander, &mut far];
            impacts.extend(shells.update(DT, &config, &mut world, &physics, &mut vehicles));
        }

        assert_eq!(impacts.len(), 1);
        assert!((impacts[0].point.x - 9.0).abs() < 1e-3, "{}", impacts[0].point);
        assert_eq!(target.health, 30.0);
        assert!(bystander.health < 40.0 && bystander.health > 30.0, "{}", bystander.health);
        assert_eq!(far.health, 40.0);
        assert_eq!(shooter.health, 100.0);
        assert_eq!(impacts[0].hits.len(), 2);
    }

    #[test]
    fn test_shooter_is_never_hit_by_own_shell() {
        let mut world = empty_world();
        let mut physics = HeadlessPhysics::with_gravity(0.0);
        let config = ProjectileConfig::default();
        let mut shooter = Vehicle::spawn(VehicleKind::Enemy, &mut physics, None, Vec3::ZERO).unwrap();
        let mut shells = ProjectileSet::new();
        shells.fire(shot(Vec3::ZERO, Vec3::X, shooter.body), &config);
        let impacts = shells.update(DT, &config, &mut world, &physics, &mut [&mut shooter]);
        assert!(impacts.is_empty());
        assert_eq!(shells.len(), 1);
    }

    #[test]
    fn test_shell_expires_after_lifetime() {
        let mut world = empty_world();
        let physics = HeadlessPhysics::new();
        let config = ProjectileConfig::default();
        let mut shells = ProjectileSet::new();
        shells.fire(shot(Vec3::new(0.5, 50.5, 0.5), Vec3::Y, BodyHandle(1)), &config);
        let ticks = (config.lifetime / DT).ceil() as usize;
        for _ in 0..ticks - 1 {
            shells.update(DT, &config, &mut world, &physics, &mut []);
        }
        assert_eq!(shells.len(), 1);
        for _ in 0..3 {
            shells.update(DT, &config, &mut world, &physics, &mut []);
        }
        assert!(shells.is_empty());
    }

    #[test]
    fn test_wrecks_are_ignored() {
        let mut world = empty_world();
        let mut physics = HeadlessPhysics::with_gravity(0.0);
        let config = ProjectileConfig::default();
        let mut wreck = Vehicle::spawn(VehicleKind::Enemy, &mut physics, None, Vec3::new(5.0, 0.0, 0.0)).unwrap();
        wreck.take_damage(100.0);
        let mut shells = ProjectileSet::new();
        shells.fire(shot(Vec3::ZERO, Vec3::X, BodyHandle(77)), &config);
        for _ in 0..10 {
            let impacts = shells.update(DT, &config, &mut world, &physics, &mut [&mut wreck]);
            assert!(impacts.is_empty());
        }
    }
}
