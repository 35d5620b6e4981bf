//! Ray probes shared by every behaviour: voxel raycast first, then the
//! static scene. Either one blocking counts.

use glam::Vec3;
use tankvox_world::VoxelWorld;

use crate::config::AiConfig;
use crate::scene::{ObstacleId, StaticGeometry};

pub struct Perception<'a> {
    pub world: &'a VoxelWorld,
    pub scene: &'a dyn StaticGeometry,
    /// The probing agent's own obstacle.
    pub ignore: Option<ObstacleId>,
}

impl<'a> Perception<'a> {
    pub fn new(world: &'a VoxelWorld, scene: &'a dyn StaticGeometry, ignore: Option<ObstacleId>) -> Self {
        Self { world, scene, ignore }
    }

    /// Free distance along `direction`, capped at `max_distance`.
    pub fn clearance(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> f32 {
        let voxel = self
            .world
            .raycast(origin, direction, max_distance)
            .map_or(max_distance, |hit| hit.distance);
        let scene = self
            .scene
            .intersect_ray(origin, direction, max_distance, self.ignore.as_slice())
            .map_or(max_distance, |hit| hit.distance);
        voxel.min(scene)
    }

    pub fn has_obstacle_in_direction(&self, origin: Vec3, direction: Vec3, distance: f32) -> bool {
        self.clearance(origin, direction, distance) < distance
    }

    /// Nothing solid strictly between `from` and `to`. The target's own
    /// obstacle must be passed as `target` so it does not block itself.
    pub fn line_of_sight(&self, from: Vec3, to: Vec3, target: Option<ObstacleId>) -> bool {
        let delta = to - from;
        let distance = delta.length();
        if distance <= f32::EPSILON {
            return true;
        }
        if self.world.raycast(from, delta, distance).is_some() {
            return false;
        }
        let skip: Vec<ObstacleId> = self.ignore.into_iter().chain(target).collect();
        self.scene.intersect_ray(from, delta, distance, &skip).is_none()
    }

    /// Range, view cone and an unobstructed eye-to-centre-mass ray.
    pub fn can_see(
        &self,
        config: &AiConfig,
        position: Vec3,
        heading: Vec3,
        target_position: Vec3,
        target: Option<ObstacleId>,
    ) -> bool {
        let to_target = target_position - position;
        if to_target.length() > config.detection_range {
            return false;
        }
        let flat = Vec3::new(to_target.x, 0.0, to_target.z).normalize_or_zero();
        if flat != Vec3::ZERO && flat.angle_between(heading).to_degrees() > config.view_cone_deg {
            return false;
        }
        let eye = position + Vec3::Y * config.eye_height;
        let aim = target_position + Vec3::Y * config.target_height;
        self.line_of_sight(eye, aim, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{EmptyScene, ObstacleSet};
    use glam::IVec3;
    use tankvox_core::config::WorldConfig;
    use tankvox_core::material::{Material, MaterialTable};

    fn world_with(voxels: &[IVec3]) -> VoxelWorld {
        let mut world = VoxelWorld::new(WorldConfig::default(), MaterialTable::default());
        for v in voxels {
            world.set_voxel(*v, Some(Material::Stone));
        }
        world
    }

    #[test]
    fn test_clearance_takes_nearest_of_voxel_and_scene() {
        let world = world_with(&[IVec3::new(6, 0, 0)]);
        let mut scene = ObstacleSet::new();
        let origin = Vec3::new(0.5, 0.5, 0.5);
        let p = Perception::new(&world, &EmptyScene, None);
        assert!((p.clearance(origin, Vec3::X, 10.0) - 5.5).abs() < 1e-4);
        assert_eq!(p.clearance(origin, -Vec3::X, 10.0), 10.0);

        scene.add_box(Vec3::new(3.5, 0.5, 0.5), Vec3::splat(0.5));
        let p = Perception::new(&world, &scene, None);
        assert!((p.clearance(origin, Vec3::X, 10.0) - 2.5).abs() < 1e-4);
        assert!(p.has_obstacle_in_direction(origin, Vec3::X, 3.0));
        assert!(!p.has_obstacle_in_direction(origin, Vec3::X, 2.0));
    }

    #[test]
    fn test_own_hull_is_ignored() {
        let world = world_with(&[]);
        let mut scene = ObstacleSet::new();
        let own = scene.add_box(Vec3::ZERO, Vec3::splat(1.0));
        let p = Perception::new(&world, &scene, Some(own));
        assert_eq!(p.clearance(Vec3::ZERO, Vec3::X, 5.0), 5.0);
    }

    #[test]
    fn test_line_of_sight_through_target_hull_only() {
        let world = world_with(&[]);
        let mut scene = ObstacleSet::new();
        let target = scene.add_box(Vec3::new(10.0, 0.0, 0.0), Vec3::splat(1.0));
        let p = Perception::new(&world, &scene, None);
        assert!(p.line_of_sight(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Some(target)));

        let crate_box = scene.add_box(Vec3::new(5.0, 0.0, 0.0), Vec3::splat(0.5));
        let p = Perception::new(&world, &scene, None);
        assert!(!p.line_of_sight(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Some(target)));
        assert!(scene.remove(crate_box));

        let blocked = world_with(&[IVec3::new(5, 0, 0)]);
        let p = Perception::new(&blocked, &scene, None);
        assert!(!p.line_of_sight(Vec3::new(0.5, 0.5, 0.5), Vec3::new(10.0, 0.5, 0.5), Some(target)));
    }

    #[test]
    fn test_can_see_respects_range_and_cone() {
        let world = world_with(&[]);
        let p = Perception::new(&world, &EmptyScene, None);
        let config = AiConfig::default();
        let me = Vec3::new(0.0, 1.5, 0.0);
        assert!(p.can_see(&config, me, Vec3::X, Vec3::new(10.0, 1.5, 3.0), None));
        assert!(!p.can_see(&config, me, Vec3::X, Vec3::new(-10.0, 1.5, 0.0), None), "behind");
        let far = Vec3::new(config.detection_range + 1.0, 1.5, 0.0);
        assert!(!p.can_see(&config, me, Vec3::X, far, None), "out of range");
    }
}
