//! Non-voxel obstacles: props, fences and other vehicles.
//!
//! The AI treats a hit here exactly like a voxel hit. Queries can skip
//! obstacles so an agent's own hull does not block its probes.

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObstacleId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneHit {
    pub obstacle: ObstacleId,
    pub distance: f32,
}

/// Ray queries against static scene geometry.
pub trait StaticGeometry {
    /// Nearest intersection along the normalized `direction` within
    /// `max_distance`, skipping everything in `ignore`.
    fn intersect_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        ignore: &[ObstacleId],
    ) -> Option<SceneHit>;
}

/// A scene with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyScene;

impl StaticGeometry for EmptyScene {
    fn intersect_ray(&self, _: Vec3, _: Vec3, _: f32, _: &[ObstacleId]) -> Option<SceneHit> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObstacleShape {
    Box { min: Vec3, max: Vec3 },
    /// Triangle soup with a precomputed bounding box.
    Mesh {
        triangles: Vec<[Vec3; 3]>,
        min: Vec3,
        max: Vec3,
    },
}

impl ObstacleShape {
    pub fn mesh(triangles: Vec<[Vec3; 3]>) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for v in triangles.iter().flatten() {
            min = min.min(*v);
            max = max.max(*v);
        }
        ObstacleShape::Mesh { triangles, min, max }
    }

    fn intersect(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<f32> {
        match self {
            ObstacleShape::Box { min, max } => {
                ray_aabb(origin, direction, *min, *max).filter(|t| *t <= max_distance)
            }
            ObstacleShape::Mesh { triangles, min, max } => {
                ray_aabb(origin, direction, *min, *max).filter(|t| *t <= max_distance)?;
                triangles
                    .iter()
                    .filter_map(|tri| ray_triangle(origin, direction, tri))
                    .filter(|t| *t <= max_distance)
                    .min_by(f32::total_cmp)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub id: ObstacleId,
    pub shape: ObstacleShape,
}

/// The scene's obstacles. Vehicles register a box and move it every tick.
#[derive(Debug, Default)]
pub struct ObstacleSet {
    obstacles: Vec<Obstacle>,
    next_id: u32,
}

impl ObstacleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, shape: ObstacleShape) -> ObstacleId {
        let id = ObstacleId(self.next_id);
        self.next_id += 1;
        self.obstacles.push(Obstacle { id, shape });
        id
    }

    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3) -> ObstacleId {
        self.add(ObstacleShape::Box {
            min: center - half_extents,
            max: center + half_extents,
        })
    }

    /// Recentre a box obstacle. Returns false for unknown ids and meshes.
    pub fn move_box(&mut self, id: ObstacleId, center: Vec3) -> bool {
        let Some(obstacle) = self.obstacles.iter_mut().find(|o| o.id == id) else {
            return false;
        };
        match &mut obstacle.shape {
            ObstacleShape::Box { min, max } => {
                let half = (*max - *min) * 0.5;
                *min = center - half;
                *max = center + half;
                true
            }
            ObstacleShape::Mesh { .. } => false,
        }
    }

    pub fn remove(&mut self, id: ObstacleId) -> bool {
        let before = self.obstacles.len();
        self.obstacles.retain(|o| o.id != id);
        self.obstacles.len() != before
    }

    pub fn get(&self, id: ObstacleId) -> Option<&Obstacle> {
        self.obstacles.iter().find(|o| o.id == id)
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }
}

impl StaticGeometry for ObstacleSet {
    fn intersect_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        ignore: &[ObstacleId],
    ) -> Option<SceneHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }
        self.obstacles
            .iter()
            .filter(|o| !ignore.contains(&o.id))
            .filter_map(|o| {
                o.shape
                    .intersect(origin, direction, max_distance)
                    .map(|distance| SceneHit {
                        obstacle: o.id,
                        distance,
                    })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

/// Slab test. Returns the entry distance, or 0 when the origin is inside.
pub fn ray_aabb(origin: Vec3, direction: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let mut t_min = 0.0f32;
    let mut t_max = f32::INFINITY;
    for i in 0..3 {
        if direction[i].abs() < 1e-8 {
            if origin[i] < min[i] || origin[i] > max[i] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / direction[i];
        let mut t1 = (min[i] - origin[i]) * inv;
        let mut t2 = (max[i] - origin[i]) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }
    Some(t_min)
}

/// Möller–Trumbore. Double-sided; hits behind the origin are ignored.
pub fn ray_triangle(origin: Vec3, direction: Vec3, [a, b, c]: &[Vec3; 3]) -> Option<f32> {
    const EPSILON: f32 = 1e-7;
    let edge1 = *b - *a;
    let edge2 = *c - *a;
    let p = direction.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - *a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inv_det;
    (t > EPSILON).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall_quad(x: f32) -> Vec<[Vec3; 3]> {
        let a = Vec3::new(x, 0.0, -2.0);
        let b = Vec3::new(x, 0.0, 2.0);
        let c = Vec3::new(x, 3.0, 2.0);
        let d = Vec3::new(x, 3.0, -2.0);
        vec![[a, b, c], [a, c, d]]
    }

    #[test]
    fn test_box_entry_distance() {
        let t = ray_aabb(Vec3::ZERO, Vec3::X, Vec3::new(4.0, -1.0, -1.0), Vec3::new(6.0, 1.0, 1.0));
        assert_eq!(t, Some(4.0));
        assert_eq!(ray_aabb(Vec3::ZERO, -Vec3::X, Vec3::new(4.0, -1.0, -1.0), Vec3::new(6.0, 1.0, 1.0)), None);
        assert_eq!(ray_aabb(Vec3::ZERO, Vec3::Y, Vec3::new(4.0, -1.0, -1.0), Vec3::new(6.0, 1.0, 1.0)), None);
        assert_eq!(ray_aabb(Vec3::ZERO, Vec3::X, Vec3::splat(-1.0), Vec3::splat(1.0)), Some(0.0));
    }

    #[test]
    fn test_triangle_hit_and_miss() {
        let quad = wall_quad(5.0);
        let origin = Vec3::new(0.0, 1.0, 0.0);
        let t = quad.iter().filter_map(|tri| ray_triangle(origin, Vec3::X, tri)).next();
        assert!((t.unwrap() - 5.0).abs() < 1e-5);
        let high = Vec3::new(0.0, 4.0, 0.0);
        assert!(quad.iter().all(|tri| ray_triangle(high, Vec3::X, tri).is_none()));
        assert!(quad.iter().all(|tri| ray_triangle(origin, -Vec3::X, tri).is_none()));
    }

    #[test]
    fn test_nearest_obstacle_wins_and_ignore_skips() {
        let mut scene = ObstacleSet::new();
        let near = scene.add_box(Vec3::new(3.0, 0.0, 0.0), Vec3::splat(0.5));
        let far = scene.add(ObstacleShape::mesh(wall_quad(8.0)));

        let hit = scene.intersect_ray(Vec3::ZERO, Vec3::X, 20.0, &[]).unwrap();
        assert_eq!(hit.obstacle, near);
        assert!((hit.distance - 2.5).abs() < 1e-5);

        let hit = scene.intersect_ray(Vec3::ZERO, Vec3::X, 20.0, &[near]).unwrap();
        assert_eq!(hit.obstacle, far);
        assert!(scene.intersect_ray(Vec3::ZERO, Vec3::X, 7.0, &[near]).is_none());
    }

    #[test]
    fn test_move_and_remove_box() {
        let mut scene = ObstacleSet::new();
        let id = scene.add_box(Vec3::ZERO, Vec3::splat(1.0));
        assert!(scene.move_box(id, Vec3::new(10.0, 0.0, 0.0)));
        let hit = scene.intersect_ray(Vec3::ZERO, Vec3::X, 20.0, &[]).unwrap();
        assert!((hit.distance - 9.0).abs() < 1e-5);

        assert!(scene.remove(id));
        assert!(!scene.remove(id));
        assert!(!scene.move_box(id, Vec3::ZERO));
        assert!(scene.is_empty());
    }

    #[test]
    fn test_empty_scene_never_hits() {
        assert!(EmptyScene.intersect_ray(Vec3::ZERO, Vec3::X, 100.0, &[]).is_none());
    }
}
