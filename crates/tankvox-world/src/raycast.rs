//! Grid traversal raycast (Amanatides & Woo).
//!
//! Shared by gameplay line of sight, projectile impacts and AI probes.

use glam::{IVec3, Vec3};
use tankvox_core::constants::RAYCAST_STEP_FACTOR;
use tankvox_core::material::{Material, MaterialTable};
use tankvox_core::math::world_to_voxel;
use tankvox_core::types::VoxelCoord;

use crate::chunk_store::ChunkStore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub voxel: VoxelCoord,
    /// Face normal of the entered face, pointing back toward the ray origin.
    pub normal: IVec3,
    /// World distance from the origin to the entry point.
    pub distance: f32,
    pub material: Material,
}

/// Walk the grid from `origin` along `direction` until a solid voxel is
/// entered or `max_distance` is exceeded.
///
/// The voxel containing the origin is never tested. Zero direction
/// components never step, so a zero direction returns `None`.
pub fn raycast(
    store: &ChunkStore,
    materials: &MaterialTable,
    voxel_size: f32,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
) -> Option<RaycastHit> {
    let dir = direction.normalize_or_zero();
    if dir == Vec3::ZERO || !(max_distance > 0.0) {
        return None;
    }

    let mut voxel = world_to_voxel(origin, voxel_size);
    let mut step = IVec3::ZERO;
    let mut t_max = Vec3::splat(f32::INFINITY);
    let mut t_delta = Vec3::splat(f32::INFINITY);

    for axis in 0..3 {
        let lo = voxel[axis] as f32 * voxel_size;
        if dir[axis] > 0.0 {
            step[axis] = 1;
            t_delta[axis] = voxel_size / dir[axis];
            t_max[axis] = (lo + voxel_size - origin[axis]) / dir[axis];
        } else if dir[axis] < 0.0 {
            step[axis] = -1;
            t_delta[axis] = voxel_size / -dir[axis];
            t_max[axis] = (origin[axis] - lo) / -dir[axis];
        }
    }

    let max_steps = (RAYCAST_STEP_FACTOR * max_distance / voxel_size).ceil() as u32;
    for _ in 0..max_steps {
        let axis = if t_max.x <= t_max.y && t_max.x <= t_max.z {
            0
        } else if t_max.y <= t_max.z {
            1
        } else {
            2
        };

        let entry = t_max[axis];
        if entry > max_distance {
            return None;
        }
        voxel[axis] += step[axis];
        t_max[axis] += t_delta[axis];

        if let Some(material) = store.get_voxel(voxel) {
            if materials.is_solid(material) {
                let mut normal = IVec3::ZERO;
                normal[axis] = -step[axis];
                return Some(RaycastHit {
                    voxel,
                    normal,
                    distance: entry.max(0.0),
                    material,
                });
            }
        }
    }
    None
}
