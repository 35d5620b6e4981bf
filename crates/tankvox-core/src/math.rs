use crate::constants::CHUNK_SIZE;
use crate::types::{ChunkCoord, LocalCoord, VoxelCoord};
use glam::{IVec3, Vec3};

/// Convert a world-space position to the voxel containing it.
/// Uniform scale followed by floor, so negative positions land in negative voxels.
pub fn world_to_voxel(world: Vec3, voxel_size: f32) -> VoxelCoord {
    let v = (world / voxel_size).floor();
    IVec3::new(v.x as i32, v.y as i32, v.z as i32)
}

/// World-space centre of a voxel.
pub fn voxel_to_world(voxel: VoxelCoord, voxel_size: f32) -> Vec3 {
    (voxel.as_vec3() + Vec3::splat(0.5)) * voxel_size
}

/// World-space minimum corner of a voxel.
pub fn voxel_min_corner(voxel: VoxelCoord, voxel_size: f32) -> Vec3 {
    voxel.as_vec3() * voxel_size
}

/// Convert a voxel coordinate to its containing chunk coordinate.
pub fn world_to_chunk(world: VoxelCoord) -> ChunkCoord {
    let cs = CHUNK_SIZE as i32;
    IVec3::new(
        world.x.div_euclid(cs),
        world.y.div_euclid(cs),
        world.z.div_euclid(cs),
    )
}

/// Convert a voxel coordinate to its local offset within a chunk.
pub fn world_to_local(world: VoxelCoord) -> LocalCoord {
    let cs = CHUNK_SIZE as i32;
    IVec3::new(
        world.x.rem_euclid(cs),
        world.y.rem_euclid(cs),
        world.z.rem_euclid(cs),
    )
}

/// Convert a chunk coordinate and local offset back to a voxel coordinate.
pub fn chunk_local_to_world(chunk: ChunkCoord, local: LocalCoord) -> VoxelCoord {
    let cs = CHUNK_SIZE as i32;
    IVec3::new(
        chunk.x * cs + local.x,
        chunk.y * cs + local.y,
        chunk.z * cs + local.z,
    )
}

/// Whether a local coordinate lies inside the chunk bounds.
pub fn local_in_bounds(local: LocalCoord) -> bool {
    let cs = CHUNK_SIZE as i32;
    local.cmpge(IVec3::ZERO).all() && local.cmplt(IVec3::splat(cs)).all()
}

/// Chunk-space offsets of the neighbours sharing a face with this local voxel.
///
/// A voxel with local x == 0 touches the chunk at -X, x == CHUNK_SIZE-1 the
/// chunk at +X, and so on. Interior voxels return an empty list; a corner
/// voxel returns three offsets.
pub fn boundary_neighbor_offsets(local: LocalCoord) -> Vec<IVec3> {
    let last = CHUNK_SIZE as i32 - 1;
    let mut offsets = Vec::new();
    for axis in 0..3 {
        let mut unit = IVec3::ZERO;
        unit[axis] = 1;
        if local[axis] == 0 {
            offsets.push(-unit);
        }
        if local[axis] == last {
            offsets.push(unit);
        }
    }
    offsets
}

/// Flat index of a local coordinate, x fastest, then z, then y.
pub fn local_index(local: LocalCoord) -> usize {
    let cs = CHUNK_SIZE as usize;
    local.x as usize + local.z as usize * cs + local.y as usize * cs * cs
}

/// Rotate a horizontal direction around +Y by `angle` radians.
/// Positive angles turn counter-clockwise seen from above (toward -Z when facing +X).
pub fn rotate_y(dir: Vec3, angle: f32) -> Vec3 {
    let (s, c) = angle.sin_cos();
    Vec3::new(dir.x * c + dir.z * s, dir.y, -dir.x * s + dir.z * c)
}

/// Project onto the XZ plane and normalize. Returns zero for vertical input.
pub fn flatten(dir: Vec3) -> Vec3 {
    Vec3::new(dir.x, 0.0, dir.z).normalize_or_zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_to_chunk_positive() {
        assert_eq!(world_to_chunk(IVec3::new(0, 0, 0)), IVec3::ZERO);
        assert_eq!(world_to_chunk(IVec3::new(15, 15, 15)), IVec3::ZERO);
        assert_eq!(world_to_chunk(IVec3::new(16, 0, 0)), IVec3::new(1, 0, 0));
    }

    #[test]
    fn test_world_to_chunk_negative() {
        assert_eq!(world_to_chunk(IVec3::new(-1, 0, 0)), IVec3::new(-1, 0, 0));
        assert_eq!(world_to_chunk(IVec3::new(-16, 0, 0)), IVec3::new(-1, 0, 0));
        assert_eq!(world_to_chunk(IVec3::new(-17, 0, 0)), IVec3::new(-2, 0, 0));
    }

    #[test]
    fn test_world_to_local_negative() {
        assert_eq!(world_to_local(IVec3::new(-1, 0, 0)), IVec3::new(15, 0, 0));
        assert_eq!(world_to_local(IVec3::new(-16, 0, 0)), IVec3::new(0, 0, 0));
        assert_eq!(world_to_local(IVec3::new(-1, -1, -1)), IVec3::splat(15));
    }

    #[test]
    fn test_minus_one_maps_to_last_local_of_minus_one_chunk() {
        let voxel = world_to_voxel(Vec3::new(-0.5, -0.5, -0.5), 1.0);
        assert_eq!(voxel, IVec3::splat(-1));
        assert_eq!(world_to_chunk(voxel), IVec3::splat(-1));
        assert_eq!(world_to_local(voxel), IVec3::splat(CHUNK_SIZE as i32 - 1));
    }

    #[test]
    fn test_coordinate_round_trip_is_idempotent() {
        for voxel_size in [0.5f32, 1.0, 2.0] {
            for x in -40..40 {
                let v = IVec3::new(x, -x / 2, x * 3);
                let world = voxel_to_world(v, voxel_size);
                let back = world_to_voxel(world, voxel_size);
                assert_eq!(back, v, "voxel {v} at size {voxel_size}");
                let local = world_to_local(back);
                assert!(local_in_bounds(local), "local {local} out of range");
                assert_eq!(chunk_local_to_world(world_to_chunk(back), local), v);
                assert_eq!(world_to_local(chunk_local_to_world(world_to_chunk(v), local)), local);
            }
        }
    }

    #[test]
    fn test_boundary_offsets() {
        assert!(boundary_neighbor_offsets(IVec3::new(5, 5, 5)).is_empty());
        assert_eq!(
            boundary_neighbor_offsets(IVec3::new(0, 5, 5)),
            vec![IVec3::new(-1, 0, 0)]
        );
        let corner = boundary_neighbor_offsets(IVec3::new(15, 0, 15));
        assert_eq!(corner.len(), 3);
        assert!(corner.contains(&IVec3::new(1, 0, 0)));
        assert!(corner.contains(&IVec3::new(0, -1, 0)));
        assert!(corner.contains(&IVec3::new(0, 0, 1)));
    }

    #[test]
    fn test_local_index_unique() {
        let cs = CHUNK_SIZE as i32;
        let mut seen = vec![false; (cs * cs * cs) as usize];
        for y in 0..cs {
            for z in 0..cs {
                for x in 0..cs {
                    let idx = local_index(IVec3::new(x, y, z));
                    assert!(!seen[idx]);
                    seen[idx] = true;
                }
            }
        }
    }

    #[test]
    fn test_rotate_y_quarter_turn() {
        let left = rotate_y(Vec3::X, std::f32::consts::FRAC_PI_2);
        assert!((left - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5, "{left}");
    }
}
