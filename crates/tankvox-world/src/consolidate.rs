//! Greedy merge of solid voxels into box colliders, one set per chunk.
//!
//! Growth order is fixed: X first, then whole X-rows along Z, then whole
//! X×Z layers along Y. The result is reproducible, not minimal.

use glam::{IVec3, Vec3};
use tankvox_core::constants::CHUNK_SIZE;
use tankvox_core::material::{Material, MaterialTable};
use tankvox_core::math::{chunk_local_to_world, local_index, voxel_min_corner};
use tankvox_core::types::{ChunkCoord, LocalCoord};

use crate::backend::{BodyHandle, BodyKind, ColliderDesc, ColliderHandle, PhysicsBackend};
use crate::chunk::Chunk;

/// An axis-aligned run of one material, in chunk-local coordinates.
/// `min` and `max` are both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelBox {
    pub material: Material,
    pub min: LocalCoord,
    pub max: LocalCoord,
}

impl VoxelBox {
    /// Edge lengths in voxels.
    pub fn size(&self) -> IVec3 {
        self.max - self.min + IVec3::ONE
    }

    pub fn volume(&self) -> usize {
        let s = self.size();
        (s.x * s.y * s.z) as usize
    }

    pub fn contains(&self, local: LocalCoord) -> bool {
        local.cmpge(self.min).all() && local.cmple(self.max).all()
    }

    pub fn world_center(&self, chunk: ChunkCoord, voxel_size: f32) -> Vec3 {
        let lo = voxel_min_corner(chunk_local_to_world(chunk, self.min), voxel_size);
        lo + self.half_extents(voxel_size)
    }

    pub fn half_extents(&self, voxel_size: f32) -> Vec3 {
        self.size().as_vec3() * voxel_size * 0.5
    }
}

/// A box registered with the physics backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsolidatedBox {
    pub bounds: VoxelBox,
    pub body: BodyHandle,
    pub collider: ColliderHandle,
}

/// Partition the solid voxels of `chunk` into boxes.
pub fn greedy_boxes(chunk: &Chunk, materials: &MaterialTable) -> Vec<VoxelBox> {
    let cs = CHUNK_SIZE as i32;
    let dense = chunk.to_dense();
    let mut visited = vec![false; dense.len()];
    let mut boxes = Vec::new();

    let at = |x: i32, y: i32, z: i32| local_index(IVec3::new(x, y, z));

    for x in 0..cs {
        for y in 0..cs {
            for z in 0..cs {
                let start = at(x, y, z);
                if visited[start] {
                    continue;
                }
                let Some(material) = dense[start] else {
                    continue;
                };
                if !materials.is_solid(material) {
                    visited[start] = true;
                    continue;
                }

                let open = |visited: &[bool], i: usize| !visited[i] && dense[i] == Some(material);

                let mut x_end = x;
                while x_end + 1 < cs && open(&visited, at(x_end + 1, y, z)) {
                    x_end += 1;
                }

                let mut z_end = z;
                while z_end + 1 < cs && (x..=x_end).all(|xi| open(&visited, at(xi, y, z_end + 1))) {
                    z_end += 1;
                }

                let mut y_end = y;
                while y_end + 1 < cs
                    && (x..=x_end)
                        .all(|xi| (z..=z_end).all(|zi| open(&visited, at(xi, y_end + 1, zi))))
                {
                    y_end += 1;
                }

                for xi in x..=x_end {
                    for yi in y..=y_end {
                        for zi in z..=z_end {
                            visited[at(xi, yi, zi)] = true;
                        }
                    }
                }
                boxes.push(VoxelBox {
                    material,
                    min: IVec3::new(x, y, z),
                    max: IVec3::new(x_end, y_end, z_end),
                });
            }
        }
    }
    boxes
}

/// Replace every collider owned by `chunk` with a fresh consolidated set.
///
/// Old bodies are always removed first. A body the backend no longer knows
/// is logged and skipped.
pub fn update_chunk_physics(
    chunk: &mut Chunk,
    physics: &mut dyn PhysicsBackend,
    materials: &MaterialTable,
    voxel_size: f32,
) {
    for old in chunk.colliders.drain(..) {
        if let Err(e) = physics.remove_body(old.body) {
            log::debug!("chunk {}: stale collider body: {e}", chunk.coord);
        }
    }

    for bounds in greedy_boxes(chunk, materials) {
        let center = bounds.world_center(chunk.coord, voxel_size);
        let body = physics.create_body(BodyKind::Fixed, center);
        let desc = ColliderDesc::cuboid(bounds.half_extents(voxel_size))
            .with_material(bounds.material, materials.get(bounds.material));
        match physics.create_collider(body, desc) {
            Ok(collider) => chunk.colliders.push(ConsolidatedBox {
                bounds,
                body,
                collider,
            }),
            Err(e) => {
                log::debug!("chunk {}: collider rejected: {e}", chunk.coord);
                let _ = physics.remove_body(body);
            }
        }
    }
    chunk.needs_physics_update = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessPhysics;

    fn random_chunk(seed: u64, fill: f32) -> Chunk {
        let mut rng = fastrand::Rng::with_seed(seed);
        let palette = [
            Material::Stone,
            Material::Dirt,
            Material::Water,
            Material::Brick,
        ];
        let mut chunk = Chunk::new(IVec3::new(-1, 0, 2));
        let cs = CHUNK_SIZE as i32;
        for x in 0..cs {
            for y in 0..cs {
                for z in 0..cs {
                    if rng.f32() < fill {
                        let m = palette[rng.usize(..palette.len())];
                        chunk.set(IVec3::new(x, y, z), Some(m));
                    }
                }
            }
        }
        chunk
    }

    fn assert_partition(chunk: &Chunk, boxes: &[VoxelBox], materials: &MaterialTable) {
        let mut cover = vec![0u8; chunk.to_dense().len()];
        for b in boxes {
            for x in b.min.x..=b.max.x {
                for y in b.min.y..=b.max.y {
                    for z in b.min.z..=b.max.z {
                        let local = IVec3::new(x, y, z);
                        assert_eq!(
                            chunk.get(local),
                            Some(b.material),
                            "box {b:?} covers {local} holding {:?}",
                            chunk.get(local)
                        );
                        cover[local_index(local)] += 1;
                    }
                }
            }
        }
        for (local, material) in chunk.iter() {
            let expected = u8::from(materials.is_solid(material));
            assert_eq!(
                cover[local_index(local)],
                expected,
                "{local} ({material:?}) covered {} times",
                cover[local_index(local)]
            );
        }
    }

    #[test]
    fn test_random_fills_partition_solid_voxels() {
        let materials = MaterialTable::default();
        for seed in 0..12u64 {
            let fill = [0.1, 0.5, 0.9][seed as usize % 3];
            let chunk = random_chunk(seed, fill);
            let boxes = greedy_boxes(&chunk, &materials);
            assert_partition(&chunk, &boxes, &materials);
        }
    }

    #[test]
    fn test_full_chunk_is_one_box() {
        let materials = MaterialTable::default();
        let mut chunk = Chunk::new(IVec3::ZERO);
        let cs = CHUNK_SIZE as i32;
        for x in 0..cs {
            for y in 0..cs {
                for z in 0..cs {
                    chunk.set(IVec3::new(x, y, z), Some(Material::Concrete));
                }
            }
        }
        let boxes = greedy_boxes(&chunk, &materials);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].volume(), (cs * cs * cs) as usize);
    }

    #[test]
    fn test_growth_order_is_x_then_z_then_y() {
        let materials = MaterialTable::default();
        let mut chunk = Chunk::new(IVec3::ZERO);
        // An L: a 3-long X row at z=0 plus one extra voxel at (0,0,1).
        for x in 0..3 {
            chunk.set(IVec3::new(x, 0, 0), Some(Material::Stone));
        }
        chunk.set(IVec3::new(0, 0, 1), Some(Material::Stone));
        let boxes = greedy_boxes(&chunk, &materials);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].min, IVec3::ZERO);
        assert_eq!(boxes[0].max, IVec3::new(2, 0, 0), "X grows first and Z row is incomplete");
        assert_eq!(boxes[1].size(), IVec3::ONE);
    }

    #[test]
    fn test_materials_never_merge() {
        let materials = MaterialTable::default();
        let mut chunk = Chunk::new(IVec3::ZERO);
        chunk.set(IVec3::new(0, 0, 0), Some(Material::Stone));
        chunk.set(IVec3::new(1, 0, 0), Some(Material::Dirt));
        assert_eq!(greedy_boxes(&chunk, &materials).len(), 2);
    }

    #[test]
    fn test_non_solid_produces_no_box() {
        let materials = MaterialTable::default();
        let mut chunk = Chunk::new(IVec3::ZERO);
        chunk.set(IVec3::new(4, 4, 4), Some(Material::Water));
        assert!(greedy_boxes(&chunk, &materials).is_empty());
    }

    #[test]
    fn test_box_world_placement() {
        let b = VoxelBox {
            material: Material::Stone,
            min: IVec3::new(0, 0, 0),
            max: IVec3::new(1, 0, 3),
        };
        let center = b.world_center(IVec3::new(-1, 0, 0), 0.5);
        assert_eq!(center, Vec3::new(-8.0 + 0.5, 0.25, 1.0));
        assert_eq!(b.half_extents(0.5), Vec3::new(0.5, 0.25, 1.0));
    }

    #[test]
    fn test_rebuild_releases_previous_bodies() {
        let materials = MaterialTable::default();
        let mut physics = HeadlessPhysics::new();
        let mut chunk = random_chunk(7, 0.3);

        update_chunk_physics(&mut chunk, &mut physics, &materials, 1.0);
        let first = chunk.colliders.len();
        assert!(first > 0);
        assert_eq!(physics.body_count(), first);
        assert!(!chunk.needs_physics_update);

        update_chunk_physics(&mut chunk, &mut physics, &materials, 1.0);
        assert_eq!(physics.body_count(), first, "no leaked bodies across rebuilds");
        let desc = physics.collider_desc(chunk.colliders[0].collider).unwrap();
        assert_eq!(desc.tag, Some(chunk.colliders[0].bounds.material));
    }
}
