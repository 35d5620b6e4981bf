use std::collections::BTreeMap;

use tankvox_core::direction::ALL_FACES;
use tankvox_core::material::{Material, MaterialTable};
use tankvox_core::math::{chunk_local_to_world, voxel_to_world};
use tankvox_core::types::VoxelCoord;

use crate::backend::{InstanceBatch, VoxelInstance};
use crate::chunk::Chunk;
use crate::chunk_store::ChunkStore;

/// A voxel needs drawing when any face neighbour is empty or see-through.
/// Neighbours are read through the store so chunk borders cull correctly.
pub fn is_exposed(store: &ChunkStore, materials: &MaterialTable, voxel: VoxelCoord) -> bool {
    ALL_FACES.iter().any(|face| {
        match store.get_voxel(voxel + face.offset()) {
            None => true,
            Some(n) => materials.is_transparent(n),
        }
    })
}

/// Group the exposed voxels of `chunk` into one batch per material.
pub fn build_batches(
    store: &ChunkStore,
    chunk: &Chunk,
    materials: &MaterialTable,
    voxel_size: f32,
) -> Vec<InstanceBatch> {
    let mut grouped: BTreeMap<Material, Vec<VoxelInstance>> = BTreeMap::new();
    for (local, material) in chunk.sorted_voxels() {
        let voxel = chunk_local_to_world(chunk.coord, local);
        if !is_exposed(store, materials, voxel) {
            continue;
        }
        grouped.entry(material).or_default().push(VoxelInstance {
            translation: voxel_to_world(voxel, voxel_size).to_array(),
        });
    }

    grouped
        .into_iter()
        .map(|(material, instances)| {
            let (r, g, b) = materials.get(material).color;
            InstanceBatch {
                material,
                color: [r, g, b],
                instances,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;

    fn solid_cube(store: &mut ChunkStore, min: IVec3, size: i32, material: Material) {
        for x in 0..size {
            for y in 0..size {
                for z in 0..size {
                    store.set_voxel(min + IVec3::new(x, y, z), Some(material));
                }
            }
        }
    }

    #[test]
    fn test_enclosed_voxel_is_culled_across_chunk_border() {
        let materials = MaterialTable::default();
        let mut store = ChunkStore::new();
        // 3x3x3 cube centred on (0,0,0): the centre's -X/-Y/-Z neighbours live in other chunks.
        solid_cube(&mut store, IVec3::splat(-1), 3, Material::Stone);

        assert!(!is_exposed(&store, &materials, IVec3::ZERO));
        let chunk = store.get(IVec3::ZERO).unwrap();
        let batches = build_batches(&store, chunk, &materials, 1.0);
        let centre = voxel_to_world(IVec3::ZERO, 1.0).to_array();
        assert!(batches
            .iter()
            .all(|b| b.instances.iter().all(|i| i.translation != centre)));
    }

    #[test]
    fn test_transparent_neighbor_exposes_face() {
        let materials = MaterialTable::default();
        let mut store = ChunkStore::new();
        solid_cube(&mut store, IVec3::splat(-1), 3, Material::Stone);
        store.set_voxel(IVec3::new(1, 0, 0), Some(Material::Leaves));
        assert!(is_exposed(&store, &materials, IVec3::ZERO));
    }

    #[test]
    fn test_one_batch_per_material() {
        let materials = MaterialTable::default();
        let mut store = ChunkStore::new();
        store.set_voxel(IVec3::new(1, 1, 1), Some(Material::Stone));
        store.set_voxel(IVec3::new(3, 1, 1), Some(Material::Stone));
        store.set_voxel(IVec3::new(5, 1, 1), Some(Material::Grass));
        let batches = build_batches(&store, store.get(IVec3::ZERO).unwrap(), &materials, 1.0);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].material, Material::Grass);
        assert_eq!(batches[1].instances.len(), 2);
        assert_eq!(batches[1].instances[0].translation, [1.5, 1.5, 1.5]);
    }

    #[test]
    fn test_empty_chunk_has_no_batches() {
        let materials = MaterialTable::default();
        let store = ChunkStore::new();
        let chunk = Chunk::new(IVec3::ZERO);
        assert!(build_batches(&store, &chunk, &materials, 1.0).is_empty());
    }
}
