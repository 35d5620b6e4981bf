use std::collections::HashMap;

use tankvox_core::material::Material;
use tankvox_core::math::{boundary_neighbor_offsets, world_to_chunk, world_to_local};
use tankvox_core::types::{ChunkCoord, VoxelCoord};

use crate::chunk::Chunk;

/// Sparse map of every chunk ever written. Chunks are never evicted.
#[derive(Debug, Default)]
pub struct ChunkStore {
    chunks: HashMap<ChunkCoord, Chunk>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or lazily create the chunk at `coord`.
    pub fn get_or_create(&mut self, coord: ChunkCoord) -> &mut Chunk {
        self.chunks.entry(coord).or_insert_with(|| {
            log::debug!("creating chunk {coord}");
            Chunk::new(coord)
        })
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn get_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    /// Material at a voxel. Never allocates.
    pub fn get_voxel(&self, voxel: VoxelCoord) -> Option<Material> {
        self.chunks
            .get(&world_to_chunk(voxel))
            .and_then(|c| c.get(world_to_local(voxel)))
    }

    /// Write a voxel, creating its chunk if needed. Returns what was there.
    ///
    /// A voxel on a chunk face also dirties the chunk across that face so
    /// its culling is redone. Only neighbours that already exist are touched.
    pub fn set_voxel(&mut self, voxel: VoxelCoord, material: Option<Material>) -> Option<Material> {
        let coord = world_to_chunk(voxel);
        let local = world_to_local(voxel);
        if material.is_none() && !self.chunks.contains_key(&coord) {
            return None;
        }
        let previous = self.get_or_create(coord).set(local, material);

        for offset in boundary_neighbor_offsets(local) {
            if let Some(neighbor) = self.chunks.get_mut(&(coord + offset)) {
                neighbor.dirty = true;
            }
        }
        previous
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChunkCoord, &Chunk)> {
        self.chunks.iter()
    }

    /// Coordinates of chunks awaiting a rebuild, sorted for reproducible order.
    pub fn dirty_coords(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self
            .chunks
            .values()
            .filter(|c| c.dirty || c.needs_physics_update)
            .map(|c| c.coord)
            .collect();
        coords.sort_by_key(|c| (c.y, c.z, c.x));
        coords
    }

    /// Chunk coordinates in one vertical column of chunks.
    pub fn column(&self, chunk_x: i32, chunk_z: i32) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self
            .chunks
            .keys()
            .filter(|c| c.x == chunk_x && c.z == chunk_z)
            .copied()
            .collect();
        coords.sort_by_key(|c| std::cmp::Reverse(c.y));
        coords
    }

    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn dirty_count(&self) -> usize {
        self.chunks.values().filter(|c| c.dirty).count()
    }

    pub fn voxel_count(&self) -> usize {
        self.chunks.values().map(Chunk::len).sum()
    }

    pub fn collider_count(&self) -> usize {
        self.chunks.values().map(|c| c.colliders.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;

    #[test]
    fn test_get_never_allocates() {
        let store = ChunkStore::new();
        assert_eq!(store.get_voxel(IVec3::new(100, -50, 7)), None);
        assert_eq!(store.loaded_count(), 0);
    }

    #[test]
    fn test_get_or_create_idempotent() {
        let mut store = ChunkStore::new();
        store.get_or_create(IVec3::new(2, 1, 3)).dirty = true;
        assert!(store.get_or_create(IVec3::new(2, 1, 3)).dirty);
        assert_eq!(store.loaded_count(), 1);
    }

    #[test]
    fn test_negative_voxel_lands_in_negative_chunk() {
        let mut store = ChunkStore::new();
        store.set_voxel(IVec3::splat(-1), Some(Material::Stone));
        let chunk = store.get(IVec3::splat(-1)).unwrap();
        assert_eq!(chunk.get(IVec3::splat(15)), Some(Material::Stone));
        assert!(store.get(IVec3::ZERO).is_none());
    }

    #[test]
    fn test_boundary_write_dirties_existing_neighbors_only() {
        let mut store = ChunkStore::new();
        store.set_voxel(IVec3::new(16, 5, 5), Some(Material::Dirt));
        store.get_mut(IVec3::new(1, 0, 0)).unwrap().dirty = false;
        store.set_voxel(IVec3::new(5, 5, 5), Some(Material::Dirt));
        store.get_mut(IVec3::ZERO).unwrap().dirty = false;

        // x = 15 is the last column of chunk 0, touching chunk +X.
        store.set_voxel(IVec3::new(15, 5, 5), Some(Material::Dirt));
        assert!(store.get(IVec3::new(1, 0, 0)).unwrap().dirty);
        assert!(store.get(IVec3::new(-1, 0, 0)).is_none(), "absent neighbours stay absent");
        assert_eq!(store.loaded_count(), 2);
    }

    #[test]
    fn test_interior_write_leaves_neighbors_clean() {
        let mut store = ChunkStore::new();
        store.set_voxel(IVec3::new(16, 5, 5), Some(Material::Dirt));
        store.get_mut(IVec3::new(1, 0, 0)).unwrap().dirty = false;
        store.set_voxel(IVec3::new(7, 7, 7), Some(Material::Dirt));
        assert!(!store.get(IVec3::new(1, 0, 0)).unwrap().dirty);
    }

    #[test]
    fn test_clearing_untouched_voxel_creates_nothing() {
        let mut store = ChunkStore::new();
        assert_eq!(store.set_voxel(IVec3::new(40, 0, 0), None), None);
        assert_eq!(store.loaded_count(), 0);
    }

    #[test]
    fn test_counts_and_column() {
        let mut store = ChunkStore::new();
        store.set_voxel(IVec3::new(1, 1, 1), Some(Material::Stone));
        store.set_voxel(IVec3::new(1, 20, 1), Some(Material::Stone));
        store.set_voxel(IVec3::new(40, 1, 1), Some(Material::Stone));
        assert_eq!(store.voxel_count(), 3);
        assert_eq!(store.dirty_count(), 3);
        assert_eq!(store.column(0, 0), vec![IVec3::new(0, 1, 0), IVec3::new(0, 0, 0)]);
    }
}
