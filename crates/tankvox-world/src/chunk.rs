use std::collections::HashMap;

use tankvox_core::constants::VOXELS_PER_CHUNK;
use tankvox_core::material::Material;
use tankvox_core::math::{local_in_bounds, local_index};
use tankvox_core::types::{ChunkCoord, LocalCoord};

use crate::consolidate::ConsolidatedBox;

/// What the renderer currently holds for a chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderState {
    /// Instances across all material batches.
    pub instance_count: usize,
    /// Number of per-material batches uploaded.
    pub batch_count: usize,
}

/// A CHUNK_SIZE^3 block of sparse voxel storage plus the derived state
/// built from it.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub coord: ChunkCoord,
    voxels: HashMap<LocalCoord, Material>,
    /// Render batches are stale.
    pub dirty: bool,
    /// Consolidated colliders are stale.
    pub needs_physics_update: bool,
    /// Colliders owned by this chunk. Replaced wholesale on rebuild.
    pub colliders: Vec<ConsolidatedBox>,
    pub render: RenderState,
}

impl Chunk {
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            voxels: HashMap::new(),
            dirty: false,
            needs_physics_update: false,
            colliders: Vec::new(),
            render: RenderState::default(),
        }
    }

    pub fn get(&self, local: LocalCoord) -> Option<Material> {
        self.voxels.get(&local).copied()
    }

    /// Write one voxel and flag both rebuilds. Returns the previous content.
    /// Out-of-range locals are ignored.
    pub fn set(&mut self, local: LocalCoord, material: Option<Material>) -> Option<Material> {
        if !local_in_bounds(local) {
            log::warn!("chunk {} ignoring out-of-range local {local}", self.coord);
            return None;
        }
        let previous = match material {
            Some(m) => self.voxels.insert(local, m),
            None => self.voxels.remove(&local),
        };
        self.dirty = true;
        self.needs_physics_update = true;
        previous
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Occupied voxels, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (LocalCoord, Material)> + '_ {
        self.voxels.iter().map(|(l, m)| (*l, *m))
    }

    /// Occupied voxels ordered by flat local index, for reproducible output.
    pub fn sorted_voxels(&self) -> Vec<(LocalCoord, Material)> {
        let mut out: Vec<_> = self.iter().collect();
        out.sort_by_key(|(l, _)| local_index(*l));
        out
    }

    /// Dense copy of the chunk, indexed by `local_index`.
    pub fn to_dense(&self) -> Vec<Option<Material>> {
        let mut dense = vec![None; VOXELS_PER_CHUNK as usize];
        for (local, material) in self.iter() {
            dense[local_index(local)] = Some(material);
        }
        dense
    }
}
