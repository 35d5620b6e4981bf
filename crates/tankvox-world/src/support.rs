//! Structural support re-evaluation after voxel removals.
//!
//! Three rules, picked by the material's `SupportKind`:
//! - Column: grounded, or something solid directly below.
//! - Chain (trunks, beams): breadth-first search stepping down first, then
//!   sideways through chain voxels, until it reaches ground or a voxel resting
//!   on non-chain solid.
//! - Cluster (canopies): the connected cluster is held if any member touches
//!   a supported chain voxel, any other solid, or the ground.
//!
//! Searches are capped at `max_visited`. A capped search resolves with the
//! configured `TruncationBias` rather than a real verdict.

use std::collections::{HashMap, HashSet, VecDeque};

use glam::IVec3;
use tankvox_core::config::{SupportConfig, TruncationBias};
use tankvox_core::direction::{ALL_FACES, LATERAL_FACES};
use tankvox_core::material::{Material, MaterialTable, SupportKind};
use tankvox_core::types::VoxelCoord;

use crate::chunk_store::ChunkStore;

/// One pending re-evaluation centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SupportCenter {
    pub center: VoxelCoord,
    /// The removed voxel touched a chain voxel, so the scan uses the wide radius.
    pub near_chain: bool,
}

/// Outcome of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Supported,
    Unsupported,
    Truncated,
}

/// Support rule of a material, if it can fall at all.
pub fn support_kind(materials: &MaterialTable, material: Material) -> Option<SupportKind> {
    let props = materials.get(material);
    props.gravity.then_some(props.support)
}

/// Whether any face neighbour of `voxel` is a chain-support material.
pub fn touches_chain(store: &ChunkStore, materials: &MaterialTable, voxel: VoxelCoord) -> bool {
    ALL_FACES.iter().any(|f| {
        store
            .get_voxel(voxel + f.offset())
            .is_some_and(|m| support_kind(materials, m) == Some(SupportKind::Chain))
    })
}

/// Support searches with verdict caches valid for one batch.
///
/// Removing an unsupported voxel never takes support away from a voxel that
/// was found supported, so cached verdicts stay true while the batch removes
/// what it found.
pub struct SupportSolver<'a> {
    materials: &'a MaterialTable,
    config: &'a SupportConfig,
    ground_level: i32,
    chain: HashMap<VoxelCoord, bool>,
    cluster: HashMap<VoxelCoord, bool>,
}

impl<'a> SupportSolver<'a> {
    pub fn new(materials: &'a MaterialTable, config: &'a SupportConfig, ground_level: i32) -> Self {
        Self {
            materials,
            config,
            ground_level,
            chain: HashMap::new(),
            cluster: HashMap::new(),
        }
    }

    fn kind_at(&self, store: &ChunkStore, voxel: VoxelCoord) -> Option<SupportKind> {
        store
            .get_voxel(voxel)
            .and_then(|m| support_kind(self.materials, m))
    }

    fn is_solid_at(&self, store: &ChunkStore, voxel: VoxelCoord) -> bool {
        store
            .get_voxel(voxel)
            .is_some_and(|m| self.materials.is_solid(m))
    }

    fn resolve(&self, verdict: Verdict) -> bool {
        match verdict {
            Verdict::Supported => true,
            Verdict::Unsupported => false,
            Verdict::Truncated => self.config.truncation_bias == TruncationBias::AssumeSupported,
        }
    }

    pub fn column_supported(&self, store: &ChunkStore, voxel: VoxelCoord) -> bool {
        voxel.y <= self.ground_level || self.is_solid_at(store, voxel - IVec3::Y)
    }

    pub fn chain_supported(&mut self, store: &ChunkStore, start: VoxelCoord) -> bool {
        if let Some(&cached) = self.chain.get(&start) {
            return cached;
        }

        let mut queue = VecDeque::from([start]);
        let mut visited = HashSet::from([start]);
        let verdict = 'search: loop {
            let Some(current) = queue.pop_front() else {
                break Verdict::Unsupported;
            };
            if current.y <= self.ground_level || self.chain.get(&current) == Some(&true) {
                break Verdict::Supported;
            }

            let below = current - IVec3::Y;
            match self.kind_at(store, below) {
                Some(SupportKind::Chain) => {
                    if visited.insert(below) {
                        queue.push_back(below);
                    }
                }
                _ if self.is_solid_at(store, below) => break Verdict::Supported,
                _ => {}
            }

            for face in LATERAL_FACES {
                let next = current + face.offset();
                if self.kind_at(store, next) == Some(SupportKind::Chain) && visited.insert(next) {
                    queue.push_back(next);
                    if visited.len() >= self.config.max_visited {
                        break 'search Verdict::Truncated;
                    }
                }
            }
            if visited.len() >= self.config.max_visited {
                break Verdict::Truncated;
            }
        };

        let supported = self.resolve(verdict);
        match verdict {
            // Everything reachable from start shares its dead end.
            Verdict::Unsupported => {
                for v in visited {
                    self.chain.insert(v, false);
                }
            }
            _ => {
                self.chain.insert(start, supported);
            }
        }
        if verdict == Verdict::Truncated {
            log::debug!("chain search from {start} hit the cap of {}", self.config.max_visited);
        }
        supported
    }

    pub fn cluster_supported(&mut self, store: &ChunkStore, start: VoxelCoord) -> bool {
        if let Some(&cached) = self.cluster.get(&start) {
            return cached;
        }

        let mut queue = VecDeque::from([start]);
        let mut visited = HashSet::from([start]);
        let verdict = 'search: loop {
            let Some(current) = queue.pop_front() else {
                break Verdict::Unsupported;
            };
            if current.y <= self.ground_level {
                break Verdict::Supported;
            }
            for face in ALL_FACES {
                let next = current + face.offset();
                let Some(material) = store.get_voxel(next) else {
                    continue;
                };
                match support_kind(self.materials, material) {
                    Some(SupportKind::Cluster) => {
                        if visited.insert(next) {
                            queue.push_back(next);
                        }
                    }
                    Some(SupportKind::Chain) => {
                        if self.chain_supported(store, next) {
                            break 'search Verdict::Supported;
                        }
                    }
                    _ if self.materials.is_solid(material) => break 'search Verdict::Supported,
                    _ => {}
                }
            }
            if visited.len() >= self.config.max_visited {
                break Verdict::Truncated;
            }
        };

        let supported = self.resolve(verdict);
        match verdict {
            // Every visited voxel belongs to the same connected cluster.
            Verdict::Supported | Verdict::Unsupported => {
                for v in visited {
                    self.cluster.insert(v, supported);
                }
            }
            Verdict::Truncated => {
                log::debug!("cluster search from {start} hit the cap of {}", self.config.max_visited);
                self.cluster.insert(start, supported);
            }
        }
        supported
    }

    pub fn is_supported(&mut self, store: &ChunkStore, voxel: VoxelCoord) -> bool {
        match self.kind_at(store, voxel) {
            None => true,
            Some(SupportKind::Column) => self.column_supported(store, voxel),
            Some(SupportKind::Chain) => self.chain_supported(store, voxel),
            Some(SupportKind::Cluster) => self.cluster_supported(store, voxel),
        }
    }
}

/// Re-check every gravity-eligible voxel in the cubes around `centers` and
/// remove the ones that lost support. Returns the removed voxels in removal
/// order.
///
/// Chain voxels are settled first so cluster checks see final trunk state.
/// The remaining voxels go bottom-up so a column resting on a voxel removed
/// in this batch falls in the same batch. Each voxel is considered at most
/// once even when cubes overlap.
pub fn reevaluate(
    store: &mut ChunkStore,
    materials: &MaterialTable,
    config: &SupportConfig,
    ground_level: i32,
    centers: &[SupportCenter],
) -> Vec<(VoxelCoord, Material)> {
    let mut processed = HashSet::new();
    let mut chain = Vec::new();
    let mut rest = Vec::new();

    for c in centers {
        let r = if c.near_chain {
            config.chain_radius
        } else {
            config.radius
        };
        for y in -r..=r {
            for z in -r..=r {
                for x in -r..=r {
                    let v = c.center + IVec3::new(x, y, z);
                    let Some(material) = store.get_voxel(v) else {
                        continue;
                    };
                    let Some(kind) = support_kind(materials, material) else {
                        continue;
                    };
                    if !processed.insert(v) {
                        continue;
                    }
                    if kind == SupportKind::Chain {
                        chain.push(v);
                    } else {
                        rest.push(v);
                    }
                }
            }
        }
    }

    let mut solver = SupportSolver::new(materials, config, ground_level);
    let mut removed = Vec::new();

    let falling: Vec<VoxelCoord> = chain
        .into_iter()
        .filter(|v| !solver.chain_supported(store, *v))
        .collect();
    for v in falling {
        if let Some(material) = store.set_voxel(v, None) {
            removed.push((v, material));
        }
    }

    rest.sort_by_key(|v| (v.y, v.z, v.x));
    for v in rest {
        if store.get_voxel(v).is_none() || solver.is_supported(store, v) {
            continue;
        }
        if let Some(material) = store.set_voxel(v, None) {
            removed.push((v, material));
        }
    }

    if !removed.is_empty() {
        log::debug!(
            "support pass over {} centre(s) dropped {} voxel(s)",
            centers.len(),
            removed.len()
        );
    }
    removed
}
