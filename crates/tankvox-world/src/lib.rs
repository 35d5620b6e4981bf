pub mod arena;
pub mod backend;
pub mod chunk;
pub mod chunk_store;
pub mod consolidate;
pub mod debris;
pub mod headless;
pub mod meshing;
pub mod raycast;
pub mod schedule;
pub mod support;

use glam::{IVec3, Vec3};
use tankvox_core::config::WorldConfig;
use tankvox_core::material::{Material, MaterialTable};
use tankvox_core::math::{world_to_chunk, world_to_local, world_to_voxel};
use tankvox_core::types::{ChunkCoord, VoxelCoord};

use backend::{PhysicsBackend, RenderBackend};
use chunk::{Chunk, RenderState};
use chunk_store::ChunkStore;
use debris::DebrisField;
use raycast::RaycastHit;
use schedule::{DelayQueue, TaskKind};
use support::SupportCenter;

/// What one `update` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub chunks_rebuilt: usize,
    pub support_passes: usize,
    pub voxels_collapsed: usize,
    pub debris_spawned: usize,
    pub debris_despawned: usize,
}

/// Snapshot counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldStats {
    pub chunks: usize,
    pub dirty_chunks: usize,
    pub voxels: usize,
    pub colliders: usize,
    pub debris: usize,
    pub pending_tasks: usize,
}

/// The destructible voxel world: chunk storage plus the derived render and
/// collider state, support propagation and debris.
///
/// Writes only flag chunks. `update` does the rebuilding, once per tick,
/// before anyone reads render state.
pub struct VoxelWorld {
    config: WorldConfig,
    materials: MaterialTable,
    store: ChunkStore,
    queue: DelayQueue,
    debris: DebrisField,
    rng: fastrand::Rng,
    /// Seconds of simulated time.
    time: f64,
}

impl VoxelWorld {
    pub fn new(config: WorldConfig, materials: MaterialTable) -> Self {
        let rng = fastrand::Rng::with_seed(config.seed);
        Self {
            config,
            materials,
            store: ChunkStore::new(),
            queue: DelayQueue::new(),
            debris: DebrisField::new(),
            rng,
            time: 0.0,
        }
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.store.get(coord)
    }

    pub fn get_voxel(&self, voxel: VoxelCoord) -> Option<Material> {
        self.store.get_voxel(voxel)
    }

    pub fn is_solid(&self, voxel: VoxelCoord) -> bool {
        self.get_voxel(voxel)
            .is_some_and(|m| self.materials.is_solid(m))
    }

    /// Write a voxel. Removing a present voxel schedules a debounced support
    /// check around it. Returns the previous content.
    pub fn set_voxel(&mut self, voxel: VoxelCoord, material: Option<Material>) -> Option<Material> {
        let previous = self.store.set_voxel(voxel, material);
        if previous.is_some() && material.is_none() {
            self.schedule_support_check(voxel);
        }
        previous
    }

    fn schedule_support_check(&mut self, center: VoxelCoord) {
        if self.queue.has_pending_support_check(center) {
            return;
        }
        let near_chain = support::touches_chain(&self.store, &self.materials, center);
        let due = self.time + f64::from(self.config.support.recheck_delay);
        self.queue
            .schedule(due, TaskKind::SupportCheck { center, near_chain });
    }

    /// Place `material` in the empty cell on the `face_normal` side of the
    /// voxel containing `world_pos`. Returns the placed coordinate, or
    /// `None` if that cell is occupied.
    pub fn place_voxel(
        &mut self,
        world_pos: Vec3,
        face_normal: IVec3,
        material: Material,
    ) -> Option<VoxelCoord> {
        let target = world_to_voxel(world_pos, self.config.voxel_size) + face_normal;
        if self.get_voxel(target).is_some() {
            return None;
        }
        self.set_voxel(target, Some(material));
        Some(target)
    }

    /// Clear the voxel containing `world_pos`. Returns what was removed.
    pub fn remove_voxel(&mut self, world_pos: Vec3) -> Option<Material> {
        let voxel = world_to_voxel(world_pos, self.config.voxel_size);
        self.set_voxel(voxel, None)
    }

    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit> {
        raycast::raycast(
            &self.store,
            &self.materials,
            self.config.voxel_size,
            origin,
            direction,
            max_distance,
        )
    }

    /// Y of the first empty cell above the topmost solid voxel in column
    /// (x, z), in voxel coordinates. `None` if the column holds nothing solid.
    pub fn find_surface_height(&self, x: i32, z: i32) -> Option<i32> {
        let probe = IVec3::new(x, 0, z);
        let chunk = world_to_chunk(probe);
        let local = world_to_local(probe);
        // Columns are returned top chunk first.
        for coord in self.store.column(chunk.x, chunk.z) {
            let Some(c) = self.store.get(coord) else {
                continue;
            };
            let top = c
                .iter()
                .filter(|(l, m)| l.x == local.x && l.z == local.z && self.materials.is_solid(*m))
                .map(|(l, _)| l.y)
                .max();
            if let Some(ly) = top {
                let cs = tankvox_core::constants::CHUNK_SIZE as i32;
                return Some(coord.y * cs + ly + 1);
            }
        }
        None
    }

    /// Remove every breakable voxel whose centre lies within `radius` world
    /// units of `center`. Returns what was removed.
    pub fn explode(&mut self, center: Vec3, radius: f32) -> Vec<(VoxelCoord, Material)> {
        let size = self.config.voxel_size;
        let lo = world_to_voxel(center - Vec3::splat(radius), size);
        let hi = world_to_voxel(center + Vec3::splat(radius), size);
        let mut removed = Vec::new();
        for y in lo.y..=hi.y {
            for z in lo.z..=hi.z {
                for x in lo.x..=hi.x {
                    let v = IVec3::new(x, y, z);
                    let Some(material) = self.get_voxel(v) else {
                        continue;
                    };
                    if !self.materials.get(material).breakable {
                        continue;
                    }
                    let c = tankvox_core::math::voxel_to_world(v, size);
                    if c.distance(center) <= radius {
                        self.set_voxel(v, None);
                        removed.push((v, material));
                    }
                }
            }
        }
        log::debug!("explosion at {center} radius {radius} removed {}", removed.len());
        removed
    }

    /// Advance world time by `dt`: run due deferred tasks, rebuild dirty
    /// chunks, then step debris bookkeeping.
    pub fn update(
        &mut self,
        dt: f32,
        physics: &mut dyn PhysicsBackend,
        render: &mut dyn RenderBackend,
    ) -> UpdateReport {
        self.time += f64::from(dt);
        let mut report = UpdateReport::default();

        let mut centers: Vec<SupportCenter> = Vec::new();
        while let Some(task) = self.queue.pop_if_ready(self.time) {
            match task.kind {
                TaskKind::SupportCheck { center, near_chain } => {
                    let c = SupportCenter { center, near_chain };
                    if !centers.contains(&c) {
                        centers.push(c);
                    }
                }
                TaskKind::FadeDebris { id } => {
                    if !self.debris.start_fade(id) {
                        log::debug!("fade for vanished debris {id:?} skipped");
                    }
                }
            }
        }
        if !centers.is_empty() {
            report.support_passes += 1;
            self.run_support_pass(&centers, physics, render, &mut report);
        }

        for coord in self.store.dirty_coords() {
            self.render_chunk(coord, physics, render);
            report.chunks_rebuilt += 1;
        }
        if report.chunks_rebuilt > 0 {
            log::debug!("rebuilt {} chunk(s)", report.chunks_rebuilt);
        }

        report.debris_despawned = self
            .debris
            .update(dt, physics, render, &self.config.debris)
            .len();
        report
    }

    fn run_support_pass(
        &mut self,
        centers: &[SupportCenter],
        physics: &mut dyn PhysicsBackend,
        render: &mut dyn RenderBackend,
        report: &mut UpdateReport,
    ) {
        let removed = support::reevaluate(
            &mut self.store,
            &self.materials,
            &self.config.support,
            self.config.ground_level,
            centers,
        );
        report.voxels_collapsed += removed.len();

        for (voxel, material) in removed {
            self.schedule_support_check(voxel);
            let spawned = self.debris.spawn(
                physics,
                render,
                &self.materials,
                &self.config.debris,
                voxel,
                material,
                self.config.voxel_size,
                &mut self.rng,
            );
            match spawned {
                Ok(id) => {
                    report.debris_spawned += 1;
                    if let Some(delay) = DebrisField::roll_fade_delay(&self.config.debris, &mut self.rng) {
                        self.queue
                            .schedule(self.time + f64::from(delay), TaskKind::FadeDebris { id });
                    }
                }
                Err(e) => log::debug!("debris for {voxel} not spawned: {e}"),
            }
        }
    }

    /// Regenerate the render batches of one chunk, and its colliders when
    /// they are stale. Clears both flags.
    pub fn render_chunk(
        &mut self,
        coord: ChunkCoord,
        physics: &mut dyn PhysicsBackend,
        render: &mut dyn RenderBackend,
    ) {
        let Some(chunk) = self.store.get(coord) else {
            return;
        };
        render.clear_chunk(coord);
        let batches = meshing::build_batches(&self.store, chunk, &self.materials, self.config.voxel_size);
        let state = RenderState {
            instance_count: batches.iter().map(|b| b.instances.len()).sum(),
            batch_count: batches.len(),
        };
        if !batches.is_empty() {
            render.set_chunk_batches(coord, batches);
        }

        let Some(chunk) = self.store.get_mut(coord) else {
            return;
        };
        chunk.render = state;
        if chunk.needs_physics_update {
            consolidate::update_chunk_physics(chunk, physics, &self.materials, self.config.voxel_size);
        }
        chunk.dirty = false;
    }

    /// Rebuild only the colliders of one chunk.
    pub fn update_chunk_physics(&mut self, coord: ChunkCoord, physics: &mut dyn PhysicsBackend) {
        if let Some(chunk) = self.store.get_mut(coord) {
            consolidate::update_chunk_physics(chunk, physics, &self.materials, self.config.voxel_size);
        }
    }

    /// Release every body and proxy the world registered.
    pub fn teardown(&mut self, physics: &mut dyn PhysicsBackend, render: &mut dyn RenderBackend) {
        let coords: Vec<ChunkCoord> = self.store.iter().map(|(c, _)| *c).collect();
        for coord in coords {
            render.clear_chunk(coord);
            if let Some(chunk) = self.store.get_mut(coord) {
                for b in chunk.colliders.drain(..) {
                    let _ = physics.remove_body(b.body);
                }
            }
        }
        self.debris.clear(physics, render);
    }

    pub fn stats(&self) -> WorldStats {
        WorldStats {
            chunks: self.store.loaded_count(),
            dirty_chunks: self.store.dirty_count(),
            voxels: self.store.voxel_count(),
            colliders: self.store.collider_count(),
            debris: self.debris.len(),
            pending_tasks: self.queue.len(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn debris(&self) -> &DebrisField {
        &self.debris
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn voxel_size(&self) -> f32 {
        self.config.voxel_size
    }
}
