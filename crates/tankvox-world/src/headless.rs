//! Backends that run without an engine or a GPU.
//!
//! `HeadlessPhysics` is a small AABB integrator: gravity, damping, per-axis
//! sweeps against fixed cuboids and ground friction. Dynamic bodies do not
//! collide with each other. `RecordingRenderer` keeps whatever it is handed
//! so tests and the arena runner can inspect it.

use std::collections::{HashMap, HashSet};

use glam::{IVec3, Quat, Vec3};
use tankvox_core::constants::GRAVITY;
use tankvox_core::types::ChunkCoord;

use crate::backend::*;

/// Overlap below this depth is treated as touching, not penetrating.
const CONTACT_EPSILON: f32 = 1e-4;
/// Broad-phase cell edge in world units.
const CELL_SIZE: f32 = 4.0;
/// Horizontal velocity decay per unit friction while resting on something.
const GROUND_FRICTION_GAIN: f32 = 4.0;
/// Rebounds slower than this stop dead.
const REST_SPEED: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Aabb {
    fn around(center: Vec3, half: Vec3) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    fn penetrates(&self, other: &Aabb) -> bool {
        (0..3).all(|i| {
            self.min[i] < other.max[i] - CONTACT_EPSILON && self.max[i] > other.min[i] + CONTACT_EPSILON
        })
    }

    fn cells(&self) -> impl Iterator<Item = IVec3> {
        let lo = (self.min / CELL_SIZE).floor().as_ivec3();
        let hi = (self.max / CELL_SIZE).floor().as_ivec3();
        (lo.x..=hi.x).flat_map(move |x| {
            (lo.y..=hi.y).flat_map(move |y| (lo.z..=hi.z).map(move |z| IVec3::new(x, y, z)))
        })
    }
}

#[derive(Debug, Clone)]
struct Body {
    kind: BodyKind,
    translation: Vec3,
    rotation: Quat,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    linear_damping: f32,
    angular_damping: f32,
    colliders: Vec<ColliderHandle>,
    mass: f32,
}

#[derive(Debug, Clone)]
struct Collider {
    body: BodyHandle,
    desc: ColliderDesc,
}

#[derive(Debug, Default)]
pub struct HeadlessPhysics {
    bodies: HashMap<BodyHandle, Body>,
    colliders: HashMap<ColliderHandle, Collider>,
    /// Fixed colliders bucketed by broad-phase cell.
    grid: HashMap<IVec3, Vec<ColliderHandle>>,
    events: Vec<CollisionEvent>,
    next_body: u32,
    next_collider: u32,
    gravity: f32,
}

impl HeadlessPhysics {
    pub fn new() -> Self {
        Self {
            gravity: GRAVITY,
            ..Self::default()
        }
    }

    pub fn with_gravity(gravity: f32) -> Self {
        Self {
            gravity,
            ..Self::default()
        }
    }

    /// Number of fixed colliders, i.e. consolidated voxel boxes.
    pub fn fixed_collider_count(&self) -> usize {
        self.colliders
            .values()
            .filter(|c| {
                self.bodies
                    .get(&c.body)
                    .is_some_and(|b| b.kind == BodyKind::Fixed)
            })
            .count()
    }

    pub fn collider_desc(&self, collider: ColliderHandle) -> Result<ColliderDesc, PhysicsError> {
        self.colliders
            .get(&collider)
            .map(|c| c.desc)
            .ok_or(PhysicsError::UnknownCollider(collider))
    }

    fn body(&self, handle: BodyHandle) -> Result<&Body, PhysicsError> {
        self.bodies.get(&handle).ok_or(PhysicsError::UnknownBody(handle))
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut Body, PhysicsError> {
        self.bodies
            .get_mut(&handle)
            .ok_or(PhysicsError::UnknownBody(handle))
    }

    fn collider_aabb(&self, collider: &Collider) -> Option<Aabb> {
        let body = self.bodies.get(&collider.body)?;
        Some(Aabb::around(body.translation, collider.desc.shape.half_extents()))
    }

    fn body_half_extents(&self, body: &Body) -> Option<Vec3> {
        body.colliders
            .iter()
            .filter_map(|h| self.colliders.get(h))
            .map(|c| c.desc.shape.half_extents())
            .reduce(Vec3::max)
    }

    /// Fixed colliders penetrating `aabb`, with their boxes.
    fn fixed_overlaps(&self, aabb: &Aabb) -> Vec<(ColliderHandle, Aabb)> {
        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        for cell in aabb.cells() {
            let Some(bucket) = self.grid.get(&cell) else {
                continue;
            };
            for &handle in bucket {
                if !seen.insert(handle) {
                    continue;
                }
                let Some(other) = self.colliders.get(&handle).and_then(|c| self.collider_aabb(c))
                else {
                    continue;
                };
                if aabb.penetrates(&other) {
                    hits.push((handle, other));
                }
            }
        }
        hits
    }

    fn step_body(&mut self, handle: BodyHandle, dt: f32, contacts: &mut HashSet<(BodyHandle, BodyHandle)>) {
        let Some(mut body) = self.bodies.get(&handle).cloned() else {
            return;
        };

        body.linear_velocity.y += self.gravity * dt;
        body.linear_velocity /= 1.0 + dt * body.linear_damping;
        body.angular_velocity /= 1.0 + dt * body.angular_damping;
        if body.angular_velocity.length_squared() > 0.0 {
            body.rotation =
                (Quat::from_scaled_axis(body.angular_velocity * dt) * body.rotation).normalize();
        }

        let Some(half) = self.body_half_extents(&body) else {
            body.translation += body.linear_velocity * dt;
            self.bodies.insert(handle, body);
            return;
        };

        let mut ground_friction = None;
        // Vertical first so resting contact is known before sliding.
        for axis in [1usize, 0, 2] {
            let delta = body.linear_velocity[axis] * dt;
            if delta == 0.0 {
                continue;
            }
            body.translation[axis] += delta;
            let hits = self.fixed_overlaps(&Aabb::around(body.translation, half));
            if hits.is_empty() {
                continue;
            }

            let mut friction = 0.0f32;
            let mut restitution = 0.0f32;
            for (collider, other) in &hits {
                let resolved = if delta > 0.0 {
                    other.min[axis] - half[axis]
                } else {
                    other.max[axis] + half[axis]
                };
                body.translation[axis] = if delta > 0.0 {
                    body.translation[axis].min(resolved)
                } else {
                    body.translation[axis].max(resolved)
                };
                if let Some(c) = self.colliders.get(collider) {
                    friction = friction.max(c.desc.friction);
                    restitution = restitution.max(c.desc.restitution);
                    contacts.insert((handle, c.body));
                }
            }

            let bounced = -body.linear_velocity[axis] * restitution;
            body.linear_velocity[axis] = if bounced.abs() < REST_SPEED { 0.0 } else { bounced };
            if axis == 1 && delta < 0.0 {
                ground_friction = Some(friction);
            }
        }

        if let Some(mu) = ground_friction {
            let decay = 1.0 + dt * mu * GROUND_FRICTION_GAIN;
            body.linear_velocity.x /= decay;
            body.linear_velocity.z /= decay;
        }

        self.bodies.insert(handle, body);
    }
}

impl PhysicsBackend for HeadlessPhysics {
    fn create_body(&mut self, kind: BodyKind, translation: Vec3) -> BodyHandle {
        let handle = BodyHandle(self.next_body);
        self.next_body += 1;
        self.bodies.insert(
            handle,
            Body {
                kind,
                translation,
                rotation: Quat::IDENTITY,
                linear_velocity: Vec3::ZERO,
                angular_velocity: Vec3::ZERO,
                linear_damping: 0.0,
                angular_damping: 0.5,
                colliders: Vec::new(),
                mass: 0.0,
            },
        );
        handle
    }

    fn create_collider(
        &mut self,
        body: BodyHandle,
        desc: ColliderDesc,
    ) -> Result<ColliderHandle, PhysicsError> {
        let handle = ColliderHandle(self.next_collider);
        let owner = self.body_mut(body)?;
        owner.colliders.push(handle);
        owner.mass += desc.density * desc.shape.volume();
        let kind = owner.kind;
        let center = owner.translation;
        self.next_collider += 1;

        if kind == BodyKind::Fixed {
            for cell in Aabb::around(center, desc.shape.half_extents()).cells() {
                self.grid.entry(cell).or_default().push(handle);
            }
        }
        self.colliders.insert(handle, Collider { body, desc });
        Ok(handle)
    }

    fn remove_body(&mut self, body: BodyHandle) -> Result<(), PhysicsError> {
        let removed = self
            .bodies
            .remove(&body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        for handle in removed.colliders {
            let Some(collider) = self.colliders.remove(&handle) else {
                continue;
            };
            if removed.kind != BodyKind::Fixed {
                continue;
            }
            let aabb = Aabb::around(removed.translation, collider.desc.shape.half_extents());
            for cell in aabb.cells() {
                if let Some(bucket) = self.grid.get_mut(&cell) {
                    bucket.retain(|h| *h != handle);
                    if bucket.is_empty() {
                        self.grid.remove(&cell);
                    }
                }
            }
        }
        Ok(())
    }

    fn contains_body(&self, body: BodyHandle) -> bool {
        self.bodies.contains_key(&body)
    }

    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec3) -> Result<(), PhysicsError> {
        let b = self.body_mut(body)?;
        if b.kind == BodyKind::Dynamic {
            let mass = if b.mass > 0.0 { b.mass } else { 1.0 };
            b.linear_velocity += impulse / mass;
        }
        Ok(())
    }

    fn apply_torque_impulse(&mut self, body: BodyHandle, torque: Vec3) -> Result<(), PhysicsError> {
        let b = self.body_mut(body)?;
        if b.kind == BodyKind::Dynamic {
            let mass = if b.mass > 0.0 { b.mass } else { 1.0 };
            b.angular_velocity += torque / mass;
        }
        Ok(())
    }

    fn translation(&self, body: BodyHandle) -> Result<Vec3, PhysicsError> {
        Ok(self.body(body)?.translation)
    }

    fn set_translation(&mut self, body: BodyHandle, translation: Vec3) -> Result<(), PhysicsError> {
        let b = self.body_mut(body)?;
        if b.kind == BodyKind::Fixed {
            log::warn!("ignoring teleport of fixed body {body:?}");
            return Ok(());
        }
        b.translation = translation;
        Ok(())
    }

    fn rotation(&self, body: BodyHandle) -> Result<Quat, PhysicsError> {
        Ok(self.body(body)?.rotation)
    }

    fn set_rotation(&mut self, body: BodyHandle, rotation: Quat) -> Result<(), PhysicsError> {
        self.body_mut(body)?.rotation = rotation.normalize();
        Ok(())
    }

    fn linear_velocity(&self, body: BodyHandle) -> Result<Vec3, PhysicsError> {
        Ok(self.body(body)?.linear_velocity)
    }

    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec3) -> Result<(), PhysicsError> {
        self.body_mut(body)?.linear_velocity = velocity;
        Ok(())
    }

    fn linear_damping(&self, body: BodyHandle) -> Result<f32, PhysicsError> {
        Ok(self.body(body)?.linear_damping)
    }

    fn set_linear_damping(&mut self, body: BodyHandle, damping: f32) -> Result<(), PhysicsError> {
        self.body_mut(body)?.linear_damping = damping.max(0.0);
        Ok(())
    }

    fn drain_collision_events(&mut self) -> Vec<CollisionEvent> {
        std::mem::take(&mut self.events)
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn step(&mut self, dt: f32) {
        let mut dynamic: Vec<BodyHandle> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.kind == BodyKind::Dynamic)
            .map(|(h, _)| *h)
            .collect();
        dynamic.sort();

        let mut contacts = HashSet::new();
        for handle in dynamic {
            self.step_body(handle, dt, &mut contacts);
        }
        let mut contacts: Vec<_> = contacts.into_iter().collect();
        contacts.sort();
        self.events
            .extend(contacts.into_iter().map(|(a, b)| CollisionEvent { a, b }));
    }
}

/// Renderer that stores everything it receives.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    batches: HashMap<ChunkCoord, Vec<InstanceBatch>>,
    proxies: HashMap<ProxyHandle, ProxyDesc>,
    next_proxy: u32,
    /// Total `set_chunk_batches` calls.
    pub uploads: usize,
    /// Total `clear_chunk` calls.
    pub clears: usize,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk_batches(&self, chunk: ChunkCoord) -> &[InstanceBatch] {
        self.batches.get(&chunk).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn instance_count(&self, chunk: ChunkCoord) -> usize {
        self.chunk_batches(chunk)
            .iter()
            .map(|b| b.instances.len())
            .sum()
    }

    pub fn total_instances(&self) -> usize {
        self.batches
            .values()
            .flatten()
            .map(|b| b.instances.len())
            .sum()
    }

    /// Whether any chunk draws an instance at `translation`.
    pub fn has_instance_at(&self, translation: Vec3) -> bool {
        self.batches.values().flatten().any(|b| {
            b.instances
                .iter()
                .any(|i| Vec3::from(i.translation).distance_squared(translation) < 1e-6)
        })
    }

    pub fn proxy(&self, proxy: ProxyHandle) -> Option<&ProxyDesc> {
        self.proxies.get(&proxy)
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }
}

impl RenderBackend for RecordingRenderer {
    fn set_chunk_batches(&mut self, chunk: ChunkCoord, batches: Vec<InstanceBatch>) {
        self.uploads += 1;
        self.batches.insert(chunk, batches);
    }

    fn clear_chunk(&mut self, chunk: ChunkCoord) {
        self.clears += 1;
        self.batches.remove(&chunk);
    }

    fn add_proxy(&mut self, desc: ProxyDesc) -> ProxyHandle {
        let handle = ProxyHandle(self.next_proxy);
        self.next_proxy += 1;
        self.proxies.insert(handle, desc);
        handle
    }

    fn update_proxy(&mut self, proxy: ProxyHandle, translation: Vec3, rotation: Quat, opacity: f32) {
        if let Some(desc) = self.proxies.get_mut(&proxy) {
            desc.translation = translation;
            desc.rotation = rotation;
            desc.opacity = opacity;
        }
    }

    fn remove_proxy(&mut self, proxy: ProxyHandle) {
        self.proxies.remove(&proxy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor(physics: &mut HeadlessPhysics) -> BodyHandle {
        let body = physics.create_body(BodyKind::Fixed, Vec3::new(0.0, -0.5, 0.0));
        physics
            .create_collider(body, ColliderDesc::cuboid(Vec3::new(10.0, 0.5, 10.0)))
            .unwrap();
        body
    }

    fn crate_at(physics: &mut HeadlessPhysics, pos: Vec3) -> BodyHandle {
        let body = physics.create_body(BodyKind::Dynamic, pos);
        physics
            .create_collider(body, ColliderDesc::cuboid(Vec3::splat(0.5)))
            .unwrap();
        body
    }

    #[test]
    fn test_body_falls_and_rests_on_floor() {
        let mut physics = HeadlessPhysics::new();
        let ground = floor(&mut physics);
        let body = crate_at(&mut physics, Vec3::new(0.0, 5.0, 0.0));

        for _ in 0..240 {
            physics.step(1.0 / 60.0);
        }
        let pos = physics.translation(body).unwrap();
        assert!((pos.y - 0.5).abs() < 1e-3, "rests on floor top, got {pos}");
        assert_eq!(physics.linear_velocity(body).unwrap().y, 0.0);

        let events = physics.drain_collision_events();
        assert!(events.iter().any(|e| e.involves(body) && e.involves(ground)));
        assert!(physics.drain_collision_events().is_empty(), "drain empties the queue");
    }

    #[test]
    fn test_wall_blocks_horizontal_motion() {
        let mut physics = HeadlessPhysics::new();
        floor(&mut physics);
        let wall = physics.create_body(BodyKind::Fixed, Vec3::new(3.0, 1.5, 0.0));
        physics
            .create_collider(wall, ColliderDesc::cuboid(Vec3::new(0.5, 1.5, 5.0)))
            .unwrap();
        let body = crate_at(&mut physics, Vec3::new(0.0, 0.5, 0.0));

        for _ in 0..120 {
            physics.set_linear_velocity(body, Vec3::new(4.0, 0.0, 0.0)).unwrap();
            physics.step(1.0 / 60.0);
        }
        let pos = physics.translation(body).unwrap();
        assert!(pos.x <= 2.0 + 1e-4, "stopped at wall face, got {pos}");
        assert!(pos.x > 1.9, "slid up to the wall, got {pos}");
    }

    #[test]
    fn test_sliding_along_floor_is_not_snagged() {
        let mut physics = HeadlessPhysics::new();
        // Two adjacent floor tiles share an edge at x = 0.
        for x in [-0.5f32, 0.5] {
            let tile = physics.create_body(BodyKind::Fixed, Vec3::new(x * 10.0, -0.5, 0.0));
            physics
                .create_collider(tile, ColliderDesc::cuboid(Vec3::new(5.0, 0.5, 5.0)))
                .unwrap();
        }
        let body = crate_at(&mut physics, Vec3::new(-3.0, 0.5, 0.0));
        for _ in 0..60 {
            physics.set_linear_velocity(body, Vec3::new(5.0, 0.0, 0.0)).unwrap();
            physics.step(1.0 / 60.0);
        }
        assert!(physics.translation(body).unwrap().x > 1.0);
    }

    #[test]
    fn test_remove_body_drops_colliders() {
        let mut physics = HeadlessPhysics::new();
        let ground = floor(&mut physics);
        assert_eq!(physics.fixed_collider_count(), 1);
        physics.remove_body(ground).unwrap();
        assert_eq!(physics.fixed_collider_count(), 0);
        assert_eq!(physics.remove_body(ground), Err(PhysicsError::UnknownBody(ground)));

        let body = crate_at(&mut physics, Vec3::new(0.0, 5.0, 0.0));
        physics.step(0.5);
        assert!(physics.translation(body).unwrap().y < 5.0, "nothing left to stand on");
    }

    #[test]
    fn test_unknown_body_queries_fail() {
        let physics = HeadlessPhysics::new();
        let ghost = BodyHandle(99);
        assert!(!physics.contains_body(ghost));
        assert_eq!(physics.translation(ghost), Err(PhysicsError::UnknownBody(ghost)));
    }

    #[test]
    fn test_impulse_scales_with_mass() {
        let mut physics = HeadlessPhysics::with_gravity(0.0);
        let light = physics.create_body(BodyKind::Dynamic, Vec3::ZERO);
        physics
            .create_collider(light, ColliderDesc::cuboid(Vec3::splat(0.5)))
            .unwrap();
        let heavy = physics.create_body(BodyKind::Dynamic, Vec3::new(10.0, 0.0, 0.0));
        let mut desc = ColliderDesc::cuboid(Vec3::splat(0.5));
        desc.density = 4.0;
        physics.create_collider(heavy, desc).unwrap();

        physics.apply_impulse(light, Vec3::X).unwrap();
        physics.apply_impulse(heavy, Vec3::X).unwrap();
        let vl = physics.linear_velocity(light).unwrap().x;
        let vh = physics.linear_velocity(heavy).unwrap().x;
        assert!((vl - 4.0 * vh).abs() < 1e-5, "{vl} vs {vh}");
    }

    #[test]
    fn test_recording_renderer_tracks_batches_and_proxies() {
        let mut render = RecordingRenderer::new();
        let chunk = IVec3::ZERO;
        render.set_chunk_batches(
            chunk,
            vec![InstanceBatch {
                material: tankvox_core::Material::Stone,
                color: [0.5; 3],
                instances: vec![VoxelInstance {
                    translation: [0.5, 0.5, 0.5],
                }],
            }],
        );
        assert_eq!(render.instance_count(chunk), 1);
        assert!(render.has_instance_at(Vec3::splat(0.5)));
        render.clear_chunk(chunk);
        assert_eq!(render.total_instances(), 0);

        let proxy = render.add_proxy(ProxyDesc {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            half_extents: Vec3::splat(0.5),
            color: [1.0; 3],
            opacity: 1.0,
        });
        render.update_proxy(proxy, Vec3::Y, Quat::IDENTITY, 0.25);
        assert_eq!(render.proxy(proxy).map(|p| p.opacity), Some(0.25));
        render.remove_proxy(proxy);
        assert_eq!(render.proxy_count(), 0);
    }
}
