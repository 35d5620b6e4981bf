//! Seams to the rigid-body engine and the renderer.
//!
//! The world never talks to a concrete engine. It registers bodies,
//! colliders and render proxies through these traits and is responsible
//! for deregistering every handle it created.

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};
use tankvox_core::material::Material;
use tankvox_core::types::ChunkCoord;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColliderHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyHandle(pub u32);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhysicsError {
    #[error("unknown body {0:?}")]
    UnknownBody(BodyHandle),
    #[error("unknown collider {0:?}")]
    UnknownCollider(ColliderHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Never moves. Used for consolidated voxel colliders.
    Fixed,
    /// Integrated by the backend. Used for debris and vehicles.
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Cuboid { half_extents: Vec3 },
    Ball { radius: f32 },
}

impl Shape {
    /// Half extents of the axis-aligned box enclosing the shape.
    pub fn half_extents(&self) -> Vec3 {
        match *self {
            Shape::Cuboid { half_extents } => half_extents,
            Shape::Ball { radius } => Vec3::splat(radius),
        }
    }

    pub fn volume(&self) -> f32 {
        match *self {
            Shape::Cuboid { half_extents } => 8.0 * half_extents.x * half_extents.y * half_extents.z,
            Shape::Ball { radius } => 4.0 / 3.0 * std::f32::consts::PI * radius.powi(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderDesc {
    pub shape: Shape,
    pub friction: f32,
    pub restitution: f32,
    pub density: f32,
    /// Material the collider stands for, if any.
    pub tag: Option<Material>,
}

impl ColliderDesc {
    pub fn cuboid(half_extents: Vec3) -> Self {
        Self {
            shape: Shape::Cuboid { half_extents },
            friction: 0.7,
            restitution: 0.0,
            density: 1.0,
            tag: None,
        }
    }

    pub fn ball(radius: f32) -> Self {
        Self {
            shape: Shape::Ball { radius },
            ..Self::cuboid(Vec3::ZERO)
        }
    }

    /// Copy surface and mass properties from a material.
    pub fn with_material(mut self, material: Material, props: &tankvox_core::MaterialProps) -> Self {
        self.friction = props.friction;
        self.restitution = props.restitution;
        self.density = props.density;
        self.tag = Some(material);
        self
    }
}

/// Two bodies touched during the last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEvent {
    pub a: BodyHandle,
    pub b: BodyHandle,
}

impl CollisionEvent {
    pub fn involves(&self, body: BodyHandle) -> bool {
        self.a == body || self.b == body
    }
}

pub trait PhysicsBackend {
    fn create_body(&mut self, kind: BodyKind, translation: Vec3) -> BodyHandle;
    fn create_collider(
        &mut self,
        body: BodyHandle,
        desc: ColliderDesc,
    ) -> Result<ColliderHandle, PhysicsError>;
    /// Remove a body together with every collider attached to it.
    fn remove_body(&mut self, body: BodyHandle) -> Result<(), PhysicsError>;
    fn contains_body(&self, body: BodyHandle) -> bool;

    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec3) -> Result<(), PhysicsError>;
    fn apply_torque_impulse(&mut self, body: BodyHandle, torque: Vec3)
        -> Result<(), PhysicsError>;

    fn translation(&self, body: BodyHandle) -> Result<Vec3, PhysicsError>;
    fn set_translation(&mut self, body: BodyHandle, translation: Vec3) -> Result<(), PhysicsError>;
    fn rotation(&self, body: BodyHandle) -> Result<Quat, PhysicsError>;
    fn set_rotation(&mut self, body: BodyHandle, rotation: Quat) -> Result<(), PhysicsError>;
    fn linear_velocity(&self, body: BodyHandle) -> Result<Vec3, PhysicsError>;
    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec3)
        -> Result<(), PhysicsError>;
    fn linear_damping(&self, body: BodyHandle) -> Result<f32, PhysicsError>;
    fn set_linear_damping(&mut self, body: BodyHandle, damping: f32) -> Result<(), PhysicsError>;

    /// Contacts recorded since the previous drain.
    fn drain_collision_events(&mut self) -> Vec<CollisionEvent>;
    fn body_count(&self) -> usize;
    fn step(&mut self, dt: f32);
}

/// One rendered voxel: a translation to the voxel centre.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VoxelInstance {
    pub translation: [f32; 3],
}

/// All visible voxels of one material in one chunk, drawn in a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceBatch {
    pub material: Material,
    pub color: [f32; 3],
    pub instances: Vec<VoxelInstance>,
}

impl InstanceBatch {
    /// Raw instance bytes, ready for a vertex buffer upload.
    pub fn instance_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProxyDesc {
    pub translation: Vec3,
    pub rotation: Quat,
    pub half_extents: Vec3,
    pub color: [f32; 3],
    pub opacity: f32,
}

pub trait RenderBackend {
    /// Replace everything drawn for `chunk`.
    fn set_chunk_batches(&mut self, chunk: ChunkCoord, batches: Vec<InstanceBatch>);
    fn clear_chunk(&mut self, chunk: ChunkCoord);
    fn add_proxy(&mut self, desc: ProxyDesc) -> ProxyHandle;
    fn update_proxy(&mut self, proxy: ProxyHandle, translation: Vec3, rotation: Quat, opacity: f32);
    fn remove_proxy(&mut self, proxy: ProxyHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_bytes_are_tightly_packed() {
        let batch = InstanceBatch {
            material: Material::Stone,
            color: [0.5; 3],
            instances: vec![
                VoxelInstance {
                    translation: [0.5, 0.5, 0.5],
                },
                VoxelInstance {
                    translation: [1.5, 0.5, 0.5],
                },
            ],
        };
        assert_eq!(batch.instance_bytes().len(), 2 * 12);
    }

    #[test]
    fn test_shape_volume() {
        let cube = Shape::Cuboid {
            half_extents: Vec3::splat(0.5),
        };
        assert!((cube.volume() - 1.0).abs() < 1e-6);
        assert_eq!(cube.half_extents(), Vec3::splat(0.5));
        assert_eq!(Shape::Ball { radius: 2.0 }.half_extents(), Vec3::splat(2.0));
    }

    #[test]
    fn test_collision_event_involves() {
        let ev = CollisionEvent {
            a: BodyHandle(1),
            b: BodyHandle(2),
        };
        assert!(ev.involves(BodyHandle(2)));
        assert!(!ev.involves(BodyHandle(3)));
    }
}
