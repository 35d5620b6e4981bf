//! Free-falling pieces spawned when a voxel loses support.

use glam::{Quat, Vec3};
use tankvox_core::config::DebrisConfig;
use tankvox_core::material::{Material, MaterialTable, SupportKind};
use tankvox_core::math::voxel_to_world;
use tankvox_core::types::VoxelCoord;

use crate::backend::{
    BodyHandle, BodyKind, ColliderDesc, PhysicsBackend, PhysicsError, ProxyDesc, ProxyHandle,
    RenderBackend,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DebrisId(pub u64);

#[derive(Debug, Clone)]
pub struct Debris {
    pub id: DebrisId,
    pub material: Material,
    pub body: BodyHandle,
    pub proxy: ProxyHandle,
    /// Seconds spent fading, once a fade has started.
    pub fading: Option<f32>,
}

/// Why a piece left the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Despawn {
    BelowFloor,
    Faded,
    /// The backend no longer knows the body.
    Lost,
}

#[derive(Debug, Default)]
pub struct DebrisField {
    pieces: Vec<Debris>,
    next_id: u64,
}

impl DebrisField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a piece at the centre of `voxel` with the material's look and
    /// surface properties.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        &mut self,
        physics: &mut dyn PhysicsBackend,
        render: &mut dyn RenderBackend,
        materials: &MaterialTable,
        config: &DebrisConfig,
        voxel: VoxelCoord,
        material: Material,
        voxel_size: f32,
        rng: &mut fastrand::Rng,
    ) -> Result<DebrisId, PhysicsError> {
        let props = materials.get(material);
        let center = voxel_to_world(voxel, voxel_size);
        let half = Vec3::splat(voxel_size * 0.5);

        let body = physics.create_body(BodyKind::Dynamic, center);
        // Leaf clumps roll; everything else tumbles as a block.
        let shape = match props.support {
            SupportKind::Cluster => ColliderDesc::ball(voxel_size * 0.5),
            _ => ColliderDesc::cuboid(half),
        };
        let desc = shape.with_material(material, props);
        if let Err(e) = physics.create_collider(body, desc) {
            let _ = physics.remove_body(body);
            return Err(e);
        }
        let drift = Vec3::new(rng.f32() - 0.5, 0.0, rng.f32() - 0.5) * config.pop_speed;
        physics.set_linear_velocity(body, Vec3::Y * config.pop_speed + drift)?;
        physics.apply_torque_impulse(body, (Vec3::new(rng.f32(), rng.f32(), rng.f32()) - 0.5) * 0.2)?;

        let (r, g, b) = props.color;
        let proxy = render.add_proxy(ProxyDesc {
            translation: center,
            rotation: Quat::IDENTITY,
            half_extents: half,
            color: [r, g, b],
            opacity: 1.0,
        });

        let id = DebrisId(self.next_id);
        self.next_id += 1;
        self.pieces.push(Debris {
            id,
            material,
            body,
            proxy,
            fading: None,
        });
        Ok(id)
    }

    /// Roll whether a fresh piece fades, and after how long.
    pub fn roll_fade_delay(config: &DebrisConfig, rng: &mut fastrand::Rng) -> Option<f32> {
        if rng.f32() >= config.fade_probability {
            return None;
        }
        let span = config.fade_delay_max - config.fade_delay_min;
        Some(config.fade_delay_min + rng.f32() * span)
    }

    /// Begin fading `id`. Returns false if the piece is already gone.
    pub fn start_fade(&mut self, id: DebrisId) -> bool {
        match self.pieces.iter_mut().find(|d| d.id == id) {
            Some(piece) => {
                piece.fading.get_or_insert(0.0);
                true
            }
            None => false,
        }
    }

    /// Advance fades, sync proxies, and despawn finished pieces.
    /// Returns what was removed this tick.
    pub fn update(
        &mut self,
        dt: f32,
        physics: &mut dyn PhysicsBackend,
        render: &mut dyn RenderBackend,
        config: &DebrisConfig,
    ) -> Vec<(DebrisId, Despawn)> {
        let mut despawned = Vec::new();

        for piece in &mut self.pieces {
            let (translation, rotation) = match (physics.translation(piece.body), physics.rotation(piece.body)) {
                (Ok(t), Ok(r)) => (t, r),
                _ => {
                    log::debug!("debris {:?} lost its body {:?}", piece.id, piece.body);
                    despawned.push((piece.id, Despawn::Lost));
                    continue;
                }
            };
            if translation.y < config.floor_y {
                despawned.push((piece.id, Despawn::BelowFloor));
                continue;
            }

            let mut opacity = 1.0;
            if let Some(elapsed) = piece.fading.as_mut() {
                *elapsed += dt;
                if *elapsed >= config.fade_duration {
                    despawned.push((piece.id, Despawn::Faded));
                    continue;
                }
                opacity = 1.0 - *elapsed / config.fade_duration.max(f32::EPSILON);
            }
            render.update_proxy(piece.proxy, translation, rotation, opacity);
        }

        if !despawned.is_empty() {
            self.pieces.retain(|piece| {
                let gone = despawned.iter().any(|(id, _)| *id == piece.id);
                if gone {
                    if let Err(e) = physics.remove_body(piece.body) {
                        log::debug!("debris {:?}: {e}", piece.id);
                    }
                    render.remove_proxy(piece.proxy);
                }
                !gone
            });
        }
        despawned
    }

    /// Remove every piece and release its handles.
    pub fn clear(&mut self, physics: &mut dyn PhysicsBackend, render: &mut dyn RenderBackend) {
        for piece in self.pieces.drain(..) {
            let _ = physics.remove_body(piece.body);
            render.remove_proxy(piece.proxy);
        }
    }

    pub fn get(&self, id: DebrisId) -> Option<&Debris> {
        self.pieces.iter().find(|d| d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Debris> {
        self.pieces.iter()
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }
}
