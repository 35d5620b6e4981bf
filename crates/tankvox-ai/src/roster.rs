//! All live enemy agents.

use glam::Vec3;
use tankvox_world::backend::{PhysicsBackend, PhysicsError};
use tankvox_world::VoxelWorld;

use crate::agent::{AgentContext, AiAgent, Shot, Target};
use crate::config::AiConfig;
use crate::scene::ObstacleSet;
use crate::vehicle::{Vehicle, VehicleKind};

#[derive(Default)]
pub struct Roster {
    agents: Vec<AiAgent>,
    next_seed: u64,
}

impl Roster {
    /// `seed` feeds each agent's own generator in spawn order.
    pub fn new(seed: u64) -> Self {
        Self {
            agents: Vec::new(),
            next_seed: seed,
        }
    }

    /// Spawn an enemy vehicle with its controller. Its hull is registered
    /// in `scene` so other agents probe against it.
    pub fn spawn(
        &mut self,
        config: &AiConfig,
        physics: &mut dyn PhysicsBackend,
        scene: &mut ObstacleSet,
        position: Vec3,
        heading: Vec3,
    ) -> Result<&mut AiAgent, PhysicsError> {
        let vehicle = Vehicle::spawn(VehicleKind::Enemy, physics, Some(scene), position)?;
        let seed = self.next_seed;
        self.next_seed = self.next_seed.wrapping_add(1);
        self.agents.push(AiAgent::new(vehicle, config, heading, seed));
        let index = self.agents.len() - 1;
        Ok(&mut self.agents[index])
    }

    /// Tick every agent and collect the shots they fired.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        config: &AiConfig,
        world: &VoxelWorld,
        scene: &mut ObstacleSet,
        physics: &mut dyn PhysicsBackend,
        target: Option<Target>,
        now: f64,
        dt: f32,
    ) -> Vec<Shot> {
        for agent in &self.agents {
            let (Some(id), Some(position)) = (agent.vehicle.obstacle, agent.vehicle.position(&*physics)) else {
                continue;
            };
            scene.move_box(id, position);
        }

        let mut shots = Vec::new();
        for agent in &mut self.agents {
            let mut ctx = AgentContext {
                config,
                world,
                scene: &*scene,
                physics: &mut *physics,
                target,
                now,
                dt,
            };
            shots.extend(agent.update(&mut ctx));
        }
        shots
    }

    /// Despawn destroyed agents after the tick. Returns how many went.
    pub fn remove_destroyed(&mut self, physics: &mut dyn PhysicsBackend, scene: &mut ObstacleSet) -> usize {
        let before = self.agents.len();
        for agent in self.agents.iter().filter(|a| a.vehicle.is_destroyed()) {
            agent.vehicle.despawn(physics, Some(scene));
        }
        self.agents.retain(|a| !a.vehicle.is_destroyed());
        let removed = before - self.agents.len();
        if removed > 0 {
            log::debug!("removed {removed} destroyed agents, {} left", self.agents.len());
        }
        removed
    }

    /// Despawn everything.
    pub fn clear(&mut self, physics: &mut dyn PhysicsBackend, scene: &mut ObstacleSet) {
        for agent in self.agents.drain(..) {
            agent.vehicle.despawn(physics, Some(scene));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AiAgent> {
        self.agents.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AiAgent> {
        self.agents.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
