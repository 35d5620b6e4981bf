use std::f32::consts::TAU;
use std::time::Instant;

use glam::Vec3;
use tankvox_ai::{AiConfig, ObstacleSet, Perception, ProjectileSet, Roster, Shot, Target, Vehicle, VehicleKind};
use tankvox_core::material::MaterialTable;
use tankvox_core::math::flatten;
use tankvox_world::arena::{generate_arena, surface_position};
use tankvox_world::backend::{PhysicsBackend, PhysicsError};
use tankvox_world::headless::{HeadlessPhysics, RecordingRenderer};
use tankvox_world::VoxelWorld;

use crate::scenes::{RunConfig, ScenePreset};

/// Timing data for one series of ticks.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TimingSeries {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Per-phase breakdown of the tick.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PhaseTimings {
    pub world: TimingSeries,
    pub ai: TimingSeries,
    pub projectiles: TimingSeries,
    pub physics: TimingSeries,
}

/// Result of one arena run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArenaResult {
    pub scene_name: String,
    pub voxels: usize,
    pub chunks: usize,
    pub colliders: usize,
    pub enemies: u32,
    pub enemies_destroyed: usize,
    pub shots_fired: usize,
    pub impacts: usize,
    pub voxels_destroyed: usize,
    pub chunks_rebuilt: usize,
    pub player_health: f32,
    pub tick_count: u32,
    pub timings: TimingSeries,
    pub phases: PhaseTimings,
}

#[derive(Default)]
struct Samples {
    world: Vec<f64>,
    ai: Vec<f64>,
    projectiles: Vec<f64>,
    physics: Vec<f64>,
    total: Vec<f64>,
}

/// Runs arena scenes on the headless backends.
pub struct ArenaRunner {
    config: RunConfig,
    tick_count: u32,
    dt: f32,
    enemies: Option<u32>,
}

impl ArenaRunner {
    pub fn new(config: RunConfig, tick_count: u32) -> Self {
        Self {
            config,
            tick_count,
            dt: 1.0 / 60.0,
            enemies: None,
        }
    }

    /// Spawn `count` enemies in every scene instead of the preset's number.
    pub fn with_enemies(mut self, count: u32) -> Self {
        self.enemies = Some(count);
        self
    }

    /// Run a single scene and return its counters and timings.
    pub fn run_scene(&self, preset: &ScenePreset) -> Result<ArenaResult, PhysicsError> {
        let arena = preset.arena(&self.config.arena);
        let ai = &self.config.ai;
        let dt = self.dt;
        let enemy_count = self.enemies.unwrap_or(preset.enemies);
        log::info!("Running scene '{}' ({} enemies)...", preset.name, enemy_count);

        let mut world = VoxelWorld::new(self.config.world.clone(), MaterialTable::default());
        let layout = generate_arena(&mut world, &arena);
        let mut physics = HeadlessPhysics::new();
        let mut render = RecordingRenderer::new();
        world.update(dt, &mut physics, &mut render);
        log::info!(
            "  Arena: {} voxels, {} trees, {} buildings",
            world.stats().voxels,
            layout.trees.len(),
            layout.buildings.len()
        );

        let mut scene = ObstacleSet::new();
        let player_at = surface_position(&world, 0, 0).unwrap_or(Vec3::new(0.5, 1.5, 0.5));
        let mut player = Vehicle::spawn(VehicleKind::Player, &mut physics, Some(&mut scene), player_at)?;

        let mut roster = Roster::new(arena.seed);
        let ring = arena.half_extent as f32 * 0.6;
        for i in 0..enemy_count {
            let angle = i as f32 / enemy_count as f32 * TAU;
            let x = (angle.cos() * ring) as i32;
            let z = (angle.sin() * ring) as i32;
            let Some(at) = surface_position(&world, x, z) else {
                log::warn!("no ground at ({x}, {z}), skipping enemy {i}");
                continue;
            };
            let heading = flatten(player_at - at);
            roster.spawn(ai, &mut physics, &mut scene, at, heading)?;
        }

        let mut projectiles = ProjectileSet::new();
        let mut samples = Samples::default();
        let mut now = 0.0f64;
        let mut shots_fired = 0;
        let mut impacts = 0;
        let mut voxels_destroyed = 0;
        let mut enemies_destroyed = 0;
        let mut chunks_rebuilt = 0;

        for _ in 0..self.tick_count {
            now += f64::from(dt);
            let tick_start = Instant::now();

            let start = Instant::now();
            chunks_rebuilt += world.update(dt, &mut physics, &mut render).chunks_rebuilt;
            samples.world.push(elapsed_ms(start));

            let start = Instant::now();
            let target = player_target(&player, &physics);
            if let (Some(t), Some(id)) = (target, player.obstacle) {
                scene.move_box(id, t.position);
            }
            let mut shots = roster.update(ai, &world, &mut scene, &mut physics, target, now, dt);
            shots.extend(player_shot(&mut player, &roster, &world, &scene, &physics, ai, now));
            samples.ai.push(elapsed_ms(start));

            let start = Instant::now();
            shots_fired += shots.len();
            for shot in shots {
                projectiles.fire(shot, &ai.projectile);
            }
            let tick_impacts = {
                let mut vehicles: Vec<&mut Vehicle> = roster
                    .iter_mut()
                    .map(|a| &mut a.vehicle)
                    .chain(std::iter::once(&mut player))
                    .collect();
                projectiles.update(dt, &ai.projectile, &mut world, &physics, &mut vehicles)
            };
            for impact in tick_impacts {
                impacts += 1;
                voxels_destroyed += impact.voxels_destroyed;
            }
            enemies_destroyed += roster.remove_destroyed(&mut physics, &mut scene);
            samples.projectiles.push(elapsed_ms(start));

            let start = Instant::now();
            physics.step(dt);
            physics.drain_collision_events();
            samples.physics.push(elapsed_ms(start));

            samples.total.push(elapsed_ms(tick_start));
        }

        let stats = world.stats();
        let timings = compute_timings(&samples.total);
        log::info!(
            "  Done: mean={:.2}ms, p95={:.2}ms, p99={:.2}ms, {} shots, {} enemies destroyed",
            timings.mean_ms,
            timings.p95_ms,
            timings.p99_ms,
            shots_fired,
            enemies_destroyed
        );

        let result = ArenaResult {
            scene_name: preset.name.to_string(),
            voxels: stats.voxels,
            chunks: stats.chunks,
            colliders: stats.colliders,
            enemies: enemy_count,
            enemies_destroyed,
            shots_fired,
            impacts,
            voxels_destroyed,
            chunks_rebuilt,
            player_health: player.health,
            tick_count: self.tick_count,
            timings,
            phases: PhaseTimings {
                world: compute_timings(&samples.world),
                ai: compute_timings(&samples.ai),
                projectiles: compute_timings(&samples.projectiles),
                physics: compute_timings(&samples.physics),
            },
        };

        roster.clear(&mut physics, &mut scene);
        player.despawn(&mut physics, Some(&mut scene));
        world.teardown(&mut physics, &mut render);
        Ok(result)
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn player_target(player: &Vehicle, physics: &dyn PhysicsBackend) -> Option<Target> {
    if player.is_destroyed() {
        return None;
    }
    player.position(physics).map(|position| Target {
        position,
        obstacle: player.obstacle,
    })
}

/// The player turret fires at the nearest enemy it can see.
fn player_shot(
    player: &mut Vehicle,
    roster: &Roster,
    world: &VoxelWorld,
    scene: &ObstacleSet,
    physics: &dyn PhysicsBackend,
    ai: &AiConfig,
    now: f64,
) -> Option<Shot> {
    if !player.ready_to_fire(now) {
        return None;
    }
    let origin = player.position(physics)? + Vec3::Y * ai.eye_height;
    let perception = Perception::new(world, scene, player.obstacle);
    let (aim, _) = roster
        .iter()
        .filter_map(|a| Some((a.vehicle.position(physics)?, a.vehicle.obstacle)))
        .filter(|(p, _)| p.distance(origin) <= ai.fire.range)
        .filter(|(p, id)| perception.line_of_sight(origin, *p, *id))
        .min_by(|a, b| a.0.distance(origin).total_cmp(&b.0.distance(origin)))?;
    if !player.try_fire(now) {
        return None;
    }
    Some(Shot {
        origin,
        direction: (aim - origin).normalize_or_zero(),
        damage: player.kind.shell_damage(),
        shooter: player.body,
    })
}

/// Compute timing statistics from a list of frame times in milliseconds.
pub fn compute_timings(times: &[f64]) -> TimingSeries {
    if times.is_empty() {
        return TimingSeries::default();
    }

    let mut sorted = times.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let p95_idx = ((n as f64) * 0.95).ceil() as usize;
    let p99_idx = ((n as f64) * 0.99).ceil() as usize;

    TimingSeries {
        mean_ms: mean,
        median_ms: median,
        p95_ms: sorted[p95_idx.min(n - 1)],
        p99_ms: sorted[p99_idx.min(n - 1)],
        min_ms: sorted[0],
        max_ms: sorted[n - 1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenes::standard_scenes;
    use tankvox_core::config::ArenaConfig;

    #[test]
    fn test_timings_of_known_series() {
        let t = compute_timings(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(t.mean_ms, 2.5);
        assert_eq!(t.median_ms, 2.5);
        assert_eq!(t.min_ms, 1.0);
        assert_eq!(t.max_ms, 4.0);
        assert_eq!(t.p99_ms, 4.0);
        assert_eq!(compute_timings(&[]).mean_ms, 0.0);
    }

    #[test]
    fn test_small_run_completes_and_cleans_up() {
        let config = RunConfig {
            arena: ArenaConfig {
                half_extent: 16,
                spawn_clearance: 4,
                ..ArenaConfig::default()
            },
            ..RunConfig::default()
        };
        let runner = ArenaRunner::new(config, 90).with_enemies(2);
        let preset = standard_scenes().remove(0);
        let result = runner.run_scene(&preset).unwrap();
        assert_eq!(result.scene_name, "open");
        assert_eq!(result.enemies, 2);
        assert_eq!(result.tick_count, 90);
        assert!(result.voxels > 0);
        assert!(result.colliders > 0);
        assert!(result.player_health > 0.0);
        assert!(result.timings.max_ms >= result.timings.min_ms);
    }
}
