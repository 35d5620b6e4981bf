//! Layered controller for one hostile vehicle.
//!
//! Every tick runs the same pipeline: perceive, transition, stuck check,
//! steer, drive, fire. All probing goes through `Perception`, so voxel and
//! scene obstacles are treated alike. No branch can leave the agent without
//! a heading: every sampler ends in a random fallback.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{Quat, Vec3};
use tankvox_core::math::{flatten, rotate_y};
use tankvox_world::backend::{BodyHandle, PhysicsBackend};
use tankvox_world::VoxelWorld;

use crate::config::AiConfig;
use crate::perception::Perception;
use crate::scene::{ObstacleId, StaticGeometry};
use crate::vehicle::{Vehicle, HULL_HALF_EXTENTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AiState {
    Patrol,
    Pursue,
    SearchLastKnown,
    AvoidObstacle,
    RecoveryManeuver,
}

/// What the agent is hunting this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    /// Body centre.
    pub position: Vec3,
    /// The target's own hull, skipped by sight rays.
    pub obstacle: Option<ObstacleId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot {
    pub origin: Vec3,
    /// Unit direction after the accuracy deviation.
    pub direction: Vec3,
    pub damage: f32,
    pub shooter: BodyHandle,
}

/// Everything one agent tick may read or write.
pub struct AgentContext<'a> {
    pub config: &'a AiConfig,
    pub world: &'a VoxelWorld,
    pub scene: &'a dyn StaticGeometry,
    pub physics: &'a mut dyn PhysicsBackend,
    pub target: Option<Target>,
    /// Seconds on the caller's clock.
    pub now: f64,
    pub dt: f32,
}

pub struct AiAgent {
    pub vehicle: Vehicle,
    state: AiState,
    /// Flat unit vector.
    heading: Vec3,
    /// Commanded throttle of the last tick, negative in reverse.
    throttle: f32,
    /// Sampled once at spawn.
    accuracy: f32,
    rng: fastrand::Rng,

    patrol_point: Option<Vec3>,
    patrol_deadline: f64,
    last_known: Option<Vec3>,
    search_deadline: f64,
    avoid_direction: Vec3,
    avoid_deadline: f64,
    recovery_until: f64,
    /// +1 turns left, -1 right.
    recovery_turn: f32,
    saved_damping: Option<f32>,
    damping_restore_at: f64,

    stuck_anchor: Option<Vec3>,
    next_stuck_check: f64,
    /// Consecutive stuck checks with too little displacement.
    low_progress: u32,
}

impl AiAgent {
    pub fn new(vehicle: Vehicle, config: &AiConfig, heading: Vec3, seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        let fire = &config.fire;
        let accuracy = fire.accuracy_min + rng.f32() * (fire.accuracy_max - fire.accuracy_min);
        let heading = match flatten(heading) {
            Vec3::ZERO => Vec3::X,
            h => h,
        };
        Self {
            vehicle,
            state: AiState::Patrol,
            heading,
            throttle: 0.0,
            accuracy,
            rng,
            patrol_point: None,
            patrol_deadline: 0.0,
            last_known: None,
            search_deadline: 0.0,
            avoid_direction: heading,
            avoid_deadline: 0.0,
            recovery_until: 0.0,
            recovery_turn: 1.0,
            saved_damping: None,
            damping_restore_at: 0.0,
            stuck_anchor: None,
            next_stuck_check: 0.0,
            low_progress: 0,
        }
    }

    pub fn state(&self) -> AiState {
        self.state
    }

    pub fn heading(&self) -> Vec3 {
        self.heading
    }

    pub fn accuracy(&self) -> f32 {
        self.accuracy
    }

    pub fn patrol_point(&self) -> Option<Vec3> {
        self.patrol_point
    }

    pub fn last_known(&self) -> Option<Vec3> {
        self.last_known
    }

    /// Override the patrol goal until it is reached or times out.
    pub fn set_patrol_point(&mut self, point: Vec3, now: f64, config: &AiConfig) {
        self.patrol_point = Some(point);
        self.patrol_deadline = now + f64::from(config.patrol.timeout);
    }

    /// Advance one tick. Returns a shot when the gun fired.
    pub fn update(&mut self, ctx: &mut AgentContext) -> Option<Shot> {
        if self.vehicle.is_destroyed() {
            return None;
        }
        let Some(position) = self.vehicle.position(&*ctx.physics) else {
            log::debug!("agent body {:?} is gone, skipping tick", self.vehicle.body);
            return None;
        };
        let config = ctx.config;
        let now = ctx.now;
        self.restore_damping(ctx.physics, now);

        let perception = Perception::new(ctx.world, ctx.scene, self.vehicle.obstacle);
        let sight = ctx
            .target
            .filter(|t| perception.can_see(config, position, self.heading, t.position, t.obstacle));
        if let Some(t) = sight {
            self.last_known = Some(t.position);
        }

        self.think(config, &perception, &mut *ctx.physics, position, sight, now);
        self.check_stuck(config, &perception, &mut *ctx.physics, position, now);
        let (desired, throttle) = self.steer(config, &perception, position, sight, now);
        self.drive(config, &mut *ctx.physics, desired, throttle, ctx.dt);
        self.fire(config, position, sight, now)
    }

    fn transition(&mut self, next: AiState) {
        if self.state != next {
            log::debug!("agent {:?}: {:?} -> {:?}", self.vehicle.body, self.state, next);
            self.state = next;
        }
    }

    fn think(
        &mut self,
        config: &AiConfig,
        perception: &Perception,
        physics: &mut dyn PhysicsBackend,
        position: Vec3,
        sight: Option<Target>,
        now: f64,
    ) {
        match self.state {
            AiState::Patrol => {
                if sight.is_some() {
                    self.transition(AiState::Pursue);
                }
            }
            AiState::Pursue => {
                if sight.is_none() {
                    self.search_deadline = now + f64::from(config.search.timeout);
                    self.transition(AiState::SearchLastKnown);
                }
            }
            AiState::SearchLastKnown => {
                if sight.is_some() {
                    self.transition(AiState::Pursue);
                } else {
                    let arrived = self
                        .last_known
                        .map_or(true, |p| flat_distance(p, position) <= config.search.arrive_distance);
                    if arrived || now >= self.search_deadline {
                        self.last_known = None;
                        self.transition(AiState::Patrol);
                    }
                }
            }
            AiState::AvoidObstacle => {
                if now >= self.avoid_deadline {
                    if self.low_progress > 0 {
                        self.enter_recovery(config, perception, physics, position, now);
                    } else {
                        self.resume(config, sight, now);
                    }
                }
            }
            AiState::RecoveryManeuver => {
                if now >= self.recovery_until {
                    // The old goal is what got us stuck.
                    self.patrol_point = None;
                    self.low_progress = 0;
                    self.resume(config, sight, now);
                }
            }
        }

        let cruising = matches!(
            self.state,
            AiState::Patrol | AiState::Pursue | AiState::SearchLastKnown
        );
        if cruising
            && self.throttle > 0.0
            && perception.has_obstacle_in_direction(position, self.heading, config.ahead_probe)
        {
            self.enter_avoid(config, perception, position, sight, now);
        }
    }

    /// Go back to goal-directed movement.
    fn resume(&mut self, config: &AiConfig, sight: Option<Target>, now: f64) {
        if sight.is_some() {
            self.transition(AiState::Pursue);
        } else if self.last_known.is_some() {
            self.search_deadline = now + f64::from(config.search.timeout);
            self.transition(AiState::SearchLastKnown);
        } else {
            self.transition(AiState::Patrol);
        }
    }

    fn check_stuck(
        &mut self,
        config: &AiConfig,
        perception: &Perception,
        physics: &mut dyn PhysicsBackend,
        position: Vec3,
        now: f64,
    ) {
        if now < self.next_stuck_check {
            return;
        }
        self.next_stuck_check = now + f64::from(config.stuck.interval);
        let Some(anchor) = self.stuck_anchor.replace(position) else {
            return;
        };

        let moved = flat_distance(anchor, position);
        if self.throttle == 0.0 || moved >= config.stuck.min_displacement {
            self.low_progress = 0;
            return;
        }
        self.low_progress += 1;
        match self.state {
            AiState::Patrol | AiState::Pursue | AiState::SearchLastKnown => {
                log::debug!("agent {:?} stuck at {position}", self.vehicle.body);
                self.enter_avoid(config, perception, position, None, now);
            }
            AiState::AvoidObstacle if self.low_progress >= config.stuck.escalate_after => {
                self.enter_recovery(config, perception, physics, position, now);
            }
            _ => {}
        }
    }

    fn enter_avoid(
        &mut self,
        config: &AiConfig,
        perception: &Perception,
        position: Vec3,
        sight: Option<Target>,
        now: f64,
    ) {
        let goal = self
            .goal_point(sight)
            .map(|p| flatten(p - position))
            .filter(|d| *d != Vec3::ZERO)
            .unwrap_or(self.heading);
        self.avoid_direction = self.choose_avoid_direction(config, perception, position, goal);
        self.avoid_deadline = now + f64::from(config.avoid.budget);
        self.low_progress = 0;
        self.stuck_anchor = Some(position);
        self.next_stuck_check = now + f64::from(config.stuck.interval);
        self.transition(AiState::AvoidObstacle);
    }

    fn enter_recovery(
        &mut self,
        config: &AiConfig,
        perception: &Perception,
        physics: &mut dyn PhysicsBackend,
        position: Vec3,
        now: f64,
    ) {
        let r = &config.recovery;
        let left = rotate_y(self.heading, FRAC_PI_2);
        let right = rotate_y(self.heading, -FRAC_PI_2);
        let open_left = perception.clearance(position, left, r.side_probe);
        let open_right = perception.clearance(position, right, r.side_probe);
        let (turn, side) = if open_left >= open_right {
            (1.0, left)
        } else {
            (-1.0, right)
        };
        self.recovery_turn = turn;

        let body = self.vehicle.body;
        let strength = r.impulse_min + self.rng.f32() * (r.impulse_max - r.impulse_min);
        if let Err(e) = physics.apply_impulse(body, side * strength) {
            log::debug!("recovery impulse: {e}");
        }
        if self.saved_damping.is_none() {
            self.saved_damping = physics.linear_damping(body).ok();
        }
        if let Err(e) = physics.set_linear_damping(body, r.damping) {
            log::debug!("recovery damping: {e}");
        }
        self.damping_restore_at = now + f64::from(r.damping_restore_delay);
        self.recovery_until = now + f64::from(r.duration);
        self.low_progress = 0;
        self.transition(AiState::RecoveryManeuver);
    }

    fn restore_damping(&mut self, physics: &mut dyn PhysicsBackend, now: f64) {
        if now < self.damping_restore_at {
            return;
        }
        if let Some(damping) = self.saved_damping.take() {
            if let Err(e) = physics.set_linear_damping(self.vehicle.body, damping) {
                log::debug!("damping restore: {e}");
            }
        }
    }

    fn goal_point(&self, sight: Option<Target>) -> Option<Vec3> {
        sight
            .map(|t| t.position)
            .or(self.last_known)
            .or(self.patrol_point)
    }

    /// Direction and throttle for this tick.
    fn steer(
        &mut self,
        config: &AiConfig,
        perception: &Perception,
        position: Vec3,
        sight: Option<Target>,
        now: f64,
    ) -> (Vec3, f32) {
        let toward = |point: Vec3, fallback: Vec3| match flatten(point - position) {
            Vec3::ZERO => fallback,
            d => d,
        };
        match self.state {
            AiState::Patrol => {
                let stale = match self.patrol_point {
                    None => true,
                    Some(p) => {
                        flat_distance(p, position) <= config.patrol.arrive_distance || now >= self.patrol_deadline
                    }
                };
                if stale {
                    self.pick_patrol_point(config, perception, position, now);
                }
                let point = self.patrol_point.unwrap_or(position + self.heading);
                (toward(point, self.heading), config.patrol.throttle)
            }
            AiState::Pursue => {
                let Some(target) = sight else {
                    return (self.heading, 0.0);
                };
                let throttle = if flat_distance(target.position, position) > config.standoff_distance {
                    1.0
                } else {
                    0.0
                };
                (toward(target.position, self.heading), throttle)
            }
            AiState::SearchLastKnown => match self.last_known {
                Some(p) => (toward(p, self.heading), 1.0),
                None => (self.heading, 0.0),
            },
            AiState::AvoidObstacle => (self.avoid_direction, config.avoid.throttle),
            AiState::RecoveryManeuver => (
                rotate_y(self.heading, self.recovery_turn * FRAC_PI_2),
                -config.recovery.reverse_throttle,
            ),
        }
    }

    /// Random point around the heading, scored by how open the lane beyond
    /// it is and how well it keeps the current heading.
    fn pick_patrol_point(&mut self, config: &AiConfig, perception: &Perception, position: Vec3, now: f64) {
        let p = &config.patrol;
        let arc = p.arc_deg.to_radians();
        let probe = p.distance_max;
        let mut best: Option<(f32, Vec3)> = None;

        for _ in 0..p.attempts {
            let dir = rotate_y(self.heading, (self.rng.f32() * 2.0 - 1.0) * arc);
            let distance = p.distance_min + self.rng.f32() * (p.distance_max - p.distance_min);
            let clearance = perception.clearance(position, dir, probe);
            if clearance < distance {
                continue;
            }
            let score = p.clearance_weight * clearance / probe + p.alignment_weight * dir.dot(self.heading);
            if score >= p.min_score && best.map_or(true, |(s, _)| score > s) {
                best = Some((score, position + dir * distance));
            }
        }

        let point = match best {
            Some((_, point)) => point,
            None => {
                let dir = rotate_y(self.heading, self.rng.f32() * TAU);
                let point = position + dir * p.fallback_distance;
                log::debug!("agent {:?}: no open patrol lane, falling back to {point}", self.vehicle.body);
                point
            }
        };
        self.patrol_point = Some(point);
        self.patrol_deadline = now + f64::from(p.timeout);
    }

    /// Sweep headings around the current one and take the open lane that
    /// best serves `goal`. Falls back to fixed angles, then to a random
    /// direction.
    fn choose_avoid_direction(
        &mut self,
        config: &AiConfig,
        perception: &Perception,
        position: Vec3,
        goal: Vec3,
    ) -> Vec3 {
        let a = &config.avoid;
        let step = a.step_deg.to_radians();
        let steps = (a.sweep_deg / a.step_deg).floor() as i32;
        let mut best: Option<(f32, Vec3)> = None;

        for i in -steps..=steps {
            let dir = rotate_y(self.heading, i as f32 * step);
            let clearance = perception.clearance(position, dir, a.probe_distance);
            if clearance < a.min_clearance {
                continue;
            }
            let mut score = clearance / a.probe_distance * (1.0 + a.goal_weight * dir.dot(goal));
            if clearance >= a.probe_distance {
                score += a.open_bonus;
            }
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, dir));
            }
        }
        if let Some((_, dir)) = best {
            return dir;
        }

        let clearest = a
            .fallback_angles_deg
            .iter()
            .map(|deg| rotate_y(self.heading, deg.to_radians()))
            .map(|dir| (perception.clearance(position, dir, a.probe_distance), dir))
            .max_by(|x, y| x.0.total_cmp(&y.0));
        match clearest {
            Some((clearance, dir)) if clearance > HULL_HALF_EXTENTS.x => dir,
            _ => {
                log::debug!("agent {:?}: boxed in, picking a random direction", self.vehicle.body);
                rotate_y(self.heading, self.rng.f32() * TAU)
            }
        }
    }

    /// Turn toward `desired` at the turn rate and push the hull along the
    /// heading. Sideways motion is left to friction.
    fn drive(&mut self, config: &AiConfig, physics: &mut dyn PhysicsBackend, desired: Vec3, throttle: f32, dt: f32) {
        let max_turn = config.turn_rate * dt;
        let turn = signed_angle(self.heading, desired).clamp(-max_turn, max_turn);
        let turned = flatten(rotate_y(self.heading, turn));
        if turned != Vec3::ZERO {
            self.heading = turned;
        }
        self.vehicle.set_heading(physics, self.heading);

        self.throttle = throttle;
        let alignment = if throttle > 0.0 {
            self.heading.dot(desired).max(0.2)
        } else {
            1.0
        };
        let target_speed = config.move_speed * throttle * alignment;
        let body = self.vehicle.body;
        let velocity = match physics.linear_velocity(body) {
            Ok(v) => v,
            Err(e) => {
                log::debug!("drive: {e}");
                return;
            }
        };
        let along = velocity.dot(self.heading);
        let max_change = config.acceleration * dt;
        let change = (target_speed - along).clamp(-max_change, max_change);
        if let Err(e) = physics.set_linear_velocity(body, velocity + self.heading * change) {
            log::debug!("drive: {e}");
        }
    }

    fn fire(&mut self, config: &AiConfig, position: Vec3, sight: Option<Target>, now: f64) -> Option<Shot> {
        let target = sight?;
        let f = &config.fire;
        let eye = position + Vec3::Y * config.eye_height;
        let aim_at = target.position + Vec3::Y * config.target_height;
        let to_target = aim_at - eye;
        let distance = to_target.length();
        if distance > f.range || !self.vehicle.ready_to_fire(now) {
            return None;
        }
        let flat = flatten(to_target);
        if flat != Vec3::ZERO && flat.angle_between(self.heading).to_degrees() > f.cone_deg {
            return None;
        }

        self.vehicle.reload(now, f.interval);
        let aim = to_target / distance;
        let spread = self.max_deviation(config, distance);
        let direction = self.deviate(aim, spread);
        Some(Shot {
            origin: eye + aim * HULL_HALF_EXTENTS.x,
            direction,
            damage: f.damage,
            shooter: self.vehicle.body,
        })
    }

    /// Largest angular error, in radians, for a shot at `distance`.
    pub fn max_deviation(&self, config: &AiConfig, distance: f32) -> f32 {
        let f = &config.fire;
        let normalized = (distance / f.range).clamp(0.0, 1.0);
        let effective = self.accuracy * (1.0 - f.distance_falloff * normalized);
        (1.0 - effective) * f.max_spread_deg.to_radians()
    }

    /// Tilt `aim` by up to `spread` radians in a random direction.
    fn deviate(&mut self, aim: Vec3, spread: f32) -> Vec3 {
        let (u, v) = aim.any_orthonormal_pair();
        let roll = self.rng.f32() * TAU;
        let axis = u * roll.cos() + v * roll.sin();
        let magnitude = self.rng.f32() * spread;
        (Quat::from_axis_angle(axis, magnitude) * aim).normalize()
    }
}

fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    Vec3::new(a.x - b.x, 0.0, a.z - b.z).length()
}

/// Angle from `from` to `to` about +Y, positive toward the left.
fn signed_angle(from: Vec3, to: Vec3) -> f32 {
    from.cross(to).y.atan2(from.dot(to))
}
