//! Tunables for hostile vehicles. The scoring weights are empirical; nothing
//! depends on their exact values.

use serde::{Deserialize, Serialize};
use tankvox_core::config::{finish, parse_ron};
use tankvox_core::error::{check_range, ConfigError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// A target further than this is never pursued.
    pub detection_range: f32,
    /// Half-angle of the view cone, in degrees off the heading.
    pub view_cone_deg: f32,
    /// Sight rays start this far above the body centre.
    pub eye_height: f32,
    /// Sight rays aim this far above the target's centre.
    pub target_height: f32,
    /// Full-throttle ground speed.
    pub move_speed: f32,
    /// Cap on horizontal speed change per second.
    pub acceleration: f32,
    /// Radians per second.
    pub turn_rate: f32,
    /// Pursuers stop closing in at this range.
    pub standoff_distance: f32,
    /// Forward probe length that counts as "blocked ahead".
    pub ahead_probe: f32,
    pub patrol: PatrolConfig,
    pub search: SearchConfig,
    pub stuck: StuckConfig,
    pub avoid: AvoidConfig,
    pub recovery: RecoveryConfig,
    pub fire: FireConfig,
    pub projectile: ProjectileConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            detection_range: 40.0,
            view_cone_deg: 90.0,
            eye_height: 0.6,
            target_height: 0.3,
            move_speed: 4.0,
            acceleration: 20.0,
            turn_rate: 2.5,
            standoff_distance: 8.0,
            ahead_probe: 2.5,
            patrol: PatrolConfig::default(),
            search: SearchConfig::default(),
            stuck: StuckConfig::default(),
            avoid: AvoidConfig::default(),
            recovery: RecoveryConfig::default(),
            fire: FireConfig::default(),
            projectile: ProjectileConfig::default(),
        }
    }
}

/// Random patrol point sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatrolConfig {
    pub distance_min: f32,
    pub distance_max: f32,
    /// Candidates are drawn within this many degrees of the heading.
    pub arc_deg: f32,
    pub attempts: u32,
    pub clearance_weight: f32,
    pub alignment_weight: f32,
    /// Lowest acceptable score.
    pub min_score: f32,
    /// Distance of the unvetted point used when sampling finds nothing.
    pub fallback_distance: f32,
    /// A point not reached within this many seconds is replaced.
    pub timeout: f32,
    pub arrive_distance: f32,
    /// Fraction of full throttle used while patrolling.
    pub throttle: f32,
}

impl Default for PatrolConfig {
    fn default() -> Self {
        Self {
            distance_min: 6.0,
            distance_max: 16.0,
            arc_deg: 120.0,
            attempts: 10,
            clearance_weight: 1.0,
            alignment_weight: 0.5,
            min_score: 0.6,
            fallback_distance: 3.0,
            timeout: 12.0,
            arrive_distance: 1.5,
            throttle: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Seconds spent heading for the last seen position before giving up.
    pub timeout: f32,
    pub arrive_distance: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout: 8.0,
            arrive_distance: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StuckConfig {
    /// Seconds between displacement checks.
    pub interval: f32,
    /// Horizontal movement below this over one interval counts as stuck.
    pub min_displacement: f32,
    /// Stuck checks in a row, while avoiding, before recovery kicks in.
    pub escalate_after: u32,
}

impl Default for StuckConfig {
    fn default() -> Self {
        Self {
            interval: 0.5,
            min_displacement: 0.2,
            escalate_after: 3,
        }
    }
}

/// Heading sweep used to steer around an obstacle. Finer and wider than the
/// patrol sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidConfig {
    /// Candidates span this many degrees either side of the heading.
    pub sweep_deg: f32,
    pub step_deg: f32,
    pub probe_distance: f32,
    /// Candidates with less clearance are not considered.
    pub min_clearance: f32,
    pub goal_weight: f32,
    /// Added to a fully open lane.
    pub open_bonus: f32,
    /// Fixed candidates tried when the sweep finds nothing.
    pub fallback_angles_deg: Vec<f32>,
    /// Seconds before the avoid direction is abandoned.
    pub budget: f32,
    pub throttle: f32,
}

impl Default for AvoidConfig {
    fn default() -> Self {
        Self {
            sweep_deg: 150.0,
            step_deg: 15.0,
            probe_distance: 8.0,
            min_clearance: 3.0,
            goal_weight: 0.6,
            open_bonus: 0.25,
            fallback_angles_deg: vec![90.0, -90.0, 135.0, -135.0, 180.0],
            budget: 1.5,
            throttle: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Seconds of reversing.
    pub duration: f32,
    /// Fraction of full throttle used in reverse.
    pub reverse_throttle: f32,
    /// Length of the left/right probes that pick the turn side.
    pub side_probe: f32,
    /// Lateral impulse range, in newton-seconds.
    pub impulse_min: f32,
    pub impulse_max: f32,
    /// Linear damping while recovering.
    pub damping: f32,
    /// Seconds before the original damping comes back.
    pub damping_restore_delay: f32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            duration: 0.8,
            reverse_throttle: 0.6,
            side_probe: 6.0,
            impulse_min: 8.0,
            impulse_max: 16.0,
            damping: 2.0,
            damping_restore_delay: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireConfig {
    /// Seconds between shots.
    pub interval: f32,
    pub range: f32,
    /// Half-angle, in degrees, the target must be within.
    pub cone_deg: f32,
    /// Per-agent accuracy is drawn from this range at spawn.
    pub accuracy_min: f32,
    pub accuracy_max: f32,
    /// How much accuracy is lost at the edge of firing range.
    pub distance_falloff: f32,
    /// Deviation of a shot with zero accuracy.
    pub max_spread_deg: f32,
    pub damage: f32,
}

impl Default for FireConfig {
    fn default() -> Self {
        Self {
            interval: 2.0,
            range: 30.0,
            cone_deg: 12.0,
            accuracy_min: 0.55,
            accuracy_max: 0.9,
            distance_falloff: 0.5,
            max_spread_deg: 10.0,
            damage: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileConfig {
    pub speed: f32,
    /// Seconds before an unexploded shell is dropped.
    pub lifetime: f32,
    pub blast_radius: f32,
    /// A shell passing this close to a vehicle centre hits it.
    pub hit_radius: f32,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            speed: 30.0,
            lifetime: 3.0,
            blast_radius: 1.5,
            hit_radius: 1.0,
        }
    }
}

impl AiConfig {
    pub fn from_ron_str(ron_str: &str) -> Result<Self, ConfigError> {
        let config: AiConfig = parse_ron("ai config", ron_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut e = Vec::new();
        check_range(&mut e, "detection_range", self.detection_range, 1.0, 1000.0, "1..=1000");
        check_range(&mut e, "view_cone_deg", self.view_cone_deg, 1.0, 90.0, "1..=90");
        check_range(&mut e, "move_speed", self.move_speed, 0.1, 100.0, "0.1..=100");
        check_range(&mut e, "acceleration", self.acceleration, 0.1, 1000.0, "0.1..=1000");
        check_range(&mut e, "turn_rate", self.turn_rate, 0.1, 20.0, "0.1..=20");
        check_range(&mut e, "ahead_probe", self.ahead_probe, 0.5, 50.0, "0.5..=50");

        let p = &self.patrol;
        check_range(&mut e, "patrol.distance_min", p.distance_min, 0.5, p.distance_max, "0.5..=distance_max");
        check_range(&mut e, "patrol.arc_deg", p.arc_deg, 0.0, 180.0, "0..=180");
        check_range(&mut e, "patrol.attempts", p.attempts as f32, 1.0, 256.0, "1..=256");
        check_range(&mut e, "patrol.throttle", p.throttle, 0.05, 1.0, "0.05..=1");

        check_range(&mut e, "stuck.interval", self.stuck.interval, 0.05, 10.0, "0.05..=10");
        check_range(&mut e, "stuck.escalate_after", self.stuck.escalate_after as f32, 1.0, 100.0, "1..=100");

        let a = &self.avoid;
        check_range(&mut e, "avoid.sweep_deg", a.sweep_deg, 0.0, 180.0, "0..=180");
        check_range(&mut e, "avoid.step_deg", a.step_deg, 1.0, 90.0, "1..=90");
        check_range(&mut e, "avoid.probe_distance", a.probe_distance, 0.5, 100.0, "0.5..=100");
        check_range(&mut e, "avoid.budget", a.budget, 0.1, 60.0, "0.1..=60");

        let r = &self.recovery;
        check_range(&mut e, "recovery.duration", r.duration, 0.05, 10.0, "0.05..=10");
        check_range(&mut e, "recovery.impulse_min", r.impulse_min, 0.0, r.impulse_max, "0..=impulse_max");
        check_range(&mut e, "recovery.damping", r.damping, 0.0, 100.0, "0..=100");

        let f = &self.fire;
        check_range(&mut e, "fire.interval", f.interval, 0.05, 60.0, "0.05..=60");
        check_range(&mut e, "fire.cone_deg", f.cone_deg, 0.0, 90.0, "0..=90");
        check_range(&mut e, "fire.accuracy_min", f.accuracy_min, 0.0, f.accuracy_max, "0..=accuracy_max");
        check_range(&mut e, "fire.accuracy_max", f.accuracy_max, 0.0, 1.0, "0..=1");
        check_range(&mut e, "fire.distance_falloff", f.distance_falloff, 0.0, 1.0, "0..=1");

        check_range(&mut e, "projectile.speed", self.projectile.speed, 0.1, 1000.0, "0.1..=1000");
        check_range(&mut e, "projectile.blast_radius", self.projectile.blast_radius, 0.0, 20.0, "0..=20");
        finish(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        AiConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = AiConfig::from_ron_str("(move_speed: 6.0, avoid: (budget: 2.0))").unwrap();
        assert_eq!(config.move_speed, 6.0);
        assert_eq!(config.avoid.budget, 2.0);
        assert_eq!(config.avoid.step_deg, AvoidConfig::default().step_deg);
        assert_eq!(config.fire, FireConfig::default());
    }

    #[test]
    fn test_wide_view_cone_rejected() {
        let err = AiConfig::from_ron_str("(view_cone_deg: 120.0)").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "view_cone_deg", .. }), "{err}");
    }

    #[test]
    fn test_inverted_ranges_reported_together() {
        let config = AiConfig {
            fire: FireConfig {
                accuracy_min: 0.9,
                accuracy_max: 0.5,
                ..FireConfig::default()
            },
            patrol: PatrolConfig {
                distance_min: 20.0,
                distance_max: 10.0,
                ..PatrolConfig::default()
            },
            ..AiConfig::default()
        };
        match config.validate() {
            Err(ConfigError::Invalid(count, _)) => assert_eq!(count, 2),
            other => panic!("expected two errors, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(matches!(
            AiConfig::from_ron_str("(move_speed: fast)"),
            Err(ConfigError::Parse { what: "ai config", .. })
        ));
    }
}
