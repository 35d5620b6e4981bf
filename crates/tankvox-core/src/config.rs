//! Runtime tunables for the voxel world and arena generation.
//!
//! All structs load from RON with every field optional; missing fields take
//! the defaults below. Loading always validates.

use crate::constants::*;
use crate::error::{check_range, ConfigError};
use serde::{Deserialize, Serialize};

/// What a support search concludes when it hits the visited cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TruncationBias {
    /// Treat the voxel as held up. Large structures never mass-collapse
    /// because a search ran out of budget.
    #[default]
    AssumeSupported,
    /// Treat the voxel as unsupported.
    AssumeUnsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportConfig {
    /// Seconds between a removal and its support re-evaluation.
    pub recheck_delay: f32,
    /// Half-width of the re-evaluated cube.
    pub radius: i32,
    /// Half-width when the removed voxel touched a chain-support voxel.
    pub chain_radius: i32,
    /// Cap on voxels visited by one search.
    pub max_visited: usize,
    pub truncation_bias: TruncationBias,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            recheck_delay: SUPPORT_RECHECK_DELAY_S,
            radius: SUPPORT_RADIUS,
            chain_radius: SUPPORT_RADIUS_NEAR_CHAIN,
            max_visited: SUPPORT_MAX_VISITED,
            truncation_bias: TruncationBias::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebrisConfig {
    /// Debris below this world-space Y is removed.
    pub floor_y: f32,
    /// Chance that a spawned piece schedules a fade.
    pub fade_probability: f32,
    pub fade_delay_min: f32,
    pub fade_delay_max: f32,
    /// Seconds the opacity ramp takes before despawn.
    pub fade_duration: f32,
    /// Upward speed given to fresh debris so it visibly pops loose.
    pub pop_speed: f32,
}

impl Default for DebrisConfig {
    fn default() -> Self {
        Self {
            floor_y: DEBRIS_FLOOR_Y,
            fade_probability: DEBRIS_FADE_PROBABILITY,
            fade_delay_min: 3.0,
            fade_delay_max: 8.0,
            fade_duration: 1.0,
            pop_speed: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World units per voxel edge.
    pub voxel_size: f32,
    /// Voxels at or below this Y count as grounded.
    pub ground_level: i32,
    /// Seed for debris fade rolls.
    pub seed: u64,
    pub support: SupportConfig,
    pub debris: DebrisConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            voxel_size: DEFAULT_VOXEL_SIZE,
            ground_level: DEFAULT_GROUND_LEVEL,
            seed: 0x7a4b_5eed,
            support: SupportConfig::default(),
            debris: DebrisConfig::default(),
        }
    }
}

impl WorldConfig {
    pub fn from_ron_str(ron_str: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = parse_ron("world config", ron_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        check_range(&mut errors, "voxel_size", self.voxel_size, 1e-3, 1e3, "> 0");
        let s = &self.support;
        check_range(&mut errors, "support.recheck_delay", s.recheck_delay, 0.0, 60.0, "0..=60 s");
        check_range(&mut errors, "support.radius", s.radius as f32, 0.0, 64.0, "0..=64");
        check_range(
            &mut errors,
            "support.chain_radius",
            s.chain_radius as f32,
            s.radius as f32,
            64.0,
            ">= radius",
        );
        if s.max_visited == 0 {
            errors.push(ConfigError::OutOfRange {
                field: "support.max_visited",
                value: 0.0,
                expected: ">= 1",
            });
        }
        let d = &self.debris;
        check_range(&mut errors, "debris.fade_probability", d.fade_probability, 0.0, 1.0, "0..=1");
        check_range(&mut errors, "debris.fade_delay_min", d.fade_delay_min, 0.0, 600.0, "0..=600 s");
        check_range(
            &mut errors,
            "debris.fade_delay_max",
            d.fade_delay_max,
            d.fade_delay_min,
            600.0,
            ">= fade_delay_min",
        );
        check_range(&mut errors, "debris.fade_duration", d.fade_duration, 0.0, 60.0, "0..=60 s");
        finish(errors)
    }
}

/// Parameters consumed once by arena generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Arena spans `-half_extent..half_extent` on X and Z, in voxels.
    pub half_extent: i32,
    /// Layers of terrain below the surface.
    pub ground_depth: i32,
    pub wall_height: i32,
    /// Expected trees per surface voxel.
    pub tree_density: f32,
    pub trunk_height_min: i32,
    pub trunk_height_max: i32,
    pub canopy_radius: i32,
    pub building_count: u32,
    pub building_size_min: i32,
    pub building_size_max: i32,
    pub building_height: i32,
    /// Clear radius around the origin kept free for the player spawn.
    pub spawn_clearance: i32,
    pub seed: u64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            half_extent: 40,
            ground_depth: 3,
            wall_height: 4,
            tree_density: 0.003,
            trunk_height_min: 4,
            trunk_height_max: 7,
            canopy_radius: 2,
            building_count: 4,
            building_size_min: 5,
            building_size_max: 9,
            building_height: 5,
            spawn_clearance: 8,
            seed: 42,
        }
    }
}

impl ArenaConfig {
    pub fn from_ron_str(ron_str: &str) -> Result<Self, ConfigError> {
        let config: ArenaConfig = parse_ron("arena config", ron_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        check_range(&mut errors, "half_extent", self.half_extent as f32, 4.0, 4096.0, "4..=4096");
        check_range(&mut errors, "ground_depth", self.ground_depth as f32, 1.0, 64.0, "1..=64");
        check_range(&mut errors, "wall_height", self.wall_height as f32, 0.0, 64.0, "0..=64");
        check_range(&mut errors, "tree_density", self.tree_density, 0.0, 1.0, "0..=1");
        check_range(
            &mut errors,
            "trunk_height_min",
            self.trunk_height_min as f32,
            1.0,
            self.trunk_height_max as f32,
            "1..=trunk_height_max",
        );
        check_range(
            &mut errors,
            "building_size_min",
            self.building_size_min as f32,
            3.0,
            self.building_size_max as f32,
            "3..=building_size_max",
        );
        check_range(&mut errors, "building_height", self.building_height as f32, 2.0, 64.0, "2..=64");
        finish(errors)
    }
}

/// Deserialize `ron_str`, labelling failures with `what`.
pub fn parse_ron<T: for<'de> Deserialize<'de>>(what: &'static str, ron_str: &str) -> Result<T, ConfigError> {
    let options = ron::Options::default();
    options.from_str(ron_str).map_err(|e| ConfigError::Parse {
        what,
        message: e.to_string(),
    })
}

/// `Ok` when no validation error was collected.
pub fn finish(errors: Vec<ConfigError>) -> Result<(), ConfigError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::from_list(errors))
    }
}
