use serde::{Deserialize, Serialize};
use tankvox_ai::AiConfig;
use tankvox_core::config::{parse_ron, ArenaConfig, WorldConfig};
use tankvox_core::error::ConfigError;

/// Everything a run reads from `--config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub world: WorldConfig,
    pub arena: ArenaConfig,
    pub ai: AiConfig,
}

impl RunConfig {
    pub fn from_ron_str(ron_str: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = parse_ron("run config", ron_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section, reporting all failures together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors: Vec<ConfigError> = [self.world.validate(), self.arena.validate(), self.ai.validate()]
            .into_iter()
            .filter_map(Result::err)
            .collect();
        tankvox_core::config::finish(errors)
    }
}

/// One arena layout in the standard suite.
pub struct ScenePreset {
    pub name: &'static str,
    pub enemies: u32,
    /// Tweaks applied on top of the configured arena.
    pub shape: fn(&mut ArenaConfig),
}

impl ScenePreset {
    pub fn arena(&self, base: &ArenaConfig) -> ArenaConfig {
        let mut arena = base.clone();
        (self.shape)(&mut arena);
        arena
    }
}

/// Open field, forest, town.
pub fn standard_scenes() -> Vec<ScenePreset> {
    vec![
        ScenePreset {
            name: "open",
            enemies: 4,
            shape: |a| {
                a.tree_density = 0.0;
                a.building_count = 0;
            },
        },
        ScenePreset {
            name: "forest",
            enemies: 6,
            shape: |a| {
                a.tree_density = 0.02;
                a.building_count = 0;
            },
        },
        ScenePreset {
            name: "town",
            enemies: 6,
            shape: |a| {
                a.tree_density *= 0.5;
                a.building_count = a.building_count.max(8);
            },
        },
    ]
}
