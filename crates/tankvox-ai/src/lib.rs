//! Hostile vehicles: perception, the layered controller, shells and the
//! roster that ticks them.

pub mod agent;
pub mod combat;
pub mod config;
pub mod perception;
pub mod roster;
pub mod scene;
pub mod vehicle;

pub use agent::{AgentContext, AiAgent, AiState, Shot, Target};
pub use combat::{Impact, Projectile, ProjectileSet};
pub use config::AiConfig;
pub use perception::Perception;
pub use roster::Roster;
pub use scene::{EmptyScene, ObstacleId, ObstacleSet, ObstacleShape, StaticGeometry};
pub use vehicle::{DamageOutcome, Vehicle, VehicleKind, HULL_HALF_EXTENTS};
