//! Shared data for the voxel arena: coordinates, materials, configuration.

pub mod config;
pub mod constants;
pub mod direction;
pub mod error;
pub mod material;
pub mod math;
pub mod types;

pub use config::{ArenaConfig, DebrisConfig, SupportConfig, TruncationBias, WorldConfig};
pub use error::ConfigError;
pub use material::{Material, MaterialProps, MaterialTable, SupportKind};
