//! Single source of truth for shared constants.
//! Tunables that callers may want to change at runtime live in `config`;
//! the values here are the structural ones and the config defaults.

/// Side length of a chunk in voxels.
pub const CHUNK_SIZE: u32 = 16;

/// Total voxels per chunk (16^3).
pub const VOXELS_PER_CHUNK: u32 = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

/// World units per voxel edge.
pub const DEFAULT_VOXEL_SIZE: f32 = 1.0;

/// Voxels at or below this Y are resting on the ground.
pub const DEFAULT_GROUND_LEVEL: i32 = 0;

/// Delay (seconds) between a removal and the support re-evaluation it triggers.
/// Removals landing inside this window share one batched recheck.
pub const SUPPORT_RECHECK_DELAY_S: f32 = 0.1;

/// Half-width of the cube scanned around a removal.
pub const SUPPORT_RADIUS: i32 = 3;

/// Half-width used when the removed voxel touched a chain-support voxel (trees).
pub const SUPPORT_RADIUS_NEAR_CHAIN: i32 = 10;

/// Upper bound on voxels visited by a single support search.
pub const SUPPORT_MAX_VISITED: usize = 4096;

/// Raycasts give up after `RAYCAST_STEP_FACTOR * max_distance / voxel_size` steps.
pub const RAYCAST_STEP_FACTOR: f32 = 3.0;

/// Debris whose body sinks below this world-space Y is despawned.
pub const DEBRIS_FLOOR_Y: f32 = -20.0;

/// Probability that a freshly spawned debris body schedules a fade-out.
pub const DEBRIS_FADE_PROBABILITY: f32 = 0.7;

/// Gravity applied by the headless physics backend (world units / s^2).
pub const GRAVITY: f32 = -9.81;
