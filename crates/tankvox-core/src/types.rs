use glam::IVec3;

/// Voxel coordinate in grid units (world-space, unbounded).
pub type VoxelCoord = IVec3;

/// Chunk coordinate in chunk-space (each unit = CHUNK_SIZE voxels).
pub type ChunkCoord = IVec3;

/// Offset of a voxel inside its chunk. Every component is in `[0, CHUNK_SIZE)`.
pub type LocalCoord = IVec3;
