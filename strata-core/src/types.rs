//! World value types shared by the host and extensions.
//!
//! These are plain descriptors: they carry the coordinates and identifiers a
//! hook needs, never live host objects, so both sides can depend on them.

use serde::{Deserialize, Serialize};
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Positions and Generation Units
// ─────────────────────────────────────────────────────────────────────────────

/// Horizontal position of a chunk in chunk coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the given block coordinates.
    pub fn from_block(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x >> 4,
            z: block_z >> 4,
        }
    }

    /// Lowest block x inside this chunk.
    pub fn min_block_x(&self) -> i32 {
        self.x << 4
    }

    /// Lowest block z inside this chunk.
    pub fn min_block_z(&self) -> i32 {
        self.z << 4
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Descriptor of a chunk-like generation unit handed to a hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkHandle {
    pub pos: ChunkPos,
    pub min_y: i32,
    pub height: i32,
}

impl ChunkHandle {
    pub fn new(pos: ChunkPos, min_y: i32, height: i32) -> Self {
        Self { pos, min_y, height }
    }

    /// One past the highest block y in this chunk.
    pub fn max_y(&self) -> i32 {
        self.min_y + self.height
    }
}

/// Descriptor of the region a chunk is being generated in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionHandle {
    /// Chunk the region is centered on.
    pub center: ChunkPos,
    /// Radius in chunks that the region may write to.
    pub radius: i32,
}

impl RegionHandle {
    pub fn new(center: ChunkPos, radius: i32) -> Self {
        Self { center, radius }
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        let Ok(radius) = u32::try_from(self.radius) else {
            return false;
        };
        pos.x.abs_diff(self.center.x) <= radius && pos.z.abs_diff(self.center.z) <= radius
    }
}

/// Random state used by noise filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomState {
    pub seed: i64,
}

/// Climate parameters sampled by the host at a biome quad.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClimateSample {
    pub temperature: f64,
    pub humidity: f64,
    pub continentalness: f64,
    pub erosion: f64,
    pub depth: f64,
    pub weirdness: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Resource References
// ─────────────────────────────────────────────────────────────────────────────

/// Reference to a block state by resource id (e.g. `minecraft:stone`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockState(pub String);

impl BlockState {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a biome by resource id (e.g. `minecraft:plains`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BiomeRef(pub String);

impl BiomeRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BiomeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
