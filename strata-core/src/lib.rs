//! strata-core - Host-facing contract for Strata
//!
//! This crate is the only thing host-patched generation code depends on:
//!
//! - **bridge**: the [`Bridge`] trait and the process-wide single-slot registry
//! - **hook_points**: patched call sites that consult the bridge and apply
//!   cancel / override / notify policies
//! - **dimension**: custom dimension descriptions and their validation
//! - **types**: chunk, region, climate and resource descriptors

pub mod bridge;
pub mod dimension;
pub mod error;
pub mod hook_points;
pub mod types;

/// Stable string identifiers of every hook.
pub mod hook_ids {
    pub const SERVER_STARTED: &str = "server.started";
    pub const SERVER_TICK: &str = "server.tick";
    pub const CHUNK_SURFACE: &str = "worldgen.chunk.surface";
    pub const CHUNK_NOISE: &str = "worldgen.chunk.noise";
    pub const CHUNK_CARVER: &str = "worldgen.chunk.carver";
    pub const BIOME_SELECT: &str = "worldgen.biome.select";
    pub const DENSITY: &str = "worldgen.density";
    pub const SURFACE_UPDATE: &str = "worldgen.surface.update";
    pub const SURFACE_BLOCK: &str = "worldgen.surface.block";
}

// Re-export commonly used types
pub use bridge::{Bridge, BridgeSlot, NoiseFillFuture, get_bridge, set_bridge};
pub use dimension::{DimensionConfigData, DimensionError, DimensionRegistrar, DimensionSink, DimensionTypeConfig};
pub use error::{Error, Result};
pub use hook_points::{HookPoints, StageVerdict};
pub use types::{BiomeRef, BlockState, ChunkHandle, ChunkPos, ClimateSample, RandomState, RegionHandle};
