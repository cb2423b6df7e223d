//! Hook Names, Argument Shapes and Verdicts
//!
//! Every hook is a [`HookName`] variant. The name fixes three things out of
//! band: the [`HookArgs`] variant the host passes, the [`HookPolicy`] used to
//! fold callback results into a [`Verdict`], and the [`Frequency`] that decides
//! whether failures are logged.
//!
//! | Hook | Identifier | Policy |
//! |------|------------|--------|
//! | started | `server.started` | notify |
//! | tick | `server.tick` | notify |
//! | surface build | `worldgen.chunk.surface` | cancel-on-true |
//! | noise fill | `worldgen.chunk.noise` | override-on-present |
//! | carvers | `worldgen.chunk.carver` | cancel-on-true |
//! | biome | `worldgen.biome.select` | override-on-present |
//! | density | `worldgen.density` | override-on-present |
//! | surface rule | `worldgen.surface.update` | notify |
//! | surface block | `worldgen.surface.block` | override-on-present |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use strata_core::hook_ids;
use strata_core::{ChunkHandle, ClimateSample, RandomState, RegionHandle};

use crate::{SdkError, SdkResult};

// ─────────────────────────────────────────────────────────────────────────────
// Hook Name Enum
// ─────────────────────────────────────────────────────────────────────────────

/// Stage of the host pipeline a callback is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookName {
    #[serde(rename = "server.started")]
    ServerStarted,
    #[serde(rename = "server.tick")]
    ServerTick,
    #[serde(rename = "worldgen.chunk.surface")]
    ChunkSurface,
    #[serde(rename = "worldgen.chunk.noise")]
    ChunkNoise,
    #[serde(rename = "worldgen.chunk.carver")]
    ChunkCarver,
    #[serde(rename = "worldgen.biome.select")]
    BiomeSelect,
    #[serde(rename = "worldgen.density")]
    Density,
    #[serde(rename = "worldgen.surface.update")]
    SurfaceUpdate,
    #[serde(rename = "worldgen.surface.block")]
    SurfaceBlock,
}

impl HookName {
    pub const ALL: [HookName; 9] = [
        HookName::ServerStarted,
        HookName::ServerTick,
        HookName::ChunkSurface,
        HookName::ChunkNoise,
        HookName::ChunkCarver,
        HookName::BiomeSelect,
        HookName::Density,
        HookName::SurfaceUpdate,
        HookName::SurfaceBlock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookName::ServerStarted => hook_ids::SERVER_STARTED,
            HookName::ServerTick => hook_ids::SERVER_TICK,
            HookName::ChunkSurface => hook_ids::CHUNK_SURFACE,
            HookName::ChunkNoise => hook_ids::CHUNK_NOISE,
            HookName::ChunkCarver => hook_ids::CHUNK_CARVER,
            HookName::BiomeSelect => hook_ids::BIOME_SELECT,
            HookName::Density => hook_ids::DENSITY,
            HookName::SurfaceUpdate => hook_ids::SURFACE_UPDATE,
            HookName::SurfaceBlock => hook_ids::SURFACE_BLOCK,
        }
    }

    pub fn policy(&self) -> HookPolicy {
        match self {
            HookName::ServerStarted | HookName::ServerTick | HookName::SurfaceUpdate => {
                HookPolicy::NotifyOnly
            }
            HookName::ChunkSurface | HookName::ChunkCarver => HookPolicy::CancelOnTrue,
            HookName::ChunkNoise
            | HookName::BiomeSelect
            | HookName::Density
            | HookName::SurfaceBlock => HookPolicy::OverrideOnPresent,
        }
    }

    /// Whether results for this hook are memoized in the hook caches.
    pub fn is_cached(&self) -> bool {
        matches!(self, HookName::BiomeSelect | HookName::Density | HookName::SurfaceBlock)
    }

    pub fn frequency(&self) -> Frequency {
        match self {
            HookName::BiomeSelect
            | HookName::Density
            | HookName::SurfaceUpdate
            | HookName::SurfaceBlock => Frequency::High,
            _ => Frequency::Low,
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookName {
    type Err = SdkError;

    fn from_str(s: &str) -> SdkResult<Self> {
        HookName::ALL
            .into_iter()
            .find(|hook| hook.as_str() == s)
            .ok_or_else(|| SdkError::unknown_hook(s))
    }
}

/// How a hook's callback results are folded into a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPolicy {
    /// Any callback returning `true` cancels the host stage.
    CancelOnTrue,
    /// The first present value in registration order overrides the host value.
    OverrideOnPresent,
    /// Results are ignored.
    NotifyOnly,
}

/// Call rate class of a hook; decides whether failures are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// Per tick or per chunk. Failures are logged.
    Low,
    /// Per block or per sample. Failures are dropped silently.
    High,
}

// ─────────────────────────────────────────────────────────────────────────────
// Hook Arguments
// ─────────────────────────────────────────────────────────────────────────────

/// Native arguments for one hook occurrence.
///
/// Serializes to the event object callbacks receive, e.g. density becomes
/// `{"x": 10, "y": 64, "z": 10, "density": 1.5}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HookArgs {
    Started {},
    Tick {
        tick: u64,
    },
    ChunkSurface {
        region: RegionHandle,
        chunk: ChunkHandle,
    },
    ChunkNoise {
        chunk: ChunkHandle,
        random_state: RandomState,
    },
    ChunkCarver {
        region: RegionHandle,
        chunk: ChunkHandle,
        seed: i64,
    },
    BiomeSelect {
        x: i32,
        y: i32,
        z: i32,
        climate: ClimateSample,
    },
    Density {
        x: i32,
        y: i32,
        z: i32,
        density: f64,
    },
    SurfaceUpdate {
        x: i32,
        y: i32,
        z: i32,
        stone_depth_above: i32,
        stone_depth_below: i32,
        water_height: i32,
    },
    SurfaceBlock {
        x: i32,
        y: i32,
        z: i32,
        surface_depth: i32,
    },
}

impl HookArgs {
    /// The hook these arguments belong to.
    pub fn hook(&self) -> HookName {
        match self {
            HookArgs::Started {} => HookName::ServerStarted,
            HookArgs::Tick { .. } => HookName::ServerTick,
            HookArgs::ChunkSurface { .. } => HookName::ChunkSurface,
            HookArgs::ChunkNoise { .. } => HookName::ChunkNoise,
            HookArgs::ChunkCarver { .. } => HookName::ChunkCarver,
            HookArgs::BiomeSelect { .. } => HookName::BiomeSelect,
            HookArgs::Density { .. } => HookName::Density,
            HookArgs::SurfaceUpdate { .. } => HookName::SurfaceUpdate,
            HookArgs::SurfaceBlock { .. } => HookName::SurfaceBlock,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// A callback's return value after unmarshaling.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnValue {
    Absent,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ReturnValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, ReturnValue::Absent)
    }

    /// Check the value fits the hook's result shape.
    ///
    /// Absent always fits. A mismatch is reported as a marshaling failure of
    /// the callback that produced it.
    pub fn conforms_to(&self, hook: HookName) -> bool {
        match (hook, self) {
            (_, ReturnValue::Absent) => true,
            (HookName::ChunkSurface | HookName::ChunkCarver, ReturnValue::Bool(_)) => true,
            (HookName::Density, ReturnValue::Number(_)) => true,
            (HookName::BiomeSelect | HookName::SurfaceBlock, ReturnValue::Text(_)) => true,
            (HookName::ChunkNoise, _) => true,
            (HookName::ServerStarted | HookName::ServerTick | HookName::SurfaceUpdate, _) => true,
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ReturnValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ReturnValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Folded outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Verdict {
    /// Keep the host's default behavior.
    #[default]
    Default,
    /// Skip the host's default logic for this stage.
    Cancel,
    /// Replace the host's value.
    Override(ReturnValue),
}

impl Verdict {
    pub fn is_cancel(&self) -> bool {
        matches!(self, Verdict::Cancel)
    }

    pub fn into_override(self) -> Option<ReturnValue> {
        match self {
            Verdict::Override(value) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::ChunkPos;

    #[test]
    fn test_hook_name_display_roundtrip() {
        for hook in HookName::ALL {
            assert_eq!(hook.to_string().parse::<HookName>().unwrap(), hook);
        }
        assert_eq!(HookName::Density.to_string(), "worldgen.density");
        assert!("worldgen.unknown".parse::<HookName>().unwrap_err().is_unknown_hook());
    }

    #[test]
    fn test_hook_policies() {
        assert_eq!(HookName::ChunkSurface.policy(), HookPolicy::CancelOnTrue);
        assert_eq!(HookName::Density.policy(), HookPolicy::OverrideOnPresent);
        assert_eq!(HookName::SurfaceUpdate.policy(), HookPolicy::NotifyOnly);
        assert_eq!(HookName::Density.frequency(), Frequency::High);
        assert_eq!(HookName::ChunkCarver.frequency(), Frequency::Low);
        assert_eq!(HookName::ServerTick.frequency(), Frequency::Low);
        assert!(HookName::SurfaceBlock.is_cached());
        assert!(!HookName::ChunkNoise.is_cached());
    }

    #[test]
    fn test_args_serialize_as_event_objects() {
        let args = HookArgs::Density {
            x: 10,
            y: 64,
            z: 10,
            density: 1.5,
        };
        assert_eq!(args.hook(), HookName::Density);
        assert_eq!(
            serde_json::to_value(&args).unwrap(),
            serde_json::json!({"x": 10, "y": 64, "z": 10, "density": 1.5})
        );

        let args = HookArgs::ChunkCarver {
            region: RegionHandle::new(ChunkPos::new(1, 2), 1),
            chunk: ChunkHandle::new(ChunkPos::new(1, 2), -64, 384),
            seed: 99,
        };
        let value = serde_json::to_value(&args).unwrap();
        assert_eq!(value["seed"], 99);
        assert_eq!(value["chunk"]["pos"]["z"], 2);

        assert_eq!(serde_json::to_value(HookArgs::Started {}).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_return_value_conformance() {
        assert!(ReturnValue::Absent.conforms_to(HookName::Density));
        assert!(ReturnValue::Number(1.0).conforms_to(HookName::Density));
        assert!(!ReturnValue::Text("x".into()).conforms_to(HookName::Density));
        assert!(ReturnValue::Bool(true).conforms_to(HookName::ChunkSurface));
        assert!(!ReturnValue::Number(1.0).conforms_to(HookName::ChunkCarver));
        assert!(ReturnValue::Text("minecraft:sand".into()).conforms_to(HookName::SurfaceBlock));
        assert!(ReturnValue::Bool(true).conforms_to(HookName::ServerTick));
        assert!(ReturnValue::Absent.is_absent());
        assert!(!ReturnValue::Bool(false).is_absent());
    }
}
