//! Host-side hook points.
//!
//! Each method here is what the host's patched call site runs: it reads the
//! bridge slot once, passes through to host behavior when the slot is empty,
//! and interprets the bridge's answer with the hook's policy (cancel-on-true,
//! override-on-present or notify-only).
//!
//! A panicking bridge never unwinds into the host. Low-frequency hooks log the
//! panic; high-frequency hooks (density, biome, surface rule and surface block)
//! fall back silently.

use std::panic::{self, AssertUnwindSafe};

use crate::bridge::{self, Bridge, BridgeSlot, NoiseFillFuture};
use crate::error::panic_message;
use crate::hook_ids;
use crate::types::{BiomeRef, BlockState, ChunkHandle, ClimateSample, RandomState, RegionHandle};

/// What the host does with a cancellable stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageVerdict {
    /// Run the host's default logic.
    Proceed,
    /// An extension handled the stage; skip the default logic.
    Skip,
}

impl StageVerdict {
    pub fn from_cancelled(cancelled: bool) -> Self {
        if cancelled { Self::Skip } else { Self::Proceed }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }
}

/// Call sites patched into the host pipeline.
#[derive(Clone, Copy)]
pub struct HookPoints<'a> {
    slot: &'a BridgeSlot,
}

impl HookPoints<'static> {
    /// Hook points reading the process-wide bridge.
    pub fn global() -> Self {
        Self {
            slot: bridge::global(),
        }
    }
}

impl<'a> HookPoints<'a> {
    /// Hook points reading a specific slot.
    pub fn new(slot: &'a BridgeSlot) -> Self {
        Self { slot }
    }

    pub fn started(&self) {
        self.notify(hook_ids::SERVER_STARTED, true, |b| b.on_server_started());
    }

    pub fn tick(&self) {
        self.notify(hook_ids::SERVER_TICK, true, |b| b.on_server_tick());
    }

    pub fn build_surface(&self, region: &RegionHandle, chunk: &ChunkHandle) -> StageVerdict {
        let cancelled = self.call(hook_ids::CHUNK_SURFACE, true, |b| {
            b.on_chunk_surface_generate(region, chunk)
        });
        StageVerdict::from_cancelled(cancelled.unwrap_or(false))
    }

    pub fn apply_carvers(&self, region: &RegionHandle, chunk: &ChunkHandle, seed: i64) -> StageVerdict {
        let cancelled = self.call(hook_ids::CHUNK_CARVER, true, |b| {
            b.on_chunk_carver_apply(region, chunk, seed)
        });
        StageVerdict::from_cancelled(cancelled.unwrap_or(false))
    }

    /// Replacement fill for the chunk, or `None` to run the host's fill.
    pub fn fill_from_noise(&self, chunk: &ChunkHandle, random: &RandomState) -> Option<NoiseFillFuture> {
        self.call(hook_ids::CHUNK_NOISE, true, |b| b.on_chunk_noise_fill(chunk, random))
            .flatten()
    }

    pub fn resolve_biome(
        &self,
        x: i32,
        y: i32,
        z: i32,
        climate: &ClimateSample,
        original: BiomeRef,
    ) -> BiomeRef {
        self.call(hook_ids::BIOME_SELECT, false, |b| b.on_biome_select(x, y, z, climate))
            .flatten()
            .unwrap_or(original)
    }

    pub fn resolve_density(&self, x: i32, y: i32, z: i32, original: f64) -> f64 {
        self.call(hook_ids::DENSITY, false, |b| b.on_density_compute(x, y, z, original))
            .flatten()
            .unwrap_or(original)
    }

    pub fn surface_rule_updated(
        &self,
        x: i32,
        y: i32,
        z: i32,
        stone_depth_above: i32,
        stone_depth_below: i32,
        water_height: i32,
    ) {
        self.notify(hook_ids::SURFACE_UPDATE, false, |b| {
            b.on_surface_rule_update(x, y, z, stone_depth_above, stone_depth_below, water_height)
        });
    }

    pub fn resolve_surface_block(
        &self,
        x: i32,
        y: i32,
        z: i32,
        surface_depth: i32,
        original: BlockState,
    ) -> BlockState {
        self.call(hook_ids::SURFACE_BLOCK, false, |b| {
            b.on_surface_block_select(x, y, z, surface_depth)
        })
        .flatten()
        .unwrap_or(original)
    }

    fn notify(&self, hook: &'static str, loud: bool, f: impl FnOnce(&dyn Bridge)) {
        let _ = self.call(hook, loud, f);
    }

    /// Run `f` against the installed bridge. `None` means no bridge or a panic.
    fn call<T>(&self, hook: &'static str, loud: bool, f: impl FnOnce(&dyn Bridge) -> T) -> Option<T> {
        let outcome = self
            .slot
            .with(|bridge| panic::catch_unwind(AssertUnwindSafe(|| f(bridge))))?;
        match outcome {
            Ok(value) => Some(value),
            Err(payload) => {
                if loud {
                    tracing::warn!(
                        hook,
                        error = %panic_message(payload.as_ref()),
                        "Hook panicked; falling back to host default"
                    );
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::tests::StubBridge;
    use crate::types::ChunkPos;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    fn chunk() -> ChunkHandle {
        ChunkHandle::new(ChunkPos::new(0, 0), -64, 384)
    }

    fn region() -> RegionHandle {
        RegionHandle::new(ChunkPos::new(0, 0), 1)
    }

    #[test]
    fn test_absent_bridge_passes_through() {
        let slot = BridgeSlot::new();
        let hooks = HookPoints::new(&slot);

        hooks.started();
        hooks.tick();
        hooks.surface_rule_updated(0, 64, 0, 1, 2, 63);
        assert_eq!(hooks.build_surface(&region(), &chunk()), StageVerdict::Proceed);
        assert_eq!(hooks.apply_carvers(&region(), &chunk(), 7), StageVerdict::Proceed);
        assert!(hooks.fill_from_noise(&chunk(), &RandomState { seed: 1 }).is_none());
        assert_eq!(hooks.resolve_density(10, 64, 10, 1.5), 1.5);
        assert_eq!(
            hooks.resolve_surface_block(0, 64, 0, 1, BlockState::new("minecraft:grass_block")),
            BlockState::new("minecraft:grass_block")
        );
        assert_eq!(
            hooks.resolve_biome(0, 0, 0, &ClimateSample::default(), BiomeRef::new("minecraft:plains")),
            BiomeRef::new("minecraft:plains")
        );
    }

    #[test]
    fn test_overrides_and_cancels_apply() {
        let slot = BridgeSlot::new();
        slot.set(Arc::new(StubBridge {
            cancel: true,
            density: Some(3.0),
            block: Some(BlockState::new("minecraft:sand")),
            biome: Some(BiomeRef::new("minecraft:desert")),
            ..Default::default()
        }));
        let hooks = HookPoints::new(&slot);

        assert!(hooks.build_surface(&region(), &chunk()).is_skip());
        assert!(hooks.apply_carvers(&region(), &chunk(), 7).is_skip());
        assert_eq!(hooks.resolve_density(10, 64, 10, 1.5), 3.0);
        assert_eq!(
            hooks.resolve_surface_block(0, 64, 0, 1, BlockState::new("minecraft:grass_block")),
            BlockState::new("minecraft:sand")
        );
        assert_eq!(
            hooks.resolve_biome(0, 0, 0, &ClimateSample::default(), BiomeRef::new("minecraft:plains")),
            BiomeRef::new("minecraft:desert")
        );

        let filled = hooks.fill_from_noise(&chunk(), &RandomState { seed: 1 }).unwrap();
        assert_eq!(tokio_test::block_on(filled), chunk());
    }

    #[test]
    fn test_panicking_bridge_does_not_unwind_into_host() {
        let slot = BridgeSlot::new();
        let stub = Arc::new(StubBridge {
            panic_on_density: true,
            cancel: true,
            ..Default::default()
        });
        slot.set(stub.clone());
        let hooks = HookPoints::new(&slot);

        assert_eq!(hooks.resolve_density(1, 2, 3, 0.25), 0.25);
        assert_eq!(hooks.apply_carvers(&region(), &chunk(), 7), StageVerdict::Proceed);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }
}
