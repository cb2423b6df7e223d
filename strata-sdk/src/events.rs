//! Event Manager
//!
//! The extension side of the bridge. [`EventManager`] implements
//! [`strata_core::Bridge`] by turning each host call into [`HookArgs`],
//! dispatching it, and mapping the verdict back to the host's return type.
//!
//! Density and surface-block overrides go through the [`HookCaches`]; biome
//! overrides do too once biome wiring is enabled. Hooks listed in
//! `dispatch.guarded_hooks` run on the [`BoundedExecutor`] under its default
//! deadline and count as "no result" when they miss it.
//!
//! # Failure policy
//!
//! | Frequency | Hooks | On failure |
//! |-----------|-------|------------|
//! | low | started, tick, surface, noise, carver | `warn!` then default |
//! | high | biome, density, surface update, surface block | default, no log |

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use strata_core::{
    BiomeRef, BlockState, Bridge, ChunkHandle, ClimateSample, DimensionConfigData, NoiseFillFuture,
    RandomState, RegionHandle,
};

use crate::cache::HookCaches;
use crate::config::{DispatchConfig, StrataConfig};
use crate::executor::BoundedExecutor;
use crate::extensions::{
    DispatchReport, ExtensionRuntime, Frequency, HookArgs, HookName, RuntimeError, SharedDispatcher, Verdict,
};
use crate::{SdkError, SdkResult};

/// Bridge implementation backed by a dispatcher.
pub struct EventManager<R: ExtensionRuntime> {
    dispatcher: SharedDispatcher<R>,
    caches: Arc<HookCaches>,
    executor: Arc<BoundedExecutor>,
    tick_interval: u64,
    dispatch: DispatchConfig,
    tick_count: AtomicU64,
    dimensions: RwLock<Vec<DimensionConfigData>>,
}

impl<R: ExtensionRuntime> EventManager<R> {
    pub fn new(
        dispatcher: SharedDispatcher<R>,
        caches: Arc<HookCaches>,
        executor: Arc<BoundedExecutor>,
        config: &StrataConfig,
    ) -> Self {
        Self {
            dispatcher,
            caches,
            executor,
            tick_interval: config.events.tick_interval.max(1),
            dispatch: config.dispatch.clone(),
            tick_count: AtomicU64::new(0),
            dimensions: RwLock::new(Vec::new()),
        }
    }

    pub fn dispatcher(&self) -> &SharedDispatcher<R> {
        &self.dispatcher
    }

    pub fn caches(&self) -> &Arc<HookCaches> {
        &self.caches
    }

    /// Host ticks seen so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Relaxed)
    }

    /// Queue a dimension for creation at world load.
    ///
    /// Rejects invalid configs and ids that are already registered.
    pub fn register_dimension(&self, config: DimensionConfigData) -> SdkResult<()> {
        config.validate()?;

        let mut dimensions = self.dimensions.write().unwrap_or_else(PoisonError::into_inner);
        if dimensions.iter().any(|existing| existing.id == config.id) {
            return Err(SdkError::invalid_operation(format!(
                "dimension already registered: {}",
                config.id
            )));
        }

        tracing::info!(dimension = %config.id, "Dimension registered");
        dimensions.push(config);
        Ok(())
    }

    /// Forget every registered dimension. Returns how many were dropped.
    pub fn clear_dimensions(&self) -> usize {
        let mut dimensions = self.dimensions.write().unwrap_or_else(PoisonError::into_inner);
        let n = dimensions.len();
        dimensions.clear();
        n
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────────

    /// Dispatch one occurrence and apply the failure policy.
    fn fire(&self, args: HookArgs) -> Verdict {
        let hook = args.hook();
        let result = if self.dispatch.guarded_hooks.contains(&hook) {
            match self.fire_guarded(args) {
                Some(result) => result,
                None => return Verdict::Default,
            }
        } else {
            self.dispatcher.dispatch(&args)
        };

        match result {
            Ok(report) => {
                if hook.frequency() == Frequency::Low {
                    log_failures(hook, &report);
                }
                report.verdict
            }
            Err(e) => {
                if hook.frequency() == Frequency::Low {
                    tracing::warn!(hook = %hook, error = %e, "Hook dispatch failed");
                }
                Verdict::Default
            }
        }
    }

    /// Dispatch on the executor. `None` when it missed the deadline.
    fn fire_guarded(&self, args: HookArgs) -> Option<Result<DispatchReport, RuntimeError>> {
        let hook = args.hook();
        if !self.dispatcher.has_callbacks(hook) {
            return Some(Ok(DispatchReport::default()));
        }

        let dispatcher = self.dispatcher.clone();
        let timeout = self.executor.default_timeout();
        match self.executor.submit(move || dispatcher.dispatch(&args)).wait(timeout) {
            Ok(result) => Some(result),
            Err(e) => {
                if hook.frequency() == Frequency::Low {
                    tracing::warn!(hook = %hook, error = %e, "Guarded hook dispatch abandoned");
                }
                None
            }
        }
    }
}

fn log_failures(hook: HookName, report: &DispatchReport) {
    for failure in &report.failures {
        tracing::warn!(
            hook = %hook,
            callback = failure.index,
            error = %failure.error,
            "Extension callback failed"
        );
    }
}

impl<R: ExtensionRuntime> Bridge for EventManager<R> {
    fn on_server_started(&self) {
        self.fire(HookArgs::Started {});
    }

    fn on_server_tick(&self) {
        let tick = self.tick_count.fetch_add(1, Ordering::Relaxed) + 1;
        if tick % self.tick_interval == 0 {
            self.fire(HookArgs::Tick { tick });
        }
    }

    fn on_chunk_surface_generate(&self, region: &RegionHandle, chunk: &ChunkHandle) -> bool {
        self.fire(HookArgs::ChunkSurface {
            region: region.clone(),
            chunk: chunk.clone(),
        })
        .is_cancel()
    }

    fn on_chunk_noise_fill(&self, chunk: &ChunkHandle, random: &RandomState) -> Option<NoiseFillFuture> {
        if !self.dispatch.wire_noise_fill {
            return None;
        }

        let handled = self
            .fire(HookArgs::ChunkNoise {
                chunk: chunk.clone(),
                random_state: *random,
            })
            .into_override()
            .is_some();

        handled.then(|| Box::pin(std::future::ready(chunk.clone())) as NoiseFillFuture)
    }

    fn on_chunk_carver_apply(&self, region: &RegionHandle, chunk: &ChunkHandle, seed: i64) -> bool {
        self.fire(HookArgs::ChunkCarver {
            region: region.clone(),
            chunk: chunk.clone(),
            seed,
        })
        .is_cancel()
    }

    fn on_biome_select(&self, x: i32, y: i32, z: i32, climate: &ClimateSample) -> Option<BiomeRef> {
        if !self.dispatch.wire_biome_select {
            return None;
        }
        if !self.dispatcher.has_callbacks(HookName::BiomeSelect) {
            return None;
        }

        self.caches.biome(x, y, z, || {
            self.fire(HookArgs::BiomeSelect {
                x,
                y,
                z,
                climate: *climate,
            })
            .into_override()
            .and_then(|value| value.as_text().map(BiomeRef::new))
        })
    }

    fn on_density_compute(&self, x: i32, y: i32, z: i32, original: f64) -> Option<f64> {
        if !self.dispatcher.has_callbacks(HookName::Density) {
            return None;
        }
        self.caches.density(x, y, z, || {
            self.fire(HookArgs::Density {
                x,
                y,
                z,
                density: original,
            })
            .into_override()
            .and_then(|value| value.as_f64())
        })
    }

    fn on_surface_rule_update(
        &self,
        x: i32,
        y: i32,
        z: i32,
        stone_depth_above: i32,
        stone_depth_below: i32,
        water_height: i32,
    ) {
        self.fire(HookArgs::SurfaceUpdate {
            x,
            y,
            z,
            stone_depth_above,
            stone_depth_below,
            water_height,
        });
    }

    fn on_surface_block_select(&self, x: i32, y: i32, z: i32, surface_depth: i32) -> Option<BlockState> {
        if !self.dispatcher.has_callbacks(HookName::SurfaceBlock) {
            return None;
        }
        self.caches.surface_block(x, y, z, surface_depth, || {
            self.fire(HookArgs::SurfaceBlock {
                x,
                y,
                z,
                surface_depth,
            })
            .into_override()
            .and_then(|value| value.as_text().map(BlockState::new))
        })
    }

    fn custom_dimension_configs(&self) -> Vec<DimensionConfigData> {
        self.dimensions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
