//! Cache Layer
//!
//! Memoizes the override-on-present hooks on the hottest paths (density and
//! surface block, plus biome when its wiring is enabled) so that extension
//! callbacks run once per quantized cell instead of once per sample.
//!
//! Cached values are `Option<T>`: a cell whose callbacks declined to override
//! is cached as `None` and does not re-dispatch either.
//!
//! The caches are told nothing about world changes. They are only correct for
//! callbacks that are deterministic in their quantized coordinates, and every
//! extension reload must clear them ([`HookCaches::clear_cache`]).

mod quantize;
mod stats;
mod store;

pub use quantize::{Quantizer, SurfaceKey, pack};
pub use stats::CacheStats;
pub use store::{CacheOptions, EvictionPolicy, ShardedCache};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use strata_core::{BiomeRef, BlockState};

use crate::config::{CacheConfig, CacheTuning};
use crate::extensions::HookName;

/// Per-noise-id value cache.
pub type NoiseCache = ShardedCache<u64, f64>;

/// Every cache of the hook layer plus its administrative surface.
pub struct HookCaches {
    enabled: AtomicBool,
    density_grid: Quantizer,
    surface_grid: Quantizer,
    biome_grid: Quantizer,
    noise_grid: Quantizer,
    density: ShardedCache<u64, Option<f64>>,
    surface_block: ShardedCache<SurfaceKey, Option<BlockState>>,
    biome: ShardedCache<u64, Option<BiomeRef>>,
    noise: RwLock<HashMap<String, Arc<NoiseCache>>>,
    noise_options: CacheOptions,
}

fn options(name: &str, tuning: &CacheTuning, shards: usize) -> CacheOptions {
    CacheOptions::new(name, tuning.capacity)
        .shards(shards)
        .policy(tuning.policy)
        .ttl(tuning.ttl())
        .log_every(tuning.log_every)
}

fn grid(tuning: &CacheTuning) -> Quantizer {
    Quantizer::new(tuning.grid, tuning.vertical_grid)
}

impl HookCaches {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: AtomicBool::new(config.enabled),
            density_grid: grid(&config.density),
            surface_grid: grid(&config.surface_block),
            biome_grid: grid(&config.biome),
            noise_grid: grid(&config.noise),
            density: ShardedCache::new(options("density", &config.density, config.shards)),
            surface_block: ShardedCache::new(options(
                "surface_block",
                &config.surface_block,
                config.shards,
            )),
            biome: ShardedCache::new(options("biome", &config.biome, config.shards)),
            noise: RwLock::new(HashMap::new()),
            noise_options: options("noise", &config.noise, config.shards),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Hot-path lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// Cached density override, computing it on a miss.
    pub fn density(&self, x: i32, y: i32, z: i32, compute: impl FnOnce() -> Option<f64>) -> Option<f64> {
        if !self.is_enabled() {
            return compute();
        }
        self.density
            .get_or_compute(self.density_grid.key(x, y, z), compute)
    }

    /// Cached surface block override, computing it on a miss.
    pub fn surface_block(
        &self,
        x: i32,
        y: i32,
        z: i32,
        depth: i32,
        compute: impl FnOnce() -> Option<BlockState>,
    ) -> Option<BlockState> {
        if !self.is_enabled() {
            return compute();
        }
        self.surface_block
            .get_or_compute(SurfaceKey::new(&self.surface_grid, x, y, z, depth), compute)
    }

    /// Cached biome override, computing it on a miss.
    pub fn biome(&self, x: i32, y: i32, z: i32, compute: impl FnOnce() -> Option<BiomeRef>) -> Option<BiomeRef> {
        if !self.is_enabled() {
            return compute();
        }
        self.biome.get_or_compute(self.biome_grid.key(x, y, z), compute)
    }

    /// Cache of one named noise, created on first use.
    pub fn noise_cache(&self, noise_id: &str) -> Arc<NoiseCache> {
        if let Some(cache) = self
            .noise
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(noise_id)
        {
            return cache.clone();
        }

        let mut noise = self.noise.write().unwrap_or_else(PoisonError::into_inner);
        noise
            .entry(noise_id.to_string())
            .or_insert_with(|| {
                let mut options = self.noise_options.clone();
                options.name = format!("noise:{}", noise_id);
                Arc::new(ShardedCache::new(options))
            })
            .clone()
    }

    /// Sample a named noise through its cache.
    pub fn sample_noise(&self, noise_id: &str, x: i32, y: i32, z: i32, sample: impl FnOnce() -> f64) -> f64 {
        if !self.is_enabled() {
            return sample();
        }
        self.noise_cache(noise_id)
            .get_or_compute(self.noise_grid.key(x, y, z), sample)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Administration
    // ─────────────────────────────────────────────────────────────────────────

    /// Turn caching on or off. Turning it off also clears every cache.
    pub fn set_cache_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::Relaxed);
        if !enabled {
            self.clear_cache();
        }
        if was != enabled {
            tracing::info!(enabled, "Hook caches {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    /// Clear every cache. Returns the number of entries dropped.
    pub fn clear_cache(&self) -> usize {
        let mut cleared = self.density.clear() + self.surface_block.clear() + self.biome.clear();
        cleared += self
            .noise
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|cache| cache.clear())
            .sum::<usize>();

        tracing::debug!(cleared, "Cleared hook caches");
        cleared
    }

    /// Clear one cache, named by hook identifier or noise id.
    ///
    /// Returns `None` when nothing is cached under that name.
    pub fn clear_cache_scope(&self, scope: &str) -> Option<usize> {
        let cleared = match scope.parse::<HookName>() {
            Ok(HookName::Density) => Some(self.density.clear()),
            Ok(HookName::SurfaceBlock) => Some(self.surface_block.clear()),
            Ok(HookName::BiomeSelect) => Some(self.biome.clear()),
            _ => self
                .noise
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(scope)
                .map(|cache| cache.clear()),
        };

        if let Some(cleared) = cleared {
            tracing::debug!(scope, cleared, "Cleared cache scope");
        }
        cleared
    }

    /// Stats of every cache, hook caches first, then noise caches by id.
    pub fn stats(&self) -> Vec<(String, CacheStats)> {
        let mut stats = vec![
            (HookName::Density.to_string(), self.density.stats()),
            (HookName::SurfaceBlock.to_string(), self.surface_block.stats()),
            (HookName::BiomeSelect.to_string(), self.biome.stats()),
        ];

        let noise = self.noise.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<_> = noise.keys().collect();
        ids.sort();
        for id in ids {
            stats.push((format!("noise:{}", id), noise[id].stats()));
        }
        stats
    }
}
