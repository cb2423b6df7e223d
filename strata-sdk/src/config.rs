//! SDK Configuration
//!
//! Scalar inputs for the hook layer: tick interval, cache sizes and
//! quantization grids, executor limits and override wiring. They are loaded by
//! an outer component (the CLI reads them from TOML) and treated as immutable
//! until an explicit reload.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::EvictionPolicy;
use crate::extensions::HookName;

/// SDK configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    /// Lifecycle event settings
    pub events: EventsConfig,

    /// Cache layer settings
    pub cache: CacheConfig,

    /// Bounded executor settings
    pub executor: ExecutorConfig,

    /// Dispatch wiring settings
    pub dispatch: DispatchConfig,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            events: EventsConfig::default(),
            cache: CacheConfig::default(),
            executor: ExecutorConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

/// Lifecycle event configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Host ticks between `server.tick` dispatches (default: 20)
    pub tick_interval: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { tick_interval: 20 }
    }
}

/// Tuning for one coordinate cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheTuning {
    /// Maximum number of entries
    pub capacity: usize,

    /// Horizontal quantization grid in blocks (1 = exact)
    pub grid: i32,

    /// Vertical quantization grid in blocks (1 = exact)
    pub vertical_grid: i32,

    /// What happens when the cache is full
    pub policy: EvictionPolicy,

    /// Entry lifetime in milliseconds (None = until evicted)
    #[serde(default)]
    pub ttl_ms: Option<u64>,

    /// Log stats every N accesses (None = never)
    #[serde(default)]
    pub log_every: Option<u64>,
}

impl CacheTuning {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }

    fn validate(&self, name: &str) -> Result<(), ConfigValidationError> {
        if self.capacity == 0 {
            return Err(ConfigValidationError::invalid(
                format!("cache.{}.capacity", name),
                "must be greater than 0",
            ));
        }
        if self.grid <= 0 || self.vertical_grid <= 0 {
            return Err(ConfigValidationError::invalid(
                format!("cache.{}.grid", name),
                "must be greater than 0",
            ));
        }
        if self.ttl_ms == Some(0) {
            return Err(ConfigValidationError::invalid(
                format!("cache.{}.ttl_ms", name),
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Cache layer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable caching of hot hooks (default: true)
    pub enabled: bool,

    /// Lock shards per cache (default: 16)
    pub shards: usize,

    /// Density override cache (default: 50000 entries, grid 10, full clear)
    pub density: CacheTuning,

    /// Surface block cache (default: 20000 entries, grid 16 on x/z, full clear)
    pub surface_block: CacheTuning,

    /// Biome cache, used only when biome wiring is on (default: 4096 entries, grid 4)
    pub biome: CacheTuning,

    /// Per-noise-id caches (default: 10000 entries, exact, full clear)
    pub noise: CacheTuning,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shards: 16,
            density: CacheTuning {
                capacity: 50_000,
                grid: 10,
                vertical_grid: 10,
                policy: EvictionPolicy::FullClear,
                ttl_ms: None,
                log_every: Some(10_000),
            },
            surface_block: CacheTuning {
                capacity: 20_000,
                grid: 16,
                vertical_grid: 1,
                policy: EvictionPolicy::FullClear,
                ttl_ms: None,
                log_every: Some(5_000),
            },
            biome: CacheTuning {
                capacity: 4_096,
                grid: 4,
                vertical_grid: 4,
                policy: EvictionPolicy::EvictOldest,
                ttl_ms: Some(60_000),
                log_every: None,
            },
            noise: CacheTuning {
                capacity: 10_000,
                grid: 1,
                vertical_grid: 1,
                policy: EvictionPolicy::FullClear,
                ttl_ms: None,
                log_every: None,
            },
        }
    }
}

/// Bounded executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Threads kept alive while idle (default: 4)
    pub core_threads: usize,

    /// Upper bound on worker threads (default: 8)
    pub max_threads: usize,

    /// Pending tasks before caller-runs kicks in (default: 1000)
    pub queue_capacity: usize,

    /// Idle time before a non-core thread exits, in milliseconds (default: 60000)
    pub keep_alive_ms: u64,

    /// Deadline applied when the caller supplies none, in milliseconds (default: 50)
    pub default_timeout_ms: u64,

    /// Worker thread name prefix (default: "strata-async")
    pub thread_name_prefix: String,

    /// How long shutdown waits for workers, in milliseconds (default: 5000)
    pub shutdown_timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            core_threads: 4,
            max_threads: 8,
            queue_capacity: 1_000,
            keep_alive_ms: 60_000,
            default_timeout_ms: 50,
            thread_name_prefix: "strata-async".to_string(),
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl ExecutorConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Dispatch wiring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Let biome-select callbacks override the host's biome (default: false)
    pub wire_biome_select: bool,

    /// Let noise-fill callbacks replace the host's fill (default: false)
    pub wire_noise_fill: bool,

    /// Hooks dispatched on the bounded executor under its default deadline
    pub guarded_hooks: Vec<HookName>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            wire_biome_select: false,
            wire_noise_fill: false,
            guarded_hooks: vec![HookName::ChunkNoise],
        }
    }
}

impl StrataConfig {
    /// Set the tick interval
    pub fn with_tick_interval(mut self, tick_interval: u64) -> Self {
        self.events.tick_interval = tick_interval;
        self
    }

    /// Set cache configuration
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set executor configuration
    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// Set dispatch configuration
    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.events.tick_interval == 0 {
            return Err(ConfigValidationError::invalid(
                "events.tick_interval",
                "must be greater than 0",
            ));
        }

        if self.cache.shards == 0 {
            return Err(ConfigValidationError::invalid(
                "cache.shards",
                "must be greater than 0",
            ));
        }
        self.cache.density.validate("density")?;
        self.cache.surface_block.validate("surface_block")?;
        self.cache.biome.validate("biome")?;
        self.cache.noise.validate("noise")?;

        let executor = &self.executor;
        if executor.core_threads == 0 {
            return Err(ConfigValidationError::invalid(
                "executor.core_threads",
                "must be greater than 0",
            ));
        }
        if executor.max_threads < executor.core_threads {
            return Err(ConfigValidationError::invalid(
                "executor.max_threads",
                "must be at least core_threads",
            ));
        }
        if executor.queue_capacity == 0 {
            return Err(ConfigValidationError::invalid(
                "executor.queue_capacity",
                "must be greater than 0",
            ));
        }
        if executor.default_timeout_ms == 0 {
            return Err(ConfigValidationError::invalid(
                "executor.default_timeout_ms",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigValidationError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StrataConfig::default();
        assert_eq!(config.events.tick_interval, 20);
        assert_eq!(config.cache.density.capacity, 50_000);
        assert_eq!(config.cache.density.grid, 10);
        assert_eq!(config.cache.surface_block.capacity, 20_000);
        assert_eq!(config.cache.surface_block.vertical_grid, 1);
        assert_eq!(config.executor.core_threads, 4);
        assert_eq!(config.executor.max_threads, 8);
        assert_eq!(config.executor.queue_capacity, 1_000);
        assert_eq!(config.executor.default_timeout(), Duration::from_millis(50));
        assert!(!config.dispatch.wire_biome_select);
        assert_eq!(config.dispatch.guarded_hooks, vec![HookName::ChunkNoise]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = StrataConfig::default()
            .with_tick_interval(5)
            .with_dispatch(DispatchConfig {
                wire_biome_select: true,
                ..Default::default()
            })
            .with_executor(ExecutorConfig {
                max_threads: 2,
                core_threads: 1,
                ..Default::default()
            });

        assert_eq!(config.events.tick_interval, 5);
        assert_eq!(config.executor.max_threads, 2);
        assert!(config.dispatch.wire_biome_select);
        assert!(!config.dispatch.wire_noise_fill);
    }

    #[test]
    fn test_config_validation() {
        let mut config = StrataConfig::default();
        config.events.tick_interval = 0;
        assert!(config.validate().is_err());

        let mut config = StrataConfig::default();
        config.executor.max_threads = 2;
        assert!(config.validate().is_err());

        let mut config = StrataConfig::default();
        config.cache.density.grid = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.density.grid"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: StrataConfig = toml::from_str(
            r#"
            [events]
            tick_interval = 40

            [dispatch]
            guarded_hooks = ["server.tick", "worldgen.chunk.noise"]
            "#,
        )
        .unwrap();

        assert_eq!(config.events.tick_interval, 40);
        assert_eq!(config.cache.density.capacity, 50_000);
        assert_eq!(
            config.dispatch.guarded_hooks,
            vec![HookName::ServerTick, HookName::ChunkNoise]
        );
    }
}
