//! Main SDK Entry Point
//!
//! Ties the dispatcher, caches, executor and event manager together and
//! installs the result as the host's bridge.

use std::sync::Arc;

use strata_core::{Bridge, BridgeSlot};

use crate::api::EventsApi;
use crate::cache::HookCaches;
use crate::config::StrataConfig;
use crate::events::EventManager;
use crate::executor::BoundedExecutor;
use crate::extensions::{Dispatcher, ExtensionRuntime, SharedDispatcher};
use crate::{SdkError, SdkResult};

/// Strata SDK - Main entry point
///
/// # Example
///
/// ```rust
/// use strata_sdk::{Strata, StrataConfig};
/// use strata_sdk::extensions::{NativeCallback, NativeRuntime};
/// use strata_core::{BridgeSlot, HookPoints};
/// use serde_json::json;
///
/// let strata = Strata::new(StrataConfig::default(), NativeRuntime::new()).unwrap();
/// strata.events().on(
///     "worldgen.density",
///     NativeCallback::new(|event| Ok(json!(event["density"].as_f64().unwrap_or_default() * 2.0))),
/// ).unwrap();
///
/// let slot = BridgeSlot::new();
/// strata.install_into(&slot);
/// assert_eq!(HookPoints::new(&slot).resolve_density(10, 64, 10, 1.5), 3.0);
/// ```
pub struct Strata<R: ExtensionRuntime> {
    config: StrataConfig,
    dispatcher: SharedDispatcher<R>,
    caches: Arc<HookCaches>,
    executor: Arc<BoundedExecutor>,
    events: Arc<EventManager<R>>,
    api: EventsApi<R>,
}

impl<R: ExtensionRuntime> Strata<R> {
    /// Create a new SDK instance
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn new(config: StrataConfig, runtime: R) -> SdkResult<Self> {
        config.validate()?;

        let dispatcher = Arc::new(Dispatcher::new(runtime));
        let caches = Arc::new(HookCaches::new(&config.cache));
        let executor = Arc::new(BoundedExecutor::new(config.executor.clone()));
        let events = Arc::new(EventManager::new(
            dispatcher.clone(),
            caches.clone(),
            executor.clone(),
            &config,
        ));
        let api = EventsApi::new(events.clone());

        tracing::info!(
            runtime = dispatcher.runtime().name(),
            cache = config.cache.enabled,
            "Strata SDK initialized"
        );

        Ok(Self {
            config,
            dispatcher,
            caches,
            executor,
            events,
            api,
        })
    }

    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    /// Registration API for extension code.
    pub fn events(&self) -> &EventsApi<R> {
        &self.api
    }

    pub fn event_manager(&self) -> &Arc<EventManager<R>> {
        &self.events
    }

    pub fn dispatcher(&self) -> &SharedDispatcher<R> {
        &self.dispatcher
    }

    pub fn caches(&self) -> &Arc<HookCaches> {
        &self.caches
    }

    pub fn executor(&self) -> &Arc<BoundedExecutor> {
        &self.executor
    }

    /// The event manager as a host bridge.
    pub fn bridge(&self) -> Arc<dyn Bridge> {
        self.events.clone()
    }

    /// Install into the process-wide slot. Replaces any previous bridge.
    pub fn install(&self) {
        self.install_into(strata_core::bridge::global());
    }

    /// Install into a specific slot.
    pub fn install_into(&self, slot: &BridgeSlot) {
        slot.set(self.bridge());
    }

    /// Drop every extension callback and cached result before loading a new
    /// set of extensions. Registered dimensions are kept.
    pub fn reload(&self) -> usize {
        let removed = self.api.cleanup();
        tracing::info!(callbacks = removed, "Extensions unloaded for reload");
        removed
    }

    /// Unregister everything and stop the executor.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Timeout`] when worker threads did not exit within
    /// the configured shutdown timeout.
    pub fn shutdown(&self) -> SdkResult<()> {
        self.api.cleanup();
        if self.executor.shutdown() {
            tracing::info!("Strata SDK shut down");
            Ok(())
        } else {
            Err(SdkError::timeout(self.config.executor.shutdown_timeout_ms))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, DispatchConfig};
    use crate::extensions::{NativeCallback, NativeRuntime};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use strata_core::{ChunkHandle, ChunkPos, DimensionConfigData, HookPoints, RandomState};

    fn doubling(calls: &Arc<AtomicUsize>) -> NativeCallback {
        let calls = calls.clone();
        NativeCallback::new(move |event| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!(event["density"].as_f64().unwrap_or_default() * 2.0))
        })
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = StrataConfig::default();
        config.executor.max_threads = 0;
        let err = Strata::new(config, NativeRuntime::new()).err().unwrap();
        assert!(matches!(err, SdkError::Config(_)));
    }

    #[test]
    fn test_density_end_to_end() {
        let strata = Strata::new(StrataConfig::default(), NativeRuntime::new()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        strata.events().on_density(doubling(&calls));

        let slot = BridgeSlot::new();
        strata.install_into(&slot);
        let points = HookPoints::new(&slot);

        assert_eq!(points.resolve_density(10, 64, 10, 1.5), 3.0);
        assert_eq!(points.resolve_density(10, 64, 10, 1.5), 3.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_registered_after_sampling_takes_effect() {
        let strata = Strata::new(StrataConfig::default(), NativeRuntime::new()).unwrap();
        let slot = BridgeSlot::new();
        strata.install_into(&slot);
        let points = HookPoints::new(&slot);

        assert_eq!(points.resolve_density(10, 64, 10, 1.5), 1.5);

        let calls = Arc::new(AtomicUsize::new(0));
        strata.events().on_density(doubling(&calls));
        assert_eq!(points.resolve_density(10, 64, 10, 1.5), 3.0);
        assert_eq!(points.resolve_density(10, 64, 10, 1.5), 3.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_without_cache_every_sample_dispatches() {
        let config = StrataConfig::default().with_cache(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        });
        let strata = Strata::new(config, NativeRuntime::new()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        strata.events().on_density(doubling(&calls));

        let slot = BridgeSlot::new();
        strata.install_into(&slot);
        let points = HookPoints::new(&slot);
        points.resolve_density(10, 64, 10, 1.5);
        points.resolve_density(10, 64, 10, 1.5);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reload_clears_callbacks_and_cache() {
        let strata = Strata::new(StrataConfig::default(), NativeRuntime::new()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        strata.events().on_density(doubling(&calls));
        strata
            .events()
            .register_dimension(DimensionConfigData::new("strata:deep"))
            .unwrap();

        let slot = BridgeSlot::new();
        strata.install_into(&slot);
        let points = HookPoints::new(&slot);
        assert_eq!(points.resolve_density(0, 0, 0, 1.0), 2.0);

        assert_eq!(strata.reload(), 1);
        assert_eq!(points.resolve_density(0, 0, 0, 1.0), 1.0);
        assert_eq!(strata.bridge().custom_dimension_configs().len(), 1);
    }

    #[test]
    fn test_second_install_wins() {
        let first = Strata::new(StrataConfig::default(), NativeRuntime::new()).unwrap();
        let second = Strata::new(StrataConfig::default(), NativeRuntime::new()).unwrap();
        second.events().on_density(NativeCallback::new(|_| Ok(json!(7.0))));

        let slot = BridgeSlot::new();
        first.install_into(&slot);
        second.install_into(&slot);

        assert_eq!(HookPoints::new(&slot).resolve_density(0, 0, 0, 1.0), 7.0);
    }

    #[test]
    fn test_wired_noise_fill_resolves_to_chunk() {
        let config = StrataConfig::default().with_dispatch(DispatchConfig {
            wire_noise_fill: true,
            ..DispatchConfig::default()
        });
        let strata = Strata::new(config, NativeRuntime::new()).unwrap();
        strata.events().on_noise_fill(NativeCallback::new(|_| Ok(json!(true))));

        let slot = BridgeSlot::new();
        strata.install_into(&slot);
        let chunk = ChunkHandle::new(ChunkPos::new(3, -2), -64, 384);
        let fill = HookPoints::new(&slot)
            .fill_from_noise(&chunk, &RandomState { seed: 1 })
            .unwrap();

        assert_eq!(tokio_test::block_on(fill), chunk);
        assert_eq!(strata.executor().stats().submitted, 1);
    }

    #[test]
    fn test_shutdown() {
        let strata = Strata::new(StrataConfig::default(), NativeRuntime::new()).unwrap();
        strata.events().on_tick(NativeCallback::new(|_| Ok(json!(null))));

        strata.shutdown().unwrap();
        assert!(strata.executor().is_shutdown());
        assert_eq!(strata.events().registered_event_count(), 0);
    }
}
