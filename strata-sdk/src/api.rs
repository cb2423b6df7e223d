//! Events API
//!
//! The registration surface handed to extension code: `on(name, callback)`
//! plus a named wrapper per hook, dimension registration, and `cleanup`.

use std::sync::Arc;

use strata_core::DimensionConfigData;

use crate::SdkResult;
use crate::cache::HookCaches;
use crate::events::EventManager;
use crate::extensions::{ExtensionRuntime, HookName, SharedDispatcher};

/// Extension-facing registration API.
pub struct EventsApi<R: ExtensionRuntime> {
    dispatcher: SharedDispatcher<R>,
    caches: Arc<HookCaches>,
    events: Arc<EventManager<R>>,
}

impl<R: ExtensionRuntime> Clone for EventsApi<R> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            caches: self.caches.clone(),
            events: self.events.clone(),
        }
    }
}

impl<R: ExtensionRuntime> EventsApi<R> {
    pub fn new(events: Arc<EventManager<R>>) -> Self {
        Self {
            dispatcher: events.dispatcher().clone(),
            caches: events.caches().clone(),
            events,
        }
    }

    /// Register a callback by hook identifier, e.g. `"worldgen.density"`.
    ///
    /// Unknown identifiers are rejected with [`SdkError::UnknownHook`](crate::SdkError::UnknownHook).
    pub fn on(&self, hook: &str, callback: R::Callback) -> SdkResult<()> {
        self.on_hook(hook.parse()?, callback);
        Ok(())
    }

    /// Register a callback for a hook.
    ///
    /// Registering on a cached hook clears that hook's cache so earlier
    /// samples are recomputed with the new callback list.
    pub fn on_hook(&self, hook: HookName, callback: R::Callback) {
        self.dispatcher.register(hook, callback);
        if hook.is_cached() {
            self.caches.clear_cache_scope(hook.as_str());
        }
    }

    pub fn runtime(&self) -> &R {
        self.dispatcher.runtime()
    }

    pub fn on_started(&self, callback: R::Callback) {
        self.on_hook(HookName::ServerStarted, callback);
    }

    pub fn on_tick(&self, callback: R::Callback) {
        self.on_hook(HookName::ServerTick, callback);
    }

    /// Return `true` to skip the host's surface build for the chunk.
    pub fn on_surface_build(&self, callback: R::Callback) {
        self.on_hook(HookName::ChunkSurface, callback);
    }

    pub fn on_noise_fill(&self, callback: R::Callback) {
        self.on_hook(HookName::ChunkNoise, callback);
    }

    /// Return `true` to skip the host's carvers for the chunk.
    pub fn on_carver(&self, callback: R::Callback) {
        self.on_hook(HookName::ChunkCarver, callback);
    }

    /// Return a biome id to override the host's selection.
    pub fn on_biome_select(&self, callback: R::Callback) {
        self.on_hook(HookName::BiomeSelect, callback);
    }

    /// Return a number to override the density sample.
    pub fn on_density(&self, callback: R::Callback) {
        self.on_hook(HookName::Density, callback);
    }

    pub fn on_surface_update(&self, callback: R::Callback) {
        self.on_hook(HookName::SurfaceUpdate, callback);
    }

    /// Return a block id to override the surface block.
    pub fn on_surface_block(&self, callback: R::Callback) {
        self.on_hook(HookName::SurfaceBlock, callback);
    }

    pub fn register_dimension(&self, config: DimensionConfigData) -> SdkResult<()> {
        self.events.register_dimension(config)
    }

    pub fn callback_count(&self, hook: &str) -> SdkResult<usize> {
        Ok(self.dispatcher.registry().callback_count(hook.parse()?))
    }

    /// Number of hooks with at least one callback.
    pub fn registered_event_count(&self) -> usize {
        self.dispatcher.registry().registered_hook_count()
    }

    /// Drop every callback and clear every cache. Safe to call repeatedly.
    ///
    /// Returns the number of callbacks removed.
    pub fn cleanup(&self) -> usize {
        let removed = self.dispatcher.registry().unregister_all();
        let cleared = self.caches.clear_cache();
        if removed > 0 {
            tracing::info!(callbacks = removed, cache_entries = cleared, "Unregistered all extension callbacks");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrataConfig;
    use crate::executor::BoundedExecutor;
    use crate::extensions::{Dispatcher, NativeCallback, NativeRuntime};
    use serde_json::json;
    use strata_core::Bridge;

    fn api() -> EventsApi<NativeRuntime> {
        let config = StrataConfig::default();
        let events = EventManager::new(
            Arc::new(Dispatcher::new(NativeRuntime::new())),
            Arc::new(HookCaches::new(&config.cache)),
            Arc::new(BoundedExecutor::new(config.executor.clone())),
            &config,
        );
        EventsApi::new(Arc::new(events))
    }

    fn constant(value: f64) -> NativeCallback {
        NativeCallback::new(move |_| Ok(json!(value)))
    }

    #[test]
    fn test_on_by_identifier() {
        let api = api();
        api.on("worldgen.density", constant(1.0)).unwrap();
        api.on("worldgen.density", constant(2.0)).unwrap();

        assert_eq!(api.callback_count("worldgen.density").unwrap(), 2);
        assert_eq!(api.registered_event_count(), 1);
    }

    #[test]
    fn test_unknown_identifier_is_rejected() {
        let api = api();
        let err = api.on("worldgen.densty", constant(1.0)).unwrap_err();
        assert!(err.is_unknown_hook());
        assert_eq!(api.registered_event_count(), 0);
        assert!(api.callback_count("nope").is_err());
    }

    #[test]
    fn test_named_wrappers() {
        let api = api();
        let noop = NativeCallback::new(|_| Ok(serde_json::Value::Null));
        api.on_started(noop.clone());
        api.on_tick(noop.clone());
        api.on_surface_build(noop.clone());
        api.on_noise_fill(noop.clone());
        api.on_carver(noop.clone());
        api.on_biome_select(noop.clone());
        api.on_density(noop.clone());
        api.on_surface_update(noop.clone());
        api.on_surface_block(noop);

        assert_eq!(api.registered_event_count(), HookName::ALL.len());
        for hook in HookName::ALL {
            assert_eq!(api.callback_count(hook.as_str()).unwrap(), 1);
        }
    }

    #[test]
    fn test_cleanup_is_idempotent_and_clears_caches() {
        let api = api();
        api.on_density(constant(9.0));
        assert_eq!(api.events.on_density_compute(0, 0, 0, 1.0), Some(9.0));
        assert_eq!(api.caches.stats()[0].1.size, 1);

        assert_eq!(api.cleanup(), 1);
        assert_eq!(api.cleanup(), 0);
        assert_eq!(api.registered_event_count(), 0);
        assert_eq!(api.caches.stats()[0].1.size, 0);

        // No stale override after cleanup.
        assert_eq!(api.events.on_density_compute(0, 0, 0, 1.0), None);
    }

    #[test]
    fn test_unregistered_hooks_bypass_the_cache() {
        let api = api();
        assert_eq!(api.events.on_density_compute(10, 64, 10, 1.5), None);
        assert_eq!(api.events.on_surface_block_select(0, 62, 0, 1), None);

        let stats = api.caches.stats();
        assert_eq!((stats[0].1.size, stats[0].1.misses), (0, 0));
        assert_eq!((stats[1].1.size, stats[1].1.misses), (0, 0));
    }

    #[test]
    fn test_registration_invalidates_cached_samples() {
        let api = api();
        api.on_density(NativeCallback::new(|_| Ok(serde_json::Value::Null)));
        assert_eq!(api.events.on_density_compute(10, 64, 10, 1.5), None);
        assert_eq!(api.caches.stats()[0].1.size, 1);

        api.on_density(NativeCallback::new(|event| {
            Ok(json!(event["density"].as_f64().unwrap_or_default() * 2.0))
        }));
        assert_eq!(api.caches.stats()[0].1.size, 0);
        assert_eq!(api.events.on_density_compute(10, 64, 10, 1.5), Some(3.0));
    }

    #[test]
    fn test_register_dimension_reaches_bridge() {
        let api = api();
        api.register_dimension(DimensionConfigData::new("strata:sky")).unwrap();
        assert_eq!(api.events.custom_dimension_configs().len(), 1);
    }
}
