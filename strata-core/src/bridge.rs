//! Bridge contract and the process-wide bridge slot.
//!
//! Host-patched code depends only on the [`Bridge`] trait and on the slot it is
//! installed into. The extension side implements the trait once and installs it
//! during startup with [`set_bridge`]; every hook point then reads the slot and
//! treats an empty slot as "no extensions installed".
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata_core::bridge::{self, Bridge};
//!
//! fn install(bridge: Arc<dyn Bridge>) {
//!     bridge::set_bridge(bridge);
//!     assert!(bridge::get_bridge().is_some());
//! }
//! ```

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use crate::dimension::DimensionConfigData;
use crate::types::{BiomeRef, BlockState, ChunkHandle, ClimateSample, RandomState, RegionHandle};

/// Future-valued override for noise filling; resolves to the filled chunk.
pub type NoiseFillFuture = Pin<Box<dyn Future<Output = ChunkHandle> + Send + 'static>>;

// ─────────────────────────────────────────────────────────────────────────────
// Bridge Contract
// ─────────────────────────────────────────────────────────────────────────────

/// Operations host-patched code may call, one per hook.
///
/// Implementations must not panic or block indefinitely; hook points still
/// isolate panics, but a panicking bridge loses its effect for that call.
pub trait Bridge: Send + Sync {
    /// Host finished starting. Notify-only.
    fn on_server_started(&self);

    /// One host tick elapsed. Notify-only.
    fn on_server_tick(&self);

    /// `true` if an extension painted the surface and the host must skip its own.
    fn on_chunk_surface_generate(&self, region: &RegionHandle, chunk: &ChunkHandle) -> bool;

    /// A present future replaces the host's noise fill for this chunk.
    fn on_chunk_noise_fill(
        &self,
        chunk: &ChunkHandle,
        random: &RandomState,
    ) -> Option<NoiseFillFuture>;

    /// `true` if an extension carved the chunk and the host must skip its carvers.
    fn on_chunk_carver_apply(&self, region: &RegionHandle, chunk: &ChunkHandle, seed: i64) -> bool;

    /// A present biome replaces the one the host selected.
    fn on_biome_select(&self, x: i32, y: i32, z: i32, climate: &ClimateSample) -> Option<BiomeRef>;

    /// A present value replaces the density at this coordinate.
    fn on_density_compute(&self, x: i32, y: i32, z: i32, original: f64) -> Option<f64>;

    /// A surface rule was evaluated. Notify-only.
    fn on_surface_rule_update(
        &self,
        x: i32,
        y: i32,
        z: i32,
        stone_depth_above: i32,
        stone_depth_below: i32,
        water_height: i32,
    );

    /// A present block replaces the surface block the host would place.
    fn on_surface_block_select(&self, x: i32, y: i32, z: i32, surface_depth: i32) -> Option<BlockState>;

    /// Dimensions the host should create at world load.
    fn custom_dimension_configs(&self) -> Vec<DimensionConfigData> {
        Vec::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bridge Slot
// ─────────────────────────────────────────────────────────────────────────────

/// Source of slot versions. Unique across every slot in the process, so a
/// per-thread snapshot can never match a different slot at a reused address.
static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// Per-thread snapshots kept before the oldest is dropped.
const LOCAL_SNAPSHOTS: usize = 8;

struct LocalBridge {
    slot: usize,
    version: u64,
    bridge: Option<Arc<dyn Bridge>>,
}

thread_local! {
    static LOCAL_BRIDGES: RefCell<Vec<LocalBridge>> = const { RefCell::new(Vec::new()) };
}

/// Single-slot holder for the active bridge.
///
/// Written during startup, read on every hook invocation afterwards. A second
/// `set` replaces the first (last write wins).
///
/// Hook reads go through [`with`](Self::with): each thread keeps its own
/// snapshot of the bridge and only revisits the lock when the slot's version
/// changes, so steady-state reads write no shared memory. A thread keeps the
/// bridge it last saw alive until its next read of the slot.
pub struct BridgeSlot {
    inner: RwLock<Option<Arc<dyn Bridge>>>,
    /// 0 until the first write.
    version: AtomicU64,
}

impl BridgeSlot {
    /// Create an empty slot.
    pub const fn new() -> Self {
        Self {
            inner: RwLock::new(None),
            version: AtomicU64::new(0),
        }
    }

    /// Install a bridge, returning the one it replaced.
    pub fn set(&self, bridge: Arc<dyn Bridge>) -> Option<Arc<dyn Bridge>> {
        let mut slot = self.write();
        let previous = slot.replace(bridge);
        self.bump();
        if previous.is_some() {
            tracing::warn!("Bridge replaced; set_bridge should only run once at startup");
        } else {
            tracing::debug!("Bridge installed");
        }
        previous
    }

    /// Current bridge, if one is installed.
    pub fn get(&self) -> Option<Arc<dyn Bridge>> {
        self.load().1
    }

    /// Run `f` against the installed bridge, or return `None` when the slot
    /// is empty.
    pub fn with<T>(&self, f: impl FnOnce(&dyn Bridge) -> T) -> Option<T> {
        let version = self.version.load(Ordering::Acquire);
        if version == 0 {
            return None;
        }
        let key = self as *const Self as usize;

        LOCAL_BRIDGES.with(|local| {
            // Reads nested inside a refresh fall through to the lock.
            if let Ok(entries) = local.try_borrow()
                && let Some(entry) = entries.iter().find(|e| e.slot == key && e.version == version)
            {
                return match entry.bridge.as_deref() {
                    Some(bridge) => Some(f(bridge)),
                    None => None,
                };
            }

            let (version, bridge) = self.load();
            if let Ok(mut entries) = local.try_borrow_mut() {
                entries.retain(|e| e.slot != key);
                if entries.len() >= LOCAL_SNAPSHOTS {
                    entries.remove(0);
                }
                entries.push(LocalBridge {
                    slot: key,
                    version,
                    bridge: bridge.clone(),
                });
            }
            match bridge.as_deref() {
                Some(bridge) => Some(f(bridge)),
                None => None,
            }
        })
    }

    /// Remove the installed bridge.
    pub fn clear(&self) -> Option<Arc<dyn Bridge>> {
        let mut slot = self.write();
        let previous = slot.take();
        self.bump();
        previous
    }

    pub fn is_installed(&self) -> bool {
        self.load().1.is_some()
    }

    /// Version and bridge, read together under the lock.
    fn load(&self) -> (u64, Option<Arc<dyn Bridge>>) {
        let slot = self.inner.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Bridge slot lock poisoned; using last written value");
            poisoned.into_inner()
        });
        (self.version.load(Ordering::Acquire), slot.clone())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Arc<dyn Bridge>>> {
        self.inner.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Bridge slot lock poisoned; using last written value");
            poisoned.into_inner()
        })
    }

    /// Publish a new version. Called with the write lock held.
    fn bump(&self) {
        self.version
            .store(NEXT_VERSION.fetch_add(1, Ordering::Relaxed), Ordering::Release);
    }
}

impl Default for BridgeSlot {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_BRIDGE: BridgeSlot = BridgeSlot::new();

/// The process-wide slot used by host-patched code.
pub fn global() -> &'static BridgeSlot {
    &GLOBAL_BRIDGE
}

/// Install the process-wide bridge. Startup only.
pub fn set_bridge(bridge: Arc<dyn Bridge>) -> Option<Arc<dyn Bridge>> {
    GLOBAL_BRIDGE.set(bridge)
}

/// The process-wide bridge, or `None` when no extensions are installed.
pub fn get_bridge() -> Option<Arc<dyn Bridge>> {
    GLOBAL_BRIDGE.get()
}

/// Remove the process-wide bridge (host shutdown).
pub fn clear_bridge() -> Option<Arc<dyn Bridge>> {
    GLOBAL_BRIDGE.clear()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Bridge with fixed answers that counts every call.
    #[derive(Default)]
    pub(crate) struct StubBridge {
        pub calls: AtomicUsize,
        pub cancel: bool,
        pub density: Option<f64>,
        pub block: Option<BlockState>,
        pub biome: Option<BiomeRef>,
        pub panic_on_density: bool,
        pub dimensions: Vec<DimensionConfigData>,
    }

    impl StubBridge {
        pub fn with_dimensions(dimensions: Vec<DimensionConfigData>) -> Self {
            Self {
                dimensions,
                ..Default::default()
            }
        }

        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Bridge for StubBridge {
        fn on_server_started(&self) {
            self.hit();
        }

        fn on_server_tick(&self) {
            self.hit();
        }

        fn on_chunk_surface_generate(&self, _: &RegionHandle, _: &ChunkHandle) -> bool {
            self.hit();
            self.cancel
        }

        fn on_chunk_noise_fill(&self, chunk: &ChunkHandle, _: &RandomState) -> Option<NoiseFillFuture> {
            self.hit();
            let chunk = chunk.clone();
            self.cancel
                .then(|| Box::pin(std::future::ready(chunk)) as NoiseFillFuture)
        }

        fn on_chunk_carver_apply(&self, _: &RegionHandle, _: &ChunkHandle, _: i64) -> bool {
            self.hit();
            if self.panic_on_density {
                panic!("carver exploded");
            }
            self.cancel
        }

        fn on_biome_select(&self, _: i32, _: i32, _: i32, _: &ClimateSample) -> Option<BiomeRef> {
            self.hit();
            self.biome.clone()
        }

        fn on_density_compute(&self, _: i32, _: i32, _: i32, _: f64) -> Option<f64> {
            self.hit();
            if self.panic_on_density {
                panic!("density exploded");
            }
            self.density
        }

        fn on_surface_rule_update(&self, _: i32, _: i32, _: i32, _: i32, _: i32, _: i32) {
            self.hit();
        }

        fn on_surface_block_select(&self, _: i32, _: i32, _: i32, _: i32) -> Option<BlockState> {
            self.hit();
            self.block.clone()
        }

        fn custom_dimension_configs(&self) -> Vec<DimensionConfigData> {
            self.dimensions.clone()
        }
    }

    #[test]
    fn test_slot_starts_empty() {
        let slot = BridgeSlot::new();
        assert!(slot.get().is_none());
        assert!(!slot.is_installed());
    }

    #[test]
    fn test_slot_last_write_wins() {
        let slot = BridgeSlot::new();
        let first: Arc<dyn Bridge> = Arc::new(StubBridge {
            density: Some(1.0),
            ..Default::default()
        });
        let second: Arc<dyn Bridge> = Arc::new(StubBridge {
            density: Some(2.0),
            ..Default::default()
        });

        assert!(slot.set(first).is_none());
        assert!(slot.set(second).is_some());

        let active = slot.get().unwrap();
        assert_eq!(active.on_density_compute(0, 0, 0, 0.0), Some(2.0));

        assert!(slot.clear().is_some());
        assert!(slot.get().is_none());
    }

    #[test]
    fn test_with_follows_replacement() {
        let slot = BridgeSlot::new();
        let density = |slot: &BridgeSlot| slot.with(|b| b.on_density_compute(0, 0, 0, 0.0));
        assert_eq!(density(&slot), None);

        slot.set(Arc::new(StubBridge {
            density: Some(1.0),
            ..Default::default()
        }));
        assert_eq!(density(&slot), Some(Some(1.0)));

        slot.set(Arc::new(StubBridge {
            density: Some(2.0),
            ..Default::default()
        }));
        assert_eq!(density(&slot), Some(Some(2.0)));

        slot.clear();
        assert_eq!(density(&slot), None);
    }

    #[test]
    fn test_steady_reads_leave_refcount_alone() {
        let slot = BridgeSlot::new();
        let bridge = Arc::new(StubBridge::default());
        slot.set(bridge.clone());

        slot.with(|b| b.on_server_tick());
        let settled = Arc::strong_count(&bridge);
        for _ in 0..100 {
            slot.with(|b| b.on_server_tick());
        }
        assert_eq!(Arc::strong_count(&bridge), settled);
        assert_eq!(bridge.calls.load(Ordering::SeqCst), 101);
    }

    #[test]
    fn test_nested_reads() {
        let slot = BridgeSlot::new();
        slot.set(Arc::new(StubBridge::default()));

        let inner = slot.with(|_| slot.with(|b| b.on_density_compute(0, 0, 0, 0.0)));
        assert_eq!(inner, Some(Some(None)));
    }

    #[test]
    fn test_fresh_slot_ignores_stale_snapshots() {
        for _ in 0..4 {
            let slot = Box::new(BridgeSlot::new());
            assert!(slot.with(|_| ()).is_none());
            slot.set(Arc::new(StubBridge::default()));
            assert!(slot.with(|_| ()).is_some());
        }
    }

    #[test]
    fn test_default_dimension_configs_empty() {
        struct Silent;
        impl Bridge for Silent {
            fn on_server_started(&self) {}
            fn on_server_tick(&self) {}
            fn on_chunk_surface_generate(&self, _: &RegionHandle, _: &ChunkHandle) -> bool {
                false
            }
            fn on_chunk_noise_fill(&self, _: &ChunkHandle, _: &RandomState) -> Option<NoiseFillFuture> {
                None
            }
            fn on_chunk_carver_apply(&self, _: &RegionHandle, _: &ChunkHandle, _: i64) -> bool {
                false
            }
            fn on_biome_select(&self, _: i32, _: i32, _: i32, _: &ClimateSample) -> Option<BiomeRef> {
                None
            }
            fn on_density_compute(&self, _: i32, _: i32, _: i32, _: f64) -> Option<f64> {
                None
            }
            fn on_surface_rule_update(&self, _: i32, _: i32, _: i32, _: i32, _: i32, _: i32) {}
            fn on_surface_block_select(&self, _: i32, _: i32, _: i32, _: i32) -> Option<BlockState> {
                None
            }
        }

        assert!(Silent.custom_dimension_configs().is_empty());
    }
}
