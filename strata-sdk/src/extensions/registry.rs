//! Callback Registry
//!
//! Maps each hook to the ordered list of callbacks registered against it.
//! Lists are append-only and copy-on-write: a dispatch takes a cheap snapshot
//! (`Arc<[C]>`) under a read lock and runs callbacks without holding it, so a
//! callback may register further callbacks without deadlocking.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::hooks::HookName;

/// Registry of extension callbacks keyed by hook.
pub struct CallbackRegistry<C> {
    callbacks: RwLock<HashMap<HookName, Arc<[C]>>>,
}

impl<C: Clone> CallbackRegistry<C> {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(HashMap::new()),
        }
    }

    /// Append a callback to a hook's list. Duplicates are kept.
    pub fn register(&self, hook: HookName, callback: C) {
        let mut callbacks = self.callbacks.write().unwrap_or_else(PoisonError::into_inner);
        let list = match callbacks.get(&hook) {
            Some(existing) => {
                let mut list = Vec::with_capacity(existing.len() + 1);
                list.extend(existing.iter().cloned());
                list.push(callback);
                list
            }
            None => vec![callback],
        };
        callbacks.insert(hook, list.into());

        tracing::debug!(hook = %hook, "Registered callback");
    }

    /// Snapshot of a hook's callbacks in registration order.
    pub fn snapshot(&self, hook: HookName) -> Option<Arc<[C]>> {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&hook)
            .cloned()
    }

    /// Whether any callback is registered for the hook.
    pub fn has_callbacks(&self, hook: HookName) -> bool {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&hook)
            .is_some_and(|list| !list.is_empty())
    }

    /// Number of callbacks registered for the hook.
    pub fn callback_count(&self, hook: HookName) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&hook)
            .map_or(0, |list| list.len())
    }

    /// Number of hooks with at least one callback.
    pub fn registered_hook_count(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|list| !list.is_empty())
            .count()
    }

    /// Total callbacks across all hooks.
    pub fn total_callbacks(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|list| list.len())
            .sum()
    }

    /// Per-hook callback counts, in [`HookName::ALL`] order.
    pub fn counts(&self) -> Vec<(HookName, usize)> {
        let callbacks = self.callbacks.read().unwrap_or_else(PoisonError::into_inner);
        HookName::ALL
            .into_iter()
            .filter_map(|hook| callbacks.get(&hook).map(|list| (hook, list.len())))
            .collect()
    }

    /// Drop every callback. Safe to call repeatedly.
    pub fn unregister_all(&self) -> usize {
        let mut callbacks = self.callbacks.write().unwrap_or_else(PoisonError::into_inner);
        let removed = callbacks.values().map(|list| list.len()).sum();
        callbacks.clear();
        removed
    }
}

impl<C: Clone> Default for CallbackRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
