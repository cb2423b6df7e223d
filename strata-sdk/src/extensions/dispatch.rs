//! Dispatcher
//!
//! Runs every callback registered for a hook and folds their results with the
//! hook's policy:
//!
//! - cancel-on-true: the verdict is `Cancel` if **any** callback returned `true`
//! - override-on-present: the **first** present value in registration order wins
//! - notify-only: results are ignored
//!
//! Every callback runs on every dispatch; there is no short-circuit, so all
//! extensions observe the event. Failures are isolated per callback and
//! collected in the [`DispatchReport`] for the caller to log or drop.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use strata_core::error::panic_message;

use super::hooks::{HookArgs, HookName, HookPolicy, ReturnValue, Verdict};
use super::registry::CallbackRegistry;
use super::runtime::{ExtensionRuntime, RuntimeError};

/// A callback that failed during a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackFailure {
    /// Position of the callback in registration order.
    pub index: usize,
    pub error: RuntimeError,
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DispatchReport {
    pub verdict: Verdict,
    /// Callbacks invoked (0 when the hook has none).
    pub invoked: usize,
    pub failures: Vec<CallbackFailure>,
}

impl DispatchReport {
    pub fn is_empty(&self) -> bool {
        self.invoked == 0
    }
}

/// Dispatch counters snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Dispatches that had at least one callback.
    pub dispatches: u64,
    /// Dispatches skipped because the hook had no callbacks.
    pub skipped: u64,
    pub callbacks_invoked: u64,
    pub callback_failures: u64,
    /// Dispatches abandoned because no context could be created or marshaled.
    pub dispatch_failures: u64,
}

#[derive(Default)]
struct DispatchCounters {
    dispatches: AtomicU64,
    skipped: AtomicU64,
    callbacks_invoked: AtomicU64,
    callback_failures: AtomicU64,
    dispatch_failures: AtomicU64,
}

/// Invokes registered callbacks through an extension runtime.
pub struct Dispatcher<R: ExtensionRuntime> {
    runtime: R,
    registry: CallbackRegistry<R::Callback>,
    counters: DispatchCounters,
}

impl<R: ExtensionRuntime> Dispatcher<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            registry: CallbackRegistry::new(),
            counters: DispatchCounters::default(),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn registry(&self) -> &CallbackRegistry<R::Callback> {
        &self.registry
    }

    /// Append a callback to a hook.
    pub fn register(&self, hook: HookName, callback: R::Callback) {
        self.registry.register(hook, callback);
    }

    pub fn has_callbacks(&self, hook: HookName) -> bool {
        self.registry.has_callbacks(hook)
    }

    /// Dispatch one hook occurrence.
    ///
    /// Returns an empty report without touching the runtime when the hook has
    /// no callbacks. `Err` means the dispatch as a whole could not run (no
    /// context, or the arguments could not be marshaled); callers treat it as
    /// "no result".
    pub fn dispatch(&self, args: &HookArgs) -> Result<DispatchReport, RuntimeError> {
        let hook = args.hook();
        let callbacks = match self.registry.snapshot(hook) {
            Some(list) if !list.is_empty() => list,
            _ => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                return Ok(DispatchReport::default());
            }
        };
        self.counters.dispatches.fetch_add(1, Ordering::Relaxed);

        let (mut ctx, event) = match self.prepare(args) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.counters.dispatch_failures.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        let policy = hook.policy();
        let mut report = DispatchReport::default();

        for (index, callback) in callbacks.iter().enumerate() {
            report.invoked += 1;
            match self.invoke(hook, &mut ctx, callback, &event) {
                Ok(value) => fold(policy, &mut report.verdict, value),
                Err(error) => report.failures.push(CallbackFailure { index, error }),
            }
        }

        self.counters
            .callbacks_invoked
            .fetch_add(report.invoked as u64, Ordering::Relaxed);
        if !report.failures.is_empty() {
            self.counters
                .callback_failures
                .fetch_add(report.failures.len() as u64, Ordering::Relaxed);
        }

        Ok(report)
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            dispatches: self.counters.dispatches.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            callbacks_invoked: self.counters.callbacks_invoked.load(Ordering::Relaxed),
            callback_failures: self.counters.callback_failures.load(Ordering::Relaxed),
            dispatch_failures: self.counters.dispatch_failures.load(Ordering::Relaxed),
        }
    }

    fn prepare(&self, args: &HookArgs) -> Result<(R::Context, R::Value), RuntimeError> {
        let mut ctx = self.runtime.enter()?;
        let event = self.runtime.marshal(&mut ctx, args)?;
        Ok((ctx, event))
    }

    fn invoke(
        &self,
        hook: HookName,
        ctx: &mut R::Context,
        callback: &R::Callback,
        event: &R::Value,
    ) -> Result<ReturnValue, RuntimeError> {
        let raw = panic::catch_unwind(AssertUnwindSafe(|| self.runtime.call(ctx, callback, event)))
            .unwrap_or_else(|payload| Err(RuntimeError::Panic(panic_message(payload.as_ref()))))?;

        let value = self.runtime.unmarshal(ctx, raw)?;
        if !value.conforms_to(hook) {
            return Err(RuntimeError::Marshal(format!(
                "{} callbacks cannot return {:?}",
                hook, value
            )));
        }
        Ok(value)
    }
}

/// Fold one callback result into the running verdict.
fn fold(policy: HookPolicy, verdict: &mut Verdict, value: ReturnValue) {
    match policy {
        HookPolicy::CancelOnTrue => {
            if value == ReturnValue::Bool(true) {
                *verdict = Verdict::Cancel;
            }
        }
        HookPolicy::OverrideOnPresent => {
            let present = !matches!(value, ReturnValue::Absent | ReturnValue::Bool(false));
            if present && *verdict == Verdict::Default {
                *verdict = Verdict::Override(value);
            }
        }
        HookPolicy::NotifyOnly => {}
    }
}

/// Shared handle to a dispatcher.
pub type SharedDispatcher<R> = Arc<Dispatcher<R>>;
