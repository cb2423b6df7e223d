//! Extension System
//!
//! Callback registration and dispatch for world-generation hooks.
//!
//! - [`hooks`]: hook names, argument shapes, return values and verdicts
//! - [`registry`]: ordered, append-only callback lists per hook
//! - [`runtime`]: the [`ExtensionRuntime`] abstraction and the native runtime
//! - [`dispatch`]: policy-aware dispatch with per-callback failure isolation
//! - [`packs`]: script pack manifests and discovery
//! - `script`: the rhai runtime (feature `scripting`)
//!
//! # Example
//!
//! ```rust
//! use strata_sdk::extensions::{Dispatcher, HookArgs, HookName, NativeCallback, NativeRuntime, Verdict, ReturnValue};
//! use serde_json::json;
//!
//! let dispatcher = Dispatcher::new(NativeRuntime::new());
//! dispatcher.register(
//!     HookName::Density,
//!     NativeCallback::new(|event| Ok(json!(event["density"].as_f64().unwrap_or_default() * 2.0))),
//! );
//!
//! let report = dispatcher
//!     .dispatch(&HookArgs::Density { x: 10, y: 64, z: 10, density: 1.5 })
//!     .unwrap();
//! assert_eq!(report.verdict, Verdict::Override(ReturnValue::Number(3.0)));
//! ```

pub mod dispatch;
pub mod hooks;
pub mod packs;
pub mod registry;
pub mod runtime;

#[cfg(feature = "scripting")]
pub mod script;

pub use dispatch::{CallbackFailure, DispatchReport, DispatchStats, Dispatcher, SharedDispatcher};
pub use hooks::{Frequency, HookArgs, HookName, HookPolicy, ReturnValue, Verdict};
pub use packs::{PackManifest, ScriptPack, discover_packs};
pub use registry::CallbackRegistry;
pub use runtime::{ExtensionRuntime, NativeCallback, NativeContext, NativeRuntime, RuntimeError, json_to_return};

#[cfg(feature = "scripting")]
pub use script::{PackLoadSummary, ScriptCallback, ScriptContext, ScriptRuntime};
