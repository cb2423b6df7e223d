//! Strata SDK - Extension side of the world-generation hooks
//!
//! Host-patched code talks to [`strata_core`]; this crate supplies the
//! [`strata_core::Bridge`] it talks to.
//!
//! # Modules
//!
//! - **extensions** - hook catalogue, callback registry, runtimes and dispatcher
//! - **events** - the [`EventManager`] bridge implementation and failure policy
//! - **api** - [`EventsApi`], the registration surface handed to extensions
//! - **cache** - quantized coordinate caches for the hot override hooks
//! - **executor** - bounded worker pool with deadlines and caller-runs
//! - **config** - [`StrataConfig`] and its validation
//!
//! # Example
//!
//! ```rust
//! use strata_sdk::{Strata, StrataConfig};
//! use strata_sdk::extensions::{NativeCallback, NativeRuntime};
//! use serde_json::json;
//!
//! let strata = Strata::new(StrataConfig::default(), NativeRuntime::new()).unwrap();
//! strata.events().on_carver(NativeCallback::new(|event| {
//!     // Skip carvers in the spawn chunk.
//!     Ok(json!(event["chunk"]["pos"]["x"] == 0 && event["chunk"]["pos"]["z"] == 0))
//! }));
//! strata.install();
//! ```
//!
//! Long-running work can be bounded with the executor directly:
//!
//! ```rust
//! use std::time::Duration;
//! use strata_sdk::config::ExecutorConfig;
//! use strata_sdk::executor::BoundedExecutor;
//!
//! let executor = BoundedExecutor::new(ExecutorConfig::default());
//! let value = executor.run_with_timeout(|| 21 * 2, Duration::from_millis(50), 0);
//! assert_eq!(value, 42);
//! ```

/// Host-facing contract
pub use strata_core;

pub mod api;
pub mod cache;
pub mod config;
pub mod events;
pub mod executor;
pub mod extensions;

mod error;
mod sdk;

// Re-export main SDK types
pub use api::EventsApi;
pub use cache::HookCaches;
pub use config::StrataConfig;
pub use error::{SdkError, SdkResult};
pub use events::EventManager;
pub use executor::BoundedExecutor;
pub use sdk::Strata;
