//! Extension Runtime Abstraction
//!
//! The dispatcher treats the extension language as an opaque capability:
//! open an evaluation context, turn native arguments into runtime values,
//! call a callback, and turn its result back into a [`ReturnValue`].
//!
//! Contexts are created on the dispatching thread and dropped at the end of
//! the dispatch; they are never shared across threads, so `Context` carries
//! no `Send` bound.
//!
//! # Example
//!
//! ```rust
//! use strata_sdk::extensions::{NativeCallback, NativeRuntime};
//! use serde_json::json;
//!
//! let double = NativeCallback::new(|event| {
//!     let density = event["density"].as_f64().unwrap_or_default();
//!     Ok(json!(density * 2.0))
//! });
//! # let _ = (NativeRuntime::new(), double);
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::hooks::{HookArgs, ReturnValue};

/// Errors raised by an extension runtime.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// No evaluation context could be created.
    #[error("runtime unavailable: {0}")]
    Unavailable(String),

    /// A native value could not be converted, in either direction.
    #[error("marshaling failed: {0}")]
    Marshal(String),

    /// The callback raised an error.
    #[error("callback failed: {0}")]
    Callback(String),

    /// The callback panicked.
    #[error("callback panicked: {0}")]
    Panic(String),
}

/// An extension language the dispatcher can drive.
pub trait ExtensionRuntime: Send + Sync + 'static {
    /// Value space of the runtime.
    type Value;
    /// A registered callable.
    type Callback: Clone + Send + Sync + 'static;
    /// Per-dispatch evaluation context.
    type Context;

    /// Short name for logs.
    fn name(&self) -> &str;

    /// Open a fresh evaluation context on the current thread.
    fn enter(&self) -> Result<Self::Context, RuntimeError>;

    /// Convert native hook arguments into the event value callbacks receive.
    fn marshal(&self, ctx: &mut Self::Context, args: &HookArgs) -> Result<Self::Value, RuntimeError>;

    /// Invoke one callback with the event value.
    fn call(
        &self,
        ctx: &mut Self::Context,
        callback: &Self::Callback,
        event: &Self::Value,
    ) -> Result<Self::Value, RuntimeError>;

    /// Convert a callback's result back into a native value.
    fn unmarshal(&self, ctx: &mut Self::Context, value: Self::Value) -> Result<ReturnValue, RuntimeError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Native Runtime
// ─────────────────────────────────────────────────────────────────────────────

type NativeFn = dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync;

/// A Rust closure registered as an extension callback.
#[derive(Clone)]
pub struct NativeCallback {
    handler: Arc<NativeFn>,
}

impl NativeCallback {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl fmt::Debug for NativeCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeCallback").finish_non_exhaustive()
    }
}

/// Evaluation context of the native runtime.
#[derive(Debug, Default)]
pub struct NativeContext {
    calls: usize,
}

impl NativeContext {
    /// Callbacks invoked through this context.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

/// Runtime whose callbacks are Rust closures over JSON event objects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeRuntime;

impl NativeRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl ExtensionRuntime for NativeRuntime {
    type Value = Value;
    type Callback = NativeCallback;
    type Context = NativeContext;

    fn name(&self) -> &str {
        "native"
    }

    fn enter(&self) -> Result<NativeContext, RuntimeError> {
        Ok(NativeContext::default())
    }

    fn marshal(&self, _ctx: &mut NativeContext, args: &HookArgs) -> Result<Value, RuntimeError> {
        serde_json::to_value(args).map_err(|e| RuntimeError::Marshal(e.to_string()))
    }

    fn call(
        &self,
        ctx: &mut NativeContext,
        callback: &NativeCallback,
        event: &Value,
    ) -> Result<Value, RuntimeError> {
        ctx.calls += 1;
        (callback.handler)(event).map_err(|e| RuntimeError::Callback(format!("{:#}", e)))
    }

    fn unmarshal(&self, _ctx: &mut NativeContext, value: Value) -> Result<ReturnValue, RuntimeError> {
        json_to_return(value)
    }
}

/// Convert a JSON value into a [`ReturnValue`].
pub fn json_to_return(value: Value) -> Result<ReturnValue, RuntimeError> {
    match value {
        Value::Null => Ok(ReturnValue::Absent),
        Value::Bool(b) => Ok(ReturnValue::Bool(b)),
        Value::Number(n) => n
            .as_f64()
            .map(ReturnValue::Number)
            .ok_or_else(|| RuntimeError::Marshal(format!("number out of range: {}", n))),
        Value::String(s) => Ok(ReturnValue::Text(s)),
        other => Err(RuntimeError::Marshal(format!(
            "unsupported return type: {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_native_roundtrip() {
        let runtime = NativeRuntime::new();
        let mut ctx = runtime.enter().unwrap();
        let event = runtime
            .marshal(
                &mut ctx,
                &HookArgs::Density {
                    x: 10,
                    y: 64,
                    z: 10,
                    density: 1.5,
                },
            )
            .unwrap();

        let double = NativeCallback::new(|event| Ok(json!(event["density"].as_f64().unwrap() * 2.0)));
        let out = runtime.call(&mut ctx, &double, &event).unwrap();
        assert_eq!(runtime.unmarshal(&mut ctx, out).unwrap(), ReturnValue::Number(3.0));
        assert_eq!(ctx.calls(), 1);
    }

    #[test]
    fn test_callback_error_is_wrapped() {
        let runtime = NativeRuntime::new();
        let mut ctx = runtime.enter().unwrap();
        let failing = NativeCallback::new(|_| anyhow::bail!("boom"));

        let err = runtime.call(&mut ctx, &failing, &Value::Null).unwrap_err();
        assert_eq!(err, RuntimeError::Callback("boom".into()));
    }

    #[test]
    fn test_json_to_return() {
        assert_eq!(json_to_return(Value::Null).unwrap(), ReturnValue::Absent);
        assert_eq!(json_to_return(json!(true)).unwrap(), ReturnValue::Bool(true));
        assert_eq!(json_to_return(json!(2)).unwrap(), ReturnValue::Number(2.0));
        assert_eq!(
            json_to_return(json!("minecraft:sand")).unwrap(),
            ReturnValue::Text("minecraft:sand".into())
        );
        assert!(matches!(json_to_return(json!([1, 2])), Err(RuntimeError::Marshal(_))));
    }
}
