//! Rhai Script Runtime
//!
//! Scripts bind named functions to hooks with `on`:
//!
//! ```rhai
//! fn double_density(event) {
//!     event.density * 2.0
//! }
//!
//! on("worldgen.density", "double_density");
//! ```
//!
//! Each script is compiled once; its top-level statements run at load time to
//! collect `on` registrations, and only its function definitions are kept for
//! dispatch. Every dispatch gets a fresh `Scope`, so callbacks share no state
//! through variables.

use std::sync::{Arc, Mutex, PoisonError};

use rhai::{AST, Dynamic, Engine, ImmutableString, Scope};

use super::hooks::{HookArgs, HookName, ReturnValue};
use super::packs::ScriptPack;
use super::runtime::{ExtensionRuntime, RuntimeError};
use crate::api::EventsApi;
use crate::{SdkError, SdkResult};

/// A script function bound to a hook.
#[derive(Debug, Clone)]
pub struct ScriptCallback {
    namespace: Arc<str>,
    ast: Arc<AST>,
    function: String,
}

impl ScriptCallback {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn function(&self) -> &str {
        &self.function
    }
}

/// Per-dispatch evaluation state.
pub struct ScriptContext {
    scope: Scope<'static>,
}

/// Outcome of [`ScriptRuntime::load_packs`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackLoadSummary {
    pub loaded: usize,
    pub failed: usize,
    pub callbacks: usize,
}

/// Extension runtime backed by a rhai [`Engine`].
pub struct ScriptRuntime {
    engine: Engine,
    pending: Arc<Mutex<Vec<(String, String)>>>,
    loading: Mutex<()>,
}

impl ScriptRuntime {
    pub fn new() -> Self {
        let pending: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));

        let mut engine = Engine::new();
        engine.set_fast_operators(true);

        let sink = pending.clone();
        engine.register_fn("on", move |hook: ImmutableString, function: ImmutableString| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((hook.to_string(), function.to_string()));
        });
        engine.register_fn("log", |message: ImmutableString| {
            tracing::info!(target: "strata::script", "{}", message);
        });

        Self {
            engine,
            pending,
            loading: Mutex::new(()),
        }
    }

    /// Compile a script and run its top level, returning its registrations.
    pub fn compile(&self, namespace: &str, source: &str) -> SdkResult<Vec<(HookName, ScriptCallback)>> {
        let _loading = self.loading.lock().unwrap_or_else(PoisonError::into_inner);
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let ast = self
            .engine
            .compile(source)
            .map_err(|e| SdkError::pack(namespace, format!("compile error: {}", e)))?;
        self.engine
            .run_ast_with_scope(&mut Scope::new(), &ast)
            .map_err(|e| SdkError::pack(namespace, format!("script error: {}", e)))?;

        let registrations: Vec<_> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let ast = Arc::new(ast.clone_functions_only());
        let namespace: Arc<str> = Arc::from(namespace);

        registrations
            .into_iter()
            .map(|(hook, function)| {
                let hook: HookName = hook.parse()?;
                if !ast.iter_functions().any(|f| f.name == function) {
                    return Err(SdkError::pack(
                        namespace.as_ref(),
                        format!("{} bound to undefined function '{}'", hook, function),
                    ));
                }
                Ok((
                    hook,
                    ScriptCallback {
                        namespace: namespace.clone(),
                        ast: ast.clone(),
                        function,
                    },
                ))
            })
            .collect()
    }

    /// Load every pack's entry script, in order, registering through `api`.
    ///
    /// A pack that fails to read or compile is logged and skipped; the others
    /// still load.
    pub async fn load_packs(api: &EventsApi<ScriptRuntime>, packs: &[ScriptPack]) -> PackLoadSummary {
        let mut summary = PackLoadSummary::default();

        for pack in packs {
            let loaded = match pack.read_entry().await {
                Ok(source) => api.runtime().compile(&pack.namespace, &source),
                Err(e) => Err(e),
            };

            match loaded {
                Ok(callbacks) => {
                    let count = callbacks.len();
                    for (hook, callback) in callbacks {
                        api.on_hook(hook, callback);
                    }
                    summary.loaded += 1;
                    summary.callbacks += count;
                    tracing::info!(pack = %pack, callbacks = count, "Loaded script pack");
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(pack = %pack.namespace, error = %e, "Failed to load script pack");
                }
            }
        }

        summary
    }
}

impl Default for ScriptRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionRuntime for ScriptRuntime {
    type Value = Dynamic;
    type Callback = ScriptCallback;
    type Context = ScriptContext;

    fn name(&self) -> &str {
        "rhai"
    }

    fn enter(&self) -> Result<ScriptContext, RuntimeError> {
        Ok(ScriptContext { scope: Scope::new() })
    }

    fn marshal(&self, _ctx: &mut ScriptContext, args: &HookArgs) -> Result<Dynamic, RuntimeError> {
        rhai::serde::to_dynamic(args).map_err(|e| RuntimeError::Marshal(e.to_string()))
    }

    fn call(
        &self,
        ctx: &mut ScriptContext,
        callback: &ScriptCallback,
        event: &Dynamic,
    ) -> Result<Dynamic, RuntimeError> {
        self.engine
            .call_fn::<Dynamic>(&mut ctx.scope, &callback.ast, &callback.function, (event.clone(),))
            .map_err(|e| {
                RuntimeError::Callback(format!("{}::{}: {}", callback.namespace, callback.function, e))
            })
    }

    fn unmarshal(&self, _ctx: &mut ScriptContext, value: Dynamic) -> Result<ReturnValue, RuntimeError> {
        if value.is_unit() {
            return Ok(ReturnValue::Absent);
        }
        if let Ok(b) = value.as_bool() {
            return Ok(ReturnValue::Bool(b));
        }
        if let Ok(f) = value.as_float() {
            return Ok(ReturnValue::Number(f));
        }
        if let Ok(i) = value.as_int() {
            return Ok(ReturnValue::Number(i as f64));
        }
        if value.is_string() {
            return value
                .into_string()
                .map(ReturnValue::Text)
                .map_err(|e| RuntimeError::Marshal(e.to_string()));
        }
        Err(RuntimeError::Marshal(format!(
            "unsupported return type: {}",
            value.type_name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::{Dispatcher, Verdict, discover_packs};
    use crate::{Strata, StrataConfig};
    use strata_core::{BridgeSlot, HookPoints};
    use tempfile::TempDir;

    const DENSITY_SCRIPT: &str = r#"
        fn double_density(event) {
            event.density * 2.0
        }

        fn sand_above_sea(event) {
            if event.y > 62 { "minecraft:sand" } else { () }
        }

        on("worldgen.density", "double_density");
        on("worldgen.surface.block", "sand_above_sea");
    "#;

    #[test]
    fn test_compile_collects_registrations() {
        let runtime = ScriptRuntime::new();
        let callbacks = runtime.compile("terrain", DENSITY_SCRIPT).unwrap();

        let hooks: Vec<_> = callbacks.iter().map(|(hook, _)| *hook).collect();
        assert_eq!(hooks, vec![HookName::Density, HookName::SurfaceBlock]);
        assert_eq!(callbacks[0].1.function(), "double_density");
        assert_eq!(callbacks[0].1.namespace(), "terrain");
    }

    #[test]
    fn test_script_density_override() {
        let dispatcher = Dispatcher::new(ScriptRuntime::new());
        for (hook, callback) in dispatcher.runtime().compile("terrain", DENSITY_SCRIPT).unwrap() {
            dispatcher.register(hook, callback);
        }

        let report = dispatcher
            .dispatch(&HookArgs::Density {
                x: 10,
                y: 64,
                z: 10,
                density: 1.5,
            })
            .unwrap();
        assert_eq!(report.verdict, Verdict::Override(ReturnValue::Number(3.0)));

        let report = dispatcher
            .dispatch(&HookArgs::SurfaceBlock {
                x: 0,
                y: 40,
                z: 0,
                surface_depth: 1,
            })
            .unwrap();
        assert_eq!(report.verdict, Verdict::Default);
    }

    #[test]
    fn test_unknown_hook_rejected() {
        let runtime = ScriptRuntime::new();
        let err = runtime
            .compile("bad", r#"fn f(e) { 1.0 } on("worldgen.nope", "f");"#)
            .unwrap_err();
        assert!(err.is_unknown_hook());
    }

    #[test]
    fn test_undefined_function_rejected() {
        let runtime = ScriptRuntime::new();
        let err = runtime
            .compile("bad", r#"on("worldgen.density", "missing");"#)
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_script_error_is_callback_failure() {
        let dispatcher = Dispatcher::new(ScriptRuntime::new());
        let script = r#"
            fn broken(event) { throw "carver script failed"; }
            fn fine(event) { true }
            on("worldgen.chunk.carver", "broken");
            on("worldgen.chunk.carver", "fine");
        "#;
        for (hook, callback) in dispatcher.runtime().compile("carvers", script).unwrap() {
            dispatcher.register(hook, callback);
        }

        let report = dispatcher
            .dispatch(&HookArgs::ChunkCarver {
                region: strata_core::RegionHandle::new(strata_core::ChunkPos::new(0, 0), 1),
                chunk: strata_core::ChunkHandle::new(strata_core::ChunkPos::new(0, 0), -64, 384),
                seed: 1,
            })
            .unwrap();
        assert!(report.verdict.is_cancel());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 0);
    }

    #[tokio::test]
    async fn test_load_packs_skips_broken() {
        let root = TempDir::new().unwrap();
        for (name, source) in [("good", DENSITY_SCRIPT), ("bad", "fn oops( {")] {
            let data = root.path().join(name).join("data");
            std::fs::create_dir_all(&data).unwrap();
            std::fs::write(data.join("main.rhai"), source).unwrap();
        }

        let packs = discover_packs(root.path()).await.unwrap();
        let strata = Strata::new(StrataConfig::default(), ScriptRuntime::new()).unwrap();
        let summary = ScriptRuntime::load_packs(strata.events(), &packs).await;

        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.callbacks, 2);
        assert!(strata.dispatcher().has_callbacks(HookName::Density));
    }

    #[tokio::test]
    async fn test_reloaded_packs_apply_to_sampled_cells() {
        let root = TempDir::new().unwrap();
        let data = root.path().join("terrain").join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("main.rhai"), DENSITY_SCRIPT).unwrap();
        let packs = discover_packs(root.path()).await.unwrap();

        let strata = Strata::new(StrataConfig::default(), ScriptRuntime::new()).unwrap();
        let slot = BridgeSlot::new();
        strata.install_into(&slot);
        let points = HookPoints::new(&slot);

        ScriptRuntime::load_packs(strata.events(), &packs).await;
        assert_eq!(points.resolve_density(10, 64, 10, 1.5), 3.0);

        strata.reload();
        assert_eq!(points.resolve_density(10, 64, 10, 1.5), 1.5);

        ScriptRuntime::load_packs(strata.events(), &packs).await;
        assert_eq!(points.resolve_density(10, 64, 10, 1.5), 3.0);
    }
}
