//! QuickJS engine wrapper.
//!
//! The engine lives on the bridge worker thread for its whole life and is
//! never moved across threads, so it does not need to be `Send`.

use rquickjs::function::Rest;
use rquickjs::{Context, Ctx, Function, Object, Runtime, Value as JsValue};

use crate::error::{BridgeError, BridgeResult};

/// Script source of the command transaction layer (`__fv`).
pub const BRIDGE_PRELUDE: &str = include_str!("js/bridge.js");

/// Script source of the headless engine (`pvs`).
pub const HEADLESS_ENGINE_PRELUDE: &str = include_str!("js/headless_engine.js");

/// A named script evaluated once when the engine starts.
#[derive(Debug, Clone)]
pub struct PreludeScript {
    pub name: String,
    pub source: String,
}

impl PreludeScript {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Something that can evaluate command text.
///
/// Errors are plain messages; the bridge turns them into
/// [`BridgeError::Engine`].
pub trait ScriptEngine {
    fn eval(&mut self, source: &str) -> Result<serde_json::Value, String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// QuickJS
// ─────────────────────────────────────────────────────────────────────────────

pub struct QuickJsEngine {
    // Owns the heap the context allocates from.
    _runtime: Runtime,
    context: Context,
}

impl QuickJsEngine {
    /// Create an engine with the bridge prelude and, optionally, the headless
    /// engine and extra preludes loaded (in that order).
    pub fn new(
        memory_limit: Option<usize>,
        headless: bool,
        preludes: &[PreludeScript],
    ) -> BridgeResult<Self> {
        let runtime = Runtime::new().map_err(|e| BridgeError::Init(e.to_string()))?;
        if let Some(limit) = memory_limit {
            runtime.set_memory_limit(limit);
        }
        let context = Context::full(&runtime).map_err(|e| BridgeError::Init(e.to_string()))?;

        context
            .with(|ctx| register_log_globals(&ctx))
            .map_err(|e| BridgeError::Init(e.to_string()))?;

        let mut engine = Self {
            _runtime: runtime,
            context,
        };

        engine
            .load("<bridge>", BRIDGE_PRELUDE)
            .map_err(BridgeError::Init)?;
        if headless {
            engine
                .load("<headless-engine>", HEADLESS_ENGINE_PRELUDE)
                .map_err(BridgeError::Init)?;
        }
        for prelude in preludes {
            engine
                .load(&prelude.name, &prelude.source)
                .map_err(BridgeError::Init)?;
        }

        Ok(engine)
    }

    fn load(&mut self, name: &str, source: &str) -> Result<(), String> {
        tracing::debug!("[engine] Loading prelude {}", name);
        self.eval(source)
            .map(|_| ())
            .map_err(|e| format!("{}: {}", name, e))
    }
}

impl ScriptEngine for QuickJsEngine {
    fn eval(&mut self, source: &str) -> Result<serde_json::Value, String> {
        self.context.with(|ctx| match ctx.eval::<JsValue, _>(source) {
            Ok(value) => js_to_json(&ctx, value),
            Err(rquickjs::Error::Exception) => Err(exception_message(&ctx)),
            Err(e) => Err(e.to_string()),
        })
    }
}

/// Pull the pending exception out of the context and describe it.
fn exception_message(ctx: &Ctx<'_>) -> String {
    let caught = ctx.catch();
    if let Some(exception) = caught.as_exception() {
        return exception
            .message()
            .unwrap_or_else(|| "uncaught exception".to_string());
    }
    match js_to_json(ctx, caught) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(e) => e,
    }
}

/// Convert a JavaScript value to JSON. Functions and symbols become `null`.
fn js_to_json<'js>(ctx: &Ctx<'js>, js: JsValue<'js>) -> Result<serde_json::Value, String> {
    use serde_json::Value;

    match js.type_of() {
        rquickjs::Type::Undefined | rquickjs::Type::Null => Ok(Value::Null),
        rquickjs::Type::Bool => {
            let b: bool = js.get().map_err(|e| e.to_string())?;
            Ok(Value::Bool(b))
        }
        rquickjs::Type::Int => {
            let i: i32 = js.get().map_err(|e| e.to_string())?;
            Ok(Value::from(i))
        }
        rquickjs::Type::Float => {
            let f: f64 = js.get().map_err(|e| e.to_string())?;
            Ok(serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number))
        }
        rquickjs::Type::String => {
            let s: String = js.get().map_err(|e| e.to_string())?;
            Ok(Value::String(s))
        }
        rquickjs::Type::Array => {
            let arr: rquickjs::Array = js.get().map_err(|e| e.to_string())?;
            let mut values = Vec::with_capacity(arr.len());
            for i in 0..arr.len() {
                let item: JsValue = arr.get(i).map_err(|e| e.to_string())?;
                values.push(js_to_json(ctx, item)?);
            }
            Ok(Value::Array(values))
        }
        rquickjs::Type::Object => {
            let obj: Object = js.get().map_err(|e| e.to_string())?;
            let mut fields = serde_json::Map::new();
            for prop in obj.props::<String, JsValue>() {
                let (key, val) = prop.map_err(|e| e.to_string())?;
                fields.insert(key, js_to_json(ctx, val)?);
            }
            Ok(Value::Object(fields))
        }
        _ => Ok(Value::Null),
    }
}

/// Register `__log` and `console`, both forwarding to `tracing`.
fn register_log_globals(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    let log = Object::new(ctx.clone())?;
    log.set("info", Function::new(ctx.clone(), |msg: String| {
        tracing::info!(target: "fieldview.engine", "{}", msg);
    })?)?;
    log.set("debug", Function::new(ctx.clone(), |msg: String| {
        tracing::debug!(target: "fieldview.engine", "{}", msg);
    })?)?;
    log.set("warn", Function::new(ctx.clone(), |msg: String| {
        tracing::warn!(target: "fieldview.engine", "{}", msg);
    })?)?;
    log.set("error", Function::new(ctx.clone(), |msg: String| {
        tracing::error!(target: "fieldview.engine", "{}", msg);
    })?)?;
    globals.set("__log", log)?;

    if globals.get::<_, Object>("console").is_ok() {
        return Ok(());
    }

    let console = Object::new(ctx.clone())?;
    console.set("log", Function::new(ctx.clone(), |args: Rest<String>| {
        tracing::info!(target: "fieldview.engine.console", "{}", args.0.join(" "));
    })?)?;
    console.set("warn", Function::new(ctx.clone(), |args: Rest<String>| {
        tracing::warn!(target: "fieldview.engine.console", "{}", args.0.join(" "));
    })?)?;
    console.set("error", Function::new(ctx.clone(), |args: Rest<String>| {
        tracing::error!(target: "fieldview.engine.console", "{}", args.0.join(" "));
    })?)?;
    globals.set("console", console)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> QuickJsEngine {
        QuickJsEngine::new(None, true, &[]).unwrap()
    }

    #[test]
    fn test_eval_primitives_and_objects() {
        let mut engine = engine();
        assert_eq!(engine.eval("40 + 2").unwrap(), serde_json::json!(42));
        assert_eq!(engine.eval("'hi'").unwrap(), serde_json::json!("hi"));
        assert_eq!(engine.eval("undefined").unwrap(), serde_json::Value::Null);

        let obj = engine.eval("({ name: 'x', list: [1, 2.5, true] })").unwrap();
        assert_eq!(obj["name"], "x");
        assert_eq!(obj["list"], serde_json::json!([1, 2.5, true]));
    }

    #[test]
    fn test_exception_message_is_surfaced() {
        let mut engine = engine();
        let err = engine.eval("throw new Error('boom')").unwrap_err();
        assert_eq!(err, "boom");

        let err = engine.eval("pvs.NoSuchCall()").unwrap_err();
        assert!(err.contains("not a function"), "{}", err);
    }

    #[test]
    fn test_syntax_error() {
        let mut engine = engine();
        assert!(engine.eval("let = ;").is_err());
    }

    #[test]
    fn test_log_globals() {
        let mut engine = engine();
        engine.eval("__log.info('from script'); console.log('a', 'b')").unwrap();
    }

    #[test]
    fn test_headless_prelude_optional() {
        let mut engine = QuickJsEngine::new(None, false, &[]).unwrap();
        assert_eq!(engine.eval("typeof pvs").unwrap(), "undefined");
        assert_eq!(engine.eval("typeof __fv").unwrap(), "object");
    }

    #[test]
    fn test_extra_prelude() {
        let prelude = PreludeScript::new("site.js", "globalThis.SITE = 'lab';");
        let mut engine = QuickJsEngine::new(None, true, &[prelude]).unwrap();
        assert_eq!(engine.eval("SITE").unwrap(), "lab");
    }

    #[test]
    fn test_broken_prelude_fails_init() {
        let prelude = PreludeScript::new("broken.js", "throw new Error('nope')");
        let err = QuickJsEngine::new(None, true, &[prelude]).err().unwrap();
        assert!(matches!(err, BridgeError::Init(ref m) if m.contains("broken.js")));
    }
}
