//! Scripting bridge for the render engine.
//!
//! One embedded QuickJS interpreter runs on a dedicated worker thread. Every
//! call goes through a process-wide gate ([`ScriptBridge::lock`]), and every
//! command body runs as a transaction: if it fails, the bindings, engine
//! objects, property changes and deletions it made are all undone.
//!
//! ```text
//!  async callers ── lock() ──▶ ScriptSession ── mpsc ──▶ worker thread
//!                                                        └─ QuickJS
//!                                                           ├─ __fv   (bindings, transactions)
//!                                                           └─ pvs    (render engine surface)
//! ```
//!
//! Command text is assembled with [`Script`] and [`Call`]; runtime strings are
//! always emitted as escaped literals.

mod bridge;
mod command;
mod engine;
mod error;
mod object;
pub mod script;
mod worker;

pub use bridge::{spawn_bridge, spawn_quickjs_bridge, BridgeOptions, ScriptBridge, ScriptSession};
pub use engine::{PreludeScript, QuickJsEngine, ScriptEngine, BRIDGE_PRELUDE, HEADLESS_ENGINE_PRELUDE};
pub use error::{BridgeError, BridgeResult};
pub use object::ObjectRef;
pub use script::{quote, Arg, Call, Script};
