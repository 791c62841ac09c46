//! Worker loop that owns the interpreter.
//!
//! Commands are served strictly one at a time in arrival order. The loop ends
//! when every sender is gone; commands still queued after termination are
//! answered with [`BridgeError::Terminated`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::command::BridgeCommand;
use crate::engine::ScriptEngine;
use crate::error::{BridgeError, BridgeResult};
use crate::object::ObjectRef;
use crate::script::quote;

pub(crate) fn run_worker<E: ScriptEngine>(
    name: &str,
    mut engine: E,
    terminated: Arc<AtomicBool>,
    mut cmd_rx: mpsc::Receiver<BridgeCommand>,
) {
    while let Some(cmd) = cmd_rx.blocking_recv() {
        if terminated.load(Ordering::SeqCst) {
            tracing::debug!("[run_worker:{}] Dropping {} after termination", name, cmd.describe());
            reject(cmd);
            continue;
        }

        match cmd {
            BridgeCommand::Execute { owner, body, reply } => {
                let result = execute(name, &mut engine, &owner, &body);
                let _ = reply.send(result);
            }

            BridgeCommand::Lookup { name: binding, reply } => {
                let result = lookup(&mut engine, &binding);
                let _ = reply.send(result);
            }

            BridgeCommand::Evaluate { expression, reply } => {
                let result = engine.eval(&expression).map_err(BridgeError::engine);
                let _ = reply.send(result);
            }
        }
    }

    tracing::debug!("[run_worker:{}] Command channel closed", name);
}

fn reject(cmd: BridgeCommand) {
    match cmd {
        BridgeCommand::Execute { reply, .. } => {
            let _ = reply.send(Err(BridgeError::Terminated));
        }
        BridgeCommand::Lookup { reply, .. } => {
            let _ = reply.send(Err(BridgeError::Terminated));
        }
        BridgeCommand::Evaluate { reply, .. } => {
            let _ = reply.send(Err(BridgeError::Terminated));
        }
    }
}

fn execute<E: ScriptEngine>(name: &str, engine: &mut E, owner: &str, body: &str) -> BridgeResult<()> {
    tracing::debug!("[run_worker:{}] Executing as {}:\n{}", name, owner, body);
    let source = format!("__fv.run({}, function () {{\n{}\n}});", quote(owner), body);
    match engine.eval(&source) {
        Ok(_) => Ok(()),
        Err(message) => {
            tracing::debug!("[run_worker:{}] Command for {} failed: {}", name, owner, message);
            Err(BridgeError::engine(message))
        }
    }
}

fn lookup<E: ScriptEngine>(engine: &mut E, binding: &str) -> BridgeResult<ObjectRef> {
    let value = engine
        .eval(&format!("__fv.lookup({})", quote(binding)))
        .map_err(BridgeError::engine)?;
    if value.is_null() {
        return Err(BridgeError::NotFound {
            name: binding.to_string(),
        });
    }
    serde_json::from_value(value)
        .map_err(|e| BridgeError::engine(format!("malformed handle for {}: {}", binding, e)))
}
