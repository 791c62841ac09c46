//! Commands sent to the bridge worker thread.

use tokio::sync::oneshot;

use crate::error::BridgeResult;
use crate::object::ObjectRef;

pub(crate) enum BridgeCommand {
    /// Run a command body as one transaction on behalf of `owner`.
    Execute {
        owner: String,
        body: String,
        reply: oneshot::Sender<BridgeResult<()>>,
    },

    /// Resolve a binding name to a handle.
    Lookup {
        name: String,
        reply: oneshot::Sender<BridgeResult<ObjectRef>>,
    },

    /// Evaluate an expression outside any transaction and return its value.
    Evaluate {
        expression: String,
        reply: oneshot::Sender<BridgeResult<serde_json::Value>>,
    },
}

impl BridgeCommand {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            BridgeCommand::Execute { .. } => "execute",
            BridgeCommand::Lookup { .. } => "lookup",
            BridgeCommand::Evaluate { .. } => "evaluate",
        }
    }
}
