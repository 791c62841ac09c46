//! Error types for the script bridge.

use std::path::PathBuf;

/// Errors that can occur while talking to the embedded interpreter.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The interpreter reported a failure (syntax, missing symbol, engine exception).
    #[error("Engine error: {message}")]
    Engine { message: String },

    #[error("Name not bound in interpreter: {name}")]
    NotFound { name: String },

    #[error("Bridge has terminated")]
    Terminated,

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Bridge thread panicked")]
    ThreadPanic,

    #[error("Failed to initialize engine: {0}")]
    Init(String),

    #[error("Failed to spawn thread: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Failed to read prelude {}: {source}", path.display())]
    Prelude {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BridgeError {
    pub(crate) fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Whether this error came from the interpreter itself rather than the plumbing.
    pub fn is_engine(&self) -> bool {
        matches!(self, Self::Engine { .. })
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
