//! Presentation errors.

use fieldview_script::BridgeError;

use crate::presentation::PresentationState;

#[derive(Debug, thiserror::Error)]
pub enum PresentationError {
    /// The engine rejected a command, or the bridge is unavailable.
    #[error(transparent)]
    Engine(#[from] BridgeError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot {operation} a presentation in state {state}")]
    InvalidState {
        operation: &'static str,
        state: PresentationState,
    },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

impl PresentationError {
    pub(crate) fn invalid_state(operation: &'static str, state: PresentationState) -> Self {
        Self::InvalidState { operation, state }
    }

    pub(crate) fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }
}

pub type PresentationResult<T> = Result<T, PresentationError>;
