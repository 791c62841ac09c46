//! WebSocket Protocol Messages
//!
//! Defines the message types exchanged between client and server.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use fieldview_script::BridgeError;

use crate::error::PresentationError;
use crate::presentation::params::VariantKind;
use crate::types::{FieldDescriptor, PresentationId};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Build a new presentation in this connection's session
    CreatePresentation {
        /// Request ID for correlation
        id: String,
        variant: VariantKind,
        /// Dataset locator, a path or `file://` URL
        dataset: String,
        field: FieldDescriptor,
        /// Parameter overrides; omitted keys take the server defaults
        #[serde(default)]
        params: Option<Map<String, Value>>,
    },

    /// Change parameters; omitted keys keep their current values
    UpdatePresentation {
        id: String,
        presentation: PresentationId,
        params: Map<String, Value>,
    },

    DisposePresentation {
        id: String,
        presentation: PresentationId,
    },

    /// List the presentations of this connection's session
    ListPresentations {
        id: String,
    },

    GetProperties {
        id: String,
        presentation: PresentationId,
    },

    /// Commands executed for a presentation so far
    GetScript {
        id: String,
        presentation: PresentationId,
    },

    /// Dispose everything in the session and end the connection
    CloseSession {
        id: String,
    },

    /// Ping for keep-alive
    Ping {
        id: String,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Sent on initial connection
    Connected {
        session_id: String,
        server_version: String,
    },

    /// Response to a client request
    Response {
        id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
    },

    /// Error message for input that could not be parsed
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        code: ErrorCode,
        message: String,
    },

    /// Pong response to ping
    Pong {
        id: String,
    },
}

/// Error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    NotFound,
    InvalidState,
    EngineError,
    InvalidParameters,
    InternalError,
}

impl From<&PresentationError> for ErrorCode {
    fn from(err: &PresentationError) -> Self {
        match err {
            // The interpreter thread is gone, not the request at fault.
            PresentationError::Engine(
                BridgeError::ThreadPanic
                | BridgeError::ChannelClosed
                | BridgeError::SpawnFailed(_)
                | BridgeError::Init(_),
            ) => ErrorCode::InternalError,
            PresentationError::Engine(_) => ErrorCode::EngineError,
            PresentationError::NotFound(_) => ErrorCode::NotFound,
            PresentationError::InvalidState { .. } => ErrorCode::InvalidState,
            PresentationError::InvalidParameters(_) => ErrorCode::InvalidParameters,
        }
    }
}

impl ServerMessage {
    /// Create a success response
    pub fn success(id: impl Into<String>, data: Option<Value>) -> Self {
        Self::Response {
            id: id.into(),
            success: true,
            data,
            error: None,
            code: None,
        }
    }

    /// Create an error response
    pub fn error_response(id: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Response {
            id: id.into(),
            success: false,
            data: None,
            error: Some(message.into()),
            code: Some(code),
        }
    }

    /// Create an error response from a failed operation
    pub fn failure(id: impl Into<String>, err: &PresentationError) -> Self {
        Self::error_response(id, ErrorCode::from(err), err.to_string())
    }

    /// Create a connected message
    pub fn connected(session_id: impl Into<String>) -> Self {
        Self::Connected {
            session_id: session_id.into(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Create a pong message
    pub fn pong(id: impl Into<String>) -> Self {
        Self::Pong { id: id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_message_parse() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"CreatePresentation","id":"1","variant":"DeflectionShape",
                "dataset":"mesh.med","field":{"kind":"VECTOR","name":"displacement"},
                "params":{"scaleFactor":2.5}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::CreatePresentation {
                variant,
                field,
                params,
                ..
            } => {
                assert_eq!(variant, VariantKind::DeflectionShape);
                assert_eq!(field, FieldDescriptor::new("VECTOR", "displacement"));
                assert_eq!(params.unwrap()["scaleFactor"], 2.5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_params_are_optional_on_create() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"CreatePresentation","id":"1","variant":"MeshView",
                "dataset":"m.med","field":{"kind":"POINTS","name":"t"}}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::CreatePresentation { params: None, .. }));
    }

    #[test]
    fn test_presentation_ids_are_numbers() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"DisposePresentation","id":"9","presentation":4}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::DisposePresentation { presentation: PresentationId(4), .. }
        ));
    }

    #[test]
    fn test_server_message_serialize() {
        let msg = ServerMessage::success("1", Some(serde_json::json!({"presentation": 3})));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"Response\""));
        assert!(json.contains("\"success\":true"));
        assert!(!json.contains("\"code\""));
    }

    #[test]
    fn test_failure_carries_code() {
        let err = PresentationError::Engine(BridgeError::Terminated);
        let json = serde_json::to_value(ServerMessage::failure("2", &err)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "ENGINE_ERROR");

        let err = PresentationError::NotFound("presentation 8".into());
        assert_eq!(ErrorCode::from(&err), ErrorCode::NotFound);
        let err = PresentationError::InvalidParameters("radius".into());
        assert_eq!(
            serde_json::to_value(ErrorCode::from(&err)).unwrap(),
            "INVALID_PARAMETERS"
        );
    }

    #[test]
    fn test_lost_engine_thread_is_internal() {
        let err = PresentationError::Engine(BridgeError::ThreadPanic);
        let json = serde_json::to_value(ServerMessage::failure("3", &err)).unwrap();
        assert_eq!(json["code"], "INTERNAL_ERROR");
        let err = PresentationError::Engine(BridgeError::ChannelClosed);
        assert_eq!(ErrorCode::from(&err), ErrorCode::InternalError);

        let err = PresentationError::Engine(BridgeError::Engine {
            message: "unbound name: p1_disp".into(),
        });
        assert_eq!(ErrorCode::from(&err), ErrorCode::EngineError);
    }
}
