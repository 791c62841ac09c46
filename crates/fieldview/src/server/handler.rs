//! WebSocket Connection Handler
//!
//! Handles individual WebSocket connections and message processing. Each
//! connection owns one registry session for its whole lifetime.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::PresentationResult;
use crate::presentation::params::{PresentationParams, VariantKind};
use crate::types::{FieldDescriptor, PresentationId, SessionId};

use super::protocol::{ClientMessage, ErrorCode, ServerMessage};
use super::state::AppState;

/// Whether to keep reading from a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Handle a WebSocket connection
pub async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Create channel for sending messages to this client
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(64);

    let session_id = state.register_client(tx);

    let connected_msg = ServerMessage::connected(session_id.to_string());
    if let Ok(json) = serde_json::to_string(&connected_msg) {
        let _ = ws_sender.send(Message::Text(json)).await;
    }

    // Forward queued messages until every sender is gone
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json)).await.is_err() {
                    return;
                }
            }
        }
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    // Requests run to completion one at a time; a dropped socket never
    // cancels a registry operation halfway.
    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                if handle_client_message(&state, session_id, &text).await == Flow::Close {
                    break;
                }
            }
            Message::Close(_) => break,
            Message::Ping(_) => {
                // Pong is handled automatically by axum
                tracing::trace!(session = %session_id, "Received ping");
            }
            _ => {}
        }
    }

    state.remove_client(session_id);
    if let Err(e) = state.registry().close_session(session_id).await {
        // Already closed by a CloseSession request or by shutdown.
        tracing::debug!(session = %session_id, "Session not closed on disconnect: {}", e);
    }
    let _ = send_task.await;
}

/// Handle a client message
async fn handle_client_message(state: &AppState, session_id: SessionId, text: &str) -> Flow {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(session = %session_id, "Failed to parse client message: {}", e);
            state.send_to_client(
                session_id,
                ServerMessage::Error {
                    id: request_id(text),
                    code: ErrorCode::InvalidRequest,
                    message: format!("Invalid request: {}", e),
                },
            );
            return Flow::Continue;
        }
    };

    match msg {
        ClientMessage::CreatePresentation {
            id,
            variant,
            dataset,
            field,
            params,
        } => {
            let result = handle_create(state, session_id, variant, &dataset, field, params).await;
            respond(state, session_id, &id, result.map(|p| serde_json::json!({ "presentation": p })));
        }
        ClientMessage::UpdatePresentation {
            id,
            presentation,
            params,
        } => {
            let result = state.registry().patch_presentation(presentation, params).await;
            respond(state, session_id, &id, result.map(|()| Value::Null));
        }
        ClientMessage::DisposePresentation { id, presentation } => {
            let result = state.registry().dispose_presentation(presentation).await;
            respond(state, session_id, &id, result.map(|()| Value::Null));
        }
        ClientMessage::ListPresentations { id } => {
            let result = state.registry().list_presentations(session_id).await;
            respond(state, session_id, &id, result.map(to_json));
        }
        ClientMessage::GetProperties { id, presentation } => {
            let result = state.registry().presentation_properties(presentation).await;
            respond(state, session_id, &id, result.map(to_json));
        }
        ClientMessage::GetScript { id, presentation } => {
            let result = state.registry().script_dump(presentation).await;
            respond(state, session_id, &id, result.map(to_json));
        }
        ClientMessage::CloseSession { id } => {
            let result = state.registry().close_session(session_id).await;
            respond(state, session_id, &id, result.map(|()| Value::Null));
            return Flow::Close;
        }
        ClientMessage::Ping { id } => {
            state.send_to_client(session_id, ServerMessage::pong(id));
        }
    }
    Flow::Continue
}

async fn handle_create(
    state: &AppState,
    session_id: SessionId,
    variant: VariantKind,
    dataset: &str,
    field: FieldDescriptor,
    params: Option<Map<String, Value>>,
) -> PresentationResult<PresentationId> {
    let registry = state.registry();
    match params {
        None => registry.create_presentation(session_id, variant, dataset, field).await,
        Some(overrides) => {
            let mut base = PresentationParams::defaults_for(variant);
            base.display = registry.defaults().clone();
            let params = base.overlay(overrides)?;
            registry.create_presentation_with(session_id, dataset, field, params).await
        }
    }
}

fn respond(state: &AppState, session_id: SessionId, id: &str, result: PresentationResult<Value>) {
    let message = match result {
        Ok(Value::Null) => ServerMessage::success(id, None),
        Ok(data) => ServerMessage::success(id, Some(data)),
        Err(e) => {
            tracing::debug!(session = %session_id, request = %id, "Request failed: {}", e);
            ServerMessage::failure(id, &e)
        }
    };
    state.send_to_client(session_id, message);
}

fn to_json<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Best-effort request id from a message that failed to parse.
fn request_id(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    value.get("id")?.as_str().map(str::to_string)
}
