//! fieldview - presentation pipelines for a scriptable render engine
//!
//! This crate provides:
//! - Presentations: one visualization of one dataset field, built as a
//!   pipeline of engine objects and kept updatable through typed handles
//! - Seven variants (scalar map, contour, vectors, slices, deflection,
//!   point sprites, mesh) described as stage recipes
//! - A registry of client sessions and the presentations they own
//! - Layered configuration and a WebSocket API
//!
//! All engine access goes through [`fieldview_script::ScriptBridge`].

pub use fieldview_script;

pub mod config;
pub mod error;
pub mod presentation;
pub mod registry;
pub mod server;
pub mod types;

pub use config::{ConfigOverrides, FieldviewConfig};
pub use error::{PresentationError, PresentationResult};
pub use presentation::params::{PresentationParams, VariantKind, VariantParams};
pub use presentation::{Presentation, PresentationState, PresentationSummary, StageHandle};
pub use registry::PresentationRegistry;
pub use types::{FieldDescriptor, PresentationId, SessionId};
