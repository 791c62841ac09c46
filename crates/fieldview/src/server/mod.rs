//! WebSocket Server
//!
//! JSON RPC over WebSocket for clients that create and manage presentations.

mod handler;
mod protocol;
mod router;
mod state;

pub use handler::*;
pub use protocol::*;
pub use router::*;
pub use state::*;
