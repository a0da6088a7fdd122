//! Socket.IO client for the chat server's realtime channel.
//!
//! Only the WebSocket transport is spoken; there is no long-polling
//! fallback and no automatic reconnect.

mod client;
pub mod error;
pub mod packet;

pub use client::RealtimeClient;
pub use error::{Error, Result};
pub use packet::{EnginePacket, SocketPacket};
