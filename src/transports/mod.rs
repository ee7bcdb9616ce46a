//! Transport implementations for the Arena live protocol.
//!
//! Concrete [`Transport`](crate::Transport) implementations live here behind
//! feature gates. Enable the corresponding Cargo feature to pull in a
//! transport:
//!
//! | Feature                | Transport              |
//! |------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] |

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketDialer, WebSocketTransport};
