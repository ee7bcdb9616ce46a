//! # Arena Live Client
//!
//! Transport-agnostic Rust client for Arena's real-time state
//! synchronization protocol.
//!
//! Arena runs three families of live processes — battle sessions, playground
//! conversations, and fine-tuning jobs. For each, this crate keeps a
//! client-side view of the in-progress entity synchronized with the event
//! stream delivered over a persistent connection, and reconciles it against
//! the independently polled, persisted records.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] and [`Dialer`]
//!   traits for any backend
//! - **WebSocket built-in** — the default `transport-websocket` feature
//!   provides [`WebSocketTransport`](transports::WebSocketTransport)
//! - **Self-healing** — an unexpected close reconnects after a fixed delay
//!   until [`disconnect`](store::LiveStore::disconnect) is called
//! - **Defensive decoding** — malformed frames are dropped, never surfaced
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # async fn example() {
//! use arena_live_client::{ArenaLiveConfig, BattleStore, RestClient, merge};
//!
//! let config = ArenaLiveConfig::new("wss://arena.example", "https://arena.example");
//! let rest = RestClient::from_config(&config);
//!
//! let mut store = BattleStore::new(config);
//! store.connect("session-1").await;
//!
//! // On every poll tick: fetch the persisted turns and merge in whatever
//! // the live connection has finalized since.
//! if let Ok(page) = rest.list_turns("session-1", 1, 50).await {
//!     let turns = merge::merge(&page.items, &store.completed());
//!     println!("{} turns", turns.len());
//! }
//!
//! store.disconnect().await;
//! # }
//! ```

pub mod config;
pub mod domains;
pub mod error;
pub mod link;
pub mod merge;
pub mod protocol;
#[cfg(feature = "rest")]
pub mod rest;
pub mod store;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use config::ArenaLiveConfig;
pub use error::ArenaLiveError;
pub use link::{LiveLink, Subscription};
pub use protocol::{
    BattleEvent, BattleTurn, FineTuneEvent, JobSnapshot, JobStatus, PlaygroundEvent,
    PlaygroundMessage, ProcessingPhase,
};
#[cfg(feature = "rest")]
pub use rest::{Page, RestClient};
pub use store::{BattleStore, FineTuneStore, LiveStore, PlaygroundStore};
pub use transport::{Dialer, Transport};
#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketDialer, WebSocketTransport};
