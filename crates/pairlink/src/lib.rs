//! # Pairlink
//!
//! Signaling relay for two-party WebRTC sessions.
//!
//! Clients connect anonymously over WebSocket and ask to be paired. The
//! server matches them two at a time, oldest waiter first, tells the older
//! one to make the offer, and then relays the session negotiation between
//! the pair until one side leaves or both report done. Media never touches
//! the server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pairlink::prelude::*;
//!
//! # async fn start() -> Result<(), PairlinkError> {
//! let server = PairlinkServerBuilder::new()
//!     .bind("0.0.0.0:7070")
//!     .path("/api/matchmaking")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{
    ENV_ADDR, ENV_DONE_POLICY, ENV_PATH, ENV_PING_SECS, ENV_WAITING_TIMEOUT_SECS, ServerConfig,
};
pub use error::PairlinkError;
pub use server::{PairlinkServer, PairlinkServerBuilder};

/// Everything needed to run a server or drive the engine directly.
pub mod prelude {
    pub use crate::{PairlinkError, PairlinkServer, PairlinkServerBuilder, ServerConfig};
    pub use pairlink_pairing::{DonePolicy, Matchmaker, PairingConfig, PairingError};
    pub use pairlink_protocol::{Codec, GO_FIRST, JsonCodec, Message, MessageKind};
    pub use pairlink_transport::{ConnectionId, TransportError};
}
