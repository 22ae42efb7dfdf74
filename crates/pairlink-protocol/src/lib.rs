//! Wire protocol for Pairlink.
//!
//! This crate defines the messages clients and the relay exchange:
//!
//! - **Types** ([`Message`], [`MessageKind`]): the `{ name, payload }`
//!   envelope and the closed vocabulary of kinds.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages become bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! The protocol layer knows nothing about connections or pairing; it only
//! knows how to name and serialize messages.
//!
//! ```text
//! Transport (bytes) → Protocol (Message) → Pairing (routing by kind)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{GO_FIRST, Message, MessageKind};
