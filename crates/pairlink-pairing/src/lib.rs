//! Matchmaking for Pairlink.
//!
//! Pairs anonymous connections two at a time, oldest waiter first, then
//! relays their session negotiation until one leaves or both report done.
//!
//! # Key types
//!
//! - [`Exchange`]: one pairing record: a lone waiter or a matched pair
//! - [`WaitingPool`]: the insertion-ordered set of all live exchanges
//! - [`Matchmaker`]: the operations that mutate the pool and emit messages
//! - [`PairingConfig`]: completion policy and optional waiter expiry
//!
//! # Concurrency
//!
//! Nothing here locks. Every [`Matchmaker`] operation takes `&mut self`, so
//! the owner decides the critical section; the server keeps one
//! `tokio::sync::Mutex<Matchmaker>` and holds it for exactly one operation.
//! Outbound messages go through unbounded channels, so no operation ever
//! waits on a slow client while the lock is held.

mod config;
mod error;
mod exchange;
mod matchmaker;
mod pool;

pub use config::{DonePolicy, PairingConfig};
pub use error::PairingError;
pub use exchange::{Exchange, ExchangeId};
pub use matchmaker::{
    AbortOutcome, Dispatched, DoneOutcome, ForwardOutcome, Matchmaker, PeerSender,
    StartOutcome,
};
pub use pool::WaitingPool;
