//! The pairing record: one waiter, or two matched participants.

use std::fmt;
use std::time::Instant;

use pairlink_transport::ConnectionId;

use crate::DonePolicy;

/// Identifies an exchange within a pool.
///
/// Ids are handed out in increasing order, so comparing two ids compares
/// arrival order. The pool uses that as its matching priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub(crate) u64);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X-{}", self.0)
    }
}

/// A pairing record.
///
/// ```text
///   waiting ──(partner joins)──→ matched ──(done × 2)──→ removed
///      │                            │
///      └──────(abort / close)───────┴──────────────────→ removed
/// ```
///
/// `first` never changes. `second` is set at most once. Records are only
/// mutated through [`WaitingPool`](crate::WaitingPool) so the handle index
/// stays in step.
#[derive(Debug, Clone)]
pub struct Exchange {
    id: ExchangeId,
    first: ConnectionId,
    second: Option<ConnectionId>,
    done_count: u8,
    first_done: bool,
    second_done: bool,
    created_at: Instant,
}

impl Exchange {
    pub(crate) fn new(id: ExchangeId, first: ConnectionId, now: Instant) -> Self {
        Self {
            id,
            first,
            second: None,
            done_count: 0,
            first_done: false,
            second_done: false,
            created_at: now,
        }
    }

    /// This record's id.
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    /// The participant that created the record by waiting.
    pub fn first(&self) -> ConnectionId {
        self.first
    }

    /// The participant matched later, if any.
    pub fn second(&self) -> Option<ConnectionId> {
        self.second
    }

    /// How many completion signals have been counted (0..=2).
    pub fn done_count(&self) -> u8 {
        self.done_count
    }

    /// When the waiter was queued.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Returns `true` once a partner has joined.
    pub fn is_matched(&self) -> bool {
        self.second.is_some()
    }

    /// Returns `true` when both completion signals are in.
    pub fn is_complete(&self) -> bool {
        self.done_count >= 2
    }

    /// Returns `true` if `conn` is either participant.
    pub fn involves(&self, conn: ConnectionId) -> bool {
        self.first == conn || self.second == Some(conn)
    }

    /// The participant that isn't `conn`.
    ///
    /// `None` if the record is still waiting or `conn` isn't part of it.
    pub fn other(&self, conn: ConnectionId) -> Option<ConnectionId> {
        match self.second {
            Some(second) if self.first == conn => Some(second),
            Some(second) if second == conn => Some(self.first),
            _ => None,
        }
    }

    /// Both participants, `first` first.
    pub fn participants(&self) -> impl Iterator<Item = ConnectionId> {
        std::iter::once(self.first).chain(self.second)
    }

    pub(crate) fn set_second(&mut self, conn: ConnectionId) {
        debug_assert!(self.second.is_none(), "second is set exactly once");
        self.second = Some(conn);
    }

    /// Counts a completion signal from `conn`. Returns whether it counted.
    pub(crate) fn mark_done(&mut self, conn: ConnectionId, policy: DonePolicy) -> bool {
        let counted = match policy {
            DonePolicy::PerSignal => true,
            DonePolicy::PerParticipant => {
                let flag = if conn == self.first {
                    &mut self.first_done
                } else {
                    &mut self.second_done
                };
                !std::mem::replace(flag, true)
            }
        };
        if counted {
            self.done_count = (self.done_count + 1).min(2);
        }
        counted
    }
}
