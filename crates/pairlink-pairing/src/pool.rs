//! The waiting pool: every live exchange, in arrival order.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use pairlink_transport::ConnectionId;

use crate::{DonePolicy, Exchange, ExchangeId, PairingError};

/// Insertion-ordered set of [`Exchange`] records.
///
/// Records live in a `BTreeMap` keyed by [`ExchangeId`]; ids increase
/// monotonically, so iteration order is arrival order and the first
/// unmatched record found is the oldest waiter.
///
/// A second map indexes each connection to the one record that references
/// it. A connection may appear in at most one record; every mutation keeps
/// the index and the records in step.
///
/// `WaitingPool` does no locking of its own. Callers hold the
/// [`Matchmaker`](crate::Matchmaker)'s lock around every read-then-write.
#[derive(Debug, Default)]
pub struct WaitingPool {
    records: BTreeMap<ExchangeId, Exchange>,
    index: HashMap<ConnectionId, ExchangeId>,
    next_id: u64,
}

impl WaitingPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a new waiting record for `first`.
    ///
    /// # Errors
    /// [`PairingError::AlreadyQueued`] if `first` is already in a record.
    /// Callers clear the handle with
    /// [`remove_all_referencing`](Self::remove_all_referencing) first, so
    /// this only fires on a bookkeeping bug.
    pub fn insert(
        &mut self,
        first: ConnectionId,
        now: Instant,
    ) -> Result<ExchangeId, PairingError> {
        if self.index.contains_key(&first) {
            return Err(PairingError::AlreadyQueued(first));
        }
        self.next_id += 1;
        let id = ExchangeId(self.next_id);
        self.records.insert(id, Exchange::new(id, first, now));
        self.index.insert(first, id);
        Ok(id)
    }

    /// Fills the empty `second` slot of a waiting record.
    ///
    /// # Errors
    /// - [`PairingError::UnknownExchange`]: `id` isn't in the pool
    /// - [`PairingError::AlreadyQueued`]: `second` is already in a record,
    ///   or the record is already matched
    pub fn match_partner(
        &mut self,
        id: ExchangeId,
        second: ConnectionId,
    ) -> Result<&Exchange, PairingError> {
        if self.index.contains_key(&second) {
            return Err(PairingError::AlreadyQueued(second));
        }
        let exchange = self
            .records
            .get_mut(&id)
            .ok_or(PairingError::UnknownExchange(id))?;
        if exchange.is_matched() {
            return Err(PairingError::AlreadyQueued(exchange.first()));
        }
        exchange.set_second(second);
        self.index.insert(second, id);
        Ok(exchange)
    }

    /// Removes every record that references `conn` in either slot.
    ///
    /// Returns the removed records, oldest first. Calling it for a handle
    /// the pool doesn't know is a no-op.
    pub fn remove_all_referencing(&mut self, conn: ConnectionId) -> Vec<Exchange> {
        self.remove_if(|exchange| exchange.involves(conn))
    }

    /// Returns the oldest record that is still waiting for a partner.
    pub fn find_unmatched(&self) -> Option<&Exchange> {
        self.records.values().find(|exchange| !exchange.is_matched())
    }

    /// Returns the record that references `conn`, if any.
    pub fn find_by_handle(&self, conn: ConnectionId) -> Option<&Exchange> {
        let id = self.index.get(&conn)?;
        self.records.get(id)
    }

    /// Counts a completion signal from `conn` on its record.
    ///
    /// Returns the record's id and done count afterwards, or `None` if
    /// `conn` isn't in the pool.
    pub fn mark_done(
        &mut self,
        conn: ConnectionId,
        policy: DonePolicy,
    ) -> Option<(ExchangeId, u8)> {
        let id = *self.index.get(&conn)?;
        let exchange = self.records.get_mut(&id)?;
        exchange.mark_done(conn, policy);
        Some((id, exchange.done_count()))
    }

    /// Removes a single record by id.
    pub fn remove(&mut self, id: ExchangeId) -> Option<Exchange> {
        let exchange = self.records.remove(&id)?;
        for conn in exchange.participants() {
            self.index.remove(&conn);
        }
        Some(exchange)
    }

    /// Removes every record whose done count has reached 2.
    pub fn remove_completed(&mut self) -> Vec<Exchange> {
        self.remove_if(Exchange::is_complete)
    }

    /// Removes every record matching `predicate`, oldest first.
    ///
    /// Remaining records keep their relative order.
    pub fn remove_if<F>(&mut self, mut predicate: F) -> Vec<Exchange>
    where
        F: FnMut(&Exchange) -> bool,
    {
        let doomed: Vec<ExchangeId> = self
            .records
            .values()
            .filter(|exchange| predicate(exchange))
            .map(Exchange::id)
            .collect();
        doomed.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    /// Returns `true` if `conn` is referenced by any record.
    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.index.contains_key(&conn)
    }

    /// Iterates over all records in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Exchange> {
        self.records.values()
    }

    /// Number of records (waiting and matched).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the pool holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records still waiting for a partner.
    pub fn waiting_count(&self) -> usize {
        self.records.values().filter(|x| !x.is_matched()).count()
    }
}

// =========================================================================
// Tests
// =========================================================================
