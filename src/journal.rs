//! Component E — transaction journal & reorg (`spec.md` §4.E, §4.H).
//!
//! The journal is the only legal interleaving driver: it tracks each
//! transaction's state (`absent -> pending -> confirmed -> pending -> ...
//! -> erased`) and rejects transitions `spec.md` §4.H marks illegal
//! (`confirmed -> erased` without an intervening `Unconfirm`).

use crate::error::Error;
use crate::types::Txid;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxState {
    Absent,
    Pending,
    Confirmed(u32),
    Erased,
}

/// One journal entry per transaction the wallet has ever seen, in the
/// order chain/mempool events arrived (`spec.md` §3 "Journal").
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub txid: Txid,
    pub state: TxState,
}

#[derive(Default)]
pub struct Journal {
    entries: HashMap<Txid, JournalEntry>,
    /// Arrival order, used by `revertTo` to unconfirm in reverse order
    /// (`spec.md` §4.E).
    order: Vec<Txid>,
}

/// What the caller must actually do in response to a requested transition:
/// which delta kind to apply. Returned instead of applied here, because
/// `journal.rs` has no access to the ownership view the delta math needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    InsertPending,
    Confirm(u32),
    Unconfirm,
    Erase,
    /// `absent -> confirmed` direct block-insert: both InsertPending and
    /// Confirm apply atomically (`spec.md` §4.H).
    ConfirmedInsert(u32),
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, txid: &Txid) -> TxState {
        self.entries
            .get(txid)
            .map(|e| e.state)
            .unwrap_or(TxState::Absent)
    }

    pub fn contains(&self, txid: &Txid) -> bool {
        self.entries.contains_key(txid)
    }

    /// Validates and records an `InsertPending` request; returns the
    /// transition the caller must apply. `absent -> pending` is the only
    /// legal source state; re-inserting an erased tx is allowed (`spec.md`
    /// §4.H "Terminal states: erased (can be re-inserted)").
    pub fn request_insert_pending(&mut self, txid: Txid) -> Result<Transition, Error> {
        match self.state(&txid) {
            TxState::Absent | TxState::Erased => {
                self.set(txid, TxState::Pending);
                Ok(Transition::InsertPending)
            }
            other => Err(Error::IllegalTransition {
                txid,
                reason: format!("insert-pending from state {other:?}"),
            }),
        }
    }

    /// Validates a `Confirm(height)` request. From `Pending` this is a
    /// plain Confirm; from `Absent`/`Erased` it's the `ConfirmedInsert`
    /// special case (`spec.md` §4.D).
    pub fn request_confirm(&mut self, txid: Txid, height: u32) -> Result<Transition, Error> {
        match self.state(&txid) {
            TxState::Pending => {
                self.set(txid, TxState::Confirmed(height));
                Ok(Transition::Confirm(height))
            }
            TxState::Absent | TxState::Erased => {
                self.set(txid, TxState::Confirmed(height));
                Ok(Transition::ConfirmedInsert(height))
            }
            TxState::Confirmed(h) if h == height => {
                // re-confirming at the same height is a no-op delta but a
                // legal, idempotent request (e.g. a duplicate rescan hit).
                Ok(Transition::Confirm(height))
            }
            TxState::Confirmed(_) => Err(Error::IllegalTransition {
                txid,
                reason: "confirm of an already-confirmed tx at a different height".into(),
            }),
        }
    }

    /// Validates an `Unconfirm` request: only legal from `Confirmed`.
    pub fn request_unconfirm(&mut self, txid: Txid) -> Result<Transition, Error> {
        match self.state(&txid) {
            TxState::Confirmed(_) => {
                self.set(txid, TxState::Pending);
                Ok(Transition::Unconfirm)
            }
            other => Err(Error::IllegalTransition {
                txid,
                reason: format!("unconfirm from state {other:?}"),
            }),
        }
    }

    /// Validates an `Erase` request. `confirmed -> erased` is ILLEGAL
    /// (`spec.md` §4.H): callers must `Unconfirm` first.
    pub fn request_erase(&mut self, txid: Txid) -> Result<Transition, Error> {
        match self.state(&txid) {
            TxState::Pending => {
                self.set(txid, TxState::Erased);
                Ok(Transition::Erase)
            }
            other => Err(Error::IllegalTransition {
                txid,
                reason: format!("erase from state {other:?}, confirmed txs must unconfirm first"),
            }),
        }
    }

    fn set(&mut self, txid: Txid, state: TxState) {
        if !self.entries.contains_key(&txid) {
            self.order.push(txid);
        }
        self.entries
            .entry(txid)
            .and_modify(|e| e.state = state)
            .or_insert(JournalEntry { txid, state });
    }

    /// `revertTo(height)` (`spec.md` §4.E): every tx confirmed above
    /// `height`, in reverse arrival order, needs an `Unconfirm`. Returns
    /// the txids to unconfirm; the engine drives the actual delta
    /// application and credit-store update per txid.
    pub fn txs_to_revert(&self, height: u32) -> Vec<Txid> {
        let mut out: Vec<Txid> = self
            .order
            .iter()
            .rev()
            .filter(|txid| matches!(self.state(txid), TxState::Confirmed(h) if h > height))
            .copied()
            .collect();
        out.dedup();
        out
    }
}
