//! Component C — credit store (`spec.md` §4.C) and the `Credit` /
//! `WalletTx` data model (`spec.md` §3). Grounded in the teacher's
//! `model.rs` (`WalletTxOut`) and `store.rs` (`RawCache`, `Store::spent()`).

use crate::account::Account;
use crate::covenant::CovenantClass;
use crate::error::Error;
use crate::types::{AccountId, Branch, OutPoint, Txid};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One credit per owned transaction output (`spec.md` §3). Its six-tuple
/// contribution is determined solely by `(value, covenant_class, height,
/// spent_by)` — invariant I3 — never by event history, which is why this
/// type carries no timestamps or event log of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub outpoint: OutPoint,
    pub value: u64,
    pub owning_account: AccountId,
    pub branch: Branch,
    pub index: u32,
    pub covenant_class: CovenantClass,
    /// `None` if unspent; `Some(spending tx)` otherwise (I1: the spending
    /// tx must be present in the journal whenever this is set).
    pub spent_by: Option<Txid>,
    /// `-1`-equivalent pending marker is `None`; `Some(h)` means confirmed
    /// at height `h` (I2).
    pub height: Option<u32>,
    pub coinbase: bool,
}

impl Credit {
    pub fn is_spent(&self) -> bool {
        self.spent_by.is_some()
    }

    pub fn is_confirmed(&self) -> bool {
        self.height.is_some()
    }
}

/// A transaction as recorded in the store: which of its inputs/outputs the
/// wallet owns, resolved at ingress time (`spec.md` §3 "Transaction
/// record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTx {
    pub txid: Txid,
    pub height: Option<u32>,
    /// Owned inputs: `(outpoint spent, value, owning account, locked?)`.
    pub owned_inputs: Vec<OwnedInput>,
    /// Owned outputs: outpoints into the credit store that belong to this
    /// tx.
    pub owned_outputs: Vec<OutPoint>,
    /// Host-supplied arrival time (unix seconds), used only by `zap` to
    /// evict stale pending transactions (`spec.md` §4.G). The engine never
    /// reads the system clock itself so that replaying the same events
    /// twice produces identical state.
    pub inserted_at: u64,
    /// Whether this transaction has already contributed a `tx: 1` to the
    /// scopes it touches. A transaction the host shows the engine with no
    /// owned inputs or outputs yet (foreign at first sight) is archived
    /// and journaled but not counted; the first discovery that attaches an
    /// owned output to it counts it exactly once (`spec.md` §4.F, §9
    /// "Retroactive delta algebra").
    pub counted: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OwnedInput {
    pub outpoint: OutPoint,
    pub value: u64,
    pub owning_account: AccountIdSlot,
    pub locked: bool,
}

/// A lightweight handle standing in for `AccountId` inside the small
/// `Copy` structs above — keeps `OwnedInput` cheap to pass around the delta
/// math in `balance.rs` without cloning a `String` per input.
pub type AccountIdSlot = u32;

/// Per-wallet credit store: one set of credits (one per owned output),
/// with flags `{spent, pending, confirmed, coinbase, covenant-locked}`
/// (`spec.md` §4.C). All operations are atomic with respect to balance
/// updates — in this crate that means callers (the journal/dispatcher in
/// `engine.rs`) invoke them from inside the single per-wallet write lock,
/// mirroring the teacher's `Store` being owned exclusively by its
/// `ElectrumWallet`.
#[derive(Default)]
pub struct CreditStore {
    credits: HashMap<OutPoint, Credit>,
    /// txid -> the record the journal uses to drive reorg replay.
    txs: HashMap<Txid, WalletTx>,
    /// account slot interner, so `OwnedInput` can stay `Copy`.
    account_slots: Vec<AccountId>,
}

impl CreditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_slot(&mut self, id: &AccountId) -> AccountIdSlot {
        if let Some(pos) = self.account_slots.iter().position(|a| a == id) {
            return pos as u32;
        }
        self.account_slots.push(id.clone());
        (self.account_slots.len() - 1) as u32
    }

    pub fn account_for_slot(&self, slot: AccountIdSlot) -> &AccountId {
        &self.account_slots[slot as usize]
    }

    pub fn insert(&mut self, credit: Credit) {
        self.credits.insert(credit.outpoint, credit);
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&Credit> {
        self.credits.get(outpoint)
    }

    pub fn mark_spent(&mut self, outpoint: OutPoint, by_tx: Txid) -> Result<(), Error> {
        let credit = self
            .credits
            .get_mut(&outpoint)
            .ok_or(Error::UnknownOutpoint(outpoint))?;
        credit.spent_by = Some(by_tx);
        Ok(())
    }

    pub fn mark_unspent(&mut self, outpoint: OutPoint) -> Result<(), Error> {
        let credit = self
            .credits
            .get_mut(&outpoint)
            .ok_or(Error::UnknownOutpoint(outpoint))?;
        credit.spent_by = None;
        Ok(())
    }

    pub fn set_height(&mut self, outpoint: OutPoint, height: Option<u32>) -> Result<(), Error> {
        let credit = self
            .credits
            .get_mut(&outpoint)
            .ok_or(Error::UnknownOutpoint(outpoint))?;
        credit.height = height;
        Ok(())
    }

    pub fn remove(&mut self, outpoint: &OutPoint) -> Option<Credit> {
        self.credits.remove(outpoint)
    }

    pub fn put_tx(&mut self, tx: WalletTx) {
        self.txs.insert(tx.txid, tx);
    }

    pub fn get_tx(&self, txid: &Txid) -> Option<&WalletTx> {
        self.txs.get(txid)
    }

    pub fn remove_tx(&mut self, txid: &Txid) -> Option<WalletTx> {
        self.txs.remove(txid)
    }

    pub fn tx_ids(&self) -> impl Iterator<Item = &Txid> {
        self.txs.keys()
    }

    /// All credits belonging to `account`, mirroring the teacher's
    /// `Store::spent()`/`utxos()` style of iterating the whole cache.
    pub fn iter_account<'a>(
        &'a self,
        account: &'a AccountId,
    ) -> impl Iterator<Item = &'a Credit> + 'a {
        self.credits
            .values()
            .filter(move |c| &c.owning_account == account)
    }

    pub fn iter_wallet(&self) -> impl Iterator<Item = &Credit> {
        self.credits.values()
    }

    /// Which accounts a transaction touches, from the owned credits it
    /// created (used by the wallet-scope `tx` dedup rule, invariant B2).
    pub fn touched_accounts(&self, txid: &Txid) -> HashSet<AccountId> {
        let mut set = HashSet::new();
        if let Some(tx) = self.txs.get(txid) {
            for outpoint in &tx.owned_outputs {
                if let Some(c) = self.credits.get(outpoint) {
                    set.insert(c.owning_account.clone());
                }
            }
            for input in &tx.owned_inputs {
                set.insert(self.account_for_slot(input.owning_account).clone());
            }
        }
        set
    }

    /// Serializable snapshot of every credit and journal-backing transaction
    /// record currently held, for the persistence contract of `spec.md` §6
    /// ("any record is reconstructible from the chain + account seeds via
    /// `rescan`" — this is the other half: what a host persists between
    /// runs so it doesn't have to rescan from genesis every time).
    pub fn snapshot(&self) -> CreditStoreSnapshot {
        CreditStoreSnapshot {
            credits: self.credits.values().cloned().collect(),
            txs: self.txs.values().cloned().collect(),
        }
    }
}

/// A point-in-time, `serde`-serializable view of a [`CreditStore`]
/// (`spec.md` §6 "persistence layout"). Plain data, no behavior — a host
/// writes this out verbatim and rebuilds a `CreditStore` from it (by
/// `insert`/`put_tx` in a loop) rather than the engine owning any wire
/// format itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditStoreSnapshot {
    pub credits: Vec<Credit>,
    pub txs: Vec<WalletTx>,
}

/// Serializable ground-truth view of one account's credits, used by the
/// rescan/recompute engine (`spec.md` §4.G) and by the persistence
/// snapshot contract (`spec.md` §6).
pub fn account_credits<'a>(
    store: &'a CreditStore,
    account: &'a Account,
) -> impl Iterator<Item = &'a Credit> + 'a {
    store.iter_account(&account.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covenant::CovenantClass;

    fn credit(vout: u32, value: u64) -> Credit {
        Credit {
            outpoint: OutPoint::new(Txid([1; 32]), vout),
            value,
            owning_account: AccountId::new("w", "default"),
            branch: Branch::Receive,
            index: 0,
            covenant_class: CovenantClass::None,
            spent_by: None,
            height: None,
            coinbase: false,
        }
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let mut store = CreditStore::new();
        let c = credit(0, 1_000);
        let op = c.outpoint;
        store.insert(c.clone());
        assert_eq!(store.get(&op), Some(&c));
    }

    #[test]
    fn mark_spent_and_unspent_toggle_is_spent() {
        let mut store = CreditStore::new();
        let c = credit(0, 1_000);
        let op = c.outpoint;
        store.insert(c);

        store.mark_spent(op, Txid([2; 32])).unwrap();
        assert!(store.get(&op).unwrap().is_spent());

        store.mark_unspent(op).unwrap();
        assert!(!store.get(&op).unwrap().is_spent());
    }

    #[test]
    fn mark_spent_on_unknown_outpoint_errors() {
        let mut store = CreditStore::new();
        let err = store.mark_spent(OutPoint::new(Txid([9; 32]), 0), Txid([2; 32]));
        assert!(matches!(err, Err(Error::UnknownOutpoint(_))));
    }

    #[test]
    fn account_slots_are_stable() {
        let mut store = CreditStore::new();
        let id = AccountId::new("w", "default");
        let s1 = store.account_slot(&id);
        let s2 = store.account_slot(&id);
        assert_eq!(s1, s2);
        assert_eq!(store.account_for_slot(s1), &id);
    }
}
