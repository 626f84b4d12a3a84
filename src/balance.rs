//! Component D — balance deltas, the heart of the engine (`spec.md` §4.D).
//!
//! Pure functions: given which inputs/outputs of a transaction the wallet
//! owns *now*, each owned output's covenant class and value, and (for
//! confirm/unconfirm) the prior height, compute the six-tuple delta to
//! apply to every touched scope. No function here touches the credit
//! store or the journal directly — `engine.rs` is the only caller, and it
//! applies the deltas this module returns.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub};

/// The balance six-tuple (`spec.md` §3): `(tx, coin, confirmed,
/// unconfirmed, lockedConfirmed, lockedUnconfirmed)` per wallet or account
/// scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceTuple {
    pub tx: i64,
    pub coin: i64,
    pub confirmed: i64,
    pub unconfirmed: i64,
    pub locked_confirmed: i64,
    pub locked_unconfirmed: i64,
}

impl BalanceTuple {
    /// Invariant B1 (containment): `lockedConfirmed <= confirmed` and
    /// `lockedUnconfirmed <= unconfirmed`.
    pub fn check_containment(&self) -> bool {
        self.locked_confirmed <= self.confirmed && self.locked_unconfirmed <= self.unconfirmed
    }
}

impl Add for BalanceTuple {
    type Output = BalanceTuple;
    fn add(self, rhs: Self) -> Self::Output {
        BalanceTuple {
            tx: self.tx + rhs.tx,
            coin: self.coin + rhs.coin,
            confirmed: self.confirmed + rhs.confirmed,
            unconfirmed: self.unconfirmed + rhs.unconfirmed,
            locked_confirmed: self.locked_confirmed + rhs.locked_confirmed,
            locked_unconfirmed: self.locked_unconfirmed + rhs.locked_unconfirmed,
        }
    }
}

impl AddAssign for BalanceTuple {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for BalanceTuple {
    type Output = BalanceTuple;
    fn sub(self, rhs: Self) -> Self::Output {
        BalanceTuple {
            tx: self.tx - rhs.tx,
            coin: self.coin - rhs.coin,
            confirmed: self.confirmed - rhs.confirmed,
            unconfirmed: self.unconfirmed - rhs.unconfirmed,
            locked_confirmed: self.locked_confirmed - rhs.locked_confirmed,
            locked_unconfirmed: self.locked_unconfirmed - rhs.locked_unconfirmed,
        }
    }
}

/// The inverse of a delta: negate every field. Used to make Unconfirm the
/// exact inverse of the matching Confirm, and Erase the exact inverse of
/// InsertPending (invariant D1).
pub fn invert(delta: BalanceTuple) -> BalanceTuple {
    BalanceTuple::default() - delta
}

/// One owned output's contribution, as seen by the delta functions below.
#[derive(Debug, Clone, Copy)]
pub struct OwnedOutput {
    pub value: u64,
    pub locked: bool,
}

/// One owned input's contribution (the value being spent).
#[derive(Debug, Clone, Copy)]
pub struct OwnedInputValue {
    pub value: u64,
    pub locked: bool,
}

/// The resolved ownership view of a transaction for one scope, computed by
/// the address book/discovery engine before any delta is applied
/// (`spec.md` §4.D (i)-(iii)).
#[derive(Debug, Clone, Default)]
pub struct OwnershipView {
    pub owned_inputs: Vec<OwnedInputValue>,
    pub owned_outputs: Vec<OwnedOutput>,
}

impl OwnershipView {
    fn sum_in(&self) -> i64 {
        self.owned_inputs.iter().map(|i| i.value as i64).sum()
    }

    fn sum_in_locked(&self) -> i64 {
        self.owned_inputs
            .iter()
            .filter(|i| i.locked)
            .map(|i| i.value as i64)
            .sum()
    }

    fn sum_out(&self) -> i64 {
        self.owned_outputs.iter().map(|o| o.value as i64).sum()
    }

    fn sum_out_locked(&self) -> i64 {
        self.owned_outputs
            .iter()
            .filter(|o| o.locked)
            .map(|o| o.value as i64)
            .sum()
    }

    fn owned_output_count(&self) -> i64 {
        self.owned_outputs.len() as i64
    }

    fn owned_input_count(&self) -> i64 {
        self.owned_inputs.len() as i64
    }
}

/// **InsertPending** (`spec.md` §4.D): a transaction enters the
/// mempool-level view for the first time. Confirmed columns are
/// untouched.
pub fn insert_pending_delta(view: &OwnershipView) -> BalanceTuple {
    BalanceTuple {
        tx: 1,
        coin: view.owned_output_count() - view.owned_input_count(),
        confirmed: 0,
        unconfirmed: view.sum_out() - view.sum_in(),
        locked_confirmed: 0,
        locked_unconfirmed: view.sum_out_locked() - view.sum_in_locked(),
    }
}

/// **Confirm(height)** for a tx that was already pending (`spec.md` §4.D):
/// the same delta that was applied to `{unconfirmed, ulocked}` at insert
/// time is mirrored onto `{confirmed, clocked}`; `tx`/`coin` don't move
/// again.
pub fn confirm_delta(view: &OwnershipView) -> BalanceTuple {
    BalanceTuple {
        tx: 0,
        coin: 0,
        confirmed: view.sum_out() - view.sum_in(),
        unconfirmed: 0,
        locked_confirmed: view.sum_out_locked() - view.sum_in_locked(),
        locked_unconfirmed: 0,
    }
}

/// **Confirmed-insert** (`spec.md` §4.D special case): a tx arrives
/// directly as part of a block, with no prior pending state. Applies both
/// the InsertPending and the Confirm delta atomically.
pub fn confirmed_insert_delta(view: &OwnershipView) -> BalanceTuple {
    insert_pending_delta(view) + confirm_delta(view)
}

/// **Unconfirm**: the exact inverse of the most recent Confirm of this tx
/// (`spec.md` §4.D). Credits remain present with `height = None`; `tx`
/// count is unchanged.
pub fn unconfirm_delta(view: &OwnershipView) -> BalanceTuple {
    invert(confirm_delta(view))
}

/// **Erase**: the exact inverse of InsertPending (`spec.md` §4.D). Only
/// legal while the tx is pending (enforced by `journal.rs`).
pub fn erase_delta(view: &OwnershipView) -> BalanceTuple {
    invert(insert_pending_delta(view))
}
