//! Component G — ground-truth recompute (`spec.md` §4.G, invariant I3/B3).
//!
//! `recompute_balance` derives the six-tuple for a scope directly from the
//! credit store's present-tense state, with no reference to the
//! incremental event history. Invariant I3 guarantees this is well-defined:
//! a credit's contribution depends only on `(value, covenant_class,
//! height, spent_by)`. `verify_b3` is the property check the engine runs
//! after every event when `EngineConfig::verify_invariants` is set.

use crate::balance::BalanceTuple;
use crate::credit::{Credit, CreditStore};
use crate::error::{Error, InvariantMismatch};
use crate::types::Scope;

pub fn recompute_balance(store: &CreditStore, scope: &Scope) -> BalanceTuple {
    let mut tuple = BalanceTuple::default();

    let credits: Box<dyn Iterator<Item = &Credit>> = match scope {
        Scope::Wallet(_) => Box::new(store.iter_wallet()),
        Scope::Account(id) => Box::new(store.iter_account(id)),
    };

    for credit in credits {
        if credit.is_spent() {
            continue;
        }
        tuple.coin += 1;
        let value = credit.value as i64;
        match (credit.covenant_class.is_locked(), credit.is_confirmed()) {
            (false, true) => tuple.confirmed += value,
            (false, false) => tuple.unconfirmed += value,
            (true, true) => {
                tuple.confirmed += value;
                tuple.locked_confirmed += value;
            }
            (true, false) => {
                tuple.unconfirmed += value;
                tuple.locked_unconfirmed += value;
            }
        }
    }

    tuple.tx = tx_count(store, scope);
    tuple
}

/// Counts only transactions that have actually contributed a `tx: 1` to the
/// scope's incrementally-maintained balance. A transaction archived with no
/// owned inputs/outputs at first sight (foreign until a later discovery —
/// `spec.md` §4.F) is recorded in the credit store's tx map but is not yet
/// "counted" (`WalletTx::counted`); both branches below must exclude it or
/// `recompute_balance` diverges from the incremental tuple the moment such a
/// transaction is shown to the engine.
fn tx_count(store: &CreditStore, scope: &Scope) -> i64 {
    match scope {
        Scope::Wallet(_) => store
            .tx_ids()
            .filter(|txid| store.get_tx(txid).map(|wtx| wtx.counted).unwrap_or(false))
            .count() as i64,
        Scope::Account(id) => store
            .tx_ids()
            .filter(|txid| store.touched_accounts(txid).contains(id))
            .count() as i64,
    }
}

/// Compares the incrementally-maintained tuple against the freshly
/// recomputed ground truth (`spec.md` §4.G property B3). Returns
/// `Err(InvariantViolation)` on any mismatch; callers treat this as fatal
/// and quarantine the wallet pending a full recompute.
pub fn verify_b3(
    store: &CreditStore,
    scope: &Scope,
    incremental: BalanceTuple,
) -> Result<(), Error> {
    let recomputed = recompute_balance(store, scope);
    if incremental != recomputed {
        return Err(Error::InvariantViolation(InvariantMismatch {
            scope: scope.clone(),
            incremental,
            recomputed,
        }));
    }
    Ok(())
}
