//! Component F — discovery engine (`spec.md` §4.F, §9 "Gap-limit /
//! discovery as state machine").
//!
//! Discovery is not a special event but a precondition applied before any
//! event whose ownership resolution would change the six-tuple
//! (`resolve` below), plus a retroactive sweep run after the address
//! book's window moves (`sweep_for_new_credits`). The retroactive sweep
//! re-evaluates every archived transaction's outputs against the *current*
//! address-book state rather than tracking an explicit owned/not-owned
//! diff per journal entry — equivalent to the diff-based algebra `spec.md`
//! §9 describes, simpler to implement at this crate's scale, and correct
//! because `AddressBook::owner_of` is a pure function of current state.

use crate::address_book::AddressBook;
use crate::balance::{OwnedInputValue, OwnedOutput, OwnershipView};
use crate::covenant::{self, CovenantClass};
use crate::credit::CreditStore;
use crate::tx::Tx;
use crate::types::{AccountId, Branch, OutPoint};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ResolvedOutput {
    pub outpoint: OutPoint,
    pub account: AccountId,
    pub branch: Branch,
    pub index: u32,
    pub covenant_class: CovenantClass,
    pub value: u64,
}

#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub outpoint: OutPoint,
    pub account: AccountId,
    pub value: u64,
    pub locked: bool,
}

/// Archive of every transaction the engine has ever been shown, owned or
/// not — needed so a later window advance can retroactively recognize an
/// output that was foreign when its transaction first arrived (`spec.md`
/// §4.F).
#[derive(Default)]
pub struct TxArchive {
    txs: HashMap<crate::types::Txid, Tx>,
}

impl TxArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tx: Tx) {
        self.txs.insert(tx.txid, tx);
    }

    pub fn get(&self, txid: &crate::types::Txid) -> Option<&Tx> {
        self.txs.get(txid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tx> {
        self.txs.values()
    }
}

/// Resolves which of `tx`'s outputs the wallet owns *right now*, against
/// the address book's current window (`spec.md` §4.D (ii)).
pub fn resolve_outputs(address_book: &AddressBook, tx: &Tx) -> Vec<ResolvedOutput> {
    let mut out = Vec::new();
    for (vout, output) in tx.outputs.iter().enumerate() {
        if let Some((account, owner)) = address_book.owner_of(&output.script_hash) {
            out.push(ResolvedOutput {
                outpoint: tx.output_outpoint(vout as u32),
                account,
                branch: owner.branch,
                index: owner.index,
                covenant_class: covenant::classify(output.covenant),
                value: output.value,
            });
        }
    }
    out
}

/// Resolves which of `tx`'s inputs the wallet owns *right now*: first by
/// looking up a previously-recorded credit at that outpoint, falling back to
/// an inline coin view attributed via the address book, else foreign
/// (`spec.md` §6 "ownership classification input"). Only when *neither* a
/// stored credit nor a coin view resolves against the address book is the
/// input treated as foreign (`spec.md` §6, `DESIGN.md` Open Question 3).
pub fn resolve_inputs(address_book: &AddressBook, credit_store: &CreditStore, tx: &Tx) -> Vec<ResolvedInput> {
    let mut out = Vec::new();
    for input in &tx.inputs {
        if let Some(credit) = credit_store.get(&input.prevout) {
            out.push(ResolvedInput {
                outpoint: input.prevout,
                account: credit.owning_account.clone(),
                value: credit.value,
                locked: credit.covenant_class.is_locked(),
            });
        } else if let Some(coin_view) = &input.coin_view {
            // No local credit (`spec.md` §9: spent-coin recovery across
            // reorgs is incomplete without a stored credit); the host's
            // inline coin view supplies the spent output's script-hash, so
            // it can still be attributed to an owning account through the
            // address book, recovering inputs a bare outpoint lookup alone
            // would miss.
            match address_book.owner_of(&coin_view.script_hash) {
                Some((account, _owner)) => out.push(ResolvedInput {
                    outpoint: input.prevout,
                    account,
                    value: coin_view.value,
                    locked: coin_view.locked,
                }),
                None => log::debug!(
                    "input {} has a coin view (value {}) but its script-hash is foreign; treated as foreign",
                    input.prevout,
                    coin_view.value
                ),
            }
        }
    }
    out
}

/// Groups resolved outputs/inputs per touched account, plus the merged
/// wallet-scope view (`spec.md` §3 invariant B2: wallet scope is not a
/// naive sum of accounts for `tx`, handled by the caller applying a
/// delta function once per scope — see `engine.rs`).
pub fn group_by_scope(
    outputs: &[ResolvedOutput],
    inputs: &[ResolvedInput],
) -> (HashMap<AccountId, OwnershipView>, OwnershipView) {
    let mut per_account: HashMap<AccountId, OwnershipView> = HashMap::new();
    let mut wallet = OwnershipView::default();

    for o in outputs {
        let entry = per_account.entry(o.account.clone()).or_default();
        let owned = OwnedOutput {
            value: o.value,
            locked: o.covenant_class.is_locked(),
        };
        entry.owned_outputs.push(owned);
        wallet.owned_outputs.push(owned);
    }
    for i in inputs {
        let entry = per_account.entry(i.account.clone()).or_default();
        let owned = OwnedInputValue {
            value: i.value,
            locked: i.locked,
        };
        entry.owned_inputs.push(owned);
        wallet.owned_inputs.push(owned);
    }

    (per_account, wallet)
}

/// Retroactive sweep (`spec.md` §4.F): after the address book's window
/// moves, find outputs in the archive that now resolve to an owner but
/// have no credit yet. Returns one `ResolvedOutput` per newly-owned
/// output, tagged with the owning transaction's id so the caller can look
/// up that transaction's current journal state to decide whether to apply
/// a retro-InsertPending alone or InsertPending+Confirm (`spec.md` §4.D
/// "Discovery interaction").
pub fn sweep_for_new_credits(
    address_book: &AddressBook,
    credit_store: &CreditStore,
    archive: &TxArchive,
) -> Vec<ResolvedOutput> {
    let mut newly_owned = Vec::new();
    for tx in archive.iter() {
        for resolved in resolve_outputs(address_book, tx) {
            if credit_store.get(&resolved.outpoint).is_none() {
                newly_owned.push(resolved);
            }
        }
    }
    newly_owned
}
