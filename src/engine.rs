//! Component H — the engine dispatcher (`spec.md` §4.H, §7).
//!
//! `Engine` is one wallet: it owns the address book, the credit store, the
//! journal, the raw-tx archive discovery needs, and a balance cache per
//! scope. All of that lives behind a single `RwLock` (mutations take the
//! write side, `get_balance` the read side) — grounded on the teacher's
//! `Arc<Mutex<State>>` wrapping its in-memory wallet state in
//! `lwk_app/src/lib.rs`. Every public method here is a complete event:
//! either it fully applies (journal, credits, and balance cache all move
//! together) or it returns before mutating anything (`spec.md` §7
//! "atomicity").
//!
//! Distinct `Engine`s (distinct wallets) share nothing and may run
//! concurrently; within one `Engine`, writes serialize on the lock exactly
//! as `spec.md` §5's concurrency model requires.

use crate::account::Account;
use crate::address_book::{AddressBook, AddressDeriver, DerivedAddress};
use crate::balance::{
    confirm_delta, confirmed_insert_delta, erase_delta, insert_pending_delta, unconfirm_delta,
    BalanceTuple, OwnedInputValue, OwnedOutput, OwnershipView,
};
use crate::config::EngineConfig;
use crate::credit::{Credit, CreditStore, CreditStoreSnapshot, OwnedInput, WalletTx};
use crate::discovery::{self, ResolvedOutput, TxArchive};
use crate::error::Error;
use crate::journal::{Journal, Transition, TxState};
use crate::rescan;
use crate::tx::Tx;
use crate::types::{AccountId, Branch, Scope, Txid};
use std::collections::HashMap;
use std::sync::RwLock;

struct EngineState {
    address_book: AddressBook,
    credits: CreditStore,
    journal: Journal,
    archive: TxArchive,
    balances: HashMap<Scope, BalanceTuple>,
}

/// A point-in-time, `serde`-serializable view of one [`Engine`] (one
/// wallet), returned by [`Engine::snapshot`] (`spec.md` §6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineSnapshot {
    pub wallet_id: String,
    pub accounts: Vec<Account>,
    pub credits: CreditStoreSnapshot,
    pub balances: Vec<(Scope, BalanceTuple)>,
}

pub struct Engine {
    wallet_id: String,
    config: EngineConfig,
    state: RwLock<EngineState>,
}

impl Engine {
    pub fn new(wallet_id: impl Into<String>, deriver: Box<dyn AddressDeriver>, config: EngineConfig) -> Self {
        let wallet_id = wallet_id.into();
        let mut balances = HashMap::new();
        balances.insert(Scope::Wallet(wallet_id.clone()), BalanceTuple::default());
        Self {
            wallet_id,
            config,
            state: RwLock::new(EngineState {
                address_book: AddressBook::new(deriver),
                credits: CreditStore::new(),
                journal: Journal::new(),
                archive: TxArchive::new(),
                balances,
            }),
        }
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, EngineState> {
        self.state.write().expect("engine lock poisoned")
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, EngineState> {
        self.state.read().expect("engine lock poisoned")
    }

    pub fn create_account(&self, account_name: &str) -> Result<AccountId, Error> {
        let mut state = self.lock_write();
        let id = AccountId::new(self.wallet_id.clone(), account_name);
        state
            .address_book
            .create_account(id.clone(), self.config.default_lookahead)?;
        state.balances.entry(Scope::Account(id.clone())).or_default();
        Ok(id)
    }

    pub fn account(&self, account_id: &AccountId) -> Result<Account, Error> {
        Ok(self.lock_read().address_book.account(account_id)?.clone())
    }

    /// Hands out the next unused receive address. Does not advance
    /// `receiveDepth` — depth only moves once the chain shows the address
    /// was actually paid (`spec.md` §3 "lookahead").
    pub fn create_receive(&self, account_id: &AccountId) -> Result<DerivedAddress, Error> {
        let mut state = self.lock_write();
        let account = state.address_book.account(account_id)?.clone();
        let index = account.receive_depth;
        state
            .address_book
            .ensure_index(account_id, Branch::Receive, index)?;
        state.address_book.address_at(account_id, Branch::Receive, index)
    }

    pub fn get_balance(&self, scope: Scope) -> BalanceTuple {
        self.lock_read().balances.get(&scope).copied().unwrap_or_default()
    }

    /// Serializable snapshot of this wallet's full state (`spec.md` §6
    /// "persistence layout"): account metadata, every credit/tx record, and
    /// the cached six-tuple per scope. A host persists this between runs
    /// instead of replaying `rescan` from genesis on every restart, and can
    /// reuse it verbatim for the user-facing notification `spec.md` §4.H
    /// describes — the engine does not know or care about the wire format
    /// that ends up wrapping it.
    pub fn snapshot(&self) -> EngineSnapshot {
        let state = self.lock_read();
        EngineSnapshot {
            wallet_id: self.wallet_id.clone(),
            accounts: state.address_book.accounts().cloned().collect(),
            credits: state.credits.snapshot(),
            balances: state.balances.iter().map(|(scope, tuple)| (scope.clone(), *tuple)).collect(),
        }
    }

    /// `InsertPending` (`spec.md` §4.D/§4.H): a new mempool-level
    /// transaction.
    pub fn on_insert_pending(&self, tx: Tx, now: u64) -> Result<(), Error> {
        let mut state = self.lock_write();
        let txid = tx.txid;
        state.journal.request_insert_pending(txid)?;

        let (resolved_outputs, resolved_inputs) = self.ingest_ownership(&mut state, &tx);
        Self::materialize_credits(&mut state, &tx, &resolved_outputs, None);
        for input in &resolved_inputs {
            let _ = state.credits.mark_spent(input.outpoint, txid);
        }
        let counted = !(resolved_outputs.is_empty() && resolved_inputs.is_empty());
        let wtx = Self::build_wallet_tx(
            &mut state,
            &tx,
            &resolved_outputs,
            &resolved_inputs,
            None,
            now,
            counted,
        );
        state.credits.put_tx(wtx);

        if counted {
            let (per_account, wallet_view) = discovery::group_by_scope(&resolved_outputs, &resolved_inputs);
            Self::apply_deltas(&mut state, &per_account, &wallet_view, &self.wallet_id, insert_pending_delta);
        }

        self.run_retro_sweep(&mut state)?;
        self.maybe_verify_all(&state)?;
        Ok(())
    }

    /// `Confirm(height)` (`spec.md` §4.D/§4.H): a transaction enters a
    /// block. Handles both the ordinary case (already pending) and the
    /// `ConfirmedInsert` special case (never seen before).
    pub fn on_confirm(&self, tx: Tx, height: u32, now: u64) -> Result<(), Error> {
        let mut state = self.lock_write();
        let txid = tx.txid;
        let was_confirmed_same_height =
            matches!(state.journal.state(&txid), TxState::Confirmed(h) if h == height);
        let transition = state.journal.request_confirm(txid, height)?;

        match transition {
            Transition::ConfirmedInsert(h) => {
                let (resolved_outputs, resolved_inputs) = self.ingest_ownership(&mut state, &tx);
                Self::materialize_credits(&mut state, &tx, &resolved_outputs, Some(h));
                for input in &resolved_inputs {
                    let _ = state.credits.mark_spent(input.outpoint, txid);
                }
                let counted = !(resolved_outputs.is_empty() && resolved_inputs.is_empty());
                let wtx = Self::build_wallet_tx(
                    &mut state,
                    &tx,
                    &resolved_outputs,
                    &resolved_inputs,
                    Some(h),
                    now,
                    counted,
                );
                state.credits.put_tx(wtx);

                if counted {
                    let (per_account, wallet_view) =
                        discovery::group_by_scope(&resolved_outputs, &resolved_inputs);
                    Self::apply_deltas(
                        &mut state,
                        &per_account,
                        &wallet_view,
                        &self.wallet_id,
                        confirmed_insert_delta,
                    );
                }
            }
            Transition::Confirm(h) if !was_confirmed_same_height => {
                let wtx = state
                    .credits
                    .get_tx(&txid)
                    .cloned()
                    .ok_or(Error::UnknownTransaction(txid))?;
                let (per_account, wallet_view) = Self::views_for_wallet_tx(&state.credits, &wtx);
                Self::apply_deltas(&mut state, &per_account, &wallet_view, &self.wallet_id, confirm_delta);
                for outpoint in &wtx.owned_outputs {
                    let _ = state.credits.set_height(*outpoint, Some(h));
                }
                let mut wtx = wtx;
                wtx.height = Some(h);
                state.credits.put_tx(wtx);
            }
            Transition::Confirm(_) => {
                // idempotent re-confirmation at the height it already has;
                // no balance movement.
            }
            Transition::InsertPending | Transition::Unconfirm | Transition::Erase => {
                unreachable!("Journal::request_confirm never returns this variant")
            }
        }

        self.run_retro_sweep(&mut state)?;
        self.maybe_verify_all(&state)?;
        Ok(())
    }

    /// `Unconfirm` (`spec.md` §4.D/§4.H): a confirmed tx falls back to
    /// pending, e.g. a small reorg that doesn't drop it from the mempool.
    pub fn on_unconfirm(&self, txid: Txid) -> Result<(), Error> {
        let mut state = self.lock_write();
        self.unconfirm_locked(&mut state, txid)?;
        self.maybe_verify_all(&state)?;
        Ok(())
    }

    /// `Erase` (`spec.md` §4.D/§4.H): drops a pending transaction
    /// entirely. Illegal while confirmed — `Journal::request_erase`
    /// rejects that before any state here is touched.
    pub fn on_erase(&self, txid: Txid) -> Result<(), Error> {
        let mut state = self.lock_write();
        self.erase_locked(&mut state, txid)?;
        self.maybe_verify_all(&state)?;
        Ok(())
    }

    /// `revertTo(height)` (`spec.md` §4.E): unconfirms every transaction
    /// confirmed above `height`, in reverse arrival order.
    pub fn revert_to(&self, height: u32) -> Result<(), Error> {
        let mut state = self.lock_write();
        let txids = state.journal.txs_to_revert(height);
        for txid in txids {
            self.unconfirm_locked(&mut state, txid)?;
        }
        self.maybe_verify_all(&state)?;
        Ok(())
    }

    /// `rescan(fromHeight)` (`spec.md` §4.G): rolls back confirmed state
    /// above `fromHeight`. The host is the chain-replay driver — it is
    /// expected to re-deliver every `Confirm`/`InsertPending` event from
    /// `fromHeight` onward through the normal API after this returns, the
    /// same way `revertTo` leaves replay to its caller.
    pub fn rescan(&self, from_height: u32) -> Result<(), Error> {
        self.revert_to(from_height)?;
        log::info!("rescan: reverted confirmed state above height {from_height}");
        Ok(())
    }

    /// Ground-truth recompute for every known scope (`spec.md` §4.G,
    /// property B3). Used to resync the balance cache after an
    /// `InvariantViolation`, or any time the host just wants a clean
    /// recompute.
    pub fn recalculate_balances(&self) -> Result<(), Error> {
        let mut state = self.lock_write();
        let wallet_scope = Scope::Wallet(self.wallet_id.clone());
        let tuple = rescan::recompute_balance(&state.credits, &wallet_scope);
        state.balances.insert(wallet_scope, tuple);

        let account_ids: Vec<AccountId> = state.address_book.accounts().map(|a| a.id.clone()).collect();
        for id in account_ids {
            let scope = Scope::Account(id);
            let tuple = rescan::recompute_balance(&state.credits, &scope);
            state.balances.insert(scope, tuple);
        }
        Ok(())
    }

    /// Explicit discovery (`spec.md` §4.F): pushes `account`'s receive and
    /// change depth forward by `ahead` and sweeps the archive for
    /// newly-recognized outputs. Unlike the implicit per-event advance,
    /// `LookaheadExhausted` here is reported to the caller rather than
    /// swallowed, since the caller asked for this specific advance.
    pub fn discover(&self, account_id: &AccountId, ahead: u32) -> Result<(), Error> {
        let mut state = self.lock_write();
        let account = state.address_book.account(account_id)?.clone();
        let receive_target = account.receive_depth + ahead;
        let change_target = account.change_depth + ahead;
        state.address_book.advance_depth(
            account_id,
            Branch::Receive,
            receive_target.saturating_sub(1),
            self.config.lookahead_ceiling,
        )?;
        state.address_book.advance_depth(
            account_id,
            Branch::Change,
            change_target.saturating_sub(1),
            self.config.lookahead_ceiling,
        )?;
        self.run_retro_sweep(&mut state)?;
        self.maybe_verify_all(&state)?;
        Ok(())
    }

    /// Evicts stale pending transactions touching `account` older than
    /// `max_age_seconds` as of `now` (`spec.md` §4.G "zap"). Confirmed
    /// transactions are never zapped.
    pub fn zap(&self, account_id: &AccountId, now: u64, max_age_seconds: u64) -> Result<(), Error> {
        let mut state = self.lock_write();
        let stale: Vec<Txid> = state
            .credits
            .tx_ids()
            .filter(|txid| {
                matches!(state.journal.state(txid), TxState::Pending)
                    && state.credits.touched_accounts(txid).contains(account_id)
                    && state
                        .credits
                        .get_tx(txid)
                        .map(|wtx| now.saturating_sub(wtx.inserted_at) >= max_age_seconds)
                        .unwrap_or(false)
            })
            .copied()
            .collect::<Vec<Txid>>();

        for txid in stale {
            self.erase_locked(&mut state, txid)?;
        }
        self.maybe_verify_all(&state)?;
        Ok(())
    }

    // --- internals -------------------------------------------------------

    fn ingest_ownership(
        &self,
        state: &mut EngineState,
        tx: &Tx,
    ) -> (Vec<ResolvedOutput>, Vec<discovery::ResolvedInput>) {
        state.archive.record(tx.clone());
        let resolved_outputs = discovery::resolve_outputs(&state.address_book, tx);
        let resolved_inputs = discovery::resolve_inputs(&state.address_book, &state.credits, tx);

        for output in &resolved_outputs {
            // advanceDepth failure is non-fatal here: the output already
            // resolved against the *current* window, so the credit is
            // valid regardless of whether the window gets to grow further
            // (`spec.md` §7, `Error::LookaheadExhausted` doc comment).
            if let Err(err) = state.address_book.advance_depth(
                &output.account,
                output.branch,
                output.index,
                self.config.lookahead_ceiling,
            ) {
                log::warn!("advance_depth capped for {}: {err}", output.account);
            }
        }
        (resolved_outputs, resolved_inputs)
    }

    fn materialize_credits(
        state: &mut EngineState,
        tx: &Tx,
        resolved_outputs: &[ResolvedOutput],
        height: Option<u32>,
    ) {
        for output in resolved_outputs {
            state.credits.insert(Credit {
                outpoint: output.outpoint,
                value: output.value,
                owning_account: output.account.clone(),
                branch: output.branch,
                index: output.index,
                covenant_class: output.covenant_class,
                spent_by: None,
                height,
                coinbase: tx.coinbase,
            });
        }
    }

    fn build_wallet_tx(
        state: &mut EngineState,
        tx: &Tx,
        resolved_outputs: &[ResolvedOutput],
        resolved_inputs: &[discovery::ResolvedInput],
        height: Option<u32>,
        now: u64,
        counted: bool,
    ) -> WalletTx {
        let owned_inputs: Vec<OwnedInput> = resolved_inputs
            .iter()
            .map(|input| OwnedInput {
                outpoint: input.outpoint,
                value: input.value,
                owning_account: state.credits.account_slot(&input.account),
                locked: input.locked,
            })
            .collect();
        WalletTx {
            txid: tx.txid,
            height,
            owned_inputs,
            owned_outputs: resolved_outputs.iter().map(|o| o.outpoint).collect(),
            inserted_at: now,
            counted,
        }
    }

    /// Rebuilds the per-account and merged wallet-scope ownership views a
    /// previously-recorded `WalletTx` contributes, read back from the
    /// credit store's current state (e.g. the covenant-derived `locked`
    /// flag). Used by Confirm/Unconfirm/Erase, which must replay the
    /// *original* resolution rather than re-resolving against the address
    /// book (that is `run_retro_sweep`'s job).
    fn views_for_wallet_tx(
        store: &CreditStore,
        wtx: &WalletTx,
    ) -> (HashMap<AccountId, OwnershipView>, OwnershipView) {
        let mut per_account: HashMap<AccountId, OwnershipView> = HashMap::new();
        let mut wallet = OwnershipView::default();

        for outpoint in &wtx.owned_outputs {
            if let Some(credit) = store.get(outpoint) {
                let owned = OwnedOutput {
                    value: credit.value,
                    locked: credit.covenant_class.is_locked(),
                };
                per_account
                    .entry(credit.owning_account.clone())
                    .or_default()
                    .owned_outputs
                    .push(owned);
                wallet.owned_outputs.push(owned);
            }
        }
        for input in &wtx.owned_inputs {
            let account = store.account_for_slot(input.owning_account).clone();
            let owned = OwnedInputValue {
                value: input.value,
                locked: input.locked,
            };
            per_account.entry(account).or_default().owned_inputs.push(owned);
            wallet.owned_inputs.push(owned);
        }
        (per_account, wallet)
    }

    /// Applies `delta_fn` once per touched account scope and once more for
    /// the merged wallet scope (invariant B2: wallet `tx` is not a naive
    /// sum across accounts for the same transaction, since every delta
    /// function sets `tx: 1` unconditionally regardless of view size).
    fn apply_deltas(
        state: &mut EngineState,
        per_account: &HashMap<AccountId, OwnershipView>,
        wallet_view: &OwnershipView,
        wallet_id: &str,
        delta_fn: impl Fn(&OwnershipView) -> BalanceTuple,
    ) {
        for (account_id, view) in per_account {
            let scope = Scope::Account(account_id.clone());
            *state.balances.entry(scope).or_default() += delta_fn(view);
        }
        let wallet_scope = Scope::Wallet(wallet_id.to_string());
        *state.balances.entry(wallet_scope).or_default() += delta_fn(wallet_view);
    }

    fn unconfirm_locked(&self, state: &mut EngineState, txid: Txid) -> Result<(), Error> {
        state.journal.request_unconfirm(txid)?;
        let wtx = state
            .credits
            .get_tx(&txid)
            .cloned()
            .ok_or(Error::UnknownTransaction(txid))?;
        let (per_account, wallet_view) = Self::views_for_wallet_tx(&state.credits, &wtx);
        Self::apply_deltas(state, &per_account, &wallet_view, &self.wallet_id, unconfirm_delta);
        for outpoint in &wtx.owned_outputs {
            let _ = state.credits.set_height(*outpoint, None);
        }
        let mut wtx = wtx;
        wtx.height = None;
        state.credits.put_tx(wtx);
        Ok(())
    }

    fn erase_locked(&self, state: &mut EngineState, txid: Txid) -> Result<(), Error> {
        state.journal.request_erase(txid)?;
        let wtx = state
            .credits
            .remove_tx(&txid)
            .ok_or(Error::UnknownTransaction(txid))?;
        let (per_account, wallet_view) = Self::views_for_wallet_tx(&state.credits, &wtx);
        let counted = wtx.counted;
        let delta_fn = move |view: &OwnershipView| {
            let mut delta = erase_delta(view);
            if !counted {
                delta.tx = 0;
            }
            delta
        };
        Self::apply_deltas(state, &per_account, &wallet_view, &self.wallet_id, delta_fn);
        for outpoint in &wtx.owned_outputs {
            state.credits.remove(outpoint);
        }
        for input in &wtx.owned_inputs {
            let _ = state.credits.mark_unspent(input.outpoint);
        }
        Ok(())
    }

    /// Retroactive discovery sweep (`spec.md` §4.F): after any window
    /// advance, the archive may contain outputs that were foreign when
    /// their transaction first arrived but now resolve to an owner. Groups
    /// newly-owned outputs by transaction so a transaction touching
    /// several newly-recognized outputs at once still contributes `tx: 1`
    /// per scope, not once per output.
    fn run_retro_sweep(&self, state: &mut EngineState) -> Result<(), Error> {
        let newly_owned = discovery::sweep_for_new_credits(&state.address_book, &state.credits, &state.archive);
        let mut by_tx: HashMap<Txid, Vec<ResolvedOutput>> = HashMap::new();
        for resolved in newly_owned {
            by_tx.entry(resolved.outpoint.txid).or_default().push(resolved);
        }

        for (txid, outputs) in by_tx {
            let height = match state.journal.state(&txid) {
                TxState::Confirmed(h) => Some(h),
                TxState::Pending => None,
                // the archive holds transactions for journal entries we no
                // longer track (erased); nothing to retro-credit.
                TxState::Absent | TxState::Erased => continue,
            };
            let coinbase = state.archive.get(&txid).map(|t| t.coinbase).unwrap_or(false);
            // If the transaction's InsertPending/ConfirmedInsert already
            // contributed `tx: 1` (`WalletTx::counted`), discovering one
            // more of its outputs must not count it again (`spec.md`
            // scenario 2). If it arrived foreign-at-first-sight (owned
            // nothing yet, so never counted), this discovery is the first
            // attribution and must count it now.
            let already_counted = state
                .credits
                .get_tx(&txid)
                .map(|wtx| wtx.counted)
                .unwrap_or(false);

            for output in &outputs {
                state.credits.insert(Credit {
                    outpoint: output.outpoint,
                    value: output.value,
                    owning_account: output.account.clone(),
                    branch: output.branch,
                    index: output.index,
                    covenant_class: output.covenant_class,
                    spent_by: None,
                    height,
                    coinbase,
                });
            }
            if let Some(mut wtx) = state.credits.get_tx(&txid).cloned() {
                wtx.owned_outputs.extend(outputs.iter().map(|o| o.outpoint));
                wtx.counted = true;
                state.credits.put_tx(wtx);
            }

            let (per_account, wallet_view) = discovery::group_by_scope(&outputs, &[]);
            let delta_fn = move |view: &OwnershipView| {
                let mut delta = match height {
                    Some(_) => confirmed_insert_delta(view),
                    None => insert_pending_delta(view),
                };
                if already_counted {
                    delta.tx = 0;
                }
                delta
            };
            Self::apply_deltas(state, &per_account, &wallet_view, &self.wallet_id, delta_fn);
        }
        Ok(())
    }

    fn maybe_verify_all(&self, state: &EngineState) -> Result<(), Error> {
        if !self.config.verify_invariants {
            return Ok(());
        }
        let wallet_scope = Scope::Wallet(self.wallet_id.clone());
        if let Some(&tuple) = state.balances.get(&wallet_scope) {
            rescan::verify_b3(&state.credits, &wallet_scope, tuple)?;
        }
        for account in state.address_book.accounts() {
            let scope = Scope::Account(account.id.clone());
            if let Some(&tuple) = state.balances.get(&scope) {
                rescan::verify_b3(&state.credits, &scope, tuple)?;
            }
        }
        Ok(())
    }
}
