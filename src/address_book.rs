//! Component B — address book & gap-limit deriver (`spec.md` §4.B).
//!
//! Deriving the actual script for `(account, branch, index)` is
//! cryptography (key derivation, address encoding) and explicitly out of
//! scope (`spec.md` §1): this module is generic over an [`AddressDeriver`]
//! the host supplies, the same way the teacher's `store.rs` derives
//! addresses from a `ConfidentialDescriptor` it is handed at construction
//! time rather than owning key material itself.

use crate::account::Account;
use crate::error::Error;
use crate::types::{AccountId, Branch, ScriptHash};
use std::collections::HashMap;

/// Supplied by the host: deterministically derives the script-hash for a
/// given account/branch/index. Out of scope for the engine itself
/// (`spec.md` §1 "address encoding" / "key derivation cryptography").
pub trait AddressDeriver: Send + Sync {
    fn derive(&self, account: &AccountId, branch: Branch, index: u32) -> ScriptHash;
}

/// Where an output's script-hash resolves to, from `ownerOf` (`spec.md`
/// §4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub branch: Branch,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedAddress {
    pub account: AccountId,
    pub branch: Branch,
    pub index: u32,
    pub script_hash: ScriptHash,
}

/// Per-wallet address book: one set of accounts, plus the inverted
/// script-hash -> (account, branch, index) lookup that makes `ownerOf`
/// O(1) (`spec.md` §4.B).
pub struct AddressBook {
    deriver: Box<dyn AddressDeriver>,
    accounts: HashMap<AccountId, Account>,
    index: HashMap<ScriptHash, (AccountId, Owner)>,
}

impl AddressBook {
    pub fn new(deriver: Box<dyn AddressDeriver>) -> Self {
        Self {
            deriver,
            accounts: HashMap::new(),
            index: HashMap::new(),
        }
    }

    pub fn create_account(&mut self, id: AccountId, lookahead: u32) -> Result<(), Error> {
        let account = Account::new(id.clone(), lookahead);
        self.ensure_index_for(&account, Branch::Receive, account.receive_window_end().saturating_sub(1))?;
        self.ensure_index_for(&account, Branch::Change, account.change_window_end().saturating_sub(1))?;
        self.accounts.insert(id, account);
        Ok(())
    }

    pub fn account(&self, id: &AccountId) -> Result<&Account, Error> {
        self.accounts.get(id).ok_or_else(|| Error::UnknownAccount(id.clone()))
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// `ownerOf(output) -> {accountId, branch, index} | foreign`, O(1)
    /// (`spec.md` §4.B).
    pub fn owner_of(&self, script_hash: &ScriptHash) -> Option<(AccountId, Owner)> {
        self.index.get(script_hash).cloned()
    }

    /// Derives and inserts addresses up to `index` inclusive; idempotent
    /// (`spec.md` §4.B `ensureIndex`).
    pub fn ensure_index(
        &mut self,
        account_id: &AccountId,
        branch: Branch,
        index: u32,
    ) -> Result<Vec<DerivedAddress>, Error> {
        let account = self
            .accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| Error::UnknownAccount(account_id.clone()))?;
        self.ensure_index_for(&account, branch, index)
    }

    fn ensure_index_for(
        &mut self,
        account: &Account,
        branch: Branch,
        up_to: u32,
    ) -> Result<Vec<DerivedAddress>, Error> {
        let mut derived = Vec::new();
        for i in 0..=up_to {
            let script_hash = self.deriver.derive(&account.id, branch, i);
            if self.index.contains_key(&script_hash) {
                continue;
            }
            self.index
                .insert(script_hash, (account.id.clone(), Owner { branch, index: i }));
            derived.push(DerivedAddress {
                account: account.id.clone(),
                branch,
                index: i,
                script_hash,
            });
        }
        Ok(derived)
    }

    /// Derives (without mutating depth or the lookup index) the address at
    /// a specific `(account, branch, index)` — used to hand out the next
    /// receive address to a caller regardless of whether it has already
    /// been derived into the lookup table.
    pub fn address_at(
        &self,
        account_id: &AccountId,
        branch: Branch,
        index: u32,
    ) -> Result<DerivedAddress, Error> {
        let account = self
            .accounts
            .get(account_id)
            .ok_or_else(|| Error::UnknownAccount(account_id.clone()))?;
        let script_hash = self.deriver.derive(&account.id, branch, index);
        Ok(DerivedAddress {
            account: account.id.clone(),
            branch,
            index,
            script_hash,
        })
    }

    /// Sets `receiveDepth`/`changeDepth` to `max(current, index + 1)` and
    /// extends the indexed lookup to cover the new window
    /// (`spec.md` §4.B `advanceDepth` contract: after `advanceDepth(_, i)`,
    /// `ownerOf` recognises every address with index `<= i + lookahead`).
    pub fn advance_depth(
        &mut self,
        account_id: &AccountId,
        branch: Branch,
        index: u32,
        lookahead_ceiling: u32,
    ) -> Result<Vec<DerivedAddress>, Error> {
        let mut account = self
            .accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| Error::UnknownAccount(account_id.clone()))?;

        let new_depth = (index + 1).max(match branch {
            Branch::Receive => account.receive_depth,
            Branch::Change => account.change_depth,
        });

        if new_depth > lookahead_ceiling {
            return Err(Error::LookaheadExhausted(
                account_id.clone(),
                new_depth,
                lookahead_ceiling,
            ));
        }

        match branch {
            Branch::Receive => account.receive_depth = new_depth,
            Branch::Change => account.change_depth = new_depth,
        }

        let window_end = match branch {
            Branch::Receive => account.receive_window_end(),
            Branch::Change => account.change_window_end(),
        };
        let derived = self.ensure_index_for(&account, branch, window_end.saturating_sub(1))?;
        self.accounts.insert(account_id.clone(), account);
        Ok(derived)
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    /// Deterministic fake deriver for tests: hashes `(account, branch,
    /// index)` into a 32-byte script hash. Not a real address scheme —
    /// address encoding is out of scope (`spec.md` §1).
    pub struct FakeDeriver;

    impl AddressDeriver for FakeDeriver {
        fn derive(&self, account: &AccountId, branch: Branch, index: u32) -> ScriptHash {
            let mut hasher = DefaultHasher::new();
            account.hash(&mut hasher);
            branch.hash(&mut hasher);
            index.hash(&mut hasher);
            let h = hasher.finish();
            let mut bytes = [0u8; 32];
            bytes[..8].copy_from_slice(&h.to_le_bytes());
            ScriptHash(bytes)
        }
    }
}
