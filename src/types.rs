//! Opaque identifiers shared across the engine. Signing, key derivation and
//! address encoding are out of scope (`spec.md` §1) — these types carry only
//! what the balance engine needs to identify chain objects, not how to
//! produce them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A transaction hash. Opaque to the engine: equality and hashing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Txid(pub [u8; 32]);

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter().rev() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// A spendable output reference, `(txid, vout)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// The script-hash an output pays to. Two addresses are the same iff their
/// script hashes match (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScriptHash(pub [u8; 32]);

/// Identifies an account within a wallet: `(walletId, accountName)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId {
    pub wallet_id: String,
    pub account_name: String,
}

impl AccountId {
    pub fn new(wallet_id: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            account_name: account_name.into(),
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.wallet_id, self.account_name)
    }
}

/// Derivation subtree an address belongs to (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Branch {
    Receive,
    Change,
}

/// A balance query names a scope: the whole wallet, or one of its accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Wallet(String),
    Account(AccountId),
}

impl fmt::Debug for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutPoint({}:{})", self.txid, self.vout)
    }
}
