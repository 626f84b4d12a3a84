#![cfg_attr(not(test), deny(clippy::unwrap_used))]

//! # walletdb-core
//!
//! A deterministic balance-accounting core for a UTXO wallet with
//! name-auction covenant support (OPEN/BID/REVEAL/REDEEM and
//! REGISTER/UPDATE/RENEW/TRANSFER/FINALIZE/REVOKE). The engine consumes
//! pre-validated, pre-decoded transactions from a host chain client and
//! maintains the six-tuple balance `(tx, coin, confirmed, unconfirmed,
//! lockedConfirmed, lockedUnconfirmed)` per wallet and per account under
//! reorgs, discovery and rescans.
//!
//! Out of scope: wire parsing, signature verification, covenant script
//! validation, key derivation and address encoding, fee estimation and
//! transaction construction. The host owns all of that; this crate only
//! tracks what the host tells it.
//!
//! For an entry point see [`Engine::new()`].

mod account;
mod address_book;
mod balance;
mod config;
mod covenant;
mod credit;
mod discovery;
mod engine;
mod error;
mod journal;
mod rescan;
mod tx;
mod types;

pub use crate::account::Account;
pub use crate::address_book::{AddressDeriver, DerivedAddress, Owner};
pub use crate::balance::BalanceTuple;
pub use crate::config::{EngineConfig, DEFAULT_LOOKAHEAD};
pub use crate::covenant::{CovenantClass, CovenantOp};
pub use crate::credit::{Credit, CreditStoreSnapshot, WalletTx};
pub use crate::engine::{Engine, EngineSnapshot};
pub use crate::error::{Error, InvariantMismatch};
pub use crate::journal::TxState;
pub use crate::rescan::recompute_balance;
pub use crate::tx::{CoinView, Tx, TxInput, TxOutput};
pub use crate::types::{AccountId, Branch, OutPoint, Scope, ScriptHash, Txid};
