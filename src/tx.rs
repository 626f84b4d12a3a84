//! The transaction shape the engine consumes from the host. Parsing the
//! wire format, verifying signatures and validating covenant scripts are
//! all out of scope (`spec.md` §1) — by the time a `Tx` reaches the
//! engine, the host has already decoded it into this flat, pre-classified
//! form.

use crate::covenant::CovenantOp;
use crate::types::{OutPoint, ScriptHash, Txid};

/// One input of a transaction as handed to the engine. `coin_view`, when
/// present, is the host supplying the spent output's script-hash and value
/// inline because the engine's own credit store has no record of it (e.g.
/// the spending tx showed up before, or without, the original output) —
/// `spec.md` §6 "ownership classification input".
#[derive(Debug, Clone)]
pub struct TxInput {
    pub prevout: OutPoint,
    pub coin_view: Option<CoinView>,
}

#[derive(Debug, Clone, Copy)]
pub struct CoinView {
    pub script_hash: ScriptHash,
    pub value: u64,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct TxOutput {
    pub value: u64,
    pub script_hash: ScriptHash,
    pub covenant: CovenantOp,
}

#[derive(Debug, Clone)]
pub struct Tx {
    pub txid: Txid,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub coinbase: bool,
}

impl Tx {
    pub fn output_outpoint(&self, vout: u32) -> OutPoint {
        OutPoint::new(self.txid, vout)
    }
}
