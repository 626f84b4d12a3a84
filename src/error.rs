use crate::balance::BalanceTuple;
use crate::types::{OutPoint, Scope, Txid};

/// Errors the engine can return. Every public `Engine` method is
/// all-or-nothing: on `Err`, no state was mutated (`spec.md` §7).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Generic(String),

    #[error(transparent)]
    JsonFrom(#[from] serde_json::Error),

    /// A chain/mempool event was delivered in a state where it cannot apply,
    /// e.g. `Confirm` of a tx the journal has never seen with no owned
    /// outputs, or `Erase` of a confirmed tx (callers must `Unconfirm`
    /// first). Reported, not recovered.
    #[error("illegal transition for tx {txid}: {reason}")]
    IllegalTransition { txid: Txid, reason: String },

    /// A post-event consistency check (B1/B2/B3/D1) failed. Fatal: the
    /// wallet must be quarantined by the host and a full recompute
    /// scheduled via `Engine::recalculate_balances`. Carries the structured
    /// mismatch (scope, incremental tuple, recomputed tuple) rather than a
    /// pre-formatted string so a host can log a complete diagnostic without
    /// replaying state (`SPEC_FULL.md` §7).
    #[error("invariant violation: {0}")]
    InvariantViolation(InvariantMismatch),

    /// `advanceDepth` would push `receiveDepth` past the configured
    /// `lookahead_ceiling`. The triggering event is still applied (per
    /// `spec.md` §7); no further discovery occurs until the ceiling is
    /// raised.
    #[error("lookahead ceiling exceeded for account {0:?}: requested depth {1}, ceiling {2}")]
    LookaheadExhausted(crate::types::AccountId, u32, u32),

    #[error("unknown outpoint {0:?}")]
    UnknownOutpoint(OutPoint),

    #[error("unknown account {0:?}")]
    UnknownAccount(crate::types::AccountId),

    #[error("unknown transaction {0:?}")]
    UnknownTransaction(Txid),
}

/// Context bundled into an `InvariantViolation`, kept separate from the
/// `Error` variant so callers can match on it without parsing the message.
#[derive(Debug, Clone)]
pub struct InvariantMismatch {
    pub scope: Scope,
    pub incremental: BalanceTuple,
    pub recomputed: BalanceTuple,
}

impl std::fmt::Display for InvariantMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "incremental {:?} != recomputed {:?}",
            self.incremental, self.recomputed
        )
    }
}
