//! Component A — covenant classifier (`spec.md` §4.A).
//!
//! The chain's validation of covenant state transitions is trusted input
//! (`spec.md` §1); this module only decides, for an output the engine has
//! already been told belongs to this wallet, which of the closed set of
//! buckets its value falls into.

use serde::{Deserialize, Serialize};

/// The raw covenant opcode a chain hands the engine for an output. Grinding
/// names, building bid blinds and assembling the scripts themselves are out
/// of scope (`spec.md` §1) — the engine only ever reads this tag back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CovenantOp {
    None,
    Open,
    Bid,
    Reveal,
    Redeem,
    Register,
    Update,
    Renew,
    Transfer,
    Finalize,
    Revoke,
    /// Anything outside the enumerated set (`spec.md` §7 `UnknownCovenant`).
    Unknown(u8),
}

/// The semantic bucket an output's covenant class drives locking behavior
/// from (`spec.md` §3, `Credit.covenantClass`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CovenantClass {
    None,
    LockedOpen,
    LockedBid,
    LockedReveal,
    LockedName,
    Burn,
}

impl CovenantClass {
    /// Whether a credit of this class contributes to `lockedConfirmed`/
    /// `lockedUnconfirmed` (`spec.md` §3, Glossary "Locked").
    pub fn is_locked(self) -> bool {
        matches!(
            self,
            CovenantClass::LockedOpen
                | CovenantClass::LockedBid
                | CovenantClass::LockedReveal
                | CovenantClass::LockedName
        )
    }
}

/// Pure, total, deterministic: depends only on the output's covenant bytes
/// (`spec.md` §4.A contract). OPEN outputs carry zero value but still
/// classify to a bucket — the decision to still materialize a credit for
/// them lives in `credit.rs`, not here.
pub fn classify(op: CovenantOp) -> CovenantClass {
    match op {
        CovenantOp::None => CovenantClass::None,
        CovenantOp::Open => CovenantClass::None,
        CovenantOp::Bid => CovenantClass::LockedBid,
        CovenantOp::Reveal => CovenantClass::LockedReveal,
        CovenantOp::Redeem => CovenantClass::None,
        CovenantOp::Register
        | CovenantOp::Update
        | CovenantOp::Renew
        | CovenantOp::Transfer
        | CovenantOp::Finalize => CovenantClass::LockedName,
        CovenantOp::Revoke => CovenantClass::Burn,
        CovenantOp::Unknown(op) => {
            log::warn!("unknown covenant opcode {op}, degrading to CovenantClass::None");
            CovenantClass::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_total_and_deterministic() {
        let ops = [
            CovenantOp::None,
            CovenantOp::Open,
            CovenantOp::Bid,
            CovenantOp::Reveal,
            CovenantOp::Redeem,
            CovenantOp::Register,
            CovenantOp::Update,
            CovenantOp::Renew,
            CovenantOp::Transfer,
            CovenantOp::Finalize,
            CovenantOp::Revoke,
            CovenantOp::Unknown(0xff),
        ];
        for op in ops {
            // calling twice must agree — no hidden state
            assert_eq!(classify(op), classify(op));
        }
    }

    #[test]
    fn bid_reveal_and_name_ops_lock() {
        assert!(classify(CovenantOp::Bid).is_locked());
        assert!(classify(CovenantOp::Reveal).is_locked());
        for op in [
            CovenantOp::Register,
            CovenantOp::Update,
            CovenantOp::Renew,
            CovenantOp::Transfer,
            CovenantOp::Finalize,
        ] {
            assert!(classify(op).is_locked(), "{op:?} should be locked");
        }
    }

    #[test]
    fn open_redeem_and_none_do_not_lock() {
        assert!(!classify(CovenantOp::None).is_locked());
        assert!(!classify(CovenantOp::Open).is_locked());
        assert!(!classify(CovenantOp::Redeem).is_locked());
    }

    #[test]
    fn revoke_is_a_burn_not_locked() {
        let class = classify(CovenantOp::Revoke);
        assert_eq!(class, CovenantClass::Burn);
        assert!(!class.is_locked());
    }

    #[test]
    fn unknown_opcode_degrades_to_none() {
        assert_eq!(classify(CovenantOp::Unknown(42)), CovenantClass::None);
    }
}
