//! `Account` (`spec.md` §3): a derivation subtree of a wallet with its own
//! receive/change depth and lookahead.

use crate::types::AccountId;
use serde::{Deserialize, Serialize};

/// Per-account derivation state. `receive_depth`/`change_depth` are
/// monotone non-decreasing under normal operation (`spec.md` §3 invariant);
/// they may only decrease when an entire wallet is rebuilt from scratch
/// (`Account::reset_for_rebuild`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub receive_depth: u32,
    pub change_depth: u32,
    pub lookahead: u32,
}

impl Account {
    pub fn new(id: AccountId, lookahead: u32) -> Self {
        Self {
            id,
            receive_depth: 0,
            change_depth: 0,
            lookahead,
        }
    }

    /// Index one past the last index this account's receive branch
    /// recognizes (`spec.md` §4.B contract: recognizes every index
    /// `< receiveDepth + lookahead`).
    pub fn receive_window_end(&self) -> u32 {
        self.receive_depth + self.lookahead
    }

    pub fn change_window_end(&self) -> u32 {
        self.change_depth + self.lookahead
    }

    /// Only legal when rebuilding a wallet from its seed from scratch
    /// (`spec.md` §3).
    pub fn reset_for_rebuild(&mut self) {
        self.receive_depth = 0;
        self.change_depth = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_end_tracks_depth_plus_lookahead() {
        let acc = Account::new(AccountId::new("w", "default"), 20);
        assert_eq!(acc.receive_window_end(), 20);
        assert_eq!(acc.change_window_end(), 20);
    }
}
