//! Engine configuration (`spec.md` §10.3 ambient stack). Host-supplied,
//! loaded once at `Engine` construction; nothing here is mutated by the
//! engine itself.

/// Default per-account lookahead when a caller doesn't specify one
/// (`spec.md` §3 "lookahead").
pub const DEFAULT_LOOKAHEAD: u32 = 20;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Gap-limit window size newly created accounts get unless overridden
    /// per account.
    pub default_lookahead: u32,
    /// Hard ceiling `advanceDepth` refuses to cross (`spec.md` §4.B,
    /// `Error::LookaheadExhausted`). Guards against a malicious or corrupt
    /// chain driving the receive/change depth — and therefore the address
    /// book's memory footprint — without bound.
    pub lookahead_ceiling: u32,
    /// Whether every mutating event re-runs the B3 ground-truth recompute
    /// and compares it against the incrementally maintained balance before
    /// returning. Expensive (`O(credits)` per event) but catches a
    /// divergent delta function immediately instead of silently drifting.
    /// Defaults to on in debug builds, off in release — the same tradeoff
    /// `wollet`'s own `#[cfg(debug_assertions)]` assertions make.
    pub verify_invariants: bool,
}

impl EngineConfig {
    pub fn new(default_lookahead: u32, lookahead_ceiling: u32) -> Self {
        Self {
            default_lookahead,
            lookahead_ceiling,
            verify_invariants: cfg!(debug_assertions),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKAHEAD, 10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ceiling_comfortably_exceeds_default_lookahead() {
        let cfg = EngineConfig::default();
        assert!(cfg.lookahead_ceiling > cfg.default_lookahead);
    }
}
