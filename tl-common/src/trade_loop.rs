//! Trade loop: a cycle of wallets and item transfers realizing a
//! multilateral swap

use serde::{Deserialize, Serialize};

use crate::ids::{CanonicalId, ItemId, Timestamp, WalletId};

/// Default lifetime of a newly discovered loop, in milliseconds (24h)
pub const DEFAULT_LOOP_TTL_MILLIS: u64 = 24 * 60 * 60 * 1000;

/// A single transfer within a trade loop: `from` gives `items` to `to`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeStep {
    /// The wallet giving up items
    pub from: WalletId,
    /// The wallet receiving items
    pub to: WalletId,
    /// The items transferred in this step; always non-empty
    pub items: Vec<ItemId>,
}

/// Lifecycle state of a `TradeLoop`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopStatus {
    /// Discovered, awaiting participant confirmation
    Pending,
    /// All participants confirmed
    Approved,
    /// Settlement initiated
    Executing,
    /// Settlement acknowledged
    Completed,
    /// Aborted before completion, with a human-readable reason
    Cancelled {
        /// Why the loop was cancelled
        reason: String,
    },
    /// Expired past its `expires_at` deadline without completing
    Expired,
}

impl LoopStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopStatus::Completed | LoopStatus::Cancelled { .. } | LoopStatus::Expired)
    }

    /// Whether transitioning from `self` to `next` is a legal lifecycle
    /// move
    ///
    /// `cancel`/`invalidate` are legal from any non-terminal state; all
    /// other transitions must follow the linear
    /// pending -> approved -> executing -> completed chain.
    pub fn can_transition_to(&self, next: &LoopStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (LoopStatus::Pending, LoopStatus::Approved) => true,
            (LoopStatus::Approved, LoopStatus::Executing) => true,
            (LoopStatus::Executing, LoopStatus::Completed) => true,
            (_, LoopStatus::Cancelled { .. }) => true,
            (_, LoopStatus::Expired) => true,
            _ => false,
        }
    }
}

/// A discovered, scored trade loop
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeLoop {
    /// Deterministic identifier, stable under rotation/reversal of the
    /// underlying cycle
    pub canonical_id: CanonicalId,
    /// The ordered steps forming the cycle;
    /// `steps[i].to == steps[(i + 1) % steps.len()].from`
    pub steps: Vec<TradeStep>,
    /// Number of distinct wallets participating (`steps.len()`)
    pub participants: usize,
    /// Composite quality score in `[0, 1]`
    pub quality_score: f64,
    /// When this loop was first discovered
    pub discovered_at: Timestamp,
    /// When this loop expires if not settled
    pub expires_at: Timestamp,
    /// Current lifecycle state
    pub status: LoopStatus,
}

impl TradeLoop {
    /// Build a new, pending trade loop discovered right now, expiring
    /// after the default TTL
    pub fn new(canonical_id: CanonicalId, steps: Vec<TradeStep>, quality_score: f64) -> Self {
        let now = Timestamp::now();
        Self {
            participants: steps.len(),
            canonical_id,
            steps,
            quality_score,
            discovered_at: now,
            expires_at: now.plus_millis(DEFAULT_LOOP_TTL_MILLIS),
            status: LoopStatus::Pending,
        }
    }

    /// The set of wallets participating in this loop
    pub fn participant_ids(&self) -> impl Iterator<Item = &WalletId> {
        self.steps.iter().map(|s| &s.from)
    }

    /// Whether this loop's deadline has passed as of `now`
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at.is_before(now)
    }
}

#[cfg(test)]
mod test {
    use super::LoopStatus;

    #[test]
    fn linear_lifecycle_is_legal() {
        assert!(LoopStatus::Pending.can_transition_to(&LoopStatus::Approved));
        assert!(LoopStatus::Approved.can_transition_to(&LoopStatus::Executing));
        assert!(LoopStatus::Executing.can_transition_to(&LoopStatus::Completed));
    }

    #[test]
    fn skipping_a_stage_is_illegal() {
        assert!(!LoopStatus::Pending.can_transition_to(&LoopStatus::Executing));
        assert!(!LoopStatus::Pending.can_transition_to(&LoopStatus::Completed));
    }

    #[test]
    fn terminal_states_admit_no_further_transitions() {
        let completed = LoopStatus::Completed;
        assert!(!completed.can_transition_to(&LoopStatus::Pending));

        let cancelled = LoopStatus::Cancelled { reason: "invalidated".to_string() };
        assert!(!cancelled.can_transition_to(&LoopStatus::Approved));
    }

    #[test]
    fn cancel_is_legal_from_any_non_terminal_state() {
        assert!(LoopStatus::Pending
            .can_transition_to(&LoopStatus::Cancelled { reason: "invalidated".to_string() }));
        assert!(LoopStatus::Executing
            .can_transition_to(&LoopStatus::Cancelled { reason: "invalidated".to_string() }));
    }
}
