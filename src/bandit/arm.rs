//! Per-arm Beta posterior state and the pure update rule.
//!
//! An arm starts at the uniform prior Beta(1, 1). Every feedback event is
//! turned into an [`ArmDelta`] and folded in with [`ArmState::apply`]; stores
//! only decide how that fold is made atomic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sampling::posterior_mean;

/// Identifier of a recommendable catalog item.
pub type ItemId = i64;

pub const PRIOR_ALPHA: f64 = 1.0;
pub const PRIOR_BETA: f64 = 1.0;

/// Stored state for one arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmState {
    pub item_id: ItemId,
    pub impressions: u64,
    /// Sum of raw (unnormalized) rewards.
    pub cumulative_reward: f64,
    pub alpha: f64,
    pub beta: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ArmState {
    /// Fresh arm at the uniform prior.
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            impressions: 0,
            cumulative_reward: 0.0,
            alpha: PRIOR_ALPHA,
            beta: PRIOR_BETA,
            last_updated: None,
        }
    }

    /// Posterior mean `alpha / (alpha + beta)`.
    pub fn expected_reward(&self) -> f64 {
        posterior_mean(self.alpha, self.beta)
    }

    /// Fold a delta into this state, returning the successor.
    ///
    /// Every field is additive so two deltas commute; the store only has to
    /// make each application atomic.
    pub fn apply(&self, delta: &ArmDelta) -> ArmState {
        ArmState {
            item_id: self.item_id,
            impressions: self.impressions.saturating_add(delta.impressions),
            cumulative_reward: self.cumulative_reward + delta.reward,
            alpha: self.alpha + delta.alpha,
            beta: self.beta + delta.beta,
            last_updated: Some(delta.at),
        }
    }
}

/// Additive change produced by one feedback event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmDelta {
    pub impressions: u64,
    pub reward: f64,
    pub alpha: f64,
    pub beta: f64,
    pub at: DateTime<Utc>,
}

/// Statistics attached to recommendations and returned by per-arm lookups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmStats {
    pub impressions: u64,
    pub cumulative_reward: f64,
    pub alpha: f64,
    pub beta: f64,
    pub expected_reward: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// False while the arm is still at its prior (no feedback applied yet).
    pub observed: bool,
}

impl ArmStats {
    /// Statistics for an arm the engine has never seen.
    pub fn prior() -> Self {
        Self::from(&ArmState::new(0))
    }
}

impl From<&ArmState> for ArmStats {
    fn from(state: &ArmState) -> Self {
        Self {
            impressions: state.impressions,
            cumulative_reward: state.cumulative_reward,
            alpha: state.alpha,
            beta: state.beta,
            expected_reward: state.expected_reward(),
            last_updated: state.last_updated,
            observed: state.last_updated.is_some(),
        }
    }
}
