//! Raw reward -> [0, 1] normalization for the Beta update.

use crate::error::BanditError;

/// Calibration ceiling for raw rewards: anything at or above it counts as a
/// full success.
pub const REWARD_CEILING: f64 = 3.0;

/// Maps raw reward magnitudes onto `[0, 1]` by dividing by a fixed ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardNormalizer {
    ceiling: f64,
}

impl Default for RewardNormalizer {
    fn default() -> Self {
        Self {
            ceiling: REWARD_CEILING,
        }
    }
}

impl RewardNormalizer {
    /// Build a normalizer with an explicit ceiling. The ceiling must be a
    /// positive finite number.
    pub fn new(ceiling: f64) -> Result<Self, BanditError> {
        if !ceiling.is_finite() || ceiling <= 0.0 {
            return Err(BanditError::Config(format!(
                "reward ceiling must be positive and finite, got {ceiling}"
            )));
        }
        Ok(Self { ceiling })
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// `clamp(raw / ceiling, 0, 1)`. Total: NaN maps to 0.
    pub fn normalize(&self, raw_reward: f64) -> f64 {
        if raw_reward.is_nan() {
            return 0.0;
        }
        (raw_reward / self.ceiling).clamp(0.0, 1.0)
    }
}

/// Reject rewards the update rule cannot accept.
pub fn validate_reward(raw_reward: f64) -> Result<f64, BanditError> {
    if raw_reward.is_finite() && raw_reward >= 0.0 {
        Ok(raw_reward)
    } else {
        Err(BanditError::InvalidReward(raw_reward))
    }
}
