use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bandit::normalize::REWARD_CEILING;
use crate::bandit::ranker::DEFAULT_RECOMMENDATIONS;
use crate::error::BanditError;

/// Configuration stored in ~/.recobandit/config.json
///
/// Every field has a default, so an empty object (or no file at all) is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// SQLite file for arm state. Defaults to `~/.recobandit/recobandit.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    /// Raw reward that counts as a full success. Fixed per deployment.
    #[serde(default = "default_reward_ceiling")]
    pub reward_ceiling: f64,
    /// How many recommendations hosts ask for when the request does not say.
    #[serde(default = "default_recommendations")]
    pub default_recommendations: usize,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Idle SQLite connections kept for reuse.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_reward_ceiling() -> f64 {
    REWARD_CEILING
}

fn default_recommendations() -> usize {
    DEFAULT_RECOMMENDATIONS
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_size() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            reward_ceiling: default_reward_ceiling(),
            default_recommendations: default_recommendations(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_size: default_pool_size(),
        }
    }
}

impl Config {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), BanditError> {
        if !self.reward_ceiling.is_finite() || self.reward_ceiling <= 0.0 {
            return Err(BanditError::Config(format!(
                "rewardCeiling must be positive and finite, got {}",
                self.reward_ceiling
            )));
        }
        if self.default_recommendations == 0 {
            return Err(BanditError::Config(
                "defaultRecommendations must be at least 1".to_string(),
            ));
        }
        if self.pool_size == 0 {
            return Err(BanditError::Config("poolSize must be at least 1".to_string()));
        }
        Ok(())
    }
}
