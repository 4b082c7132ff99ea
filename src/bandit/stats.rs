//! Corpus-wide and per-arm statistics.

use serde::Serialize;

use super::arm::{ArmState, ArmStats, ItemId, PRIOR_ALPHA, PRIOR_BETA};
use super::store::ArmStore;
use crate::error::BanditError;

/// Point-in-time summary over every stored arm.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BanditStatistics {
    pub total_arms: usize,
    pub total_impressions: u64,
    pub total_reward: f64,
    pub average_alpha: f64,
    pub average_beta: f64,
    /// `total_reward / total_impressions`, 0 before any impression.
    pub overall_reward_rate: f64,
}

/// Summarize a set of arm states. An empty set reports the prior averages.
pub fn summarize(arms: &[ArmState]) -> BanditStatistics {
    let total_arms = arms.len();
    let total_impressions: u64 = arms.iter().map(|a| a.impressions).sum();
    let total_reward: f64 = arms.iter().map(|a| a.cumulative_reward).sum();

    let (average_alpha, average_beta) = if total_arms == 0 {
        (PRIOR_ALPHA, PRIOR_BETA)
    } else {
        let n = total_arms as f64;
        (
            arms.iter().map(|a| a.alpha).sum::<f64>() / n,
            arms.iter().map(|a| a.beta).sum::<f64>() / n,
        )
    };

    let overall_reward_rate = if total_impressions > 0 {
        total_reward / total_impressions as f64
    } else {
        0.0
    };

    BanditStatistics {
        total_arms,
        total_impressions,
        total_reward,
        average_alpha,
        average_beta,
        overall_reward_rate,
    }
}

/// Scan the store and summarize. Read-only; not a consistent cut across
/// arms under concurrent updates.
pub fn aggregate<S: ArmStore + ?Sized>(store: &S) -> Result<BanditStatistics, BanditError> {
    let arms = store.all()?;
    Ok(summarize(&arms))
}

/// Statistics for one arm, or the prior if it was never referenced.
/// Does not create state.
pub fn arm_stats<S: ArmStore + ?Sized>(store: &S, item_id: ItemId) -> Result<ArmStats, BanditError> {
    Ok(match store.get(item_id)? {
        Some(state) => ArmStats::from(&state),
        None => ArmStats::prior(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bandit::normalize::RewardNormalizer;
    use crate::bandit::store::MemoryArmStore;
    use crate::bandit::update::record;

    #[test]
    fn test_empty_store_reports_prior() {
        let stats = aggregate(&MemoryArmStore::new()).expect("aggregate");
        assert_eq!(stats.total_arms, 0);
        assert_eq!(stats.total_impressions, 0);
        assert_eq!(stats.total_reward, 0.0);
        assert_eq!(stats.average_alpha, 1.0);
        assert_eq!(stats.average_beta, 1.0);
        assert_eq!(stats.overall_reward_rate, 0.0);
    }

    #[test]
    fn test_created_but_unobserved_arms_have_zero_rate() {
        let store = MemoryArmStore::new();
        store.get_or_create(1).expect("create");
        let stats = aggregate(&store).expect("aggregate");
        assert_eq!(stats.total_arms, 1);
        assert_eq!(stats.overall_reward_rate, 0.0);
    }

    #[test]
    fn test_totals_and_averages() {
        let store = MemoryArmStore::new();
        let n = RewardNormalizer::default();
        record(&store, &n, 1, 3.0, 1).expect("record");
        record(&store, &n, 2, 1.0, 1).expect("record");
        record(&store, &n, 2, 2.0, 1).expect("record");
        store.get_or_create(3).expect("create");

        let stats = aggregate(&store).expect("aggregate");
        assert_eq!(stats.total_arms, 3);
        assert_eq!(stats.total_impressions, 3);
        assert!((stats.total_reward - 6.0).abs() < 1e-9);
        assert!((stats.overall_reward_rate - 2.0).abs() < 1e-9);
        // alphas: 2, 2, 1 / betas: 1, 2, 1
        assert!((stats.average_alpha - 5.0 / 3.0).abs() < 1e-9);
        assert!((stats.average_beta - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_impressions_matches_stored_records() {
        let store = MemoryArmStore::new();
        let n = RewardNormalizer::default();
        for (id, count) in [(1, 3), (2, 1), (3, 7)] {
            record(&store, &n, id, 1.0, count).expect("record");
        }
        let arms = store.all().expect("all");
        let stats = summarize(&arms);
        assert_eq!(stats.total_impressions, arms.iter().map(|a| a.impressions).sum::<u64>());
        assert_eq!(stats.total_impressions, 11);
    }

    #[test]
    fn test_arm_stats_prior_does_not_create() {
        let store = MemoryArmStore::new();
        let stats = arm_stats(&store, 404).expect("arm stats");
        assert!(!stats.observed);
        assert_eq!(stats.impressions, 0);
        assert!((stats.expected_reward - 0.5).abs() < 1e-12);
        assert!(store.is_empty());
    }

    #[test]
    fn test_arm_stats_for_observed_arm() {
        let store = MemoryArmStore::new();
        record(&store, &RewardNormalizer::default(), 12, 3.0, 1).expect("record");
        let stats = arm_stats(&store, 12).expect("arm stats");
        assert!(stats.observed);
        assert_eq!(stats.impressions, 1);
        assert!((stats.expected_reward - 2.0 / 3.0).abs() < 1e-12);
    }
}
