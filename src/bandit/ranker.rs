//! Recommendation ranking: sample, sort, truncate, attach statistics.

use std::collections::HashSet;

use rand::Rng;
use serde::Serialize;

use super::arm::{ArmStats, ItemId};
use super::sampling::{draw_samples, ArmSample};
use super::store::ArmStore;
use crate::error::BanditError;

/// How many recommendations a request gets when it does not say.
pub const DEFAULT_RECOMMENDATIONS: usize = 5;

/// One ranked item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub item_id: ItemId,
    /// The θ this item was ranked by.
    pub thompson_sample: f64,
    pub bandit_stats: ArmStats,
}

/// Drop repeated ids, keeping the first occurrence.
pub fn dedup_candidates(candidates: &[ItemId]) -> Vec<ItemId> {
    let mut seen = HashSet::with_capacity(candidates.len());
    candidates
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Sort by θ descending, lower item id first on ties, keep `count`.
pub fn rank_samples(mut samples: Vec<ArmSample>, count: usize) -> Vec<ArmSample> {
    samples.sort_by(|a, b| {
        b.theta
            .total_cmp(&a.theta)
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
    samples.truncate(count);
    samples
}

/// Rank `candidates` by one Thompson draw each and return the top `count`.
///
/// Candidates arrive pre-filtered by the catalog. An empty candidate list or
/// a zero count yields an empty result. Statistics are re-read after the
/// sampling pass, so a concurrent update may show up in the stats but not in
/// the θ the item was ranked by.
pub fn recommend<S, R>(
    store: &S,
    candidates: &[ItemId],
    count: usize,
    rng: &mut R,
) -> Result<Vec<Recommendation>, BanditError>
where
    S: ArmStore + ?Sized,
    R: Rng + ?Sized,
{
    let candidates = dedup_candidates(candidates);
    if candidates.is_empty() || count == 0 {
        log::debug!("No candidates to rank (count={count})");
        return Ok(Vec::new());
    }

    let samples = draw_samples(store, &candidates, rng)?;
    let ranked = rank_samples(samples, count);

    let mut recommendations = Vec::with_capacity(ranked.len());
    for sample in ranked {
        let state = store.get(sample.item_id)?.unwrap_or(sample.state);
        recommendations.push(Recommendation {
            item_id: sample.item_id,
            thompson_sample: sample.theta,
            bandit_stats: ArmStats::from(&state),
        });
    }

    log::info!(
        "Generated {} Thompson Sampling recommendations from {} candidates",
        recommendations.len(),
        candidates.len()
    );

    Ok(recommendations)
}
