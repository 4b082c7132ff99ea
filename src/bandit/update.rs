//! Feedback -> Beta posterior updates.
//!
//! One feedback event updates exactly one arm exactly once:
//! 1. Validate the raw reward and impression count (fail before touching
//!    the store)
//! 2. Normalize it to `n` in `[0, 1]`
//! 3. Apply `alpha += n`, `beta += 1 - n`, `impressions += count`,
//!    `cumulative_reward += raw` in one atomic store operation
//!
//! There is no deduplication and no retry here.

use chrono::{DateTime, Utc};

use super::arm::{ArmDelta, ArmState, ItemId};
use super::normalize::{validate_reward, RewardNormalizer};
use super::store::ArmStore;
use crate::error::BanditError;

/// Largest impression count one event may carry. Counters are stored as
/// signed 64-bit integers.
pub const MAX_IMPRESSION_COUNT: u64 = i64::MAX as u64;

/// Build the delta for one feedback event. Pure; rejects invalid rewards and
/// impression counts.
pub fn feedback_delta(
    normalizer: &RewardNormalizer,
    raw_reward: f64,
    impression_count: u64,
    at: DateTime<Utc>,
) -> Result<ArmDelta, BanditError> {
    let raw_reward = validate_reward(raw_reward)?;
    if impression_count > MAX_IMPRESSION_COUNT {
        return Err(BanditError::InvalidImpressionCount(impression_count));
    }
    let normalized = normalizer.normalize(raw_reward);
    Ok(ArmDelta {
        impressions: impression_count,
        reward: raw_reward,
        alpha: normalized,
        beta: 1.0 - normalized,
        at,
    })
}

/// Record one feedback event against `item_id`.
///
/// Storage failures are returned to the caller; whether to drop the event is
/// the caller's decision.
pub fn record<S: ArmStore + ?Sized>(
    store: &S,
    normalizer: &RewardNormalizer,
    item_id: ItemId,
    raw_reward: f64,
    impression_count: u64,
) -> Result<ArmState, BanditError> {
    let delta = feedback_delta(normalizer, raw_reward, impression_count, Utc::now())?;
    let state = store.apply_delta(item_id, &delta)?;

    log::info!(
        "Updated arm {}: alpha={:.2}, beta={:.2}, impressions={}, cumulative_reward={}",
        item_id,
        state.alpha,
        state.beta,
        state.impressions,
        state.cumulative_reward
    );

    Ok(state)
}
