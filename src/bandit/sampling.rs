//! Thompson Sampling over per-arm Beta posteriors.
//!
//! Each candidate gets one independent draw from Beta(alpha, beta). A fresh
//! arm draws uniformly over [0, 1], so it always has a chance to rank high;
//! a well-observed arm draws close to its empirical rate.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand_distr::{Beta, Distribution};

use super::arm::{ArmState, ItemId};
use super::store::ArmStore;
use crate::error::BanditError;

/// One Thompson draw, with the state it was drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmSample {
    pub item_id: ItemId,
    pub theta: f64,
    pub state: ArmState,
}

/// Draw θ ~ Beta(alpha, beta).
///
/// Parameters that Beta cannot accept fall back to the posterior mean.
pub fn sample_theta<R: Rng + ?Sized>(alpha: f64, beta: f64, rng: &mut R) -> f64 {
    let theta = match Beta::new(alpha, beta) {
        Ok(dist) => dist.sample(rng),
        Err(_) => posterior_mean(alpha, beta),
    };
    theta.clamp(0.0, 1.0)
}

/// Beta distribution mean, 0.5 for degenerate parameters.
pub fn posterior_mean(alpha: f64, beta: f64) -> f64 {
    let denom = alpha + beta;
    if !denom.is_finite() || denom <= 0.0 {
        0.5
    } else {
        alpha / denom
    }
}

/// Draw one sample per distinct id, materializing missing arms at the prior.
///
/// Output follows the first-occurrence order of `item_ids`.
pub fn draw_samples<S, R>(
    store: &S,
    item_ids: &[ItemId],
    rng: &mut R,
) -> Result<Vec<ArmSample>, BanditError>
where
    S: ArmStore + ?Sized,
    R: Rng + ?Sized,
{
    let mut seen = HashSet::with_capacity(item_ids.len());
    let mut samples = Vec::with_capacity(item_ids.len());
    for &item_id in item_ids {
        if !seen.insert(item_id) {
            continue;
        }
        let state = store.get_or_create(item_id)?;
        let theta = sample_theta(state.alpha, state.beta, rng);
        samples.push(ArmSample {
            item_id,
            theta,
            state,
        });
    }
    log::debug!("Drew {} Thompson samples", samples.len());
    Ok(samples)
}

/// `item_id -> θ` for every distinct id.
pub fn sample<S, R>(
    store: &S,
    item_ids: &[ItemId],
    rng: &mut R,
) -> Result<HashMap<ItemId, f64>, BanditError>
where
    S: ArmStore + ?Sized,
    R: Rng + ?Sized,
{
    Ok(draw_samples(store, item_ids, rng)?
        .into_iter()
        .map(|s| (s.item_id, s.theta))
        .collect())
}
