//! Thompson Sampling recommendation engine.
//!
//! Feedback flows into [`update`], which folds it into the arm store.
//! Recommendation requests flow through [`sampling`] and [`ranker`], which
//! read the store. The two paths share nothing but the store.

pub mod arm;
pub mod feedback;
pub mod normalize;
pub mod ranker;
pub mod sampling;
pub mod stats;
pub mod store;
pub mod update;

use std::collections::HashMap;

use rand::Rng;

use crate::catalog::{CatalogProvider, CatalogQuery};
use crate::error::BanditError;
use arm::{ArmState, ArmStats, ItemId};
use normalize::RewardNormalizer;
use ranker::Recommendation;
use stats::BanditStatistics;
use store::ArmStore;

/// Bandit engine over an arm store.
///
/// Holds no mutable state of its own; share it by reference across threads
/// when the store is `Sync`.
#[derive(Debug)]
pub struct Bandit<S> {
    store: S,
    normalizer: RewardNormalizer,
    default_count: usize,
}

impl<S: ArmStore> Bandit<S> {
    /// Engine with the default reward ceiling.
    pub fn new(store: S) -> Self {
        Self::with_normalizer(store, RewardNormalizer::default())
    }

    pub fn with_normalizer(store: S, normalizer: RewardNormalizer) -> Self {
        Self {
            store,
            normalizer,
            default_count: ranker::DEFAULT_RECOMMENDATIONS,
        }
    }

    /// Set the count used by [`Bandit::recommend_default`]. Zero is ignored.
    pub fn with_default_count(mut self, count: usize) -> Self {
        if count > 0 {
            self.default_count = count;
        }
        self
    }

    pub fn default_count(&self) -> usize {
        self.default_count
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn normalizer(&self) -> &RewardNormalizer {
        &self.normalizer
    }

    /// Apply one feedback event to `item_id`.
    pub fn record(
        &self,
        item_id: ItemId,
        raw_reward: f64,
        impression_count: u64,
    ) -> Result<ArmState, BanditError> {
        update::record(&self.store, &self.normalizer, item_id, raw_reward, impression_count)
    }

    /// One θ per distinct id, drawn from the thread-local generator.
    pub fn sample(&self, item_ids: &[ItemId]) -> Result<HashMap<ItemId, f64>, BanditError> {
        sampling::sample(&self.store, item_ids, &mut rand::rng())
    }

    pub fn sample_with_rng<R: Rng + ?Sized>(
        &self,
        item_ids: &[ItemId],
        rng: &mut R,
    ) -> Result<HashMap<ItemId, f64>, BanditError> {
        sampling::sample(&self.store, item_ids, rng)
    }

    /// Rank pre-filtered candidates and return at most `count` of them.
    pub fn recommend(
        &self,
        candidates: &[ItemId],
        count: usize,
    ) -> Result<Vec<Recommendation>, BanditError> {
        ranker::recommend(&self.store, candidates, count, &mut rand::rng())
    }

    /// [`Bandit::recommend`] with the configured default count.
    pub fn recommend_default(
        &self,
        candidates: &[ItemId],
    ) -> Result<Vec<Recommendation>, BanditError> {
        self.recommend(candidates, self.default_count)
    }

    pub fn recommend_with_rng<R: Rng + ?Sized>(
        &self,
        candidates: &[ItemId],
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Recommendation>, BanditError> {
        ranker::recommend(&self.store, candidates, count, rng)
    }

    /// Fetch candidates from the catalog, then rank them.
    pub fn recommend_from_catalog<C: CatalogProvider + ?Sized>(
        &self,
        catalog: &C,
        query: &CatalogQuery,
        count: usize,
    ) -> Result<Vec<Recommendation>, BanditError> {
        self.recommend_from_catalog_with_rng(catalog, query, count, &mut rand::rng())
    }

    pub fn recommend_from_catalog_with_rng<C, R>(
        &self,
        catalog: &C,
        query: &CatalogQuery,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Recommendation>, BanditError>
    where
        C: CatalogProvider + ?Sized,
        R: Rng + ?Sized,
    {
        let candidates = catalog.candidates(query)?;
        if candidates.is_empty() {
            log::warn!("No catalog items available for recommendations ({query:?})");
            return Ok(Vec::new());
        }
        ranker::recommend(&self.store, &candidates, count, rng)
    }

    pub fn statistics(&self) -> Result<BanditStatistics, BanditError> {
        stats::aggregate(&self.store)
    }

    pub fn arm_stats(&self, item_id: ItemId) -> Result<ArmStats, BanditError> {
        stats::arm_stats(&self.store, item_id)
    }
}
