//! Arm state storage contract and the in-memory arena.

use dashmap::DashMap;

use super::arm::{ArmDelta, ArmState, ItemId};
use crate::error::BanditError;

/// Durable mapping from item id to its arm state.
///
/// Implementations must make `get_or_create` idempotent and `apply_delta`
/// atomic per item: two concurrent deltas for one item are both reflected,
/// and deltas for different items never wait on each other for longer than
/// one arithmetic update. Any backing-store failure is reported as
/// [`BanditError::StorageUnavailable`] with no partial change.
pub trait ArmStore {
    /// Return the stored state, creating it at the prior if absent.
    fn get_or_create(&self, item_id: ItemId) -> Result<ArmState, BanditError>;

    /// Atomically fold `delta` into the item's state (creating it first if
    /// needed) and return the new state.
    fn apply_delta(&self, item_id: ItemId, delta: &ArmDelta) -> Result<ArmState, BanditError>;

    fn get(&self, item_id: ItemId) -> Result<Option<ArmState>, BanditError>;

    /// Every stored arm, ordered by item id.
    fn all(&self) -> Result<Vec<ArmState>, BanditError>;
}

/// In-memory arm arena with per-shard locking.
///
/// Creation and updates go through the map's entry API, which holds the
/// shard's write lock for the whole read-modify-write.
#[derive(Debug, Default)]
pub struct MemoryArmStore {
    arms: DashMap<ItemId, ArmState>,
}

impl MemoryArmStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.arms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }
}

impl ArmStore for MemoryArmStore {
    fn get_or_create(&self, item_id: ItemId) -> Result<ArmState, BanditError> {
        let entry = self
            .arms
            .entry(item_id)
            .or_insert_with(|| ArmState::new(item_id));
        Ok(entry.value().clone())
    }

    fn apply_delta(&self, item_id: ItemId, delta: &ArmDelta) -> Result<ArmState, BanditError> {
        let mut entry = self
            .arms
            .entry(item_id)
            .or_insert_with(|| ArmState::new(item_id));
        let next = entry.value().apply(delta);
        *entry.value_mut() = next.clone();
        Ok(next)
    }

    fn get(&self, item_id: ItemId) -> Result<Option<ArmState>, BanditError> {
        Ok(self.arms.get(&item_id).map(|arm| arm.value().clone()))
    }

    fn all(&self) -> Result<Vec<ArmState>, BanditError> {
        let mut arms: Vec<ArmState> = self.arms.iter().map(|arm| arm.value().clone()).collect();
        arms.sort_by_key(|arm| arm.item_id);
        Ok(arms)
    }
}
