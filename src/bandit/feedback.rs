//! Feedback events from user interactions.
//!
//! Hosts report what the user did (`click`, `add_to_cart`, ...) and may
//! override the reward. Recording comes in two flavors:
//! - [`Bandit::record_event`] surfaces every failure
//! - [`Bandit::record_best_effort`] logs and drops failures, for feedback
//!   pipelines that must never block on the bandit

use serde::{Deserialize, Serialize};

use super::arm::{ArmState, ItemId};
use super::store::ArmStore;
use super::Bandit;
use crate::error::BanditError;

/// Reward for a low-engagement action.
pub const CLICK_REWARD: f64 = 1.0;
/// Reward for a high-engagement action.
pub const ADD_TO_CART_REWARD: f64 = 2.0;

/// What the user did with an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeedbackAction {
    Click,
    AddToCart,
    /// Any other action name. Carries no reward unless one is given.
    Other(String),
}

impl FeedbackAction {
    /// Parse an action name, case-insensitively.
    pub fn parse(action: &str) -> Self {
        match action.trim().to_ascii_lowercase().as_str() {
            "click" => FeedbackAction::Click,
            "add_to_cart" => FeedbackAction::AddToCart,
            _ => FeedbackAction::Other(action.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FeedbackAction::Click => "click",
            FeedbackAction::AddToCart => "add_to_cart",
            FeedbackAction::Other(name) => name,
        }
    }

    pub fn default_reward(&self) -> f64 {
        match self {
            FeedbackAction::Click => CLICK_REWARD,
            FeedbackAction::AddToCart => ADD_TO_CART_REWARD,
            FeedbackAction::Other(_) => 0.0,
        }
    }
}

impl From<String> for FeedbackAction {
    fn from(action: String) -> Self {
        FeedbackAction::parse(&action)
    }
}

impl From<FeedbackAction> for String {
    fn from(action: FeedbackAction) -> Self {
        action.as_str().to_string()
    }
}

fn default_impression_count() -> u64 {
    1
}

/// A single feedback event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEvent {
    pub item_id: ItemId,
    pub action: FeedbackAction,
    /// Explicit reward; overrides the action's default when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<f64>,
    #[serde(default = "default_impression_count")]
    pub impression_count: u64,
}

impl FeedbackEvent {
    pub fn new(item_id: ItemId, action: FeedbackAction) -> Self {
        Self {
            item_id,
            action,
            reward: None,
            impression_count: 1,
        }
    }

    pub fn with_reward(mut self, reward: f64) -> Self {
        self.reward = Some(reward);
        self
    }

    /// The raw reward this event contributes.
    pub fn raw_reward(&self) -> f64 {
        self.reward.unwrap_or_else(|| self.action.default_reward())
    }
}

impl<S: ArmStore> Bandit<S> {
    /// Record a feedback event, surfacing any failure.
    pub fn record_event(&self, event: &FeedbackEvent) -> Result<ArmState, BanditError> {
        self.record(event.item_id, event.raw_reward(), event.impression_count)
    }

    /// Record a feedback event; failures are logged and dropped.
    ///
    /// Returns whether the update was applied. A lost event only delays the
    /// bandit, so the caller's pipeline keeps going.
    pub fn record_best_effort(&self, event: &FeedbackEvent) -> bool {
        match self.record_event(event) {
            Ok(_) => true,
            Err(e) => {
                log::error!(
                    "Failed to update bandit state for item {} ({}): {}",
                    event.item_id,
                    event.action.as_str(),
                    e
                );
                false
            }
        }
    }
}
