//! `recobandit`: Thompson Sampling recommendations over a durable
//! Beta-Bernoulli arm store.
//!
//! Hosts feed it two things: candidate item ids (already filtered by their
//! catalog) and feedback events (item id, reward, impression count). It
//! returns ranked recommendations and per-arm / corpus statistics.
//!
//! ```no_run
//! use recobandit::{load_config, open_bandit};
//!
//! # fn main() -> Result<(), recobandit::BanditError> {
//! let bandit = open_bandit(&load_config()?)?;
//! bandit.record(42, 1.0, 1)?; // click
//! let top = bandit.recommend(&[7, 42, 99], 2)?;
//! # Ok(())
//! # }
//! ```

pub mod bandit;
pub mod catalog;
pub mod db;
mod error;
mod migrations;
pub mod state;
pub mod types;

pub use bandit::arm::{ArmDelta, ArmState, ArmStats, ItemId};
pub use bandit::feedback::{FeedbackAction, FeedbackEvent, ADD_TO_CART_REWARD, CLICK_REWARD};
pub use bandit::normalize::{RewardNormalizer, REWARD_CEILING};
pub use bandit::ranker::{Recommendation, DEFAULT_RECOMMENDATIONS};
pub use bandit::stats::BanditStatistics;
pub use bandit::store::{ArmStore, MemoryArmStore};
pub use bandit::update::MAX_IMPRESSION_COUNT;
pub use bandit::Bandit;
pub use catalog::{CatalogItem, CatalogProvider, CatalogQuery, StaticCatalog};
pub use db::{ArmDb, DbError};
pub use error::{BanditError, BanditErrorPayload, ErrorType};
pub use state::{load_config, load_config_from, open_bandit};
pub use types::Config;

/// Install the `env_logger` backend for the `log` macros used throughout the
/// crate. Defaults to `info`; `RUST_LOG` overrides. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
