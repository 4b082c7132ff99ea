//! Configuration loading and engine bootstrap.

use std::fs;
use std::path::{Path, PathBuf};

use crate::bandit::normalize::RewardNormalizer;
use crate::bandit::Bandit;
use crate::db::ArmDb;
use crate::error::BanditError;
use crate::types::Config;

/// `~/.recobandit/config.json`
pub fn config_path() -> Result<PathBuf, BanditError> {
    let home = dirs::home_dir()
        .ok_or_else(|| BanditError::Config("Could not find home directory".to_string()))?;
    Ok(home.join(".recobandit").join("config.json"))
}

/// Load configuration from ~/.recobandit/config.json, or defaults if the
/// file does not exist.
pub fn load_config() -> Result<Config, BanditError> {
    let path = config_path()?;
    if !path.exists() {
        log::info!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    load_config_from(&path)
}

/// Load and validate configuration from an explicit file.
pub fn load_config_from(path: &Path) -> Result<Config, BanditError> {
    let content = fs::read_to_string(path).map_err(|e| {
        BanditError::Config(format!("Failed to read config {}: {}", path.display(), e))
    })?;

    let config: Config = serde_json::from_str(&content)
        .map_err(|e| BanditError::Config(format!("Failed to parse config: {}", e)))?;

    config.validate()?;
    Ok(config)
}

/// Open the durable arm store named by `config` and wire up the engine.
pub fn open_bandit(config: &Config) -> Result<Bandit<ArmDb>, BanditError> {
    config.validate()?;
    let normalizer = RewardNormalizer::new(config.reward_ceiling)?;
    let db = ArmDb::open(config)?;

    log::info!(
        "Bandit ready: store={}, reward ceiling={}, default count={}",
        db.path().display(),
        normalizer.ceiling(),
        config.default_recommendations
    );

    Ok(Bandit::with_normalizer(db, normalizer).with_default_count(config.default_recommendations))
}
