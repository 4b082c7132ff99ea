//! Error types for the bandit engine
//!
//! Errors are classified by who can fix them:
//! - Retryable: the backing store could not be reached
//! - NonRetryable: bad input (rewards, impression counts) or bad configuration

use thiserror::Error;

use crate::db::DbError;

/// Error types for bandit operations
#[derive(Debug, Error)]
pub enum BanditError {
    // Retryable errors
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    // Non-retryable errors
    #[error("Invalid reward {0}: rewards must be finite and non-negative")]
    InvalidReward(f64),

    #[error("Invalid impression count {0}: at most {max} impressions per event", max = i64::MAX)]
    InvalidImpressionCount(u64),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BanditError {
    /// Returns true if the caller may try the operation again.
    ///
    /// The engine never retries by itself. Re-sending a feedback event after a
    /// storage failure is only safe when the caller knows the first attempt
    /// did not commit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BanditError::StorageUnavailable(_))
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BanditError::StorageUnavailable(_) => {
                "Check that the arm database is reachable. Feedback that failed was not applied; \
                 do not re-send feedback that may already have been recorded."
            }
            BanditError::InvalidReward(_) => {
                "Send a finite, non-negative reward (1.0 for a click, 2.0 for add-to-cart)."
            }
            BanditError::InvalidImpressionCount(_) => {
                "Send the number of impressions this single event covers."
            }
            BanditError::Config(_) => "Check the configuration in ~/.recobandit/config.json",
        }
    }
}

impl From<DbError> for BanditError {
    fn from(err: DbError) -> Self {
        BanditError::StorageUnavailable(err.to_string())
    }
}

/// Serializable error representation for hosts
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BanditErrorPayload {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
}

impl From<&BanditError> for BanditErrorPayload {
    fn from(err: &BanditError) -> Self {
        let error_type = if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        BanditErrorPayload {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}
