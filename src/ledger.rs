//! Balance mutation core.
//!
//! Every operation here takes the caller's unit of work by reference and
//! leaves committing to the caller, usually through [`finish`]. Failures
//! carry no partial effect once the unit of work is rolled back.

use crate::{
    models::{economy::ConfigKey, ledger::Currency, users::UserId},
    repositories::UnitOfWork,
};

pub mod accounts;
pub mod conversion;
pub mod economy;
pub mod engine;
pub mod quota;
pub mod rate_limit;
pub mod referral;
pub mod rewards;
pub mod withdrawals;

#[derive(Debug, thiserror::Error)]
pub enum EconomyError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Insufficient {0} balance")]
    InsufficientBalance(Currency),
    #[error("{0}")]
    QuotaExceeded(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0} not set in economy_config")]
    ConfigMissing(ConfigKey),
    #[error("Misconfigured economy: {0}")]
    Misconfigured(String),
    #[error("{0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl EconomyError {
    pub fn user_not_found(id: UserId) -> Self {
        EconomyError::NotFound(format!("User {}", id))
    }
}

/// Commits on success and rolls back on failure, returning the operation's
/// own result either way.
pub async fn finish<T>(
    uow: Box<dyn UnitOfWork>,
    result: Result<T, EconomyError>,
) -> Result<T, EconomyError> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_error) = uow.rollback().await {
                log::error!("Rollback failed after '{}': {}", e, rollback_error);
            }
            Err(e)
        }
    }
}
