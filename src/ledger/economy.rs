use super::EconomyError;
use crate::{models::economy::ConfigKey, repositories::UnitOfWork};

/// Current value of a required economy parameter, read at request time.
pub async fn require(uow: &mut dyn UnitOfWork, key: ConfigKey) -> Result<i64, EconomyError> {
    uow.config_value(key.as_str())
        .await?
        .ok_or(EconomyError::ConfigMissing(key))
}

/// Operator update of one parameter.
pub async fn update(
    uow: &mut dyn UnitOfWork,
    key: Option<&str>,
    value: Option<i64>,
) -> Result<(ConfigKey, i64), EconomyError> {
    let (Some(key), Some(value)) = (key, value) else {
        return Err(EconomyError::Validation("Key and value required".to_string()));
    };

    let key: ConfigKey = key
        .parse()
        .map_err(|_| EconomyError::Validation("Invalid config key".to_string()))?;

    if value < 0 {
        return Err(EconomyError::Validation(format!(
            "{} must not be negative",
            key
        )));
    }

    if !uow.update_config(key.as_str(), value).await? {
        return Err(EconomyError::Validation("Invalid config key".to_string()));
    }

    log::info!("Economy parameter {} set to {}", key, value);

    Ok((key, value))
}
