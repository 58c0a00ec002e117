use super::{economy, engine, EconomyError};
use crate::{
    models::{
        economy::ConfigKey,
        ledger::{ActionType, Currency},
        users::UserId,
        withdrawals::Conversion,
    },
    repositories::UnitOfWork,
};

/// Buys `cash_amount` cash with coin at the current `coin_to_cash_rate`.
pub async fn convert(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
    cash_amount: Option<i64>,
) -> Result<Conversion, EconomyError> {
    let cash_amount = match cash_amount {
        Some(amount) if amount > 0 => amount,
        _ => return Err(EconomyError::Validation("Invalid amount".to_string())),
    };

    let rate = economy::require(uow, ConfigKey::CoinToCashRate).await?;
    if rate <= 0 {
        return Err(EconomyError::Misconfigured(format!(
            "coin_to_cash_rate must be positive, got {}",
            rate
        )));
    }

    let required_coin = cash_amount
        .checked_mul(rate)
        .ok_or_else(|| EconomyError::Validation("Invalid amount".to_string()))?;

    let user = uow
        .lock_user(user_id)
        .await?
        .ok_or_else(|| EconomyError::user_not_found(user_id))?;

    if user.coin_balance < required_coin {
        return Err(EconomyError::InsufficientBalance(Currency::Coin));
    }

    let coin_balance = engine::apply_delta(
        uow,
        user_id,
        Currency::Coin,
        -required_coin,
        ActionType::Conversion,
        "coin_to_cash",
    )
    .await?;
    let cash_balance = engine::apply_delta(
        uow,
        user_id,
        Currency::Cash,
        cash_amount,
        ActionType::Conversion,
        "coin_to_cash",
    )
    .await?;

    Ok(Conversion {
        converted_cash: cash_amount,
        used_coin: required_coin,
        coin_balance,
        cash_balance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::{finish, test_support},
        repositories::{memory::MemoryStore, Store},
    };

    async fn run(
        store: &MemoryStore,
        user_id: UserId,
        cash_amount: Option<i64>,
    ) -> Result<Conversion, EconomyError> {
        let mut uow = store.begin().await.unwrap();
        let result = convert(uow.as_mut(), user_id, cash_amount).await;
        finish(uow, result).await
    }

    #[tokio::test]
    async fn test_converts_at_current_rate() {
        let store = test_support::store();
        test_support::register(&store, 1, None).await;
        test_support::fund(&store, 1, Currency::Coin, 9000).await;
        let before = test_support::user(&store, 1).await;

        let conversion = run(&store, 1, Some(50)).await.unwrap();

        assert_eq!(conversion.used_coin, 5000);
        assert_eq!(conversion.converted_cash, 50);
        assert_eq!(conversion.coin_balance, before.coin_balance - 5000);
        assert_eq!(conversion.cash_balance, 50);

        let mut uow = store.begin().await.unwrap();
        let entries = uow.ledger_entries(1, 2).await.unwrap();
        assert!(entries
            .iter()
            .all(|entry| entry.action == ActionType::Conversion));
        drop(uow);

        test_support::assert_reconciled(&store, 1).await;
    }

    #[tokio::test]
    async fn test_insufficient_coin_changes_nothing() {
        let store = test_support::store();
        let user = test_support::register(&store, 1, None).await;

        let result = run(&store, 1, Some(user.coin_balance / 100 + 1)).await;

        assert!(matches!(
            result,
            Err(EconomyError::InsufficientBalance(Currency::Coin))
        ));
        let after = test_support::user(&store, 1).await;
        assert_eq!(after.coin_balance, user.coin_balance);
        assert_eq!(after.cash_balance, 0);
    }

    #[tokio::test]
    async fn test_rejects_bad_amounts_and_rates() {
        let store = test_support::store();
        test_support::register(&store, 1, None).await;

        assert!(matches!(
            run(&store, 1, None).await,
            Err(EconomyError::Validation(_))
        ));
        assert!(matches!(
            run(&store, 1, Some(0)).await,
            Err(EconomyError::Validation(_))
        ));
        assert!(matches!(
            run(&store, 1, Some(i64::MAX)).await,
            Err(EconomyError::Validation(_))
        ));

        test_support::set_config(&store, "coin_to_cash_rate", 0).await;
        assert!(matches!(
            run(&store, 1, Some(1)).await,
            Err(EconomyError::Misconfigured(_))
        ));
    }
}
