use super::EconomyError;
use crate::{
    models::{
        ledger::{ActionType, Currency, NewLedgerEntry, Reconciliation},
        users::{User, UserId},
    },
    repositories::UnitOfWork,
};

/// Applies a signed delta to one balance of one user and records it.
///
/// Locks the user row (re-entrant), refuses to go below zero, writes the new
/// balance and appends exactly one ledger entry. Returns the new balance.
pub async fn apply_delta(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
    currency: Currency,
    amount: i64,
    action: ActionType,
    source: &str,
) -> Result<i64, EconomyError> {
    let user = uow
        .lock_user(user_id)
        .await?
        .ok_or_else(|| EconomyError::user_not_found(user_id))?;

    let new_balance = user
        .balance(currency)
        .checked_add(amount)
        .ok_or_else(|| EconomyError::Validation("Amount out of range".to_string()))?;

    if new_balance < 0 {
        return Err(EconomyError::InsufficientBalance(currency));
    }

    uow.set_balance(user_id, currency, new_balance).await?;
    uow.append_ledger(&NewLedgerEntry {
        user_id,
        currency,
        amount,
        action,
        source: source.to_string(),
    })
    .await?;

    log::debug!(
        "Applied {} {} to user {} ({:?}/{}), balance now {}",
        amount,
        currency,
        user_id,
        action,
        source,
        new_balance
    );

    Ok(new_balance)
}

/// Locks several user rows in ascending id order. Every operation that holds
/// more than one user lock takes them through here.
///
/// Ids without a row are skipped; callers decide whether that matters.
pub async fn lock_users(
    uow: &mut dyn UnitOfWork,
    ids: &[UserId],
) -> Result<Vec<User>, EconomyError> {
    let mut ordered = ids.to_vec();
    ordered.sort_unstable();
    ordered.dedup();

    let mut users = Vec::with_capacity(ordered.len());
    for id in ordered {
        if let Some(user) = uow.lock_user(id).await? {
            users.push(user);
        }
    }

    Ok(users)
}

pub async fn reconcile(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
) -> Result<Reconciliation, EconomyError> {
    let user = uow
        .find_user(user_id)
        .await?
        .ok_or_else(|| EconomyError::user_not_found(user_id))?;

    let coin_ledger_sum = uow.ledger_sum(user_id, Currency::Coin).await?;
    let cash_ledger_sum = uow.ledger_sum(user_id, Currency::Cash).await?;

    Ok(Reconciliation {
        user_id,
        coin_balance: user.coin_balance,
        coin_ledger_sum,
        cash_balance: user.cash_balance,
        cash_ledger_sum,
    })
}
