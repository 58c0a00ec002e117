use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{economy, engine, EconomyError};
use crate::{
    models::{
        economy::ConfigKey,
        ledger::{ActionType, Currency},
        users::UserId,
        withdrawals::{NewWithdrawRequest, WithdrawRequest, WithdrawStatus},
    },
    repositories::UnitOfWork,
};

#[derive(Clone, Debug, Deserialize)]
pub struct WithdrawalForm {
    pub amount: Option<i64>,
    pub method: Option<String>,
    pub account_number: Option<String>,
}

/// Debits the cash and files a pending request in one unit of work.
pub async fn create(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
    form: WithdrawalForm,
    now: DateTime<Utc>,
) -> Result<WithdrawRequest, EconomyError> {
    let (Some(amount), Some(method), Some(account_number)) =
        (form.amount, form.method, form.account_number)
    else {
        return Err(EconomyError::Validation("Missing fields".to_string()));
    };

    let method = method.trim().to_string();
    let account_number = account_number.trim().to_string();

    if amount <= 0 {
        return Err(EconomyError::Validation("Amount must be positive".to_string()));
    }
    if method.is_empty() || account_number.is_empty() {
        return Err(EconomyError::Validation("Missing fields".to_string()));
    }

    let minimum = economy::require(uow, ConfigKey::MinWithdrawCash).await?;
    if amount < minimum {
        return Err(EconomyError::Validation(format!(
            "Minimum withdraw is {} cash",
            minimum
        )));
    }

    let user = uow
        .lock_user(user_id)
        .await?
        .ok_or_else(|| EconomyError::user_not_found(user_id))?;

    if user.cash_balance < amount {
        return Err(EconomyError::InsufficientBalance(Currency::Cash));
    }

    engine::apply_delta(
        uow,
        user_id,
        Currency::Cash,
        -amount,
        ActionType::Withdraw,
        "cash_withdraw",
    )
    .await?;

    let request = uow
        .insert_withdrawal(&NewWithdrawRequest {
            user_id,
            amount,
            method,
            account_number,
            created_at: now,
        })
        .await?;

    log::info!(
        "Withdrawal {} of {} cash filed by user {}",
        request.id,
        amount,
        user_id
    );

    Ok(request)
}

async fn lock_pending(
    uow: &mut dyn UnitOfWork,
    request_id: &str,
) -> Result<WithdrawRequest, EconomyError> {
    let request = uow
        .lock_withdrawal(request_id)
        .await?
        .ok_or_else(|| EconomyError::NotFound("Request".to_string()))?;

    if request.status != WithdrawStatus::Pending {
        return Err(EconomyError::InvalidState(format!(
            "Request already {}",
            request.status
        )));
    }

    Ok(request)
}

pub async fn approve(
    uow: &mut dyn UnitOfWork,
    request_id: &str,
    now: DateTime<Utc>,
) -> Result<WithdrawRequest, EconomyError> {
    let mut request = lock_pending(uow, request_id).await?;

    uow.set_withdrawal_status(request_id, WithdrawStatus::Approved, now)
        .await?;
    request.status = WithdrawStatus::Approved;
    request.decided_at = Some(now);

    log::info!("Withdrawal {} approved", request_id);

    Ok(request)
}

/// Rejects a pending request and refunds its amount to the owner.
///
/// The request row is locked before the owner's row.
pub async fn reject(
    uow: &mut dyn UnitOfWork,
    request_id: &str,
    now: DateTime<Utc>,
) -> Result<WithdrawRequest, EconomyError> {
    let mut request = lock_pending(uow, request_id).await?;

    engine::apply_delta(
        uow,
        request.user_id,
        Currency::Cash,
        request.amount,
        ActionType::AdminAdjust,
        "withdraw_reject_refund",
    )
    .await?;

    uow.set_withdrawal_status(request_id, WithdrawStatus::Rejected, now)
        .await?;
    request.status = WithdrawStatus::Rejected;
    request.decided_at = Some(now);

    log::info!(
        "Withdrawal {} rejected, refunded {} cash to user {}",
        request_id,
        request.amount,
        request.user_id
    );

    Ok(request)
}

pub async fn for_user(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
) -> Result<Vec<WithdrawRequest>, EconomyError> {
    Ok(uow.withdrawals_by_user(user_id).await?)
}

pub async fn by_status(
    uow: &mut dyn UnitOfWork,
    status: WithdrawStatus,
) -> Result<Vec<WithdrawRequest>, EconomyError> {
    Ok(uow.withdrawals_by_status(status).await?)
}

#[cfg(test)]
mod tests {
    use futures_util::future::join_all;

    use super::*;
    use crate::{
        ledger::{finish, test_support},
        repositories::{memory::MemoryStore, Store},
    };

    fn form(amount: i64) -> WithdrawalForm {
        WithdrawalForm {
            amount: Some(amount),
            method: Some("bkash".to_string()),
            account_number: Some("01700000000".to_string()),
        }
    }

    async fn file(
        store: &MemoryStore,
        user_id: UserId,
        amount: i64,
    ) -> Result<WithdrawRequest, EconomyError> {
        let mut uow = store.begin().await.unwrap();
        let result = create(uow.as_mut(), user_id, form(amount), Utc::now()).await;
        finish(uow, result).await
    }

    async fn decide(
        store: &MemoryStore,
        request_id: &str,
        approved: bool,
    ) -> Result<WithdrawRequest, EconomyError> {
        let mut uow = store.begin().await.unwrap();
        let result = if approved {
            approve(uow.as_mut(), request_id, Utc::now()).await
        } else {
            reject(uow.as_mut(), request_id, Utc::now()).await
        };
        finish(uow, result).await
    }

    async fn funded_user(store: &MemoryStore, cash: i64) -> UserId {
        test_support::register(store, 1, None).await;
        test_support::fund(store, 1, Currency::Cash, cash).await;
        1
    }

    #[tokio::test]
    async fn test_create_debits_and_files_pending() {
        let store = test_support::store();
        let user_id = funded_user(&store, 5000).await;

        let request = file(&store, user_id, 2000).await.unwrap();

        assert_eq!(request.status, WithdrawStatus::Pending);
        assert_eq!(test_support::user(&store, user_id).await.cash_balance, 3000);

        let mut uow = store.begin().await.unwrap();
        let entries = uow.ledger_entries(user_id, 1).await.unwrap();
        assert_eq!(entries[0].action, ActionType::Withdraw);
        assert_eq!(entries[0].amount, -2000);
        assert_eq!(for_user(uow.as_mut(), user_id).await.unwrap().len(), 1);
        drop(uow);

        test_support::assert_reconciled(&store, user_id).await;
    }

    #[tokio::test]
    async fn test_create_validation() {
        let store = test_support::store();
        let user_id = funded_user(&store, 5000).await;

        assert!(matches!(
            file(&store, user_id, 999).await,
            Err(EconomyError::Validation(_))
        ));
        assert!(matches!(
            file(&store, user_id, -5).await,
            Err(EconomyError::Validation(_))
        ));
        assert!(matches!(
            file(&store, user_id, 5001).await,
            Err(EconomyError::InsufficientBalance(Currency::Cash))
        ));

        let mut uow = store.begin().await.unwrap();
        let blank = WithdrawalForm {
            method: Some("  ".to_string()),
            ..form(2000)
        };
        assert!(matches!(
            create(uow.as_mut(), user_id, blank, Utc::now()).await,
            Err(EconomyError::Validation(_))
        ));
        drop(uow);

        assert_eq!(test_support::user(&store, user_id).await.cash_balance, 5000);
    }

    #[tokio::test]
    async fn test_reject_refunds_once() {
        let store = test_support::store();
        let user_id = funded_user(&store, 5000).await;
        let request = file(&store, user_id, 2000).await.unwrap();

        let rejected = decide(&store, &request.id, false).await.unwrap();
        assert_eq!(rejected.status, WithdrawStatus::Rejected);
        assert!(rejected.decided_at.is_some());
        assert_eq!(test_support::user(&store, user_id).await.cash_balance, 5000);

        assert!(matches!(
            decide(&store, &request.id, false).await,
            Err(EconomyError::InvalidState(_))
        ));
        assert!(matches!(
            decide(&store, &request.id, true).await,
            Err(EconomyError::InvalidState(_))
        ));
        assert_eq!(test_support::user(&store, user_id).await.cash_balance, 5000);
        test_support::assert_reconciled(&store, user_id).await;
    }

    #[tokio::test]
    async fn test_approve_then_reject_keeps_debit() {
        let store = test_support::store();
        let user_id = funded_user(&store, 5000).await;
        let request = file(&store, user_id, 2000).await.unwrap();

        decide(&store, &request.id, true).await.unwrap();
        assert!(matches!(
            decide(&store, &request.id, false).await,
            Err(EconomyError::InvalidState(_))
        ));

        assert_eq!(test_support::user(&store, user_id).await.cash_balance, 3000);
        test_support::assert_reconciled(&store, user_id).await;
    }

    #[tokio::test]
    async fn test_unknown_request() {
        let store = test_support::store();

        assert!(matches!(
            decide(&store, "missing", true).await,
            Err(EconomyError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_decisions_have_one_winner() {
        let store = test_support::store();
        let user_id = funded_user(&store, 5000).await;
        let request = file(&store, user_id, 2000).await.unwrap();

        let decisions = [true, true, false, false].map(|approved| {
            let store = store.clone();
            let request_id = request.id.clone();
            tokio::spawn(async move { decide(&store, &request_id, approved).await })
        });

        let results = join_all(decisions).await;
        let winners = results
            .iter()
            .filter(|result| matches!(result, Ok(Ok(_))))
            .count();
        let losers = results
            .iter()
            .filter(|result| matches!(result, Ok(Err(EconomyError::InvalidState(_)))))
            .count();

        assert_eq!(winners, 1);
        assert_eq!(losers, 3);

        let mut uow = store.begin().await.unwrap();
        let pending = by_status(uow.as_mut(), WithdrawStatus::Pending).await.unwrap();
        assert!(pending.is_empty());
        drop(uow);

        test_support::assert_reconciled(&store, user_id).await;
    }
}
