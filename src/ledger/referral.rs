use super::{economy, engine, EconomyError};
use crate::{
    models::{
        economy::ConfigKey,
        ledger::{ActionType, Currency},
        referrals::{NewReferralLog, ReferralKind},
        users::{User, UserId},
    },
    repositories::UnitOfWork,
};

/// Pays the earner's referrer a percentage of a qualifying credit.
///
/// The referrer's row must already be locked, together with the earner's,
/// through [`engine::lock_users`]; this function never takes a new lock out
/// of order. Returns the bonus paid, if any.
pub async fn cascade(
    uow: &mut dyn UnitOfWork,
    earner: &User,
    credited: i64,
    action: ActionType,
) -> Result<Option<i64>, EconomyError> {
    if !action.earns_referral_bonus() || credited <= 0 {
        return Ok(None);
    }

    let Some(referrer_id) = earner.referred_by else {
        return Ok(None);
    };

    let percent = economy::require(uow, ConfigKey::ReferralPercent).await?;
    if percent < 0 {
        return Err(EconomyError::Misconfigured(
            "referral_percent is negative".to_string(),
        ));
    }

    let bonus = credited
        .checked_mul(percent)
        .map(|scaled| scaled / 100)
        .ok_or_else(|| EconomyError::Validation("Amount out of range".to_string()))?;

    if bonus <= 0 {
        return Ok(None);
    }

    if uow.lock_user(referrer_id).await?.is_none() {
        log::warn!(
            "User {} refers to missing user {}, skipping bonus.",
            earner.id,
            referrer_id
        );
        return Ok(None);
    }

    engine::apply_delta(
        uow,
        referrer_id,
        Currency::Coin,
        bonus,
        ActionType::ReferralBonus,
        "lifetime_percent",
    )
    .await?;
    uow.add_referral_earnings(referrer_id, bonus).await?;
    uow.append_referral_log(&NewReferralLog {
        referrer_id,
        from_user_id: earner.id,
        amount: bonus,
        kind: ReferralKind::Percentage,
    })
    .await?;

    Ok(Some(bonus))
}

/// One-time bonus to the referrer of a freshly created account.
///
/// The referrer must be locked by the caller and differ from `new_user`.
pub async fn join_bonus(
    uow: &mut dyn UnitOfWork,
    referrer_id: UserId,
    new_user: UserId,
) -> Result<i64, EconomyError> {
    if referrer_id == new_user {
        return Err(EconomyError::Validation("Self-referral is not allowed".to_string()));
    }

    let bonus = economy::require(uow, ConfigKey::ReferralJoinBonus).await?;

    engine::apply_delta(
        uow,
        referrer_id,
        Currency::Coin,
        bonus,
        ActionType::Referral,
        "join_bonus",
    )
    .await?;
    uow.increment_referrals(referrer_id).await?;
    uow.append_referral_log(&NewReferralLog {
        referrer_id,
        from_user_id: new_user,
        amount: bonus,
        kind: ReferralKind::JoinBonus,
    })
    .await?;

    log::info!(
        "Paid join bonus of {} to user {} for referring {}.",
        bonus,
        referrer_id,
        new_user
    );

    Ok(bonus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::{finish, test_support},
        repositories::Store,
    };

    async fn credit_and_cascade(
        store: &impl Store,
        earner_id: UserId,
        amount: i64,
        action: ActionType,
    ) -> Result<Option<i64>, EconomyError> {
        let mut uow = store.begin().await.unwrap();
        let earner = uow.find_user(earner_id).await.unwrap().unwrap();
        let mut ids = vec![earner_id];
        ids.extend(earner.referred_by);

        let result = async {
            engine::lock_users(uow.as_mut(), &ids).await?;
            engine::apply_delta(uow.as_mut(), earner_id, Currency::Coin, amount, action, "test")
                .await?;
            cascade(uow.as_mut(), &earner, amount, action).await
        }
        .await;

        finish(uow, result).await
    }

    #[tokio::test]
    async fn test_five_percent_of_hundred() {
        let store = test_support::store();
        test_support::register(&store, 1, None).await;
        test_support::register(&store, 2, Some(1)).await;
        let before = test_support::user(&store, 1).await;

        let mut uow = store.begin().await.unwrap();
        let entries_before = uow.ledger_entries(1, 1000).await.unwrap().len();
        drop(uow);

        let bonus = credit_and_cascade(&store, 2, 100, ActionType::TapReward)
            .await
            .unwrap();

        let after = test_support::user(&store, 1).await;
        assert_eq!(bonus, Some(5));
        assert_eq!(after.coin_balance, before.coin_balance + 5);
        assert_eq!(after.referral_earnings, before.referral_earnings + 5);

        let mut uow = store.begin().await.unwrap();
        let entries = uow.ledger_entries(1, 1000).await.unwrap();
        assert_eq!(entries.len(), entries_before + 1);
        assert_eq!(entries[0].action, ActionType::ReferralBonus);
        assert_eq!(entries[0].amount, 5);

        let logs = uow.referral_logs(1).await.unwrap();
        assert_eq!(logs[0].kind, ReferralKind::Percentage);
        assert_eq!(logs[0].from_user_id, 2);

        test_support::assert_reconciled(&store, 1).await;
        test_support::assert_reconciled(&store, 2).await;
    }

    #[tokio::test]
    async fn test_bonus_is_floored() {
        let store = test_support::store();
        test_support::register(&store, 1, None).await;
        test_support::register(&store, 2, Some(1)).await;

        assert_eq!(
            credit_and_cascade(&store, 2, 39, ActionType::RewardAd)
                .await
                .unwrap(),
            Some(1)
        );
        assert_eq!(
            credit_and_cascade(&store, 2, 19, ActionType::RewardAd)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_non_earning_actions_do_not_cascade() {
        let store = test_support::store();
        test_support::register(&store, 1, None).await;
        test_support::register(&store, 2, Some(1)).await;

        for action in [
            ActionType::Conversion,
            ActionType::AdminAdjust,
            ActionType::Withdraw,
        ] {
            let bonus = credit_and_cascade(&store, 2, 1000, action).await.unwrap();
            assert_eq!(bonus, None);
        }
        assert_eq!(test_support::user(&store, 1).await.referral_earnings, 0);
    }

    #[tokio::test]
    async fn test_without_referrer_is_noop() {
        let store = test_support::store();
        test_support::register(&store, 2, None).await;

        let bonus = credit_and_cascade(&store, 2, 100, ActionType::Daily)
            .await
            .unwrap();
        assert_eq!(bonus, None);
    }

    #[tokio::test]
    async fn test_missing_percent_rolls_back_earner_credit() {
        let store = test_support::store();
        test_support::register(&store, 1, None).await;
        test_support::register(&store, 2, Some(1)).await;
        store.remove_config(ConfigKey::ReferralPercent);
        let before = test_support::user(&store, 2).await;

        let result = credit_and_cascade(&store, 2, 100, ActionType::TapReward).await;

        assert!(matches!(
            result,
            Err(EconomyError::ConfigMissing(ConfigKey::ReferralPercent))
        ));
        assert_eq!(test_support::user(&store, 2).await.coin_balance, before.coin_balance);
        test_support::assert_reconciled(&store, 2).await;
    }

    #[tokio::test]
    async fn test_join_bonus_refuses_self_referral() {
        let store = test_support::store();
        test_support::register(&store, 1, None).await;

        let mut uow = store.begin().await.unwrap();
        uow.lock_user(1).await.unwrap();
        let result = join_bonus(uow.as_mut(), 1, 1).await;

        assert!(matches!(result, Err(EconomyError::Validation(_))));
    }
}
