use chrono::{DateTime, Utc};

use super::{economy, engine, referral, EconomyError};
use crate::{
    models::{
        economy::ConfigKey,
        ledger::{ActionType, Currency, LedgerEntry},
        quotas::QuotaAction,
        referrals::ReferralLog,
        users::{NewUser, Registered, ReferredUser, User, UserId, UserProfile},
    },
    repositories::UnitOfWork,
};

/// Creates the account on first contact. Registering an existing id changes
/// nothing, so the signup and join bonuses are paid at most once.
///
/// A concurrent registration of the same id that commits first turns this
/// one into the existing-account case rather than an error.
///
/// A referrer that is the user itself or does not exist is ignored.
pub async fn register(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
    username: &str,
    referrer: Option<UserId>,
    now: DateTime<Utc>,
) -> Result<Registered, EconomyError> {
    if let Some(user) = uow.find_user(user_id).await? {
        return Ok(Registered {
            user,
            created: false,
            join_bonus: None,
        });
    }

    let referrer = match referrer {
        Some(referrer_id) if referrer_id == user_id => {
            log::warn!("User {} tried to refer themselves", user_id);
            None
        }
        Some(referrer_id) => match uow.lock_user(referrer_id).await? {
            Some(_) => Some(referrer_id),
            None => {
                log::warn!(
                    "User {} registered with unknown referrer {}",
                    user_id,
                    referrer_id
                );
                None
            }
        },
        None => None,
    };

    let inserted = uow
        .insert_user(&NewUser {
            id: user_id,
            username: username.to_string(),
            referred_by: referrer,
            created_at: now,
        })
        .await?;

    if inserted.is_none() {
        log::info!("User {} was registered concurrently", user_id);
        let user = existing_user(uow, user_id).await?;
        return Ok(Registered {
            user,
            created: false,
            join_bonus: None,
        });
    }

    let signup_bonus = economy::require(uow, ConfigKey::SignupBonus).await?;
    if signup_bonus > 0 {
        engine::apply_delta(
            uow,
            user_id,
            Currency::Coin,
            signup_bonus,
            ActionType::SignupBonus,
            "signup",
        )
        .await?;
    }

    let join_bonus = match referrer {
        Some(referrer_id) => Some(referral::join_bonus(uow, referrer_id, user_id).await?),
        None => None,
    };

    let user = uow
        .lock_user(user_id)
        .await?
        .ok_or_else(|| EconomyError::user_not_found(user_id))?;

    log::info!(
        "Registered user {} ({}), referred by {:?}",
        user_id,
        username,
        referrer
    );

    Ok(Registered {
        user,
        created: true,
        join_bonus,
    })
}

async fn existing_user(uow: &mut dyn UnitOfWork, user_id: UserId) -> Result<User, EconomyError> {
    uow.find_user(user_id)
        .await?
        .ok_or_else(|| EconomyError::user_not_found(user_id))
}

pub async fn profile(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<UserProfile, EconomyError> {
    let user = existing_user(uow, user_id).await?;
    let daily_tap_count = uow
        .quota(user_id, QuotaAction::Tap)
        .await?
        .map(|state| state.claims_on(now.date_naive()))
        .unwrap_or(0);

    Ok(UserProfile {
        id: user.id,
        username: user.username,
        coin_balance: user.coin_balance,
        cash_balance: user.cash_balance,
        referrals: user.referrals,
        referral_earnings: user.referral_earnings,
        daily_tap_count,
    })
}

pub async fn referred_users(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
) -> Result<Vec<ReferredUser>, EconomyError> {
    existing_user(uow, user_id).await?;

    let users = uow.referred_users(user_id).await?;
    Ok(users.into_iter().map(ReferredUser::from).collect())
}

pub async fn referral_history(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
) -> Result<Vec<ReferralLog>, EconomyError> {
    existing_user(uow, user_id).await?;
    Ok(uow.referral_logs(user_id).await?)
}

/// Most recent ledger entries first.
pub async fn ledger_history(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
    limit: i64,
) -> Result<Vec<LedgerEntry>, EconomyError> {
    existing_user(uow, user_id).await?;
    Ok(uow.ledger_entries(user_id, limit.clamp(1, 500)).await?)
}
