use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use super::{
    economy, engine,
    quota::{self, QuotaPolicies},
    referral, EconomyError,
};
use crate::{
    models::{
        economy::ConfigKey,
        ledger::{ActionType, Currency},
        quotas::QuotaAction,
        users::UserId,
    },
    repositories::UnitOfWork,
};

/// Earning actions a user can claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardAction {
    Tap,
    WatchAd,
    Spin,
    Daily,
    Shortlink,
}

impl RewardAction {
    pub fn quota_action(&self) -> QuotaAction {
        match self {
            RewardAction::Tap => QuotaAction::Tap,
            RewardAction::WatchAd => QuotaAction::Ad,
            RewardAction::Spin => QuotaAction::Spin,
            RewardAction::Daily => QuotaAction::Daily,
            RewardAction::Shortlink => QuotaAction::Shortlink,
        }
    }

    pub fn ledger_action(&self) -> ActionType {
        match self {
            RewardAction::Tap => ActionType::TapReward,
            RewardAction::WatchAd => ActionType::RewardAd,
            RewardAction::Spin => ActionType::SpinReward,
            RewardAction::Daily => ActionType::Daily,
            RewardAction::Shortlink => ActionType::ShortlinkReward,
        }
    }

    fn source(&self) -> &'static str {
        match self {
            RewardAction::Tap => "tap",
            RewardAction::WatchAd => "ad_watch",
            RewardAction::Spin => "spin_wheel",
            RewardAction::Daily => "daily_bonus",
            RewardAction::Shortlink => "shortlink",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RewardOutcome {
    pub action: RewardAction,
    pub reward: i64,
    pub coin_balance: i64,
    pub referral_bonus: Option<i64>,
}

/// Credits one earning action: quota, reward amount, ledger entry and
/// referral bonus, all inside `uow`.
pub async fn claim<R: Rng + Send>(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
    action: RewardAction,
    policies: &QuotaPolicies,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<RewardOutcome, EconomyError> {
    // `referred_by` never changes, so an unlocked read is enough to know
    // which rows to lock.
    let earner = uow
        .find_user(user_id)
        .await?
        .ok_or_else(|| EconomyError::user_not_found(user_id))?;

    let mut ids = vec![earner.id];
    ids.extend(earner.referred_by);
    let locked = engine::lock_users(uow, &ids).await?;

    let earner = locked
        .into_iter()
        .find(|user| user.id == user_id)
        .ok_or_else(|| EconomyError::user_not_found(user_id))?;

    quota::check_and_reserve(
        uow,
        user_id,
        action.quota_action(),
        policies.for_action(action.quota_action()),
        now,
    )
    .await?;

    let reward = reward_amount(uow, action, rng).await?;
    let coin_balance = engine::apply_delta(
        uow,
        user_id,
        Currency::Coin,
        reward,
        action.ledger_action(),
        action.source(),
    )
    .await?;

    let referral_bonus =
        referral::cascade(uow, &earner, reward, action.ledger_action()).await?;

    log::debug!(
        "User {} claimed {:?} for {} coin (referral bonus {:?})",
        user_id,
        action,
        reward,
        referral_bonus
    );

    Ok(RewardOutcome {
        action,
        reward,
        coin_balance,
        referral_bonus,
    })
}

async fn reward_amount<R: Rng + Send>(
    uow: &mut dyn UnitOfWork,
    action: RewardAction,
    rng: &mut R,
) -> Result<i64, EconomyError> {
    let amount = match action {
        RewardAction::Tap => economy::require(uow, ConfigKey::TapReward).await?,
        RewardAction::WatchAd => economy::require(uow, ConfigKey::AdReward).await?,
        RewardAction::Daily => economy::require(uow, ConfigKey::DailyReward).await?,
        RewardAction::Shortlink => economy::require(uow, ConfigKey::ShortlinkReward).await?,
        RewardAction::Spin => {
            let min = economy::require(uow, ConfigKey::SpinMinReward).await?;
            let max = economy::require(uow, ConfigKey::SpinMaxReward).await?;

            if min > max {
                return Err(EconomyError::Misconfigured(format!(
                    "spin_min_reward {} exceeds spin_max_reward {}",
                    min, max
                )));
            }

            rng.gen_range(min..=max)
        }
    };

    if amount < 0 {
        return Err(EconomyError::Misconfigured(format!(
            "negative reward configured for {:?}",
            action
        )));
    }

    Ok(amount)
}
