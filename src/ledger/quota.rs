use chrono::{DateTime, Duration, Utc};

use super::EconomyError;
use crate::{
    models::{
        quotas::{QuotaAction, QuotaState},
        users::UserId,
    },
    repositories::UnitOfWork,
    settings,
};

/// How claims of one action kind are bounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuotaPolicy {
    /// At most `limit` claims per UTC calendar day.
    CalendarDay { limit: i64 },
    /// At most one claim per `window`, measured from the last claim.
    Rolling { window: Duration },
}

#[derive(Clone, Debug)]
pub struct QuotaPolicies {
    pub tap: QuotaPolicy,
    pub ad: QuotaPolicy,
    pub spin: QuotaPolicy,
    pub shortlink: QuotaPolicy,
    pub daily: QuotaPolicy,
}

impl QuotaPolicies {
    pub fn from_settings(quotas: &settings::Quotas) -> Self {
        let spin = match quotas.spin_cooldown_hours {
            Some(hours) => QuotaPolicy::Rolling {
                window: cooldown(hours),
            },
            None => QuotaPolicy::CalendarDay {
                limit: quotas.spin_daily_limit,
            },
        };

        Self {
            tap: QuotaPolicy::CalendarDay {
                limit: quotas.tap_daily_limit,
            },
            ad: QuotaPolicy::CalendarDay {
                limit: quotas.ad_daily_limit,
            },
            spin,
            shortlink: QuotaPolicy::CalendarDay {
                limit: quotas.shortlink_daily_limit,
            },
            daily: QuotaPolicy::Rolling {
                window: cooldown(quotas.daily_cooldown_hours),
            },
        }
    }

    pub fn for_action(&self, action: QuotaAction) -> QuotaPolicy {
        match action {
            QuotaAction::Tap => self.tap,
            QuotaAction::Ad => self.ad,
            QuotaAction::Spin => self.spin,
            QuotaAction::Shortlink => self.shortlink,
            QuotaAction::Daily => self.daily,
        }
    }
}

// `Settings::load` rejects out-of-range values; the clamp covers settings
// built in code.
fn cooldown(hours: i64) -> Duration {
    Duration::hours(hours.clamp(1, settings::MAX_COOLDOWN_HOURS))
}

impl Default for QuotaPolicies {
    fn default() -> Self {
        Self::from_settings(&settings::Quotas::default())
    }
}

/// Checks the user's quota for `action` and, if a claim is allowed, records
/// it in the caller's unit of work.
///
/// The caller must hold the user's row lock so the read and the increment
/// are not interleaved with another claim.
pub async fn check_and_reserve(
    uow: &mut dyn UnitOfWork,
    user_id: UserId,
    action: QuotaAction,
    policy: QuotaPolicy,
    now: DateTime<Utc>,
) -> Result<QuotaState, EconomyError> {
    let state = uow.quota(user_id, action).await?.unwrap_or_default();

    let next = match policy {
        QuotaPolicy::CalendarDay { limit } => {
            let today = now.date_naive();
            let claims = state.claims_on(today);

            if claims >= limit {
                return Err(EconomyError::QuotaExceeded(format!(
                    "Daily {} limit reached",
                    action
                )));
            }

            QuotaState {
                claims: claims + 1,
                window_date: Some(today),
                last_claim_at: Some(now),
            }
        }
        QuotaPolicy::Rolling { window } => {
            if let Some(last_claim_at) = state.last_claim_at {
                if now - last_claim_at < window {
                    return Err(EconomyError::QuotaExceeded(cooldown_message(action)));
                }
            }

            QuotaState {
                claims: state.claims + 1,
                window_date: Some(now.date_naive()),
                last_claim_at: Some(now),
            }
        }
    };

    uow.save_quota(user_id, action, &next).await?;

    Ok(next)
}

fn cooldown_message(action: QuotaAction) -> String {
    match action {
        QuotaAction::Daily => "Daily already claimed".to_string(),
        other => format!("The {} cooldown has not elapsed", other),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        ledger::{finish, test_support},
        repositories::{memory::MemoryStore, Store},
    };

    async fn claim(
        store: &MemoryStore,
        user_id: UserId,
        action: QuotaAction,
        policy: QuotaPolicy,
        now: DateTime<Utc>,
    ) -> Result<QuotaState, EconomyError> {
        let mut uow = store.begin().await.unwrap();
        uow.lock_user(user_id).await.unwrap();
        let result = check_and_reserve(uow.as_mut(), user_id, action, policy, now).await;
        finish(uow, result).await
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_tap_limit_resets_at_day_boundary() {
        let store = test_support::store();
        test_support::register(&store, 1, None).await;
        let policy = QuotaPolicies::default().tap;

        for _ in 0..480 {
            claim(&store, 1, QuotaAction::Tap, policy, at(10, 23)).await.unwrap();
        }

        let rejected = claim(&store, 1, QuotaAction::Tap, policy, at(10, 23)).await;
        assert!(matches!(rejected, Err(EconomyError::QuotaExceeded(_))));

        let next_day = claim(&store, 1, QuotaAction::Tap, policy, at(11, 0)).await.unwrap();
        assert_eq!(next_day.claims, 1);
    }

    #[tokio::test]
    async fn test_rejected_claim_leaves_counter_untouched() {
        let store = test_support::store();
        test_support::register(&store, 1, None).await;
        let policy = QuotaPolicy::CalendarDay { limit: 1 };

        claim(&store, 1, QuotaAction::Spin, policy, at(10, 9)).await.unwrap();
        assert!(claim(&store, 1, QuotaAction::Spin, policy, at(10, 10)).await.is_err());

        let mut uow = store.begin().await.unwrap();
        let state = uow.quota(1, QuotaAction::Spin).await.unwrap().unwrap();
        assert_eq!(state.claims, 1);
        assert_eq!(state.last_claim_at, Some(at(10, 9)));
    }

    #[tokio::test]
    async fn test_rolling_window_requires_full_interval() {
        let store = test_support::store();
        test_support::register(&store, 1, None).await;
        let policy = QuotaPolicies::default().daily;

        claim(&store, 1, QuotaAction::Daily, policy, at(10, 20)).await.unwrap();

        // Next calendar day, but only 5 hours later.
        let early = claim(&store, 1, QuotaAction::Daily, policy, at(11, 1)).await;
        assert!(matches!(early, Err(EconomyError::QuotaExceeded(msg)) if msg == "Daily already claimed"));

        claim(&store, 1, QuotaAction::Daily, policy, at(11, 20)).await.unwrap();
    }

    #[tokio::test]
    async fn test_counters_are_per_action() {
        let store = test_support::store();
        test_support::register(&store, 1, None).await;
        let policy = QuotaPolicy::CalendarDay { limit: 1 };

        claim(&store, 1, QuotaAction::Ad, policy, at(10, 9)).await.unwrap();
        claim(&store, 1, QuotaAction::Shortlink, policy, at(10, 9)).await.unwrap();
    }

    #[test]
    fn test_spin_cooldown_setting_switches_policy() {
        let mut quotas = settings::Quotas::default();
        assert_eq!(
            QuotaPolicies::from_settings(&quotas).spin,
            QuotaPolicy::CalendarDay { limit: 3 }
        );

        quotas.spin_cooldown_hours = Some(8);
        assert_eq!(
            QuotaPolicies::from_settings(&quotas).spin,
            QuotaPolicy::Rolling {
                window: Duration::hours(8)
            }
        );
    }

    #[test]
    fn test_out_of_range_cooldowns_are_clamped() {
        let quotas = settings::Quotas {
            daily_cooldown_hours: -5,
            spin_cooldown_hours: Some(i64::MAX),
            ..Default::default()
        };

        let policies = QuotaPolicies::from_settings(&quotas);
        assert_eq!(
            policies.daily,
            QuotaPolicy::Rolling {
                window: Duration::hours(1)
            }
        );
        assert_eq!(
            policies.spin,
            QuotaPolicy::Rolling {
                window: Duration::hours(settings::MAX_COOLDOWN_HOURS)
            }
        );
    }
}
