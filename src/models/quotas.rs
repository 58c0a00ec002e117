use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "quota_action", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuotaAction {
    Tap,
    Ad,
    Spin,
    Shortlink,
    Daily,
}

impl fmt::Display for QuotaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuotaAction::Tap => "tap",
            QuotaAction::Ad => "ad",
            QuotaAction::Spin => "spin",
            QuotaAction::Shortlink => "shortlink",
            QuotaAction::Daily => "daily",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, sqlx::FromRow)]
pub struct QuotaState {
    pub claims: i64,
    pub window_date: Option<NaiveDate>,
    pub last_claim_at: Option<DateTime<Utc>>,
}

impl QuotaState {
    /// Claims counted towards `today`; a stale window counts as zero.
    pub fn claims_on(&self, today: NaiveDate) -> i64 {
        match self.window_date {
            Some(date) if date == today => self.claims,
            _ => 0,
        }
    }
}
