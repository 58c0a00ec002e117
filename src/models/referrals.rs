use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::users::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "referral_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReferralKind {
    JoinBonus,
    Percentage,
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct ReferralLog {
    pub id: i64,
    pub referrer_id: UserId,
    pub from_user_id: UserId,
    pub amount: i64,
    pub kind: ReferralKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewReferralLog {
    pub referrer_id: UserId,
    pub from_user_id: UserId,
    pub amount: i64,
    pub kind: ReferralKind,
}
