use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ledger::Currency;

/// Identity handed to us by the messaging platform. Also the canonical lock
/// order for multi-row operations.
pub type UserId = i64;

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub coin_balance: i64,
    pub cash_balance: i64,
    pub referred_by: Option<UserId>,
    pub referrals: i64,
    pub referral_earnings: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn balance(&self, currency: Currency) -> i64 {
        match currency {
            Currency::Coin => self.coin_balance,
            Currency::Cash => self.cash_balance,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub id: UserId,
    pub username: String,
    pub referred_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Registration {
    pub username: Option<String>,
    pub referrer_id: Option<UserId>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Registered {
    pub user: User,
    pub created: bool,
    pub join_bonus: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub coin_balance: i64,
    pub cash_balance: i64,
    pub referrals: i64,
    pub referral_earnings: i64,
    pub daily_tap_count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReferredUser {
    pub id: UserId,
    pub username: String,
    pub coin_balance: i64,
    pub joined_at: DateTime<Utc>,
}

impl From<User> for ReferredUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            coin_balance: user.coin_balance,
            joined_at: user.created_at,
        }
    }
}
