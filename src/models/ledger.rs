use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::users::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "currency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Coin,
    Cash,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Coin => write!(f, "coin"),
            Currency::Cash => write!(f, "cash"),
        }
    }
}

/// Tag identifying which action produced a ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "ledger_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    TapReward,
    RewardAd,
    SpinReward,
    ShortlinkReward,
    Daily,
    Referral,
    ReferralBonus,
    Withdraw,
    Conversion,
    AdminAdjust,
    SignupBonus,
}

impl ActionType {
    /// Earnings that pay a percentage to the earner's referrer.
    pub fn earns_referral_bonus(&self) -> bool {
        matches!(
            self,
            ActionType::TapReward
                | ActionType::RewardAd
                | ActionType::SpinReward
                | ActionType::ShortlinkReward
                | ActionType::Daily
        )
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: UserId,
    pub currency: Currency,
    pub amount: i64,
    pub action: ActionType,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewLedgerEntry {
    pub user_id: UserId,
    pub currency: Currency,
    pub amount: i64,
    pub action: ActionType,
    pub source: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Reconciliation {
    pub user_id: UserId,
    pub coin_balance: i64,
    pub coin_ledger_sum: i64,
    pub cash_balance: i64,
    pub cash_ledger_sum: i64,
}

impl Reconciliation {
    pub fn is_balanced(&self) -> bool {
        self.coin_balance == self.coin_ledger_sum && self.cash_balance == self.cash_ledger_sum
    }
}
