use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::users::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "withdraw_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WithdrawStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for WithdrawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithdrawStatus::Pending => write!(f, "pending"),
            WithdrawStatus::Approved => write!(f, "approved"),
            WithdrawStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct WithdrawRequest {
    pub id: String,
    pub user_id: UserId,
    pub amount: i64,
    pub method: String,
    pub account_number: String,
    pub status: WithdrawStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct NewWithdrawRequest {
    pub user_id: UserId,
    pub amount: i64,
    pub method: String,
    pub account_number: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Conversion {
    pub converted_cash: i64,
    pub used_coin: i64,
    pub coin_balance: i64,
    pub cash_balance: i64,
}
