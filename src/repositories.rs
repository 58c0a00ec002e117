use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    ledger::{Currency, LedgerEntry, NewLedgerEntry},
    quotas::{QuotaAction, QuotaState},
    referrals::{NewReferralLog, ReferralLog},
    users::{NewUser, User, UserId},
    withdrawals::{NewWithdrawRequest, WithdrawRequest, WithdrawStatus},
};

pub mod economy;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod quotas;
pub mod referrals;
pub mod users;
pub mod withdrawals;

/// Opens units of work against the backing store.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, anyhow::Error>;
}

/// One transaction. Row locks taken through it are held until `commit` or
/// `rollback`; dropping it unfinished rolls back.
///
/// Mutating a user row requires holding its lock (`lock_user`, or the
/// implicit lock of `insert_user`). Withdrawal status changes require
/// `lock_withdrawal`.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Exclusive row lock. Re-entrant within the same unit of work.
    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>, anyhow::Error>;

    /// Unlocked read.
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, anyhow::Error>;

    /// Returns `None` when a row with the same id already exists, including one
    /// committed by a concurrent transaction while this insert waited on it.
    async fn insert_user(&mut self, user: &NewUser) -> Result<Option<User>, anyhow::Error>;

    async fn set_balance(
        &mut self,
        id: UserId,
        currency: Currency,
        balance: i64,
    ) -> Result<(), anyhow::Error>;

    async fn increment_referrals(&mut self, id: UserId) -> Result<(), anyhow::Error>;

    async fn add_referral_earnings(&mut self, id: UserId, amount: i64)
        -> Result<(), anyhow::Error>;

    async fn referred_users(&mut self, referrer: UserId) -> Result<Vec<User>, anyhow::Error>;

    async fn is_admin(&mut self, id: UserId) -> Result<bool, anyhow::Error>;

    async fn grant_admin(&mut self, id: UserId) -> Result<(), anyhow::Error>;

    async fn append_ledger(&mut self, entry: &NewLedgerEntry) -> Result<(), anyhow::Error>;

    async fn ledger_entries(
        &mut self,
        user: UserId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, anyhow::Error>;

    async fn ledger_sum(&mut self, user: UserId, currency: Currency)
        -> Result<i64, anyhow::Error>;

    async fn quota(
        &mut self,
        user: UserId,
        action: QuotaAction,
    ) -> Result<Option<QuotaState>, anyhow::Error>;

    async fn save_quota(
        &mut self,
        user: UserId,
        action: QuotaAction,
        state: &QuotaState,
    ) -> Result<(), anyhow::Error>;

    async fn config_value(&mut self, key: &str) -> Result<Option<i64>, anyhow::Error>;

    /// Returns false when the key does not exist.
    async fn update_config(&mut self, key: &str, value: i64) -> Result<bool, anyhow::Error>;

    async fn insert_withdrawal(
        &mut self,
        request: &NewWithdrawRequest,
    ) -> Result<WithdrawRequest, anyhow::Error>;

    async fn lock_withdrawal(&mut self, id: &str)
        -> Result<Option<WithdrawRequest>, anyhow::Error>;

    async fn set_withdrawal_status(
        &mut self,
        id: &str,
        status: WithdrawStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<(), anyhow::Error>;

    async fn withdrawals_by_user(
        &mut self,
        user: UserId,
    ) -> Result<Vec<WithdrawRequest>, anyhow::Error>;

    async fn withdrawals_by_status(
        &mut self,
        status: WithdrawStatus,
    ) -> Result<Vec<WithdrawRequest>, anyhow::Error>;

    async fn append_referral_log(&mut self, log: &NewReferralLog) -> Result<(), anyhow::Error>;

    async fn referral_logs(&mut self, referrer: UserId) -> Result<Vec<ReferralLog>, anyhow::Error>;

    async fn commit(self: Box<Self>) -> Result<(), anyhow::Error>;

    async fn rollback(self: Box<Self>) -> Result<(), anyhow::Error>;
}
