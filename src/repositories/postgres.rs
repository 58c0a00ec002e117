use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::{economy, ledger, quotas, referrals, users, withdrawals, Store, UnitOfWork};
use crate::models::{
    ledger::{Currency, LedgerEntry, NewLedgerEntry},
    quotas::{QuotaAction, QuotaState},
    referrals::{NewReferralLog, ReferralLog},
    users::{NewUser, User, UserId},
    withdrawals::{NewWithdrawRequest, WithdrawRequest, WithdrawStatus},
};

#[derive(Clone)]
pub struct PgStore {
    conn: PgPool,
}

impl PgStore {
    pub fn new(conn: PgPool) -> Self {
        PgStore { conn }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, anyhow::Error> {
        let tx = self.conn.begin().await?;

        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// Row locks are `SELECT ... FOR UPDATE` inside the wrapped transaction and
/// are released by Postgres at commit or rollback.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>, anyhow::Error> {
        users::lock_user(&mut self.tx, id).await
    }

    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, anyhow::Error> {
        users::get_user_by_id(&mut self.tx, id).await
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<Option<User>, anyhow::Error> {
        users::insert_user(&mut self.tx, user).await
    }

    async fn set_balance(
        &mut self,
        id: UserId,
        currency: Currency,
        balance: i64,
    ) -> Result<(), anyhow::Error> {
        users::set_balance(&mut self.tx, id, currency, balance).await
    }

    async fn increment_referrals(&mut self, id: UserId) -> Result<(), anyhow::Error> {
        users::increment_referrals(&mut self.tx, id).await
    }

    async fn add_referral_earnings(
        &mut self,
        id: UserId,
        amount: i64,
    ) -> Result<(), anyhow::Error> {
        users::add_referral_earnings(&mut self.tx, id, amount).await
    }

    async fn referred_users(&mut self, referrer: UserId) -> Result<Vec<User>, anyhow::Error> {
        users::referred_users(&mut self.tx, referrer).await
    }

    async fn is_admin(&mut self, id: UserId) -> Result<bool, anyhow::Error> {
        users::is_admin(&mut self.tx, id).await
    }

    async fn grant_admin(&mut self, id: UserId) -> Result<(), anyhow::Error> {
        users::grant_admin(&mut self.tx, id).await
    }

    async fn append_ledger(&mut self, entry: &NewLedgerEntry) -> Result<(), anyhow::Error> {
        ledger::append_entry(&mut self.tx, entry).await
    }

    async fn ledger_entries(
        &mut self,
        user: UserId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, anyhow::Error> {
        ledger::entries_for_user(&mut self.tx, user, limit).await
    }

    async fn ledger_sum(
        &mut self,
        user: UserId,
        currency: Currency,
    ) -> Result<i64, anyhow::Error> {
        ledger::sum_for_user(&mut self.tx, user, currency).await
    }

    async fn quota(
        &mut self,
        user: UserId,
        action: QuotaAction,
    ) -> Result<Option<QuotaState>, anyhow::Error> {
        quotas::get_quota(&mut self.tx, user, action).await
    }

    async fn save_quota(
        &mut self,
        user: UserId,
        action: QuotaAction,
        state: &QuotaState,
    ) -> Result<(), anyhow::Error> {
        quotas::upsert_quota(&mut self.tx, user, action, state).await
    }

    async fn config_value(&mut self, key: &str) -> Result<Option<i64>, anyhow::Error> {
        economy::get_value(&mut self.tx, key).await
    }

    async fn update_config(&mut self, key: &str, value: i64) -> Result<bool, anyhow::Error> {
        economy::update_value(&mut self.tx, key, value).await
    }

    async fn insert_withdrawal(
        &mut self,
        request: &NewWithdrawRequest,
    ) -> Result<WithdrawRequest, anyhow::Error> {
        withdrawals::new_withdrawal(&mut self.tx, request).await
    }

    async fn lock_withdrawal(
        &mut self,
        id: &str,
    ) -> Result<Option<WithdrawRequest>, anyhow::Error> {
        withdrawals::lock_withdrawal(&mut self.tx, id).await
    }

    async fn set_withdrawal_status(
        &mut self,
        id: &str,
        status: WithdrawStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        withdrawals::update_withdrawal_status(&mut self.tx, id, status, decided_at).await
    }

    async fn withdrawals_by_user(
        &mut self,
        user: UserId,
    ) -> Result<Vec<WithdrawRequest>, anyhow::Error> {
        withdrawals::withdrawals_by_user(&mut self.tx, user).await
    }

    async fn withdrawals_by_status(
        &mut self,
        status: WithdrawStatus,
    ) -> Result<Vec<WithdrawRequest>, anyhow::Error> {
        withdrawals::withdrawals_by_status(&mut self.tx, status).await
    }

    async fn append_referral_log(&mut self, log: &NewReferralLog) -> Result<(), anyhow::Error> {
        referrals::insert_log(&mut self.tx, log).await
    }

    async fn referral_logs(
        &mut self,
        referrer: UserId,
    ) -> Result<Vec<ReferralLog>, anyhow::Error> {
        referrals::logs_for_referrer(&mut self.tx, referrer).await
    }

    async fn commit(self: Box<Self>) -> Result<(), anyhow::Error> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), anyhow::Error> {
        self.tx.rollback().await?;
        Ok(())
    }
}
