//! In-process store for local runs and tests.
//!
//! Each user and withdrawal row has its own async mutex. A unit of work keeps
//! the guards of every row it locked and stages its writes; commit applies
//! the staged writes under the table mutex and only then releases the row
//! guards. Dropping a unit of work discards everything it staged.

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use super::{Store, UnitOfWork};
use crate::models::{
    economy::ConfigKey,
    ledger::{Currency, LedgerEntry, NewLedgerEntry},
    quotas::{QuotaAction, QuotaState},
    referrals::{NewReferralLog, ReferralLog},
    users::{NewUser, User, UserId},
    withdrawals::{NewWithdrawRequest, WithdrawRequest, WithdrawStatus},
};

struct LockTable<K> {
    rows: DashMap<K, Arc<tokio::sync::Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> LockTable<K> {
    fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    async fn acquire(&self, key: &K) -> OwnedMutexGuard<()> {
        let row = Arc::clone(&self.rows.entry(key.clone()).or_default());
        row.lock_owned().await
    }

    /// Unlocks the row and forgets its mutex unless another task still holds
    /// or waits on it.
    fn release(&self, key: &K, guard: OwnedMutexGuard<()>) {
        drop(guard);
        self.rows.remove_if(key, |_, row| Arc::strong_count(row) == 1);
    }
}

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    admins: HashSet<UserId>,
    ledger: Vec<LedgerEntry>,
    quotas: HashMap<(UserId, QuotaAction), QuotaState>,
    config: HashMap<String, i64>,
    withdrawals: HashMap<String, WithdrawRequest>,
    referral_logs: Vec<ReferralLog>,
}

struct Shared {
    tables: Mutex<Tables>,
    user_locks: LockTable<UserId>,
    withdrawal_locks: LockTable<String>,
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                user_locks: LockTable::new(),
                withdrawal_locks: LockTable::new(),
            }),
        }
    }

    /// Store seeded with the same economy parameters as the initial migration.
    pub fn with_default_config() -> Self {
        let store = Self::new();
        {
            let mut tables = store.shared.tables();
            for key in ConfigKey::ALL {
                tables
                    .config
                    .insert(key.as_str().to_string(), key.default_value());
            }
        }
        store
    }

    /// Removes a parameter outright, bypassing the operator path.
    pub fn remove_config(&self, key: ConfigKey) {
        self.shared.tables().config.remove(key.as_str());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, anyhow::Error> {
        Ok(Box::new(MemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            user_guards: HashMap::new(),
            withdrawal_guards: HashMap::new(),
            users: HashMap::new(),
            admins: Vec::new(),
            ledger: Vec::new(),
            quotas: HashMap::new(),
            config: HashMap::new(),
            withdrawals: HashMap::new(),
            referral_logs: Vec::new(),
        }))
    }
}

pub struct MemoryUnitOfWork {
    shared: Arc<Shared>,
    user_guards: HashMap<UserId, OwnedMutexGuard<()>>,
    withdrawal_guards: HashMap<String, OwnedMutexGuard<()>>,
    users: HashMap<UserId, User>,
    admins: Vec<UserId>,
    ledger: Vec<(NewLedgerEntry, DateTime<Utc>)>,
    quotas: HashMap<(UserId, QuotaAction), QuotaState>,
    config: HashMap<String, i64>,
    withdrawals: HashMap<String, WithdrawRequest>,
    referral_logs: Vec<(NewReferralLog, DateTime<Utc>)>,
}

impl MemoryUnitOfWork {
    fn locked_user(&mut self, id: UserId) -> Result<&mut User, anyhow::Error> {
        if !self.user_guards.contains_key(&id) {
            bail!("row lock on user {} not held", id);
        }

        match self.users.get_mut(&id) {
            Some(user) => Ok(user),
            None => bail!("user {} not found", id),
        }
    }

    fn staged_ledger(&self, committed: usize) -> impl Iterator<Item = LedgerEntry> + '_ {
        self.ledger
            .iter()
            .enumerate()
            .map(move |(offset, (entry, at))| LedgerEntry {
                id: (committed + offset + 1) as i64,
                user_id: entry.user_id,
                currency: entry.currency,
                amount: entry.amount,
                action: entry.action,
                source: entry.source.clone(),
                created_at: *at,
            })
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>, anyhow::Error> {
        if !self.user_guards.contains_key(&id) {
            let guard = self.shared.user_locks.acquire(&id).await;
            let row = self.shared.tables().users.get(&id).cloned();

            let Some(user) = row else {
                self.shared.user_locks.release(&id, guard);
                return Ok(None);
            };

            self.user_guards.insert(id, guard);
            self.users.insert(id, user);
        }

        Ok(self.users.get(&id).cloned())
    }

    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, anyhow::Error> {
        if let Some(user) = self.users.get(&id) {
            return Ok(Some(user.clone()));
        }

        Ok(self.shared.tables().users.get(&id).cloned())
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<Option<User>, anyhow::Error> {
        if self.users.contains_key(&user.id) {
            return Ok(None);
        }

        if !self.user_guards.contains_key(&user.id) {
            // Waits for a concurrent insert of the same id to commit or roll back.
            let guard = self.shared.user_locks.acquire(&user.id).await;

            let exists = self.shared.tables().users.contains_key(&user.id);
            if exists {
                self.shared.user_locks.release(&user.id, guard);
                return Ok(None);
            }

            self.user_guards.insert(user.id, guard);
        }

        let row = User {
            id: user.id,
            username: user.username.clone(),
            coin_balance: 0,
            cash_balance: 0,
            referred_by: user.referred_by,
            referrals: 0,
            referral_earnings: 0,
            created_at: user.created_at,
        };
        self.users.insert(user.id, row.clone());

        Ok(Some(row))
    }

    async fn set_balance(
        &mut self,
        id: UserId,
        currency: Currency,
        balance: i64,
    ) -> Result<(), anyhow::Error> {
        if balance < 0 {
            bail!("check constraint: {} balance of user {} below zero", currency, id);
        }

        let user = self.locked_user(id)?;
        match currency {
            Currency::Coin => user.coin_balance = balance,
            Currency::Cash => user.cash_balance = balance,
        }

        Ok(())
    }

    async fn increment_referrals(&mut self, id: UserId) -> Result<(), anyhow::Error> {
        self.locked_user(id)?.referrals += 1;
        Ok(())
    }

    async fn add_referral_earnings(
        &mut self,
        id: UserId,
        amount: i64,
    ) -> Result<(), anyhow::Error> {
        self.locked_user(id)?.referral_earnings += amount;
        Ok(())
    }

    async fn referred_users(&mut self, referrer: UserId) -> Result<Vec<User>, anyhow::Error> {
        let mut found: HashMap<UserId, User> = self
            .shared
            .tables()
            .users
            .values()
            .filter(|user| user.referred_by == Some(referrer))
            .map(|user| (user.id, user.clone()))
            .collect();

        for user in self.users.values() {
            if user.referred_by == Some(referrer) {
                found.insert(user.id, user.clone());
            }
        }

        let mut users: Vec<User> = found.into_values().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(users)
    }

    async fn is_admin(&mut self, id: UserId) -> Result<bool, anyhow::Error> {
        if self.admins.contains(&id) {
            return Ok(true);
        }

        Ok(self.shared.tables().admins.contains(&id))
    }

    async fn grant_admin(&mut self, id: UserId) -> Result<(), anyhow::Error> {
        self.admins.push(id);
        Ok(())
    }

    async fn append_ledger(&mut self, entry: &NewLedgerEntry) -> Result<(), anyhow::Error> {
        if !self.user_guards.contains_key(&entry.user_id) {
            bail!("row lock on user {} not held", entry.user_id);
        }

        self.ledger.push((entry.clone(), Utc::now()));
        Ok(())
    }

    async fn ledger_entries(
        &mut self,
        user: UserId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, anyhow::Error> {
        let tables = self.shared.tables();
        let mut entries: Vec<LedgerEntry> = tables
            .ledger
            .iter()
            .cloned()
            .chain(self.staged_ledger(tables.ledger.len()))
            .filter(|entry| entry.user_id == user)
            .collect();
        drop(tables);

        entries.reverse();
        entries.truncate(limit.max(0) as usize);

        Ok(entries)
    }

    async fn ledger_sum(
        &mut self,
        user: UserId,
        currency: Currency,
    ) -> Result<i64, anyhow::Error> {
        let committed: i64 = self
            .shared
            .tables()
            .ledger
            .iter()
            .filter(|entry| entry.user_id == user && entry.currency == currency)
            .map(|entry| entry.amount)
            .sum();
        let staged: i64 = self
            .ledger
            .iter()
            .filter(|(entry, _)| entry.user_id == user && entry.currency == currency)
            .map(|(entry, _)| entry.amount)
            .sum();

        Ok(committed + staged)
    }

    async fn quota(
        &mut self,
        user: UserId,
        action: QuotaAction,
    ) -> Result<Option<QuotaState>, anyhow::Error> {
        if let Some(state) = self.quotas.get(&(user, action)) {
            return Ok(Some(state.clone()));
        }

        Ok(self.shared.tables().quotas.get(&(user, action)).cloned())
    }

    async fn save_quota(
        &mut self,
        user: UserId,
        action: QuotaAction,
        state: &QuotaState,
    ) -> Result<(), anyhow::Error> {
        if !self.user_guards.contains_key(&user) {
            bail!("row lock on user {} not held", user);
        }

        self.quotas.insert((user, action), state.clone());
        Ok(())
    }

    async fn config_value(&mut self, key: &str) -> Result<Option<i64>, anyhow::Error> {
        if let Some(value) = self.config.get(key) {
            return Ok(Some(*value));
        }

        Ok(self.shared.tables().config.get(key).copied())
    }

    async fn update_config(&mut self, key: &str, value: i64) -> Result<bool, anyhow::Error> {
        let exists = self.shared.tables().config.contains_key(key);
        if !exists && !self.config.contains_key(key) {
            return Ok(false);
        }

        self.config.insert(key.to_string(), value);
        Ok(true)
    }

    async fn insert_withdrawal(
        &mut self,
        request: &NewWithdrawRequest,
    ) -> Result<WithdrawRequest, anyhow::Error> {
        let request_id = Uuid::new_v4().hyphenated().to_string();
        let guard = self.shared.withdrawal_locks.acquire(&request_id).await;
        self.withdrawal_guards.insert(request_id.clone(), guard);

        let withdrawal = WithdrawRequest {
            id: request_id.clone(),
            user_id: request.user_id,
            amount: request.amount,
            method: request.method.clone(),
            account_number: request.account_number.clone(),
            status: WithdrawStatus::Pending,
            created_at: request.created_at,
            decided_at: None,
        };
        self.withdrawals.insert(request_id, withdrawal.clone());

        Ok(withdrawal)
    }

    async fn lock_withdrawal(
        &mut self,
        id: &str,
    ) -> Result<Option<WithdrawRequest>, anyhow::Error> {
        if !self.withdrawal_guards.contains_key(id) {
            let key = id.to_string();
            let guard = self.shared.withdrawal_locks.acquire(&key).await;
            let row = self.shared.tables().withdrawals.get(id).cloned();

            let Some(withdrawal) = row else {
                self.shared.withdrawal_locks.release(&key, guard);
                return Ok(None);
            };

            self.withdrawal_guards.insert(key.clone(), guard);
            self.withdrawals.insert(key, withdrawal);
        }

        Ok(self.withdrawals.get(id).cloned())
    }

    async fn set_withdrawal_status(
        &mut self,
        id: &str,
        status: WithdrawStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        if !self.withdrawal_guards.contains_key(id) {
            bail!("row lock on withdrawal {} not held", id);
        }

        match self.withdrawals.get_mut(id) {
            Some(withdrawal) => {
                withdrawal.status = status;
                withdrawal.decided_at = Some(decided_at);
                Ok(())
            }
            None => bail!("withdrawal {} not found", id),
        }
    }

    async fn withdrawals_by_user(
        &mut self,
        user: UserId,
    ) -> Result<Vec<WithdrawRequest>, anyhow::Error> {
        let mut found: HashMap<String, WithdrawRequest> = self
            .shared
            .tables()
            .withdrawals
            .values()
            .filter(|withdrawal| withdrawal.user_id == user)
            .map(|withdrawal| (withdrawal.id.clone(), withdrawal.clone()))
            .collect();

        for withdrawal in self.withdrawals.values() {
            if withdrawal.user_id == user {
                found.insert(withdrawal.id.clone(), withdrawal.clone());
            }
        }

        let mut withdrawals: Vec<WithdrawRequest> = found.into_values().collect();
        withdrawals.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(withdrawals)
    }

    async fn withdrawals_by_status(
        &mut self,
        status: WithdrawStatus,
    ) -> Result<Vec<WithdrawRequest>, anyhow::Error> {
        let mut found: HashMap<String, WithdrawRequest> = self
            .shared
            .tables()
            .withdrawals
            .values()
            .map(|withdrawal| (withdrawal.id.clone(), withdrawal.clone()))
            .collect();

        for withdrawal in self.withdrawals.values() {
            found.insert(withdrawal.id.clone(), withdrawal.clone());
        }

        let mut withdrawals: Vec<WithdrawRequest> = found
            .into_values()
            .filter(|withdrawal| withdrawal.status == status)
            .collect();
        withdrawals.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(withdrawals)
    }

    async fn append_referral_log(&mut self, log: &NewReferralLog) -> Result<(), anyhow::Error> {
        self.referral_logs.push((log.clone(), Utc::now()));
        Ok(())
    }

    async fn referral_logs(
        &mut self,
        referrer: UserId,
    ) -> Result<Vec<ReferralLog>, anyhow::Error> {
        let tables = self.shared.tables();
        let committed = tables.referral_logs.len();
        let mut logs: Vec<ReferralLog> = tables
            .referral_logs
            .iter()
            .cloned()
            .chain(
                self.referral_logs
                    .iter()
                    .enumerate()
                    .map(|(offset, (log, at))| ReferralLog {
                        id: (committed + offset + 1) as i64,
                        referrer_id: log.referrer_id,
                        from_user_id: log.from_user_id,
                        amount: log.amount,
                        kind: log.kind,
                        created_at: *at,
                    }),
            )
            .filter(|log| log.referrer_id == referrer)
            .collect();
        drop(tables);

        logs.reverse();
        Ok(logs)
    }

    async fn commit(self: Box<Self>) -> Result<(), anyhow::Error> {
        let mut work = *self;
        let mut tables = work.shared.tables();

        for (id, user) in work.users.drain() {
            tables.users.insert(id, user);
        }

        tables.admins.extend(work.admins.drain(..));

        for (entry, created_at) in work.ledger.drain(..) {
            let id = tables.ledger.len() as i64 + 1;
            tables.ledger.push(LedgerEntry {
                id,
                user_id: entry.user_id,
                currency: entry.currency,
                amount: entry.amount,
                action: entry.action,
                source: entry.source,
                created_at,
            });
        }

        tables.quotas.extend(work.quotas.drain());
        tables.config.extend(work.config.drain());
        tables.withdrawals.extend(work.withdrawals.drain());

        for (log, created_at) in work.referral_logs.drain(..) {
            let id = tables.referral_logs.len() as i64 + 1;
            tables.referral_logs.push(ReferralLog {
                id,
                referrer_id: log.referrer_id,
                from_user_id: log.from_user_id,
                amount: log.amount,
                kind: log.kind,
                created_at,
            });
        }

        // Row guards in `work` drop after the table guard.
        drop(tables);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        for (id, guard) in self.user_guards.drain() {
            self.shared.user_locks.release(&id, guard);
        }
        for (id, guard) in self.withdrawal_guards.drain() {
            self.shared.withdrawal_locks.release(&id, guard);
        }
    }
}
