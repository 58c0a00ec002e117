pub mod economy;
pub mod ledger;
pub mod quotas;
pub mod referrals;
pub mod users;
pub mod withdrawals;
