use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Operator-adjustable economy parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKey {
    TapReward,
    AdReward,
    DailyReward,
    SpinMinReward,
    SpinMaxReward,
    ShortlinkReward,
    ReferralJoinBonus,
    ReferralPercent,
    CoinToCashRate,
    MinWithdrawCash,
    SignupBonus,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 11] = [
        ConfigKey::TapReward,
        ConfigKey::AdReward,
        ConfigKey::DailyReward,
        ConfigKey::SpinMinReward,
        ConfigKey::SpinMaxReward,
        ConfigKey::ShortlinkReward,
        ConfigKey::ReferralJoinBonus,
        ConfigKey::ReferralPercent,
        ConfigKey::CoinToCashRate,
        ConfigKey::MinWithdrawCash,
        ConfigKey::SignupBonus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::TapReward => "tap_reward",
            ConfigKey::AdReward => "ad_reward",
            ConfigKey::DailyReward => "daily_reward",
            ConfigKey::SpinMinReward => "spin_min_reward",
            ConfigKey::SpinMaxReward => "spin_max_reward",
            ConfigKey::ShortlinkReward => "shortlink_reward",
            ConfigKey::ReferralJoinBonus => "referral_join_bonus",
            ConfigKey::ReferralPercent => "referral_percent",
            ConfigKey::CoinToCashRate => "coin_to_cash_rate",
            ConfigKey::MinWithdrawCash => "min_withdraw_cash",
            ConfigKey::SignupBonus => "signup_bonus",
        }
    }

    /// Values seeded by the initial migration.
    pub fn default_value(&self) -> i64 {
        match self {
            ConfigKey::TapReward => 10,
            ConfigKey::AdReward => 500,
            ConfigKey::DailyReward => 1000,
            ConfigKey::SpinMinReward => 100,
            ConfigKey::SpinMaxReward => 1000,
            ConfigKey::ShortlinkReward => 300,
            ConfigKey::ReferralJoinBonus => 2000,
            ConfigKey::ReferralPercent => 5,
            ConfigKey::CoinToCashRate => 100,
            ConfigKey::MinWithdrawCash => 1000,
            ConfigKey::SignupBonus => 1000,
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::ALL
            .iter()
            .find(|key| key.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown config key: {}", s))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConfigUpdate {
    pub key: Option<String>,
    pub value: Option<i64>,
}
