use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::models::users::UserId;

/// Upper bound for configured cooldowns, a little over a year.
pub const MAX_COOLDOWN_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    pub acquire_timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for Server {
    fn default() -> Self {
        Server {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    #[serde(default)]
    pub backend: Backend,
}

/// Who the caller is comes from a header set by the upstream auth layer.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    #[serde(default = "default_identity_header")]
    pub header: String,
    #[serde(default)]
    pub admins: Vec<UserId>,
}

impl Default for Identity {
    fn default() -> Self {
        Identity {
            header: default_identity_header(),
            admins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Quotas {
    pub tap_daily_limit: i64,
    pub ad_daily_limit: i64,
    pub spin_daily_limit: i64,
    pub shortlink_daily_limit: i64,
    pub daily_cooldown_hours: i64,
    /// When set, spins use a rolling cooldown instead of a daily count.
    pub spin_cooldown_hours: Option<i64>,
}

impl Quotas {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("tap_daily_limit", self.tap_daily_limit),
            ("ad_daily_limit", self.ad_daily_limit),
            ("spin_daily_limit", self.spin_daily_limit),
            ("shortlink_daily_limit", self.shortlink_daily_limit),
        ];
        for (name, limit) in limits {
            if limit < 0 {
                return Err(ConfigError::Message(format!(
                    "quotas.{} must not be negative, got {}",
                    name, limit
                )));
            }
        }

        check_cooldown("daily_cooldown_hours", self.daily_cooldown_hours)?;
        if let Some(hours) = self.spin_cooldown_hours {
            check_cooldown("spin_cooldown_hours", hours)?;
        }

        Ok(())
    }
}

fn check_cooldown(name: &str, hours: i64) -> Result<(), ConfigError> {
    if !(1..=MAX_COOLDOWN_HOURS).contains(&hours) {
        return Err(ConfigError::Message(format!(
            "quotas.{} must be between 1 and {}, got {}",
            name, MAX_COOLDOWN_HOURS, hours
        )));
    }

    Ok(())
}

impl Default for Quotas {
    fn default() -> Self {
        Quotas {
            tap_daily_limit: 480,
            ad_daily_limit: 100,
            spin_daily_limit: 3,
            shortlink_daily_limit: 10,
            daily_cooldown_hours: 24,
            spin_cooldown_hours: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TapThrottle {
    pub min_interval_ms: u64,
    pub max_per_window: usize,
    pub window_ms: u64,
    pub idle_ttl_secs: u64,
    pub eviction_interval_secs: u64,
}

impl Default for TapThrottle {
    fn default() -> Self {
        TapThrottle {
            min_interval_ms: 250,
            max_per_window: 5,
            window_ms: 1000,
            idle_ttl_secs: 600,
            eviction_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub postgres: Option<Postgres>,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub identity: Identity,
    #[serde(default)]
    pub quotas: Quotas,
    #[serde(default)]
    pub tap_throttle: TapThrottle,
}

impl Settings {
    /// Reads `path`, then applies `ECONOMY__SECTION__KEY` environment
    /// overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("ECONOMY")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("identity.admins")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.quotas.validate()?;

        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            postgres: None,
            server: Server::default(),
            storage: Storage {
                backend: Backend::Memory,
            },
            identity: Identity::default(),
            quotas: Quotas::default(),
            tap_throttle: TapThrottle::default(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_identity_header() -> String {
    "x-verified-user-id".to_string()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn load_toml(name: &str, contents: &str) -> Result<Settings, ConfigError> {
        let path = std::env::temp_dir()
            .join(format!("economy-{}-{}.toml", name, std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", contents).unwrap();

        let settings = Settings::load(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();
        settings
    }

    #[test]
    fn test_load_applies_defaults() {
        let settings = load_toml(
            "defaults",
            "[storage]\nbackend = \"memory\"\n\n[identity]\nadmins = [42]\n\n[quotas]\ntap_daily_limit = 100\n",
        )
        .unwrap();

        assert_eq!(settings.storage.backend, Backend::Memory);
        assert_eq!(settings.identity.admins, vec![42]);
        assert_eq!(settings.identity.header, "x-verified-user-id");
        assert_eq!(settings.quotas.tap_daily_limit, 100);
        assert_eq!(settings.quotas.ad_daily_limit, 100);
        assert_eq!(settings.tap_throttle.min_interval_ms, 250);
        assert!(settings.postgres.is_none());
    }

    #[test]
    fn test_load_rejects_out_of_range_cooldowns() {
        for quotas in [
            "daily_cooldown_hours = -1",
            "daily_cooldown_hours = 0",
            "spin_cooldown_hours = -3",
            "spin_cooldown_hours = 9223372036854775807",
        ] {
            let contents = format!("[storage]\nbackend = \"memory\"\n\n[quotas]\n{}\n", quotas);
            let error = load_toml("cooldown", &contents).unwrap_err();
            assert!(error.to_string().contains("cooldown_hours"), "{}", error);
        }

        let settings = load_toml(
            "cooldown-ok",
            "[storage]\nbackend = \"memory\"\n\n[quotas]\nspin_cooldown_hours = 8\n",
        )
        .unwrap();
        assert_eq!(settings.quotas.spin_cooldown_hours, Some(8));
    }

    #[test]
    fn test_negative_daily_limit_is_rejected() {
        let quotas = Quotas {
            ad_daily_limit: -1,
            ..Default::default()
        };
        assert!(quotas.validate().is_err());
        assert!(Quotas::default().validate().is_ok());
    }
}
