//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::store::rest::RestStoreConfig;
use crate::store::retry::RetryPolicy;

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP port.
    pub port: u16,
    /// libSQL file holding the local store and the completion marker.
    pub db_path: PathBuf,
    /// Hosted profile store; `None` keeps profiles in the local database.
    pub remote: Option<RestStoreConfig>,
    pub retry: RetryPolicy,
    pub guard: GuardConfig,
    /// Enables daily rolling log files when set.
    pub log_dir: Option<PathBuf>,
}

/// Routes the guard treats specially.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    pub onboarding_route: String,
    pub login_route: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            onboarding_route: "/onboarding".to_string(),
            login_route: "/login".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: PathBuf::from("./data/investor-os.db"),
            remote: None,
            retry: RetryPolicy::default(),
            guard: GuardConfig::default(),
            log_dir: None,
        }
    }
}

fn parsed<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source. Unparseable numbers fall back to
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = parsed(lookup("INVESTOR_OS_PORT"), defaults.port);
        let db_path = lookup("INVESTOR_OS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let remote = lookup("PROFILE_STORE_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|base_url| RestStoreConfig {
                base_url,
                api_key: SecretString::from(lookup("PROFILE_STORE_API_KEY").unwrap_or_default()),
                table: lookup("PROFILE_STORE_TABLE")
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| "user_profiles".to_string()),
                timeout: Duration::from_secs(10),
            });

        let max_attempts: u32 = parsed(
            lookup("PROFILE_STORE_RETRY_ATTEMPTS"),
            defaults.retry.max_attempts,
        );
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PROFILE_STORE_RETRY_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let retry = RetryPolicy {
            max_attempts,
            base_backoff: Duration::from_millis(parsed(lookup("PROFILE_STORE_RETRY_BASE_MS"), 100)),
            max_backoff: Duration::from_millis(parsed(lookup("PROFILE_STORE_RETRY_MAX_MS"), 2000)),
        };

        let guard = GuardConfig {
            onboarding_route: lookup("INVESTOR_OS_ONBOARDING_ROUTE")
                .unwrap_or(defaults.guard.onboarding_route),
            login_route: lookup("INVESTOR_OS_LOGIN_ROUTE").unwrap_or(defaults.guard.login_route),
        };

        let log_dir = lookup("INVESTOR_OS_LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            port,
            db_path,
            remote,
            retry,
            guard,
            log_dir,
        })
    }
}
