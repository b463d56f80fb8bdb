use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::onboarding::{Cohort, CohortContext, DuplicatePolicy};

const DEFAULT_COHORT_TYPE: &str = "Placement";
const DEFAULT_COHORT_NUMBER: &str = "2.0";
const DEFAULT_STARTING_NUMBER: u32 = 2501;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub enrollment: EnrollmentConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
                show_target: environment != AppEnvironment::Production,
            },
            enrollment: EnrollmentConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
    pub show_target: bool,
}

/// Allocation settings: the fallback cohort used when the configuration source is
/// unreachable, duplicate-check strictness, and the per-attempt time budget.
#[derive(Debug, Clone)]
pub struct EnrollmentConfig {
    pub fallback: CohortContext,
    pub duplicate_policy: DuplicatePolicy,
    pub store_timeout: Duration,
}

impl EnrollmentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let cohort_type = env::var("ENROLLMENT_COHORT_TYPE")
            .unwrap_or_else(|_| DEFAULT_COHORT_TYPE.to_string());
        let cohort_number = env::var("ENROLLMENT_COHORT_NUMBER")
            .unwrap_or_else(|_| DEFAULT_COHORT_NUMBER.to_string());

        let starting_number = match env::var("ENROLLMENT_STARTING_NUMBER") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidStartingNumber { value: raw })?,
            Err(_) => DEFAULT_STARTING_NUMBER,
        };

        let duplicate_policy = match env::var("ENROLLMENT_DUPLICATE_POLICY") {
            Ok(raw) => DuplicatePolicy::parse(&raw)
                .ok_or(ConfigError::InvalidDuplicatePolicy { value: raw })?,
            Err(_) => DuplicatePolicy::default(),
        };

        let timeout_ms = match env::var("ENROLLMENT_STORE_TIMEOUT_MS") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => return Err(ConfigError::InvalidStoreTimeout { value: raw }),
            },
            Err(_) => DEFAULT_STORE_TIMEOUT_MS,
        };

        Ok(Self {
            fallback: CohortContext::new(
                Cohort::new(cohort_type.trim(), cohort_number.trim()),
                starting_number,
            ),
            duplicate_policy,
            store_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            fallback: CohortContext::new(
                Cohort::new(DEFAULT_COHORT_TYPE, DEFAULT_COHORT_NUMBER),
                DEFAULT_STARTING_NUMBER,
            ),
            duplicate_policy: DuplicatePolicy::default(),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidStartingNumber { value: String },
    InvalidDuplicatePolicy { value: String },
    InvalidStoreTimeout { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidStartingNumber { value } => write!(
                f,
                "ENROLLMENT_STARTING_NUMBER must be a non-negative integer (got '{value}')"
            ),
            ConfigError::InvalidDuplicatePolicy { value } => write!(
                f,
                "ENROLLMENT_DUPLICATE_POLICY must be 'fail-open' or 'fail-closed' (got '{value}')"
            ),
            ConfigError::InvalidStoreTimeout { value } => write!(
                f,
                "ENROLLMENT_STORE_TIMEOUT_MS must be a positive number of milliseconds (got '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidStartingNumber { .. }
            | ConfigError::InvalidDuplicatePolicy { .. }
            | ConfigError::InvalidStoreTimeout { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "ENROLLMENT_COHORT_TYPE",
            "ENROLLMENT_COHORT_NUMBER",
            "ENROLLMENT_STARTING_NUMBER",
            "ENROLLMENT_DUPLICATE_POLICY",
            "ENROLLMENT_STORE_TIMEOUT_MS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(
            config.enrollment.fallback.cohort,
            Cohort::new("Placement", "2.0")
        );
        assert_eq!(config.enrollment.fallback.starting_number, 2501);
        assert_eq!(config.enrollment.duplicate_policy, DuplicatePolicy::FailOpen);
        assert_eq!(config.enrollment.store_timeout, Duration::from_secs(5));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_fallback_cohort_and_policy_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ENROLLMENT_COHORT_TYPE", "Basic");
        env::set_var("ENROLLMENT_COHORT_NUMBER", " 3.1 ");
        env::set_var("ENROLLMENT_STARTING_NUMBER", "3001");
        env::set_var("ENROLLMENT_DUPLICATE_POLICY", "fail-closed");
        env::set_var("ENROLLMENT_STORE_TIMEOUT_MS", "750");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.enrollment.fallback.cohort, Cohort::new("Basic", "3.1"));
        assert_eq!(config.enrollment.fallback.starting_number, 3001);
        assert_eq!(
            config.enrollment.duplicate_policy,
            DuplicatePolicy::FailClosed
        );
        assert_eq!(config.enrollment.store_timeout, Duration::from_millis(750));
        reset_env();
    }

    #[test]
    fn rejects_invalid_enrollment_settings() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ENROLLMENT_STARTING_NUMBER", "twenty-five");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidStartingNumber { .. })
        ));

        reset_env();
        env::set_var("ENROLLMENT_DUPLICATE_POLICY", "sometimes");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidDuplicatePolicy { .. })
        ));

        reset_env();
        env::set_var("ENROLLMENT_STORE_TIMEOUT_MS", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidStoreTimeout { .. })
        ));
        reset_env();
    }
}
