use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

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
    pub referrals: ReferralConfig,
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

        let referrals = ReferralConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            referrals,
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Timing knobs for the referral lifecycle.
///
/// The acknowledgment window is fixed per deployment; partner agreements do
/// not negotiate individual SLAs.
#[derive(Debug, Clone, Copy)]
pub struct ReferralConfig {
    /// Hours a partner has to acknowledge a freshly routed referral.
    pub ack_sla_hours: i64,
    /// Days without a status change before a referral shows up in the
    /// follow-up alert list.
    pub follow_up_threshold_days: i64,
    /// Interval between background SLA scans, in seconds.
    pub scan_interval_secs: u64,
}

impl ReferralConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let ack_sla_hours = parse_env_i64("REFERRAL_ACK_SLA_HOURS", 24)?;
        if ack_sla_hours <= 0 {
            return Err(ConfigError::InvalidSlaWindow { hours: ack_sla_hours });
        }

        let follow_up_threshold_days = parse_env_i64("REFERRAL_FOLLOWUP_THRESHOLD_DAYS", 7)?;
        if follow_up_threshold_days <= 0 {
            return Err(ConfigError::InvalidFollowUpThreshold {
                days: follow_up_threshold_days,
            });
        }

        let scan_interval_secs = env::var("REFERRAL_SCAN_INTERVAL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidScanInterval)?;

        Ok(Self {
            ack_sla_hours,
            follow_up_threshold_days,
            scan_interval_secs,
        })
    }
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            ack_sla_hours: 24,
            follow_up_threshold_days: 7,
            scan_interval_secs: 300,
        }
    }
}

fn parse_env_i64(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidInteger { key }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidInteger { key: &'static str },
    InvalidSlaWindow { hours: i64 },
    InvalidFollowUpThreshold { days: i64 },
    InvalidScanInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidInteger { key } => {
                write!(f, "{} must be a valid integer", key)
            }
            ConfigError::InvalidSlaWindow { hours } => {
                write!(f, "REFERRAL_ACK_SLA_HOURS must be positive, got {}", hours)
            }
            ConfigError::InvalidFollowUpThreshold { days } => {
                write!(
                    f,
                    "REFERRAL_FOLLOWUP_THRESHOLD_DAYS must be positive, got {}",
                    days
                )
            }
            ConfigError::InvalidScanInterval => {
                write!(f, "REFERRAL_SCAN_INTERVAL_SECS must be a valid u64")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
