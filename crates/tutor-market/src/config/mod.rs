use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

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
    pub intake: IntakeConfig,
    pub security: SecurityConfig,
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
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        );

        let max_document_bytes = parse_var("APP_MAX_DOCUMENT_BYTES", 10 * 1024 * 1024)?;
        let intake = IntakeConfig {
            document_root: env::var("APP_DOCUMENT_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/documents")),
            dashboard_url: env::var("APP_DASHBOARD_URL")
                .unwrap_or_else(|_| "/dashboard/teacher".to_string()),
            provider_page_size: parse_var("APP_PROVIDER_PAGE_SIZE", 1000)?,
            provider_max_pages: parse_var("APP_PROVIDER_MAX_PAGES", 10)?,
            max_document_bytes,
            max_request_bytes: parse_var(
                "APP_MAX_REQUEST_BYTES",
                default_request_limit(max_document_bytes),
            )?,
        };

        let security = SecurityConfig {
            sign_in_max_attempts: parse_var("APP_SIGN_IN_MAX_ATTEMPTS", 5)?,
            sign_in_window_secs: parse_var("APP_SIGN_IN_WINDOW_SECS", 900)?,
            staff_token: env::var("APP_STAFF_TOKEN")
                .ok()
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty()),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            intake,
            security,
        })
    }
}

/// Largest intake body that still lets every known document kind reach its own size check.
/// Uploads arrive base64 encoded, which grows them by a third.
pub fn default_request_limit(max_document_bytes: u64) -> usize {
    const DOCUMENT_SLOTS: u64 = 6;
    const FORM_FIELDS: u64 = 64 * 1024;
    let encoded = max_document_bytes.div_ceil(3).saturating_mul(4);
    let total = encoded
        .saturating_mul(DOCUMENT_SLOTS)
        .saturating_add(FORM_FIELDS);
    usize::try_from(total).unwrap_or(usize::MAX)
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
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

/// Log line rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Knobs for the teacher intake pipeline and its collaborators.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub document_root: PathBuf,
    pub dashboard_url: String,
    pub provider_page_size: u32,
    pub provider_max_pages: u32,
    pub max_document_bytes: u64,
    pub max_request_bytes: usize,
}

/// Sign-in throttling and staff access.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub sign_in_max_attempts: usize,
    pub sign_in_window_secs: u64,
    pub staff_token: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a non-negative integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
