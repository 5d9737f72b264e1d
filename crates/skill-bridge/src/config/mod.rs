use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

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
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            enrollment: EnrollmentConfig::from_env()?,
            smtp: SmtpConfig::from_env()?,
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

/// Knobs for the enrollment funnel: links, quiz window, thresholds, and collaborator limits.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentConfig {
    pub frontend_base_url: String,
    /// Server-side quiz window measured from the first open. `None` leaves the timer advisory.
    pub quiz_time_limit: Option<Duration>,
    pub pass_threshold_pct: u8,
    pub selection_threshold: u8,
    pub baseline_video_score: u8,
    pub collaborator_timeout: Duration,
    pub video_upload_dir: PathBuf,
    pub video_max_bytes: usize,
}

/// Longest accepted quiz window (thirty days).
const MAX_QUIZ_TIME_LIMIT_SECS: u64 = 30 * 24 * 60 * 60;

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            frontend_base_url: "http://localhost:3000".to_string(),
            quiz_time_limit: Some(Duration::from_secs(60 * 60)),
            pass_threshold_pct: 70,
            selection_threshold: 70,
            baseline_video_score: 60,
            collaborator_timeout: Duration::from_secs(20),
            video_upload_dir: PathBuf::from("uploads"),
            video_max_bytes: 100 * 1024 * 1024,
        }
    }
}

impl EnrollmentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let frontend_base_url = env::var("FRONTEND_BASE_URL")
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.frontend_base_url);

        let quiz_time_limit = match env_number::<u64>("QUIZ_TIME_LIMIT_SECS")? {
            Some(0) => None,
            Some(secs) if secs > MAX_QUIZ_TIME_LIMIT_SECS => {
                return Err(ConfigError::OutOfRange {
                    variable: "QUIZ_TIME_LIMIT_SECS",
                    range: "0..=2592000",
                });
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.quiz_time_limit,
        };

        let pass_threshold_pct =
            env_number::<u8>("PASS_THRESHOLD_PCT")?.unwrap_or(defaults.pass_threshold_pct);
        if !(1..=100).contains(&pass_threshold_pct) {
            return Err(ConfigError::OutOfRange {
                variable: "PASS_THRESHOLD_PCT",
                range: "1..=100",
            });
        }

        let selection_threshold =
            env_number::<u8>("SELECTION_THRESHOLD")?.unwrap_or(defaults.selection_threshold);
        if selection_threshold > 100 {
            return Err(ConfigError::OutOfRange {
                variable: "SELECTION_THRESHOLD",
                range: "0..=100",
            });
        }

        let baseline_video_score =
            env_number::<u8>("BASELINE_VIDEO_SCORE")?.unwrap_or(defaults.baseline_video_score);
        if baseline_video_score > 100 {
            return Err(ConfigError::OutOfRange {
                variable: "BASELINE_VIDEO_SCORE",
                range: "0..=100",
            });
        }

        let collaborator_timeout = env_number::<u64>("COLLABORATOR_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.collaborator_timeout);

        let video_upload_dir = env::var("VIDEO_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.video_upload_dir);

        let video_max_bytes =
            env_number::<usize>("VIDEO_MAX_BYTES")?.unwrap_or(defaults.video_max_bytes);

        Ok(Self {
            frontend_base_url,
            quiz_time_limit,
            pass_threshold_pct,
            selection_threshold,
            baseline_video_score,
            collaborator_timeout,
            video_upload_dir,
            video_max_bytes,
        })
    }

    /// Link the candidate follows to open the quiz.
    pub fn quiz_url(&self, quiz_id: &str) -> String {
        format!("{}/quiz/{}", self.frontend_base_url.trim_end_matches('/'), quiz_id)
    }
}

/// Outbound SMTP credentials. Absent when any of host, user, or password is missing.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .finish()
    }
}

impl SmtpConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let host = non_empty_var("SMTP_HOST");
        let username = non_empty_var("SMTP_USER");
        let password = non_empty_var("SMTP_PASS");

        let (Some(host), Some(username), Some(password)) = (host, username, password) else {
            return Ok(None);
        };

        let port = env_number::<u16>("SMTP_PORT")?.unwrap_or(587);
        let from = non_empty_var("SMTP_FROM").unwrap_or_else(|| username.clone());

        Ok(Some(Self {
            host,
            port,
            username,
            password,
            from,
        }))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_number<T: std::str::FromStr>(variable: &'static str) -> Result<Option<T>, ConfigError> {
    match non_empty_var(variable) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { variable }),
        None => Ok(None),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str },
    OutOfRange {
        variable: &'static str,
        range: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a non-negative integer")
            }
            ConfigError::OutOfRange { variable, range } => {
                write!(f, "{variable} must be within {range}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::OutOfRange { .. } => None,
        }
    }
}
