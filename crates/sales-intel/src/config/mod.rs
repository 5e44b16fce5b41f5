use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::workflows::briefing::AnthropicSettings;
use crate::workflows::prioritization::{AllocationPolicy, PlannerConfig};

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
    pub planner: PlannerSettings,
    pub synthesis: SynthesisConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("APP_PORT", 3000u16)?;
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let planner = PlannerSettings {
            budget: parse_var("PLANNER_BUDGET", 250i64)?,
            per_customer_cap: parse_var("PLANNER_CAP", 5i64)?,
            seed: parse_var("PLANNER_SEED", 42u64)?,
        };

        let synthesis = SynthesisConfig {
            api_key: env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| AnthropicSettings::default().model),
            max_tokens: parse_var("ANTHROPIC_MAX_TOKENS", 8000u32)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            planner,
            synthesis,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Capacity defaults and the seed used for synthetic accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerSettings {
    pub budget: i64,
    pub per_customer_cap: i64,
    pub seed: u64,
}

impl PlannerSettings {
    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            policy: AllocationPolicy {
                budget: self.budget,
                per_customer_cap: self.per_customer_cap,
                ..AllocationPolicy::default()
            },
            ..PlannerConfig::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
}

impl SynthesisConfig {
    pub fn anthropic_settings(&self) -> AnthropicSettings {
        AnthropicSettings {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            ..AnthropicSettings::default()
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue { name: &'static str, value: String },
    InvalidHost { source: std::net::AddrParseError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { name, value } => {
                write!(f, "{name} has an invalid value '{value}'")
            }
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
