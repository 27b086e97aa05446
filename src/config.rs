//! Runtime configuration from environment variables
//!
//! Endpoints and credentials are required; throttle and schedule values fall
//! back to defaults. `dotenv` is loaded by the binary before `from_env` runs.

use std::env;
use std::time::Duration;

/// Endpoint and identity settings for the external collaborators.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub mygateway_endpoint_url: String,
    pub mygateway_auth_token: String,
    pub mygateway_api_key: String,
    pub org_gateway_id: String,
    pub staker_data_model_id: String,

    pub poktscan_api_url: String,
    pub poktscan_api_token: String,

    pub uniswap_v2_endpoint_url: String,
    pub wpokt_token_id: String,
    pub wpokt_pool_id: String,

    /// Image attached to newly issued Validator credentials
    pub supply_logo_url: String,
    /// Image attached to newly issued Liquidity Provider credentials
    pub liquidity_logo_url: String,

    pub http_timeout: Duration,
    pub debug_mode: bool,

    pub pipeline: PipelineConfig,
}

/// Write-path throttle and schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Minimum spacing between two listener batches
    pub listener_latency_ms: u64,

    /// Upper bound on concurrent credential writes
    pub listener_batch_size: usize,

    /// Poll interval used while waiting for the queue to drain
    pub queue_wait_interval_ms: u64,

    /// Daily trigger time (UTC)
    pub run_at_hour: u32,
    pub run_at_minute: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            listener_latency_ms: 2_000,
            listener_batch_size: 2,
            queue_wait_interval_ms: 1_000,
            run_at_hour: 0,
            run_at_minute: 0,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVariable(name.to_string()))
}

fn required_url(name: &str) -> Result<String, ConfigError> {
    let url = required(name)?;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::InvalidValue(format!(
            "{} must start with http:// or https://",
            name
        )));
    }
    Ok(url)
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse an `HH:MM` trigger time.
pub fn parse_run_at(value: &str) -> Result<(u32, u32), ConfigError> {
    let invalid = || {
        ConfigError::InvalidValue(format!("RECALCULATE_AT_UTC must be HH:MM, got '{}'", value))
    };

    let (hour, minute) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;

    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

impl PipelineConfig {
    /// Environment variables:
    /// - `JOB_LISTENER_LATENCY_MS` (default: 2000)
    /// - `JOB_LISTENER_BATCH_SIZE` (default: 2)
    /// - `QUEUE_WAIT_INTERVAL_MS` (default: 1000)
    /// - `RECALCULATE_AT_UTC` (default: 00:00)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let listener_batch_size = parse_or("JOB_LISTENER_BATCH_SIZE", defaults.listener_batch_size);
        if listener_batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "JOB_LISTENER_BATCH_SIZE must be at least 1".to_string(),
            ));
        }

        let (run_at_hour, run_at_minute) = match env::var("RECALCULATE_AT_UTC") {
            Ok(value) => parse_run_at(&value)?,
            Err(_) => (defaults.run_at_hour, defaults.run_at_minute),
        };

        Ok(Self {
            listener_latency_ms: parse_or("JOB_LISTENER_LATENCY_MS", defaults.listener_latency_ms),
            listener_batch_size,
            queue_wait_interval_ms: parse_or(
                "QUEUE_WAIT_INTERVAL_MS",
                defaults.queue_wait_interval_ms,
            ),
            run_at_hour,
            run_at_minute,
        })
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            mygateway_endpoint_url: required_url("MYGATEWAY_ENDPOINT_URL")?,
            mygateway_auth_token: required("MYGATEWAY_AUTHENTICATION_TOKEN")?,
            mygateway_api_key: required("MYGATEWAY_API_KEY")?,
            org_gateway_id: required("POKT_ORG_GATEWAY_ID")?,
            staker_data_model_id: required("POKT_STAKER_DATA_MODEL_ID")?,

            poktscan_api_url: required_url("POKT_SCAN_API_BASE_URL")?,
            poktscan_api_token: required("POKT_SCAN_API_TOKEN")?,

            uniswap_v2_endpoint_url: required_url("UNISWAP_V2_ENDPOINT_URL")?,
            wpokt_token_id: required("UNISWAP_WPOKT_TOKEN_ID")?,
            wpokt_pool_id: required("UNISWAP_V2_WPOKT_POOL_ID")?,

            supply_logo_url: env::var("SUPPLY_STAKER_POKT_LOGO_URL").unwrap_or_default(),
            liquidity_logo_url: env::var("LIQUIDITY_STAKER_POKT_LOGO_URL").unwrap_or_default(),

            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 30)),
            debug_mode: env::var("DEBUG_MODE")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),

            pipeline: PipelineConfig::from_env()?,
        })
    }

    /// Default `env_logger` filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        if self.debug_mode {
            "debug"
        } else {
            "info"
        }
    }
}
