use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::errors::EngineError;
use crate::models::{BoundingBox, ServiceArea};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const ENV_PREFIX: &str = "RIDE";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_DEBOUNCE_MS: u64 = 300;
const DEFAULT_MIN_QUERY_CHARS: usize = 2;
const DEFAULT_MAX_SUGGESTIONS: usize = 5;
const DEFAULT_RECENTER_ZOOM: u8 = 15;
const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_PHOTON_URL: &str = "https://photon.komoot.io";
const DEFAULT_USER_AGENT: &str = concat!("ride-locator/", env!("CARGO_PKG_VERSION"));

/// Which upstream API an adapter speaks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Nominatim,
    Photon,
}

/// One geocoding provider endpoint
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub kind: ProviderKind,

    #[validate(url)]
    pub base_url: String,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1000, max = 60000))]
    pub timeout_ms: u64,

    /// Only honored for the backup slot; the primary is always used
    #[serde(default = "default_true_bool")]
    pub enabled: bool,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Which configured provider answers autocomplete queries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    Primary,
    Backup,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GeocodingConfig {
    #[serde(default = "default_primary_provider")]
    #[validate]
    pub primary: ProviderConfig,

    #[serde(default = "default_backup_provider")]
    #[validate]
    pub backup: ProviderConfig,

    /// Sent on every request; Nominatim rejects anonymous clients
    #[serde(default = "default_user_agent")]
    #[validate(length(min = 1))]
    pub user_agent: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_provider(),
            backup: default_backup_provider(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
        }
    }
}

/// Autocomplete behaviour
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AutocompleteConfig {
    #[serde(default = "default_debounce_ms")]
    #[validate(range(max = 5000))]
    pub debounce_ms: u64,

    #[serde(default = "default_min_query_chars")]
    #[validate(range(min = 1, max = 10))]
    pub min_query_chars: usize,

    #[serde(default = "default_max_suggestions")]
    #[validate(range(min = 1, max = 20))]
    pub max_suggestions: usize,

    /// Photon by default: the public Nominatim policy forbids autocomplete traffic
    #[serde(default = "default_autocomplete_provider")]
    pub provider: ProviderRole,
}

impl Default for AutocompleteConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            min_query_chars: default_min_query_chars(),
            max_suggestions: default_max_suggestions(),
            provider: default_autocomplete_provider(),
        }
    }
}

/// Geographic bounds of the service
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_service_area"))]
pub struct ServiceAreaConfig {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub country_code: Option<String>,
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl Default for ServiceAreaConfig {
    fn default() -> Self {
        let area = ServiceArea::malmo();
        Self {
            name: area.name,
            country_code: area.country_code,
            min_lat: area.bounds.min_lat,
            min_lng: area.bounds.min_lng,
            max_lat: area.bounds.max_lat,
            max_lng: area.bounds.max_lng,
        }
    }
}

impl ServiceAreaConfig {
    pub fn to_service_area(&self) -> Result<ServiceArea, EngineError> {
        let bounds = BoundingBox::new(self.min_lat, self.min_lng, self.max_lat, self.max_lng)?;
        Ok(ServiceArea::new(
            self.name.clone(),
            self.country_code.clone(),
            bounds,
        ))
    }
}

/// When a GPS fix moves the map viewport
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GpsRecenterPolicy {
    Always,
    FirstFixOnly,
    Never,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SelectionConfig {
    #[serde(default = "default_recenter_policy")]
    pub recenter_policy: GpsRecenterPolicy,

    #[serde(default = "default_recenter_zoom")]
    #[validate(range(min = 1, max = 20))]
    pub recenter_zoom: u8,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            recenter_policy: default_recenter_policy(),
            recenter_zoom: default_recenter_zoom(),
        }
    }
}

/// Per-provider circuit breaker
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerSettings {
    #[serde(default = "default_true_bool")]
    pub enabled: bool,

    #[serde(default = "default_circuit_breaker_failures")]
    #[validate(range(min = 1))]
    pub failure_threshold: u32,

    #[serde(default = "default_circuit_breaker_timeout")]
    pub reset_timeout_secs: u64,

    #[serde(default = "default_circuit_breaker_successes")]
    #[validate(range(min = 1))]
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: default_circuit_breaker_failures(),
            reset_timeout_secs: default_circuit_breaker_timeout(),
            success_threshold: default_circuit_breaker_successes(),
        }
    }
}

impl CircuitBreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            timeout: Duration::from_secs(self.reset_timeout_secs),
            success_threshold: self.success_threshold,
        }
    }
}

/// Engine configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Deployment environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    #[validate]
    pub geocoding: GeocodingConfig,

    #[serde(default)]
    #[validate]
    pub autocomplete: AutocompleteConfig,

    #[serde(default)]
    #[validate]
    pub service_area: ServiceAreaConfig,

    #[serde(default)]
    #[validate]
    pub selection: SelectionConfig,

    #[serde(default)]
    #[validate]
    pub circuit_breaker: CircuitBreakerSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            geocoding: GeocodingConfig::default(),
            autocomplete: AutocompleteConfig::default(),
            service_area: ServiceAreaConfig::default(),
            selection: SelectionConfig::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.autocomplete.debounce_ms)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.autocomplete.provider == ProviderRole::Backup && !self.geocoding.backup.enabled {
            let mut err = ValidationError::new("autocomplete_provider_disabled");
            err.message = Some(
                "Autocomplete is routed to the backup provider but RIDE__GEOCODING__BACKUP__ENABLED=false".into(),
            );
            errors.add("autocomplete", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Runs field validation followed by cross-field checks.
    pub fn validate_all(&self) -> Result<(), ConfigError> {
        self.validate().map_err(|e| {
            error!("Configuration validation failed: {:?}", e);
            ConfigError::Validation(e)
        })?;
        self.validate_additional_constraints().map_err(|e| {
            error!("Configuration consistency check failed: {:?}", e);
            ConfigError::Validation(e)
        })
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_true_bool() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_primary_provider() -> ProviderConfig {
    ProviderConfig {
        kind: ProviderKind::Nominatim,
        base_url: DEFAULT_NOMINATIM_URL.to_string(),
        timeout_ms: DEFAULT_TIMEOUT_MS,
        enabled: true,
    }
}

fn default_backup_provider() -> ProviderConfig {
    ProviderConfig {
        kind: ProviderKind::Photon,
        base_url: DEFAULT_PHOTON_URL.to_string(),
        timeout_ms: DEFAULT_TIMEOUT_MS,
        enabled: true,
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_accept_language() -> String {
    "sv,en".to_string()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_min_query_chars() -> usize {
    DEFAULT_MIN_QUERY_CHARS
}

fn default_max_suggestions() -> usize {
    DEFAULT_MAX_SUGGESTIONS
}

fn default_autocomplete_provider() -> ProviderRole {
    ProviderRole::Backup
}

fn default_recenter_policy() -> GpsRecenterPolicy {
    GpsRecenterPolicy::FirstFixOnly
}

fn default_recenter_zoom() -> u8 {
    DEFAULT_RECENTER_ZOOM
}

fn default_circuit_breaker_failures() -> u32 {
    5
}

fn default_circuit_breaker_timeout() -> u64 {
    60
}

fn default_circuit_breaker_successes() -> u32 {
    1
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_service_area(area: &ServiceAreaConfig) -> Result<(), ValidationError> {
    if BoundingBox::new(area.min_lat, area.min_lng, area.max_lat, area.max_lng).is_err() {
        let mut err = ValidationError::new("service_area_bounds");
        err.message =
            Some("service_area bounds must be in range with min_lat < max_lat and min_lng < max_lng".into());
        return Err(err);
    }
    if let Some(code) = &area.country_code {
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            let mut err = ValidationError::new("service_area_country_code");
            err.message = Some("country_code must be a two-letter ISO 3166-1 code".into());
            return Err(err);
        }
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("ride_locator={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads engine configuration from `./config` and the environment
pub fn load_config() -> Result<EngineConfig, ConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Loads engine configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. `{dir}/default.toml`
/// 3. `{dir}/{env}.toml` where env is `RUN_ENV` or `APP_ENV`
/// 4. Environment variables (`RIDE__*`, nested keys joined with `__`)
pub fn load_config_from(dir: &Path) -> Result<EngineConfig, ConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            dir.display()
        );
    }

    let config = Config::builder()
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
        .add_source(File::with_name(&dir.join(&run_env).to_string_lossy()).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let engine_config: EngineConfig = config.try_deserialize()?;
    engine_config.validate_all()?;

    info!("Configuration loaded successfully");
    Ok(engine_config)
}
