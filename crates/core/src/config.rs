use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expiry::MAX_LEAD_DAYS;

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["policydesk.toml", "config/policydesk.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub quoting: QuotingConfig,
    pub expiry: ExpiryConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct QuotingConfig {
    pub mode: QuotingMode,
    /// Upper bound for a single insurer call. `None` waits indefinitely.
    pub per_source_timeout_ms: Option<u64>,
    /// Seeds the simulated connectors so runs are reproducible.
    pub seed: Option<u64>,
    pub insurers: Vec<InsurerConfig>,
}

#[derive(Clone, Debug)]
pub struct InsurerConfig {
    pub code: String,
    pub company_name: String,
    pub endpoint: Option<String>,
    pub api_key: Option<SecretString>,
    pub latency_ms: u64,
    pub band_low: f64,
    pub band_high: f64,
    pub failure_rate: f64,
}

#[derive(Clone, Debug)]
pub struct ExpiryConfig {
    pub lead_days: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotingMode {
    Simulated,
    Live,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub quoting_mode: Option<QuotingMode>,
    pub quoting_seed: Option<u64>,
    pub expiry_lead_days: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://policydesk.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            quoting: QuotingConfig {
                mode: QuotingMode::Simulated,
                per_source_timeout_ms: None,
                seed: None,
                insurers: default_insurers(),
            },
            expiry: ExpiryConfig { lead_days: 7 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

/// The three connectors the agency ships with, in display order.
pub fn default_insurers() -> Vec<InsurerConfig> {
    vec![
        preset("doga", "Doğa Sigorta", 300, -0.2, 0.2),
        preset("allianz", "Allianz Sigorta", 500, -0.1, 0.5),
        preset("turkiye", "Türkiye Sigorta", 700, 0.1, 0.6),
    ]
}

fn preset(code: &str, company_name: &str, latency_ms: u64, low: f64, high: f64) -> InsurerConfig {
    InsurerConfig {
        code: code.to_string(),
        company_name: company_name.to_string(),
        endpoint: None,
        api_key: None,
        latency_ms,
        band_low: low,
        band_high: high,
        failure_rate: 0.0,
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for QuotingMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simulated" => Ok(Self::Simulated),
            "live" => Ok(Self::Live),
            other => Err(ConfigError::Validation(format!(
                "unsupported quoting mode `{other}` (expected simulated|live)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl InsurerConfig {
    /// Env key carrying this insurer's API key, e.g. `POLICYDESK_INSURER_ALLIANZ_API_KEY`.
    pub fn api_key_env_var(&self) -> String {
        format!("POLICYDESK_INSURER_{}_API_KEY", self.code.to_ascii_uppercase())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().map(|key| !key.expose_secret().trim().is_empty()).unwrap_or(false)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(quoting) = patch.quoting {
            if let Some(mode) = quoting.mode {
                self.quoting.mode = mode;
            }
            if let Some(per_source_timeout_ms) = quoting.per_source_timeout_ms {
                self.quoting.per_source_timeout_ms = Some(per_source_timeout_ms);
            }
            if let Some(seed) = quoting.seed {
                self.quoting.seed = Some(seed);
            }
            // A file that lists insurers replaces the built-in presets entirely.
            if let Some(insurers) = quoting.insurers {
                self.quoting.insurers = insurers.into_iter().map(InsurerPatch::into_config).collect();
            }
        }

        if let Some(expiry) = patch.expiry {
            if let Some(lead_days) = expiry.lead_days {
                self.expiry.lead_days = lead_days;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("POLICYDESK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("POLICYDESK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("POLICYDESK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("POLICYDESK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("POLICYDESK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("POLICYDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("POLICYDESK_SERVER_PORT") {
            self.server.port = parse_u16("POLICYDESK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("POLICYDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("POLICYDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("POLICYDESK_QUOTING_MODE") {
            self.quoting.mode = value.parse()?;
        }
        if let Some(value) = read_env("POLICYDESK_QUOTING_PER_SOURCE_TIMEOUT_MS") {
            self.quoting.per_source_timeout_ms =
                Some(parse_u64("POLICYDESK_QUOTING_PER_SOURCE_TIMEOUT_MS", &value)?);
        }
        if let Some(value) = read_env("POLICYDESK_QUOTING_SEED") {
            self.quoting.seed = Some(parse_u64("POLICYDESK_QUOTING_SEED", &value)?);
        }
        for insurer in &mut self.quoting.insurers {
            if let Some(value) = read_env(&insurer.api_key_env_var()) {
                insurer.api_key = Some(secret_value(value));
            }
        }

        if let Some(value) = read_env("POLICYDESK_EXPIRY_LEAD_DAYS") {
            self.expiry.lead_days = parse_u32("POLICYDESK_EXPIRY_LEAD_DAYS", &value)?;
        }

        let log_level =
            read_env("POLICYDESK_LOGGING_LEVEL").or_else(|| read_env("POLICYDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("POLICYDESK_LOGGING_FORMAT").or_else(|| read_env("POLICYDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(mode) = overrides.quoting_mode {
            self.quoting.mode = mode;
        }
        if let Some(seed) = overrides.quoting_seed {
            self.quoting.seed = Some(seed);
        }
        if let Some(lead_days) = overrides.expiry_lead_days {
            self.expiry.lead_days = lead_days;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_quoting(&self.quoting)?;
        validate_expiry(&self.expiry)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Returns the config file `load` would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_quoting(quoting: &QuotingConfig) -> Result<(), ConfigError> {
    if quoting.per_source_timeout_ms == Some(0) {
        return Err(ConfigError::Validation(
            "quoting.per_source_timeout_ms must be greater than zero when set".to_string(),
        ));
    }

    let mut codes = HashSet::new();
    for insurer in &quoting.insurers {
        let code = insurer.code.trim();
        if code.is_empty() || insurer.company_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "quoting.insurers entries require a code and a company_name".to_string(),
            ));
        }
        if !codes.insert(code.to_ascii_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "quoting.insurers code `{code}` is listed more than once"
            )));
        }
        if !(insurer.band_low > -1.0 && insurer.band_low <= insurer.band_high) {
            return Err(ConfigError::Validation(format!(
                "quoting.insurers `{code}` price band must satisfy -1 < band_low <= band_high"
            )));
        }
        if !(0.0..=1.0).contains(&insurer.failure_rate) {
            return Err(ConfigError::Validation(format!(
                "quoting.insurers `{code}` failure_rate must be in range 0..=1"
            )));
        }

        if quoting.mode == QuotingMode::Live {
            let endpoint = insurer.endpoint.as_deref().unwrap_or("").trim();
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "quoting.insurers `{code}` needs an http(s) endpoint in live mode"
                )));
            }
            if !insurer.has_api_key() {
                return Err(ConfigError::Validation(format!(
                    "quoting.insurers `{code}` needs an api_key in live mode (or set {})",
                    insurer.api_key_env_var()
                )));
            }
        }
    }

    Ok(())
}

fn validate_expiry(expiry: &ExpiryConfig) -> Result<(), ConfigError> {
    if expiry.lead_days > MAX_LEAD_DAYS {
        return Err(ConfigError::Validation(format!(
            "expiry.lead_days must be in range 0..={MAX_LEAD_DAYS}"
        )));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    quoting: Option<QuotingPatch>,
    expiry: Option<ExpiryPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct QuotingPatch {
    mode: Option<QuotingMode>,
    per_source_timeout_ms: Option<u64>,
    seed: Option<u64>,
    insurers: Option<Vec<InsurerPatch>>,
}

#[derive(Debug, Deserialize)]
struct InsurerPatch {
    code: String,
    company_name: String,
    endpoint: Option<String>,
    api_key: Option<String>,
    #[serde(default)]
    latency_ms: u64,
    #[serde(default)]
    band_low: f64,
    #[serde(default)]
    band_high: f64,
    #[serde(default)]
    failure_rate: f64,
}

impl InsurerPatch {
    fn into_config(self) -> InsurerConfig {
        InsurerConfig {
            code: self.code,
            company_name: self.company_name,
            endpoint: self.endpoint,
            api_key: self.api_key.map(secret_value),
            latency_ms: self.latency_ms,
            band_low: self.band_low,
            band_high: self.band_high,
            failure_rate: self.failure_rate,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ExpiryPatch {
    lead_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
