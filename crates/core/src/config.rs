use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::knowledge::DEFAULT_ORDER_PAGE_SIZE;

pub const DEFAULT_CONFIG_FILE: &str = "cartwise.toml";
pub const NESTED_CONFIG_FILE: &str = "config/cartwise.toml";

#[derive(Clone, Debug, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub knowledge: KnowledgeConfig,
    pub recommendation: RecommendationConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct KnowledgeConfig {
    /// Directory holding the association, popularity and name artifacts.
    pub data_dir: PathBuf,
    pub order_page_size: u32,
    pub preload_on_start: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RecommendationConfig {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self { default_limit: 10, max_limit: 50 }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub data_dir: Option<PathBuf>,
    pub order_page_size: Option<u32>,
    pub server_port: Option<u16>,
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
                url: "sqlite://cartwise.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            knowledge: KnowledgeConfig {
                data_dir: PathBuf::from("data/knowledge"),
                order_page_size: DEFAULT_ORDER_PAGE_SIZE,
                preload_on_start: true,
            },
            recommendation: RecommendationConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
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

impl AppConfig {
    /// Defaults, then the TOML file, then `CARTWISE_*` variables, then explicit overrides.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
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

        if let Some(knowledge) = patch.knowledge {
            if let Some(data_dir) = knowledge.data_dir {
                self.knowledge.data_dir = data_dir;
            }
            if let Some(order_page_size) = knowledge.order_page_size {
                self.knowledge.order_page_size = order_page_size;
            }
            if let Some(preload_on_start) = knowledge.preload_on_start {
                self.knowledge.preload_on_start = preload_on_start;
            }
        }

        if let Some(recommendation) = patch.recommendation {
            if let Some(default_limit) = recommendation.default_limit {
                self.recommendation.default_limit = default_limit;
            }
            if let Some(max_limit) = recommendation.max_limit {
                self.recommendation.max_limit = max_limit;
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
        if let Some(value) = read_env("CARTWISE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CARTWISE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("CARTWISE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CARTWISE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CARTWISE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CARTWISE_KNOWLEDGE_DATA_DIR") {
            self.knowledge.data_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("CARTWISE_KNOWLEDGE_ORDER_PAGE_SIZE") {
            self.knowledge.order_page_size =
                parse_u32("CARTWISE_KNOWLEDGE_ORDER_PAGE_SIZE", &value)?;
        }
        if let Some(value) = read_env("CARTWISE_KNOWLEDGE_PRELOAD_ON_START") {
            self.knowledge.preload_on_start =
                parse_bool("CARTWISE_KNOWLEDGE_PRELOAD_ON_START", &value)?;
        }

        if let Some(value) = read_env("CARTWISE_RECOMMENDATION_DEFAULT_LIMIT") {
            self.recommendation.default_limit =
                parse_u32("CARTWISE_RECOMMENDATION_DEFAULT_LIMIT", &value)?;
        }
        if let Some(value) = read_env("CARTWISE_RECOMMENDATION_MAX_LIMIT") {
            self.recommendation.max_limit =
                parse_u32("CARTWISE_RECOMMENDATION_MAX_LIMIT", &value)?;
        }

        if let Some(value) = read_env("CARTWISE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CARTWISE_SERVER_PORT") {
            self.server.port = parse_u16("CARTWISE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CARTWISE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CARTWISE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("CARTWISE_LOGGING_LEVEL").or_else(|| read_env("CARTWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CARTWISE_LOGGING_FORMAT").or_else(|| read_env("CARTWISE_LOG_FORMAT"));
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
        if let Some(data_dir) = overrides.data_dir {
            self.knowledge.data_dir = data_dir;
        }
        if let Some(order_page_size) = overrides.order_page_size {
            self.knowledge.order_page_size = order_page_size;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_knowledge(&self.knowledge)?;
        validate_recommendation(&self.recommendation)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The config file `load` would read: the explicit path if it exists, else the first
/// default location present in the working directory.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
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

fn validate_knowledge(knowledge: &KnowledgeConfig) -> Result<(), ConfigError> {
    if knowledge.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("knowledge.data_dir must not be empty".to_string()));
    }

    if knowledge.order_page_size == 0 || knowledge.order_page_size > 10_000 {
        return Err(ConfigError::Validation(
            "knowledge.order_page_size must be in range 1..=10000".to_string(),
        ));
    }

    Ok(())
}

fn validate_recommendation(recommendation: &RecommendationConfig) -> Result<(), ConfigError> {
    if recommendation.max_limit == 0 {
        return Err(ConfigError::Validation(
            "recommendation.max_limit must be greater than zero".to_string(),
        ));
    }

    if recommendation.default_limit == 0
        || recommendation.default_limit > recommendation.max_limit
    {
        return Err(ConfigError::Validation(format!(
            "recommendation.default_limit must be in range 1..={}",
            recommendation.max_limit
        )));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

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

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| {
        ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    knowledge: Option<KnowledgePatch>,
    recommendation: Option<RecommendationPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgePatch {
    data_dir: Option<PathBuf>,
    order_page_size: Option<u32>,
    preload_on_start: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationPatch {
    default_limit: Option<u32>,
    max_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
