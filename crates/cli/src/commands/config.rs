use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cartwise_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let sources =
        Sources { doc: load_config_file_doc(config_file_path.as_deref()), path: config_file_path };

    let fields = vec![
        field("database.url", config.database.url.clone(), &["CARTWISE_DATABASE_URL"]),
        field(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["CARTWISE_DATABASE_MAX_CONNECTIONS"],
        ),
        field(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["CARTWISE_DATABASE_TIMEOUT_SECS"],
        ),
        field(
            "knowledge.data_dir",
            config.knowledge.data_dir.display().to_string(),
            &["CARTWISE_KNOWLEDGE_DATA_DIR"],
        ),
        field(
            "knowledge.order_page_size",
            config.knowledge.order_page_size.to_string(),
            &["CARTWISE_KNOWLEDGE_ORDER_PAGE_SIZE"],
        ),
        field(
            "knowledge.preload_on_start",
            config.knowledge.preload_on_start.to_string(),
            &["CARTWISE_KNOWLEDGE_PRELOAD_ON_START"],
        ),
        field(
            "recommendation.default_limit",
            config.recommendation.default_limit.to_string(),
            &["CARTWISE_RECOMMENDATION_DEFAULT_LIMIT"],
        ),
        field(
            "recommendation.max_limit",
            config.recommendation.max_limit.to_string(),
            &["CARTWISE_RECOMMENDATION_MAX_LIMIT"],
        ),
        field(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["CARTWISE_SERVER_BIND_ADDRESS"],
        ),
        field("server.port", config.server.port.to_string(), &["CARTWISE_SERVER_PORT"]),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["CARTWISE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["CARTWISE_LOGGING_LEVEL", "CARTWISE_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["CARTWISE_LOGGING_FORMAT", "CARTWISE_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields.into_iter().map(|(key, value, env_keys)| {
        render_line(key, &value, sources.field_source(key, env_keys))
    }));
    lines.join("\n")
}

fn field(
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
) -> (&'static str, String, &'static [&'static str]) {
    (key, value, env_keys)
}

struct Sources {
    doc: Option<Value>,
    path: Option<PathBuf>,
}

impl Sources {
    fn field_source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
