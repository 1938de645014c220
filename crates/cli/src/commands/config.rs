use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use orderdesk_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let api_key = if config.oracle.api_key.is_some() { "<redacted>" } else { "<unset>" };

    let lines = vec![
        "effective config (source precedence: env > file > default):".to_string(),
        render_line("database.url", &config.database.url, source("database.url", "ORDERDESK_DATABASE_URL")),
        render_line(
            "database.max_connections",
            &config.database.max_connections.to_string(),
            source("database.max_connections", "ORDERDESK_DATABASE_MAX_CONNECTIONS"),
        ),
        render_line(
            "database.timeout_secs",
            &config.database.timeout_secs.to_string(),
            source("database.timeout_secs", "ORDERDESK_DATABASE_TIMEOUT_SECS"),
        ),
        render_line(
            "oracle.provider",
            &format!("{:?}", config.oracle.provider),
            source("oracle.provider", "ORDERDESK_ORACLE_PROVIDER"),
        ),
        render_line("oracle.model", &config.oracle.model, source("oracle.model", "ORDERDESK_ORACLE_MODEL")),
        render_line(
            "oracle.base_url",
            config.oracle.base_url.as_deref().unwrap_or("<unset>"),
            source("oracle.base_url", "ORDERDESK_ORACLE_BASE_URL"),
        ),
        render_line("oracle.api_key", api_key, source("oracle.api_key", "ORDERDESK_ORACLE_API_KEY")),
        render_line(
            "pipeline.upcoming_order_limit",
            &config.pipeline.upcoming_order_limit.to_string(),
            source("pipeline.upcoming_order_limit", "ORDERDESK_PIPELINE_UPCOMING_ORDER_LIMIT"),
        ),
        render_line(
            "pipeline.recent_order_limit",
            &config.pipeline.recent_order_limit.to_string(),
            source("pipeline.recent_order_limit", "ORDERDESK_PIPELINE_RECENT_ORDER_LIMIT"),
        ),
        render_line(
            "pipeline.organization_scan_limit",
            &config.pipeline.organization_scan_limit.to_string(),
            source("pipeline.organization_scan_limit", "ORDERDESK_PIPELINE_ORGANIZATION_SCAN_LIMIT"),
        ),
        render_line("logging.level", &config.logging.level, source("logging.level", "ORDERDESK_LOGGING_LEVEL")),
        render_line(
            "logging.format",
            &format!("{:?}", config.logging.format),
            source("logging.format", "ORDERDESK_LOGGING_FORMAT"),
        ),
    ];

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("orderdesk.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/orderdesk.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
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
