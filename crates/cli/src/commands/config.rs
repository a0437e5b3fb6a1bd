use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use kopi_core::config::AppConfig;
use serde_json::{Map, Value as JsonValue};
use toml::Value;

use crate::commands::{load_config, CommandResult};

/// Dotted key paths reported with their source, each overridable by `KOPI_<PATH>`.
const TRACKED_KEYS: &[&str] = &[
    "database.url",
    "database.max_connections",
    "database.timeout_secs",
    "services.base_url",
    "services.calculator_timeout_secs",
    "services.products_timeout_secs",
    "services.outlets_timeout_secs",
    "services.products_top_k",
    "llm.provider",
    "llm.api_key",
    "llm.base_url",
    "llm.model",
    "llm.timeout_secs",
    "llm.temperature",
    "server.bind_address",
    "server.port",
    "server.graceful_shutdown_secs",
    "logging.level",
    "logging.format",
];

pub fn run() -> CommandResult {
    match load_config("config") {
        Ok(config) => run_with_config(&config),
        Err(failure) => failure,
    }
}

pub fn run_with_config(config: &AppConfig) -> CommandResult {
    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let sources = TRACKED_KEYS
        .iter()
        .map(|key| {
            let source = field_source(key, config_file_doc.as_ref(), config_file_path.as_deref());
            (key.to_string(), JsonValue::String(source))
        })
        .collect::<Map<_, _>>();

    let details = serde_json::json!({
        "effective": config.redacted_summary(),
        "sources": sources,
    });

    CommandResult::success_with(
        "config",
        "effective config (source precedence: env > file > default)",
        Some(details),
    )
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("kopi.toml"), PathBuf::from("config/kopi.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn env_key(key_path: &str) -> String {
    format!("KOPI_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn field_source(
    key_path: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let env_key = env_key(key_path);
    if env::var_os(&env_key).is_some() {
        return format!("env ({env_key})");
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

#[cfg(test)]
mod tests {
    use std::path::Path;

    use kopi_core::config::AppConfig;
    use serde_json::Value;

    use super::{contains_path, env_key, field_source, run_with_config};

    #[test]
    fn env_keys_follow_dotted_paths() {
        assert_eq!(env_key("database.url"), "KOPI_DATABASE_URL");
        assert_eq!(env_key("services.products_top_k"), "KOPI_SERVICES_PRODUCTS_TOP_K");
    }

    #[test]
    fn file_source_is_reported_for_present_keys() {
        let doc: toml::Value = "[llm]\nmodel = \"gpt-4o-mini\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.provider"));
        assert_eq!(
            field_source("llm.model", Some(&doc), Some(Path::new("kopi.toml"))),
            "file (kopi.toml)"
        );
        assert_eq!(field_source("llm.provider", Some(&doc), None), "default");
    }

    #[test]
    fn output_redacts_api_key() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-should-not-leak".to_string().into());

        let result = run_with_config(&config);
        let payload: Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(result.exit_code, 0);
        assert!(!result.output.contains("sk-should-not-leak"));
        assert_eq!(payload["details"]["effective"]["llm"]["api_key"], "[REDACTED]");
        assert!(payload["details"]["sources"]["server.port"].is_string());
    }
}
