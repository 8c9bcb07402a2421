use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use festa_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use toml::Value;

use crate::commands::{load_config, to_data, CommandResult};

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

/// Effective configuration with the layer each value came from
/// (override > env > file > default).
pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("config", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let file_path = detect_config_path(options.config_path.as_deref());
    let file_doc = load_config_file_doc(file_path.as_deref());
    let overrides = &options.overrides;

    let entries: Vec<ConfigEntry> = fields(&config)
        .into_iter()
        .map(|Field { key, env_keys, value }| {
            let overridden = match key {
                "database.url" => overrides.database_url.is_some(),
                "calendar.enforce_on_confirm" => overrides.enforce_on_confirm.is_some(),
                "logging.level" => overrides.log_level.is_some(),
                _ => false,
            };
            let source = if overridden {
                "command line".to_string()
            } else {
                field_source(key, env_keys, file_doc.as_ref(), file_path.as_deref())
            };
            ConfigEntry { key, value, source }
        })
        .collect();

    match to_data(&entries) {
        Ok(data) => CommandResult::success_with(
            "config",
            format!("{} effective settings", entries.len()),
            Some(data),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("config", error_class, message, exit_code)
        }
    }
}

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

fn field(key: &'static str, env_keys: &'static [&'static str], value: String) -> Field {
    Field { key, env_keys, value }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        field("database.url", &["FESTA_DATABASE_URL"], config.database.url.clone()),
        field(
            "database.max_connections",
            &["FESTA_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            &["FESTA_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        field(
            "calendar.enforce_on_confirm",
            &["FESTA_CALENDAR_ENFORCE_ON_CONFIRM"],
            config.calendar.enforce_on_confirm.to_string(),
        ),
        field(
            "calendar.blocked_slot_minutes",
            &["FESTA_CALENDAR_BLOCKED_SLOT_MINUTES"],
            config.calendar.blocked_slot_minutes.to_string(),
        ),
        field(
            "calendar.max_duration_minutes",
            &["FESTA_CALENDAR_MAX_DURATION_MINUTES"],
            config.calendar.max_duration_minutes.to_string(),
        ),
        field(
            "calendar.day_start_hour",
            &["FESTA_CALENDAR_DAY_START_HOUR"],
            config.calendar.day_start_hour.to_string(),
        ),
        field(
            "calendar.day_end_hour",
            &["FESTA_CALENDAR_DAY_END_HOUR"],
            config.calendar.day_end_hour.to_string(),
        ),
        field(
            "logging.level",
            &["FESTA_LOGGING_LEVEL", "FESTA_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["FESTA_LOGGING_FORMAT", "FESTA_LOG_FORMAT"],
            format!("{:?}", config.logging.format).to_lowercase(),
        ),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    [PathBuf::from("festa.toml"), PathBuf::from("config/festa.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys
        .iter()
        .find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()))
    {
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
