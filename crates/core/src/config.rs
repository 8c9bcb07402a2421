use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::DisplayHours;
use crate::domain::MAX_DURATION_MINUTES;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub calendar: CalendarConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CalendarConfig {
    /// Re-check the provider's calendar when a reservation is confirmed.
    /// Providers who deliberately overbook can turn this off.
    pub enforce_on_confirm: bool,
    pub blocked_slot_minutes: u32,
    /// Upper bound on the length of a requested, booked or blocked slot.
    pub max_duration_minutes: u32,
    pub day_start_hour: u32,
    pub day_end_hour: u32,
}

impl CalendarConfig {
    pub fn display_hours(&self) -> DisplayHours {
        DisplayHours { start_hour: self.day_start_hour, end_hour: self.day_end_hour }
    }
}

#[derive(Clone, Debug, PartialEq)]
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
    pub enforce_on_confirm: Option<bool>,
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
        let hours = DisplayHours::default();
        Self {
            database: DatabaseConfig {
                url: "sqlite://festa.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            calendar: CalendarConfig {
                enforce_on_confirm: true,
                blocked_slot_minutes: 60,
                max_duration_minutes: 7 * 24 * 60,
                day_start_hour: hours.start_hour,
                day_end_hour: hours.end_hour,
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
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("festa.toml"));
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

        if let Some(calendar) = patch.calendar {
            if let Some(enforce_on_confirm) = calendar.enforce_on_confirm {
                self.calendar.enforce_on_confirm = enforce_on_confirm;
            }
            if let Some(blocked_slot_minutes) = calendar.blocked_slot_minutes {
                self.calendar.blocked_slot_minutes = blocked_slot_minutes;
            }
            if let Some(max_duration_minutes) = calendar.max_duration_minutes {
                self.calendar.max_duration_minutes = max_duration_minutes;
            }
            if let Some(day_start_hour) = calendar.day_start_hour {
                self.calendar.day_start_hour = day_start_hour;
            }
            if let Some(day_end_hour) = calendar.day_end_hour {
                self.calendar.day_end_hour = day_end_hour;
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
        if let Some(value) = read_env("FESTA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("FESTA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("FESTA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("FESTA_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("FESTA_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FESTA_CALENDAR_ENFORCE_ON_CONFIRM") {
            self.calendar.enforce_on_confirm =
                parse_bool("FESTA_CALENDAR_ENFORCE_ON_CONFIRM", &value)?;
        }
        if let Some(value) = read_env("FESTA_CALENDAR_BLOCKED_SLOT_MINUTES") {
            self.calendar.blocked_slot_minutes =
                parse_u32("FESTA_CALENDAR_BLOCKED_SLOT_MINUTES", &value)?;
        }
        if let Some(value) = read_env("FESTA_CALENDAR_MAX_DURATION_MINUTES") {
            self.calendar.max_duration_minutes =
                parse_u32("FESTA_CALENDAR_MAX_DURATION_MINUTES", &value)?;
        }
        if let Some(value) = read_env("FESTA_CALENDAR_DAY_START_HOUR") {
            self.calendar.day_start_hour = parse_u32("FESTA_CALENDAR_DAY_START_HOUR", &value)?;
        }
        if let Some(value) = read_env("FESTA_CALENDAR_DAY_END_HOUR") {
            self.calendar.day_end_hour = parse_u32("FESTA_CALENDAR_DAY_END_HOUR", &value)?;
        }

        let log_level = read_env("FESTA_LOGGING_LEVEL").or_else(|| read_env("FESTA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("FESTA_LOGGING_FORMAT").or_else(|| read_env("FESTA_LOG_FORMAT"));
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
        if let Some(enforce_on_confirm) = overrides.enforce_on_confirm {
            self.calendar.enforce_on_confirm = enforce_on_confirm;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_calendar(&self.calendar)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("festa.toml"), PathBuf::from("config/festa.toml")]
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

/// Expands `${VAR}` and `${VAR:-fallback}` in the raw file. A fallback is
/// used when the variable is unset or blank.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let expression = &rest[start + 2..];
        let end = expression.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let (key, fallback) = match expression[..end].split_once(":-") {
            Some((key, fallback)) => (key.trim(), Some(fallback)),
            None => (expression[..end].trim(), None),
        };

        match (read_env(key), fallback) {
            (Some(value), _) => output.push_str(&value),
            (None, Some(fallback)) => output.push_str(fallback),
            (None, None) => {
                return Err(ConfigError::MissingEnvInterpolation { var: key.to_string() })
            }
        }
        rest = &expression[end + 1..];
    }

    output.push_str(rest);
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

fn validate_calendar(calendar: &CalendarConfig) -> Result<(), ConfigError> {
    if calendar.blocked_slot_minutes == 0 {
        return Err(ConfigError::Validation(
            "calendar.blocked_slot_minutes must be greater than zero".to_string(),
        ));
    }

    if calendar.max_duration_minutes == 0 || calendar.max_duration_minutes > MAX_DURATION_MINUTES {
        return Err(ConfigError::Validation(format!(
            "calendar.max_duration_minutes must be in range 1..={MAX_DURATION_MINUTES}"
        )));
    }

    if calendar.blocked_slot_minutes > calendar.max_duration_minutes {
        return Err(ConfigError::Validation(
            "calendar.blocked_slot_minutes cannot exceed calendar.max_duration_minutes".to_string(),
        ));
    }

    if calendar.day_end_hour > 24 || calendar.day_start_hour >= calendar.day_end_hour {
        return Err(ConfigError::Validation(format!(
            "calendar display hours must satisfy start < end <= 24 (got {}..{})",
            calendar.day_start_hour, calendar.day_end_hour
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
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    calendar: Option<CalendarPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarPatch {
    enforce_on_confirm: Option<bool>,
    blocked_slot_minutes: Option<u32>,
    max_duration_minutes: Option<u32>,
    day_start_hour: Option<u32>,
    day_end_hour: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_enforce_calendar_on_confirm() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.calendar.enforce_on_confirm, "calendar re-check should default on")?;
        ensure(config.calendar.blocked_slot_minutes == 60, "blocked slots default to one hour")?;
        ensure(config.calendar.max_duration_minutes == 10_080, "slots default to at most a week")?;
        ensure(
            config.calendar.day_start_hour == 8 && config.calendar.day_end_hour == 19,
            "display hours default to 08:00-19:00",
        )?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "compact logs by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_FESTA_DB_PATH", "sqlite://interpolated.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("festa.toml");
            fs::write(
                &path,
                r#"
[database]
url = "${TEST_FESTA_DB_PATH}"

[calendar]
blocked_slot_minutes = 240
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://interpolated.db",
                "database url should come from the environment",
            )?;
            ensure(config.calendar.blocked_slot_minutes == 240, "file should set slot length")
        })();

        clear_vars(&["TEST_FESTA_DB_PATH"]);
        result
    }

    #[test]
    fn interpolation_falls_back_when_variable_is_unset() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["TEST_FESTA_UNSET_DB"]);

        let expanded = super::interpolate_env_vars(
            "url = \"${TEST_FESTA_UNSET_DB:-sqlite://fallback.db}\"\n",
        )
        .map_err(|err| err.to_string())?;
        ensure(expanded == "url = \"sqlite://fallback.db\"\n", "fallback should be inserted")?;

        let missing = super::interpolate_env_vars("url = \"${TEST_FESTA_UNSET_DB}\"");
        ensure(
            matches!(missing, Err(ConfigError::MissingEnvInterpolation { ref var }) if var == "TEST_FESTA_UNSET_DB"),
            "unset variable without fallback should fail",
        )?;
        ensure(
            matches!(
                super::interpolate_env_vars("url = \"${OPEN"),
                Err(ConfigError::UnterminatedInterpolation)
            ),
            "unterminated expression should fail",
        )
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FESTA_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("FESTA_CALENDAR_ENFORCE_ON_CONFIRM", "false");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("festa.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[calendar]
enforce_on_confirm = true
day_start_hour = 9

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(!config.calendar.enforce_on_confirm, "env should win over the file")?;
            ensure(config.calendar.day_start_hour == 9, "file should win over defaults")
        })();

        clear_vars(&["FESTA_DATABASE_URL", "FESTA_CALENDAR_ENFORCE_ON_CONFIRM"]);
        result
    }

    #[test]
    fn invalid_display_hours_fail_fast() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FESTA_CALENDAR_DAY_START_HOUR", "20");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::Validation(ref message) if message.contains("display hours")),
                "validation failure should mention display hours",
            )
        })();

        clear_vars(&["FESTA_CALENDAR_DAY_START_HOUR"]);
        result
    }

    #[test]
    fn slot_length_limit_is_bounded() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FESTA_CALENDAR_MAX_DURATION_MINUTES", "1440");
        let result = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))
            .and_then(|config| {
                ensure(config.calendar.max_duration_minutes == 1440, "env should set the limit")
            });

        env::set_var("FESTA_CALENDAR_MAX_DURATION_MINUTES", "600000");
        let too_long = AppConfig::load(LoadOptions::default());

        env::set_var("FESTA_CALENDAR_MAX_DURATION_MINUTES", "30");
        let below_default_block = AppConfig::load(LoadOptions::default());

        clear_vars(&["FESTA_CALENDAR_MAX_DURATION_MINUTES"]);
        result?;
        ensure(
            matches!(too_long, Err(ConfigError::Validation(ref message)) if message.contains("max_duration_minutes")),
            "a limit beyond one year should be rejected",
        )?;
        ensure(
            matches!(below_default_block, Err(ConfigError::Validation(_))),
            "the default blocked slot must fit under the limit",
        )
    }

    #[test]
    fn malformed_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FESTA_CALENDAR_ENFORCE_ON_CONFIRM", "sometimes");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "FESTA_CALENDAR_ENFORCE_ON_CONFIRM", "error should name the key")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected an invalid override error".to_string()),
        };

        clear_vars(&["FESTA_CALENDAR_ENFORCE_ON_CONFIRM"]);
        result
    }

    #[test]
    fn log_format_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FESTA_LOG_LEVEL", "warn");
        env::set_var("FESTA_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warn level should be set from env var")?;
            ensure(matches!(config.logging.format, LogFormat::Json), "json format from env var")
        })();

        clear_vars(&["FESTA_LOG_LEVEL", "FESTA_LOG_FORMAT"]);
        result
    }
}
