pub mod calendar;
pub mod config;
pub mod doctor;
pub mod finish_elapsed;
pub mod migrate;

use festa_core::config::{AppConfig, LoadOptions};
use festa_core::errors::{ApplicationError, InterfaceError};
use festa_core::lifecycle::{CalendarPolicy, LifecycleEngine};
use festa_db::{connect_with_config, SqlBookingStore, SqlNotifier};
use serde::Serialize;
use serde_json::Value;

pub type SqlEngine = LifecycleEngine<SqlBookingStore, SqlNotifier>;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with(command, message, None)
    }

    pub fn success_with(command: &str, message: impl Into<String>, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

/// Error class, message and exit code of a failed step.
pub(crate) type StepFailure = (&'static str, String, u8);

pub(crate) fn load_config(command: &str, options: &LoadOptions) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options.clone()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Engine over the configured SQLite database. Notifications are stored in
/// the same database.
pub(crate) async fn open_engine(config: &AppConfig) -> Result<SqlEngine, StepFailure> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    Ok(LifecycleEngine::new(SqlBookingStore::new(pool.clone()), SqlNotifier::new(pool))
        .with_calendar_policy(CalendarPolicy::from(&config.calendar)))
}

/// Maps an engine failure onto the interface error classes.
pub(crate) fn engine_failure(error: ApplicationError) -> StepFailure {
    let class = match InterfaceError::from(error.clone()) {
        InterfaceError::BadRequest { .. } => "bad_request",
        InterfaceError::Forbidden { .. } => "forbidden",
        InterfaceError::NotFound { .. } => "not_found",
        InterfaceError::Conflict { .. } => "conflict",
        InterfaceError::ServiceUnavailable { .. } => "service_unavailable",
        InterfaceError::Internal { .. } => "internal",
    };
    (class, error.to_string(), 7)
}

pub(crate) fn to_data(value: &impl Serialize) -> Result<Value, StepFailure> {
    serde_json::to_value(value).map_err(|error| ("serialization", error.to_string(), 8u8))
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
