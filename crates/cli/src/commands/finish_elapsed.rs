use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDateTime};
use festa_core::config::LoadOptions;

use crate::commands::{
    engine_failure, load_config, open_engine, runtime, to_data, CommandResult, StepFailure,
};

const TIMESTAMP_FORMATS: &[&str] =
    &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Finishes every confirmed reservation whose event has ended by `now`
/// (local wall-clock time when omitted). Meant to run from a scheduler.
pub fn run(options: &LoadOptions, now: Option<&str>) -> CommandResult {
    let now = match now.map(parse_timestamp).transpose() {
        Ok(now) => now.unwrap_or_else(|| Local::now().naive_local()),
        Err(error) => {
            return CommandResult::failure("finish-elapsed", "invalid_argument", error.to_string(), 6)
        }
    };
    let config = match load_config("finish-elapsed", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("finish-elapsed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let engine = open_engine(&config).await?;
        let report = engine.finish_elapsed(now).await.map_err(engine_failure)?;
        engine.store().pool().close().await;
        Ok::<_, StepFailure>(report)
    });

    let report = match result {
        Ok(report) => report,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("finish-elapsed", error_class, message, exit_code)
        }
    };
    match to_data(&report) {
        Ok(data) => CommandResult::success_with(
            "finish-elapsed",
            format!(
                "finished {} reservation(s) ended by {}, skipped {}",
                report.finished.len(),
                now.format("%Y-%m-%d %H:%M"),
                report.skipped.len()
            ),
            Some(data),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("finish-elapsed", error_class, message, exit_code)
        }
    }
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| anyhow!("`{value}` is not a timestamp (expected YYYY-MM-DDTHH:MM[:SS])"))
}
