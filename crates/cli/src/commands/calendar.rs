use chrono::NaiveDate;
use festa_core::config::LoadOptions;
use festa_core::domain::party::ProviderId;
use serde::Serialize;

use crate::commands::{
    engine_failure, load_config, open_engine, runtime, to_data, CommandResult, StepFailure,
};

#[derive(Debug, Serialize)]
struct CalendarRow {
    hour: String,
    free: bool,
    occupied_by: Vec<String>,
}

/// Hour-by-hour occupancy of one provider's day.
pub fn run(options: &LoadOptions, provider: &str, date: &str) -> CommandResult {
    let Ok(day) = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") else {
        return CommandResult::failure(
            "calendar",
            "invalid_argument",
            format!("`{date}` is not a date (expected YYYY-MM-DD)"),
            6,
        );
    };
    let config = match load_config("calendar", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("calendar") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let provider_id = ProviderId(provider.trim().to_owned());
    let result = runtime.block_on(async {
        let engine = open_engine(&config).await?;
        let cells = engine.day_timeline(&provider_id, day).await.map_err(engine_failure)?;
        engine.store().pool().close().await;
        Ok::<_, StepFailure>(cells)
    });

    match result {
        Ok(cells) => {
            let busy = cells.iter().filter(|cell| !cell.is_free()).count();
            let rows: Vec<CalendarRow> = cells
                .iter()
                .map(|cell| CalendarRow {
                    hour: cell.starts_at.format("%H:%M").to_string(),
                    free: cell.is_free(),
                    occupied_by: cell
                        .occupied_by
                        .iter()
                        .map(|commitment| commitment.source.to_string())
                        .collect(),
                })
                .collect();
            match to_data(&rows) {
                Ok(data) => CommandResult::success_with(
                    "calendar",
                    format!("{provider_id} on {day}: {busy} of {} hours occupied", rows.len()),
                    Some(data),
                ),
                Err((error_class, message, exit_code)) => {
                    CommandResult::failure("calendar", error_class, message, exit_code)
                }
            }
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("calendar", error_class, message, exit_code)
        }
    }
}
