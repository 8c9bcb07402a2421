use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use festa_cli::commands::{calendar, config, doctor, finish_elapsed, migrate};
use festa_core::config::{ConfigOverrides, LoadOptions};
use festa_core::domain::listing::{Listing, ListingId};
use festa_core::domain::party::{ClientId, ProviderId};
use festa_core::domain::reservation::{DirectBooking, ReservationId};
use festa_core::lifecycle::LifecycleEngine;
use festa_db::{connect, SqlBookingStore, SqlNotifier};
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    config_path: PathBuf,
    database_url: String,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let database_url = format!("sqlite://{}", dir.path().join("festa.db").display());
        let config_path = dir.path().join("festa.toml");
        fs::write(
            &config_path,
            format!(
                "[database]\nurl = \"{database_url}\"\nmax_connections = 1\n\n[calendar]\nday_start_hour = 9\nday_end_hour = 13\n"
            ),
        )
        .expect("write config");
        Self { _dir: dir, config_path, database_url }
    }

    fn options(&self) -> LoadOptions {
        LoadOptions {
            config_path: Some(self.config_path.clone()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        }
    }

    /// Books 2025-06-01 10:00-11:30 for provider P-1 straight through the engine.
    fn seed_booking(&self) -> ReservationId {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        runtime.block_on(async {
            let pool = connect(&self.database_url).await.expect("connect");
            let store = SqlBookingStore::new(pool.clone());
            store
                .upsert_listing(&Listing {
                    id: ListingId("L-1".to_owned()),
                    provider_id: ProviderId("P-1".to_owned()),
                    title: "Brass band".to_owned(),
                    tariff_unit: None,
                })
                .await
                .expect("seed listing");
            let engine = LifecycleEngine::new(store, SqlNotifier::new(pool.clone()));
            let reservation = engine
                .book_direct(
                    &ProviderId("P-1".to_owned()),
                    DirectBooking {
                        client_id: ClientId("C-1".to_owned()),
                        listing_id: ListingId("L-1".to_owned()),
                        starts_at: NaiveDate::from_ymd_opt(2025, 6, 1)
                            .and_then(|date| date.and_hms_opt(10, 0, 0))
                            .expect("valid timestamp"),
                        duration_minutes: 90,
                        place: "Lyon".to_owned(),
                        participants: 40,
                        amount: Decimal::new(800, 0),
                        deposit: Decimal::new(200, 0),
                    },
                )
                .await
                .expect("book");
            pool.close().await;
            reservation.id
        })
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

#[test]
fn migrate_returns_success_payload() {
    let workspace = Workspace::new();

    let result = migrate::run(&workspace.options());
    assert_eq!(result.exit_code, 0, "expected successful migrate run: {}", result.output);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "migrate");
    assert_eq!(payload["status"], "ok");
    assert!(payload.get("data").is_none());

    let again = migrate::run(&workspace.options());
    assert_eq!(again.exit_code, 0, "migrations should be idempotent");
}

#[test]
fn missing_config_file_is_a_config_failure() {
    let workspace = Workspace::new();
    let mut options = workspace.options();
    options.config_path = Some(workspace.config_path.with_file_name("absent.toml"));

    let result = migrate::run(&options);
    assert_eq!(result.exit_code, 2, "expected config validation failure code");

    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error_class"], "config_validation");
}

#[test]
fn doctor_flags_unmigrated_schema_then_passes() {
    let workspace = Workspace::new();

    let before = doctor::run(&workspace.options(), true);
    assert_eq!(before.exit_code, 1);
    let report = parse_payload(&before.output);
    assert_eq!(report["overall_status"], "fail");
    assert_eq!(report["checks"][1]["name"], "database_connectivity");
    assert_eq!(report["checks"][1]["status"], "pass");
    assert_eq!(report["checks"][2]["name"], "schema_migrations");
    assert_eq!(report["checks"][2]["status"], "fail");

    assert_eq!(migrate::run(&workspace.options()).exit_code, 0);

    let after = doctor::run(&workspace.options(), true);
    assert_eq!(after.exit_code, 0, "doctor output: {}", after.output);
    assert_eq!(parse_payload(&after.output)["overall_status"], "pass");

    let human = doctor::run(&workspace.options(), false);
    assert!(human.output.starts_with("doctor: all readiness checks passed"));
    assert!(human.output.contains("- [ok] schema_migrations"));
}

#[test]
fn config_attributes_each_value_to_its_layer() {
    let workspace = Workspace::new();
    let mut options = workspace.options();
    options.overrides.log_level = Some("debug".to_owned());

    let result = config::run(&options);
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    let entries = payload["data"].as_array().expect("entries");
    let entry = |key: &str| {
        entries.iter().find(|entry| entry["key"] == key).cloned().expect("entry present")
    };

    assert_eq!(entry("calendar.day_start_hour")["value"], "9");
    assert!(entry("calendar.day_start_hour")["source"]
        .as_str()
        .is_some_and(|source| source.starts_with("file (")));
    assert_eq!(entry("calendar.blocked_slot_minutes")["source"], "default");
    assert_eq!(entry("calendar.max_duration_minutes")["value"], "10080");
    assert_eq!(entry("logging.level")["value"], "debug");
    assert_eq!(entry("logging.level")["source"], "command line");
}

#[test]
fn calendar_renders_configured_hours_with_occupancy() {
    let workspace = Workspace::new();
    assert_eq!(migrate::run(&workspace.options()).exit_code, 0);
    let reservation_id = workspace.seed_booking();

    let result = calendar::run(&workspace.options(), "P-1", "2025-06-01");
    assert_eq!(result.exit_code, 0, "calendar output: {}", result.output);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "calendar");
    let rows = payload["data"].as_array().expect("rows");
    let hours: Vec<&str> = rows.iter().filter_map(|row| row["hour"].as_str()).collect();
    assert_eq!(hours, vec!["09:00", "10:00", "11:00", "12:00"]);

    let busy: Vec<&str> = rows
        .iter()
        .filter(|row| row["free"] == false)
        .filter_map(|row| row["hour"].as_str())
        .collect();
    assert_eq!(busy, vec!["10:00", "11:00"]);
    assert_eq!(
        rows[1]["occupied_by"][0],
        format!("reservation {reservation_id} (confirmed)").as_str()
    );
}

#[test]
fn calendar_rejects_malformed_date() {
    let workspace = Workspace::new();

    let result = calendar::run(&workspace.options(), "P-1", "01/06/2025");
    assert_eq!(result.exit_code, 6);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["error_class"], "invalid_argument");
}

#[test]
fn finish_elapsed_reports_finished_reservations() {
    let workspace = Workspace::new();
    assert_eq!(migrate::run(&workspace.options()).exit_code, 0);
    let reservation_id = workspace.seed_booking();

    let early = finish_elapsed::run(&workspace.options(), Some("2025-06-01T11:00"));
    assert_eq!(early.exit_code, 0, "sweep output: {}", early.output);
    assert_eq!(parse_payload(&early.output)["data"]["finished"], serde_json::json!([]));

    let result = finish_elapsed::run(&workspace.options(), Some("2025-06-01T12:00"));
    assert_eq!(result.exit_code, 0, "sweep output: {}", result.output);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "finish-elapsed");
    assert_eq!(payload["data"]["finished"], serde_json::json!([reservation_id.as_str()]));
    assert_eq!(payload["data"]["skipped"], serde_json::json!([]));

    let bad = finish_elapsed::run(&workspace.options(), Some("tomorrow"));
    assert_eq!(bad.exit_code, 6);
}
