use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use reliefpath_cli::commands::apply::ApplyTarget;
use reliefpath_cli::commands::{apply, config, doctor, evaluate, migrate, programs, show};
use serde_json::{json, Value};

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("RELIEFPATH_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_override() {
    with_env(
        &[
            ("RELIEFPATH_DATABASE_URL", "sqlite::memory:"),
            ("RELIEFPATH_DATABASE_MAX_CONNECTIONS", "plenty"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn programs_lists_catalog_in_declaration_order() {
    with_env(&[], || {
        let result = programs::run();
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        let ids: Vec<&str> = payload["data"]
            .as_array()
            .expect("program list")
            .iter()
            .filter_map(|program| program["id"].as_str())
            .collect();
        assert_eq!(
            ids,
            vec![
                "installment_agreement",
                "offer_in_compromise",
                "currently_not_collectible",
                "penalty_abatement",
                "innocent_spouse",
            ]
        );
        assert_eq!(payload["data"][3]["steps"][0], "personal");
    });
}

#[test]
fn evaluate_ranks_programs_and_saves_the_profile() {
    let dir = tempfile::tempdir().expect("tempdir");
    let profile_path = write_json(
        dir.path(),
        "profile.json",
        &json!({
            "totalDebt": "50k-100k",
            "monthlyNetIncome": "1500",
            "bankBalance": "0",
            "allReturnsFiled": true,
            "levyActive": "yes"
        }),
    );
    let db_url = database_url(dir.path());

    with_env(&[("RELIEFPATH_DATABASE_URL", db_url.as_str())], || {
        let result = evaluate::run(&profile_path, Some("household-1"));
        assert_eq!(result.exit_code, 0, "evaluate failed: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "evaluate");
        let results = payload["data"]["results"].as_array().expect("ranked results");
        assert_eq!(results.len(), 4);
        assert_eq!(results[0]["id"], "penalty_abatement");
        assert_eq!(payload["data"]["qualified_count"], 4);
        assert_eq!(payload["data"]["skipped_programs"], json!(["innocent_spouse"]));
        assert!(results
            .iter()
            .any(|result| result["id"] == "installment_agreement"
                && result["urgent_notice"].is_string()));
    });

    assert!(dir.path().join("reliefpath.db").exists(), "profile store should be created");
}

#[test]
fn evaluate_reports_unreadable_profile() {
    with_env(&[], || {
        let result = evaluate::run(Path::new("does-not-exist.json"), None);
        assert_eq!(result.exit_code, 6);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

#[test]
fn apply_then_show_round_trips_a_submitted_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script_path = write_json(dir.path(), "penalty.json", &penalty_script());
    let after_path = write_json(dir.path(), "after.json", &json!([{ "action": "next" }]));
    let db_url = database_url(dir.path());
    let outbox_dir = dir.path().join("outbox");
    let outbox = outbox_dir.display().to_string();

    with_env(
        &[("RELIEFPATH_DATABASE_URL", db_url.as_str()), ("RELIEFPATH_SUBMISSION_OUTBOX_DIR", outbox.as_str())],
        || {
            let result = apply::run(ApplyTarget::Program("penalty_abatement"), &script_path);
            assert_eq!(result.exit_code, 0, "apply failed: {}", result.output);

            let payload = parse_payload(&result.output);
            let data = &payload["data"];
            assert_eq!(data["state"], "submitted");
            assert_eq!(data["rejected"], json!([]));
            assert_eq!(data["derived"]["total_relief_requested"], "1285.50");
            let receipts = data["submissions"].as_array().expect("receipts");
            assert_eq!(receipts.len(), 1);
            assert_eq!(receipts[0]["status"], "queued");

            let submission_id = receipts[0]["submission_id"].as_str().expect("submission id");
            assert!(outbox_dir.join(format!("{submission_id}.json")).exists());
            assert_eq!(data["audit"]["rejected"], 0);
            assert_eq!(data["audit"]["submission_ids"], json!([submission_id]));

            let session_id = data["session_id"].as_str().expect("session id").to_string();
            let shown = show::run(&session_id);
            assert_eq!(shown.exit_code, 0, "show failed: {}", shown.output);
            let shown = parse_payload(&shown.output);
            assert_eq!(shown["data"]["session"]["state"], "submitted");
            assert_eq!(shown["data"]["session"]["program_id"], "penalty_abatement");

            let resumed = apply::run(ApplyTarget::Session(&session_id), &after_path);
            assert_eq!(resumed.exit_code, 0, "resume failed: {}", resumed.output);
            let resumed = parse_payload(&resumed.output);
            assert_eq!(resumed["data"]["state"], "submitted");
            assert_eq!(resumed["data"]["applied"], 0);
            assert_eq!(resumed["data"]["rejected"][0]["kind"], "state_violation");
            assert_eq!(resumed["data"]["audit"]["rejected_kinds"]["state_violation"], 1);
        },
    );
}

#[test]
fn apply_reports_validation_failures_inline() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script_path = write_json(
        dir.path(),
        "partial.json",
        &json!([
            { "action": "set_field", "key": "full_name", "value": "Jordan Avery" },
            { "action": "set_field", "key": "ssn", "value": "666-12-3456" },
            { "action": "next" }
        ]),
    );
    let db_url = database_url(dir.path());

    with_env(&[("RELIEFPATH_DATABASE_URL", db_url.as_str())], || {
        let result = apply::run(ApplyTarget::Program("currently_not_collectible"), &script_path);
        assert_eq!(result.exit_code, 0, "apply failed: {}", result.output);

        let payload = parse_payload(&result.output);
        let data = &payload["data"];
        assert_eq!(data["state"], "in_progress");
        assert_eq!(data["current_step"], "personal");
        assert_eq!(data["applied"], 2);
        assert_eq!(data["rejected"][0]["index"], 2);
        assert_eq!(data["rejected"][0]["kind"], "validation_failure");
        assert!(data["validation_errors"]["ssn"].is_string());
    });
}

#[test]
fn apply_rejects_unknown_program() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script_path = write_json(dir.path(), "empty.json", &json!([]));

    with_env(&[("RELIEFPATH_DATABASE_URL", "sqlite::memory:")], || {
        let result = apply::run(ApplyTarget::Program("student_loan_forgiveness"), &script_path);
        assert_eq!(result.exit_code, 9);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "apply");
        assert_eq!(payload["error_class"], "unknown_program");
    });
}

#[test]
fn show_reports_missing_session() {
    with_env(&[("RELIEFPATH_DATABASE_URL", "sqlite::memory:")], || {
        let result = show::run("WS-nowhere");
        assert_eq!(result.exit_code, 7);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "session_not_found");
    });
}

#[test]
fn doctor_json_passes_with_valid_env() {
    with_env(&[("RELIEFPATH_DATABASE_URL", "sqlite::memory:")], || {
        let report = parse_payload(&doctor::run(true));
        assert_eq!(report["overall_status"], "pass");

        let names: Vec<&str> = report["checks"]
            .as_array()
            .expect("checks")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert_eq!(names, vec!["config_validation", "catalog_integrity", "database_connectivity"]);
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_fails() {
    with_env(&[("RELIEFPATH_HEURISTICS_HIGH_THRESHOLD", "0.1")], || {
        let output = doctor::run(false);
        assert!(output.starts_with("doctor: one or more readiness checks failed"));
        assert!(output.contains("- [fail] config_validation"));
        assert!(output.contains("- [skip] catalog_integrity"));
    });
}

#[test]
fn config_attributes_env_sources() {
    with_env(
        &[("RELIEFPATH_DATABASE_URL", "sqlite::memory:"), ("RELIEFPATH_LOG_LEVEL", "debug")],
        || {
            let output = config::run();
            assert!(output
                .contains("- database.url = sqlite::memory: (source: env (RELIEFPATH_DATABASE_URL))"));
            assert!(output.contains("- logging.level = debug (source: env (RELIEFPATH_LOG_LEVEL))"));
            assert!(output.contains("- heuristics.collection_horizon_months = 12 (source: default)"));
        },
    );
}

fn penalty_script() -> Value {
    let set = |key: &str, value: Value| json!({ "action": "set_field", "key": key, "value": value });
    let next = json!({ "action": "next" });
    json!([
        set("full_name", json!("Jordan Avery")),
        set("ssn", json!("123-45-6789")),
        set("phone", json!("(415) 555-0134")),
        set("email", json!("jordan.avery@example.com")),
        set("street_address", json!("18 Alder Street")),
        set("city", json!("Oakland")),
        set("state", json!("CA")),
        set("zip_code", json!("94607")),
        set("marital_status", json!("single")),
        next,
        set("penalty_type", json!("failure_to_pay")),
        set("penalty_tax_year", json!(2022)),
        set("penalty_amount", json!("1,200.00")),
        next,
        set("abatement_basis", json!("first_time")),
        set("prior_penalties_three_years", json!("no")),
        next,
        set("penalty_interest_amount", json!("85.50")),
        set("tax_balance_paid", json!(true)),
        next,
        set("returns_filed_confirmed", json!(true)),
        next,
        next,
        set("certify_accuracy", json!(true)),
        set("signature_name", json!("Jordan Avery")),
        next,
        { "action": "submit" }
    ])
}

fn database_url(dir: &Path) -> String {
    format!("sqlite://{}", dir.join("reliefpath.db").display())
}

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_vec(value).expect("serialize json")).expect("write json file");
    path
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "RELIEFPATH_DATABASE_URL",
        "RELIEFPATH_DATABASE_MAX_CONNECTIONS",
        "RELIEFPATH_DATABASE_TIMEOUT_SECS",
        "RELIEFPATH_LOGGING_LEVEL",
        "RELIEFPATH_LOGGING_FORMAT",
        "RELIEFPATH_LOG_LEVEL",
        "RELIEFPATH_LOG_FORMAT",
        "RELIEFPATH_HEURISTICS_STANDARD_MONTHLY_ALLOWANCE",
        "RELIEFPATH_HEURISTICS_COLLECTION_HORIZON_MONTHS",
        "RELIEFPATH_HEURISTICS_QUICK_SALE_FACTOR",
        "RELIEFPATH_HEURISTICS_HARDSHIP_LIQUID_CEILING",
        "RELIEFPATH_HEURISTICS_HIGH_THRESHOLD",
        "RELIEFPATH_HEURISTICS_MEDIUM_THRESHOLD",
        "RELIEFPATH_SUBMISSION_OUTBOX_DIR",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
