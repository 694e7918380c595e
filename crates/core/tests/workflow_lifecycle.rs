use chrono::{DateTime, TimeZone, Utc};
use reliefpath_core::domain::program::ProgramId;
use reliefpath_core::{
    DerivedValue, InMemoryAuditSink, ProgramCatalog, SessionId, SessionState, StateViolation,
    SubmissionSink, WorkflowAction, WorkflowError, WorkflowSession,
};
use reliefpath_core::{AuditContext, InMemorySubmissionOutbox};
use rust_decimal::Decimal;
use serde_json::{json, Value};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).single().expect("valid timestamp")
}

fn set(key: &str, value: Value) -> WorkflowAction {
    WorkflowAction::SetField { key: key.to_string(), value }
}

fn personal_answers() -> Vec<WorkflowAction> {
    vec![
        set("full_name", json!("Jordan Avery")),
        set("ssn", json!("123-45-6789")),
        set("phone", json!("(415) 555-0134")),
        set("email", json!("jordan.avery@example.com")),
        set("street_address", json!("18 Alder Street")),
        set("city", json!("Oakland")),
        set("state", json!("CA")),
        set("zip_code", json!("94607")),
        set("marital_status", json!("single")),
        WorkflowAction::Next,
    ]
}

/// A complete first-time penalty relief application.
fn penalty_script() -> Vec<WorkflowAction> {
    let mut script = personal_answers();
    script.extend([
        set("penalty_type", json!("failure_to_pay")),
        set("penalty_tax_year", json!(2022)),
        set("penalty_amount", json!("1,200.00")),
        WorkflowAction::Next,
        set("abatement_basis", json!("first_time")),
        set("prior_penalties_three_years", json!("no")),
        WorkflowAction::Next,
        set("penalty_interest_amount", json!("85.50")),
        set("tax_balance_paid", json!(true)),
        WorkflowAction::Next,
        set("returns_filed_confirmed", json!(true)),
        WorkflowAction::Next,
        WorkflowAction::Next,
        set("certify_accuracy", json!(true)),
        set("signature_name", json!("  jordan   AVERY ")),
        WorkflowAction::Next,
        WorkflowAction::Submit,
    ]);
    script
}

#[test]
fn penalty_application_walks_to_submission() {
    let catalog = ProgramCatalog::standard();
    let engine = catalog.engine_for("penalty_abatement").expect("program exists");
    let session = engine.start(SessionId("WS-walk".to_string()));

    let outcome = engine.replay(&session, &penalty_script(), now());

    assert!(outcome.rejected.is_empty(), "unexpected rejections: {:?}", outcome.rejected);
    assert_eq!(outcome.session.state, SessionState::Submitted);
    assert!(outcome.session.completed);
    assert_eq!(outcome.submissions.len(), 1);

    let payload = &outcome.submissions[0];
    assert_eq!(payload.session_id, SessionId("WS-walk".to_string()));
    assert_eq!(payload.program_id, ProgramId::new("penalty_abatement"));
    assert_eq!(payload.submitted_at, now());
    assert_eq!(
        payload.derived.get("total_relief_requested"),
        Some(&DerivedValue::Amount(Decimal::new(128_550, 2)))
    );
    assert!(!payload.derived.contains_key("cause_duration_days"));

    let outbox = InMemorySubmissionOutbox::default();
    outbox.deliver(payload).expect("payload queued");
    assert_eq!(outbox.payloads().len(), 1);
}

#[test]
fn replaying_the_same_actions_rebuilds_the_same_session() {
    let catalog = ProgramCatalog::standard();
    let engine = catalog.engine_for("currently_not_collectible").expect("program exists");
    let start = engine.start(SessionId("WS-replay".to_string()));

    let mut script = personal_answers();
    script.extend([
        set("employment_status", json!("unemployed")),
        WorkflowAction::Next,
        set("last_employer_name", json!("Harbor Freight Lines")),
        WorkflowAction::Next,
        WorkflowAction::Back,
        set("last_employment_date", json!("2023-11-30")),
        set("receiving_unemployment", json!("yes")),
        WorkflowAction::Next,
        WorkflowAction::Next,
        set("has_emergency", json!(false)),
        WorkflowAction::Next,
    ]);

    let first = engine.replay(&start, &script, now());
    let second = engine.replay(&start, &script, now());

    assert_eq!(first.session, second.session);
    assert_eq!(first.rejected, second.rejected);
    assert_eq!(
        serde_json::to_string(&first.session).expect("serializable"),
        serde_json::to_string(&second.session).expect("serializable")
    );
    assert_eq!(engine.current_step(&first.session).map(|step| step.id), Some("income"));
    assert_eq!(first.rejected.len(), 1);
    assert_eq!(first.rejected[0].kind, "validation_failure");
    assert_eq!(first.rejected[0].index, 13);
}

#[test]
fn employment_status_decides_whether_last_employment_is_asked() {
    let catalog = ProgramCatalog::standard();
    let engine = catalog.engine_for("currently_not_collectible").expect("program exists");
    let start = engine.start(SessionId("WS-employment".to_string()));

    let at_employment = engine.replay(&start, &personal_answers(), now());
    assert!(at_employment.rejected.is_empty(), "unexpected rejections: {:?}", at_employment.rejected);
    assert_eq!(engine.current_step(&at_employment.session).map(|step| step.id), Some("employment"));

    let employed = engine
        .set_field(&at_employment.session, "employment_status", json!("employed"))
        .expect("status recorded");
    let visible = engine.visible_fields(&employed);
    assert!(!visible.iter().any(|field| field.key == "last_employment_date"));
    assert!(!visible.iter().any(|field| field.step_id == "last_employment"));

    let advanced = engine.next(&employed).expect("employment step complete without a last date");
    assert_eq!(engine.current_step(&advanced).map(|step| step.id), Some("emergency"));

    let unemployed = engine
        .set_field(&at_employment.session, "employment_status", json!("unemployed"))
        .expect("status recorded");
    let last_date = engine
        .visible_fields(&unemployed)
        .into_iter()
        .find(|field| field.key == "last_employment_date")
        .expect("last employment date shown");
    assert!(last_date.required);
    assert_eq!(last_date.step_id, "last_employment");

    let advanced = engine.next(&unemployed).expect("employment step complete");
    assert_eq!(engine.current_step(&advanced).map(|step| step.id), Some("last_employment"));
    let error = engine.next(&advanced).expect_err("last employment date missing");
    let WorkflowError::Validation(failure) = error else {
        panic!("expected a validation failure");
    };
    assert_eq!(failure.message_for("last_employment_date"), Some("This field is required"));
}

#[test]
fn validation_failure_leaves_the_session_untouched() {
    let catalog = ProgramCatalog::standard();
    let engine = catalog.engine_for("offer_in_compromise").expect("program exists");
    let session = engine.start(SessionId("WS-invalid".to_string()));
    let session = engine.set_field(&session, "ssn", json!("666-12-3456")).expect("recorded");
    let before = session.clone();

    let error = engine.next(&session).expect_err("personal step is incomplete");
    let WorkflowError::Validation(failure) = error else {
        panic!("expected a validation failure");
    };

    assert_eq!(session, before);
    assert_eq!(failure.step_id.as_deref(), Some("personal"));
    assert_eq!(failure.message_for("full_name"), Some("This field is required"));
    assert_eq!(
        failure.message_for("ssn"),
        Some("Social security number has an invalid area number")
    );
    assert!(!failure.fields.contains_key("spouse_name"), "no marital status means no spouse rule");
}

#[test]
fn terminal_sessions_reject_every_action() {
    let catalog = ProgramCatalog::standard();
    let engine = catalog.engine_for("penalty_abatement").expect("program exists");
    let start = engine.start(SessionId("WS-frozen".to_string()));

    let submitted = engine.replay(&start, &penalty_script(), now()).session;
    let abandoned = engine.abandon(&start).expect("abandon from in progress");
    assert_eq!(abandoned.state, SessionState::Abandoned);

    let actions = [
        set("city", json!("Fresno")),
        WorkflowAction::ClearField { key: "city".to_string() },
        WorkflowAction::AttachDocument { name: "late.pdf".to_string(), size_bytes: 10 },
        WorkflowAction::RemoveDocument { name: "late.pdf".to_string() },
        WorkflowAction::Next,
        WorkflowAction::Back,
        WorkflowAction::Submit,
        WorkflowAction::Abandon,
    ];

    for terminal in [&submitted, &abandoned] {
        let snapshot = serde_json::to_string(terminal).expect("serializable");
        for action in &actions {
            let error = engine.apply(terminal, action, now()).expect_err("terminal is frozen");
            assert!(matches!(
                error,
                WorkflowError::State(StateViolation::TerminalSession { .. })
            ));
        }
        let replayed = engine.replay(terminal, &actions, now());
        assert_eq!(replayed.rejected.len(), actions.len());
        assert_eq!(serde_json::to_string(&replayed.session).expect("serializable"), snapshot);
    }
}

#[test]
fn current_step_is_always_in_the_effective_list() {
    let catalog = ProgramCatalog::standard();
    let engine = catalog.engine_for("installment_agreement").expect("program exists");
    let start = engine.start(SessionId("WS-conditional".to_string()));

    let mut script = personal_answers();
    script.extend([
        set("tax_debt_amount", json!("18000")),
        set("tax_years", json!("2021, 2022")),
        set("notice_received", json!("yes")),
        WorkflowAction::Next,
        set("wages", json!("4200")),
        WorkflowAction::Next,
        set("housing", json!("1600")),
        set("utilities", json!("250")),
        set("food", json!("700")),
        WorkflowAction::Next,
        set("proposed_monthly_payment", json!("400")),
        set("payment_day", json!(15)),
        set("payment_method", json!("direct_debit")),
        WorkflowAction::Next,
        set("payment_method", json!("check")),
        set("payment_method", json!("direct_debit")),
        WorkflowAction::Back,
        set("payment_method", json!("payroll_deduction")),
        WorkflowAction::Next,
        WorkflowAction::Next,
    ]);

    let mut session = start.clone();
    for action in &script {
        if let Ok(outcome) = engine.apply(&session, action, now()) {
            session = outcome.session;
        }
        assert_effective(&engine, &session);
    }

    assert!(engine
        .effective_steps(&session.answers)
        .iter()
        .all(|(_, step)| step.id != "bank_details"));
    assert_eq!(engine.current_step(&session).map(|step| step.id), Some("review"));
}

fn assert_effective(engine: &reliefpath_core::WorkflowEngine<'_>, session: &WorkflowSession) {
    if session.state != SessionState::InProgress {
        return;
    }
    let effective = engine.effective_steps(&session.answers);
    assert!(
        effective.iter().any(|(index, _)| *index == session.current_step_index),
        "step index {} is not effective",
        session.current_step_index
    );
    let (position, total) = engine.progress(session);
    assert!(position >= 1 && position <= total);
}

#[test]
fn sessions_survive_a_serde_round_trip_and_resume() {
    let catalog = ProgramCatalog::standard();
    let engine = catalog.engine_for("innocent_spouse").expect("program exists");
    let start = engine.start(SessionId("WS-resume".to_string()));
    let midway = engine.replay(&start, &personal_answers(), now()).session;

    let stored = serde_json::to_string(&midway).expect("serializable");
    let restored: WorkflowSession = serde_json::from_str(&stored).expect("deserializable");
    assert_eq!(restored, midway);
    assert_eq!(engine.current_step(&restored).map(|step| step.id), Some("joint_return"));

    let stale = WorkflowSession { definition_version: 0, ..restored };
    assert_eq!(
        engine.next(&stale).expect_err("version mismatch"),
        WorkflowError::State(StateViolation::DefinitionVersionMismatch { session: 0, current: 1 })
    );
}

#[test]
fn audited_actions_emit_one_event_each() {
    let catalog = ProgramCatalog::standard();
    let engine = catalog.engine_for("penalty_abatement").expect("program exists");
    let session = engine.start(SessionId("WS-audit".to_string()));
    let sink = InMemoryAuditSink::default();
    let audit = AuditContext::new(
        Some(session.id.clone()),
        Some(session.program_id.clone()),
        "req-audit",
        "test",
    );

    let accepted = engine
        .apply_with_audit(&session, &set("city", json!("Oakland")), now(), &sink, &audit)
        .expect("field accepted");
    let _ = engine.apply_with_audit(&accepted.session, &WorkflowAction::Next, now(), &sink, &audit);

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, "workflow.action_applied");
    assert_eq!(events[1].event_type, "workflow.action_rejected");
    assert_eq!(events[1].metadata.get("kind").map(String::as_str), Some("validation_failure"));
}

#[test]
fn audited_replay_tallies_every_action_of_the_session() {
    let catalog = ProgramCatalog::standard();
    let engine = catalog.engine_for("penalty_abatement").expect("program exists");
    let session = engine.start(SessionId("WS-audit-replay".to_string()));
    let sink = InMemoryAuditSink::default();
    let mut script = penalty_script();
    script.push(WorkflowAction::Next);

    let outcome = engine.replay_with_audit(
        &session,
        &script,
        now(),
        &sink,
        &AuditContext::new(None, None, "req-replay", "test"),
    );

    let trail = sink.trail(&session.id);
    assert_eq!(trail.applied + trail.rejected, script.len());
    assert_eq!(trail.rejected, 1);
    assert_eq!(trail.rejected_kinds.get("state_violation"), Some(&1));
    let submitted: Vec<String> =
        outcome.submissions.iter().map(|payload| payload.submission_id.0.clone()).collect();
    assert_eq!(trail.submission_ids, submitted);
    assert!(sink.events().iter().all(|event| event.occurred_at == now()));
}
