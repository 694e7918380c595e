use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::audit::{AuditContext, AuditEvent, AuditSink};
use crate::domain::answers::Answers;
use crate::domain::session::{
    DocumentRef, SessionId, SessionState, SubmissionId, SubmissionPayload, WorkflowSession,
};
use crate::errors::{StateViolation, ValidationFailure, WorkflowError};
use crate::validators::ValidationContext;
use crate::workflow::actions::{
    ActionOutcome, FieldView, RejectedAction, ReplayOutcome, WorkflowAction,
};
use crate::workflow::definition::{FieldKind, ProgramDefinition, StepDefinition};

/// Drives sessions of one program definition.
///
/// Every operation takes the current session by reference and returns a new
/// one; a rejected operation leaves the caller's session exactly as it was.
/// The engine performs no I/O and holds no per-session state, so callers
/// persist each accepted session themselves and serialize edits to the same
/// session.
#[derive(Clone, Copy, Debug)]
pub struct WorkflowEngine<'d> {
    definition: &'d ProgramDefinition,
}

impl<'d> WorkflowEngine<'d> {
    pub fn new(definition: &'d ProgramDefinition) -> Self {
        Self { definition }
    }

    pub fn definition(&self) -> &'d ProgramDefinition {
        self.definition
    }

    pub fn start(&self, session_id: SessionId) -> WorkflowSession {
        let mut session = WorkflowSession {
            id: session_id,
            program_id: self.definition.program_id(),
            definition_version: self.definition.version,
            state: SessionState::InProgress,
            current_step_index: 0,
            answers: Answers::new(),
            derived: BTreeMap::new(),
            validation_errors: BTreeMap::new(),
            documents: Vec::new(),
            completed: false,
        };
        self.refresh(&mut session);

        tracing::info!(
            event_name = "workflow.session_started",
            session_id = %session.id,
            program_id = self.definition.id,
            version = self.definition.version,
            "workflow session started"
        );
        session
    }

    /// Steps whose include predicate holds for `answers`, with their index in the full list.
    pub fn effective_steps(&self, answers: &Answers) -> Vec<(usize, &'d StepDefinition)> {
        self.definition
            .steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.is_included(answers))
            .collect()
    }

    /// The step a caller should render, or `None` once the session is past the last step.
    pub fn current_step(&self, session: &WorkflowSession) -> Option<&'d StepDefinition> {
        match session.state {
            SessionState::InProgress => self.definition.steps.get(session.current_step_index),
            _ => None,
        }
    }

    /// Every field of the effective step list with its current required flag.
    pub fn visible_fields(&self, session: &WorkflowSession) -> Vec<FieldView> {
        self.effective_steps(&session.answers)
            .into_iter()
            .flat_map(|(_, step)| {
                step.fields.iter().map(move |field| FieldView {
                    step_id: step.id,
                    key: field.key,
                    label: field.label,
                    kind: field.kind.as_str(),
                    required: field.requirement.is_required(&session.answers),
                    error: session.validation_errors.get(field.key).cloned(),
                })
            })
            .collect()
    }

    /// 1-based position in the effective step list and its length.
    pub fn progress(&self, session: &WorkflowSession) -> (usize, usize) {
        let effective = self.effective_steps(&session.answers);
        let total = effective.len();
        let position = match session.state {
            SessionState::InProgress => effective
                .iter()
                .position(|(index, _)| *index == session.current_step_index)
                .map(|position| position + 1)
                .unwrap_or(0),
            _ => total,
        };
        (position, total)
    }

    pub fn set_field(
        &self,
        session: &WorkflowSession,
        key: &str,
        value: Value,
    ) -> Result<WorkflowSession, StateViolation> {
        self.ensure_mutable(session)?;
        self.ensure_answer_field(key)?;

        let mut next = session.clone();
        next.answers.set(key, value);
        next.validation_errors.remove(key);
        self.refresh(&mut next);

        tracing::debug!(
            event_name = "workflow.field_set",
            session_id = %next.id,
            program_id = self.definition.id,
            field = key,
            "field value recorded"
        );
        Ok(next)
    }

    pub fn clear_field(
        &self,
        session: &WorkflowSession,
        key: &str,
    ) -> Result<WorkflowSession, StateViolation> {
        self.ensure_mutable(session)?;
        self.ensure_answer_field(key)?;

        let mut next = session.clone();
        next.answers.clear(key);
        next.validation_errors.remove(key);
        self.refresh(&mut next);
        Ok(next)
    }

    pub fn attach_document(
        &self,
        session: &WorkflowSession,
        document: DocumentRef,
    ) -> Result<WorkflowSession, StateViolation> {
        self.ensure_mutable(session)?;

        let mut next = session.clone();
        next.documents.push(document);
        self.clear_document_errors(&mut next);
        self.refresh(&mut next);
        Ok(next)
    }

    /// Removes the first attached document with this name.
    pub fn remove_document(
        &self,
        session: &WorkflowSession,
        name: &str,
    ) -> Result<WorkflowSession, StateViolation> {
        self.ensure_mutable(session)?;
        let position = session
            .documents
            .iter()
            .position(|document| document.name == name)
            .ok_or_else(|| StateViolation::UnknownDocument(name.to_string()))?;

        let mut next = session.clone();
        next.documents.remove(position);
        self.clear_document_errors(&mut next);
        self.refresh(&mut next);
        Ok(next)
    }

    /// Validates the current step and moves to the next included step, or to
    /// `ReadyToSubmit` after the last one.
    pub fn next(&self, session: &WorkflowSession) -> Result<WorkflowSession, WorkflowError> {
        self.ensure_mutable(session)?;
        if session.state == SessionState::ReadyToSubmit {
            return Err(StateViolation::NoFurtherStep.into());
        }

        let Some(step) = self.definition.steps.get(session.current_step_index) else {
            return Err(StateViolation::NoFurtherStep.into());
        };

        let derived = self.definition.derive_all(&session.answers, &session.documents);
        let context = ValidationContext {
            answers: &session.answers,
            derived: &derived,
            documents: &session.documents,
        };
        let failures = step.validate(&context);
        if !failures.is_empty() {
            tracing::info!(
                event_name = "workflow.validation_failed",
                session_id = %session.id,
                program_id = self.definition.id,
                step_id = step.id,
                failed_fields = failures.len(),
                "step validation failed"
            );
            return Err(ValidationFailure::new(Some(step.id.to_string()), failures).into());
        }

        let mut next = session.clone();
        next.validation_errors.clear();
        next.derived = derived;
        match self.next_included(&next.answers, next.current_step_index) {
            Some(index) => next.current_step_index = index,
            None => next.state = SessionState::ReadyToSubmit,
        }

        tracing::info!(
            event_name = "workflow.step_advanced",
            session_id = %next.id,
            program_id = self.definition.id,
            from_step = step.id,
            state = next.state.as_str(),
            current_step_index = next.current_step_index,
            "workflow step advanced"
        );
        Ok(next)
    }

    /// Moves to the previous included step without validating anything.
    pub fn back(&self, session: &WorkflowSession) -> Result<WorkflowSession, StateViolation> {
        self.ensure_mutable(session)?;

        let mut next = session.clone();
        if session.state == SessionState::ReadyToSubmit {
            next.state = SessionState::InProgress;
            if let Some(index) = self.last_included(&next.answers) {
                next.current_step_index = index;
            }
        } else {
            next.current_step_index = self
                .previous_included(&next.answers, session.current_step_index)
                .ok_or(StateViolation::NoPreviousStep)?;
        }

        tracing::debug!(
            event_name = "workflow.step_retreated",
            session_id = %next.id,
            program_id = self.definition.id,
            current_step_index = next.current_step_index,
            "workflow step retreated"
        );
        Ok(next)
    }

    /// Re-validates every effective step plus the program certifications and
    /// freezes the session. All offending fields are reported together.
    pub fn submit(
        &self,
        session: &WorkflowSession,
        submitted_at: DateTime<Utc>,
    ) -> Result<Submission, WorkflowError> {
        self.ensure_mutable(session)?;
        if session.state != SessionState::ReadyToSubmit {
            return Err(StateViolation::NotReadyToSubmit {
                state: session.state.as_str().to_string(),
            }
            .into());
        }

        let derived = self.definition.derive_all(&session.answers, &session.documents);
        let context = ValidationContext {
            answers: &session.answers,
            derived: &derived,
            documents: &session.documents,
        };

        let mut failures = BTreeMap::new();
        for (_, step) in self.effective_steps(&session.answers) {
            for (key, message) in step.validate(&context) {
                failures.entry(key).or_insert(message);
            }
        }
        for certification in &self.definition.certifications {
            let check = certification.check(&session.answers);
            if let (false, Some(message)) = (check.valid, check.message) {
                failures.entry(certification.field.to_string()).or_insert(message);
            }
        }

        if !failures.is_empty() {
            tracing::info!(
                event_name = "workflow.validation_failed",
                session_id = %session.id,
                program_id = self.definition.id,
                failed_fields = failures.len(),
                "submission validation failed"
            );
            return Err(ValidationFailure::new(None, failures).into());
        }

        let mut frozen = session.clone();
        frozen.derived = derived;
        frozen.validation_errors.clear();
        frozen.state = SessionState::Submitted;
        frozen.completed = true;

        let payload = SubmissionPayload {
            submission_id: SubmissionId(Uuid::new_v4().to_string()),
            session_id: frozen.id.clone(),
            program_id: frozen.program_id.clone(),
            definition_version: frozen.definition_version,
            answers: frozen.answers.clone(),
            derived: frozen.derived.clone(),
            documents: frozen.documents.clone(),
            submitted_at,
        };

        tracing::info!(
            event_name = "workflow.submitted",
            session_id = %frozen.id,
            program_id = self.definition.id,
            submission_id = %payload.submission_id.0,
            "workflow session submitted"
        );
        Ok(Submission { session: frozen, payload })
    }

    pub fn abandon(&self, session: &WorkflowSession) -> Result<WorkflowSession, StateViolation> {
        self.ensure_mutable(session)?;

        let mut abandoned = session.clone();
        abandoned.state = SessionState::Abandoned;
        abandoned.validation_errors.clear();

        tracing::info!(
            event_name = "workflow.abandoned",
            session_id = %abandoned.id,
            program_id = self.definition.id,
            "workflow session abandoned"
        );
        Ok(abandoned)
    }

    /// Records a failure map on the session so a caller can render it inline.
    pub fn with_errors(
        &self,
        session: &WorkflowSession,
        failure: &ValidationFailure,
    ) -> Result<WorkflowSession, StateViolation> {
        self.ensure_mutable(session)?;

        let mut next = session.clone();
        next.validation_errors = failure.fields.clone();
        Ok(next)
    }

    pub fn apply(
        &self,
        session: &WorkflowSession,
        action: &WorkflowAction,
        now: DateTime<Utc>,
    ) -> Result<ActionOutcome, WorkflowError> {
        let unchanged = |session: WorkflowSession| ActionOutcome { session, submission: None };

        match action {
            WorkflowAction::SetField { key, value } => {
                Ok(unchanged(self.set_field(session, key, value.clone())?))
            }
            WorkflowAction::ClearField { key } => Ok(unchanged(self.clear_field(session, key)?)),
            WorkflowAction::AttachDocument { name, size_bytes } => Ok(unchanged(
                self.attach_document(session, DocumentRef::new(name.clone(), *size_bytes))?,
            )),
            WorkflowAction::RemoveDocument { name } => {
                Ok(unchanged(self.remove_document(session, name)?))
            }
            WorkflowAction::Next => Ok(unchanged(self.next(session)?)),
            WorkflowAction::Back => Ok(unchanged(self.back(session)?)),
            WorkflowAction::Submit => {
                let Submission { session, payload } = self.submit(session, now)?;
                Ok(ActionOutcome { session, submission: Some(payload) })
            }
            WorkflowAction::Abandon => Ok(unchanged(self.abandon(session)?)),
        }
    }

    pub fn apply_with_audit<S>(
        &self,
        session: &WorkflowSession,
        action: &WorkflowAction,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<ActionOutcome, WorkflowError>
    where
        S: AuditSink,
    {
        let result = self.apply(session, action, now);
        match &result {
            Ok(outcome) => sink.emit(AuditEvent::action_applied(audit, action, outcome, now)),
            Err(error) => sink.emit(AuditEvent::action_rejected(audit, action, error, now)),
        }
        result
    }

    /// Applies `actions` in order from `session`.
    ///
    /// Rejected actions leave the session as it was, except that a validation
    /// failure is recorded on the session for inline display. The same inputs
    /// always rebuild the same session.
    pub fn replay<'a, I>(
        &self,
        session: &WorkflowSession,
        actions: I,
        now: DateTime<Utc>,
    ) -> ReplayOutcome
    where
        I: IntoIterator<Item = &'a WorkflowAction>,
    {
        self.replay_with(session, actions, |current, action| self.apply(current, action, now))
    }

    /// [`replay`](Self::replay) with one audit event per action, scoped to the session.
    pub fn replay_with_audit<'a, I, S>(
        &self,
        session: &WorkflowSession,
        actions: I,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> ReplayOutcome
    where
        I: IntoIterator<Item = &'a WorkflowAction>,
        S: AuditSink,
    {
        let audit = audit.scoped_to(session);
        self.replay_with(session, actions, |current, action| {
            self.apply_with_audit(current, action, now, sink, &audit)
        })
    }

    fn replay_with<'a, I, F>(&self, session: &WorkflowSession, actions: I, mut apply: F) -> ReplayOutcome
    where
        I: IntoIterator<Item = &'a WorkflowAction>,
        F: FnMut(&WorkflowSession, &WorkflowAction) -> Result<ActionOutcome, WorkflowError>,
    {
        let mut current = session.clone();
        let mut rejected = Vec::new();
        let mut submissions = Vec::new();

        for (index, action) in actions.into_iter().enumerate() {
            match apply(&current, action) {
                Ok(outcome) => {
                    current = outcome.session;
                    submissions.extend(outcome.submission);
                }
                Err(error) => {
                    if let WorkflowError::Validation(failure) = &error {
                        if let Ok(annotated) = self.with_errors(&current, failure) {
                            current = annotated;
                        }
                    }
                    rejected.push(RejectedAction {
                        index,
                        action: action.clone(),
                        kind: error.kind(),
                        message: error.to_string(),
                    });
                }
            }
        }

        ReplayOutcome { session: current, rejected, submissions }
    }

    fn ensure_mutable(&self, session: &WorkflowSession) -> Result<(), StateViolation> {
        if session.is_terminal() {
            return Err(StateViolation::TerminalSession {
                session_id: session.id.to_string(),
                state: session.state.as_str().to_string(),
            });
        }
        if session.program_id.as_str() != self.definition.id {
            return Err(StateViolation::ProgramMismatch {
                session: session.program_id.to_string(),
                engine: self.definition.id.to_string(),
            });
        }
        if session.definition_version != self.definition.version {
            return Err(StateViolation::DefinitionVersionMismatch {
                session: session.definition_version,
                current: self.definition.version,
            });
        }
        Ok(())
    }

    fn ensure_answer_field(&self, key: &str) -> Result<(), StateViolation> {
        match self.definition.field(key) {
            Some(field) if field.kind != FieldKind::Documents => Ok(()),
            _ => Err(StateViolation::UnknownField {
                program_id: self.definition.id.to_string(),
                key: key.to_string(),
            }),
        }
    }

    fn clear_document_errors(&self, session: &mut WorkflowSession) {
        for step in &self.definition.steps {
            for field in step.fields.iter().filter(|field| field.kind == FieldKind::Documents) {
                session.validation_errors.remove(field.key);
            }
        }
    }

    /// Recomputes derived values and keeps the position on an included step.
    fn refresh(&self, session: &mut WorkflowSession) {
        session.derived = self.definition.derive_all(&session.answers, &session.documents);

        let visible: Vec<&str> = self
            .effective_steps(&session.answers)
            .into_iter()
            .flat_map(|(_, step)| step.fields.iter().map(|field| field.key))
            .collect();
        session.validation_errors.retain(|key, _| visible.contains(&key.as_str()));

        match session.state {
            SessionState::InProgress => {
                let current_included = self
                    .definition
                    .steps
                    .get(session.current_step_index)
                    .map(|step| step.is_included(&session.answers))
                    .unwrap_or(false);
                if current_included {
                    return;
                }

                let snapped = self
                    .previous_included(&session.answers, session.current_step_index)
                    .or_else(|| self.first_included_from(&session.answers, session.current_step_index));
                match snapped {
                    Some(index) => session.current_step_index = index,
                    None => session.state = SessionState::ReadyToSubmit,
                }
            }
            SessionState::ReadyToSubmit => {
                if let Some(index) = self.last_included(&session.answers) {
                    session.current_step_index = index;
                }
            }
            SessionState::Submitted | SessionState::Abandoned => {}
        }
    }

    fn next_included(&self, answers: &Answers, after: usize) -> Option<usize> {
        self.first_included_from(answers, after + 1)
    }

    fn first_included_from(&self, answers: &Answers, from: usize) -> Option<usize> {
        self.definition
            .steps
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, step)| step.is_included(answers))
            .map(|(index, _)| index)
    }

    fn previous_included(&self, answers: &Answers, before: usize) -> Option<usize> {
        self.definition
            .steps
            .iter()
            .enumerate()
            .take(before)
            .rev()
            .find(|(_, step)| step.is_included(answers))
            .map(|(index, _)| index)
    }

    fn last_included(&self, answers: &Answers) -> Option<usize> {
        self.definition
            .steps
            .iter()
            .enumerate()
            .rev()
            .find(|(_, step)| step.is_included(answers))
            .map(|(index, _)| index)
    }
}

/// Frozen session plus the payload handed to the submission collaborator.
#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
    pub session: WorkflowSession,
    pub payload: SubmissionPayload,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use crate::domain::session::{DerivedValue, DocumentRef, SessionId};
    use crate::errors::{StateViolation, ValidationFailure};
    use crate::programs::ProgramCatalog;

    #[test]
    fn back_from_the_first_step_is_refused() {
        let catalog = ProgramCatalog::standard();
        let engine = catalog.engine_for("penalty_abatement").expect("program");
        let session = engine.start(SessionId("WS-back".to_string()));

        assert_eq!(engine.back(&session), Err(StateViolation::NoPreviousStep));
        assert_eq!(engine.progress(&session), (1, 7));
    }

    #[test]
    fn documents_are_counted_and_removed_by_name() {
        let catalog = ProgramCatalog::standard();
        let engine = catalog.engine_for("penalty_abatement").expect("program");
        let session = engine.start(SessionId("WS-docs".to_string()));

        let session =
            engine.attach_document(&session, DocumentRef::new("notice.pdf", 2_048)).expect("attach");
        let session =
            engine.attach_document(&session, DocumentRef::new("letter.pdf", 512)).expect("attach");
        assert_eq!(session.derived.get("document_count"), Some(&DerivedValue::Count(2)));

        let session = engine.remove_document(&session, "notice.pdf").expect("remove");
        assert_eq!(session.documents, vec![DocumentRef::new("letter.pdf", 512)]);
        assert_eq!(session.derived.get("document_count"), Some(&DerivedValue::Count(1)));
        assert_eq!(
            engine.remove_document(&session, "notice.pdf"),
            Err(StateViolation::UnknownDocument("notice.pdf".to_string()))
        );
    }

    #[test]
    fn clearing_an_answer_snaps_off_an_excluded_step() {
        let catalog = ProgramCatalog::standard();
        let engine = catalog.engine_for("penalty_abatement").expect("program");
        let session = engine.start(SessionId("WS-clear".to_string()));
        let steps = &engine.definition().steps;
        let cause_index =
            steps.iter().position(|step| step.id == "reasonable_cause").expect("cause step");
        let basis_index =
            steps.iter().position(|step| step.id == "abatement_basis").expect("basis step");

        let mut on_cause = engine
            .set_field(&session, "abatement_basis", json!("reasonable_cause"))
            .expect("basis");
        on_cause.current_step_index = cause_index;

        let cleared = engine.clear_field(&on_cause, "abatement_basis").expect("clear");
        assert!(cleared.answers.get("abatement_basis").is_none());
        assert_eq!(cleared.current_step_index, basis_index);
    }

    #[test]
    fn only_declared_answer_fields_can_be_set() {
        let catalog = ProgramCatalog::standard();
        let engine = catalog.engine_for("penalty_abatement").expect("program");
        let session = engine.start(SessionId("WS-fields".to_string()));

        assert_eq!(
            engine.set_field(&session, "favorite_color", json!("teal")),
            Err(StateViolation::UnknownField {
                program_id: "penalty_abatement".to_string(),
                key: "favorite_color".to_string(),
            })
        );
        assert!(matches!(
            engine.set_field(&session, "supporting_documents", json!(3)),
            Err(StateViolation::UnknownField { .. })
        ));
    }

    #[test]
    fn recorded_errors_render_inline_until_the_field_is_edited() {
        let catalog = ProgramCatalog::standard();
        let engine = catalog.engine_for("innocent_spouse").expect("program");
        let session = engine.start(SessionId("WS-errors".to_string()));
        let fields: BTreeMap<String, String> =
            [("full_name".to_string(), "This field is required".to_string())].into_iter().collect();
        let failure = ValidationFailure::new(Some("personal".to_string()), fields);

        let annotated = engine.with_errors(&session, &failure).expect("annotate");
        assert_eq!(annotated.validation_errors, failure.fields);
        let name = engine
            .visible_fields(&annotated)
            .into_iter()
            .find(|field| field.key == "full_name")
            .expect("name field visible");
        assert_eq!(name.error.as_deref(), Some("This field is required"));

        let fixed = engine.set_field(&annotated, "full_name", json!("Pat Doe")).expect("set");
        assert!(fixed.validation_errors.is_empty());
    }
}
