//! End-to-end form workflows through the engine's public operations.

use crate::common::fixtures::{
    B_ONLY, FEEDBACK, FEES_WAIVER, HOD_REVIEW, IT_REQUEST, LEAVE, PRINCIPAL_REVIEW, valid_leave,
};
use crate::common::{
    DENIED_PRINCIPAL_A, FailingNotifier, HOD_A, HOD_B, INACTIVE_A, IT_TECH_A, PRINCIPAL_A,
    SCHOOL_A, TEACHER_A, TEACHER_B, TestHarness, ctx_a, ctx_b, school_directory,
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use tenant_workflow::error::{ValidationError, WorkflowError, WorkflowResult};
use tenant_workflow::instance::{HistoryDecision, InstanceStatus, VersionedInstance};
use tenant_workflow::storage::InMemoryStorage;
use tenant_workflow::template::{FormTemplate, TemplateStore, WorkflowStepConfig};
use tenant_workflow::tenant::RequestContext;
use tenant_workflow::workflow::{
    AdvanceRequest, ChannelNotifier, EmptyWorkflowOutcome, NotificationDispatch,
    TransitionEventType, WorkflowEngine,
};

/// Draft, fill and submit a leave request as alice
async fn submitted_leave(harness: &TestHarness) -> VersionedInstance {
    let alice = ctx_a(TEACHER_A);
    let draft = harness
        .engine
        .create_draft(&alice, LEAVE, valid_leave())
        .await
        .unwrap();
    harness
        .engine
        .submit(&alice, &draft.instance.id, None)
        .await
        .unwrap()
}

fn history_decisions(versioned: &VersionedInstance) -> Vec<HistoryDecision> {
    versioned
        .instance
        .workflow_history
        .iter()
        .map(|entry| entry.decision)
        .collect()
}

#[tokio::test]
async fn test_leave_request_two_step_approval() {
    let harness = TestHarness::new().await;
    let engine = &harness.engine;
    let alice = ctx_a(TEACHER_A);

    let draft = engine.create_draft(&alice, LEAVE, json!({})).await.unwrap();
    assert_eq!(draft.instance.status, InstanceStatus::Draft);
    assert_eq!(draft.instance.owner_user_id, TEACHER_A);
    assert_eq!(draft.instance.template_version, 1);

    let filled = engine
        .update_draft(&alice, &draft.instance.id, valid_leave(), Some(&draft.version))
        .await
        .unwrap();
    assert_ne!(filled.version, draft.version);

    let submitted = engine.submit(&alice, &draft.instance.id, None).await.unwrap();
    assert_eq!(submitted.instance.status, InstanceStatus::Submitted);
    assert_eq!(submitted.instance.current_workflow_step.as_deref(), Some(HOD_REVIEW));
    assert!(submitted.instance.submitted_at.is_some());
    let entered = submitted.instance.step_entered_at.unwrap();
    assert_eq!(submitted.instance.step_due_at, Some(entered + Duration::hours(48)));
    assert!(submitted.instance.configuration_warnings.is_empty());

    let hod_approved = engine
        .advance(
            &ctx_a(HOD_A),
            &draft.instance.id,
            AdvanceRequest::approve().with_notes("Cover arranged"),
        )
        .await
        .unwrap();
    assert_eq!(hod_approved.instance.status, InstanceStatus::InReview);
    assert_eq!(
        hod_approved.instance.current_workflow_step.as_deref(),
        Some(PRINCIPAL_REVIEW)
    );
    assert_eq!(hod_approved.instance.step_due_at, None);

    let approved = engine
        .advance(&ctx_a(PRINCIPAL_A), &draft.instance.id, AdvanceRequest::approve())
        .await
        .unwrap();
    assert_eq!(approved.instance.status, InstanceStatus::Approved);
    assert_eq!(approved.instance.current_workflow_step, None);

    let completed = engine
        .complete(&ctx_a(PRINCIPAL_A), &draft.instance.id, Some("Filed".into()), None)
        .await
        .unwrap();
    assert_eq!(completed.instance.status, InstanceStatus::Completed);

    assert_eq!(
        history_decisions(&completed),
        vec![
            HistoryDecision::Submit,
            HistoryDecision::Approve,
            HistoryDecision::Approve,
            HistoryDecision::Complete,
        ]
    );
    let history = &completed.instance.workflow_history;
    assert_eq!(history[0].step_name, None);
    assert_eq!(history[1].step_name.as_deref(), Some(HOD_REVIEW));
    assert_eq!(history[1].actor_id, HOD_A);
    assert_eq!(history[1].notes.as_deref(), Some("Cover arranged"));
    assert_eq!(history[2].step_name.as_deref(), Some(PRINCIPAL_REVIEW));
    assert_eq!(history[3].notes.as_deref(), Some("Filed"));

    assert_eq!(
        harness.notifier.event_types().await,
        vec![
            TransitionEventType::Submitted,
            TransitionEventType::StepAdvanced,
            TransitionEventType::Approved,
            TransitionEventType::Completed,
        ]
    );
}

#[tokio::test]
async fn test_step_gate_requires_matching_role() {
    let harness = TestHarness::new().await;
    let submitted = submitted_leave(&harness).await;
    let id = &submitted.instance.id;

    for actor in [TEACHER_A, PRINCIPAL_A] {
        let err = harness
            .engine
            .advance(&ctx_a(actor), id, AdvanceRequest::approve())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::PermissionDenied { .. }), "{actor}: {err}");
    }

    let unchanged = harness.engine.get(&ctx_a(TEACHER_A), id).await.unwrap();
    assert_eq!(unchanged.version, submitted.version);
    assert_eq!(unchanged.instance.workflow_history.len(), 1);
}

#[tokio::test]
async fn test_permission_gated_step() {
    let harness = TestHarness::new().await;
    let alice = ctx_a(TEACHER_A);
    let draft = harness.engine.create_draft(&alice, IT_REQUEST, json!({})).await.unwrap();
    let submitted = harness.engine.submit(&alice, &draft.instance.id, None).await.unwrap();

    assert!(!harness.engine.can_approve(&alice, &submitted.instance).await);
    assert!(harness.engine.can_approve(&ctx_a(IT_TECH_A), &submitted.instance).await);

    let approved = harness
        .engine
        .advance(&ctx_a(IT_TECH_A), &draft.instance.id, AdvanceRequest::approve())
        .await
        .unwrap();
    assert_eq!(approved.instance.status, InstanceStatus::Approved);
}

#[tokio::test]
async fn test_rejection_ends_workflow() {
    let harness = TestHarness::new().await;
    let submitted = submitted_leave(&harness).await;
    let id = &submitted.instance.id;
    let harriet = ctx_a(HOD_A);

    let rejected = harness
        .engine
        .advance(&harriet, id, AdvanceRequest::reject().with_notes("Exam week"))
        .await
        .unwrap();
    assert_eq!(rejected.instance.status, InstanceStatus::Rejected);
    assert_eq!(rejected.instance.current_workflow_step, None);
    let last = rejected.instance.last_history_entry().unwrap();
    assert_eq!(last.decision, HistoryDecision::Reject);
    assert_eq!(last.step_name.as_deref(), Some(HOD_REVIEW));

    let err = harness
        .engine
        .advance(&harriet, id, AdvanceRequest::approve())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::InvalidTransition { status: InstanceStatus::Rejected, .. }
    ));
    let err = harness
        .engine
        .complete(&ctx_a(PRINCIPAL_A), id, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));

    assert_eq!(
        harness.notifier.event_types().await,
        vec![TransitionEventType::Submitted, TransitionEventType::Rejected]
    );
}

#[tokio::test]
async fn test_template_without_steps_completes_on_submit() {
    let harness = TestHarness::new().await;
    let alice = ctx_a(TEACHER_A);
    let draft = harness
        .engine
        .create_draft(&alice, FEEDBACK, json!({"comments": "More library hours"}))
        .await
        .unwrap();

    let done = harness.engine.submit(&alice, &draft.instance.id, None).await.unwrap();
    assert_eq!(done.instance.status, InstanceStatus::Completed);
    assert_eq!(done.instance.current_workflow_step, None);
    assert_eq!(done.instance.workflow_history.len(), 1);
    assert_eq!(done.instance.workflow_history[0].decision, HistoryDecision::Submit);
    assert_eq!(
        harness.notifier.event_types().await,
        vec![TransitionEventType::Submitted, TransitionEventType::Completed]
    );
}

#[tokio::test]
async fn test_template_without_steps_can_land_on_approved() {
    let harness = TestHarness::with_builder(|builder| {
        builder.with_empty_workflow_outcome(EmptyWorkflowOutcome::Approved)
    })
    .await;
    let alice = ctx_a(TEACHER_A);
    let draft = harness.engine.create_draft(&alice, FEEDBACK, json!({})).await.unwrap();

    let approved = harness.engine.submit(&alice, &draft.instance.id, None).await.unwrap();
    assert_eq!(approved.instance.status, InstanceStatus::Approved);
    assert_eq!(approved.instance.workflow_history.len(), 1);

    let completed = harness
        .engine
        .complete(&ctx_a(PRINCIPAL_A), &draft.instance.id, None, None)
        .await
        .unwrap();
    assert_eq!(completed.instance.status, InstanceStatus::Completed);
}

#[tokio::test]
async fn test_completion_requires_permission() {
    let harness = TestHarness::with_builder(|builder| {
        builder.with_empty_workflow_outcome(EmptyWorkflowOutcome::Approved)
    })
    .await;
    let alice = ctx_a(TEACHER_A);
    let draft = harness.engine.create_draft(&alice, FEEDBACK, json!({})).await.unwrap();
    harness.engine.submit(&alice, &draft.instance.id, None).await.unwrap();

    for actor in [TEACHER_A, HOD_A, DENIED_PRINCIPAL_A] {
        let err = harness
            .engine
            .complete(&ctx_a(actor), &draft.instance.id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::PermissionDenied { .. }), "{actor}");
    }
}

#[tokio::test]
async fn test_unreachable_step_holds_instance_with_warning() {
    let harness = TestHarness::new().await;
    let alice = ctx_a(TEACHER_A);
    let draft = harness.engine.create_draft(&alice, FEES_WAIVER, json!({})).await.unwrap();

    let held = harness.engine.submit(&alice, &draft.instance.id, None).await.unwrap();
    assert_eq!(held.instance.status, InstanceStatus::Submitted);
    assert_eq!(held.instance.current_workflow_step.as_deref(), Some("bursar_review"));
    assert_eq!(held.instance.configuration_warnings.len(), 1);
    assert!(held.instance.has_warning_for("bursar_review"));
    assert!(held.instance.configuration_warnings[0].message.contains("bursar"));

    // not even a principal can pass a gate naming a role the school lacks
    let paul = ctx_a(PRINCIPAL_A);
    assert!(!harness.engine.can_approve(&paul, &held.instance).await);
    let err = harness
        .engine
        .advance(&paul, &draft.instance.id, AdvanceRequest::approve())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied { .. }));

    let still_held = harness.engine.get(&alice, &draft.instance.id).await.unwrap();
    assert_eq!(still_held.version, held.version);
    assert_eq!(still_held.instance.status, InstanceStatus::Submitted);
}

#[tokio::test]
async fn test_same_template_is_reachable_where_role_exists() {
    let harness = TestHarness::new().await;
    let bob = ctx_b(TEACHER_B);
    let draft = harness.engine.create_draft(&bob, FEES_WAIVER, json!({})).await.unwrap();

    let submitted = harness.engine.submit(&bob, &draft.instance.id, None).await.unwrap();
    assert!(submitted.instance.configuration_warnings.is_empty());
}

#[tokio::test]
async fn test_can_approve_matches_advance() {
    let harness = TestHarness::new().await;

    let contexts = [
        ctx_a(TEACHER_A),
        ctx_a(HOD_A),
        ctx_a(PRINCIPAL_A),
        ctx_a(IT_TECH_A),
        ctx_a(INACTIVE_A),
        ctx_a(HOD_B),
        ctx_a("stranger"),
    ];
    for ctx in contexts {
        let submitted = submitted_leave(&harness).await;
        let predicted = harness.engine.can_approve(&ctx, &submitted.instance).await;
        let outcome = harness
            .engine
            .advance(&ctx, &submitted.instance.id, AdvanceRequest::approve())
            .await;
        assert_eq!(predicted, outcome.is_ok(), "{ctx}: {outcome:?}");
    }
}

#[tokio::test]
async fn test_can_approve_is_false_outside_review() {
    let harness = TestHarness::new().await;
    let alice = ctx_a(TEACHER_A);
    let draft = harness.engine.create_draft(&alice, LEAVE, valid_leave()).await.unwrap();

    assert!(!harness.engine.can_approve(&ctx_a(HOD_A), &draft.instance).await);
    // an instance from another tenant is never approvable
    let submitted = submitted_leave(&harness).await;
    assert!(!harness.engine.can_approve(&ctx_b(HOD_B), &submitted.instance).await);
}

#[tokio::test]
async fn test_tenant_isolation() {
    let harness = TestHarness::new().await;
    let submitted = submitted_leave(&harness).await;
    let id = &submitted.instance.id;

    let err = harness.engine.get(&ctx_b(TEACHER_B), id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InstanceNotFound { .. }));

    let err = harness
        .engine
        .advance(&ctx_b(HOD_B), id, AdvanceRequest::approve())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InstanceNotFound { .. }));

    // a school B user naming school A is not a member there
    let err = harness.engine.get(&ctx_a(TEACHER_B), id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied { .. }));

    let err = harness
        .engine
        .create_draft(&ctx_a(TEACHER_A), B_ONLY, json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::TemplateNotFound { .. }));
    assert!(
        harness
            .engine
            .create_draft(&ctx_b(TEACHER_B), B_ONLY, json!({}))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_inactive_member_cannot_draft() {
    let harness = TestHarness::new().await;
    let err = harness
        .engine
        .create_draft(&ctx_a(INACTIVE_A), LEAVE, json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied { .. }));
}

#[tokio::test]
async fn test_submit_reports_every_field_error() {
    let harness = TestHarness::new().await;
    let alice = ctx_a(TEACHER_A);
    let draft = harness
        .engine
        .create_draft(
            &alice,
            LEAVE,
            json!({"days": 45, "start_date": "12/05/2025", "approved_by": "me"}),
        )
        .await
        .unwrap();

    let err = harness.engine.submit(&alice, &draft.instance.id, None).await.unwrap_err();
    let errors = err.field_errors();
    let error_for = |field: &str| {
        errors
            .iter()
            .find(|e| e.field_id == field)
            .map(|e| e.error.clone())
    };
    assert_eq!(errors.len(), 4, "{errors:?}");
    assert_eq!(error_for("reason"), Some(ValidationError::MissingRequired));
    assert!(matches!(error_for("start_date"), Some(ValidationError::InvalidDate { .. })));
    assert!(matches!(error_for("days"), Some(ValidationError::OutOfRange { .. })));
    assert!(matches!(error_for("approved_by"), Some(ValidationError::UnknownField { .. })));

    let unchanged = harness.engine.get(&alice, &draft.instance.id).await.unwrap();
    assert_eq!(unchanged.instance.status, InstanceStatus::Draft);
    assert!(unchanged.instance.workflow_history.is_empty());
    assert!(harness.notifier.events().await.is_empty());
}

#[tokio::test]
async fn test_drafts_reject_excessive_nesting() {
    let harness = TestHarness::new().await;
    let deep = (0..12).fold(json!(1), |inner, _| json!([inner]));

    let err = harness
        .engine
        .create_draft(&ctx_a(TEACHER_A), LEAVE, json!({ "cover_notes": deep }))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::ValidationFailed { .. }));

    let err = harness
        .engine
        .create_draft(&ctx_a(TEACHER_A), LEAVE, json!(["not", "an", "object"]))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::ValidationFailed { .. }));
}

#[tokio::test]
async fn test_only_owner_edits_and_submits_draft() {
    let harness = TestHarness::new().await;
    let alice = ctx_a(TEACHER_A);
    let draft = harness.engine.create_draft(&alice, LEAVE, json!({})).await.unwrap();
    let harriet = ctx_a(HOD_A);

    let err = harness
        .engine
        .update_draft(&harriet, &draft.instance.id, valid_leave(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied { .. }));
    let err = harness
        .engine
        .submit(&harriet, &draft.instance.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied { .. }));
}

#[tokio::test]
async fn test_submitted_form_is_no_longer_editable() {
    let harness = TestHarness::new().await;
    let alice = ctx_a(TEACHER_A);
    let submitted = submitted_leave(&harness).await;
    let id = &submitted.instance.id;

    let err = harness.engine.submit(&alice, id, None).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::InvalidTransition { status: InstanceStatus::Submitted, .. }
    ));
    let err = harness
        .engine
        .update_draft(&alice, id, json!({}), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_soft_delete_rules() {
    let harness = TestHarness::new().await;
    let alice = ctx_a(TEACHER_A);

    // owner may delete their own draft
    let draft = harness.engine.create_draft(&alice, LEAVE, json!({})).await.unwrap();
    let deleted = harness
        .engine
        .soft_delete(&alice, &draft.instance.id, None)
        .await
        .unwrap();
    assert!(deleted.instance.is_deleted());
    let err = harness.engine.get(&alice, &draft.instance.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InstanceNotFound { .. }));

    // but not once it is submitted
    let submitted = submitted_leave(&harness).await;
    let id = &submitted.instance.id;
    let err = harness.engine.soft_delete(&alice, id, None).await.unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied { .. }));

    // forms.delete (via forms.*) may delete in any state, history intact
    let removed = harness
        .engine
        .soft_delete(&ctx_a(PRINCIPAL_A), id, None)
        .await
        .unwrap();
    assert_eq!(removed.instance.status, InstanceStatus::Submitted);
    assert_eq!(removed.instance.workflow_history, submitted.instance.workflow_history);

    let err = harness
        .engine
        .advance(&ctx_a(HOD_A), id, AdvanceRequest::approve())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InstanceNotFound { .. }));
    assert!(harness.engine.pending_approvals(&ctx_a(HOD_A)).await.unwrap().is_empty());

    // the record itself is retained
    let stored = harness
        .engine
        .instance_store()
        .load(SCHOOL_A, id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.instance.deleted_at.is_some());
}

#[tokio::test]
async fn test_pending_approvals_follow_current_step() {
    let harness = TestHarness::new().await;
    let submitted = submitted_leave(&harness).await;
    let id = submitted.instance.id.clone();
    let harriet = ctx_a(HOD_A);
    let paul = ctx_a(PRINCIPAL_A);

    let ids = |pending: Vec<VersionedInstance>| -> Vec<String> {
        pending.into_iter().map(|v| v.instance.id).collect()
    };

    assert_eq!(ids(harness.engine.pending_approvals(&harriet).await.unwrap()), vec![id.clone()]);
    assert!(harness.engine.pending_approvals(&paul).await.unwrap().is_empty());

    harness
        .engine
        .advance(&harriet, &id, AdvanceRequest::approve())
        .await
        .unwrap();
    assert!(harness.engine.pending_approvals(&harriet).await.unwrap().is_empty());
    assert_eq!(ids(harness.engine.pending_approvals(&paul).await.unwrap()), vec![id.clone()]);

    assert!(harness.engine.pending_approvals(&ctx_b(HOD_B)).await.unwrap().is_empty());
    let err = harness.engine.pending_approvals(&ctx_a("stranger")).await.unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied { .. }));
}

#[tokio::test]
async fn test_overdue_instances_use_step_sla() {
    let harness = TestHarness::new().await;
    let alice = ctx_a(TEACHER_A);
    let draft = harness.engine.create_draft(&alice, IT_REQUEST, json!({})).await.unwrap();
    let submitted = harness.engine.submit(&alice, &draft.instance.id, None).await.unwrap();
    // the leave request's first step has a 48 hour SLA
    submitted_leave(&harness).await;

    let now = Utc::now();
    assert!(harness.engine.overdue_instances(&alice, now).await.unwrap().is_empty());

    let later = now + Duration::hours(5);
    let overdue = harness.engine.overdue_instances(&alice, later).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].instance.id, submitted.instance.id);

    assert_eq!(
        harness
            .engine
            .overdue_instances(&alice, now + Duration::hours(49))
            .await
            .unwrap()
            .len(),
        2
    );

    harness
        .engine
        .advance(&ctx_a(IT_TECH_A), &draft.instance.id, AdvanceRequest::approve())
        .await
        .unwrap();
    assert!(harness.engine.overdue_instances(&alice, later).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_notifier_does_not_affect_transition() {
    let harness = TestHarness::with_builder(|builder| {
        builder.with_notifier(Arc::new(FailingNotifier))
    })
    .await;

    let submitted = submitted_leave(&harness).await;
    assert_eq!(submitted.instance.status, InstanceStatus::Submitted);
    // the recording notifier is unaffected by its failing neighbour
    assert_eq!(
        harness.notifier.event_types().await,
        vec![TransitionEventType::Submitted]
    );
}

#[tokio::test]
async fn test_background_dispatch_delivers_committed_state() {
    let (channel, mut events) = ChannelNotifier::new();
    let harness = TestHarness::with_builder(|builder| {
        builder
            .with_notification_dispatch(NotificationDispatch::Background)
            .with_notifier(Arc::new(channel))
    })
    .await;

    let submitted = submitted_leave(&harness).await;
    let event = tokio::time::timeout(std::time::Duration::from_secs(5), events.recv())
        .await
        .expect("event delivered")
        .expect("channel open");

    assert_eq!(event.event_type, TransitionEventType::Submitted);
    assert_eq!(event.actor_id, TEACHER_A);
    assert_eq!(event.instance, submitted.instance);
}

#[tokio::test]
async fn test_request_id_reaches_notifiers() {
    let harness = TestHarness::new().await;
    let alice = RequestContext::with_request_id("req-42", SCHOOL_A, TEACHER_A);
    let draft = harness.engine.create_draft(&alice, FEEDBACK, json!({})).await.unwrap();
    harness.engine.submit(&alice, &draft.instance.id, None).await.unwrap();

    let events = harness.notifier.events().await;
    assert!(!events.is_empty());
    assert!(events.iter().all(|event| event.request_id == "req-42"));
    assert!(events.iter().all(|event| event.tenant_id == SCHOOL_A));
}

#[tokio::test]
async fn test_unknown_template_and_instance() {
    let harness = TestHarness::new().await;
    let alice = ctx_a(TEACHER_A);

    let err = harness
        .engine
        .create_draft(&alice, "no-such-form", Value::Object(Default::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::TemplateNotFound { .. }));

    let err = harness.engine.get(&alice, "missing").await.unwrap_err();
    assert!(matches!(err, WorkflowError::InstanceNotFound { .. }));
}

/// Serves one template as-is, without the registry's structural check
struct UncheckedTemplates(Arc<FormTemplate>);

impl TemplateStore for UncheckedTemplates {
    async fn get_template(
        &self,
        template_id: &str,
        _version: Option<u32>,
    ) -> WorkflowResult<Option<Arc<FormTemplate>>> {
        Ok((template_id == self.0.id).then(|| Arc::clone(&self.0)))
    }
}

#[tokio::test]
async fn test_unschedulable_sla_holds_step_without_deadline() {
    let template = FormTemplate::new("long-haul", 1, "Long haul").with_workflow_step(
        WorkflowStepConfig::for_role(HOD_REVIEW, "head_of_department").with_sla_hours(u32::MAX),
    );
    let engine = WorkflowEngine::new(
        school_directory().await,
        Arc::new(UncheckedTemplates(Arc::new(template))),
        Arc::new(InMemoryStorage::new()),
    );
    let alice = ctx_a(TEACHER_A);

    let draft = engine.create_draft(&alice, "long-haul", json!({})).await.unwrap();
    let submitted = engine.submit(&alice, &draft.instance.id, None).await.unwrap();

    assert_eq!(submitted.instance.current_workflow_step.as_deref(), Some(HOD_REVIEW));
    assert_eq!(submitted.instance.step_due_at, None);
    let warnings = &submitted.instance.configuration_warnings;
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].step_name, HOD_REVIEW);
    assert!(warnings[0].message.contains("cannot be scheduled"));

    // the step itself is still reachable
    let approved = engine
        .advance(&ctx_a(HOD_A), &draft.instance.id, AdvanceRequest::approve())
        .await
        .unwrap();
    assert_eq!(approved.instance.status, InstanceStatus::Approved);
    assert!(
        engine
            .overdue_instances(&alice, Utc::now() + Duration::days(365))
            .await
            .unwrap()
            .is_empty()
    );
}
