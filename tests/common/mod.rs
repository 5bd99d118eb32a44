//! Common test utilities for workflow and permission testing.
//!
//! The fixture world is two schools sharing global roles, plus one role that
//! only exists in school B:
//!
//! | user       | tenant   | role                 | notes                       |
//! |------------|----------|----------------------|-----------------------------|
//! | alice      | school-a | teacher              |                             |
//! | harriet    | school-a | head_of_department   |                             |
//! | paul       | school-a | principal            | `forms.*`                   |
//! | ivan       | school-a | teacher              | granted `it.approve`        |
//! | denise     | school-a | principal            | denied `forms.complete`     |
//! | carol      | school-a | teacher              | inactive                    |
//! | bob        | school-b | teacher              |                             |
//! | brenda     | school-b | head_of_department   |                             |


use async_trait::async_trait;
use std::sync::Arc;
use tenant_workflow::storage::InMemoryStorage;
use tenant_workflow::template::InMemoryTemplateStore;
use tenant_workflow::tenant::{InMemoryDirectory, Membership, MembershipStatus, RequestContext, Role};
use tenant_workflow::workflow::{
    NotificationDispatch, Notifier, NotifyError, TransitionEvent, TransitionEventType,
    WorkflowEngine,
};
use tokio::sync::Mutex;

pub const SCHOOL_A: &str = "school-a";
pub const SCHOOL_B: &str = "school-b";

pub const TEACHER_A: &str = "alice";
pub const HOD_A: &str = "harriet";
pub const PRINCIPAL_A: &str = "paul";
pub const IT_TECH_A: &str = "ivan";
pub const DENIED_PRINCIPAL_A: &str = "denise";
pub const INACTIVE_A: &str = "carol";
pub const TEACHER_B: &str = "bob";
pub const HOD_B: &str = "brenda";

pub type TestEngine = WorkflowEngine<InMemoryDirectory, InMemoryTemplateStore, InMemoryStorage>;

/// Route library logs to the test output once per process
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Populate the directory described in the module docs
pub async fn school_directory() -> Arc<InMemoryDirectory> {
    let directory = Arc::new(InMemoryDirectory::new());

    directory
        .add_role(Role::global("teacher", "teacher").with_permissions([
            "forms.create",
            "forms.read",
            "students.read",
        ]))
        .await;
    directory
        .add_role(Role::global("hod", "head_of_department").with_permissions([
            "forms.read",
            "forms.approve.department",
            "students.*",
        ]))
        .await;
    directory
        .add_role(
            Role::global("principal", "principal").with_permissions(["forms.*", "reports.*"]),
        )
        .await;
    directory
        .add_role(Role::for_tenant("bursar-b", "bursar", SCHOOL_B).with_permission("fees.*"))
        .await;

    let memberships = [
        Membership::new(TEACHER_A, SCHOOL_A, "teacher").as_current(),
        Membership::new(HOD_A, SCHOOL_A, "hod"),
        Membership::new(PRINCIPAL_A, SCHOOL_A, "principal"),
        Membership::new(IT_TECH_A, SCHOOL_A, "teacher").with_granted("it.approve"),
        Membership::new(DENIED_PRINCIPAL_A, SCHOOL_A, "principal").with_denied("forms.complete"),
        Membership::new(INACTIVE_A, SCHOOL_A, "teacher").with_status(MembershipStatus::Inactive),
        Membership::new(TEACHER_B, SCHOOL_B, "teacher"),
        Membership::new(HOD_B, SCHOOL_B, "hod"),
    ];
    for membership in memberships {
        directory.upsert_membership(membership).await;
    }

    directory
}

pub fn ctx_a(actor_id: &str) -> RequestContext {
    RequestContext::new(SCHOOL_A, actor_id)
}

pub fn ctx_b(actor_id: &str) -> RequestContext {
    RequestContext::new(SCHOOL_B, actor_id)
}

/// Notifier that keeps every event it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<TransitionEvent>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().await.clone()
    }

    pub async fn event_types(&self) -> Vec<TransitionEventType> {
        self.events
            .lock()
            .await
            .iter()
            .map(|event| event.event_type)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, event: &TransitionEvent) -> Result<(), NotifyError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// Notifier whose deliveries always fail
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn notify(&self, _event: &TransitionEvent) -> Result<(), NotifyError> {
        Err(NotifyError::delivery("failing", "mail relay refused connection"))
    }
}

/// Engine over the school directory with every fixture template registered
pub struct TestHarness {
    pub engine: TestEngine,
    pub directory: Arc<InMemoryDirectory>,
    pub templates: Arc<InMemoryTemplateStore>,
    pub storage: Arc<InMemoryStorage>,
    pub notifier: RecordingNotifier,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_builder(|builder| builder).await
    }

    /// Harness whose engine builder is adjusted by `configure` before build
    pub async fn with_builder<F>(configure: F) -> Self
    where
        F: FnOnce(
            tenant_workflow::workflow::WorkflowEngineBuilder<
                InMemoryDirectory,
                InMemoryTemplateStore,
                InMemoryStorage,
            >,
        ) -> tenant_workflow::workflow::WorkflowEngineBuilder<
            InMemoryDirectory,
            InMemoryTemplateStore,
            InMemoryStorage,
        >,
    {
        init_logging();

        let directory = school_directory().await;
        let templates = Arc::new(InMemoryTemplateStore::new());
        for template in fixtures::all_templates() {
            templates
                .register(template)
                .await
                .expect("fixture templates are valid");
        }
        let storage = Arc::new(InMemoryStorage::new());
        let notifier = RecordingNotifier::new();

        let builder = WorkflowEngine::builder(directory.clone(), templates.clone(), storage.clone())
            .with_notification_dispatch(NotificationDispatch::Inline)
            .with_notifier(Arc::new(notifier.clone()));
        let engine = configure(builder).build().expect("valid engine config");

        Self {
            engine,
            directory,
            templates,
            storage,
            notifier,
        }
    }
}
