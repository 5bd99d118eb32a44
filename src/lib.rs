//! Tenant-scoped permission resolution and form approval workflows.
//!
//! Provides the permission and workflow core of a multi-tenant school
//! management backend, invoked in-process by the surrounding CRUD layer.
//!
//! # Core Components
//!
//! - [`PermissionResolver`] - effective permissions of a user within a tenant
//! - [`WorkflowEngine`] - template-driven form workflow state machine
//! - [`FormTemplate`] - declarative form schema with approval steps
//! - [`StorageProvider`] - tenant-keyed storage seam for form instances
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use tenant_workflow::{
//!     AdvanceRequest, FormTemplate, InMemoryDirectory, InMemoryStorage, InMemoryTemplateStore,
//!     Membership, RequestContext, Role, WorkflowEngine, WorkflowStepConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = Arc::new(InMemoryDirectory::new());
//! directory.add_role(Role::global("teacher", "teacher")).await;
//! directory.add_role(Role::global("hod", "head_of_department")).await;
//! directory.upsert_membership(Membership::new("alice", "school-a", "teacher")).await;
//! directory.upsert_membership(Membership::new("harriet", "school-a", "hod")).await;
//!
//! let templates = Arc::new(InMemoryTemplateStore::new());
//! templates
//!     .register(
//!         FormTemplate::new("leave", 1, "Leave request")
//!             .with_workflow_step(WorkflowStepConfig::for_role("hod_review", "head_of_department")),
//!     )
//!     .await?;
//!
//! let engine = WorkflowEngine::new(directory, templates, Arc::new(InMemoryStorage::new()));
//! let alice = RequestContext::new("school-a", "alice");
//! let draft = engine.create_draft(&alice, "leave", json!({})).await?;
//! engine.submit(&alice, &draft.instance.id, None).await?;
//!
//! let harriet = alice.as_actor("harriet");
//! engine
//!     .advance(&harriet, &draft.instance.id, AdvanceRequest::approve())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod instance;
pub mod permissions;
pub mod storage;
pub mod template;
pub mod tenant;
pub mod workflow;

// Re-export commonly used types for convenience
pub use error::{FieldError, ValidationError, WorkflowError, WorkflowResult};
pub use instance::{
    ConfigurationWarning, Decision, FormInstance, HistoryDecision, HistoryEntry, InstanceStatus,
    InstanceVersion, VersionedInstance,
};
pub use permissions::{EffectivePermissions, PermissionQuery, PermissionResolver};
pub use storage::{InMemoryStorage, StorageError, StorageKey, StorageProvider};
pub use template::{
    FieldDefinition, FieldType, FormSection, FormStep, FormTemplate, InMemoryTemplateStore,
    TemplateStore, WorkflowStepConfig,
};
pub use tenant::{
    DirectoryStore, InMemoryDirectory, Membership, MembershipStatus, RequestContext, Role,
    RoleScope,
};
pub use workflow::{
    ActivityLogNotifier, AdvanceRequest, EmptyWorkflowOutcome, EngineConfig,
    NotificationDispatch, Notifier, TransitionEvent, TransitionEventType, WorkflowEngine,
    WorkflowEngineBuilder,
};
