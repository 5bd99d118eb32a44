//! Engine configuration.

use crate::error::{WorkflowError, WorkflowResult};
use crate::instance::InstanceStatus;
use crate::template::DEFAULT_MAX_NESTING_DEPTH;
use serde::{Deserialize, Serialize};

/// Where a template without workflow steps lands on submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyWorkflowOutcome {
    #[default]
    Completed,
    Approved,
}

impl EmptyWorkflowOutcome {
    pub fn status(&self) -> InstanceStatus {
        match self {
            Self::Completed => InstanceStatus::Completed,
            Self::Approved => InstanceStatus::Approved,
        }
    }
}

/// How notifiers are invoked after a transition commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationDispatch {
    /// One spawned tokio task per event; the caller does not wait
    #[default]
    Background,
    /// Awaited before the operation returns; failures are still swallowed
    Inline,
}

/// Workflow engine configuration.
///
/// Deserializable with every field optional:
///
/// ```rust
/// use tenant_workflow::workflow::{EngineConfig, EmptyWorkflowOutcome};
///
/// let config: EngineConfig =
///     serde_json::from_str(r#"{"empty_workflow_outcome": "approved"}"#).unwrap();
/// assert_eq!(config.empty_workflow_outcome, EmptyWorkflowOutcome::Approved);
/// assert_eq!(config.max_nesting_depth, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on nesting of structured field values
    pub max_nesting_depth: usize,
    pub empty_workflow_outcome: EmptyWorkflowOutcome,
    pub notification_dispatch: NotificationDispatch,
    /// Permission required to move `approved` to `completed`
    pub completion_permission: String,
    /// Permission allowing soft deletion in any state
    pub delete_permission: String,
    /// Cache role permission sets in the resolver
    pub role_cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            empty_workflow_outcome: EmptyWorkflowOutcome::default(),
            notification_dispatch: NotificationDispatch::default(),
            completion_permission: "forms.complete".to_string(),
            delete_permission: "forms.delete".to_string(),
            role_cache: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.max_nesting_depth == 0 {
            return Err(WorkflowError::invalid_request(
                "max_nesting_depth must be at least 1",
            ));
        }
        if self.completion_permission.trim().is_empty() {
            return Err(WorkflowError::invalid_request(
                "completion_permission cannot be empty",
            ));
        }
        if self.delete_permission.trim().is_empty() {
            return Err(WorkflowError::invalid_request(
                "delete_permission cannot be empty",
            ));
        }
        Ok(())
    }
}
