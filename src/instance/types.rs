//! Form instance state, history and configuration warnings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a form instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Draft,
    Submitted,
    InReview,
    Approved,
    Rejected,
    Completed,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    /// `rejected` and `completed` admit no further transitions.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }

    /// Whether an approver decision can be recorded in this status.
    pub fn awaits_decision(&self) -> bool {
        matches!(self, Self::Submitted | Self::InReview)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approver decision passed to `advance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

/// What a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryDecision {
    Submit,
    Approve,
    Reject,
    Complete,
}

impl From<Decision> for HistoryDecision {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => Self::Approve,
            Decision::Reject => Self::Reject,
        }
    }
}

impl fmt::Display for HistoryDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// One immutable entry of the workflow history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Workflow step the entry applies to; `None` for submit and complete
    pub step_name: Option<String>,
    pub actor_id: String,
    pub decision: HistoryDecision,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl HistoryEntry {
    pub fn new(
        step_name: Option<&str>,
        actor_id: impl Into<String>,
        decision: HistoryDecision,
        notes: Option<String>,
    ) -> Self {
        Self {
            step_name: step_name.map(str::to_string),
            actor_id: actor_id.into(),
            decision,
            timestamp: Utc::now(),
            notes,
        }
    }
}

/// Non-fatal workflow configuration problem attached to an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationWarning {
    pub step_name: String,
    pub message: String,
    pub detected_at: DateTime<Utc>,
}

impl ConfigurationWarning {
    pub fn new(step_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            message: message.into(),
            detected_at: Utc::now(),
        }
    }
}

/// One filled-out occurrence of a form template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormInstance {
    pub id: String,
    pub template_id: String,
    /// Template version the instance was created against
    pub template_version: u32,
    pub owner_user_id: String,
    pub tenant_id: String,
    /// JSON object keyed by field id
    pub form_data: Value,
    pub status: InstanceStatus,
    pub current_workflow_step: Option<String>,
    /// Append-only
    #[serde(default)]
    pub workflow_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub configuration_warnings: Vec<ConfigurationWarning>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub step_entered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub step_due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FormInstance {
    /// New draft with a generated id.
    pub fn new_draft(
        template_id: impl Into<String>,
        template_version: u32,
        owner_user_id: impl Into<String>,
        tenant_id: impl Into<String>,
        form_data: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            template_id: template_id.into(),
            template_version,
            owner_user_id: owner_user_id.into(),
            tenant_id: tenant_id.into(),
            form_data,
            status: InstanceStatus::Draft,
            current_workflow_step: None,
            workflow_history: Vec::new(),
            configuration_warnings: Vec::new(),
            created_at: now,
            updated_at: now,
            submitted_at: None,
            step_entered_at: None,
            step_due_at: None,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_user_id == user_id
    }

    /// Whether the current step's SLA elapsed before `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_deleted()
            && self.status.awaits_decision()
            && self.step_due_at.is_some_and(|due| due < now)
    }

    /// Whether a warning for `step_name` is already attached.
    pub fn has_warning_for(&self, step_name: &str) -> bool {
        self.configuration_warnings
            .iter()
            .any(|warning| warning.step_name == step_name)
    }

    pub fn last_history_entry(&self) -> Option<&HistoryEntry> {
        self.workflow_history.last()
    }
}
