//! Form template type definitions.
//!
//! A template is a versioned declarative schema: ordered pages ([`FormStep`])
//! of ordered [`FormSection`]s of [`FieldDefinition`]s, plus an optional
//! approval [`WorkflowConfig`].

use serde::{Deserialize, Serialize};

/// A versioned form template.
///
/// Templates are immutable once registered; a change means a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormTemplate {
    /// Template identifier, shared by all versions
    pub id: String,
    pub version: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owning tenant; `None` means shared by every tenant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Ordered pages of the form
    #[serde(default)]
    pub steps: Vec<FormStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowConfig>,
}

impl FormTemplate {
    pub fn new(id: impl Into<String>, version: u32, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version,
            name: name.into(),
            description: None,
            tenant_id: None,
            steps: Vec::new(),
            workflow: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn for_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_step(mut self, step: FormStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Append a workflow step, creating the workflow if needed.
    pub fn with_workflow_step(mut self, step: WorkflowStepConfig) -> Self {
        self.workflow
            .get_or_insert_with(WorkflowConfig::default)
            .steps
            .push(step);
        self
    }

    /// Whether instances of this template may be created in `tenant_id`.
    pub fn is_visible_to(&self, tenant_id: &str) -> bool {
        self.tenant_id.as_deref().is_none_or(|owner| owner == tenant_id)
    }

    /// All fields across pages and sections, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.steps
            .iter()
            .flat_map(|step| step.sections.iter())
            .flat_map(|section| section.fields.iter())
    }

    pub fn field(&self, field_id: &str) -> Option<&FieldDefinition> {
        self.fields().find(|field| field.field_id == field_id)
    }

    /// Workflow steps in order; empty when the template has no workflow.
    pub fn workflow_steps(&self) -> &[WorkflowStepConfig] {
        self.workflow
            .as_ref()
            .map(|workflow| workflow.steps.as_slice())
            .unwrap_or(&[])
    }

    pub fn first_step(&self) -> Option<&WorkflowStepConfig> {
        self.workflow_steps().first()
    }

    pub fn workflow_step(&self, step_name: &str) -> Option<&WorkflowStepConfig> {
        self.workflow_steps()
            .iter()
            .find(|step| step.step_name == step_name)
    }

    pub fn step_index(&self, step_name: &str) -> Option<usize> {
        self.workflow_steps()
            .iter()
            .position(|step| step.step_name == step_name)
    }

    /// The step following `step_name`; `None` on the last step or an unknown name.
    pub fn next_step_after(&self, step_name: &str) -> Option<&WorkflowStepConfig> {
        let index = self.step_index(step_name)?;
        self.workflow_steps().get(index + 1)
    }
}

/// One page of a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormStep {
    pub title: String,
    #[serde(default)]
    pub sections: Vec<FormSection>,
}

impl FormStep {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sections: Vec::new(),
        }
    }

    pub fn with_section(mut self, section: FormSection) -> Self {
        self.sections.push(section);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSection {
    pub title: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl FormSection {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }
}

/// Definition of a single form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub field_id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub constraints: FieldConstraints,
}

impl FieldDefinition {
    pub fn new(field_id: impl Into<String>, field_type: FieldType, label: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            field_type,
            label: label.into(),
            required: false,
            constraints: FieldConstraints::default(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.constraints.min = min;
        self.constraints.max = max;
        self
    }

    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.constraints.min_length = min;
        self.constraints.max_length = max;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.constraints.pattern = Some(pattern.into());
        self
    }

    /// Date window as `YYYY-MM-DD` strings.
    pub fn with_date_range(mut self, min: Option<&str>, max: Option<&str>) -> Self {
        self.constraints.min_date = min.map(str::to_string);
        self.constraints.max_date = max.map(str::to_string);
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.constraints.max_depth = Some(max_depth);
        self
    }
}

/// Form field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Textarea,
    /// Any JSON number
    Number,
    /// Whole JSON number
    Integer,
    /// `YYYY-MM-DD` string
    Date,
    Email,
    Phone,
    /// One of `options`
    Select,
    /// Array of distinct values from `options`
    MultiSelect,
    Checkbox,
    /// Nested JSON object or array, bounded in depth
    Structured,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Date => "date",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Select => "select",
            Self::MultiSelect => "multi_select",
            Self::Checkbox => "checkbox",
            Self::Structured => "structured",
        }
    }

    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::Text | Self::Textarea | Self::Email | Self::Phone
        )
    }

    pub fn has_options(&self) -> bool {
        matches!(self, Self::Select | Self::MultiSelect)
    }
}

/// Validation constraints; which ones apply depends on the field type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Per-field nesting bound; capped by the engine-wide maximum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

/// Approval workflow attached to a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub steps: Vec<WorkflowStepConfig>,
}

/// A named approval gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStepConfig {
    pub step_name: String,
    /// Role name (resolved within the instance's tenant)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_role: Option<String>,
    /// Alternative gate: the actor must hold all of these
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_hours: Option<u32>,
}

impl WorkflowStepConfig {
    pub fn new(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            approver_role: None,
            required_permissions: Vec::new(),
            sla_hours: None,
        }
    }

    pub fn for_role(step_name: impl Into<String>, approver_role: impl Into<String>) -> Self {
        Self::new(step_name).with_approver_role(approver_role)
    }

    pub fn with_approver_role(mut self, role: impl Into<String>) -> Self {
        self.approver_role = Some(role.into());
        self
    }

    pub fn with_required_permission(mut self, permission: impl Into<String>) -> Self {
        self.required_permissions.push(permission.into());
        self
    }

    pub fn with_sla_hours(mut self, hours: u32) -> Self {
        self.sla_hours = Some(hours);
        self
    }
}
