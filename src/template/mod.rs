//! Form templates: declarative field schemas plus approval workflow.
//!
//! # Key Types
//!
//! - [`FormTemplate`] - versioned schema with pages, sections, fields and workflow
//! - [`FormValidator`] - field-level validation of submitted form data
//! - [`TemplateStore`] - read seam used by the workflow engine
//!
//! # Examples
//!
//! ```rust
//! use tenant_workflow::template::{
//!     FieldDefinition, FieldType, FormSection, FormStep, FormTemplate, WorkflowStepConfig,
//!     validate_form_data,
//! };
//! use serde_json::json;
//!
//! let template = FormTemplate::new("leave", 1, "Leave request")
//!     .with_step(FormStep::new("Main").with_section(
//!         FormSection::new("Dates")
//!             .with_field(FieldDefinition::new("days", FieldType::Integer, "Days").required()),
//!     ))
//!     .with_workflow_step(WorkflowStepConfig::for_role("hod_review", "head_of_department"));
//!
//! assert!(validate_form_data(&template, &json!({"days": 2}), 10).is_ok());
//! assert!(validate_form_data(&template, &json!({}), 10).is_err());
//! ```

pub mod registry;
pub mod types;
pub mod validation;

pub use registry::{InMemoryTemplateStore, MAX_SLA_HOURS, TemplateStore, validate_template};
pub use types::{
    FieldConstraints, FieldDefinition, FieldType, FormSection, FormStep, FormTemplate,
    WorkflowConfig, WorkflowStepConfig,
};
pub use validation::{
    DEFAULT_MAX_NESTING_DEPTH, FormValidator, exceeds_depth, json_type, validate_form_data,
};
