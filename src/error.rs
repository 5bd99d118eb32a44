//! Error types for permission and workflow operations.
//!
//! Every error in this module is reported synchronously to the caller and is
//! never retried automatically: each one describes a mismatch between the
//! caller and the current state, not a transient fault.
//!
//! Configuration problems in a workflow (a step naming a role the tenant does
//! not have) are deliberately absent here. They are attached to the instance
//! as [`ConfigurationWarning`](crate::instance::ConfigurationWarning)s so the
//! instance stays inspectable.

use crate::instance::InstanceStatus;
use crate::storage::StorageError;
use std::fmt;

/// Main error type for workflow engine operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The actor lacks the role or permission required for the action
    #[error("Permission denied for '{actor_id}': {reason}")]
    PermissionDenied { actor_id: String, reason: String },

    /// The operation is not allowed from the instance's current state
    #[error("Invalid transition: cannot {operation} a form instance in state '{status}'")]
    InvalidTransition {
        operation: String,
        status: InstanceStatus,
    },

    /// Form data violates the template's field rules
    #[error("Validation failed: {}", summarize(.errors))]
    ValidationFailed { errors: Vec<FieldError> },

    /// The instance was modified concurrently
    #[error(
        "Stale state for form instance '{instance_id}': expected version {expected}, found {current}"
    )]
    StaleState {
        instance_id: String,
        expected: String,
        current: String,
    },

    /// No live instance with this id exists in the tenant
    #[error("Form instance not found: '{id}' in tenant '{tenant_id}'")]
    InstanceNotFound { tenant_id: String, id: String },

    /// Template id (and version, when given) is unknown
    #[error("Form template not found: '{template_id}'{}", .version.map(|v| format!(" version {v}")).unwrap_or_default())]
    TemplateNotFound {
        template_id: String,
        version: Option<u32>,
    },

    /// Template failed its structural check
    #[error("Invalid template '{template_id}': {message}")]
    InvalidTemplate {
        template_id: String,
        message: String,
    },

    /// Malformed request or engine configuration
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Errors from the storage backend
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn summarize(errors: &[FieldError]) -> String {
    match errors {
        [] => "no field errors recorded".to_string(),
        [single] => single.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

/// A validation failure attached to a single form field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// Field the failure applies to; empty for form-level failures
    pub field_id: String,
    /// What went wrong
    pub error: ValidationError,
}

impl FieldError {
    pub fn new(field_id: impl Into<String>, error: ValidationError) -> Self {
        Self {
            field_id: field_id.into(),
            error,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field_id.is_empty() {
            write!(f, "{}", self.error)
        } else {
            write!(f, "{}: {}", self.field_id, self.error)
        }
    }
}

/// Field-level validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Required field is absent, null or blank
    #[error("value is required")]
    MissingRequired,

    /// Value has the wrong JSON type
    #[error("expected {expected}, got {actual}")]
    InvalidType { expected: String, actual: String },

    /// Numeric value outside the configured range
    #[error("value {value} is outside the allowed range {}", describe_range(.min, .max))]
    OutOfRange {
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },

    /// Text shorter or longer than allowed
    #[error("length {length} is outside the allowed range {}", describe_length(.min, .max))]
    InvalidLength {
        length: usize,
        min: Option<usize>,
        max: Option<usize>,
    },

    /// Text does not match the field pattern
    #[error("value does not match pattern '{pattern}'")]
    PatternMismatch { pattern: String },

    /// Field pattern is not a valid regular expression
    #[error("pattern '{pattern}' is not a valid regular expression")]
    InvalidPattern { pattern: String },

    /// Malformed email address
    #[error("'{value}' is not a valid email address")]
    InvalidEmail { value: String },

    /// Malformed phone number
    #[error("'{value}' is not a valid phone number")]
    InvalidPhone { value: String },

    /// Value not among the enumerated options
    #[error("'{value}' is not one of the allowed values {allowed:?}")]
    NotAllowed { value: String, allowed: Vec<String> },

    /// Date could not be parsed
    #[error("'{value}' is not a valid date (expected YYYY-MM-DD)")]
    InvalidDate { value: String },

    /// Date outside the configured window
    #[error("date {value} is outside the allowed range {}", describe_range(.min, .max))]
    DateOutOfRange {
        value: String,
        min: Option<String>,
        max: Option<String>,
    },

    /// Structured value nested deeper than allowed
    #[error("value is nested deeper than {max_depth} levels")]
    NestingTooDeep { max_depth: usize },

    /// Field not declared by the template
    #[error("field is not declared by template '{template_id}'")]
    UnknownField { template_id: String },

    /// General validation error with custom message
    #[error("{message}")]
    Custom { message: String },
}

fn describe_range<T: fmt::Display>(min: &Option<T>, max: &Option<T>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("[{min}, {max}]"),
        (Some(min), None) => format!(">= {min}"),
        (None, Some(max)) => format!("<= {max}"),
        (None, None) => "(unbounded)".to_string(),
    }
}

fn describe_length(min: &Option<usize>, max: &Option<usize>) -> String {
    describe_range(min, max)
}

// Convenience methods for creating common errors
impl WorkflowError {
    pub fn permission_denied(actor_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            actor_id: actor_id.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_transition(operation: impl Into<String>, status: InstanceStatus) -> Self {
        Self::InvalidTransition {
            operation: operation.into(),
            status,
        }
    }

    pub fn instance_not_found(tenant_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self::InstanceNotFound {
            tenant_id: tenant_id.into(),
            id: id.into(),
        }
    }

    pub fn template_not_found(template_id: impl Into<String>, version: Option<u32>) -> Self {
        Self::TemplateNotFound {
            template_id: template_id.into(),
            version,
        }
    }

    pub fn invalid_template(template_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template_id: template_id.into(),
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Field errors carried by a `ValidationFailed` error, empty otherwise.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::ValidationFailed { errors } => errors,
            _ => &[],
        }
    }
}

impl ValidationError {
    pub fn invalid_type(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidType {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }
}

// Result type aliases for convenience
pub type WorkflowResult<T> = Result<T, WorkflowError>;
pub type ValidationResult<T> = Result<T, Vec<FieldError>>;
