//! Field-level validation of form data against a template.
//!
//! Validation collects every failing field instead of stopping at the first,
//! so a submitter sees all problems at once. Each field reports at most one
//! error.

use super::types::{FieldDefinition, FieldType, FormTemplate};
use crate::error::{FieldError, ValidationError, ValidationResult};
use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{LazyLock, PoisonError, RwLock};

/// Engine-wide default bound on nesting depth of structured values.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 10;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

// Optional leading '+', digits and common separators, starting and ending
// on a digit. The digit count is checked separately.
static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9](?:[0-9 ()\-]*[0-9])?$").expect("phone pattern is valid")
});

const PHONE_DIGITS: std::ops::RangeInclusive<usize> = 7..=15;

// Field patterns compiled once per distinct pattern string
static FIELD_PATTERNS: LazyLock<RwLock<HashMap<String, Regex>>> =
    LazyLock::new(Default::default);

/// Compile a field pattern, reusing an earlier compilation of the same text.
pub(crate) fn compiled_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    if let Some(regex) = FIELD_PATTERNS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(pattern)
    {
        return Ok(regex.clone());
    }
    let regex = Regex::new(pattern)?;
    FIELD_PATTERNS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

fn is_phone_number(text: &str) -> bool {
    PHONE_REGEX.is_match(text)
        && PHONE_DIGITS.contains(&text.chars().filter(char::is_ascii_digit).count())
}

/// Validates form data against one template.
#[derive(Debug, Clone, Copy)]
pub struct FormValidator<'a> {
    template: &'a FormTemplate,
    max_depth: usize,
}

impl<'a> FormValidator<'a> {
    pub fn new(template: &'a FormTemplate, max_depth: usize) -> Self {
        Self {
            template,
            max_depth,
        }
    }

    /// Full validation used on submit: every declared field, plus rejection
    /// of fields the template does not declare.
    pub fn validate(&self, data: &Value) -> ValidationResult<()> {
        let object = as_form_object(data)?;
        let mut errors = self.unknown_fields(object);
        errors.extend(
            self.template
                .fields()
                .filter_map(|field| self.check_field(field, object.get(&field.field_id)).err()),
        );
        finish(errors)
    }

    /// Validate the fields of one page only, for multi-page drafts.
    pub fn validate_page(&self, page_index: usize, data: &Value) -> ValidationResult<()> {
        let object = as_form_object(data)?;
        let Some(page) = self.template.steps.get(page_index) else {
            return Err(vec![FieldError::new(
                "",
                ValidationError::custom(format!(
                    "template '{}' has no page {}",
                    self.template.id, page_index
                )),
            )]);
        };
        let errors = page
            .sections
            .iter()
            .flat_map(|section| section.fields.iter())
            .filter_map(|field| self.check_field(field, object.get(&field.field_id)).err())
            .collect();
        finish(errors)
    }

    /// Shape check for drafts: an object whose values respect the nesting
    /// bound. Field rules are not applied until submit.
    pub fn validate_shape(&self, data: &Value) -> ValidationResult<()> {
        let object = as_form_object(data)?;
        let errors = object
            .iter()
            .filter(|(_, value)| exceeds_depth(value, self.max_depth))
            .map(|(field_id, _)| {
                FieldError::new(
                    field_id.clone(),
                    ValidationError::NestingTooDeep {
                        max_depth: self.max_depth,
                    },
                )
            })
            .collect();
        finish(errors)
    }

    fn unknown_fields(&self, object: &Map<String, Value>) -> Vec<FieldError> {
        object
            .keys()
            .filter(|key| self.template.field(key).is_none())
            .map(|key| {
                FieldError::new(
                    key.clone(),
                    ValidationError::UnknownField {
                        template_id: self.template.id.clone(),
                    },
                )
            })
            .collect()
    }

    fn check_field(&self, field: &FieldDefinition, value: Option<&Value>) -> Result<(), FieldError> {
        self.validate_field(field, value)
            .map_err(|error| FieldError::new(field.field_id.clone(), error))
    }

    /// Validate one field value; `None` and `null` mean "not provided".
    pub fn validate_field(
        &self,
        field: &FieldDefinition,
        value: Option<&Value>,
    ) -> Result<(), ValidationError> {
        let value = match value {
            None | Some(Value::Null) => {
                return if field.required {
                    Err(ValidationError::MissingRequired)
                } else {
                    Ok(())
                };
            }
            Some(value) => value,
        };

        let depth_limit = field
            .constraints
            .max_depth
            .map_or(self.max_depth, |limit| limit.min(self.max_depth));
        if exceeds_depth(value, depth_limit) {
            return Err(ValidationError::NestingTooDeep {
                max_depth: depth_limit,
            });
        }

        match field.field_type {
            FieldType::Text | FieldType::Textarea => {
                let text = expect_string(value)?;
                check_present(field, text)?;
                check_length(field, text.chars().count())?;
                check_pattern(field, text)
            }
            FieldType::Email => {
                let text = expect_string(value)?;
                check_present(field, text)?;
                if !EMAIL_REGEX.is_match(text) {
                    return Err(ValidationError::InvalidEmail {
                        value: text.to_string(),
                    });
                }
                check_length(field, text.chars().count())
            }
            FieldType::Phone => {
                let text = expect_string(value)?;
                check_present(field, text)?;
                if !is_phone_number(text) {
                    return Err(ValidationError::InvalidPhone {
                        value: text.to_string(),
                    });
                }
                check_pattern(field, text)
            }
            FieldType::Number => {
                let number = value
                    .as_f64()
                    .ok_or_else(|| ValidationError::invalid_type("number", json_type(value)))?;
                check_range(field, number)
            }
            FieldType::Integer => {
                if !(value.is_i64() || value.is_u64()) {
                    return Err(ValidationError::invalid_type("integer", json_type(value)));
                }
                let number = value.as_f64().unwrap_or_default();
                check_range(field, number)
            }
            FieldType::Date => {
                let text = expect_string(value)?;
                check_present(field, text)?;
                check_date(field, text)
            }
            FieldType::Select => {
                let text = expect_string(value)?;
                check_present(field, text)?;
                check_option(field, text)
            }
            FieldType::MultiSelect => {
                let items = value
                    .as_array()
                    .ok_or_else(|| ValidationError::invalid_type("array", json_type(value)))?;
                if items.is_empty() && field.required {
                    return Err(ValidationError::MissingRequired);
                }
                check_length(field, items.len())?;
                let mut seen = HashSet::new();
                for item in items {
                    let text = expect_string(item)?;
                    check_option(field, text)?;
                    if !seen.insert(text) {
                        return Err(ValidationError::custom(format!(
                            "'{text}' is selected more than once"
                        )));
                    }
                }
                Ok(())
            }
            FieldType::Checkbox => {
                let checked = value
                    .as_bool()
                    .ok_or_else(|| ValidationError::invalid_type("boolean", json_type(value)))?;
                if field.required && !checked {
                    return Err(ValidationError::MissingRequired);
                }
                Ok(())
            }
            FieldType::Structured => {
                if !(value.is_object() || value.is_array()) {
                    return Err(ValidationError::invalid_type(
                        "object or array",
                        json_type(value),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Convenience wrapper for [`FormValidator::validate`].
pub fn validate_form_data(
    template: &FormTemplate,
    data: &Value,
    max_depth: usize,
) -> ValidationResult<()> {
    FormValidator::new(template, max_depth).validate(data)
}

/// Whether `value` nests more than `limit` levels of arrays/objects.
///
/// Recursion stops as soon as the limit is passed, so the cost is bounded by
/// the limit rather than by the payload.
pub fn exceeds_depth(value: &Value, limit: usize) -> bool {
    match value {
        Value::Array(items) => limit == 0 || items.iter().any(|v| exceeds_depth(v, limit - 1)),
        Value::Object(map) => limit == 0 || map.values().any(|v| exceeds_depth(v, limit - 1)),
        _ => false,
    }
}

/// JSON type name for error messages.
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

fn as_form_object(data: &Value) -> ValidationResult<&Map<String, Value>> {
    data.as_object().ok_or_else(|| {
        vec![FieldError::new(
            "",
            ValidationError::invalid_type("object", json_type(data)),
        )]
    })
}

fn finish(errors: Vec<FieldError>) -> ValidationResult<()> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn expect_string(value: &Value) -> Result<&str, ValidationError> {
    value
        .as_str()
        .ok_or_else(|| ValidationError::invalid_type("string", json_type(value)))
}

fn check_present(field: &FieldDefinition, text: &str) -> Result<(), ValidationError> {
    if field.required && text.trim().is_empty() {
        Err(ValidationError::MissingRequired)
    } else {
        Ok(())
    }
}

fn check_length(field: &FieldDefinition, length: usize) -> Result<(), ValidationError> {
    let min = field.constraints.min_length;
    let max = field.constraints.max_length;
    if min.is_some_and(|min| length < min) || max.is_some_and(|max| length > max) {
        return Err(ValidationError::InvalidLength { length, min, max });
    }
    Ok(())
}

fn check_range(field: &FieldDefinition, value: f64) -> Result<(), ValidationError> {
    let min = field.constraints.min;
    let max = field.constraints.max;
    if min.is_some_and(|min| value < min) || max.is_some_and(|max| value > max) {
        return Err(ValidationError::OutOfRange { value, min, max });
    }
    Ok(())
}

fn check_pattern(field: &FieldDefinition, text: &str) -> Result<(), ValidationError> {
    let Some(pattern) = &field.constraints.pattern else {
        return Ok(());
    };
    let regex = compiled_pattern(pattern).map_err(|_| ValidationError::InvalidPattern {
        pattern: pattern.clone(),
    })?;
    if regex.is_match(text) {
        Ok(())
    } else {
        Err(ValidationError::PatternMismatch {
            pattern: pattern.clone(),
        })
    }
}

fn check_option(field: &FieldDefinition, text: &str) -> Result<(), ValidationError> {
    if field.constraints.options.iter().any(|option| option == text) {
        Ok(())
    } else {
        Err(ValidationError::NotAllowed {
            value: text.to_string(),
            allowed: field.constraints.options.clone(),
        })
    }
}

fn check_date(field: &FieldDefinition, text: &str) -> Result<(), ValidationError> {
    let date = parse_date(text).ok_or_else(|| ValidationError::InvalidDate {
        value: text.to_string(),
    })?;
    let min = &field.constraints.min_date;
    let max = &field.constraints.max_date;
    // Bounds are checked at registration; an unparsable bound is ignored here
    let below = min
        .as_deref()
        .and_then(parse_date)
        .is_some_and(|min| date < min);
    let above = max
        .as_deref()
        .and_then(parse_date)
        .is_some_and(|max| date > max);
    if below || above {
        return Err(ValidationError::DateOutOfRange {
            value: text.to_string(),
            min: min.clone(),
            max: max.clone(),
        });
    }
    Ok(())
}
