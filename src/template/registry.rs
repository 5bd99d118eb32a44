//! Template store and structural template checks.
//!
//! Templates are immutable per `(id, version)`. The engine reads them through
//! [`TemplateStore`]; [`InMemoryTemplateStore`] is the bundled implementation
//! and refuses templates that fail [`validate_template`].

use super::types::{FieldType, FormTemplate};
use super::validation::{compiled_pattern, parse_date};
use crate::error::{WorkflowError, WorkflowResult};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Read access to form templates.
pub trait TemplateStore: Send + Sync {
    /// Fetch a template; `version = None` selects the latest version.
    fn get_template(
        &self,
        template_id: &str,
        version: Option<u32>,
    ) -> impl Future<Output = WorkflowResult<Option<Arc<FormTemplate>>>> + Send;
}

/// In-memory template registry keyed by id and version.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplateStore {
    templates: Arc<RwLock<HashMap<String, BTreeMap<u32, Arc<FormTemplate>>>>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template after the structural check.
    ///
    /// Registering an `(id, version)` pair twice is rejected.
    pub async fn register(&self, template: FormTemplate) -> WorkflowResult<Arc<FormTemplate>> {
        validate_template(&template)?;

        let mut templates = self.templates.write().await;
        let versions = templates.entry(template.id.clone()).or_default();
        if versions.contains_key(&template.version) {
            return Err(WorkflowError::invalid_template(
                &template.id,
                format!("version {} is already registered", template.version),
            ));
        }

        info!(
            "Registered form template '{}' version {}",
            template.id, template.version
        );
        let template = Arc::new(template);
        versions.insert(template.version, Arc::clone(&template));
        Ok(template)
    }

    /// Load and register a template from a JSON file.
    pub async fn register_from_file(&self, path: impl AsRef<Path>) -> WorkflowResult<Arc<FormTemplate>> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            WorkflowError::invalid_request(format!("cannot read {}: {}", path.display(), e))
        })?;
        let template: FormTemplate = serde_json::from_str(&content)?;
        debug!("Loaded template '{}' from {}", template.id, path.display());
        self.register(template).await
    }

    /// Registered versions of a template, ascending.
    pub async fn versions(&self, template_id: &str) -> Vec<u32> {
        let templates = self.templates.read().await;
        templates
            .get(template_id)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Latest version of every template visible to `tenant_id`, sorted by id.
    pub async fn list_for_tenant(&self, tenant_id: &str) -> Vec<Arc<FormTemplate>> {
        let templates = self.templates.read().await;
        let mut visible: Vec<_> = templates
            .values()
            .filter_map(|versions| versions.values().next_back())
            .filter(|template| template.is_visible_to(tenant_id))
            .cloned()
            .collect();
        visible.sort_by(|a, b| a.id.cmp(&b.id));
        visible
    }
}

impl TemplateStore for InMemoryTemplateStore {
    async fn get_template(
        &self,
        template_id: &str,
        version: Option<u32>,
    ) -> WorkflowResult<Option<Arc<FormTemplate>>> {
        let templates = self.templates.read().await;
        let Some(versions) = templates.get(template_id) else {
            return Ok(None);
        };
        let template = match version {
            Some(version) => versions.get(&version),
            None => versions.values().next_back(),
        };
        Ok(template.cloned())
    }
}

/// Longest SLA a workflow step may declare: one hundred years.
pub const MAX_SLA_HOURS: u32 = 24 * 365 * 100;

/// Structural check of a template.
///
/// Returns every problem found, joined into one `InvalidTemplate` error.
pub fn validate_template(template: &FormTemplate) -> WorkflowResult<()> {
    let mut problems = Vec::new();

    if template.id.trim().is_empty() {
        problems.push("template id must not be empty".to_string());
    }
    if template.name.trim().is_empty() {
        problems.push("template name must not be empty".to_string());
    }
    if template.version == 0 {
        problems.push("version must be at least 1".to_string());
    }

    let mut field_ids = HashSet::new();
    for field in template.fields() {
        let id = &field.field_id;
        if id.trim().is_empty() {
            problems.push("field id must not be empty".to_string());
        } else if !field_ids.insert(id.as_str()) {
            problems.push(format!("duplicate field id '{id}'"));
        }

        let c = &field.constraints;
        if field.field_type.has_options() && c.options.is_empty() {
            problems.push(format!(
                "field '{id}' of type {} needs at least one option",
                field.field_type.as_str()
            ));
        }
        if let (Some(min), Some(max)) = (c.min, c.max) {
            if min > max {
                problems.push(format!("field '{id}' has min {min} greater than max {max}"));
            }
        }
        if let (Some(min), Some(max)) = (c.min_length, c.max_length) {
            if min > max {
                problems.push(format!(
                    "field '{id}' has min_length {min} greater than max_length {max}"
                ));
            }
        }
        if let Some(pattern) = &c.pattern {
            if compiled_pattern(pattern).is_err() {
                problems.push(format!("field '{id}' has invalid pattern '{pattern}'"));
            }
        }
        let min_date = c.min_date.as_deref().map(|d| (d, parse_date(d)));
        let max_date = c.max_date.as_deref().map(|d| (d, parse_date(d)));
        for (raw, parsed) in [min_date, max_date].into_iter().flatten() {
            if parsed.is_none() {
                problems.push(format!("field '{id}' has invalid date bound '{raw}'"));
            }
        }
        if let (Some((_, Some(min))), Some((_, Some(max)))) = (min_date, max_date) {
            if min > max {
                problems.push(format!("field '{id}' has min_date after max_date"));
            }
        }
        if c.max_depth == Some(0) && field.field_type == FieldType::Structured {
            problems.push(format!("structured field '{id}' needs max_depth of at least 1"));
        }
    }

    let mut step_names = HashSet::new();
    for step in template.workflow_steps() {
        let name = &step.step_name;
        if name.trim().is_empty() {
            problems.push("workflow step name must not be empty".to_string());
        } else if !step_names.insert(name.as_str()) {
            problems.push(format!("duplicate workflow step '{name}'"));
        }
        match step.sla_hours {
            Some(0) => problems.push(format!("workflow step '{name}' has zero SLA hours")),
            Some(hours) if hours > MAX_SLA_HOURS => problems.push(format!(
                "workflow step '{name}' has SLA of {hours} hours, above the {MAX_SLA_HOURS} limit"
            )),
            _ => {}
        }
        if step
            .required_permissions
            .iter()
            .any(|permission| permission.trim().is_empty())
        {
            problems.push(format!("workflow step '{name}' lists an empty permission"));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::invalid_template(
            &template.id,
            problems.join("; "),
        ))
    }
}
