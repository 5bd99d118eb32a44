//! Builder for configuring workflow engines.

use super::config::{EmptyWorkflowOutcome, EngineConfig, NotificationDispatch};
use super::engine::WorkflowEngine;
use super::notify::Notifier;
use crate::error::WorkflowResult;
use crate::storage::{StorageError, StorageProvider};
use crate::template::TemplateStore;
use crate::tenant::DirectoryStore;
use std::sync::Arc;

/// Builder for [`WorkflowEngine`].
///
/// ```rust
/// use std::sync::Arc;
/// use tenant_workflow::storage::InMemoryStorage;
/// use tenant_workflow::template::InMemoryTemplateStore;
/// use tenant_workflow::tenant::InMemoryDirectory;
/// use tenant_workflow::workflow::{
///     ActivityLogNotifier, EmptyWorkflowOutcome, NotificationDispatch, WorkflowEngine,
/// };
///
/// let engine = WorkflowEngine::builder(
///     Arc::new(InMemoryDirectory::new()),
///     Arc::new(InMemoryTemplateStore::new()),
///     Arc::new(InMemoryStorage::new()),
/// )
/// .with_empty_workflow_outcome(EmptyWorkflowOutcome::Approved)
/// .with_notification_dispatch(NotificationDispatch::Inline)
/// .with_notifier(Arc::new(ActivityLogNotifier))
/// .build()
/// .unwrap();
/// assert_eq!(engine.config().empty_workflow_outcome, EmptyWorkflowOutcome::Approved);
/// ```
pub struct WorkflowEngineBuilder<D, T, S> {
    directory: Arc<D>,
    templates: Arc<T>,
    storage: Arc<S>,
    config: EngineConfig,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl<D, T, S> WorkflowEngine<D, T, S>
where
    D: DirectoryStore,
    T: TemplateStore,
    S: StorageProvider,
    S::Error: Into<StorageError>,
{
    pub fn builder(directory: Arc<D>, templates: Arc<T>, storage: Arc<S>) -> WorkflowEngineBuilder<D, T, S> {
        WorkflowEngineBuilder {
            directory,
            templates,
            storage,
            config: EngineConfig::default(),
            notifiers: Vec::new(),
        }
    }
}

impl<D, T, S> WorkflowEngineBuilder<D, T, S>
where
    D: DirectoryStore,
    T: TemplateStore,
    S: StorageProvider,
    S::Error: Into<StorageError>,
{
    /// Replace the whole configuration, e.g. one loaded from a file.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.config.max_nesting_depth = depth;
        self
    }

    pub fn with_empty_workflow_outcome(mut self, outcome: EmptyWorkflowOutcome) -> Self {
        self.config.empty_workflow_outcome = outcome;
        self
    }

    pub fn with_notification_dispatch(mut self, dispatch: NotificationDispatch) -> Self {
        self.config.notification_dispatch = dispatch;
        self
    }

    pub fn with_completion_permission(mut self, permission: impl Into<String>) -> Self {
        self.config.completion_permission = permission.into();
        self
    }

    pub fn with_delete_permission(mut self, permission: impl Into<String>) -> Self {
        self.config.delete_permission = permission.into();
        self
    }

    pub fn with_role_cache(mut self, enabled: bool) -> Self {
        self.config.role_cache = enabled;
        self
    }

    /// Add a notifier; notifiers run in registration order.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn build(self) -> WorkflowResult<WorkflowEngine<D, T, S>> {
        self.config.validate()?;
        Ok(WorkflowEngine::from_parts(
            self.directory,
            self.templates,
            self.storage,
            self.config,
            self.notifiers,
        ))
    }
}
