//! Post-transition notification hooks.
//!
//! Notifiers run after a transition has been committed. They cannot veto or
//! roll back the transition: a failing or slow notifier is logged at warn
//! level and otherwise ignored.

use super::config::NotificationDispatch;
use crate::instance::{FormInstance, InstanceStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Kind of committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionEventType {
    Submitted,
    StepAdvanced,
    Approved,
    Rejected,
    Completed,
    Deleted,
}

impl TransitionEventType {
    /// Event describing arrival in a terminal status reached by decision.
    pub fn for_status(status: InstanceStatus) -> Option<Self> {
        match status {
            InstanceStatus::Approved => Some(Self::Approved),
            InstanceStatus::Rejected => Some(Self::Rejected),
            InstanceStatus::Completed => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TransitionEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submitted => "submitted",
            Self::StepAdvanced => "step_advanced",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// A committed transition, with the instance as stored after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub event_type: TransitionEventType,
    pub instance: FormInstance,
    pub actor_id: String,
    pub tenant_id: String,
    pub request_id: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Delivery through '{channel}' failed: {message}")]
    Delivery { channel: String, message: String },

    #[error("Notification channel unavailable: {message}")]
    Unavailable { message: String },
}

impl NotifyError {
    pub fn delivery(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            channel: channel.into(),
            message: message.into(),
        }
    }
}

/// Receiver of committed transitions (mail, SMS, activity log, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Name used in log messages
    fn name(&self) -> &'static str;

    /// Upper bound on one delivery
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn notify(&self, event: &TransitionEvent) -> Result<(), NotifyError>;
}

/// Writes every transition to the activity log.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityLogNotifier;

#[async_trait]
impl Notifier for ActivityLogNotifier {
    fn name(&self) -> &'static str {
        "activity_log"
    }

    async fn notify(&self, event: &TransitionEvent) -> Result<(), NotifyError> {
        info!(
            "Activity: form instance '{}' {} by '{}' in tenant '{}' (status: {}, step: {}, request: '{}')",
            event.instance.id,
            event.event_type,
            event.actor_id,
            event.tenant_id,
            event.instance.status,
            event.instance.current_workflow_step.as_deref().unwrap_or("-"),
            event.request_id
        );
        Ok(())
    }
}

/// Forwards events into a tokio channel for an outer delivery layer.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<TransitionEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransitionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn notify(&self, event: &TransitionEvent) -> Result<(), NotifyError> {
        self.sender
            .send(event.clone())
            .map_err(|_| NotifyError::Unavailable {
                message: "receiver dropped".to_string(),
            })
    }
}

/// Hand events to every notifier according to the dispatch mode.
pub(crate) async fn dispatch(
    notifiers: &[Arc<dyn Notifier>],
    mode: NotificationDispatch,
    events: Vec<TransitionEvent>,
) {
    if notifiers.is_empty() || events.is_empty() {
        return;
    }

    let background = match mode {
        NotificationDispatch::Background => tokio::runtime::Handle::try_current().ok(),
        NotificationDispatch::Inline => None,
    };

    match background {
        Some(handle) => {
            let notifiers = notifiers.to_vec();
            handle.spawn(async move {
                deliver_all(&notifiers, &events).await;
            });
        }
        None => {
            if mode == NotificationDispatch::Background {
                debug!("No tokio runtime available; delivering notifications inline");
            }
            deliver_all(notifiers, &events).await;
        }
    }
}

async fn deliver_all(notifiers: &[Arc<dyn Notifier>], events: &[TransitionEvent]) {
    for event in events {
        for notifier in notifiers {
            deliver(notifier.as_ref(), event).await;
        }
    }
}

async fn deliver(notifier: &dyn Notifier, event: &TransitionEvent) {
    match tokio::time::timeout(notifier.timeout(), notifier.notify(event)).await {
        Ok(Ok(())) => debug!(
            "Notifier '{}' delivered {} for instance '{}' (request: '{}')",
            notifier.name(),
            event.event_type,
            event.instance.id,
            event.request_id
        ),
        Ok(Err(e)) => warn!(
            "Notifier '{}' failed for instance '{}' in tenant '{}' (request: '{}'): {}",
            notifier.name(),
            event.instance.id,
            event.tenant_id,
            event.request_id,
            e
        ),
        Err(_) => warn!(
            "Notifier '{}' timed out after {:?} for instance '{}' (request: '{}')",
            notifier.name(),
            notifier.timeout(),
            event.instance.id,
            event.request_id
        ),
    }
}
