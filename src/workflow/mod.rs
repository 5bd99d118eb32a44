//! Form workflow state machine.
//!
//! ```text
//! draft → submitted → in_review(step = N) → approved → completed
//!                  ↘         ↘
//!                   rejected   rejected
//! ```
//!
//! Every operation takes an explicit [`RequestContext`](crate::tenant::RequestContext);
//! there is no ambient tenant. Transitions are committed with a conditional
//! write, and notifiers run only after the commit.

pub mod builder;
pub mod config;
pub mod engine;
pub mod gate;
pub mod notify;
pub mod operations;
pub mod queries;

pub use builder::WorkflowEngineBuilder;
pub use config::{EmptyWorkflowOutcome, EngineConfig, NotificationDispatch};
pub use engine::WorkflowEngine;
pub use gate::{GateDecision, evaluate_gate};
pub use notify::{
    ActivityLogNotifier, ChannelNotifier, Notifier, NotifyError, TransitionEvent,
    TransitionEventType,
};
pub use operations::AdvanceRequest;
