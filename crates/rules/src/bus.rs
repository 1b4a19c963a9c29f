//! The in-process event bus.
//!
//! Producers hold an `Arc<dyn EventSink>` and call `emit`; the bus evaluates
//! immediate rules inline, in the caller's task. [`EventBus::try_emit`] is
//! the result-returning boundary used by tests and the operator CLI.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, warn};

use lifeops_core::{Event, EventSink, Payload};

use crate::evaluator::{EvaluateError, EvaluationReport, RuleEvaluator};

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error(transparent)]
    Evaluate(#[from] EvaluateError),
}

/// Routes emitted events to the rule evaluator.
#[derive(Clone)]
pub struct EventBus {
    evaluator: Arc<RuleEvaluator>,
}

impl EventBus {
    pub fn new(evaluator: Arc<RuleEvaluator>) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &Arc<RuleEvaluator> {
        &self.evaluator
    }

    /// Evaluate immediate rules for one event and report what happened.
    pub async fn try_emit(&self, name: &str, payload: Payload) -> Result<EvaluationReport, BusError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BusError::InvalidEvent("event name is empty".to_string()));
        }
        let event = Event::new(name, payload);
        debug!(event = %event.name, event_id = %event.id, "event emitted");
        Ok(self.evaluator.evaluate_event(&event).await?)
    }
}

#[async_trait::async_trait]
impl EventSink for EventBus {
    /// Errors and panics stop here: they are logged and discarded.
    async fn emit(&self, name: &str, payload: Payload) {
        match AssertUnwindSafe(self.try_emit(name, payload)).catch_unwind().await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(event = %name, error = %e, "event evaluation failed"),
            Err(panic) => {
                error!(event = %name, panic = %panic_message(panic.as_ref()), "event evaluation panicked");
            }
        }
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
