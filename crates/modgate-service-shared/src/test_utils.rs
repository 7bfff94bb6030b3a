//! Test utilities for pipeline and handler testing.
//!
//! Enable the `test-utils` feature to use these from other crates.

use std::sync::{Arc, Mutex};

use crate::observe::{EventSink, Outcome, PipelineEvent};

/// Event sink that keeps every event in memory.
///
/// Clones share the same buffer, so a test can hand one clone to a
/// [`Pipeline`](crate::Pipeline) and inspect another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured events, in emission order.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.events()
            .iter()
            .filter(|e| e.outcome == outcome)
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Generate a unique request ID for testing.
pub fn test_request_id() -> String {
    format!("test-{}", uuid::Uuid::now_v7())
}
