//! `ServiceTaskNode` — the canonical asynchronous node (§4.3).
//!
//! Suspends on entry instead of completing. The node stays in the owning
//! instance's node pool until `Engine::complete_task` reaches in and calls
//! `ProcessInstance::complete_node` directly on it — there is no stored
//! callback object to manage, because the node itself *is* the retained
//! continuation: as long as it remains in the pool, a later `complete_node`
//! call resumes exactly where `execute_internal` left off. A second,
//! duplicate delivery finds the task id no longer in the pool and is
//! rejected as an unknown task — the idempotency §4.3 asks for falls out
//! of the node-pool membership invariant for free, rather than needing a
//! one-shot channel guard.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::traits::{ExecutionContext, ExecutionOutcome, NodeBehavior};

/// A node that suspends the owning instance until externally completed.
pub struct ServiceTaskNode {
    /// Persisted alongside the node document so a reconstructed instance's
    /// node can tell it was left mid-flight by a prior suspension (§3).
    pending: bool,
}

impl ServiceTaskNode {
    pub fn new() -> Self {
        Self { pending: false }
    }
}

impl Default for ServiceTaskNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeBehavior for ServiceTaskNode {
    async fn execute_internal(&mut self, _ctx: &ExecutionContext) -> ExecutionOutcome {
        self.pending = true;
        ExecutionOutcome::Pending
    }

    fn serialize_state(&self) -> Value {
        json!({ "pending": self.pending })
    }

    fn restore_state(&mut self, state: &Value) {
        self.pending = state.get("pending").and_then(Value::as_bool).unwrap_or(false);
    }
}
