//! `MockNode` — a test double for `NodeBehavior`.
//!
//! Useful in engine-level tests where a real node implementation is either
//! unavailable or irrelevant: records every variable snapshot it receives
//! and returns a programmer-specified result.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::traits::{ExecutionContext, ExecutionOutcome, NodeBehavior, Variables};
use crate::NodeError;

/// Behaviour injected into `MockNode` at construction time.
pub enum MockBehaviour {
    /// Succeed, replacing the instance's variables with this value.
    ReturnVariables(Variables),
    /// Succeed without touching the instance's variables.
    ReturnUnchanged,
    /// Fail with the given message.
    Fail(String),
}

/// A mock node that records every call it receives and returns a
/// programmer-specified result.
pub struct MockNode {
    /// Label used in test assertions.
    pub name: String,
    /// What the node will do when `execute_internal` is called.
    pub behaviour: MockBehaviour,
    /// All variable snapshots seen by this node (in call order).
    pub calls: Arc<Mutex<Vec<Value>>>,
}

impl MockNode {
    /// Create a mock that always succeeds, replacing variables with `value`.
    pub fn returning(name: impl Into<String>, value: Value) -> Self {
        let vars = value.as_object().cloned().unwrap_or_default();
        Self {
            name: name.into(),
            behaviour: MockBehaviour::ReturnVariables(vars),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that succeeds without changing variables.
    pub fn passthrough(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::ReturnUnchanged,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always fails with `msg`.
    pub fn failing(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::Fail(msg.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of times this node has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl NodeBehavior for MockNode {
    async fn execute_internal(&mut self, ctx: &ExecutionContext) -> ExecutionOutcome {
        self.calls
            .lock()
            .unwrap()
            .push(Value::Object(ctx.variables.clone()));

        let result = match &self.behaviour {
            MockBehaviour::ReturnVariables(vars) => Ok(Some(vars.clone())),
            MockBehaviour::ReturnUnchanged => Ok(None),
            MockBehaviour::Fail(msg) => Err(NodeError::HandlerFailed(msg.clone())),
        };
        ExecutionOutcome::Completed(result)
    }
}
