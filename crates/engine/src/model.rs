//! Core domain models: [`Task`], [`Flow`], and the identifiers that tie a
//! process instance back to its definition and its live nodes.
//!
//! `TaskId` is positional — the index of a task within
//! [`crate::definition::ProcessDefinition::tasks`] — rather than a
//! caller-supplied string, so two tasks sharing an id is structurally
//! impossible and no duplicate-id validation is needed at construction time.

use nodes::TaskView;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Index of a task within its owning `ProcessDefinition`.
pub type TaskId = usize;

/// Index of a flow within its owning `ProcessDefinition`.
pub type FlowId = usize;

/// Identifies one live (or historical) process instance.
pub type InstanceId = u64;

/// A single step in the process graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// Looked up in the `TaskTypeRegistry`; falls back to the base
    /// pass-through node when unregistered.
    pub task_type: String,
    /// Arbitrary configuration handed to the node behavior at execution time.
    pub config: Value,
    /// Indices into the definition's `flows` table whose `to` is this task.
    pub incoming_flows: Vec<FlowId>,
    /// Indices into the definition's `flows` table whose `from` is this task.
    pub outgoing_flows: Vec<FlowId>,
}

impl Task {
    /// The decoupled view passed to `NodeBehavior` implementations, which
    /// never see the flow-index bookkeeping above.
    pub fn as_view(&self) -> TaskView {
        TaskView {
            id: self.id,
            name: self.name.clone(),
            task_type: self.task_type.clone(),
            config: self.config.clone(),
        }
    }
}

/// A directed edge between two tasks, optionally guarded by an expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub from: TaskId,
    pub to: TaskId,
    /// `fasteval`-dialect expression evaluated by `DecisionNode`. `None`
    /// means unconditional — every non-decision node's flows, and a
    /// decision's flows with no explicit guard, are always followed.
    pub guard: Option<String>,
}
