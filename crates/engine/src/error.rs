//! Engine-level error types.

use thiserror::Error;

use crate::model::{InstanceId, TaskId};

/// Errors produced by the process execution engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Definition validation errors ------
    /// An edge references a task id outside the definition's task list.
    #[error("flow references unknown task {task_id} ({side} side)")]
    UnknownFlowEndpoint { task_id: TaskId, side: &'static str },

    /// Topological check detected a cycle in the process graph.
    #[error("process definition graph contains a cycle")]
    CycleDetected,

    // ------ Execution errors ------
    /// A node handler reported failure; the owning instance transitions to
    /// `Failed`.
    #[error("node handler failed: {0}")]
    HandlerFailed(String),

    /// No live instance is registered under this id.
    #[error("no process instance registered with id {0}")]
    UnknownProcess(InstanceId),

    /// `complete_task` was called for a task that is not currently pending
    /// on the instance — either it never suspended, it already completed,
    /// or this is a duplicate delivery of a completion already processed.
    #[error("task {0} is not pending on this process instance")]
    UnknownTask(TaskId),

    /// Persistence error surfaced from the `store` crate.
    #[error("persistence error: {0}")]
    Persistence(#[from] store::StoreError),
}
