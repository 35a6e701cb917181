//! Node-level error type.

use thiserror::Error;

/// Error returned by a node behavior's `execute_internal`.
///
/// Unlike the teacher's retryable/fatal split, a node here has exactly one
/// failure shape: the instance that owns it transitions straight to
/// `FAILED` (see `ProcessInstance::complete_node`). There is no core-level
/// retry; a task-type implementation that wants retries builds them on top
/// by re-registering a service task itself.
#[derive(Debug, Error, Clone)]
pub enum NodeError {
    #[error("node handler failed: {0}")]
    HandlerFailed(String),
}
