//! The `NodeBehavior` trait — the contract every task-type plugin must fulfil.
//!
//! Defined here (in the `nodes` crate) rather than in `engine` so that a
//! behavior implementation never needs to depend on the engine's instance
//! machinery — it only ever sees the small, decoupled view types below.

use async_trait::async_trait;
use serde_json::Value;

use crate::NodeError;

/// A process instance's variable bag. A plain JSON object: handlers receive
/// an owned snapshot (see `ExecutionContext::variables`) and hand back an
/// owned replacement, so isolation from engine-held state falls out of
/// normal Rust ownership — no structural deep-copy step is needed.
pub type Variables = serde_json::Map<String, Value>;

/// A decoupled view of the task a node is executing. Carries only what a
/// behavior implementation needs; `engine::Task` carries the rest (flow
/// indices, etc.) that only the propagation algorithm cares about.
#[derive(Debug, Clone)]
pub struct TaskView {
    pub id: usize,
    pub name: String,
    pub task_type: String,
    pub config: Value,
}

/// A decoupled view of one outgoing flow's guard, passed to
/// `can_follow_outgoing_flow`. `None` means unconditional.
#[derive(Debug, Clone, Copy)]
pub struct FlowGuard<'a> {
    pub guard: Option<&'a str>,
}

/// Everything a behavior needs to run one execution of its node.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub task: TaskView,
    /// Snapshot of the instance's variables at the moment of the call.
    pub variables: Variables,
}

/// What a node did when asked to execute.
pub enum ExecutionOutcome {
    /// The node ran to completion synchronously; this is the result that
    /// `ProcessInstance::complete_node` should propagate.
    Completed(Result<Option<Variables>, NodeError>),
    /// The node suspended itself pending an external `Engine::complete_task`
    /// call. The node stays in the instance's node pool, uncompleted, until
    /// that call arrives (service-task nodes; see `ServiceTaskNode`).
    Pending,
}

/// The task-type plugin contract (§4.2/§4.1 of the execution-engine spec).
///
/// Every built-in and custom node kind implements this. A `Box<dyn
/// NodeBehavior>` lives inside exactly one instance's node pool at a time,
/// so `&mut self` methods are sound without interior mutability.
#[async_trait]
pub trait NodeBehavior: Send + Sync {
    /// Called once when the node becomes eligible to execute (the AND-join
    /// condition is satisfied). Must return `Completed` for a node that
    /// finishes synchronously, or `Pending` for one that suspends the whole
    /// instance until externally completed.
    async fn execute_internal(&mut self, ctx: &ExecutionContext) -> ExecutionOutcome;

    /// Whether propagation should follow `guard`'s flow, given the
    /// instance's current variables. Default: always follow (base node).
    /// Decision nodes override this to evaluate the flow's guard
    /// expression.
    fn can_follow_outgoing_flow(&self, _guard: FlowGuard<'_>, _variables: &Variables) -> bool {
        true
    }

    /// Subtype-specific state to persist alongside the generic node
    /// document fields (`incomingFlowCompletedNumber`, `task`). Default:
    /// nothing extra (base node).
    fn serialize_state(&self) -> Value {
        Value::Null
    }

    /// Restore subtype-specific state from a previously serialized
    /// document on reconstruction. Default: no-op (base node).
    fn restore_state(&mut self, _state: &Value) {}
}
