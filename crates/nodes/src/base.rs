//! `BaseNode` — the pass-through node behavior used by `start-task`,
//! `end-task`, and any unregistered task type.

use async_trait::async_trait;

use crate::traits::{ExecutionContext, ExecutionOutcome, NodeBehavior};

/// Synchronous pass-through: completes immediately, leaves variables
/// untouched, follows every outgoing flow (§4.2 base `executeInternal`).
pub struct BaseNode;

#[async_trait]
impl NodeBehavior for BaseNode {
    async fn execute_internal(&mut self, _ctx: &ExecutionContext) -> ExecutionOutcome {
        ExecutionOutcome::Completed(Ok(None))
    }
}
