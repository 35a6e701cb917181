//! `ProcessInstance` — one running (or finished) execution of a
//! `ProcessDefinition`.
//!
//! Token propagation is implemented as an explicit `VecDeque` work queue
//! rather than recursive calls, so a wide or deep process graph never grows
//! the call stack — the propagation itself is the thing recursion would
//! otherwise model.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nodes::{ExecutionContext, ExecutionOutcome, FlowGuard, NodeBehavior, NodeError, TaskTypeRegistry, Variables};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::definition::ProcessDefinition;
use crate::error::EngineError;
use crate::model::{InstanceId, TaskId};

/// Lifecycle state of a process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Running,
    /// At least one node is suspended pending an external `complete_task`
    /// call (§3's lifecycle: RUNNING→WAITING on suspension, WAITING→RUNNING
    /// on `completeTask`). Distinct from `Running` so `Engine::clear_pool`
    /// can tell a live-but-blocked instance apart from one making progress.
    Waiting,
    Completed,
    Failed,
}

/// Emitted around a node's execution and at instance completion (§6: "event
/// emission is synchronous").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceEvent {
    /// A task is about to execute.
    Before { task_id: TaskId },
    /// A task finished executing successfully.
    After { task_id: TaskId },
    /// A task's handler reported failure; the instance is now `Failed`.
    Failed { task_id: TaskId, error: String },
    /// The instance reached an end task with no other node left pending.
    End,
}

/// Receiver for instance lifecycle events.
pub trait EventSink: Send + Sync {
    fn on_event(&self, instance_id: InstanceId, event: &InstanceEvent);
}

/// A running execution of a [`ProcessDefinition`].
pub struct ProcessInstance {
    id: InstanceId,
    persistence_id: Option<store::PersistenceId>,
    definition: Arc<ProcessDefinition>,
    status: Status,
    variables: Variables,
    error: Option<String>,
    /// Behaviors of nodes currently suspended (`ExecutionOutcome::Pending`),
    /// keyed by task id. A task id present here is the only thing
    /// `complete_task` will accept — this is what makes a duplicate
    /// completion delivery rejected for free (§4.3).
    node_pool: HashMap<TaskId, Box<dyn NodeBehavior>>,
    /// AND-join counters: how many of a task's incoming flows have fired so
    /// far. Tracked independently of `node_pool` because a join task isn't
    /// created until the join condition is satisfied.
    incoming_counts: HashMap<TaskId, u32>,
    /// Whether any branch has reached a task with no outgoing flows.
    reached_end: bool,
    /// Mirrors `EngineConfig::stall_is_error` at the moment this instance
    /// was created.
    stall_is_error: bool,
    event_sinks: Vec<Arc<dyn EventSink>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProcessInstance {
    pub fn new(
        id: InstanceId,
        definition: Arc<ProcessDefinition>,
        variables: Variables,
        stall_is_error: bool,
        event_sinks: Vec<Arc<dyn EventSink>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            persistence_id: None,
            definition,
            status: Status::Running,
            variables,
            error: None,
            node_pool: HashMap::new(),
            incoming_counts: HashMap::new(),
            reached_end: false,
            stall_is_error,
            event_sinks,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn definition(&self) -> &Arc<ProcessDefinition> {
        &self.definition
    }

    pub fn persistence_id(&self) -> Option<store::PersistenceId> {
        self.persistence_id
    }

    pub fn set_persistence_id(&mut self, id: store::PersistenceId) {
        self.persistence_id = Some(id);
    }

    /// Is `task_id` currently suspended, awaiting an external completion?
    pub fn is_pending(&self, task_id: TaskId) -> bool {
        self.node_pool.contains_key(&task_id)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Start the instance: execute task 0 (the sole entry point a definition
    /// builder guarantees) and propagate from there.
    #[instrument(skip(self, registry), fields(instance_id = self.id))]
    pub async fn start(&mut self, registry: &TaskTypeRegistry) -> Result<(), EngineError> {
        let mut ready = VecDeque::new();
        ready.push_back(0usize);
        self.drain(registry, ready).await
    }

    /// Resume a suspended service task and propagate from there.
    #[instrument(skip(self, registry, result), fields(instance_id = self.id, task_id))]
    pub async fn complete_task(
        &mut self,
        registry: &TaskTypeRegistry,
        task_id: TaskId,
        result: Result<Option<Variables>, NodeError>,
    ) -> Result<(), EngineError> {
        let behavior = self
            .node_pool
            .remove(&task_id)
            .ok_or(EngineError::UnknownTask(task_id))?;

        if self.status == Status::Waiting {
            self.status = Status::Running;
        }

        let mut ready = VecDeque::new();
        self.finish_node(task_id, result, behavior, &mut ready);
        self.drain(registry, ready).await
    }

    async fn drain(&mut self, registry: &TaskTypeRegistry, mut ready: VecDeque<TaskId>) -> Result<(), EngineError> {
        while let Some(task_id) = ready.pop_front() {
            if self.status != Status::Running {
                break;
            }
            self.enter_node(registry, task_id, &mut ready).await;
        }
        if self.status == Status::Running {
            if self.node_pool.is_empty() {
                self.maybe_finish();
            } else {
                self.status = Status::Waiting;
                info!(instance_id = self.id, "process instance suspended pending external completion");
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    async fn enter_node(&mut self, registry: &TaskTypeRegistry, task_id: TaskId, ready: &mut VecDeque<TaskId>) {
        let task = self
            .definition
            .task(task_id)
            .expect("a ready task id always indexes a real task")
            .clone();

        self.emit(InstanceEvent::Before { task_id });

        let mut behavior = registry.create(&task.as_view());
        let ctx = ExecutionContext {
            task: task.as_view(),
            variables: self.variables.clone(),
        };

        match behavior.execute_internal(&ctx).await {
            ExecutionOutcome::Pending => {
                self.node_pool.insert(task_id, behavior);
            }
            ExecutionOutcome::Completed(result) => {
                self.finish_node(task_id, result, behavior, ready);
            }
        }
    }

    fn finish_node(
        &mut self,
        task_id: TaskId,
        result: Result<Option<Variables>, NodeError>,
        behavior: Box<dyn NodeBehavior>,
        ready: &mut VecDeque<TaskId>,
    ) {
        let patch = match result {
            Err(err) => {
                self.status = Status::Failed;
                self.error = Some(err.to_string());
                self.emit(InstanceEvent::Failed {
                    task_id,
                    error: err.to_string(),
                });
                return;
            }
            Ok(patch) => patch,
        };

        if let Some(vars) = patch {
            self.variables = vars;
        }
        self.emit(InstanceEvent::After { task_id });

        let task = self
            .definition
            .task(task_id)
            .expect("completing task id always indexes a real task")
            .clone();

        if task.outgoing_flows.is_empty() {
            self.reached_end = true;
            return;
        }

        for &flow_id in &task.outgoing_flows {
            let flow = self
                .definition
                .flow(flow_id)
                .expect("task's own outgoing flow index is always valid");
            let guard = FlowGuard {
                guard: flow.guard.as_deref(),
            };
            if !behavior.can_follow_outgoing_flow(guard, &self.variables) {
                continue;
            }

            let to = flow.to;
            let to_task = self
                .definition
                .task(to)
                .expect("flow.to always indexes a real task");
            let count = self.incoming_counts.entry(to).or_insert(0);
            *count += 1;
            if *count as usize == to_task.incoming_flows.len().max(1) {
                ready.push_back(to);
            }
        }
    }

    fn maybe_finish(&mut self) {
        debug_assert_eq!(self.status, Status::Running);
        debug_assert!(self.node_pool.is_empty());

        if self.reached_end {
            self.status = Status::Completed;
            self.emit(InstanceEvent::End);
            info!(instance_id = self.id, "process instance completed");
        } else if self.stall_is_error {
            self.status = Status::Failed;
            self.error = Some("process instance stalled: no branch reached an end task".into());
            warn!(instance_id = self.id, "process instance stalled");
        }
        // else: left `Running` with an empty pool, per the configured
        // non-error stall behavior.
    }

    fn emit(&self, event: InstanceEvent) {
        for sink in &self.event_sinks {
            sink.on_event(self.id, &event);
        }
    }

    /// Convert to the plain document shape the `store` crate persists.
    ///
    /// Panics if the owning `ProcessDefinition` hasn't been persisted yet —
    /// an instance document's `definition_ref` would otherwise dangle.
    pub fn to_document(&self) -> store::InstanceDocument {
        let definition_ref = self
            .definition
            .persistence_id()
            .expect("definition must be persisted before persisting an instance of it");

        let node_pool = self
            .node_pool
            .iter()
            .map(|(task_id, behavior)| {
                let task = self
                    .definition
                    .task(*task_id)
                    .expect("pooled task id always indexes a real task");
                (
                    *task_id,
                    store::NodeStateDocument {
                        task_type: task.task_type.clone(),
                        state: behavior.serialize_state(),
                    },
                )
            })
            .collect();

        store::InstanceDocument {
            id: self.id,
            definition_ref,
            status: match self.status {
                Status::Running => "running",
                Status::Waiting => "waiting",
                Status::Completed => "completed",
                Status::Failed => "failed",
            }
            .to_string(),
            variables: self.variables.clone(),
            error: self.error.clone(),
            node_pool,
            incoming_counts: self.incoming_counts.clone(),
            reached_end: self.reached_end,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Rebuild a live instance from its persisted document, restoring any
    /// suspended nodes via the task-type registry and `NodeBehavior::restore_state`.
    ///
    /// The instance's engine-scoped `id` is read from the document itself
    /// (§3/§6: `id` is distinct from, and persisted alongside, the
    /// store-assigned `persistenceId`) so a reload preserves the same
    /// identity a caller may already be holding (§8 scenario 3).
    pub fn from_document(
        persistence_id: store::PersistenceId,
        doc: store::InstanceDocument,
        definition: Arc<ProcessDefinition>,
        registry: &TaskTypeRegistry,
        stall_is_error: bool,
        event_sinks: Vec<Arc<dyn EventSink>>,
    ) -> Self {
        let id = doc.id;
        let status = match doc.status.as_str() {
            "completed" => Status::Completed,
            "failed" => Status::Failed,
            "waiting" => Status::Waiting,
            _ => Status::Running,
        };

        let node_pool = doc
            .node_pool
            .into_iter()
            .map(|(task_id, state_doc)| {
                let task = definition
                    .task(task_id)
                    .expect("persisted task id must exist in its definition");
                let mut behavior = registry.create(&task.as_view());
                behavior.restore_state(&state_doc.state);
                (task_id, behavior)
            })
            .collect();

        Self {
            id,
            persistence_id: Some(persistence_id),
            definition,
            status,
            variables: doc.variables,
            error: doc.error,
            node_pool,
            incoming_counts: doc.incoming_counts,
            reached_end: doc.reached_end,
            stall_is_error,
            event_sinks,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}
