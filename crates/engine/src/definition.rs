//! `ProcessDefinition` construction and DAG validation.
//!
//! Validation rules enforced by [`ProcessDefinition::new`]:
//! 1. Every flow's `from`/`to` must reference a task that exists. (Duplicate
//!    task ids are impossible by construction — see [`crate::model::TaskId`].)
//! 2. The directed graph must be acyclic (topological sort must succeed).
//!
//! The topological sort itself (Kahn's algorithm) is generalized from the
//! teacher's string-keyed node/edge version to the positional `usize` task
//! ids used here.

use std::collections::VecDeque;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::model::{Flow, Task, TaskId};

/// Persistence-layer identifier, assigned the first time a definition is
/// stored. `OnceCell` lets many live `ProcessInstance`s share one
/// `Arc<ProcessDefinition>` while only the first persist call actually
/// assigns the id.
pub type PersistenceIdSlot = OnceCell<store::PersistenceId>;

/// Caller-supplied shape of one task, before positional ids are assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub task_type: String,
    #[serde(default)]
    pub config: Value,
}

/// A complete, validated process graph.
#[derive(Debug)]
pub struct ProcessDefinition {
    pub name: String,
    tasks: Vec<Task>,
    flows: Vec<Flow>,
    persistence_id: PersistenceIdSlot,
}

impl ProcessDefinition {
    /// Build and validate a process definition from a flat task list and
    /// flow list. Task ids are assigned positionally (index into
    /// `task_specs`); flows reference tasks by that same index.
    pub fn new(
        name: impl Into<String>,
        task_specs: Vec<TaskSpec>,
        flows: Vec<Flow>,
    ) -> Result<Self, EngineError> {
        let mut tasks: Vec<Task> = task_specs
            .into_iter()
            .enumerate()
            .map(|(id, spec)| Task {
                id,
                name: spec.name,
                task_type: spec.task_type,
                config: spec.config,
                incoming_flows: Vec::new(),
                outgoing_flows: Vec::new(),
            })
            .collect();

        for (flow_id, flow) in flows.iter().enumerate() {
            if flow.from >= tasks.len() {
                return Err(EngineError::UnknownFlowEndpoint {
                    task_id: flow.from,
                    side: "from",
                });
            }
            if flow.to >= tasks.len() {
                return Err(EngineError::UnknownFlowEndpoint {
                    task_id: flow.to,
                    side: "to",
                });
            }
            tasks[flow.from].outgoing_flows.push(flow_id);
            tasks[flow.to].incoming_flows.push(flow_id);
        }

        validate_acyclic(&tasks, &flows)?;

        Ok(Self {
            name: name.into(),
            tasks,
            flows,
            persistence_id: OnceCell::new(),
        })
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn flow(&self, id: usize) -> Option<&Flow> {
        self.flows.get(id)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn persistence_id(&self) -> Option<store::PersistenceId> {
        self.persistence_id.get().copied()
    }

    /// Record the id this definition was persisted under. A no-op (returns
    /// the existing id) if one was already assigned.
    pub fn set_persistence_id(&self, id: store::PersistenceId) -> store::PersistenceId {
        *self.persistence_id.get_or_init(|| id)
    }

    /// Convert to the plain document shape the `store` crate persists.
    pub fn to_document(&self) -> store::DefinitionDocument {
        store::DefinitionDocument {
            name: self.name.clone(),
            tasks: self
                .tasks
                .iter()
                .map(|task| store::TaskDocument {
                    name: task.name.clone(),
                    task_type: task.task_type.clone(),
                    config: task.config.clone(),
                })
                .collect(),
            flows: self
                .flows
                .iter()
                .map(|flow| store::FlowDocument {
                    from: flow.from,
                    to: flow.to,
                    guard: flow.guard.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild and re-validate a definition from its persisted document.
    pub fn from_document(doc: store::DefinitionDocument) -> Result<Self, EngineError> {
        let task_specs = doc
            .tasks
            .into_iter()
            .map(|task| TaskSpec {
                name: task.name,
                task_type: task.task_type,
                config: task.config,
            })
            .collect();
        let flows = doc
            .flows
            .into_iter()
            .map(|flow| Flow {
                from: flow.from,
                to: flow.to,
                guard: flow.guard,
            })
            .collect();
        Self::new(doc.name, task_specs, flows)
    }
}

fn validate_acyclic(tasks: &[Task], flows: &[Flow]) -> Result<(), EngineError> {
    let mut in_degree: Vec<usize> = vec![0; tasks.len()];
    for flow in flows {
        in_degree[flow.to] += 1;
    }

    let mut queue: VecDeque<TaskId> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &deg)| deg == 0)
        .map(|(id, _)| id)
        .collect();

    let mut visited = 0usize;
    while let Some(task_id) = queue.pop_front() {
        visited += 1;
        for &flow_id in &tasks[task_id].outgoing_flows {
            let to = flows[flow_id].to;
            in_degree[to] -= 1;
            if in_degree[to] == 0 {
                queue.push_back(to);
            }
        }
    }

    if visited != tasks.len() {
        return Err(EngineError::CycleDetected);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, task_type: &str) -> TaskSpec {
        TaskSpec {
            name: name.into(),
            task_type: task_type.into(),
            config: Value::Null,
        }
    }

    #[test]
    fn linear_definition_is_valid() {
        let def = ProcessDefinition::new(
            "linear",
            vec![spec("a", "base"), spec("b", "base"), spec("c", "base")],
            vec![
                Flow { from: 0, to: 1, guard: None },
                Flow { from: 1, to: 2, guard: None },
            ],
        )
        .expect("should validate");
        assert_eq!(def.tasks().len(), 3);
        assert_eq!(def.task(1).unwrap().incoming_flows, vec![0]);
        assert_eq!(def.task(1).unwrap().outgoing_flows, vec![1]);
    }

    #[test]
    fn cycle_is_rejected() {
        let result = ProcessDefinition::new(
            "cyclic",
            vec![spec("a", "base"), spec("b", "base")],
            vec![
                Flow { from: 0, to: 1, guard: None },
                Flow { from: 1, to: 0, guard: None },
            ],
        );
        assert!(matches!(result, Err(EngineError::CycleDetected)));
    }

    #[test]
    fn unknown_flow_endpoint_is_rejected() {
        let result = ProcessDefinition::new(
            "bad",
            vec![spec("a", "base")],
            vec![Flow { from: 0, to: 1, guard: None }],
        );
        assert!(matches!(
            result,
            Err(EngineError::UnknownFlowEndpoint { task_id: 1, side: "to" })
        ));
    }

    #[test]
    fn diamond_join_validates() {
        let def = ProcessDefinition::new(
            "diamond",
            vec![spec("a", "base"), spec("b", "base"), spec("c", "base"), spec("d", "base")],
            vec![
                Flow { from: 0, to: 1, guard: None },
                Flow { from: 0, to: 2, guard: None },
                Flow { from: 1, to: 3, guard: None },
                Flow { from: 2, to: 3, guard: None },
            ],
        )
        .expect("should validate");
        assert_eq!(def.task(3).unwrap().incoming_flows.len(), 2);
    }
}
