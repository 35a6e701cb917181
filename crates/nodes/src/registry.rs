//! Task-type registry — maps a `node_type` tag to a `NodeBehavior` factory.
//!
//! Populated at engine construction time and read-only thereafter (§4.1).
//! An unregistered tag falls back to [`BaseNode`], which preserves forward
//! compatibility with persisted instances whose plugin is no longer
//! registered (§9).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::base::BaseNode;
use crate::decision::DecisionNode;
use crate::service_task::ServiceTaskNode;
use crate::traits::{NodeBehavior, TaskView};

/// Constructs a fresh `NodeBehavior` for a task of a given type.
pub type NodeFactory = Arc<dyn Fn(&TaskView) -> Box<dyn NodeBehavior> + Send + Sync>;

/// The process-wide task-type → node-behavior mapping.
pub struct TaskTypeRegistry {
    factories: HashMap<String, NodeFactory>,
}

impl TaskTypeRegistry {
    /// A registry pre-populated with the two canonical built-ins:
    /// `service-task` and `decision`. `start-task`/`end-task` and any
    /// unrecognized tag fall back to the base pass-through node, so they
    /// never need an explicit entry.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("service-task", Arc::new(|_task: &TaskView| {
            Box::new(ServiceTaskNode::new()) as Box<dyn NodeBehavior>
        }));
        registry.register("decision", Arc::new(|_task: &TaskView| {
            Box::new(DecisionNode) as Box<dyn NodeBehavior>
        }));
        registry
    }

    /// Register (or replace) the factory for a task-type tag.
    pub fn register(&mut self, tag: impl Into<String>, factory: NodeFactory) {
        self.factories.insert(tag.into(), factory);
    }

    /// Construct the node behavior for `task`, falling back to `BaseNode`
    /// for any tag with no registered factory.
    pub fn create(&self, task: &TaskView) -> Box<dyn NodeBehavior> {
        match self.factories.get(&task.task_type) {
            Some(factory) => factory(task),
            None => {
                if task.task_type != "start-task" && task.task_type != "end-task" {
                    warn!(
                        task_type = %task.task_type,
                        task_id = task.id,
                        "no node behavior registered for task type, falling back to base node"
                    );
                }
                Box::new(BaseNode)
            }
        }
    }
}

impl Default for TaskTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(task_type: &str) -> TaskView {
        TaskView {
            id: 0,
            name: "t".into(),
            task_type: task_type.into(),
            config: serde_json::Value::Null,
        }
    }

    #[test]
    fn unknown_type_falls_back_to_base_node() {
        let registry = TaskTypeRegistry::new();
        // Can't downcast a trait object easily here; just assert it
        // constructs without panicking for an arbitrary unregistered tag.
        let _behavior = registry.create(&view("human-task"));
    }

    #[test]
    fn start_and_end_task_are_not_warned_about() {
        let registry = TaskTypeRegistry::new();
        let _ = registry.create(&view("start-task"));
        let _ = registry.create(&view("end-task"));
    }
}
