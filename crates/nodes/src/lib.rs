//! `nodes` crate — the `NodeBehavior` trait and built-in task-type plugins.
//!
//! Every task type — built-in and custom alike — implements [`NodeBehavior`].
//! The engine crate dispatches execution through this trait object and holds
//! one per live node in a process instance's node pool.

pub mod base;
pub mod decision;
pub mod error;
pub mod mock;
pub mod registry;
pub mod service_task;
pub mod traits;

pub use base::BaseNode;
pub use decision::DecisionNode;
pub use error::NodeError;
pub use registry::{NodeFactory, TaskTypeRegistry};
pub use service_task::ServiceTaskNode;
pub use traits::{ExecutionContext, ExecutionOutcome, FlowGuard, NodeBehavior, TaskView, Variables};
