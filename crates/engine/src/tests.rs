//! End-to-end scenarios exercising token propagation, AND-joins, decision
//! gateways, async service-task suspension/resume, handler failure, and
//! live-pool eviction — run against the in-memory store so no database is
//! required.

use std::sync::{Arc, Mutex};

use nodes::mock::MockNode;
use nodes::{NodeBehavior, TaskTypeRegistry, Variables};
use serde_json::json;
use store::InMemoryCollection;

use crate::definition::{ProcessDefinition, TaskSpec};
use crate::engine::{Engine, EngineConfig};
use crate::instance::{EventSink, InstanceEvent, Status};
use crate::model::{Flow, InstanceId};

/// Records every event an instance emits, in order, for scenarios that
/// assert §8's exact `before`/`after`/`end` sequencing rather than just
/// final status.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<InstanceEvent>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn events(&self) -> Vec<InstanceEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn on_event(&self, _instance_id: InstanceId, event: &InstanceEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn task(name: &str, task_type: &str) -> TaskSpec {
    TaskSpec {
        name: name.into(),
        task_type: task_type.into(),
        config: json!({}),
    }
}

/// A registry with two extra test-only node kinds on top of the built-ins:
/// `mock-return`, which always succeeds with an empty variable patch, and
/// `mock-fail`, which always fails.
fn test_registry() -> TaskTypeRegistry {
    let mut registry = TaskTypeRegistry::new();
    registry.register(
        "mock-return",
        Arc::new(|_task| Box::new(MockNode::passthrough("mock-return")) as Box<dyn NodeBehavior>),
    );
    registry.register(
        "mock-fail",
        Arc::new(|_task| Box::new(MockNode::failing("mock-fail", "synthetic handler failure")) as Box<dyn NodeBehavior>),
    );
    registry
}

fn test_engine(config: EngineConfig) -> Engine {
    test_engine_with_sinks(config, Vec::new())
}

fn test_engine_with_sinks(config: EngineConfig, event_sinks: Vec<Arc<dyn EventSink>>) -> Engine {
    Engine::new(
        test_registry(),
        config,
        Arc::new(InMemoryCollection::new()),
        Arc::new(InMemoryCollection::new()),
        event_sinks,
    )
}

#[tokio::test]
async fn linear_three_task_pipeline_completes() {
    let sink = RecordingSink::new();
    let engine = test_engine_with_sinks(EngineConfig::default(), vec![sink.clone()]);
    let definition = Arc::new(
        ProcessDefinition::new(
            "linear",
            vec![task("a", "mock-return"), task("b", "mock-return"), task("c", "mock-return")],
            vec![
                Flow { from: 0, to: 1, guard: None },
                Flow { from: 1, to: 2, guard: None },
            ],
        )
        .unwrap(),
    );

    let instance_id = engine
        .create_process_instance(definition, Variables::new())
        .await
        .unwrap();

    let handle = engine.instance_handle(instance_id).unwrap();
    let instance = handle.lock().await;
    assert_eq!(instance.status(), Status::Completed);

    // §8 scenario 1: before(start), after(start), before(step), after(step),
    // before(end), after(end), end.
    assert_eq!(
        sink.events(),
        vec![
            InstanceEvent::Before { task_id: 0 },
            InstanceEvent::After { task_id: 0 },
            InstanceEvent::Before { task_id: 1 },
            InstanceEvent::After { task_id: 1 },
            InstanceEvent::Before { task_id: 2 },
            InstanceEvent::After { task_id: 2 },
            InstanceEvent::End,
        ]
    );
}

#[tokio::test]
async fn and_join_waits_for_both_branches() {
    let sink = RecordingSink::new();
    let engine = test_engine_with_sinks(EngineConfig::default(), vec![sink.clone()]);
    // a -> b, a -> c, b -> d, c -> d (diamond; d is an AND-join)
    let definition = Arc::new(
        ProcessDefinition::new(
            "diamond",
            vec![
                task("a", "mock-return"),
                task("b", "mock-return"),
                task("c", "mock-return"),
                task("d", "mock-return"),
            ],
            vec![
                Flow { from: 0, to: 1, guard: None },
                Flow { from: 0, to: 2, guard: None },
                Flow { from: 1, to: 3, guard: None },
                Flow { from: 2, to: 3, guard: None },
            ],
        )
        .unwrap(),
    );

    let instance_id = engine
        .create_process_instance(definition, Variables::new())
        .await
        .unwrap();

    let handle = engine.instance_handle(instance_id).unwrap();
    let instance = handle.lock().await;
    // d only runs once both b and c have completed; since both branches are
    // synchronous this run reaches Completed in one pass.
    assert_eq!(instance.status(), Status::Completed);

    // §8 scenario 2: before(a), after(a), before/after(b) and before/after(c)
    // in flow order, then exactly one before(d) after the second of b/c
    // completes, then after(d), end.
    assert_eq!(
        sink.events(),
        vec![
            InstanceEvent::Before { task_id: 0 },
            InstanceEvent::After { task_id: 0 },
            InstanceEvent::Before { task_id: 1 },
            InstanceEvent::After { task_id: 1 },
            InstanceEvent::Before { task_id: 2 },
            InstanceEvent::After { task_id: 2 },
            InstanceEvent::Before { task_id: 3 },
            InstanceEvent::After { task_id: 3 },
            InstanceEvent::End,
        ]
    );
}

#[tokio::test]
async fn service_task_suspends_and_resumes() {
    let sink = RecordingSink::new();
    let engine = test_engine_with_sinks(EngineConfig::default(), vec![sink.clone()]);
    let definition = Arc::new(
        ProcessDefinition::new(
            "async",
            vec![task("start", "mock-return"), task("work", "service-task"), task("end", "mock-return")],
            vec![
                Flow { from: 0, to: 1, guard: None },
                Flow { from: 1, to: 2, guard: None },
            ],
        )
        .unwrap(),
    );

    let instance_id = engine
        .create_process_instance(definition, Variables::new())
        .await
        .unwrap();

    {
        let handle = engine.instance_handle(instance_id).unwrap();
        let instance = handle.lock().await;
        assert_eq!(instance.status(), Status::Waiting);
        assert!(instance.is_pending(1));
    }

    // §8 scenario 3, pre-resume half: before(start), after(start),
    // before(svc) — no after(svc) yet, the node is suspended.
    assert_eq!(
        sink.events(),
        vec![
            InstanceEvent::Before { task_id: 0 },
            InstanceEvent::After { task_id: 0 },
            InstanceEvent::Before { task_id: 1 },
        ]
    );

    engine.complete_task(instance_id, 1, Ok(None)).await.unwrap();

    let handle = engine.instance_handle(instance_id).unwrap();
    let instance = handle.lock().await;
    assert_eq!(instance.status(), Status::Completed);
    assert!(!instance.is_pending(1));

    // §8 scenario 3, post-resume: after(svc), before(end), after(end), end.
    assert_eq!(
        sink.events(),
        vec![
            InstanceEvent::Before { task_id: 0 },
            InstanceEvent::After { task_id: 0 },
            InstanceEvent::Before { task_id: 1 },
            InstanceEvent::After { task_id: 1 },
            InstanceEvent::Before { task_id: 2 },
            InstanceEvent::After { task_id: 2 },
            InstanceEvent::End,
        ]
    );
}

#[tokio::test]
async fn duplicate_completion_of_a_service_task_is_rejected() {
    let engine = test_engine(EngineConfig::default());
    let definition = Arc::new(
        ProcessDefinition::new(
            "async",
            vec![task("work", "service-task")],
            vec![],
        )
        .unwrap(),
    );

    let instance_id = engine
        .create_process_instance(definition, Variables::new())
        .await
        .unwrap();

    engine.complete_task(instance_id, 0, Ok(None)).await.unwrap();
    let second = engine.complete_task(instance_id, 0, Ok(None)).await;
    assert!(matches!(second, Err(crate::error::EngineError::UnknownTask(0))));
}

#[tokio::test]
async fn decision_gateway_follows_only_matching_branch() {
    let sink = RecordingSink::new();
    let engine = test_engine_with_sinks(EngineConfig::default(), vec![sink.clone()]);
    // gateway -> high (x > 10), gateway -> low (x <= 10)
    let definition = Arc::new(
        ProcessDefinition::new(
            "decision",
            vec![task("gateway", "decision"), task("high", "mock-return"), task("low", "mock-return")],
            vec![
                Flow { from: 0, to: 1, guard: Some("x>10".into()) },
                Flow { from: 0, to: 2, guard: Some("x<=10".into()) },
            ],
        )
        .unwrap(),
    );

    let mut variables = Variables::new();
    variables.insert("x".into(), json!(42));

    let instance_id = engine.create_process_instance(definition, variables).await.unwrap();

    let handle = engine.instance_handle(instance_id).unwrap();
    let instance = handle.lock().await;
    assert_eq!(instance.status(), Status::Completed);

    // §8 scenario 4: before(gateway), after(gateway), before(high),
    // after(high), end. Node "low" never emits before — it's the one
    // non-matching branch.
    assert_eq!(
        sink.events(),
        vec![
            InstanceEvent::Before { task_id: 0 },
            InstanceEvent::After { task_id: 0 },
            InstanceEvent::Before { task_id: 1 },
            InstanceEvent::After { task_id: 1 },
            InstanceEvent::End,
        ]
    );
}

#[tokio::test]
async fn handler_failure_transitions_instance_to_failed() {
    let engine = test_engine(EngineConfig::default());
    let definition = Arc::new(
        ProcessDefinition::new(
            "fails",
            vec![task("ok", "mock-return"), task("boom", "mock-fail"), task("never", "mock-return")],
            vec![
                Flow { from: 0, to: 1, guard: None },
                Flow { from: 1, to: 2, guard: None },
            ],
        )
        .unwrap(),
    );

    let instance_id = engine
        .create_process_instance(definition, Variables::new())
        .await
        .unwrap();

    let handle = engine.instance_handle(instance_id).unwrap();
    let instance = handle.lock().await;
    assert_eq!(instance.status(), Status::Failed);
    assert!(instance.error().unwrap().contains("synthetic handler failure"));
}

#[tokio::test]
async fn cleared_instance_can_be_reloaded_from_its_persisted_document() {
    let engine = test_engine(EngineConfig::default());
    let definition = Arc::new(
        ProcessDefinition::new("async", vec![task("work", "service-task")], vec![]).unwrap(),
    );

    let instance_id = engine
        .create_process_instance(definition, Variables::new())
        .await
        .unwrap();

    let persistence_id = {
        let handle = engine.instance_handle(instance_id).unwrap();
        let instance = handle.lock().await;
        assert_eq!(instance.status(), Status::Waiting);
        instance.persistence_id().expect("instance should have been persisted")
    };

    engine.clear_pool().await;
    assert!(engine.instance_handle(instance_id).is_none());

    let reloaded_id = engine.load_process_instance(persistence_id).await.unwrap();
    // The reloaded instance keeps the same engine-scoped id it had before
    // being persisted (§3/§8 scenario 3), not a freshly minted one.
    assert_eq!(reloaded_id, instance_id);
    let handle = engine.instance_handle(reloaded_id).unwrap();
    let instance = handle.lock().await;
    assert_eq!(instance.status(), Status::Waiting);
    assert!(instance.is_pending(0));
}

#[tokio::test]
async fn complete_task_auto_loads_an_instance_not_in_the_live_pool() {
    let engine = test_engine(EngineConfig::default());
    let definition = Arc::new(
        ProcessDefinition::new(
            "async",
            vec![task("start", "mock-return"), task("work", "service-task"), task("end", "mock-return")],
            vec![
                Flow { from: 0, to: 1, guard: None },
                Flow { from: 1, to: 2, guard: None },
            ],
        )
        .unwrap(),
    );

    let instance_id = engine
        .create_process_instance(definition, Variables::new())
        .await
        .unwrap();

    // Simulate an engine restart: evict the live (now `Waiting`) instance
    // without touching its persisted document.
    engine.clear_pool().await;
    assert!(engine.instance_handle(instance_id).is_none());

    // `complete_task` must load it back from persistence by its
    // engine-scoped `id` rather than failing with `UnknownProcess`.
    engine.complete_task(instance_id, 1, Ok(None)).await.unwrap();

    let handle = engine.instance_handle(instance_id).unwrap();
    let instance = handle.lock().await;
    assert_eq!(instance.status(), Status::Completed);
}

#[tokio::test]
async fn clear_pool_evicts_waiting_and_completed_but_keeps_running_and_failed() {
    let engine = test_engine(EngineConfig::default());

    // Waiting: suspended on a service task.
    let waiting_def = Arc::new(
        ProcessDefinition::new("waiting", vec![task("work", "service-task")], vec![]).unwrap(),
    );
    let waiting_id = engine
        .create_process_instance(waiting_def, Variables::new())
        .await
        .unwrap();

    // Completed: a trivial linear pipeline finishes synchronously.
    let completed_def = Arc::new(
        ProcessDefinition::new("completed", vec![task("a", "mock-return")], vec![]).unwrap(),
    );
    let completed_id = engine
        .create_process_instance(completed_def, Variables::new())
        .await
        .unwrap();

    // Running: left with an empty pool and no end reached (a dead-end
    // decision branch with `stall_is_error: false`).
    let running_def = Arc::new(
        ProcessDefinition::new(
            "running",
            vec![task("gateway", "decision"), task("unreachable", "mock-return")],
            vec![Flow { from: 0, to: 1, guard: Some("x>10".into()) }],
        )
        .unwrap(),
    );
    let mut running_vars = Variables::new();
    running_vars.insert("x".into(), json!(1));
    let running_id = engine
        .create_process_instance(running_def, running_vars)
        .await
        .unwrap();

    // Failed: a handler reports an error.
    let failed_def = Arc::new(
        ProcessDefinition::new("failed", vec![task("boom", "mock-fail")], vec![]).unwrap(),
    );
    let failed_id = engine
        .create_process_instance(failed_def, Variables::new())
        .await
        .unwrap();

    engine.clear_pool().await;

    assert!(engine.instance_handle(waiting_id).is_none());
    assert!(engine.instance_handle(completed_id).is_none());
    assert!(engine.instance_handle(running_id).is_some());
    assert!(engine.instance_handle(failed_id).is_some());
}

#[tokio::test]
async fn stall_is_error_fails_instance_with_no_matching_branch() {
    let engine = test_engine(EngineConfig { stall_is_error: true });
    let definition = Arc::new(
        ProcessDefinition::new(
            "dead-end",
            vec![task("gateway", "decision"), task("unreachable", "mock-return")],
            vec![Flow { from: 0, to: 1, guard: Some("x>10".into()) }],
        )
        .unwrap(),
    );

    let mut variables = Variables::new();
    variables.insert("x".into(), json!(1));

    let instance_id = engine.create_process_instance(definition, variables).await.unwrap();

    let handle = engine.instance_handle(instance_id).unwrap();
    let instance = handle.lock().await;
    assert_eq!(instance.status(), Status::Failed);
    assert!(instance.error().unwrap().contains("stalled"));
}

#[tokio::test]
async fn stall_is_not_error_by_default() {
    let engine = test_engine(EngineConfig::default());
    let definition = Arc::new(
        ProcessDefinition::new(
            "dead-end",
            vec![task("gateway", "decision"), task("unreachable", "mock-return")],
            vec![Flow { from: 0, to: 1, guard: Some("x>10".into()) }],
        )
        .unwrap(),
    );

    let mut variables = Variables::new();
    variables.insert("x".into(), json!(1));

    let instance_id = engine.create_process_instance(definition, variables).await.unwrap();

    let handle = engine.instance_handle(instance_id).unwrap();
    let instance = handle.lock().await;
    assert_eq!(instance.status(), Status::Running);
}

#[tokio::test]
async fn unknown_process_is_reported() {
    let engine = test_engine(EngineConfig::default());
    let result = engine.complete_task(999, 0, Ok(None)).await;
    assert!(matches!(result, Err(crate::error::EngineError::UnknownProcess(999))));
}
