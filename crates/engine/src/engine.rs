//! `Engine` — the live process-instance registry (§4.6).
//!
//! Holds the task-type registry, the two persistence collections, and a
//! concurrent map of currently-live instances. A `dashmap::DashMap` is used
//! rather than a `Mutex<HashMap<..>>` so that looking up or inserting
//! instance *A* never blocks a concurrent lookup of instance *B* — "each
//! instance is independent" only holds if the registry itself doesn't
//! serialize unrelated instances behind one lock. Per-instance propagation
//! is still serialized, via the `tokio::sync::Mutex` wrapping each instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use nodes::{NodeError, TaskTypeRegistry, Variables};
use store::Collection;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::definition::ProcessDefinition;
use crate::error::EngineError;
use crate::instance::{EventSink, ProcessInstance, Status};
use crate::model::{InstanceId, TaskId};

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether a branch that dies without reaching an end task (e.g. a
    /// decision gateway with zero matching flows leaves no other node
    /// live) transitions the instance to `Failed` rather than leaving it
    /// `Running` with an empty node pool (§9).
    pub stall_is_error: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { stall_is_error: false }
    }
}

type InstanceHandle = Arc<Mutex<ProcessInstance>>;

/// The engine-level live instance registry and execution entry point.
pub struct Engine {
    registry: TaskTypeRegistry,
    config: EngineConfig,
    definitions: Arc<dyn Collection<store::DefinitionDocument>>,
    instances_store: Arc<dyn Collection<store::InstanceDocument>>,
    live: DashMap<InstanceId, InstanceHandle>,
    next_instance_id: AtomicU64,
    event_sinks: Vec<Arc<dyn EventSink>>,
}

impl Engine {
    pub fn new(
        registry: TaskTypeRegistry,
        config: EngineConfig,
        definitions: Arc<dyn Collection<store::DefinitionDocument>>,
        instances_store: Arc<dyn Collection<store::InstanceDocument>>,
        event_sinks: Vec<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            registry,
            config,
            definitions,
            instances_store,
            live: DashMap::new(),
            next_instance_id: AtomicU64::new(1),
            event_sinks,
        }
    }

    /// Start a new process instance from `definition` and run it until it
    /// either completes, fails, or suspends on a service task. Persists the
    /// definition the first time it's used, and the instance after its
    /// initial run.
    #[instrument(skip(self, definition, variables))]
    pub async fn create_process_instance(
        &self,
        definition: Arc<ProcessDefinition>,
        variables: Variables,
    ) -> Result<InstanceId, EngineError> {
        if definition.persistence_id().is_none() {
            let id = store::PersistenceId::new();
            self.definitions.insert(id, &definition.to_document()).await?;
            definition.set_persistence_id(id);
        }

        let instance_id = self.next_instance_id.fetch_add(1, Ordering::Relaxed);
        let mut instance = ProcessInstance::new(
            instance_id,
            definition,
            variables,
            self.config.stall_is_error,
            self.event_sinks.clone(),
        );
        instance.start(&self.registry).await?;
        self.persist(&mut instance).await?;

        self.live.insert(instance_id, Arc::new(Mutex::new(instance)));
        Ok(instance_id)
    }

    /// Deliver an external completion to a suspended service task and
    /// propagate from there. Per §4.6, an instance absent from the live pool
    /// (e.g. after an engine restart) is loaded from persistence first,
    /// keyed by its engine-scoped `id` rather than requiring the caller to
    /// already know its `persistenceId`.
    #[instrument(skip(self, result))]
    pub async fn complete_task(
        &self,
        instance_id: InstanceId,
        task_id: TaskId,
        result: Result<Option<Variables>, NodeError>,
    ) -> Result<(), EngineError> {
        let handle = self.instance_handle_or_load(instance_id).await?;

        let mut instance = handle.lock().await;
        instance.complete_task(&self.registry, task_id, result).await?;
        self.persist(&mut instance).await?;
        Ok(())
    }

    /// Reload a previously persisted instance into the live registry,
    /// restoring any suspended nodes via the task-type registry. The
    /// instance keeps the same engine-scoped `id` it had before being
    /// persisted (read from the document itself, §3/§6), not a freshly
    /// minted one.
    #[instrument(skip(self))]
    pub async fn load_process_instance(
        &self,
        persistence_id: store::PersistenceId,
    ) -> Result<InstanceId, EngineError> {
        let doc = self
            .instances_store
            .get(persistence_id)
            .await?
            .ok_or(store::StoreError::NotFound)?;
        let (instance_id, _handle) = self.rehydrate(persistence_id, doc).await?;
        Ok(instance_id)
    }

    /// A live-pool instance handle, loading it from persistence first if
    /// it's not already live. The persisted document is looked up by its
    /// embedded engine-scoped `id` field (a top-level-equality `Filter`,
    /// per §6's "MongoDB-ish" store contract) rather than `persistenceId`,
    /// since the caller here only ever knows the former.
    async fn instance_handle_or_load(&self, instance_id: InstanceId) -> Result<InstanceHandle, EngineError> {
        if let Some(entry) = self.live.get(&instance_id) {
            return Ok(entry.clone());
        }

        let mut filter = store::Filter::new();
        filter.insert("id".to_string(), serde_json::json!(instance_id));
        let (persistence_id, doc) = self
            .instances_store
            .find_one(&filter)
            .await?
            .ok_or(EngineError::UnknownProcess(instance_id))?;

        let (_, handle) = self.rehydrate(persistence_id, doc).await?;
        Ok(handle)
    }

    /// Shared reconstruction path for a persisted instance document: loads
    /// its definition, rebuilds the `ProcessInstance` (preserving its
    /// original `id`), and inserts it into the live pool.
    async fn rehydrate(
        &self,
        persistence_id: store::PersistenceId,
        doc: store::InstanceDocument,
    ) -> Result<(InstanceId, InstanceHandle), EngineError> {
        let def_doc = self
            .definitions
            .get(doc.definition_ref)
            .await?
            .ok_or(store::StoreError::NotFound)?;

        let definition = Arc::new(ProcessDefinition::from_document(def_doc)?);
        definition.set_persistence_id(doc.definition_ref);

        let instance = ProcessInstance::from_document(
            persistence_id,
            doc,
            definition,
            &self.registry,
            self.config.stall_is_error,
            self.event_sinks.clone(),
        );

        let instance_id = instance.id();
        let handle: InstanceHandle = Arc::new(Mutex::new(instance));
        self.live.insert(instance_id, handle.clone());
        Ok((instance_id, handle))
    }

    /// Fetch persisted instance documents matching `filter`, without
    /// requiring them to be live.
    pub async fn query_process_instances(
        &self,
        filter: &store::Filter,
    ) -> Result<Vec<(store::PersistenceId, store::InstanceDocument)>, EngineError> {
        Ok(self.instances_store.find(filter).await?)
    }

    /// A handle to a live instance, for direct inspection (status,
    /// variables) or a second concurrent operation against it.
    pub fn instance_handle(&self, instance_id: InstanceId) -> Option<InstanceHandle> {
        self.live.get(&instance_id).map(|entry| entry.clone())
    }

    /// Evict every live instance that is `Waiting` or `Completed`, without
    /// touching their persisted documents (a later `load_process_instance`
    /// brings a `Waiting` one back). `Running` and `Failed` instances are
    /// retained (§4.6) — a running instance is mid-propagation and a failed
    /// one is kept live for inspection.
    #[instrument(skip(self))]
    pub async fn clear_pool(&self) {
        let mut evict = Vec::new();
        for entry in self.live.iter() {
            let instance = entry.value().lock().await;
            if matches!(instance.status(), Status::Waiting | Status::Completed) {
                evict.push(*entry.key());
            }
        }
        for instance_id in evict {
            self.live.remove(&instance_id);
        }
    }

    async fn persist(&self, instance: &mut ProcessInstance) -> Result<(), EngineError> {
        match instance.persistence_id() {
            Some(id) => {
                let doc = instance.to_document();
                self.instances_store.update(id, &doc).await?;
            }
            None => {
                let doc = instance.to_document();
                let id = store::PersistenceId::new();
                self.instances_store.insert(id, &doc).await?;
                instance.set_persistence_id(id);
            }
        }
        Ok(())
    }
}
