//! Plain persisted document shapes.
//!
//! These are *persistence* models — they carry no domain behaviour and no
//! dependency on the `engine` crate. `engine` converts to and from these
//! shapes at its own persistence boundary (`ProcessDefinition::to_document`,
//! `ProcessInstance::to_document`, and their `from_document` counterparts).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Identifies one persisted document. Assigned by the caller at insert time
/// (Mongo-`_id`-shaped, not a database-generated serial).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersistenceId(pub Uuid);

impl PersistenceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PersistenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PersistenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row shape backing every `PgCollection<T>` table: a generic `id`/`body`
/// pair with the document itself stored as JSONB, mirroring the teacher's
/// one-row-struct-per-table convention but generalized to a single schema
/// every document type shares.
#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    pub id: Uuid,
    pub body: Value,
}

// ---------------------------------------------------------------------------
// Process definition document
// ---------------------------------------------------------------------------

/// Persisted shape of a `ProcessDefinition`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionDocument {
    pub name: String,
    pub tasks: Vec<TaskDocument>,
    pub flows: Vec<FlowDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDocument {
    pub name: String,
    pub task_type: String,
    pub config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDocument {
    pub from: usize,
    pub to: usize,
    pub guard: Option<String>,
}

// ---------------------------------------------------------------------------
// Process instance document
// ---------------------------------------------------------------------------

/// Persisted shape of a `ProcessInstance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDocument {
    /// Engine-scoped instance id (§3), distinct from `PersistenceId` — the
    /// store-assigned identity of the document itself. Carried through
    /// persistence so a reload restores the *same* instance identity
    /// rather than minting a fresh one.
    pub id: u64,
    pub definition_ref: PersistenceId,
    pub status: String,
    pub variables: serde_json::Map<String, Value>,
    pub error: Option<String>,
    pub node_pool: HashMap<usize, NodeStateDocument>,
    pub incoming_counts: HashMap<usize, u32>,
    pub reached_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subtype-specific state for one suspended node (`NodeBehavior::serialize_state`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStateDocument {
    pub task_type: String,
    pub state: Value,
}
