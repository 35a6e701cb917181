//! `store` crate — pure persistence layer.
//!
//! Provides the [`Collection`] contract, the plain document shapes the
//! `engine` crate persists its process definitions and instances as, an
//! in-memory reference implementation, and a Postgres/JSONB-backed one. No
//! business logic lives here — `engine` owns the domain types and converts
//! to/from these documents at its own persistence boundary.

pub mod collection;
pub mod error;
pub mod memory;
pub mod models;
pub mod pool;
pub mod postgres;

pub use collection::{Collection, Filter};
pub use error::StoreError;
pub use memory::InMemoryCollection;
pub use models::{DefinitionDocument, DocumentRow, FlowDocument, InstanceDocument, NodeStateDocument, PersistenceId, TaskDocument};
pub use pool::{create_pool, run_migrations, DbPool};
pub use postgres::PgCollection;
