//! Persistence seam for todos.
//!
//! # Design
//! Handlers only see `dyn TodoStore`, injected through `AppState`, so tests
//! run against `MemoryStore` and production against MongoDB without the
//! handlers knowing which. Every operation is a single store round-trip.

mod memory;
#[cfg(feature = "mongo")]
mod mongo;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use todo_core::{Todo, TodoFilter, TodoId, TodoSort};

use crate::config::StoreConfig;

pub use memory::MemoryStore;
#[cfg(feature = "mongo")]
pub use mongo::MongoStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Any failure reported by the backend; the text is surfaced to clients.
    #[error("{0}")]
    Backend(String),

    /// The insert collided with an existing body under case-insensitive
    /// comparison.
    #[error("duplicate todo body")]
    DuplicateBody,

    #[error("store operation timed out")]
    Timeout,
}

#[async_trait]
pub trait TodoStore: Send + Sync {
    /// All todos matching `filter`, ordered by `sort`.
    async fn list(&self, filter: &TodoFilter, sort: TodoSort) -> Result<Vec<Todo>, StoreError>;

    /// Whether a todo whose body equals `body` ignoring case exists.
    async fn body_exists(&self, body: &str) -> Result<bool, StoreError>;

    /// Persist `todo` (whose `id` is ignored) and return the assigned id.
    async fn insert(&self, todo: &Todo) -> Result<TodoId, StoreError>;

    /// Set `completed` and `updatedAt`. Unknown ids are a no-op.
    async fn set_completed(
        &self,
        id: TodoId,
        completed: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Remove the todo. Unknown ids are a no-op.
    async fn delete(&self, id: TodoId) -> Result<(), StoreError>;
}

/// Construct the store named by the configuration. Connection failures here
/// abort startup.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn TodoStore>, StoreError> {
    match config {
        StoreConfig::Memory => {
            tracing::warn!("using in-memory store; todos are lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "mongo")]
        StoreConfig::Mongo { uri, database } => Ok(Arc::new(MongoStore::connect(uri, database).await?)),
        #[cfg(not(feature = "mongo"))]
        StoreConfig::Mongo { .. } => Err(StoreError::Backend(
            "built without MongoDB support; set TODO_STORE=memory".to_string(),
        )),
    }
}
