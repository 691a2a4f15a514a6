use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{Collation, CollationStrength, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use todo_core::query::exact_body_pattern;
use todo_core::{SortOrder, Todo, TodoFilter, TodoId, TodoSort};

use super::{StoreError, TodoStore};

const COLLECTION: &str = "todos";
const DUPLICATE_KEY: i32 = 11000;

/// Stored shape of a todo. Timestamps are native BSON dates so sorting by
/// `createdAt` is chronological.
#[derive(Debug, Serialize, Deserialize)]
struct TodoDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    completed: bool,
    body: String,
    #[serde(rename = "createdAt")]
    created_at: bson::DateTime,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<bson::DateTime>,
}

impl From<&Todo> for TodoDocument {
    fn from(todo: &Todo) -> Self {
        Self {
            id: None,
            completed: todo.completed,
            body: todo.body.clone(),
            created_at: bson::DateTime::from_chrono(todo.created_at),
            updated_at: todo.updated_at.map(bson::DateTime::from_chrono),
        }
    }
}

impl From<TodoDocument> for Todo {
    fn from(doc: TodoDocument) -> Self {
        Self {
            id: doc.id.map(TodoId::from),
            completed: doc.completed,
            body: doc.body,
            created_at: doc.created_at.to_chrono(),
            updated_at: doc.updated_at.map(|d| d.to_chrono()),
        }
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY => {
                StoreError::DuplicateBody
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

fn case_insensitive(pattern: String) -> Document {
    doc! { "$regex": pattern, "$options": "i" }
}

fn filter_document(filter: &TodoFilter) -> Document {
    let mut query = Document::new();
    if let Some(completed) = filter.completed {
        query.insert("completed", completed);
    }
    if let Some(pattern) = filter.search_pattern() {
        query.insert("body", case_insensitive(pattern));
    }
    query
}

fn sort_document(sort: TodoSort) -> Document {
    let direction = match sort.order {
        SortOrder::Asc => 1,
        SortOrder::Desc => -1,
    };
    let mut order = Document::new();
    order.insert(sort.field.as_str(), direction);
    order
}

/// `TodoStore` backed by a MongoDB collection.
///
/// The collection handle shares the driver's connection pool.
#[derive(Debug)]
pub struct MongoStore {
    todos: Collection<TodoDocument>,
}

impl MongoStore {
    /// Connect, verify the deployment answers a ping, and make sure the
    /// duplicate-body index exists.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        client.database("admin").run_command(doc! { "ping": 1 }).await?;
        tracing::info!(database, "connected to MongoDB");

        let store = Self {
            todos: client.database(database).collection(COLLECTION),
        };
        if let Err(err) = store.ensure_unique_body_index().await {
            tracing::warn!(error = %err, "could not create unique body index; duplicate check is best-effort");
        }
        Ok(store)
    }

    /// Unique index on `body` under a strength-2 collation, which compares
    /// case-insensitively. This closes the check-then-insert race in create.
    async fn ensure_unique_body_index(&self) -> Result<(), StoreError> {
        let collation = Collation::builder()
            .locale("en".to_string())
            .strength(CollationStrength::Secondary)
            .build();
        let options = IndexOptions::builder().unique(true).collation(collation).build();
        let index = IndexModel::builder()
            .keys(doc! { "body": 1 })
            .options(options)
            .build();
        self.todos.create_index(index).await?;
        Ok(())
    }
}

#[async_trait]
impl TodoStore for MongoStore {
    async fn list(&self, filter: &TodoFilter, sort: TodoSort) -> Result<Vec<Todo>, StoreError> {
        let cursor = self
            .todos
            .find(filter_document(filter))
            .sort(sort_document(sort))
            .await?;
        let docs: Vec<TodoDocument> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(Todo::from).collect())
    }

    async fn body_exists(&self, body: &str) -> Result<bool, StoreError> {
        let count = self
            .todos
            .count_documents(doc! { "body": case_insensitive(exact_body_pattern(body)) })
            .await?;
        Ok(count > 0)
    }

    async fn insert(&self, todo: &Todo) -> Result<TodoId, StoreError> {
        let result = self.todos.insert_one(TodoDocument::from(todo)).await?;
        result
            .inserted_id
            .as_object_id()
            .map(TodoId::from)
            .ok_or_else(|| StoreError::Backend("inserted id is not an ObjectId".to_string()))
    }

    async fn set_completed(
        &self,
        id: TodoId,
        completed: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let update = doc! {
            "$set": {
                "completed": completed,
                "updatedAt": bson::DateTime::from_chrono(updated_at),
            }
        };
        self.todos
            .update_one(doc! { "_id": ObjectId::from(id) }, update)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: TodoId) -> Result<(), StoreError> {
        self.todos.delete_one(doc! { "_id": ObjectId::from(id) }).await?;
        Ok(())
    }
}
