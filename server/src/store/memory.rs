use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use tokio::sync::RwLock;
use todo_core::query::exact_body_pattern;
use todo_core::{SortField, SortOrder, Todo, TodoFilter, TodoId, TodoSort};

use super::{StoreError, TodoStore};

/// Process-local store for tests and `TODO_STORE=memory` runs.
///
/// Ids are freshly generated ObjectIds, so map order is insertion order and
/// ties in a sort keep it. Search and duplicate checks go through the same
/// escaped, case-insensitive patterns the MongoDB store sends to the server.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    todos: Arc<RwLock<BTreeMap<TodoId, Todo>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn case_insensitive(pattern: &str) -> Result<Regex, StoreError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| StoreError::Backend(e.to_string()))
}

fn compare(a: &Todo, b: &Todo, field: SortField) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Body => a.body.cmp(&b.body),
        SortField::Completed => a.completed.cmp(&b.completed),
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn list(&self, filter: &TodoFilter, sort: TodoSort) -> Result<Vec<Todo>, StoreError> {
        let search = filter
            .search_pattern()
            .map(|p| case_insensitive(&p))
            .transpose()?;
        let todos = self.todos.read().await;
        let mut matched: Vec<Todo> = todos
            .values()
            .filter(|t| filter.completed.map_or(true, |c| t.completed == c))
            .filter(|t| search.as_ref().map_or(true, |re| re.is_match(&t.body)))
            .cloned()
            .collect();
        drop(todos);

        matched.sort_by(|a, b| match sort.order {
            SortOrder::Asc => compare(a, b, sort.field),
            SortOrder::Desc => compare(b, a, sort.field),
        });
        Ok(matched)
    }

    async fn body_exists(&self, body: &str) -> Result<bool, StoreError> {
        let re = case_insensitive(&exact_body_pattern(body))?;
        let todos = self.todos.read().await;
        Ok(todos.values().any(|t| re.is_match(&t.body)))
    }

    async fn insert(&self, todo: &Todo) -> Result<TodoId, StoreError> {
        let re = case_insensitive(&exact_body_pattern(&todo.body))?;
        let mut todos = self.todos.write().await;
        if todos.values().any(|t| re.is_match(&t.body)) {
            return Err(StoreError::DuplicateBody);
        }
        let id = TodoId::from(ObjectId::new());
        let stored = Todo {
            id: Some(id),
            ..todo.clone()
        };
        todos.insert(id, stored);
        Ok(id)
    }

    async fn set_completed(
        &self,
        id: TodoId,
        completed: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(todo) = self.todos.write().await.get_mut(&id) {
            todo.completed = completed;
            todo.updated_at = Some(updated_at);
        }
        Ok(())
    }

    async fn delete(&self, id: TodoId) -> Result<(), StoreError> {
        self.todos.write().await.remove(&id);
        Ok(())
    }
}
