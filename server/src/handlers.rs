use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, SubsecRound, Utc};
use todo_core::{
    normalize_body, CreateTodo, ListTodosQuery, Success, Todo, TodoId, UpdateTodo,
};

use crate::error::{AppError, AppResult};
use crate::store::{MemoryStore, StoreError, TodoStore};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared by every handler: the injected store and the per-call deadline.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn TodoStore>,
    store_timeout: Duration,
}

impl AppState {
    pub fn new(store: Arc<dyn TodoStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_STORE_TIMEOUT)
    }

    /// Run one store call under the configured deadline.
    async fn timed<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }
}

/// Stored timestamps keep millisecond precision, so responses do too.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn parse_id(raw: Result<Path<String>, PathRejection>) -> AppResult<TodoId> {
    let Path(raw) = raw.map_err(|_| AppError::InvalidId)?;
    TodoId::parse(&raw).map_err(|_| AppError::InvalidId)
}

pub async fn list_todos(
    State(state): State<AppState>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> AppResult<Json<Vec<Todo>>> {
    let query = match pairs {
        Ok(Query(pairs)) => ListTodosQuery::from_pairs(pairs),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "unreadable query string; listing with defaults");
            ListTodosQuery::default()
        }
    };
    let (filter, sort) = query.resolve();
    let todos = state.timed(state.store.list(&filter, sort)).await?;
    tracing::debug!(count = todos.len(), ?filter, ?sort, "listed todos");
    Ok(Json(todos))
}

pub async fn create_todo(
    State(state): State<AppState>,
    payload: Result<Json<CreateTodo>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Todo>)> {
    let Json(input) = payload.map_err(|_| AppError::InvalidPayload)?;
    let body = normalize_body(&input.body)?;

    match state.timed(state.store.body_exists(body)).await {
        Ok(true) => return Err(AppError::DuplicateBody),
        Ok(false) => {}
        Err(err) => tracing::warn!(error = %err, "duplicate check failed; inserting anyway"),
    }

    let mut todo = Todo::new(body.to_string(), now());
    let id = state.timed(state.store.insert(&todo)).await?;
    todo.id = Some(id);
    tracing::info!(%id, "created todo");
    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn update_todo(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Bytes, BytesRejection>,
) -> AppResult<Json<Success>> {
    let id = parse_id(id)?;
    // An unreadable body, e.g. one over the size limit, counts as absent.
    let payload = payload.unwrap_or_default();
    let completed = UpdateTodo::from_lenient_body(&payload).completed_or_default();
    state
        .timed(state.store.set_completed(id, completed, now()))
        .await?;
    tracing::info!(%id, completed, "updated todo");
    Ok(Json(Success::OK))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> AppResult<Json<Success>> {
    let id = parse_id(id)?;
    state.timed(state.store.delete(id)).await?;
    tracing::info!(%id, "deleted todo");
    Ok(Json(Success::OK))
}
