//! Shared core of the todo service.
//!
//! # Overview
//! - `types`: the JSON wire types (`Todo`, payloads, response envelopes).
//! - `validation`: body rules applied on create.
//! - `query`: list parameters and their resolution into filter and sort.
//! - `client`: a synchronous client that builds `HttpRequest` values and
//!   parses `HttpResponse` values without touching the network.
//!
//! The server crate depends on this one for its types and rules, so the
//! client and server cannot drift apart on the wire format.

pub mod client;
pub mod error;
pub mod http;
pub mod query;
pub mod types;
pub mod validation;

pub use client::TodoClient;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use query::{ListTodosQuery, SortField, SortOrder, StatusFilter, TodoFilter, TodoSort};
pub use types::{CreateTodo, ErrorBody, InvalidTodoId, Success, Todo, TodoId, UpdateTodo};
pub use validation::{normalize_body, ValidationError, MAX_BODY_CHARS};
