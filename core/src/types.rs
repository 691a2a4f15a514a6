//! Wire types for the todo API.
//!
//! # Design
//! These types are shared by the server and the client so the JSON shape is
//! defined once. Field names follow the public contract (`_id`, `createdAt`,
//! `updatedAt`), which is why most structs carry serde renames.

use std::fmt;
use std::str::FromStr;

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Store-assigned identifier of a todo: a 12-byte ObjectId.
///
/// Serialized as 24 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TodoId([u8; 12]);

/// Returned when a string is not a valid 24-character hex ObjectId.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid todo id: {0:?}")]
pub struct InvalidTodoId(pub String);

impl TodoId {
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    pub fn parse(s: &str) -> Result<Self, InvalidTodoId> {
        ObjectId::parse_str(s)
            .map(|oid| Self(oid.bytes()))
            .map_err(|_| InvalidTodoId(s.to_string()))
    }
}

impl From<ObjectId> for TodoId {
    fn from(oid: ObjectId) -> Self {
        Self(oid.bytes())
    }
}

impl From<TodoId> for ObjectId {
    fn from(id: TodoId) -> Self {
        ObjectId::from_bytes(id.0)
    }
}

impl FromStr for TodoId {
    type Err = InvalidTodoId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&ObjectId::from_bytes(self.0).to_hex())
    }
}

impl Serialize for TodoId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TodoId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A single todo item as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TodoId>,
    pub completed: bool,
    pub body: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Todo {
    /// A not-yet-persisted todo: incomplete, stamped `created_at`, no id.
    pub fn new(body: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            completed: false,
            body,
            created_at,
            updated_at: None,
        }
    }
}

/// Request payload for creating a todo. A missing `body` reads as empty so it
/// is reported by validation rather than by the JSON parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTodo {
    #[serde(default)]
    pub body: String,
}

/// Request payload for `PATCH /api/todos/:id`.
///
/// `completed: None` means "not specified", which the server resolves to
/// `true`; `Some(false)` explicitly reopens a todo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTodo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl UpdateTodo {
    /// Parse a request body, treating an empty or malformed payload as one
    /// with `completed` unspecified.
    pub fn from_lenient_body(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        serde_json::from_slice(bytes).unwrap_or_default()
    }

    /// The value to store: the requested flag, or `true` when unspecified.
    pub fn completed_or_default(&self) -> bool {
        self.completed.unwrap_or(true)
    }
}

/// Body of the 200 response for update and delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    pub const OK: Success = Success { success: true };
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
