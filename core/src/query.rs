//! List query parameters and their resolution into a filter and sort.
//!
//! # Design
//! `ListTodosQuery` keeps the raw strings exactly as they arrived so that
//! unknown values can fall back to defaults instead of failing extraction.
//! `ListTodosQuery::resolve` is the single place those fallbacks live; stores
//! only ever see the typed `TodoFilter` and `TodoSort`.
//!
//! Search text is matched literally: metacharacters are escaped before the
//! text is used as a pattern, the same as for the duplicate-body check.

use serde::{Deserialize, Serialize};

/// Query string of `GET /api/todos`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTodosQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "sortBy", default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

impl ListTodosQuery {
    /// Build from decoded `key=value` pairs. When a key repeats, the first
    /// value wins; unknown keys are ignored.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "search" => &mut query.search,
                "status" => &mut query.status,
                "sortBy" => &mut query.sort_by,
                "order" => &mut query.order,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn status(mut self, status: StatusFilter) -> Self {
        self.status = Some(status.as_str().to_string());
        self
    }

    pub fn sort_by(mut self, field: SortField) -> Self {
        self.sort_by = Some(field.as_str().to_string());
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = Some(order.as_str().to_string());
        self
    }

    /// Apply defaults and fallbacks, producing what the store executes.
    pub fn resolve(&self) -> (TodoFilter, TodoSort) {
        let status = self
            .status
            .as_deref()
            .map(StatusFilter::parse)
            .unwrap_or_default();
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let filter = TodoFilter {
            completed: status.completed(),
            search,
        };
        let sort = TodoSort {
            field: self.sort_by.as_deref().map(SortField::parse).unwrap_or_default(),
            order: self.order.as_deref().map(SortOrder::parse).unwrap_or_default(),
        };
        (filter, sort)
    }
}

/// The `status` parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    Active,
}

impl StatusFilter {
    /// Case-insensitive; anything unrecognized is `All`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "completed" => StatusFilter::Completed,
            "active" => StatusFilter::Active,
            _ => StatusFilter::All,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Completed => "completed",
            StatusFilter::Active => "active",
        }
    }

    /// Required value of `completed`, if the status constrains it.
    pub fn completed(self) -> Option<bool> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Completed => Some(true),
            StatusFilter::Active => Some(false),
        }
    }
}

/// The `sortBy` parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    Body,
    Completed,
}

impl SortField {
    /// Case-insensitive; anything unrecognized is `CreatedAt`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "body" => SortField::Body,
            "completed" => SortField::Completed,
            _ => SortField::CreatedAt,
        }
    }

    /// Field name as stored and as sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::Body => "body",
            SortField::Completed => "completed",
        }
    }
}

/// The `order` parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Only `asc` (any case) is ascending.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Resolved filter. `None` fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoFilter {
    pub completed: Option<bool>,
    /// Trimmed, non-empty search text.
    pub search: Option<String>,
}

impl TodoFilter {
    /// Unanchored pattern for the case-insensitive substring search.
    pub fn search_pattern(&self) -> Option<String> {
        self.search.as_deref().map(regex::escape)
    }
}

/// Resolved sort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TodoSort {
    pub field: SortField,
    pub order: SortOrder,
}

/// Anchored pattern matching `body` exactly; used case-insensitively to
/// detect duplicates.
pub fn exact_body_pattern(body: &str) -> String {
    format!("^{}$", regex::escape(body))
}
