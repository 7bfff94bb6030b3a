//! Request types and validation for the item endpoints.
//!
//! Enumerated fields (`priority`, `status`, `sort`, `order`) bind as plain
//! strings so an unknown value is reported as a field violation rather than
//! a binding failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use modgate_lib::{
    ItemPatch, ListQuery, NewItem, Priority, SortKey, SortOrder, Status, DEFAULT_LIMIT,
    DEFAULT_PAGE, MAX_LIMIT,
};

use crate::bind::deserialize_flag;
use crate::validation::{Validate, ValidationError, Violations};

const TITLE_MAX: usize = 255;
const DESCRIPTION_MAX: usize = 1000;

fn check_description(v: &mut Violations, description: Option<&str>) {
    if let Some(description) = description {
        v.length(description, "description", 0, DESCRIPTION_MAX);
    }
}

fn check_priority(v: &mut Violations, priority: Option<&str>) {
    if let Some(priority) = priority {
        v.one_of(priority, "priority", &Priority::NAMES);
    }
}

fn check_status(v: &mut Violations, status: Option<&str>) {
    if let Some(status) = status {
        v.one_of(status, "status", &Status::NAMES);
    }
}

/// Body of `POST` on an item collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

impl Validate for CreateItemRequest {
    fn validate(&mut self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.length(&self.title, "title", 1, TITLE_MAX);
        check_description(&mut v, self.description.as_deref());
        check_priority(&mut v, self.priority.as_deref());
        v.finish()
    }
}

impl From<CreateItemRequest> for NewItem {
    fn from(req: CreateItemRequest) -> Self {
        NewItem {
            title: req.title,
            description: req.description,
            priority: req.priority.as_deref().and_then(Priority::parse),
            due_date: req.due_date,
        }
    }
}

/// Body of `PATCH` on an item; `id` comes from the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
}

impl Validate for UpdateItemRequest {
    fn validate(&mut self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        if let Some(title) = &self.title {
            v.length(title, "title", 1, TITLE_MAX);
        }
        check_description(&mut v, self.description.as_deref());
        check_status(&mut v, self.status.as_deref());
        check_priority(&mut v, self.priority.as_deref());
        v.finish()
    }
}

impl UpdateItemRequest {
    /// Split into the target id and the patch to apply.
    pub fn into_patch(self) -> (Uuid, ItemPatch) {
        let patch = ItemPatch {
            title: self.title,
            description: self.description,
            priority: self.priority.as_deref().and_then(Priority::parse),
            status: self.status.as_deref().and_then(Status::parse),
        };
        (self.id, patch)
    }
}

/// Path-only request addressing one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemIdRequest {
    pub id: Uuid,
}

impl Validate for ItemIdRequest {
    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::single("id", "required", "id is required"));
        }
        Ok(())
    }
}

/// Query of `GET` on an item collection.
///
/// Validation fills in the pagination defaults, so after a successful
/// `validate` every paging field is `Some`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListItemsRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub overdue: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub completed: Option<bool>,
}

impl Validate for ListItemsRequest {
    fn validate(&mut self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        if let Some(page) = self.page {
            v.require(page >= 1, "page", "min", "page must be at least 1");
        }
        if let Some(limit) = self.limit {
            v.range(limit, "limit", 1, MAX_LIMIT);
        }
        if let Some(sort) = &self.sort {
            v.one_of(sort, "sort", &SortKey::NAMES);
        }
        if let Some(order) = &self.order {
            v.one_of(order, "order", &SortOrder::NAMES);
        }
        if let Some(search) = &self.search {
            v.length(search, "search", 1, usize::MAX);
        }
        check_status(&mut v, self.status.as_deref());
        check_priority(&mut v, self.priority.as_deref());
        v.finish()?;

        self.page.get_or_insert(DEFAULT_PAGE);
        self.limit.get_or_insert(DEFAULT_LIMIT);
        self.sort
            .get_or_insert_with(|| SortKey::default().as_str().to_string());
        self.order
            .get_or_insert_with(|| SortOrder::default().as_str().to_string());
        Ok(())
    }
}

impl From<ListItemsRequest> for ListQuery {
    fn from(req: ListItemsRequest) -> Self {
        ListQuery {
            page: req.page.unwrap_or(DEFAULT_PAGE),
            limit: req.limit.unwrap_or(DEFAULT_LIMIT),
            sort: req
                .sort
                .as_deref()
                .and_then(SortKey::parse)
                .unwrap_or_default(),
            order: req
                .order
                .as_deref()
                .and_then(SortOrder::parse)
                .unwrap_or_default(),
            search: req.search,
            status: req.status.as_deref().and_then(Status::parse),
            priority: req.priority.as_deref().and_then(Priority::parse),
            overdue: req.overdue,
            completed: req.completed,
        }
    }
}

/// Body of `POST /api/users`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
}

impl Validate for CreateUserRequest {
    fn validate(&mut self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.length(&self.title, "title", 1, TITLE_MAX);
        check_description(&mut v, self.description.as_deref());
        v.finish()
    }
}

impl From<CreateUserRequest> for NewItem {
    fn from(req: CreateUserRequest) -> Self {
        NewItem {
            title: req.title,
            description: req.description,
            ..NewItem::default()
        }
    }
}

/// Body of `PATCH /api/users/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Validate for UpdateUserRequest {
    fn validate(&mut self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        if let Some(title) = &self.title {
            v.length(title, "title", 1, TITLE_MAX);
        }
        check_description(&mut v, self.description.as_deref());
        v.finish()
    }
}

impl UpdateUserRequest {
    pub fn into_patch(self) -> (Uuid, ItemPatch) {
        let patch = ItemPatch {
            title: self.title,
            description: self.description,
            ..ItemPatch::default()
        };
        (self.id, patch)
    }
}

/// Request with no inputs, for endpoints such as `/status`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EmptyRequest {}

impl Validate for EmptyRequest {
    fn validate(&mut self) -> Result<(), ValidationError> {
        Ok(())
    }
}
