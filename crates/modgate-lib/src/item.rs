//! Item records shared by every CRUD module.
//!
//! Sites, tasks, todos and users are all stored as [`Item`]s; the owning
//! module decides which fields its API exposes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Item priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Accepted wire names, in sort order.
    pub const NAMES: [&'static str; 3] = ["low", "medium", "high"];

    /// Parse a wire name; returns `None` for anything not in [`Self::NAMES`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Item lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Draft,
    Active,
    Completed,
    Archived,
}

impl Status {
    /// Accepted wire names, in sort order.
    pub const NAMES: [&'static str; 4] = ["draft", "active", "completed", "archived"];

    /// Parse a wire name; returns `None` for anything not in [`Self::NAMES`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }
}

/// A stored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: Priority,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Build a fresh item from creation input, stamped with `now`.
    pub fn create(input: NewItem, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            priority: input.priority.unwrap_or_default(),
            status: Status::default(),
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update. Returns `false` when the patch changes nothing.
    pub fn apply(&mut self, patch: ItemPatch, now: DateTime<Utc>) -> bool {
        if patch.is_empty() {
            return false;
        }
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = now;
        true
    }

    /// An item is overdue when its due date has passed and it is not completed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != Status::Completed && self.due_date.is_some_and(|due| due < now)
    }

    /// Case-insensitive substring match on title or description.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }
}

/// Input for creating an item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewItem {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.status.is_none()
    }
}
