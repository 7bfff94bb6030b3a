//! Listing queries and paginated results.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::{Item, Priority, Status};

/// Default page number when the caller does not ask for one.
pub const DEFAULT_PAGE: u32 = 1;

/// Default page size when the caller does not ask for one.
pub const DEFAULT_LIMIT: u32 = 20;

/// Largest page size a caller may request.
pub const MAX_LIMIT: u32 = 100;

/// Field a listing is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Priority,
    DueDate,
    Status,
}

impl SortKey {
    /// Accepted wire names.
    pub const NAMES: [&'static str; 6] = [
        "created_at",
        "updated_at",
        "title",
        "priority",
        "due_date",
        "status",
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            "title" => Some(Self::Title),
            "priority" => Some(Self::Priority),
            "due_date" => Some(Self::DueDate),
            "status" => Some(Self::Status),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Title => "title",
            Self::Priority => "priority",
            Self::DueDate => "due_date",
            Self::Status => "status",
        }
    }

    fn compare(&self, a: &Item, b: &Item) -> Ordering {
        match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            Self::Title => a.title.cmp(&b.title),
            Self::Priority => a.priority.cmp(&b.priority),
            Self::DueDate => a.due_date.cmp(&b.due_date),
            Self::Status => a.status.cmp(&b.status),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub const NAMES: [&'static str; 2] = ["asc", "desc"];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A fully-resolved listing query. Request DTOs fill in defaults before
/// converting into this type.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub sort: SortKey,
    pub order: SortOrder,
    pub search: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub overdue: Option<bool>,
    pub completed: Option<bool>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            sort: SortKey::default(),
            order: SortOrder::default(),
            search: None,
            status: None,
            priority: None,
            overdue: None,
            completed: None,
        }
    }
}

impl ListQuery {
    fn accepts(&self, item: &Item, now: DateTime<Utc>) -> bool {
        if self.status.is_some_and(|s| item.status != s) {
            return false;
        }
        if self.priority.is_some_and(|p| item.priority != p) {
            return false;
        }
        if let Some(completed) = self.completed {
            if (item.status == Status::Completed) != completed {
                return false;
            }
        }
        if let Some(overdue) = self.overdue {
            if item.is_overdue(now) != overdue {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref() {
            if !item.matches_search(search) {
                return false;
            }
        }
        true
    }

    /// Filter, order and slice `items` into one page.
    pub fn apply(&self, items: impl IntoIterator<Item = Item>, now: DateTime<Utc>) -> Page<Item> {
        let mut matched: Vec<Item> = items
            .into_iter()
            .filter(|item| self.accepts(item, now))
            .collect();

        matched.sort_by(|a, b| {
            let ordering = self.sort.compare(a, b).then_with(|| a.id.cmp(&b.id));
            match self.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = matched.len() as u64;
        let page = self.page.max(1);
        let limit = self.limit.clamp(1, MAX_LIMIT);
        let offset = (page as usize - 1).saturating_mul(limit as usize);
        let data = matched.into_iter().skip(offset).take(limit as usize).collect();

        Page::new(data, page, limit, total)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit))
        };
        Self {
            data,
            page,
            limit,
            total,
            total_pages,
        }
    }
}
