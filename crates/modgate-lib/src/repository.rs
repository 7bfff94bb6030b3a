//! Item storage.
//!
//! Persistence is behind [`ItemRepository`] so the service layer never sees
//! how items are kept. [`MemoryItemRepository`] is the only backend shipped.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::item::{Item, ItemPatch};
use crate::query::{ListQuery, Page};

/// Storage operations for one kind of item.
pub trait ItemRepository: Send + Sync {
    /// Kind name used in errors and logs (e.g. `"site"`).
    fn kind(&self) -> &'static str;

    fn insert(&self, item: Item) -> Result<Item>;

    fn get(&self, id: Uuid) -> Result<Item>;

    fn list(&self, query: &ListQuery, now: DateTime<Utc>) -> Result<Page<Item>>;

    fn update(&self, id: Uuid, patch: ItemPatch, now: DateTime<Utc>) -> Result<Item>;

    fn delete(&self, id: Uuid) -> Result<()>;
}

/// In-process repository backed by a `HashMap`.
#[derive(Debug)]
pub struct MemoryItemRepository {
    kind: &'static str,
    items: RwLock<HashMap<Uuid, Item>>,
}

impl MemoryItemRepository {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            items: RwLock::new(HashMap::new()),
        }
    }

    fn poisoned(&self) -> Error {
        Error::storage(format!("{} store lock poisoned", self.kind))
    }
}

impl ItemRepository for MemoryItemRepository {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn insert(&self, item: Item) -> Result<Item> {
        let mut items = self.items.write().map_err(|_| self.poisoned())?;
        if items.contains_key(&item.id) {
            return Err(Error::Conflict {
                kind: self.kind,
                id: item.id,
            });
        }
        items.insert(item.id, item.clone());
        Ok(item)
    }

    fn get(&self, id: Uuid) -> Result<Item> {
        let items = self.items.read().map_err(|_| self.poisoned())?;
        items.get(&id).cloned().ok_or(Error::NotFound {
            kind: self.kind,
            id,
        })
    }

    fn list(&self, query: &ListQuery, now: DateTime<Utc>) -> Result<Page<Item>> {
        let items = self.items.read().map_err(|_| self.poisoned())?;
        Ok(query.apply(items.values().cloned(), now))
    }

    fn update(&self, id: Uuid, patch: ItemPatch, now: DateTime<Utc>) -> Result<Item> {
        let mut items = self.items.write().map_err(|_| self.poisoned())?;
        let item = items.get_mut(&id).ok_or(Error::NotFound {
            kind: self.kind,
            id,
        })?;
        if !item.apply(patch, now) {
            return Err(Error::EmptyUpdate {
                kind: self.kind,
                id,
            });
        }
        Ok(item.clone())
    }

    fn delete(&self, id: Uuid) -> Result<()> {
        let mut items = self.items.write().map_err(|_| self.poisoned())?;
        items.remove(&id).map(|_| ()).ok_or(Error::NotFound {
            kind: self.kind,
            id,
        })
    }
}
