//! Item services: the layer between HTTP handlers and repositories.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::Result;
use crate::item::{Item, ItemPatch, NewItem};
use crate::query::{ListQuery, Page};
use crate::repository::{ItemRepository, MemoryItemRepository};

/// CRUD operations for one kind of item, with business event logging.
///
/// Cheap to clone; all clones share the same repository.
#[derive(Clone)]
pub struct ItemService {
    repo: Arc<dyn ItemRepository>,
}

impl ItemService {
    pub fn new(repo: Arc<dyn ItemRepository>) -> Self {
        Self { repo }
    }

    /// Service over a fresh in-memory repository.
    pub fn in_memory(kind: &'static str) -> Self {
        Self::new(Arc::new(MemoryItemRepository::new(kind)))
    }

    pub fn kind(&self) -> &'static str {
        self.repo.kind()
    }

    pub fn create(&self, input: NewItem) -> Result<Item> {
        let item = Item::create(input, Utc::now());
        let item = self.repo.insert(item).inspect_err(|e| {
            error!(kind = self.kind(), error = %e, "failed to create item");
        })?;

        info!(
            event = "item_created",
            kind = self.kind(),
            item_id = %item.id,
            title = %item.title,
            priority = item.priority.as_str(),
            "item created"
        );
        Ok(item)
    }

    pub fn get(&self, id: Uuid) -> Result<Item> {
        self.repo.get(id).inspect_err(|e| {
            error!(kind = self.kind(), item_id = %id, error = %e, "failed to fetch item");
        })
    }

    pub fn list(&self, query: &ListQuery) -> Result<Page<Item>> {
        self.repo.list(query, Utc::now()).inspect_err(|e| {
            error!(kind = self.kind(), error = %e, "failed to list items");
        })
    }

    pub fn update(&self, id: Uuid, patch: ItemPatch) -> Result<Item> {
        let item = self.repo.update(id, patch, Utc::now()).inspect_err(|e| {
            error!(kind = self.kind(), item_id = %id, error = %e, "failed to update item");
        })?;

        info!(
            event = "item_updated",
            kind = self.kind(),
            item_id = %item.id,
            status = item.status.as_str(),
            priority = item.priority.as_str(),
            "item updated"
        );
        Ok(item)
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.repo.delete(id).inspect_err(|e| {
            error!(kind = self.kind(), item_id = %id, error = %e, "failed to delete item");
        })?;

        info!(event = "item_deleted", kind = self.kind(), item_id = %id, "item deleted");
        Ok(())
    }
}

impl std::fmt::Debug for ItemService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemService")
            .field("kind", &self.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Status;

    #[test]
    fn test_crud_flow() {
        let service = ItemService::in_memory("site");
        let created = service
            .create(NewItem {
                title: "Greenhouse".to_string(),
                ..NewItem::default()
            })
            .unwrap();

        assert_eq!(service.get(created.id).unwrap().title, "Greenhouse");

        let updated = service
            .update(
                created.id,
                ItemPatch {
                    status: Some(Status::Active),
                    ..ItemPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, Status::Active);

        assert_eq!(service.list(&ListQuery::default()).unwrap().total, 1);

        service.delete(created.id).unwrap();
        assert!(service.get(created.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_clones_share_storage() {
        let a = ItemService::in_memory("todo");
        let b = a.clone();
        let item = a
            .create(NewItem {
                title: "shared".to_string(),
                ..NewItem::default()
            })
            .unwrap();
        assert_eq!(b.get(item.id).unwrap(), item);
    }

    #[test]
    fn test_debug_shows_kind() {
        let service = ItemService::in_memory("user");
        assert!(format!("{:?}", service).contains("user"));
    }
}
