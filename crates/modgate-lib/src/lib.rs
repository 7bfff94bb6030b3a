//! modgate library entry points.
//!
//! This crate holds the domain side of the CRUD modules: the [`Item`]
//! record, listing queries with pagination, the repository abstraction and
//! the [`ItemService`] that HTTP handlers call into. Nothing here knows about
//! HTTP; the service crates translate requests and errors.

#![deny(warnings)]

pub mod error;
pub mod item;
pub mod query;
pub mod repository;
pub mod service;

pub use error::{Error, Result};
pub use item::{Item, ItemPatch, NewItem, Priority, Status};
pub use query::{ListQuery, Page, SortKey, SortOrder, DEFAULT_LIMIT, DEFAULT_PAGE, MAX_LIMIT};
pub use repository::{ItemRepository, MemoryItemRepository};
pub use service::ItemService;
