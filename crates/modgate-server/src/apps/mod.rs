//! CRUD modules mounted behind the gateway.
//!
//! Every module exposes `GET /status` plus one or more item collections.
//! A collection answers:
//!
//! | Method   | Path    | Status |
//! |----------|---------|--------|
//! | `POST`   | `/`     | 201    |
//! | `GET`    | `/`     | 200    |
//! | `GET`    | `/{id}` | 200    |
//! | `PATCH`  | `/{id}` | 200    |
//! | `DELETE` | `/{id}` | 204    |

pub mod agrifolio;
pub mod task;
pub mod todo;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;

use modgate_lib::{Error, Item, ItemService, Page};
use modgate_service_shared::{
    Call, CreateItemRequest, EmptyRequest, ItemIdRequest, ListItemsRequest, Pipeline,
    UpdateItemRequest,
};

/// Router state for one item collection.
#[derive(Debug, Clone)]
pub struct ItemApi {
    pub service: ItemService,
}

pub async fn create_item(call: Call<ItemApi>, req: CreateItemRequest) -> Result<Item, Error> {
    call.state.service.create(req.into())
}

pub async fn list_items(call: Call<ItemApi>, req: ListItemsRequest) -> Result<Page<Item>, Error> {
    call.state.service.list(&req.into())
}

pub async fn get_item(call: Call<ItemApi>, req: ItemIdRequest) -> Result<Item, Error> {
    call.state.service.get(req.id)
}

pub async fn update_item(call: Call<ItemApi>, req: UpdateItemRequest) -> Result<Item, Error> {
    let (id, patch) = req.into_patch();
    call.state.service.update(id, patch)
}

pub async fn delete_item(call: Call<ItemApi>, req: ItemIdRequest) -> Result<(), Error> {
    call.state.service.delete(req.id)
}

/// Standard collection routes over `service`.
pub fn item_routes(pipeline: &Pipeline, service: ItemService) -> Router {
    Router::new()
        .route(
            "/",
            post(pipeline.handle(create_item, StatusCode::CREATED))
                .get(pipeline.handle(list_items, StatusCode::OK)),
        )
        .route(
            "/{id}",
            get(pipeline.handle(get_item, StatusCode::OK))
                .patch(pipeline.handle(update_item, StatusCode::OK))
                .delete(pipeline.handle_no_content(delete_item, StatusCode::NO_CONTENT)),
        )
        .with_state(ItemApi { service })
}

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleStatus {
    pub module: &'static str,
    pub status: &'static str,
    pub version: &'static str,
    pub collections: Vec<&'static str>,
}

#[derive(Debug, Clone)]
struct StatusState {
    module: &'static str,
    collections: Vec<&'static str>,
}

async fn status(call: Call<StatusState>, _: EmptyRequest) -> Result<ModuleStatus, Error> {
    Ok(ModuleStatus {
        module: call.state.module,
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        collections: call.state.collections,
    })
}

/// `GET /status` for a module serving `collections`.
pub fn status_routes(
    pipeline: &Pipeline,
    module: &'static str,
    collections: Vec<&'static str>,
) -> Router {
    Router::new()
        .route("/status", get(pipeline.handle(status, StatusCode::OK)))
        .with_state(StatusState {
            module,
            collections,
        })
}
