//! Farm portfolio module, mounted at `/agrifolio`.
//!
//! Sites are full items. Users only carry a title (their name) and a
//! description, so they get their own create and update request types.

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use modgate_gateway::Module;
use modgate_lib::{Error, Item, ItemService};
use modgate_service_shared::{Call, CreateUserRequest, Pipeline, UpdateUserRequest};

use super::{delete_item, get_item, item_routes, list_items, status_routes, ItemApi};

pub const NAME: &str = "agrifolio";

async fn create_user(call: Call<ItemApi>, req: CreateUserRequest) -> Result<Item, Error> {
    call.state.service.create(req.into())
}

async fn update_user(call: Call<ItemApi>, req: UpdateUserRequest) -> Result<Item, Error> {
    let (id, patch) = req.into_patch();
    call.state.service.update(id, patch)
}

fn user_routes(pipeline: &Pipeline, users: ItemService) -> Router {
    Router::new()
        .route(
            "/",
            post(pipeline.handle(create_user, StatusCode::CREATED))
                .get(pipeline.handle(list_items, StatusCode::OK)),
        )
        .route(
            "/{id}",
            get(pipeline.handle(get_item, StatusCode::OK))
                .patch(pipeline.handle(update_user, StatusCode::OK))
                .delete(pipeline.handle_no_content(delete_item, StatusCode::NO_CONTENT)),
        )
        .with_state(ItemApi { service: users })
}

pub fn router(pipeline: &Pipeline, sites: ItemService, users: ItemService) -> Router {
    status_routes(pipeline, NAME, vec!["sites", "users"])
        .nest("/api/sites", item_routes(pipeline, sites))
        .nest("/api/users", user_routes(pipeline, users))
}

pub fn module(pipeline: &Pipeline) -> Module {
    Module::new(
        NAME,
        router(
            pipeline,
            ItemService::in_memory("site"),
            ItemService::in_memory("user"),
        ),
    )
}

