//! Todo list module, mounted at `/todo`.

use axum::Router;
use modgate_gateway::Module;
use modgate_lib::ItemService;
use modgate_service_shared::Pipeline;

use super::{item_routes, status_routes};

pub const NAME: &str = "todo";

pub fn router(pipeline: &Pipeline, todos: ItemService) -> Router {
    status_routes(pipeline, NAME, vec!["todos"]).nest("/api/todos", item_routes(pipeline, todos))
}

pub fn module(pipeline: &Pipeline) -> Module {
    Module::new(NAME, router(pipeline, ItemService::in_memory("todo")))
}
