//! Task tracker module, mounted at `/task`.

use axum::Router;
use modgate_gateway::Module;
use modgate_lib::ItemService;
use modgate_service_shared::Pipeline;

use super::{item_routes, status_routes};

pub const NAME: &str = "task";

pub fn router(pipeline: &Pipeline, tasks: ItemService) -> Router {
    status_routes(pipeline, NAME, vec!["tasks"]).nest("/api/tasks", item_routes(pipeline, tasks))
}

pub fn module(pipeline: &Pipeline) -> Module {
    Module::new(NAME, router(pipeline, ItemService::in_memory("task")))
}
