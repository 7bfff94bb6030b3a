//! Module gateway: several independently routed sub-applications behind
//! one front router.
//!
//! Each [`Module`] is mounted under a normalized prefix. Requests for
//! `{prefix}` or `{prefix}/...` reach that module's router with the prefix
//! removed from the path; the query string is preserved.
//!
//! ```
//! use axum::{routing::get, Router};
//! use modgate_gateway::{Gateway, Module};
//!
//! let todo = Router::new().route("/api/todos", get(|| async { "[]" }));
//! let task = Router::new().route("/api/tasks", get(|| async { "[]" }));
//!
//! let gateway = Gateway::new()
//!     .mount_all([Module::new("todo", todo), Module::new("task", task)])
//!     .expect("lenient mounting never fails");
//! assert_eq!(gateway.patterns(), ["/todo", "/todo/*", "/task", "/task/*"]);
//! let app: Router = gateway.into_router();
//! ```

#![deny(warnings)]

mod gateway;
mod module;
mod rewrite;

pub use gateway::{build, Gateway, GatewayError, GatewayService};
pub use module::{normalize_prefix, Module};
pub use rewrite::{strip_prefix, StripPrefix};
