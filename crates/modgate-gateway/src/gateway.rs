//! The front router: prefix matching and dispatch to module routers.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use thiserror::Error;
use tower::{Service, ServiceExt};
use tracing::{debug, info, warn};

use crate::module::Module;
use crate::rewrite::StripPrefix;

/// Wiring problems found while mounting modules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("module {name} has no router")]
    MissingRouter { name: String },

    #[error("prefix {prefix} of module {incoming} is already used by module {existing}")]
    PrefixCollision {
        prefix: String,
        existing: String,
        incoming: String,
    },
}

#[derive(Debug, Clone)]
struct Mount {
    name: String,
    prefix: String,
    service: StripPrefix<Router>,
}

impl Mount {
    fn matches(&self, path: &str) -> bool {
        self.prefix == "/"
            || path == self.prefix
            || path
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Builder for the front router.
///
/// Lenient by default: a module without a router is skipped and a repeated
/// prefix replaces the earlier module, both with a warning. [`Gateway::strict`]
/// turns either case into a [`GatewayError`].
#[derive(Debug, Clone, Default)]
pub struct Gateway {
    strict: bool,
    mounts: Vec<Mount>,
    not_found: Option<Router>,
}

impl Gateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Router answering paths outside every prefix. Without one they get
    /// an empty `404`.
    pub fn with_not_found(mut self, router: Router) -> Self {
        self.not_found = Some(router);
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Mount one module.
    pub fn mount(mut self, module: Module) -> Result<Self, GatewayError> {
        let prefix = module.mount_prefix();
        let Some(router) = module.router else {
            if self.strict {
                return Err(GatewayError::MissingRouter { name: module.name });
            }
            warn!(module = %module.name, prefix = %prefix, "module has no router, skipping");
            return Ok(self);
        };

        let mount = Mount {
            name: module.name,
            service: StripPrefix::new(prefix.clone(), router),
            prefix,
        };

        match self.mounts.iter().position(|m| m.prefix == mount.prefix) {
            Some(index) => {
                let existing = &self.mounts[index].name;
                if self.strict {
                    return Err(GatewayError::PrefixCollision {
                        prefix: mount.prefix,
                        existing: existing.clone(),
                        incoming: mount.name,
                    });
                }
                warn!(
                    prefix = %mount.prefix,
                    existing = %existing,
                    incoming = %mount.name,
                    "prefix already mounted, replacing earlier module"
                );
                self.mounts[index] = mount;
            }
            None => {
                info!(module = %mount.name, prefix = %mount.prefix, "module mounted");
                self.mounts.push(mount);
            }
        }
        Ok(self)
    }

    /// Mount modules in order.
    pub fn mount_all(
        self,
        modules: impl IntoIterator<Item = Module>,
    ) -> Result<Self, GatewayError> {
        modules.into_iter().try_fold(self, Gateway::mount)
    }

    /// Names of the mounted modules, in mount order.
    pub fn modules(&self) -> Vec<String> {
        self.mounts.iter().map(|m| m.name.clone()).collect()
    }

    /// Path patterns each module answers: `{prefix}` and `{prefix}/*`.
    ///
    /// These are matched by [`GatewayService`], not registered as routes on
    /// the front router, so module routers never see the front router's
    /// path parameters.
    pub fn patterns(&self) -> Vec<String> {
        self.mounts
            .iter()
            .flat_map(|m| {
                let subtree = if m.prefix == "/" {
                    "/*".to_string()
                } else {
                    format!("{}/*", m.prefix)
                };
                [m.prefix.clone(), subtree]
            })
            .collect()
    }

    /// Freeze the route table into a service.
    pub fn into_service(self) -> GatewayService {
        let mut mounts = self.mounts;
        // Longest prefix wins; stable sort keeps mount order among equals.
        mounts.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        GatewayService {
            mounts: Arc::from(mounts),
            not_found: self.not_found,
        }
    }

    /// Front router with every module behind its prefix. Further routes
    /// (health, metrics) can be added to the returned router and take
    /// precedence over module prefixes.
    pub fn into_router(self) -> Router {
        Router::new().fallback_service(self.into_service())
    }
}

/// Mount `modules` leniently and return the front router.
pub fn build(modules: impl IntoIterator<Item = Module>) -> Router {
    let mut gateway = Gateway::new();
    for module in modules {
        gateway = match gateway.clone().mount(module) {
            Ok(next) => next,
            Err(err) => {
                warn!(error = %err, "module rejected");
                gateway
            }
        };
    }
    gateway.into_router()
}

/// Read-only dispatcher over the mounted modules.
#[derive(Debug, Clone)]
pub struct GatewayService {
    mounts: Arc<[Mount]>,
    not_found: Option<Router>,
}

impl GatewayService {
    fn find(&self, path: &str) -> Option<&Mount> {
        self.mounts.iter().find(|m| m.matches(path))
    }
}

impl Service<Request<Body>> for GatewayService {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let Some(mount) = self.find(req.uri().path()) else {
            debug!(path = %req.uri().path(), "no module matches path");
            let not_found = self.not_found.clone();
            return Box::pin(async move {
                match not_found {
                    Some(router) => router.oneshot(req).await,
                    None => Ok(StatusCode::NOT_FOUND.into_response()),
                }
            });
        };

        debug!(
            module = %mount.name,
            prefix = %mount.prefix,
            path = %req.uri().path(),
            "dispatching to module"
        );
        let service = mount.service.clone();
        Box::pin(async move { service.oneshot(req).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    fn named(name: &'static str) -> Router {
        Router::new().route("/", get(move || async move { name }))
    }

    #[test]
    fn test_patterns_lists_both_forms() {
        let gateway = Gateway::new()
            .mount(Module::new("todo", named("todo")))
            .unwrap()
            .mount(Module::new("root", named("root")).with_prefix("/"))
            .unwrap();
        assert_eq!(gateway.patterns(), vec!["/todo", "/todo/*", "/", "/*"]);
    }

    #[test]
    fn test_lenient_collision_replaces_in_place() {
        let gateway = Gateway::new()
            .mount_all([
                Module::new("first", named("first")).with_prefix("/shared"),
                Module::new("other", named("other")),
                Module::new("second", named("second")).with_prefix("shared/"),
            ])
            .unwrap();
        assert_eq!(gateway.modules(), vec!["second", "other"]);
    }

    #[test]
    fn test_lenient_skips_missing_router() {
        let gateway = Gateway::new()
            .mount(Module::optional("ghost", None))
            .unwrap();
        assert!(gateway.modules().is_empty());
    }

    #[test]
    fn test_strict_errors() {
        let err = Gateway::strict()
            .mount(Module::optional("ghost", None))
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::MissingRouter {
                name: "ghost".to_string()
            }
        );

        let err = Gateway::strict()
            .mount_all([
                Module::new("a", named("a")).with_prefix("/x"),
                Module::new("b", named("b")).with_prefix("/x"),
            ])
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::PrefixCollision {
                prefix: "/x".to_string(),
                existing: "a".to_string(),
                incoming: "b".to_string(),
            }
        );
    }

    #[test]
    fn test_longest_prefix_wins() {
        let service = Gateway::new()
            .mount_all([
                Module::new("root", named("root")).with_prefix("/"),
                Module::new("api", named("api")),
                Module::new("v2", named("v2")).with_prefix("/api/v2"),
            ])
            .unwrap()
            .into_service();

        assert_eq!(service.find("/api/v2/items").unwrap().name, "v2");
        assert_eq!(service.find("/api/v1").unwrap().name, "api");
        assert_eq!(service.find("/api").unwrap().name, "api");
        assert_eq!(service.find("/apiv2").unwrap().name, "root");
        assert_eq!(service.find("/elsewhere").unwrap().name, "root");
    }

    #[test]
    fn test_no_match_without_root() {
        let service = Gateway::new()
            .mount(Module::new("todo", named("todo")))
            .unwrap()
            .into_service();
        assert!(service.find("/task").is_none());
        assert!(service.find("/todos").is_none());
    }
}
