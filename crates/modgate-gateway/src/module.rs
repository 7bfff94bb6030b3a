//! Module descriptors and prefix normalization.

use axum::Router;

/// An independently routed sub-application and where to mount it.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    /// Mount prefix as given; empty means `"/" + name`.
    pub prefix: String,
    /// `None` leaves the module unmounted.
    pub router: Option<Router>,
}

impl Module {
    /// Module mounted at `/{name}`.
    pub fn new(name: impl Into<String>, router: Router) -> Self {
        Self::optional(name, Some(router))
    }

    /// Module whose router may be missing.
    pub fn optional(name: impl Into<String>, router: Option<Router>) -> Self {
        Self {
            name: name.into(),
            prefix: String::new(),
            router,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// The prefix this module will actually be mounted at.
    pub fn mount_prefix(&self) -> String {
        normalize_prefix(&self.prefix, &self.name)
    }
}

/// Normalize a mount prefix.
///
/// An empty prefix becomes `"/" + name`; the result always starts with `/`
/// and never ends with one unless it is the root.
///
/// ```
/// use modgate_gateway::normalize_prefix;
///
/// assert_eq!(normalize_prefix("", "todo"), "/todo");
/// assert_eq!(normalize_prefix("api/", "todo"), "/api");
/// assert_eq!(normalize_prefix("/", "root"), "/");
/// ```
pub fn normalize_prefix(prefix: &str, name: &str) -> String {
    let mut prefix = if prefix.is_empty() {
        format!("/{}", name)
    } else {
        prefix.to_string()
    };
    if !prefix.starts_with('/') {
        prefix.insert(0, '/');
    }
    while prefix.len() > 1 && prefix.ends_with('/') {
        prefix.pop();
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("", "task"), "/task");
        assert_eq!(normalize_prefix("task", "x"), "/task");
        assert_eq!(normalize_prefix("/task/", "x"), "/task");
        assert_eq!(normalize_prefix("/a/b//", "x"), "/a/b");
        assert_eq!(normalize_prefix("/", "x"), "/");
        assert_eq!(normalize_prefix("//", "x"), "/");
    }

    #[test]
    fn test_module_builders() {
        let module = Module::new("agrifolio", Router::new());
        assert_eq!(module.mount_prefix(), "/agrifolio");

        let module = module.with_prefix("farm/");
        assert_eq!(module.mount_prefix(), "/farm");

        assert!(Module::optional("ghost", None).router.is_none());
    }
}
