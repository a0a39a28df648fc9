use http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::pattern::{CaptureVec, CompiledPattern};
use crate::error::RouterError;
use crate::resource::{Resource, Route};

/// Result of successfully matching a request path to a route
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route (shared with the routing table)
    pub route: Arc<Route>,
    /// Captured token values in declaration order
    pub captures: CaptureVec,
}

impl RouteMatch {
    /// Get a captured value by token name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.captures
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Captures as an owned map, the shape handlers see on the request.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.captures
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

type RouteList = Vec<(CompiledPattern, Arc<Route>)>;

/// Ordered per-method route table.
///
/// Routes are tried in registration order and the first match wins, so a
/// general pattern registered before a specific one shadows it. Only DELETE,
/// GET, POST and PUT are routable.
#[derive(Debug, Clone, Default)]
pub struct Router {
    delete: RouteList,
    get: RouteList,
    post: RouteList,
    put: RouteList,
    routes: Vec<Arc<Route>>,
}

impl Router {
    /// Empty routing table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a router from routes, in order.
    ///
    /// # Errors
    ///
    /// The first [`RouterError`] raised by [`Router::register`].
    pub fn from_routes<I>(routes: I) -> Result<Self, RouterError>
    where
        I: IntoIterator<Item = Route>,
    {
        let mut router = Self::new();
        router.register_routes(routes)?;
        Ok(router)
    }

    fn table_mut(&mut self, method: &Method) -> Option<&mut RouteList> {
        match *method {
            Method::DELETE => Some(&mut self.delete),
            Method::GET => Some(&mut self.get),
            Method::POST => Some(&mut self.post),
            Method::PUT => Some(&mut self.put),
            _ => None,
        }
    }

    fn table(&self, method: &Method) -> Option<&RouteList> {
        match *method {
            Method::DELETE => Some(&self.delete),
            Method::GET => Some(&self.get),
            Method::POST => Some(&self.post),
            Method::PUT => Some(&self.put),
            _ => None,
        }
    }

    /// Compile and append one route to its method's list.
    ///
    /// # Errors
    ///
    /// [`RouterError::UnsupportedMethod`] for methods other than
    /// DELETE/GET/POST/PUT, [`RouterError::InvalidPattern`] if the pattern
    /// does not compile.
    pub fn register(&mut self, route: Route) -> Result<(), RouterError> {
        let compiled = CompiledPattern::compile(route.pattern())?;
        let route = Arc::new(route);
        let Some(table) = self.table_mut(route.method()) else {
            return Err(RouterError::UnsupportedMethod {
                route: route.name().to_string(),
                method: route.method().to_string(),
            });
        };

        debug!(
            method = %route.method(),
            pattern = %route.pattern(),
            route = %route.name(),
            tokens = compiled.tokens().len(),
            "Route registered"
        );
        table.push((compiled, Arc::clone(&route)));
        self.routes.push(route);
        Ok(())
    }

    /// # Errors
    ///
    /// Stops at the first route that fails to register.
    pub fn register_routes<I>(&mut self, routes: I) -> Result<(), RouterError>
    where
        I: IntoIterator<Item = Route>,
    {
        for route in routes {
            self.register(route)?;
        }
        Ok(())
    }

    /// Register every route of `resource` in the order it declared them.
    ///
    /// # Errors
    ///
    /// Stops at the first route that fails to register.
    pub fn register_resource(&mut self, resource: Resource) -> Result<(), RouterError> {
        let group = resource.group().to_string();
        let count = resource.len();
        self.register_routes(resource)?;
        info!(group = %group, routes_count = count, "Resource registered");
        Ok(())
    }

    /// Emit the routing table summary.
    pub fn log_loaded(&self) {
        if self.routes.is_empty() {
            info!(routes_count = 0, "Routing table loaded with no routes");
            return;
        }
        info!(
            routes_count = self.routes.len(),
            get = self.get.len(),
            post = self.post.len(),
            put = self.put.len(),
            delete = self.delete.len(),
            "Routing table loaded"
        );
    }

    /// Find the first route of `method` whose pattern matches `path`.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let Some(table) = self.table(method) else {
            error!(method = %method, path = %path, "Unsupported method");
            return None;
        };

        for (pattern, route) in table {
            if let Some(captures) = pattern.captures(path) {
                debug!(
                    method = %method,
                    path = %path,
                    route = %route.name(),
                    captures = captures.len(),
                    "Route matched"
                );
                return Some(RouteMatch {
                    route: Arc::clone(route),
                    captures,
                });
            }
        }

        warn!(
            method = %method,
            path = %path,
            routes_checked = table.len(),
            "No route matched"
        );
        None
    }

    /// All routes in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Look a route up by name. Accepts `group.handler` and `group_handler`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Arc<Route>> {
        self.routes
            .iter()
            .find(|r| r.name() == name)
            .or_else(|| {
                let (group, handler) = name.split_once('_')?;
                self.routes
                    .iter()
                    .find(|r| r.name().split_once('.') == Some((group, handler)))
            })
    }

    /// One `METHOD  pattern` line per route, in registration order.
    #[must_use]
    pub fn dump_routes(&self) -> String {
        let mut out = String::new();
        for route in &self.routes {
            out.push_str(&format!("{:<7} {}\n", route.method().as_str(), route.pattern()));
        }
        out
    }
}
