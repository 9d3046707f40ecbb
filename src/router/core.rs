//! Router core module - registration and resolution on top of the trie.

use serde::ser::{Serialize, SerializeMap, Serializer};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::trie::Trie;
use crate::error::RoutingError;

/// Maximum number of captured params before heap allocation.
/// Most routes capture ≤4 segments (e.g., `/users/:id/posts/:post`).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names are `Arc<str>` shared with the trie node that declared them;
/// values are per-request decoded strings.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Captured path parameters, in the order they were bound (left to right).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(ParamVec);

impl Params {
    /// Create an empty parameter set
    #[must_use]
    pub fn new() -> Self {
        Self(ParamVec::new())
    }

    /// Get a parameter by name
    ///
    /// Uses "last write wins" semantics: if the same name was bound at two
    /// depths (e.g. a mounted router reusing `:id`), the deepest binding is
    /// returned.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Bind a value to a name
    pub fn insert(&mut self, name: Arc<str>, value: String) {
        self.0.push((name, value));
    }

    /// Number of bindings
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` bindings in capture order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    /// Convert to a HashMap (later bindings overwrite earlier ones)
    /// Note: This allocates - use get() in hot paths instead
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.0
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map = self.to_map();
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (k, v) in &map {
            out.serialize_entry(k, v)?;
        }
        out.end()
    }
}

/// Result of resolving a path: the handler, the pattern it was registered
/// with, and the captured params.
#[derive(Debug, Clone)]
pub struct RouteMatch<H> {
    /// Handler attached to the resolved node
    pub handler: H,
    /// Pattern the handler was registered with
    pub route: Arc<str>,
    /// Params bound while walking the requested path
    pub params: Params,
}

/// What a pattern is bound to: a terminal handler, or a whole router grafted
/// in as a subtree.
pub enum Route<H> {
    /// Attach this handler at the pattern
    Handler(H),
    /// Mount this router's tree under the pattern
    Mount(Router<H>),
}

/// Registration and resolution over one [`Trie`], with an optional default
/// route used when a lookup misses.
///
/// Built once during setup (`&mut self`) and read-only while serving
/// (`&self`), so concurrent lookups are safe and registration during traffic
/// needs the caller's own synchronization.
pub struct Router<H> {
    trie: Trie<H>,
    default_route: Option<String>,
}

impl<H: Clone> Default for Router<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Clone> Router<H> {
    /// Router without a default route: every miss is a [`RoutingError`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            trie: Trie::new(),
            default_route: None,
        }
    }

    /// Router falling back to `pattern` when a lookup misses.
    ///
    /// The default is resolved through the trie on each miss, so it must be
    /// registered like any other route. An empty pattern means no fallback.
    #[must_use]
    pub fn with_default(pattern: &str) -> Self {
        let pattern = pattern.strip_prefix('/').unwrap_or(pattern);
        Self {
            trie: Trie::new(),
            default_route: (!pattern.is_empty()).then(|| pattern.to_string()),
        }
    }

    /// Configured default route, without its leading slash
    #[must_use]
    pub fn default_route(&self) -> Option<&str> {
        self.default_route.as_deref()
    }

    /// Bind `pattern` to a handler or mount a router under it
    pub fn on(&mut self, pattern: &str, route: Route<H>) {
        match route {
            Route::Handler(handler) => {
                debug!(pattern = %pattern, "Route registered");
                self.trie.create(pattern).set_handler(handler, pattern);
            }
            Route::Mount(router) => {
                debug!(
                    prefix = %pattern,
                    mounted_routes = ?router.routes(),
                    "Router mounted"
                );
                self.trie.mount(pattern, router.trie.into_root());
            }
        }
    }

    /// Shorthand for `on(pattern, Route::Handler(handler))`
    pub fn handle(&mut self, pattern: &str, handler: H) {
        self.on(pattern, Route::Handler(handler));
    }

    /// Shorthand for `on(prefix, Route::Mount(router))`
    pub fn mount(&mut self, prefix: &str, router: Router<H>) {
        self.on(prefix, Route::Mount(router));
    }

    /// Resolve `path` to a handler.
    ///
    /// Falls back to the default route (with the params accumulated by the
    /// failed primary walk) when the path itself does not reach a handler.
    ///
    /// # Errors
    ///
    /// [`RoutingError::NoMatch`] when neither the path nor the default route
    /// resolves to a handler.
    pub fn match_route(&self, path: &str) -> Result<RouteMatch<H>, RoutingError> {
        debug!(path = %path, "Route match attempt");

        let (node, params) = self.trie.match_path(path);
        if let Some(node) = node {
            if let Some(handler) = node.handler() {
                info!(
                    path = %path,
                    route_pattern = %node.route(),
                    path_params = ?params,
                    "Route matched"
                );
                return Ok(RouteMatch {
                    handler: handler.clone(),
                    route: Arc::from(node.route()),
                    params,
                });
            }
        }

        if let Some(default) = self.default_route.as_deref() {
            if let (Some(node), _) = self.trie.match_path(default) {
                if let Some(handler) = node.handler() {
                    warn!(
                        path = %path,
                        default_route = %default,
                        "No route matched, using default route"
                    );
                    return Ok(RouteMatch {
                        handler: handler.clone(),
                        route: Arc::from(node.route()),
                        params,
                    });
                }
            }
        }

        warn!(path = %path, "No route matched");
        Err(RoutingError::NoMatch {
            path: path.to_string(),
        })
    }

    /// Resolve `path` and invoke the handler with the captured params
    /// followed by `args`, returning whatever the handler returns.
    ///
    /// # Errors
    ///
    /// [`RoutingError::NoMatch`] when the path does not resolve.
    pub fn emit<A, R>(&self, path: &str, args: A) -> Result<R, RoutingError>
    where
        H: Fn(Params, A) -> R,
    {
        let matched = self.match_route(path)?;
        Ok((matched.handler)(matched.params, args))
    }

    /// Patterns of all registered routes, sorted
    #[must_use]
    pub fn routes(&self) -> Vec<String> {
        self.trie.routes()
    }
}
