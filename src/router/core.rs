use crate::error::RouteError;
use http::Method;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::matcher::{has_placeholders, PathMatcher};

/// Maximum number of path parameters stored inline before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Path parameters in pattern order.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub method: Method,
    /// The pattern as registered, e.g. `/articulos/{id}`.
    pub pattern: Arc<str>,
    /// Handler reference, e.g. `Article.show`.
    pub handler_name: Arc<str>,
    pub path_params: ParamVec,
}

impl RouteMatch {
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn path_params_map(&self) -> HashMap<String, String> {
        self.path_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// One registered binding, as listed by [`RouteTable::routes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: Method,
    pub pattern: Arc<str>,
    pub handler_name: Arc<str>,
    pub parameterized: bool,
}

#[derive(Debug, Clone)]
struct PatternRoute {
    matcher: PathMatcher,
    handler_name: Arc<str>,
}

#[derive(Debug, Clone, Default)]
struct MethodRoutes {
    exact: HashMap<String, Arc<str>>,
    patterns: Vec<PatternRoute>,
}

/// Method-scoped route bindings split into an exact bucket and an ordered pattern bucket.
///
/// Lookup checks the exact bucket first, so `/articulos/buscar` beats `/articulos/{id}`
/// regardless of registration order. Among patterns the first registered match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    get: MethodRoutes,
    post: MethodRoutes,
    order: Vec<RouteInfo>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, method: &Method) -> Option<&MethodRoutes> {
        match *method {
            Method::GET => Some(&self.get),
            Method::POST => Some(&self.post),
            _ => None,
        }
    }

    fn bucket_mut(&mut self, method: &Method) -> Option<&mut MethodRoutes> {
        match *method {
            Method::GET => Some(&mut self.get),
            Method::POST => Some(&mut self.post),
            _ => None,
        }
    }

    /// Bind `pattern` to `handler_name` for `method`.
    ///
    /// A structurally identical pattern registered again replaces the earlier handler
    /// in place, keeping its position in the pattern bucket.
    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        handler_name: &str,
    ) -> Result<(), RouteError> {
        let handler: Arc<str> = Arc::from(handler_name);
        let parameterized = has_placeholders(pattern);
        let bucket = self
            .bucket_mut(&method)
            .ok_or_else(|| RouteError::UnsupportedMethod(method.clone()))?;

        let pattern_key: Arc<str> = if parameterized {
            let matcher = PathMatcher::compile(pattern)?;
            let key = Arc::clone(matcher.pattern());
            if let Some(existing) = bucket
                .patterns
                .iter_mut()
                .find(|r| r.matcher.shape() == matcher.shape())
            {
                warn!(
                    method = %method,
                    pattern = %pattern,
                    previous_pattern = %existing.matcher.pattern(),
                    previous_handler = %existing.handler_name,
                    handler_name = %handler,
                    "Pattern route re-registered, replacing previous handler"
                );
                existing.handler_name = Arc::clone(&handler);
                existing.matcher = matcher;
            } else {
                bucket.patterns.push(PatternRoute {
                    matcher,
                    handler_name: Arc::clone(&handler),
                });
            }
            key
        } else {
            let normalized = normalize_literal(pattern);
            if let Some(previous) = bucket
                .exact
                .insert(normalized.clone(), Arc::clone(&handler))
            {
                warn!(
                    method = %method,
                    pattern = %normalized,
                    previous_handler = %previous,
                    handler_name = %handler,
                    "Exact route re-registered, replacing previous handler"
                );
            }
            Arc::from(normalized.as_str())
        };

        self.record(RouteInfo {
            method,
            pattern: pattern_key,
            handler_name: handler,
            parameterized,
        });
        Ok(())
    }

    fn record(&mut self, info: RouteInfo) {
        if let Some(slot) = self
            .order
            .iter_mut()
            .find(|r| r.method == info.method && same_shape(&r.pattern, &info.pattern))
        {
            *slot = info;
        } else {
            debug!(
                method = %info.method,
                pattern = %info.pattern,
                handler_name = %info.handler_name,
                parameterized = info.parameterized,
                "Route registered"
            );
            self.order.push(info);
        }
    }

    pub fn get(&mut self, pattern: &str, handler_name: &str) -> Result<(), RouteError> {
        self.register(Method::GET, pattern, handler_name)
    }

    pub fn post(&mut self, pattern: &str, handler_name: &str) -> Result<(), RouteError> {
        self.register(Method::POST, pattern, handler_name)
    }

    /// Resolve an already normalized path.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let bucket = self.bucket(method)?;

        if let Some(handler) = bucket.exact.get(path) {
            return Some(RouteMatch {
                method: method.clone(),
                pattern: Arc::from(path),
                handler_name: Arc::clone(handler),
                path_params: ParamVec::new(),
            });
        }

        bucket.patterns.iter().find_map(|route| {
            route.matcher.matches(path).map(|path_params| RouteMatch {
                method: method.clone(),
                pattern: Arc::clone(route.matcher.pattern()),
                handler_name: Arc::clone(&route.handler_name),
                path_params,
            })
        })
    }

    /// Bindings in registration order.
    #[must_use]
    pub fn routes(&self) -> &[RouteInfo] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn log_summary(&self) {
        let summary: Vec<String> = self
            .order
            .iter()
            .map(|r| format!("{} {} -> {}", r.method, r.pattern, r.handler_name))
            .collect();
        info!(
            routes_count = self.order.len(),
            exact_get = self.get.exact.len(),
            pattern_get = self.get.patterns.len(),
            exact_post = self.post.exact.len(),
            pattern_post = self.post.patterns.len(),
            routes = ?summary,
            "Routing table loaded"
        );
    }
}

fn normalize_literal(pattern: &str) -> String {
    let trimmed = pattern.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn same_shape(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let mut sa = a.split('/').filter(|s| !s.is_empty());
    let mut sb = b.split('/').filter(|s| !s.is_empty());
    loop {
        match (sa.next(), sb.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) => {
                let px = x.starts_with('{') && x.ends_with('}');
                let py = y.starts_with('{') && y.ends_with('}');
                if px != py || (!px && x != y) {
                    return false;
                }
            }
            _ => return false,
        }
    }
}
