use crate::error::DispatchError;
use crate::ids::RequestId;
use crate::router::{ParamVec, RouteTable, MAX_INLINE_PARAMS};
use crate::session::SessionHandle;
use http::Method;
use serde::Serialize;
use serde_json::{json, Value};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::middleware::Middleware;

/// Maximum inline headers/cookies before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Handler reference invoked when no route matches.
pub const NOT_FOUND_HANDLER: &str = "Error.notFound";

/// Body of every 500 answered by the dispatcher.
pub const INTERNAL_ERROR_MESSAGE: &str = "Error interno del servidor";

/// Header and cookie storage; most requests fit inline.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Path parameters bound to a handler's declared names, in declaration order.
///
/// A declared name the route did not extract is bound to `None`.
pub type BoundParams = SmallVec<[(Arc<str>, Option<String>); MAX_INLINE_PARAMS]>;

/// Request data passed to a handler.
///
/// The server fills the transport fields; [`Dispatcher::dispatch`] normalizes `path`,
/// merges the query string into `query_params` and binds `path_params`.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub request_id: RequestId,
    pub method: Method,
    /// Normalized path once dispatched; the raw request target before.
    pub path: String,
    /// Name of the handler that processes this request
    pub handler_name: Arc<str>,
    pub path_params: BoundParams,
    pub query_params: ParamVec,
    /// Fields of an `application/x-www-form-urlencoded` body.
    pub form_params: ParamVec,
    /// Request body parsed as JSON (if present)
    pub body: Option<Value>,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub remote_addr: Option<String>,
    pub session: SessionHandle,
}

impl HandlerRequest {
    /// Request for `target` (path plus optional query string) with a detached session.
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            path: target.to_string(),
            handler_name: Arc::from(""),
            path_params: BoundParams::new(),
            query_params: ParamVec::new(),
            form_params: ParamVec::new(),
            body: None,
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            remote_addr: None,
            session: SessionHandle::detached(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((Arc::from(name), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_form(mut self, name: &str, value: &str) -> Self {
        self.form_params.push((Arc::from(name), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: SessionHandle) -> Self {
        self.session = session;
        self
    }

    /// Declared path parameter. `None` both for undeclared names and unbound ones.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Get a query parameter by name. The last occurrence wins.
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Submitted field from the form body, or from a JSON object body.
    #[must_use]
    pub fn get_form_param(&self, name: &str) -> Option<&str> {
        self.form_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
            .or_else(|| self.body.as_ref()?.get(name)?.as_str())
    }

    /// Form field with surrounding whitespace removed, empty when absent.
    #[must_use]
    pub fn form_text(&self, name: &str) -> String {
        self.get_form_param(name).unwrap_or_default().trim().to_string()
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// `X-Requested-With: XMLHttpRequest`, or an `Accept` header asking for JSON.
    #[must_use]
    pub fn is_ajax(&self) -> bool {
        self.get_header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
            || self
                .get_header("accept")
                .is_some_and(|v| v.contains("application/json"))
    }
}

/// Response produced by a handler.
///
/// `body` is either a JSON payload or, when `view` is set, the view-model handed to the
/// template of that name.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    /// Template name such as `articulos/show`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            view: None,
            body,
        }
    }

    /// Create a JSON response with default headers
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self::new(status, headers, body)
    }

    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "error": message }))
    }

    /// 200 rendering `template` with `context`.
    #[must_use]
    pub fn view(template: &str, context: Value) -> Self {
        Self {
            status: 200,
            headers: HeaderVec::new(),
            view: Some(template.to_string()),
            body: context,
        }
    }

    /// 302 to an application path; the dispatcher adds the deployment prefix.
    #[must_use]
    pub fn redirect(location: &str) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("location"), location.to_string()));
        Self::new(302, headers, Value::Null)
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// Handler closure. Repositories and configuration are captured at registration.
pub type Handler = Arc<dyn Fn(&HandlerRequest) -> HandlerResponse + Send + Sync>;

#[derive(Clone)]
struct HandlerEntry {
    params: Vec<Arc<str>>,
    func: Handler,
}

/// Decode `%XX` escapes in a path segment. Invalid escapes are kept verbatim.
#[must_use]
pub fn percent_decode(segment: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(segment.as_bytes())).into_owned()
}

/// Strip the query string and the deployment prefix, then canonicalize slashes.
///
/// The prefix is only removed at a segment boundary: with base `/elfaro`,
/// `/elfaro/articulos` becomes `/articulos` but `/elfaros` is left alone.
#[must_use]
pub fn normalize_path(target: &str, base_path: &str) -> String {
    let path = target.split_once('?').map_or(target, |(p, _)| p);
    let path = path.split_once('#').map_or(path, |(p, _)| p);
    let base = base_path.trim_end_matches('/');
    let path = if base.is_empty() {
        path
    } else {
        match path.strip_prefix(base) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => path,
        }
    };
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Front controller: resolves a request to a registered handler and runs it.
///
/// Routes and handlers are fixed before the first request; the dispatcher is then
/// shared read-only across worker threads.
#[derive(Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    handlers: HashMap<String, HandlerEntry>,
    base_path: String,
    /// Ordered list of middleware to apply to requests/responses
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(routes: RouteTable) -> Self {
        Dispatcher {
            routes: Arc::new(routes),
            handlers: HashMap::new(),
            base_path: String::new(),
            middlewares: Vec::new(),
        }
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Deployment prefix stripped from incoming paths and added to redirects.
    pub fn set_base_path(&mut self, base_path: &str) {
        self.base_path = base_path.trim_end_matches('/').to_string();
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Middleware is executed in the order it's added.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    /// Bind `name` to a handler that reads the path parameters `params`.
    ///
    /// Registering a name twice replaces the earlier handler.
    pub fn register_handler<F>(&mut self, name: &str, params: &[&str], handler_fn: F)
    where
        F: Fn(&HandlerRequest) -> HandlerResponse + Send + Sync + 'static,
    {
        let entry = HandlerEntry {
            params: params.iter().map(|p| Arc::from(*p)).collect(),
            func: Arc::new(handler_fn),
        };
        if self.handlers.insert(name.to_string(), entry).is_some() {
            warn!(handler_name = %name, "Replaced existing handler");
        } else {
            debug!(handler_name = %name, params = ?params, "Handler registered");
        }
    }

    #[must_use]
    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Every route whose handler reference does not resolve.
    pub fn verify(&self) -> Result<(), Vec<DispatchError>> {
        let missing: Vec<DispatchError> = self
            .routes
            .routes()
            .iter()
            .filter(|r| !self.handlers.contains_key(r.handler_name.as_ref()))
            .map(|r| DispatchError::HandlerResolution {
                method: r.method.to_string(),
                pattern: r.pattern.to_string(),
                handler: r.handler_name.to_string(),
            })
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    #[must_use]
    pub fn normalize_path(&self, target: &str) -> String {
        normalize_path(target, &self.base_path)
    }

    /// Route `req` and produce a response. Never panics out.
    pub fn dispatch(&self, mut req: HandlerRequest) -> HandlerResponse {
        if let Some((_, query)) = req.path.split_once('?') {
            let query = query.split_once('#').map_or(query, |(q, _)| q);
            req.query_params.extend(
                url::form_urlencoded::parse(query.as_bytes())
                    .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned())),
            );
        }
        req.path = self.normalize_path(&req.path);

        let Some(route) = self.routes.lookup(&req.method, &req.path) else {
            debug!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path,
                "No route matched"
            );
            return match self.handlers.get(NOT_FOUND_HANDLER) {
                Some(entry) => {
                    req.handler_name = Arc::from(NOT_FOUND_HANDLER);
                    self.run(entry, req)
                }
                None => HandlerResponse::json(404, json!({ "error": "Not Found", "path": req.path })),
            };
        };

        let Some(entry) = self.handlers.get(route.handler_name.as_ref()) else {
            let err = DispatchError::HandlerResolution {
                method: route.method.to_string(),
                pattern: route.pattern.to_string(),
                handler: route.handler_name.to_string(),
            };
            error!(
                request_id = %req.request_id,
                handler_name = %route.handler_name,
                path = %req.path,
                error = %err,
                "Handler not found - CRITICAL"
            );
            return HandlerResponse::error(500, INTERNAL_ERROR_MESSAGE);
        };

        req.handler_name = Arc::clone(&route.handler_name);
        req.path_params = entry
            .params
            .iter()
            .map(|name| {
                let value = route.get_path_param(name).map(percent_decode);
                (Arc::clone(name), value)
            })
            .collect();
        self.run(entry, req)
    }

    fn run(&self, entry: &HandlerEntry, req: HandlerRequest) -> HandlerResponse {
        let mut early_resp: Option<HandlerResponse> = None;
        for mw in &self.middlewares {
            if early_resp.is_none() {
                early_resp = mw.before(&req);
            } else {
                mw.before(&req);
            }
        }

        let start = Instant::now();
        let mut resp = match early_resp {
            Some(r) => r,
            None => {
                debug!(
                    request_id = %req.request_id,
                    handler_name = %req.handler_name,
                    path_params = ?req.path_params,
                    "Handler execution start"
                );
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (entry.func)(&req)))
                {
                    Ok(resp) => resp,
                    Err(panic) => {
                        let panic_message = panic
                            .downcast_ref::<&str>()
                            .map(|s| (*s).to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic".to_string());
                        error!(
                            request_id = %req.request_id,
                            handler_name = %req.handler_name,
                            panic_message = %panic_message,
                            "Handler panicked - CRITICAL"
                        );
                        HandlerResponse::error(500, INTERNAL_ERROR_MESSAGE)
                    }
                }
            }
        };
        let latency: Duration = start.elapsed();

        if resp.is_redirect() && !self.base_path.is_empty() {
            if let Some(location) = resp.get_header("location") {
                if location.starts_with('/') && !location.starts_with("//") {
                    let prefixed = format!("{}{location}", self.base_path);
                    resp.set_header("location", prefixed);
                }
            }
        }

        for mw in &self.middlewares {
            mw.after(&req, &mut resp, latency);
        }
        resp
    }
}
