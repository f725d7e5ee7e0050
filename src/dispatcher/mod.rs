//! # Dispatcher Module
//!
//! Front-controller dispatch for El Faro: turns a parsed request into a handler call.
//!
//! ## Request Flow
//!
//! 1. The request target is normalized: query string stripped (and parsed into
//!    `query_params`), deployment prefix removed at a segment boundary, trailing slash
//!    dropped, empty path mapped to `/`.
//! 2. The [`RouteTable`](crate::router::RouteTable) is consulted, exact bucket first.
//! 3. The route's handler reference (e.g. `Article.show`) is resolved in the static
//!    handler registry built at start-up.
//! 4. Extracted path parameters are bound to the handler's declared names, in
//!    declaration order. A declared name the route did not extract binds to `None`.
//! 5. Middleware `before` hooks run, then the handler, then the `after` hooks.
//!
//! ## Handler Registration
//!
//! ```rust
//! use elfaro::dispatcher::{Dispatcher, HandlerRequest, HandlerResponse};
//! use elfaro::router::RouteTable;
//! use http::Method;
//! use serde_json::json;
//!
//! let mut routes = RouteTable::new();
//! routes.get("/articulos/{id}", "Article.show").unwrap();
//!
//! let mut dispatcher = Dispatcher::new(routes);
//! dispatcher.register_handler("Article.show", &["id"], |req: &HandlerRequest| {
//!     HandlerResponse::json(200, json!({ "id": req.get_path_param("id") }))
//! });
//!
//! let resp = dispatcher.dispatch(HandlerRequest::new(Method::GET, "/articulos/42"));
//! assert_eq!(resp.body, json!({ "id": "42" }));
//! ```
//!
//! ## Error Handling
//!
//! - A route whose handler reference is not registered answers 500
//!   `{"error":"Error interno del servidor"}` and logs the resolution failure. Call
//!   [`Dispatcher::verify`] at start-up to catch these before serving.
//! - A miss runs the `Error.notFound` handler, or answers a static 404 JSON body when
//!   none is registered.
//! - Handler panics are caught and answered with a 500.

mod core;

pub use core::{
    normalize_path, percent_decode, BoundParams, Dispatcher, Handler, HandlerRequest,
    HandlerResponse, HeaderVec, INTERNAL_ERROR_MESSAGE, MAX_INLINE_HEADERS, NOT_FOUND_HANDLER,
};
