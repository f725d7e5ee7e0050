//! # Router Module
//!
//! Path matching and route resolution for El Faro.
//!
//! ## Overview
//!
//! Routes are registered once at start-up as `(method, pattern, handler reference)`
//! triples and never change afterwards. Patterns use `{name}` placeholders, each matching
//! one non-empty path segment:
//!
//! ```text
//! GET /articulos/{id}                    -> Article.show
//! GET /articulos/categoria/{categoria}   -> Article.byCategory
//! ```
//!
//! ## Architecture
//!
//! The table is split per method into two buckets:
//!
//! 1. **Exact bucket**: patterns without placeholders, stored in a `HashMap` keyed by
//!    the literal path. Checked first, so a literal always beats a pattern.
//! 2. **Pattern bucket**: compiled [`PathMatcher`]s kept in registration order. The
//!    first pattern that matches wins.
//!
//! Only `GET` and `POST` can be registered.
//!
//! ## Example
//!
//! ```rust
//! use elfaro::router::RouteTable;
//! use http::Method;
//!
//! let mut table = RouteTable::new();
//! table.get("/articulos/{id}", "Article.show").unwrap();
//! table.get("/articulos/buscar", "Article.search").unwrap();
//!
//! let hit = table.lookup(&Method::GET, "/articulos/42").unwrap();
//! assert_eq!(hit.handler_name.as_ref(), "Article.show");
//! assert_eq!(hit.get_path_param("id"), Some("42"));
//!
//! let exact = table.lookup(&Method::GET, "/articulos/buscar").unwrap();
//! assert_eq!(exact.handler_name.as_ref(), "Article.search");
//! ```

mod core;
mod matcher;

pub use core::{ParamVec, RouteInfo, RouteMatch, RouteTable, MAX_INLINE_PARAMS};
pub use matcher::{has_placeholders, PathMatcher};
