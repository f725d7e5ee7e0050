//! HTTP transport: a tiny_http listener, request parsing, session attachment and
//! rendering of handler responses.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_cookies, parse_form, parse_request, read_body, ParsedRequest, RequestError};
pub use response::HttpResponse;
pub use service::{health_endpoint, AppService, HttpService};
