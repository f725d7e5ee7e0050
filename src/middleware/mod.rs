//! Middleware run by the dispatcher around each handler.

mod access_log;
mod core;

pub use access_log::AccessLogMiddleware;
pub use core::Middleware;
