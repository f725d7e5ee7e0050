use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use super::Middleware;
use crate::dispatcher::{HandlerRequest, HandlerResponse};

/// One structured log line per handled request, plus running totals.
#[derive(Default)]
pub struct AccessLogMiddleware {
    request_count: AtomicUsize,
    server_errors: AtomicUsize,
}

impl AccessLogMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Responses with a 5xx status.
    pub fn server_errors(&self) -> usize {
        self.server_errors.load(Ordering::Relaxed)
    }
}

impl Middleware for AccessLogMiddleware {
    fn after(&self, req: &HandlerRequest, res: &mut HandlerResponse, latency: Duration) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        let duration_us = latency.as_micros() as u64;
        if res.status >= 500 {
            self.server_errors.fetch_add(1, Ordering::Relaxed);
            warn!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path,
                handler_name = %req.handler_name,
                status = res.status,
                duration_us,
                "Request failed"
            );
        } else {
            info!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path,
                handler_name = %req.handler_name,
                status = res.status,
                duration_us,
                "Request handled"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_counts_requests_and_server_errors() {
        let mw = AccessLogMiddleware::new();
        let req = HandlerRequest::new(Method::GET, "/");
        let mut ok = HandlerResponse::json(200, serde_json::json!({}));
        let mut failed = HandlerResponse::error(500, "boom");
        mw.after(&req, &mut ok, Duration::from_micros(10));
        mw.after(&req, &mut failed, Duration::from_micros(10));
        assert_eq!(mw.request_count(), 2);
        assert_eq!(mw.server_errors(), 1);
    }
}
