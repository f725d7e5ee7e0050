use super::request::ParsedRequest;
use super::response::HttpResponse;
use crate::dispatcher::{Dispatcher, HandlerRequest, HandlerResponse, INTERNAL_ERROR_MESSAGE};
use crate::ids::RequestId;
use crate::session::SessionStore;
use crate::views::Views;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::error;

/// Requests between sweeps of expired sessions.
const SESSION_SWEEP_INTERVAL: usize = 256;

/// Something that turns a parsed request into a response.
pub trait HttpService: Send + Sync + 'static {
    fn call(&self, req: ParsedRequest) -> HttpResponse;
}

/// Glue between the listener and the dispatcher: sessions, views and `/health`.
pub struct AppService {
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionStore>,
    pub views: Views,
    requests: AtomicUsize,
}

impl AppService {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, sessions: Arc<SessionStore>, views: Views) -> Self {
        Self {
            dispatcher,
            sessions,
            views,
            requests: AtomicUsize::new(0),
        }
    }

    /// Turn a handler response into bytes: redirect, rendered view or JSON.
    fn render(&self, resp: HandlerResponse) -> HttpResponse {
        let status = resp.status;
        let mut out = if resp.is_redirect() {
            HttpResponse::empty(status)
        } else if let Some(template) = resp.view.as_deref() {
            match self.views.render(template, &resp.body) {
                Ok(Some(html)) => HttpResponse::html(status, html),
                Ok(None) => HttpResponse::json(status, &resp.body),
                Err(e) => {
                    error!(template = %template, error = %e, "Template rendering failed");
                    return HttpResponse::json(500, &json!({ "error": INTERNAL_ERROR_MESSAGE }));
                }
            }
        } else {
            HttpResponse::json(status, &resp.body)
        };
        for (name, value) in resp.headers {
            out.set_header(&name, value);
        }
        out
    }
}

/// Basic health check endpoint returning `{ "status": "ok" }`.
#[must_use]
pub fn health_endpoint() -> HttpResponse {
    HttpResponse::json(200, &json!({ "status": "ok" }))
}

impl HttpService for AppService {
    fn call(&self, req: ParsedRequest) -> HttpResponse {
        let request_id = RequestId::from_header_or_new(req.get_header("x-request-id"));

        if req.method == http::Method::GET
            && self.dispatcher.normalize_path(&req.target) == "/health"
        {
            let mut resp = health_endpoint();
            resp.set_header("X-Request-Id", request_id.to_string());
            return resp;
        }

        if self.requests.fetch_add(1, Ordering::Relaxed) % SESSION_SWEEP_INTERVAL
            == SESSION_SWEEP_INTERVAL - 1
        {
            self.sessions.purge_expired();
        }

        let session = self.sessions.load(req.get_cookie(self.sessions.cookie_name()));
        let mut handler_req = HandlerRequest::new(req.method, &req.target);
        handler_req.request_id = request_id;
        handler_req.headers = req.headers;
        handler_req.cookies = req.cookies;
        handler_req.form_params = req.form_params;
        handler_req.body = req.body;
        handler_req.remote_addr = req.remote_addr;
        handler_req.session = session.clone();

        let resp = self.dispatcher.dispatch(handler_req);
        let mut out = self.render(resp);

        if self.sessions.save(&session) {
            out.add_header("Set-Cookie", self.sessions.cookie_header(&session));
        }
        out.set_header("X-Request-Id", request_id.to_string());
        out
    }
}
