use crate::dispatcher::HeaderVec;
use crate::router::ParamVec;
use http::Method;
use serde_json::Value;
use std::io::Read;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Largest request body accepted.
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// A request that cannot be handed to the service.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("unsupported method: {0}")]
    Method(#[from] http::method::InvalidMethod),

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: u64 },
}

impl RequestError {
    /// Status answered to the client.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Method(_) => 400,
            Self::BodyTooLarge { .. } => 413,
        }
    }
}

/// Transport-level view of an incoming request, before dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub method: Method,
    /// Path plus query string, as sent.
    pub target: String,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub form_params: ParamVec,
    pub body: Option<Value>,
    pub remote_addr: Option<String>,
}

impl ParsedRequest {
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        Self {
            method,
            target: target.to_string(),
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            form_params: ParamVec::new(),
            body: None,
            remote_addr: None,
        }
    }

    /// Path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or("/")
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Split a `Cookie` header into name/value pairs.
#[must_use]
pub fn parse_cookies(headers: &HeaderVec) -> HeaderVec {
    headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("cookie"))
        .flat_map(|(_, c)| c.split(';'))
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim().to_string();
            Some((Arc::from(name), value))
        })
        .collect()
}

/// Decode an `application/x-www-form-urlencoded` body.
#[must_use]
pub fn parse_form(body: &str) -> ParamVec {
    url::form_urlencoded::parse(body.as_bytes())
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect()
}

/// Interpret `raw` according to the request's content type.
///
/// Form bodies fill `form_params`; JSON bodies are kept as a value. Anything else is
/// dropped.
pub fn apply_body(parsed: &mut ParsedRequest, raw: &str) {
    if raw.is_empty() {
        return;
    }
    let content_type = parsed
        .get_header("content-type")
        .unwrap_or_default()
        .to_ascii_lowercase();
    if content_type.starts_with("application/x-www-form-urlencoded") {
        parsed.form_params = parse_form(raw);
    } else if content_type.starts_with("application/json") {
        match serde_json::from_str(raw) {
            Ok(value) => parsed.body = Some(value),
            Err(e) => debug!(error = %e, "Ignoring malformed JSON body"),
        }
    } else {
        debug!(content_type = %content_type, "Ignoring body with unsupported content type");
    }
}

/// Read at most `limit` bytes of body. A longer body is rejected, never truncated.
///
/// An unreadable or non-UTF-8 body reads as empty.
pub fn read_body(reader: impl Read, limit: u64) -> Result<String, RequestError> {
    let mut raw = String::new();
    match reader.take(limit.saturating_add(1)).read_to_string(&mut raw) {
        Ok(read) if read as u64 > limit => Err(RequestError::BodyTooLarge { limit }),
        Ok(_) => Ok(raw),
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            Ok(String::new())
        }
    }
}

/// Read method, target, headers, cookies and body from a tiny_http request.
pub fn parse_request(req: &mut tiny_http::Request) -> Result<ParsedRequest, RequestError> {
    let method = Method::from_bytes(req.method().as_str().as_bytes())?;
    if req
        .body_length()
        .is_some_and(|declared| declared as u64 > MAX_BODY_BYTES)
    {
        return Err(RequestError::BodyTooLarge {
            limit: MAX_BODY_BYTES,
        });
    }
    let mut parsed = ParsedRequest::new(method, req.url());
    parsed.remote_addr = req.remote_addr().map(|a| a.ip().to_string());
    parsed.headers = req
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::from(h.field.as_str().as_str().to_ascii_lowercase().as_str()),
                h.value.as_str().to_string(),
            )
        })
        .collect();
    parsed.cookies = parse_cookies(&parsed.headers);

    let raw = read_body(req.as_reader(), MAX_BODY_BYTES)?;
    apply_body(&mut parsed, &raw);

    debug!(
        method = %parsed.method,
        path = %parsed.path(),
        header_count = parsed.headers.len(),
        cookie_count = parsed.cookies.len(),
        form_fields = parsed.form_params.len(),
        "Request parsed"
    );
    Ok(parsed)
}
