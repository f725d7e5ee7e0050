//! Blocking PostgREST client shared by the remote repositories.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::query::{parse_content_range_total, Query};
use crate::error::RepositoryError;

const REST_PATH: &str = "rest/v1/";
/// Postgres `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid table name {0}")]
    Table(String),
}

impl ClientError {
    fn is_unique_violation(&self) -> bool {
        match self {
            ClientError::Status { status, body } => {
                *status == StatusCode::CONFLICT.as_u16() || body.contains(UNIQUE_VIOLATION)
            }
            _ => false,
        }
    }

    /// Map a failed write to the repository error taxonomy.
    pub fn into_write_error(
        self,
        operation: &'static str,
        unique_field: Option<(&'static str, &str)>,
    ) -> RepositoryError {
        if let Some((field, value)) = unique_field {
            if self.is_unique_violation() {
                return RepositoryError::DuplicateKey {
                    field,
                    value: value.to_string(),
                };
            }
        }
        RepositoryError::Backend {
            operation,
            detail: self.to_string(),
        }
    }
}

pub struct PostgrestClient {
    http: Client,
    rest_url: Url,
}

impl PostgrestClient {
    /// Build a client for `base_url` (the project URL, without `/rest/v1`).
    ///
    /// The service key, when present, is sent as the bearer token; the anon key is
    /// always sent as `apikey`.
    pub fn new(
        base_url: &str,
        key: &str,
        service_key: Option<&str>,
        schema: &str,
        timeout: Duration,
    ) -> Result<Self, RepositoryError> {
        let unavailable = |what: String| RepositoryError::BackendUnavailable(what);

        let mut base = Url::parse(base_url.trim())
            .map_err(|e| unavailable(format!("invalid backend url {base_url:?}: {e}")))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(unavailable(format!("invalid backend url {base_url:?}")));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let rest_url = base
            .join(REST_PATH)
            .map_err(|e| unavailable(format!("invalid backend url {base_url:?}: {e}")))?;

        let header = |value: &str| {
            let mut value = HeaderValue::from_str(value)
                .map_err(|_| unavailable("backend key contains invalid characters".to_string()))?;
            value.set_sensitive(true);
            Ok::<_, RepositoryError>(value)
        };
        let bearer = service_key.filter(|k| !k.trim().is_empty()).unwrap_or(key);

        let mut headers = HeaderMap::new();
        headers.insert("apikey", header(key)?);
        headers.insert(AUTHORIZATION, header(&format!("Bearer {bearer}"))?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let profile = HeaderValue::from_str(schema)
            .map_err(|_| unavailable(format!("invalid schema {schema:?}")))?;
        headers.insert("Accept-Profile", profile.clone());
        headers.insert("Content-Profile", profile);

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| unavailable(format!("failed to build http client: {e}")))?;

        Ok(Self { http, rest_url })
    }

    #[must_use]
    pub fn rest_url(&self) -> &Url {
        &self.rest_url
    }

    fn table_url(&self, table: &str) -> Result<Url, ClientError> {
        if table.is_empty() || table.contains(['/', '?', '#']) {
            return Err(ClientError::Table(table.to_string()));
        }
        self.rest_url
            .join(table)
            .map_err(|_| ClientError::Table(table.to_string()))
    }

    fn send(request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }

    pub fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, ClientError> {
        let request = self.http.get(self.table_url(table)?).query(query.pairs());
        Ok(Self::send(request)?.json()?)
    }

    /// Rows `offset..offset + limit` plus the exact total from `Content-Range`.
    pub fn select_range<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<T>, usize), ClientError> {
        // A window that cannot be addressed lies past the last row.
        let Some(last) = offset.checked_add(limit.max(1) - 1) else {
            return Ok((Vec::new(), self.count(table, query)?));
        };
        let request = self
            .http
            .get(self.table_url(table)?)
            .query(query.pairs())
            .header("Range-Unit", "items")
            .header(RANGE, format!("{offset}-{last}"))
            .header("Prefer", "count=exact");
        let response = match Self::send(request) {
            Ok(response) => response,
            // Past the last row PostgREST answers 416; report the total it carries.
            Err(ClientError::Status { status: 416, .. }) => {
                return Ok((Vec::new(), self.count(table, query)?));
            }
            Err(e) => return Err(e),
        };
        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);
        let rows: Vec<T> = response.json()?;
        let total = total.unwrap_or(offset + rows.len());
        Ok((rows, total))
    }

    /// Exact row count for the filters in `query`.
    pub fn count(&self, table: &str, query: &Query) -> Result<usize, ClientError> {
        let mut pairs: Vec<(String, String)> = query
            .pairs()
            .iter()
            .filter(|(k, _)| k != "select" && k != "order" && k != "limit")
            .cloned()
            .collect();
        pairs.push(("select".to_string(), "id".to_string()));
        pairs.push(("limit".to_string(), "1".to_string()));
        let request = self
            .http
            .get(self.table_url(table)?)
            .query(&pairs)
            .header("Prefer", "count=exact");
        let response = Self::send(request)?;
        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);
        match total {
            Some(total) => Ok(total),
            None => Ok(response.json::<Vec<serde_json::Value>>()?.len()),
        }
    }

    /// Insert one row and return it as stored.
    pub fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let request = self
            .http
            .post(self.table_url(table)?)
            .header("Prefer", "return=representation")
            .json(body);
        let mut rows: Vec<T> = Self::send(request)?.json()?;
        if rows.is_empty() {
            return Err(ClientError::Status {
                status: StatusCode::OK.as_u16(),
                body: "insert returned no rows".to_string(),
            });
        }
        Ok(rows.swap_remove(0))
    }

    /// Patch matching rows and return them as stored.
    pub fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
        body: &B,
    ) -> Result<Vec<T>, ClientError> {
        let request = self
            .http
            .patch(self.table_url(table)?)
            .query(query.pairs())
            .header("Prefer", "return=representation")
            .json(body);
        Ok(Self::send(request)?.json()?)
    }

    /// Delete matching rows and return how many went away.
    pub fn delete(&self, table: &str, query: &Query) -> Result<usize, ClientError> {
        let request = self
            .http
            .delete(self.table_url(table)?)
            .query(query.pairs())
            .header("Prefer", "return=representation");
        let rows: Vec<serde_json::Value> = Self::send(request)?.json()?;
        Ok(rows.len())
    }

    /// Reachability check against the REST root.
    pub fn ping(&self) -> Result<(), ClientError> {
        Self::send(self.http.get(self.rest_url.clone())).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> Result<PostgrestClient, RepositoryError> {
        PostgrestClient::new(url, "anon", None, "public", Duration::from_secs(1))
    }

    #[test]
    fn test_rest_url_joins_base() {
        let c = client("https://demo.supabase.co").unwrap();
        assert_eq!(c.rest_url().as_str(), "https://demo.supabase.co/rest/v1/");
        let c = client("http://127.0.0.1:5400/proxy").unwrap();
        assert_eq!(c.rest_url().as_str(), "http://127.0.0.1:5400/proxy/rest/v1/");
    }

    #[test]
    fn test_rejects_unusable_urls() {
        assert!(matches!(client("not a url"), Err(RepositoryError::BackendUnavailable(_))));
        assert!(matches!(client("ftp://host"), Err(RepositoryError::BackendUnavailable(_))));
    }

    #[test]
    fn test_table_names_cannot_escape_rest_root() {
        let c = client("https://demo.supabase.co").unwrap();
        assert!(c.table_url("articulos").is_ok());
        assert!(c.table_url("../auth").is_err());
        assert!(c.table_url("").is_err());
    }

    #[test]
    fn test_unique_violation_maps_to_duplicate_key() {
        let err = ClientError::Status {
            status: 409,
            body: r#"{"code":"23505"}"#.to_string(),
        };
        let mapped = err.into_write_error("insert", Some(("email", "a@b.com")));
        assert!(matches!(mapped, RepositoryError::DuplicateKey { field: "email", .. }));

        let err = ClientError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert!(matches!(
            err.into_write_error("insert", Some(("email", "a@b.com"))),
            RepositoryError::Backend { operation: "insert", .. }
        ));
    }
}
