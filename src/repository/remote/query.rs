//! PostgREST query-string builder.
//!
//! Filters use the `column=op.value` form. Free-text search becomes one `or=(...)`
//! filter of quoted `ilike` patterns so commas and parentheses in the needle stay literal.

use crate::repository::SortOrder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Default for Query {
    fn default() -> Self {
        Self::select("*")
    }
}

impl Query {
    #[must_use]
    pub fn select(columns: &str) -> Self {
        Self {
            pairs: vec![("select".to_string(), columns.to_string())],
        }
    }

    /// Filters only, for PATCH and DELETE.
    #[must_use]
    pub fn filter() -> Self {
        Self { pairs: Vec::new() }
    }

    #[must_use]
    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.push(column, format!("eq.{}", value.to_string()))
    }

    #[must_use]
    pub fn ilike(self, column: &str, value: &str) -> Self {
        self.push(column, format!("ilike.{value}"))
    }

    #[must_use]
    pub fn gte(self, column: &str, value: impl ToString) -> Self {
        self.push(column, format!("gte.{}", value.to_string()))
    }

    #[must_use]
    pub fn not_null(self, column: &str) -> Self {
        self.push(column, "not.is.null".to_string())
    }

    /// Case-insensitive substring match on any of `columns`.
    #[must_use]
    pub fn search(self, columns: &[&str], needle: &str) -> Self {
        let pattern = quote(&format!("*{}*", escape_like(needle)));
        let clauses: Vec<String> = columns
            .iter()
            .map(|c| format!("{c}.ilike.{pattern}"))
            .collect();
        self.push("or", format!("({})", clauses.join(",")))
    }

    /// Primary ordering on `column`, ties broken by ascending id so results are stable.
    #[must_use]
    pub fn order(self, column: &str, order: SortOrder) -> Self {
        let value = if column == "id" {
            format!("id.{}", order.as_str())
        } else {
            format!("{column}.{},id.asc", order.as_str())
        };
        self.push("order", value)
    }

    #[must_use]
    pub fn limit(self, limit: usize) -> Self {
        self.push("limit", limit.to_string())
    }

    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    fn push(mut self, key: &str, value: String) -> Self {
        self.pairs.push((key.to_string(), value));
        self
    }
}

/// Backslash-escape `LIKE` wildcards so the needle matches literally.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_' | '*') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Double-quote a PostgREST value, escaping `"` and `\`.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Total row count from a `Content-Range` header such as `0-5/9` or `*/0`.
#[must_use]
pub fn parse_content_range_total(header: &str) -> Option<usize> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get<'a>(q: &'a Query, key: &str) -> Vec<&'a str> {
        q.pairs()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[test]
    fn test_filters() {
        let q = Query::default().eq("categoria", "Ciencia").gte("fecha", "2024-01-01 00:00:00");
        assert_eq!(get(&q, "select"), vec!["*"]);
        assert_eq!(get(&q, "categoria"), vec!["eq.Ciencia"]);
        assert_eq!(get(&q, "fecha"), vec!["gte.2024-01-01 00:00:00"]);
    }

    #[test]
    fn test_search_quotes_needle() {
        let q = Query::default().search(&["titulo", "bajada"], "a,b \"c\"");
        assert_eq!(
            get(&q, "or"),
            vec![r#"(titulo.ilike."*a,b \"c\"*",bajada.ilike."*a,b \"c\"*")"#]
        );
    }

    #[test]
    fn test_search_escapes_wildcards() {
        let q = Query::default().search(&["titulo"], "50%_off*");
        assert_eq!(get(&q, "or"), vec![r#"(titulo.ilike."*50\\%\\_off\\**")"#]);
    }

    #[test]
    fn test_order_adds_id_tiebreak() {
        let q = Query::default().order("fecha", SortOrder::Desc);
        assert_eq!(get(&q, "order"), vec!["fecha.desc,id.asc"]);
        let q = Query::default().order("id", SortOrder::Asc);
        assert_eq!(get(&q, "order"), vec!["id.asc"]);
    }

    #[test]
    fn test_content_range() {
        assert_eq!(parse_content_range_total("0-5/9"), Some(9));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-5/*"), None);
    }
}
