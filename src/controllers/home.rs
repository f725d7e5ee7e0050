use serde_json::json;

use super::render;
use crate::app::AppState;
use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::models;
use crate::repository::SortOrder;

/// Secondary cards shown under the featured article.
const SECONDARY_ARTICLES: usize = 3;

/// Front page: newest article featured, the next three as cards.
pub fn index(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    let now = models::now();
    let days = state.config.articles.recent_days;
    let mut latest = state
        .articles
        .list_ordered_by_date(SortOrder::Desc)
        .into_iter()
        .take(1 + SECONDARY_ARTICLES)
        .map(|a| a.public_summary(days, now));
    let featured = latest.next();
    let secondary: Vec<_> = latest.collect();

    render(
        state,
        req,
        "home/index",
        json!({
            "titulo": "Inicio",
            "articulo_destacado": featured,
            "articulos_secundarios": secondary,
            "estadisticas": state.articles.statistics(),
            "categorias": state.articles.categories(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_support::state;
    use http::Method;

    #[test]
    fn test_front_page_features_the_newest_article() {
        let state = state();
        let resp = index(&state, &HandlerRequest::new(Method::GET, "/"));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.view.as_deref(), Some("home/index"));
        let body = &resp.body;
        assert_eq!(body["articulo_destacado"]["fecha"], "2024-01-15 10:30:00");
        assert_eq!(body["articulos_secundarios"].as_array().unwrap().len(), 3);
        assert_eq!(body["estadisticas"]["total"], 9);
        assert_eq!(body["categorias"].as_array().unwrap().len(), 8);
    }
}
