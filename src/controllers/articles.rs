use serde_json::{json, Value};

use super::{errors, page_number, render};
use crate::app::AppState;
use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::models::{self, Article, ArticleSummary};
use crate::repository::{sort_by_date, Page, SortOrder};

const RELATED_ARTICLES: usize = 3;

fn summarize(state: &AppState, page: Page<Article>) -> Page<ArticleSummary> {
    let now = models::now();
    let days = state.config.articles.recent_days;
    page.map(|a| a.public_summary(days, now))
}

/// Pagination block without the items, which travel as `articulos`.
fn pagination<T>(page: &Page<T>) -> Value {
    json!({
        "pagina_actual": page.page,
        "por_pagina": page.page_size,
        "total": page.total_items,
        "total_paginas": page.total_pages,
        "tiene_anterior": page.has_previous,
        "tiene_siguiente": page.has_next,
    })
}

/// `GET /articulos?pagina=N`
pub fn index(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    let page = state
        .articles
        .paginate(page_number(req), state.config.articles.per_page);
    let page = summarize(state, page);
    render(
        state,
        req,
        "articulos/index",
        json!({
            "titulo": "Artículos",
            "articulos": page.items,
            "paginacion": pagination(&page),
            "categorias": state.articles.categories(),
            "estadisticas": state.articles.statistics(),
        }),
    )
}

/// `GET /articulos/{id}`. Unknown or malformed ids render the 404 page.
pub fn show(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    let article = req
        .get_path_param("id")
        .and_then(|id| id.trim().parse::<i64>().ok())
        .and_then(|id| state.articles.find_by_id(id));
    let Some(article) = article else {
        return errors::not_found(state, req);
    };

    let now = models::now();
    let days = state.config.articles.recent_days;
    let related: Vec<ArticleSummary> = state
        .articles
        .list_by_category(&article.category)
        .into_iter()
        .filter(|a| a.id != article.id)
        .take(RELATED_ARTICLES)
        .map(|a| a.public_summary(days, now))
        .collect();

    render(
        state,
        req,
        "articulos/show",
        json!({
            "titulo": article.title,
            "resumen": article.public_summary(days, now),
            "tiempo_lectura": article.reading_minutes(),
            "articulo": article,
            "relacionados": related,
        }),
    )
}

/// `GET /articulos/categoria/{categoria}`
pub fn by_category(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    let category = req.get_path_param("categoria").unwrap_or_default().trim();
    let matching = state.articles.list_by_category(category);
    let page = Page::from_items(matching, page_number(req), state.config.articles.per_page);
    let page = summarize(state, page);
    render(
        state,
        req,
        "articulos/categoria",
        json!({
            "titulo": format!("Categoría: {category}"),
            "categoria_actual": category,
            "total_resultados": page.total_items,
            "articulos": page.items,
            "paginacion": pagination(&page),
            "categorias": state.articles.categories(),
        }),
    )
}

/// `GET /articulos/buscar?q=...`. Blank queries show no results and no pagination.
pub fn search(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    let term = req.get_query_param("q").unwrap_or_default().trim().to_string();
    let (articles, paging, total) = if term.is_empty() {
        (Vec::new(), Value::Null, 0)
    } else {
        let found = state.articles.search(&term);
        let page = Page::from_items(found, page_number(req), state.config.articles.per_page);
        let page = summarize(state, page);
        let paging = pagination(&page);
        let total = page.total_items;
        (page.items, paging, total)
    };
    render(
        state,
        req,
        "articulos/search",
        json!({
            "titulo": format!("Búsqueda: {term}"),
            "termino_busqueda": term,
            "total_resultados": total,
            "articulos": articles,
            "paginacion": paging,
        }),
    )
}

/// `GET /articulos/recientes?limite=N&categoria=C`, JSON for AJAX callers only.
pub fn recent(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    if !req.is_ajax() {
        return HandlerResponse::redirect("/articulos");
    }
    let limit = req
        .get_query_param("limite")
        .and_then(|l| l.trim().parse::<usize>().ok())
        .unwrap_or(state.config.articles.recent_limit);
    let category = req
        .get_query_param("categoria")
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let articles = match category {
        Some(category) => {
            let mut matching = state.articles.list_by_category(category);
            sort_by_date(&mut matching, SortOrder::Desc, |a| a.published_at);
            matching
        }
        None => state.articles.list_ordered_by_date(SortOrder::Desc),
    };
    let now = models::now();
    let days = state.config.articles.recent_days;
    let summaries: Vec<ArticleSummary> = articles
        .into_iter()
        .take(limit)
        .map(|a| a.public_summary(days, now))
        .collect();

    HandlerResponse::json(
        200,
        json!({
            "success": true,
            "total": summaries.len(),
            "articulos": summaries,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_support::{dispatcher, state};
    use http::Method;

    fn get(target: &str) -> HandlerRequest {
        HandlerRequest::new(Method::GET, target)
    }

    #[test]
    fn test_index_paginates_six_per_page() {
        let state = state();
        let d = dispatcher(&state);
        let resp = d.dispatch(get("/articulos?pagina=2"));
        assert_eq!(resp.view.as_deref(), Some("articulos/index"));
        assert_eq!(resp.body["articulos"].as_array().unwrap().len(), 3);
        assert_eq!(resp.body["paginacion"]["total_paginas"], 2);
        assert_eq!(resp.body["paginacion"]["tiene_anterior"], true);
        assert_eq!(resp.body["paginacion"]["tiene_siguiente"], false);
    }

    #[test]
    fn test_show_known_and_unknown_ids() {
        let state = state();
        let d = dispatcher(&state);
        let resp = d.dispatch(get("/articulos/1"));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body["articulo"]["id"], 1);

        let missing = d.dispatch(get("/articulos/999"));
        assert_eq!(missing.status, 404);
        assert_eq!(missing.view.as_deref(), Some("errors/404"));

        let malformed = d.dispatch(get("/articulos/abc"));
        assert_eq!(malformed.status, 404);
    }

    #[test]
    fn test_category_path_is_decoded() {
        let state = state();
        let resp = dispatcher(&state).dispatch(get("/articulos/categoria/Medio%20Ambiente"));
        assert_eq!(resp.body["categoria_actual"], "Medio Ambiente");
        assert_eq!(resp.body["total_resultados"], 1);
    }

    #[test]
    fn test_blank_search_has_no_pagination() {
        let state = state();
        let d = dispatcher(&state);
        let resp = d.dispatch(get("/articulos/buscar?q=%20%20"));
        assert_eq!(resp.body["articulos"], json!([]));
        assert!(resp.body["paginacion"].is_null());

        let hit = d.dispatch(get("/articulos/buscar?q=inteligencia"));
        assert!(hit.body["total_resultados"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn test_recent_requires_ajax() {
        let state = state();
        let d = dispatcher(&state);
        let resp = d.dispatch(get("/articulos/recientes"));
        assert_eq!(resp.status, 302);
        assert_eq!(resp.get_header("location"), Some("/articulos"));

        let ajax = d.dispatch(
            get("/articulos/recientes?limite=2").with_header("X-Requested-With", "XMLHttpRequest"),
        );
        assert_eq!(ajax.body["success"], true);
        assert_eq!(ajax.body["total"], 2);
        assert_eq!(ajax.body["articulos"][0]["fecha"], "2024-01-15 10:30:00");

        let by_category = d.dispatch(
            get("/articulos/recientes?categoria=Tecnolog%C3%ADa")
                .with_header("Accept", "application/json"),
        );
        assert_eq!(by_category.body["total"], 2);
    }
}
