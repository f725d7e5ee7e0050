//! Remote repositories against a recording PostgREST stand-in
//!
//! # Test Coverage
//!
//! - Auth and profile headers on every request
//! - Filters, ordering and range headers
//! - Failed reads degrade to empty results
//! - Failed writes map to `Backend` or `DuplicateKey`
//! - Backend reachability check through the CLI check

mod common;

use common::fixtures;
use common::mock_postgrest::{MockPostgrest, Recorded, Reply};
use elfaro::app::AppState;
use elfaro::error::RepositoryError;
use elfaro::models::{NewUser, Plan};
use serde_json::{json, Value};

fn article_row(id: i64, title: &str) -> Value {
    json!({
        "id": id,
        "titulo": title,
        "bajada": "Bajada remota de prueba",
        "contenido": "Contenido remoto suficientemente largo para pasar la validación del sitio.",
        "fecha": "2024-03-05T09:15:00",
        "autor": "Redacción El Faro",
        "categoria": "Ciencia",
    })
}

fn user_row(email: &str) -> Value {
    json!({
        "id": 17,
        "nombre": "Lectora Remota",
        "email": email,
        "password_hash": "hash",
        "suscrito": true,
        "plan": "basic",
        "fecha_registro": "2024-03-01 08:00:00",
    })
}

/// Decoded query pairs of a recorded request.
fn query(req: &Recorded) -> Vec<(String, String)> {
    url::Url::parse(&format!("http://mock{}", req.url))
        .unwrap()
        .query_pairs()
        .into_owned()
        .collect()
}

fn path(req: &Recorded) -> &str {
    req.url.split('?').next().unwrap()
}

fn remote_state(mock: &MockPostgrest) -> AppState {
    AppState::from_config(mock.config()).unwrap()
}

#[test]
fn test_reads_send_credentials_and_filters() {
    let mock = MockPostgrest::start(|_| Reply::json(200, json!([article_row(4, "Un eclipse total")])));
    let state = remote_state(&mock);

    let article = state.articles.find_by_id(4).unwrap();
    assert_eq!(article.title, "Un eclipse total");
    assert_eq!(article.category, "Ciencia");

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method, "GET");
    assert_eq!(path(req), "/rest/v1/articulos");
    assert_eq!(req.header("apikey"), Some("anon-key"));
    assert_eq!(req.header("Authorization"), Some("Bearer anon-key"));
    assert_eq!(req.header("Accept-Profile"), Some("public"));

    let pairs = query(req);
    assert!(pairs.contains(&("id".to_string(), "eq.4".to_string())));
    assert!(pairs.contains(&("limit".to_string(), "1".to_string())));
}

#[test]
fn test_search_is_one_or_filter() {
    let mock = MockPostgrest::start(|_| Reply::json(200, json!([])));
    let state = remote_state(&mock);

    assert!(state.articles.search("  ").is_empty());
    assert!(mock.requests().is_empty());

    state.articles.search("energía, solar");
    let pairs = query(&mock.requests()[0]);
    let or = pairs.iter().find(|(k, _)| k == "or").map(|(_, v)| v.as_str());
    assert_eq!(
        or,
        Some(r#"(titulo.ilike."*energía, solar*",contenido.ilike."*energía, solar*",bajada.ilike."*energía, solar*")"#)
    );
}

#[test]
fn test_paginate_uses_range_headers() {
    let mock = MockPostgrest::start(|_| {
        Reply::json(
            206,
            json!([
                article_row(4, "Cuarta nota remota"),
                article_row(5, "Quinta nota remota"),
                article_row(6, "Sexta nota remota"),
            ]),
        )
        .with_header("Content-Range", "3-5/9")
    });
    let state = remote_state(&mock);

    let page = state.articles.paginate(2, 3);
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.total_items, 9);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_next);

    let req = &mock.requests()[0];
    assert_eq!(req.header("Range"), Some("3-5"));
    assert_eq!(req.header("Prefer"), Some("count=exact"));
    let pairs = query(req);
    assert!(pairs.contains(&("order".to_string(), "fecha.desc,id.asc".to_string())));
}

#[test]
fn test_failed_reads_degrade() {
    let mock = MockPostgrest::start(|_| Reply::json(503, json!({ "message": "caído" })));
    let state = remote_state(&mock);

    assert!(state.articles.list_all().is_empty());
    assert!(state.articles.find_by_id(1).is_none());
    assert_eq!(state.articles.count(), 0);
    assert!(state.articles.paginate(1, 6).items.is_empty());
    assert!(state.users.find_by_email("ana@elfaro.cl").is_none());
    assert_eq!(state.contacts.count_unread(), 0);
}

#[test]
fn test_user_insert_posts_json_representation() {
    let mock = MockPostgrest::start(|req| match req.method.as_str() {
        "GET" => Reply::json(200, json!([])),
        _ => Reply::json(201, json!([user_row("lectora@elfaro.cl")])),
    });
    let state = remote_state(&mock);

    let user = state
        .users
        .create(NewUser::new("Lectora Remota", " Lectora@ElFaro.cl ", "hash").with_plan(Plan::Basic, true))
        .unwrap();
    assert_eq!(user.id, "17");
    assert_eq!(user.plan, Plan::Basic);

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    let lookup = query(&requests[0]);
    assert!(lookup.contains(&("email".to_string(), "eq.lectora@elfaro.cl".to_string())));

    let insert = &requests[1];
    assert_eq!(insert.method, "POST");
    assert_eq!(path(insert), "/rest/v1/usuarios");
    assert_eq!(insert.header("Prefer"), Some("return=representation"));
    assert_eq!(insert.header("Content-Profile"), Some("public"));
    let body: Value = serde_json::from_str(&insert.body).unwrap();
    assert_eq!(body["email"], "lectora@elfaro.cl");
    assert_eq!(body["nombre"], "Lectora Remota");
    assert_eq!(body["suscrito"], true);
}

#[test]
fn test_unique_violation_is_duplicate_key() {
    let mock = MockPostgrest::start(|req| match req.method.as_str() {
        "GET" => Reply::json(200, json!([])),
        _ => Reply::json(409, json!({ "code": "23505", "message": "duplicate key" })),
    });
    let state = remote_state(&mock);

    let err = state
        .users
        .create(NewUser::new("Lectora Remota", "lectora@elfaro.cl", "hash"))
        .unwrap_err();
    assert!(matches!(err, RepositoryError::DuplicateKey { field: "email", .. }));
}

#[test]
fn test_failed_write_is_backend_error() {
    let mock = MockPostgrest::start(|_| Reply::json(500, json!({ "message": "boom" })));
    let state = remote_state(&mock);

    let err = state
        .articles
        .create(fixtures::draft("Nota que no se guarda"))
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Backend { operation: "insert", .. }));
    assert_eq!(
        err.user_message(),
        "No pudimos completar la operación. Inténtalo de nuevo más tarde."
    );
}

#[test]
fn test_mark_as_read_patches_and_reports_missing() {
    let mock = MockPostgrest::start(|_| Reply::json(200, json!([])));
    let state = remote_state(&mock);

    let err = state.contacts.mark_as_read(8).unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));

    let req = &mock.requests()[0];
    assert_eq!(req.method, "PATCH");
    assert_eq!(path(req), "/rest/v1/mensajes_contacto");
    assert_eq!(query(req), vec![("id".to_string(), "eq.8".to_string())]);
    let body: Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(body, json!({ "leido": true }));
}

#[test]
fn test_check_backend_pings_and_counts() {
    let mock = MockPostgrest::start(|_| Reply::json(200, json!([])).with_header("Content-Range", "*/4"));
    let report = elfaro::cli::check_backend(mock.config()).unwrap();
    assert_eq!(
        report,
        "remote backend reachable: 4 articles, 4 users, 4 contact messages"
    );
    assert_eq!(path(&mock.requests()[0]), "/rest/v1/");
}

#[test]
fn test_unreachable_backend_refuses_to_start() {
    let mock = MockPostgrest::start(|_| Reply::json(401, json!({ "message": "no autorizado" })));
    let mut config = mock.config();
    config.backend.remote.verify_on_start = true;
    assert!(matches!(
        AppState::from_config(config),
        Err(RepositoryError::BackendUnavailable(_))
    ));
}

#[test]
fn test_search_needle_is_literal() {
    let mock = MockPostgrest::start(|_| Reply::json(200, json!([])));
    let state = remote_state(&mock);

    state.articles.search("a_b");
    let pairs = query(&mock.requests()[0]);
    let or = pairs.iter().find(|(k, _)| k == "or").map(|(_, v)| v.as_str());
    assert_eq!(
        or,
        Some(r#"(titulo.ilike."*a\\_b*",contenido.ilike."*a\\_b*",bajada.ilike."*a\\_b*")"#)
    );
}

#[test]
fn test_page_far_past_the_end_is_empty() {
    let mock = MockPostgrest::start(|_| {
        Reply::json(200, json!([])).with_header("Content-Range", "*/9")
    });
    let state = remote_state(&mock);

    let page = state.articles.paginate(usize::MAX / 2, 6);
    assert!(page.items.is_empty());
    assert_eq!(page.total_items, 9);
    assert_eq!(page.total_pages, 2);
    assert!(!page.has_next);
    assert!(page.has_previous);

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].header("Range"), None);
    assert_eq!(requests[0].header("Prefer"), Some("count=exact"));
}
