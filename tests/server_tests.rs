//! End-to-end tests over real HTTP
//!
//! Each test starts the full service on an ephemeral port and drives it with a
//! blocking client that keeps the session cookie. Without a templates directory
//! every view answers with its JSON view-model, which the tests inspect.

mod common;

use common::fixtures;
use common::test_server::TestServer;
use reqwest::header::{LOCATION, SET_COOKIE};
use serde_json::Value;

#[test]
fn test_health_check() {
    let server = TestServer::start(fixtures::unseeded_config());
    let resp = reqwest::blocking::get(server.url("/health")).unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("x-request-id"));
    assert!(!resp.headers().contains_key(SET_COOKIE));
    let body: Value = resp.json().unwrap();
    assert_eq!(body, serde_json::json!({ "status": "ok" }));
}

#[test]
fn test_request_id_is_echoed() {
    let server = TestServer::start(fixtures::unseeded_config());
    let id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    let resp = reqwest::blocking::Client::new()
        .get(server.url("/articulos"))
        .header("X-Request-Id", id)
        .send()
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], id);

    let resp = reqwest::blocking::Client::new()
        .get(server.url("/articulos"))
        .header("X-Request-Id", "no-es-un-ulid")
        .send()
        .unwrap();
    let minted = resp.headers()["x-request-id"].to_str().unwrap();
    assert_ne!(minted, "no-es-un-ulid");
    assert_eq!(minted.len(), 26);
}

#[test]
fn test_article_pages() {
    let server = TestServer::start(elfaro::AppConfig::default());
    let mut browser = server.browser();

    let resp = browser.get("/articulos/1");
    assert_eq!(resp.status(), 200);
    assert!(!resp.headers().contains_key(SET_COOKIE));
    let body: Value = resp.json().unwrap();
    assert_eq!(body["articulo"]["id"], 1);
    assert!(body.get("csrf_token").is_none());

    let resp = browser.get("/articulos/999");
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().unwrap();
    assert_eq!(body["error_code"], "404");

    let resp = browser.get("/no/existe");
    assert_eq!(resp.status(), 404);
}

#[test]
fn test_form_pages_start_a_session() {
    let server = TestServer::start(fixtures::unseeded_config());
    let mut browser = server.browser();

    assert!(!browser.get("/").headers().contains_key(SET_COOKIE));
    assert!(browser.cookie.is_none());

    let resp = browser.get("/contacto");
    let cookie = resp.headers()[SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("elfaro_session="));
    assert!(cookie.contains("HttpOnly"));
    let body: Value = resp.json().unwrap();
    assert!(body["csrf_token"].as_str().is_some_and(|t| !t.is_empty()));

    let token = browser.csrf_token("/contacto");
    assert_eq!(Some(token.as_str()), body["csrf_token"].as_str());
}

#[test]
fn test_register_login_and_profile() {
    let server = TestServer::start(fixtures::unseeded_config());
    let mut browser = server.browser();

    let resp = browser.get("/perfil");
    assert_eq!(resp.status(), 302);
    assert_eq!(resp.headers()[LOCATION], "/login");

    let token = browser.csrf_token("/registro");
    let resp = browser.post_form(
        "/registro",
        &[
            ("csrf_token", token.as_str()),
            ("nombre", "Lectora de Prueba"),
            ("email", "Lectora@ElFaro.cl"),
            ("password", "secreto123"),
            ("confirm_password", "secreto123"),
            ("plan", "10000"),
        ],
    );
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().unwrap();
    assert_eq!(body["email"], "lectora@elfaro.cl");
    assert_eq!(body["show_registration_success"], true);
    assert_eq!(server.state.users.count(), 1);

    let token = body["csrf_token"].as_str().unwrap().to_string();
    let resp = browser.post_form(
        "/login",
        &[
            ("csrf_token", token.as_str()),
            ("email", "lectora@elfaro.cl"),
            ("password", "incorrecta"),
        ],
    );
    assert_eq!(resp.headers()[LOCATION], "/login");

    let token = browser.csrf_token("/login");
    let anonymous_cookie = browser.cookie.clone();
    let resp = browser.post_form(
        "/login",
        &[
            ("csrf_token", token.as_str()),
            ("email", "lectora@elfaro.cl"),
            ("password", "secreto123"),
        ],
    );
    assert_eq!(resp.status(), 302);
    assert_eq!(resp.headers()[LOCATION], "/");
    assert!(browser.cookie.is_some());
    assert_ne!(browser.cookie, anonymous_cookie);

    let mut stale = server.browser();
    stale.cookie = anonymous_cookie;
    assert_eq!(stale.get("/perfil").status(), 302);

    let home: Value = browser.get("/").json().unwrap();
    assert_eq!(home["flash"][0]["mensaje"], "¡Bienvenido de vuelta!");

    let profile: Value = browser.get("/perfil").json().unwrap();
    assert_eq!(profile["usuario"]["email"], "lectora@elfaro.cl");
    assert_eq!(profile["usuario"]["plan"], "premium");
    assert_eq!(profile["estadisticas"]["suscrito"], true);

    let resp = browser.get("/logout");
    assert_eq!(resp.headers()[LOCATION], "/");
    assert_eq!(browser.get("/perfil").status(), 302);
}

#[test]
fn test_forged_form_is_rejected() {
    let server = TestServer::start(fixtures::unseeded_config());
    let mut browser = server.browser();
    browser.get("/registro");

    let resp = browser.post_form(
        "/registro",
        &[
            ("csrf_token", "falso"),
            ("nombre", "Intruso"),
            ("email", "intruso@elfaro.cl"),
            ("password", "secreto123"),
            ("confirm_password", "secreto123"),
        ],
    );
    assert_eq!(resp.status(), 302);
    assert_eq!(resp.headers()[LOCATION], "/registro");
    assert_eq!(server.state.users.count(), 0);
}

#[test]
fn test_recent_articles_over_ajax() {
    let server = TestServer::start(elfaro::AppConfig::default());
    let resp = reqwest::blocking::Client::new()
        .get(server.url("/articulos/recientes?limite=2"))
        .header("X-Requested-With", "XMLHttpRequest")
        .send()
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["articulos"].as_array().unwrap().len(), 2);
}

#[test]
fn test_deployment_prefix() {
    let mut config = fixtures::unseeded_config();
    config.base_path = "/elfaro".to_string();
    let server = TestServer::start(config);
    assert!(server.base.ends_with("/elfaro"));
    let mut browser = server.browser();

    let resp = browser.get("/");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().unwrap();
    assert_eq!(body["base_path"], "/elfaro");

    let resp = browser.get("/contacto");
    let cookie = resp.headers()[SET_COOKIE].to_str().unwrap();
    assert!(cookie.contains("Path=/elfaro"));

    let resp = browser.get("/logout");
    assert_eq!(resp.headers()[LOCATION], "/elfaro/");

    let health = reqwest::blocking::get(server.url("/health")).unwrap();
    assert_eq!(health.status(), 200);
}

#[test]
fn test_oversized_body_is_rejected() {
    let server = TestServer::start(fixtures::unseeded_config());
    let limit = usize::try_from(elfaro::server::request::MAX_BODY_BYTES).unwrap();
    let body = format!("mensaje={}", "a".repeat(limit));
    let resp = reqwest::blocking::Client::new()
        .post(server.url("/contacto"))
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(body)
        .send()
        .unwrap();
    assert_eq!(resp.status(), 413);
    let body: Value = resp.json().unwrap();
    assert_eq!(body["error"], "Payload Too Large");
    assert_eq!(server.state.contacts.count_unread(), 0);
}
