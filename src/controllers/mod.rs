//! Site controllers.
//!
//! Each action is a plain function of the application state and the request. The
//! functions are bound to their handler references (`Article.show`, ...) in
//! [`register`]; the closures capture a shared [`AppState`].
//!
//! Pages are returned as views whose view-model always carries the layout keys:
//! `app_name`, `base_path`, `usuario`, `flash` and `ruta`. Views holding a form also get
//! `csrf_token` through [`render_form`].

pub mod articles;
pub mod auth;
pub mod contact;
pub mod errors;
pub mod home;
pub mod profile;

use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::dispatcher::{Dispatcher, HandlerRequest, HandlerResponse, NOT_FOUND_HANDLER};
use crate::models::PublicUser;
use crate::session::FlashKind;

pub(crate) const INVALID_CSRF: &str = "Token de seguridad inválido";

type Action = fn(&AppState, &HandlerRequest) -> HandlerResponse;

fn bind(
    dispatcher: &mut Dispatcher,
    state: &Arc<AppState>,
    name: &str,
    params: &[&str],
    action: Action,
) {
    let state = Arc::clone(state);
    dispatcher.register_handler(name, params, move |req: &HandlerRequest| {
        action(&state, req)
    });
}

/// Bind every handler reference used by the route table.
pub fn register(dispatcher: &mut Dispatcher, state: &Arc<AppState>) {
    bind(dispatcher, state, "Home.index", &[], home::index);

    bind(dispatcher, state, "Article.index", &[], articles::index);
    bind(dispatcher, state, "Article.show", &["id"], articles::show);
    bind(dispatcher, state, "Article.byCategory", &["categoria"], articles::by_category);
    bind(dispatcher, state, "Article.search", &[], articles::search);
    bind(dispatcher, state, "Article.recent", &[], articles::recent);

    bind(dispatcher, state, "Auth.showRegister", &[], auth::show_register);
    bind(dispatcher, state, "Auth.register", &[], auth::register);
    bind(dispatcher, state, "Auth.showLogin", &[], auth::show_login);
    bind(dispatcher, state, "Auth.login", &[], auth::login);
    bind(dispatcher, state, "Auth.logout", &[], auth::logout);

    bind(dispatcher, state, "Contact.show", &[], contact::show);
    bind(dispatcher, state, "Contact.submit", &[], contact::submit);

    bind(dispatcher, state, "Profile.index", &[], profile::index);
    bind(
        dispatcher,
        state,
        "Profile.activateSubscription",
        &[],
        profile::activate_subscription,
    );
    bind(
        dispatcher,
        state,
        "Profile.deactivateSubscription",
        &[],
        profile::deactivate_subscription,
    );
    bind(dispatcher, state, "Profile.update", &[], profile::update);

    bind(dispatcher, state, NOT_FOUND_HANDLER, &[], errors::not_found);
}

/// View of `template` with the layout keys merged under `ctx`.
///
/// Pending flashes are consumed here, so they show on exactly one page.
pub(crate) fn render(
    state: &AppState,
    req: &HandlerRequest,
    template: &str,
    ctx: Value,
) -> HandlerResponse {
    let mut model = json!({
        "app_name": state.config.app_name,
        "base_path": state.config.base_path,
        "usuario": req.session.user(),
        "flash": req.session.take_flashes(),
        "ruta": req.path,
    });
    if let (Value::Object(base), Value::Object(extra)) = (&mut model, ctx) {
        base.extend(extra);
    }
    HandlerResponse::view(template, model)
}

/// Like [`render`], adding the session's `csrf_token` for the view's form.
pub(crate) fn render_form(
    state: &AppState,
    req: &HandlerRequest,
    template: &str,
    mut ctx: Value,
) -> HandlerResponse {
    if let Value::Object(extra) = &mut ctx {
        extra.insert("csrf_token".to_string(), json!(req.session.csrf_token()));
    }
    render(state, req, template, ctx)
}

/// Flash `message` as an error and redirect to `location`.
pub(crate) fn fail(req: &HandlerRequest, message: &str, location: &str) -> HandlerResponse {
    req.session.flash(FlashKind::Error, message);
    HandlerResponse::redirect(location)
}

/// The logged-in user, or a redirect to the login form with `message` flashed.
pub(crate) fn require_user(
    req: &HandlerRequest,
    message: &str,
) -> Result<PublicUser, HandlerResponse> {
    req.session
        .user()
        .ok_or_else(|| fail(req, message, "/login"))
}

/// Check the submitted `csrf_token` field; on failure redirect to `back`.
pub(crate) fn require_csrf(req: &HandlerRequest, back: &str) -> Result<(), HandlerResponse> {
    if req.session.verify_csrf(req.get_form_param("csrf_token")) {
        Ok(())
    } else {
        Err(fail(req, INVALID_CSRF, back))
    }
}

/// `?pagina=N`, defaulting to 1 for missing or malformed values.
pub(crate) fn page_number(req: &HandlerRequest) -> usize {
    req.get_query_param("pagina")
        .and_then(|p| p.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::AppConfig;

    pub fn state() -> Arc<AppState> {
        Arc::new(AppState::from_config(AppConfig::default()).unwrap())
    }

    pub fn dispatcher(state: &Arc<AppState>) -> Dispatcher {
        let mut dispatcher = Dispatcher::new(crate::routes::route_table().unwrap());
        register(&mut dispatcher, state);
        dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use http::Method;

    #[test]
    fn test_render_merges_layout_keys() {
        let state = state();
        let req = HandlerRequest::new(Method::GET, "/");
        req.session.flash(FlashKind::Success, "Hola");
        let resp = render(&state, &req, "home/index", json!({ "extra": 1 }));
        assert_eq!(resp.view.as_deref(), Some("home/index"));
        assert_eq!(resp.body["app_name"], "El Faro");
        assert_eq!(resp.body["extra"], 1);
        assert_eq!(resp.body["flash"][0]["mensaje"], "Hola");
        assert_eq!(req.session.pending_flashes(), 0);
        assert!(resp.body.get("csrf_token").is_none());
    }

    #[test]
    fn test_render_form_carries_token() {
        let state = state();
        let req = HandlerRequest::new(Method::GET, "/contacto");
        let resp = render_form(&state, &req, "contacto/index", json!({}));
        assert_eq!(resp.body["csrf_token"], req.session.csrf_token());
        assert_eq!(resp.body["app_name"], "El Faro");
    }

    #[test]
    fn test_page_number() {
        let mut req = HandlerRequest::new(Method::GET, "/articulos");
        assert_eq!(page_number(&req), 1);
        req.query_params.push((Arc::from("pagina"), "3".to_string()));
        assert_eq!(page_number(&req), 3);
        req.query_params.push((Arc::from("pagina"), "abc".to_string()));
        assert_eq!(page_number(&req), 1);
    }

    #[test]
    fn test_require_csrf() {
        let req = HandlerRequest::new(Method::POST, "/login");
        let token = req.session.csrf_token();
        assert!(require_csrf(&req, "/login").is_err());
        let req = req.with_form("csrf_token", &token);
        assert!(require_csrf(&req, "/login").is_ok());
    }
}
