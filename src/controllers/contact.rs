use serde_json::json;
use tracing::{info, warn};

use super::{render_form, INVALID_CSRF};
use crate::app::AppState;
use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::models::NewContactMessage;
use crate::session::FlashKind;
use crate::validation::{Rule, Validator};

const SENT_FLASH: &str = "¡Mensaje enviado correctamente! Te contactaremos pronto.";
const SENT_JSON: &str = "Mensaje enviado correctamente";

/// `GET /contacto`
pub fn show(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    render_form(state, req, "contacto/index", json!({ "titulo": "Contacto" }))
}

/// AJAX callers get JSON; everyone else gets flashes and a redirect back to the form.
fn reject(req: &HandlerRequest, status: u16, messages: Vec<String>) -> HandlerResponse {
    if req.is_ajax() {
        return HandlerResponse::json(status, json!({ "success": false, "errors": messages }));
    }
    for message in messages {
        req.session.flash(FlashKind::Error, message);
    }
    HandlerResponse::redirect("/contacto")
}

/// `POST /contacto`
pub fn submit(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    if !req.session.verify_csrf(req.get_form_param("csrf_token")) {
        return reject(req, 403, vec![INVALID_CSRF.to_string()]);
    }

    let name = req.form_text("nombre");
    let email = req.form_text("email");
    let message = req.form_text("mensaje");

    let mut v = Validator::new();
    v.check("nombre", &name, &[Rule::Required, Rule::Min(2), Rule::Max(100)])
        .check("email", &email, &[Rule::Required, Rule::Email])
        .check("mensaje", &message, &[Rule::Required, Rule::Min(10), Rule::Max(1000)]);
    if let Err(errors) = v.finish() {
        return reject(req, 400, errors.messages());
    }

    let draft = NewContactMessage::new(&name, &email, &message).from_ip(req.remote_addr.clone());
    match state.contacts.create(draft) {
        Ok(saved) => {
            info!(message_id = saved.id, "Contact message stored");
            if req.is_ajax() {
                return HandlerResponse::json(200, json!({ "success": true, "message": SENT_JSON }));
            }
            req.session.flash(FlashKind::Success, SENT_FLASH);
            HandlerResponse::redirect("/contacto")
        }
        Err(err) => {
            warn!(error = %err, "Contact message not stored");
            reject(req, 500, vec![err.user_message()])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_support::state;
    use http::Method;

    fn form(ajax: bool) -> HandlerRequest {
        let req = HandlerRequest::new(Method::POST, "/contacto");
        let token = req.session.csrf_token();
        let req = req.with_form("csrf_token", &token);
        if ajax {
            req.with_header("X-Requested-With", "XMLHttpRequest")
        } else {
            req
        }
    }

    #[test]
    fn test_ajax_validation_errors() {
        let state = state();
        let req = form(true)
            .with_form("nombre", "A")
            .with_form("email", "x@y.cl")
            .with_form("mensaje", "corto");
        let resp = submit(&state, &req);
        assert_eq!(resp.status, 400);
        assert_eq!(resp.body["success"], false);
        assert_eq!(resp.body["errors"].as_array().unwrap().len(), 2);
        assert_eq!(state.contacts.count(), 0);
    }

    #[test]
    fn test_ajax_bad_csrf_is_forbidden() {
        let state = state();
        let req = HandlerRequest::new(Method::POST, "/contacto")
            .with_header("Accept", "application/json")
            .with_form("csrf_token", "otro");
        let resp = submit(&state, &req);
        assert_eq!(resp.status, 403);
        assert_eq!(resp.body["errors"][0], INVALID_CSRF);
    }

    #[test]
    fn test_submit_stores_message_with_ip() {
        let state = state();
        let mut req = form(false)
            .with_form("nombre", "Ana")
            .with_form("email", "ana@elfaro.cl")
            .with_form("mensaje", "Quisiera suscribirme al boletín semanal.");
        req.remote_addr = Some("10.0.0.7".to_string());
        let resp = submit(&state, &req);
        assert_eq!(resp.get_header("location"), Some("/contacto"));
        assert_eq!(req.session.take_flashes()[0].message, SENT_FLASH);

        let stored = state.contacts.list_all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].ip.as_deref(), Some("10.0.0.7"));
        assert!(!stored[0].read);
    }

    #[test]
    fn test_ajax_success() {
        let state = state();
        let req = form(true)
            .with_form("nombre", "Ana")
            .with_form("email", "ana@elfaro.cl")
            .with_form("mensaje", "Un mensaje suficientemente largo.");
        let resp = submit(&state, &req);
        assert_eq!(resp.body, json!({ "success": true, "message": SENT_JSON }));
    }
}
