use serde_json::json;
use tracing::{error, info, warn};

use super::{fail, render_form, require_csrf};
use crate::app::AppState;
use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::error::GENERIC_FAILURE_MESSAGE;
use crate::models::{NewUser, Plan};
use crate::security::{hash_password, verify_password};
use crate::session::FlashKind;
use crate::validation::{is_valid_email, Validator};

const MIN_NAME_CHARS: usize = 2;
const MIN_PASSWORD_CHARS: usize = 6;
const DEFAULT_PLAN_PRICE: &str = "10000";

fn plans() -> serde_json::Value {
    json!([
        { "precio": "5000", "plan": Plan::Basic, "nombre": Plan::Basic.label() },
        { "precio": "10000", "plan": Plan::Premium, "nombre": Plan::Premium.label() },
        { "precio": "15000", "plan": Plan::Vip, "nombre": Plan::Vip.label() },
    ])
}

/// `GET /registro`
pub fn show_register(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    if req.session.is_authenticated() {
        return HandlerResponse::redirect("/perfil");
    }
    render_form(
        state,
        req,
        "auth/register",
        json!({
            "titulo": "Registro",
            "planes": plans(),
            "plan_por_defecto": DEFAULT_PLAN_PRICE,
        }),
    )
}

fn registration_errors(name: &str, email: &str, password: &str, confirmation: &str) -> Validator {
    let mut v = Validator::new();
    if name.is_empty() {
        v.add("nombre", "El nombre es requerido");
    } else if name.chars().count() < MIN_NAME_CHARS {
        v.add("nombre", "El nombre debe tener al menos 2 caracteres");
    }

    if email.is_empty() {
        v.add("email", "El correo electrónico es requerido");
    } else if !is_valid_email(email) {
        v.add("email", "El correo electrónico no es válido");
    }

    if password.is_empty() {
        v.add("password", "La contraseña es requerida");
    } else if password.chars().count() < MIN_PASSWORD_CHARS {
        v.add("password", "La contraseña debe tener al menos 6 caracteres");
    }
    if password != confirmation {
        v.add("confirm_password", "Las contraseñas no coinciden");
    }
    v
}

/// `POST /registro`
pub fn register(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    if let Err(resp) = require_csrf(req, "/registro") {
        return resp;
    }

    let name = req.form_text("nombre");
    let email = req.form_text("email");
    let password = req.get_form_param("password").unwrap_or_default();
    let confirmation = req.get_form_param("confirm_password").unwrap_or_default();

    let mut v = registration_errors(&name, &email, password, confirmation);
    if !v.has_errors() && state.users.exists_by_email(&email) {
        v.add("email", "Este correo electrónico ya está registrado");
    }
    if let Err(errors) = v.finish() {
        for message in errors.messages() {
            req.session.flash(FlashKind::Error, message);
        }
        return HandlerResponse::redirect("/registro");
    }

    let price = req
        .get_form_param("plan")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PLAN_PRICE);
    let plan = Plan::from_price(price);
    let password_hash = match hash_password(password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Password hashing failed");
            return fail(req, GENERIC_FAILURE_MESSAGE, "/registro");
        }
    };
    let new_user = NewUser::new(&name, &email, &password_hash).with_plan(plan, true);

    match state.users.create(new_user) {
        Ok(user) => {
            info!(user_id = %user.id, plan = %user.plan, "User registered");
            req.session.flash(
                FlashKind::Success,
                "¡Registro exitoso! Ahora puedes iniciar sesión",
            );
            render_form(
                state,
                req,
                "auth/login",
                json!({
                    "titulo": "Iniciar sesión",
                    "email": user.email,
                    "show_registration_success": true,
                }),
            )
        }
        Err(err) => {
            warn!(error = %err, "Registration failed");
            fail(req, &err.user_message(), "/registro")
        }
    }
}

/// `GET /login`
pub fn show_login(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    if req.session.is_authenticated() {
        return HandlerResponse::redirect("/perfil");
    }
    render_form(
        state,
        req,
        "auth/login",
        json!({
            "titulo": "Iniciar sesión",
            "email": "",
            "show_registration_success": false,
        }),
    )
}

/// `POST /login`
pub fn login(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    if let Err(resp) = require_csrf(req, "/login") {
        return resp;
    }

    let email = req.form_text("email");
    let password = req.get_form_param("password").unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return fail(req, "Email y contraseña son requeridos", "/login");
    }

    let user = state
        .users
        .find_by_email(&email)
        .filter(|u| verify_password(password, &u.password_hash));
    let Some(user) = user else {
        info!("Login rejected");
        return fail(req, "Credenciales incorrectas", "/login");
    };

    info!(user_id = %user.id, "User logged in");
    req.session.regenerate_id();
    req.session.set_user(Some(user.to_public()));
    req.session.rotate_csrf();
    req.session.flash(FlashKind::Success, "¡Bienvenido de vuelta!");
    HandlerResponse::redirect("/")
}

/// `GET /logout`
pub fn logout(_state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    req.session.regenerate_id();
    req.session.set_user(None);
    req.session.rotate_csrf();
    req.session
        .flash(FlashKind::Success, "Has cerrado sesión correctamente");
    HandlerResponse::redirect("/")
}
