use http::Method;
use serde_json::json;
use tracing::{info, warn};

use super::{fail, render_form, require_csrf, require_user};
use crate::app::AppState;
use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::models::{self, Plan, PublicUser, User};
use crate::session::FlashKind;
use crate::validation::{Rule, Validator};

const PREMIUM_BENEFITS: [&str; 4] = [
    "Acceso completo a todos los artículos",
    "Newsletter personalizado",
    "Contenido exclusivo",
    "Sin publicidad",
];

/// Current stored record for the session user. A user deleted since login is logged out.
fn load_user(
    state: &AppState,
    req: &HandlerRequest,
    session_user: &PublicUser,
) -> Result<User, HandlerResponse> {
    match state.users.find_by_id(&session_user.id) {
        Some(user) => Ok(user),
        None => {
            warn!(user_id = %session_user.id, "Session user no longer exists");
            req.session.set_user(None);
            Err(fail(req, "Debes iniciar sesión para acceder a tu perfil", "/login"))
        }
    }
}

/// Persist `user`, refresh the session copy and redirect to the profile.
fn save(state: &AppState, req: &HandlerRequest, user: &User, success: &str) -> HandlerResponse {
    match state.users.update(user) {
        Ok(saved) => {
            info!(user_id = %saved.id, plan = %saved.plan, subscribed = saved.subscribed, "Profile updated");
            req.session.set_user(Some(saved.to_public()));
            req.session.flash(FlashKind::Success, success);
            HandlerResponse::redirect("/perfil")
        }
        Err(err) => {
            warn!(user_id = %user.id, error = %err, "Profile update failed");
            fail(req, &err.user_message(), "/perfil")
        }
    }
}

/// `GET /perfil`
pub fn index(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    let session_user = match require_user(req, "Debes iniciar sesión para acceder a tu perfil") {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let user = match load_user(state, req, &session_user) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let public = user.to_public();
    req.session.set_user(Some(public.clone()));
    render_form(
        state,
        req,
        "perfil/index",
        json!({
            "titulo": "Mi perfil",
            "usuario": public,
            "estadisticas": {
                "dias_registrado": user.days_registered(models::now()),
                "plan_actual": user.plan.label(),
                "suscrito": user.subscribed,
            },
            "beneficios_premium": PREMIUM_BENEFITS,
        }),
    )
}

/// `GET|POST /perfil/activar-suscripcion`. The form token is only checked on POST.
pub fn activate_subscription(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    let session_user = match require_user(req, "Debes iniciar sesión para activar la suscripción")
    {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    if req.method == Method::POST {
        if let Err(resp) = require_csrf(req, "/perfil") {
            return resp;
        }
    }
    let mut user = match load_user(state, req, &session_user) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    user.plan = Plan::Premium;
    user.subscribed = true;
    save(
        state,
        req,
        &user,
        "¡Suscripción Premium activada! Ahora tienes acceso completo a El Faro",
    )
}

/// `POST /perfil/desactivar-suscripcion`
pub fn deactivate_subscription(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    let session_user =
        match require_user(req, "Debes iniciar sesión para gestionar tu suscripción") {
            Ok(user) => user,
            Err(resp) => return resp,
        };
    if let Err(resp) = require_csrf(req, "/perfil") {
        return resp;
    }
    let mut user = match load_user(state, req, &session_user) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    user.plan = Plan::Free;
    user.subscribed = false;
    save(
        state,
        req,
        &user,
        "Suscripción cancelada. Ahora tienes acceso básico a El Faro",
    )
}

/// `POST /perfil/actualizar`. An unchecked newsletter box is simply absent from the form.
pub fn update(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    let session_user = match require_user(req, "Debes iniciar sesión para actualizar tu perfil") {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    if let Err(resp) = require_csrf(req, "/perfil") {
        return resp;
    }

    let name = req.form_text("nombre");
    let email = req.form_text("email");
    let mut v = Validator::new();
    v.check("nombre", &name, &[Rule::Required, Rule::Min(2), Rule::Max(100)])
        .check_labeled(
            "email",
            "correo electrónico",
            &email,
            &[Rule::Required, Rule::Email],
        );
    if !v.has_errors()
        && state
            .users
            .find_by_email(&email)
            .is_some_and(|other| other.id != session_user.id)
    {
        v.add("email", "Este correo electrónico ya está registrado");
    }
    if let Err(errors) = v.finish() {
        for message in errors.messages() {
            req.session.flash(FlashKind::Error, message);
        }
        return HandlerResponse::redirect("/perfil");
    }

    let mut user = match load_user(state, req, &session_user) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    user.name = name;
    user.email = email;
    user.subscribed = req.get_form_param("newsletter").is_some();
    save(state, req, &user, "Perfil actualizado correctamente")
}
