use serde_json::json;

use super::render;
use crate::app::AppState;
use crate::dispatcher::{HandlerRequest, HandlerResponse};

/// 404 page, used for unmatched routes and for unknown records.
pub fn not_found(state: &AppState, req: &HandlerRequest) -> HandlerResponse {
    render(
        state,
        req,
        "errors/404",
        json!({
            "titulo": "Página no encontrada",
            "error_code": "404",
            "error_message": "Página no encontrada",
            "error_description": "La página que buscas no existe o ha sido movida.",
            "suggestions": [
                "Verificar que la URL sea correcta",
                "Usar el menú de navegación para encontrar lo que buscas",
                "Volver a la página de inicio",
            ],
        }),
    )
    .with_status(404)
}
