//! The site's route table.

use crate::error::RouteError;
use crate::router::RouteTable;

/// Every binding served by El Faro, in registration order.
///
/// `/articulos/buscar` and `/articulos/recientes` are literals, so they win over
/// `/articulos/{id}` wherever they are registered.
pub fn route_table() -> Result<RouteTable, RouteError> {
    let mut routes = RouteTable::new();

    routes.get("/", "Home.index")?;
    routes.get("/home", "Home.index")?;

    routes.get("/articulos", "Article.index")?;
    routes.get("/articulos/buscar", "Article.search")?;
    routes.get("/articulos/recientes", "Article.recent")?;
    routes.get("/articulos/categoria/{categoria}", "Article.byCategory")?;
    routes.get("/articulos/{id}", "Article.show")?;

    routes.get("/registro", "Auth.showRegister")?;
    routes.post("/registro", "Auth.register")?;
    routes.get("/login", "Auth.showLogin")?;
    routes.post("/login", "Auth.login")?;
    routes.get("/logout", "Auth.logout")?;

    routes.get("/contacto", "Contact.show")?;
    routes.post("/contacto", "Contact.submit")?;

    routes.get("/perfil", "Profile.index")?;
    routes.get("/perfil/activar-suscripcion", "Profile.activateSubscription")?;
    routes.post("/perfil/activar-suscripcion", "Profile.activateSubscription")?;
    routes.post("/perfil/desactivar-suscripcion", "Profile.deactivateSubscription")?;
    routes.post("/perfil/actualizar", "Profile.update")?;

    Ok(routes)
}
