//! Server construction and middleware wiring.

mod config;
mod state_builders;

pub use config::{AppSettings, ServerConfig};
pub use state_builders::build_http_state;

use actix_session::{
    SessionMiddleware,
    config::{CookieContentSecurity, PersistentSession},
    storage::CookieSessionStore,
};
use actix_web::cookie::{Key, SameSite};
use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};

#[cfg(debug_assertions)]
use tokengate::ApiDoc;
use tokengate::inbound::http::health::{HealthState, live, ready};
use tokengate::inbound::http::routes;
use tokengate::inbound::http::state::HttpState;
use tokengate::middleware::{OriginGate, Trace};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

/// Cookie lifetime; the server-side session TTL is authoritative.
const COOKIE_TTL_DAYS: i64 = 30;

fn session_middleware(
    key: Key,
    cookie_secure: bool,
    same_site: SameSite,
) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name("session".into())
        .cookie_path("/".into())
        .cookie_secure(cookie_secure)
        .cookie_http_only(true)
        .cookie_content_security(CookieContentSecurity::Private)
        .cookie_same_site(same_site)
        .session_lifecycle(
            PersistentSession::default()
                .session_ttl(actix_web::cookie::time::Duration::days(COOKIE_TTL_DAYS)),
        )
        .build()
}

/// Construct the HTTP server.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    http_state: HttpState,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let server_health_state = health_state.clone();
    let http_state = web::Data::new(http_state);
    let ServerConfig {
        key,
        cookie_secure,
        same_site,
        bind_addr,
        allowed_origins,
    } = config;

    let server = HttpServer::new(move || {
        let app = App::new()
            .app_data(server_health_state.clone())
            .app_data(http_state.clone())
            .service(ready)
            .service(live)
            .configure(routes::configure);

        #[cfg(debug_assertions)]
        let app =
            app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

        // Wraps apply innermost first; Trace is outermost so refused origins
        // still carry a trace id.
        app.wrap(session_middleware(key.clone(), cookie_secure, same_site))
            .wrap(OriginGate::new(allowed_origins.clone()))
            .wrap(Trace)
    })
    .bind(bind_addr)?
    .run();

    health_state.mark_ready();
    Ok(server)
}
