//! Service entry point: loads settings, prepares storage and runs the HTTP
//! server.

mod server;

use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use color_eyre::eyre::{Context, Result, eyre};
use mockable::{Clock, DefaultClock, DefaultEnv};
use ortho_config::OrthoConfig;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use tokengate::domain::SessionAuthenticator;
use tokengate::inbound::http::health::HealthState;
use tokengate::inbound::http::session_config::{BuildMode, session_settings_from_env};
use tokengate::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};

use server::{AppSettings, ServerConfig, build_http_state, create_server};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load_from_iter(std::env::args_os())
        .map_err(|err| eyre!("failed to load configuration: {err}"))?;
    let mode = BuildMode::from_debug_assertions();
    let session = session_settings_from_env(&DefaultEnv::new(), mode)
        .wrap_err("invalid session cookie settings")?;

    let pool = match settings.database_url.as_deref() {
        Some(url) => {
            run_pending_migrations(url)
                .await
                .wrap_err("database migrations failed")?;
            let pool = DbPool::new(PoolConfig::new(url))
                .await
                .wrap_err("failed to connect to the database")?;
            Some(pool)
        }
        None => None,
    };

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let http_state = build_http_state(&settings, pool.as_ref(), clock, mode)?;
    spawn_session_purge(http_state.authenticator.clone());

    let bind_addr = settings.bind_addr()?;
    let config = ServerConfig::new(
        session.key,
        session.cookie_secure,
        session.same_site,
        bind_addr,
    )
    .with_allowed_origins(settings.allowed_origins()?);

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, http_state, config)
        .wrap_err_with(|| format!("failed to bind {bind_addr}"))?;
    info!(%bind_addr, "listening");
    server.await.wrap_err("server terminated abnormally")
}

fn spawn_session_purge(authenticator: SessionAuthenticator) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match authenticator.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "purged expired sessions"),
                Err(err) => error!(code = ?err.code(), message = err.message(), "session purge failed"),
            }
        }
    });
}
