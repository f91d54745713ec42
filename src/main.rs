mod api;
mod certificates;
mod config;
mod error;
mod pdf;
mod routes;
mod session;
mod state;
mod templates;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "movilis=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let config = Arc::new(config);

    let store = session::store::SessionStore::open(&config.storage_folder)?;
    let sessions = session::SessionManager::new(store);
    sessions.restore().await;

    let api = api::ApiClient::new(&config.api_base_url, config.api_timeout);

    let state = Arc::new(state::AppState {
        config: config.clone(),
        api,
        session: sessions,
    });

    let app = Router::new()
        .route("/", get(routes::index))
        .route("/login", get(routes::login_page).post(routes::login_submit))
        .route("/logout", post(routes::logout))
        .route("/dashboard", get(routes::dashboard))
        .route("/admin/certificados", get(routes::admin_certificados))
        .route(
            "/admin/certificados/crear",
            get(routes::crear_certificado_page).post(routes::crear_certificado_submit),
        )
        .route(
            "/admin/certificados/crear-rapido",
            get(routes::crear_rapido_page).post(routes::crear_rapido_submit),
        )
        .route(
            "/admin/certificados/descargar-todo",
            get(routes::download_all),
        )
        .route(
            "/admin/certificados/:id/asignar",
            get(routes::asignar_page).post(routes::asignar_certificado),
        )
        .route(
            "/admin/certificados/:id/actualizar",
            post(routes::actualizar_certificado),
        )
        .route(
            "/admin/usuarios/crear",
            get(routes::crear_usuario_page).post(routes::crear_usuario_submit),
        )
        .route(
            "/certificados/:id/descargar",
            get(routes::download_certificado),
        )
        .route("/api/session", get(routes::session_status))
        .route("/api/session/clear", post(routes::clear_session_error))
        .route("/api/verificar", get(routes::verificar_codigo))
        .nest_service("/static", tower_http::services::ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Movilis listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
