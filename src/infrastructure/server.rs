// Server module - builds the HTTP application and binds it to a free port

use axum::Router;
use axum::http::HeaderValue;
use std::net::{SocketAddr, TcpListener};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api;
use crate::api_docs::ApiDoc;
use crate::infrastructure::AppState;
use crate::infrastructure::config::Config;

/// CORS layer for the configured origins; any origin when none are set.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let mut allowed = Vec::new();
    for origin in origins {
        match origin.parse::<HeaderValue>() {
            Ok(v) => allowed.push(v),
            Err(e) => tracing::error!("Failed to parse CORS origin '{}': {}", origin, e),
        }
    }
    base.allow_origin(allowed)
}

/// Full application: `/api`, Swagger UI at `/api/docs` and avatar files under `/uploads`.
pub fn build_router(state: AppState, config: &Config) -> Router {
    let uploads = ServeDir::new(state.avatars.root().clone());

    Router::new()
        .merge(SwaggerUi::new("/api/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api::api_router(state))
        .nest_service("/uploads", uploads)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_allowed_origins))
}

/// Find an available port starting from the preferred port on a specific IP
pub fn find_available_port_on_ip(preferred_port: u16, ip: &str) -> Option<u16> {
    if TcpListener::bind((ip, preferred_port)).is_ok() {
        return Some(preferred_port);
    }

    // Scan next 100 ports
    (preferred_port.saturating_add(1)..=preferred_port.saturating_add(100))
        .filter(|&port| port != preferred_port)
        .find(|&port| TcpListener::bind((ip, port)).is_ok())
}

/// Bind the application and serve until the process stops.
pub async fn serve(app: Router, preferred_port: u16) -> Result<(), String> {
    let port = find_available_port_on_ip(preferred_port, "0.0.0.0")
        .ok_or_else(|| format!("No free port found from {}", preferred_port))?;
    if port != preferred_port {
        tracing::warn!(
            "Preferred port {} was not available, using port {} instead",
            preferred_port,
            port
        );
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!("Dojo console listening on {}", addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("HTTP server error: {}", e))
}
