use crate::handlers::{
    attendance::{check_in, get_status},
    health::health_check,
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware.
///
/// When `webapp_dir` is given, unmatched paths fall through to the mini-app's
/// static files.
pub fn create_router(state: AppState, webapp_dir: Option<&Path>) -> Router {
    let router = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Mini-app API
        .route("/api/status", get(get_status))
        .route("/api/check-in", post(check_in))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let router = match webapp_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
