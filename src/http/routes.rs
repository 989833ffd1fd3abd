use super::handlers;
use super::state::AppState;
use super::ws;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Attach channel
        .route("/ws", get(ws::ws_handler))
        // Session control
        .route("/sessions/start", post(handlers::start_session))
        .route("/sessions/:session_id/stop", post(handlers::stop_session))
        // Session queries
        .route("/sessions/:session_id", get(handlers::get_session))
        .route(
            "/sessions/:session_id/transcript",
            get(handlers::get_transcript),
        )
        // Question lifecycle
        .route(
            "/sessions/:session_id/questions/:question_id/answered",
            post(handlers::mark_question_answered),
        )
        .route(
            "/sessions/:session_id/questions/:question_id",
            delete(handlers::delete_question),
        )
        // Request logging middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
