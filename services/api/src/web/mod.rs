pub mod middleware;
pub mod page;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

pub use middleware::ensure_session;
pub use rest::{get_lesson_handler, improve_lesson_handler, list_lessons_handler, submit_lesson_handler};
pub use ws_handler::ws_handler;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Builds the application router: HTML pages, JSON API and WebSocket, all
/// behind the session middleware.
pub fn create_router(app_state: Arc<AppState>, cors: CorsLayer) -> Router {
    let pages = Router::new()
        .route("/", get(page::index_handler))
        .route("/lessons", post(page::submit_form_handler))
        .route("/lessons/{id}", get(page::lesson_view_handler));

    let api = Router::new()
        .route("/api/lessons", post(submit_lesson_handler).get(list_lessons_handler))
        .route("/api/lessons/improve", post(improve_lesson_handler))
        .route("/api/lessons/{id}", get(get_lesson_handler))
        .route("/ws", get(ws_handler));

    Router::new()
        .merge(pages)
        .merge(api)
        .layer(axum_middleware::from_fn(ensure_session))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}
