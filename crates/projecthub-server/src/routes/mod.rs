pub mod boards;
pub mod health;
pub mod sprints;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let boards = boards::router().merge(sprints::router());

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/boards", boards)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
