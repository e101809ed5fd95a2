use axum::Json;
use serde::Serialize;

/// Commit the binary was built from, or "unknown" outside a git checkout.
pub const COMMIT: &str = match option_env!("PROJECTHUB_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub commit: &'static str,
}

/// GET /api/health
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        commit: COMMIT,
    })
}
