pub mod auth;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use auth::{Claims, CurrentUser, JwtKeys};
pub use error::{ApiError, ErrorEnvelope};
pub use routes::build_router;
pub use state::AppState;
