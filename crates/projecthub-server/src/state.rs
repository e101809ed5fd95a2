use projecthub_domain::ScrumBoardService;
use std::sync::Arc;

use crate::auth::JwtKeys;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScrumBoardService>,
    pub keys: Arc<JwtKeys>,
}

impl AppState {
    pub fn new(service: ScrumBoardService, keys: JwtKeys) -> Self {
        Self {
            service: Arc::new(service),
            keys: Arc::new(keys),
        }
    }
}
