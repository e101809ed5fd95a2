//! The caller identity every board operation runs on behalf of.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board::Board;

pub type UserId = Uuid;

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedPrincipal {
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl AuthenticatedPrincipal {
    pub fn new(user_id: UserId, name: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            roles,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    /// Owners and admins may change a board's structure and sprints.
    pub fn can_manage(&self, board: &Board) -> bool {
        self.is_admin() || board.is_owned_by(self.user_id)
    }
}
