use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by outer layers to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    BadRequest,
    Conflict,
    Internal,
}

impl HubError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{} {}", what, id))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::BadRequest,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Database(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            HubError::Validation("x".into()).kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(HubError::not_found("Board", 7).kind(), ErrorKind::NotFound);
        assert_eq!(HubError::Conflict("x".into()).kind(), ErrorKind::Conflict);
        assert_eq!(HubError::Database("x".into()).kind(), ErrorKind::Internal);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(HubError::from(io).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_not_found_message() {
        let err = HubError::not_found("Sprint", "abc");
        assert_eq!(err.to_string(), "Not found: Sprint abc");
    }
}
