use crate::error::HubError;

pub type HubResult<T> = Result<T, HubError>;
