pub mod config;
pub mod error;
pub mod logging;
pub mod result;

pub use config::{AppConfig, ConfigOverrides};
pub use error::{ErrorKind, HubError};
pub use result::HubResult;
