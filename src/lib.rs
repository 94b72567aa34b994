pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod patch;
pub mod personnel;
pub mod server;
pub mod store;
pub mod stream;

pub use config::{AppConfig, AuthConfig, LogConfig, ServerConfig, StoreConfig};
pub use error::{ImsError, ImsResult};
pub use model::*;
