//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the application core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod http_client;
mod token_persistence;
mod token_refresher;

pub use http_client::{HttpClient, HttpClientError};
pub use token_persistence::{PersistenceError, TokenPersistence};
pub use token_refresher::TokenRefresher;
