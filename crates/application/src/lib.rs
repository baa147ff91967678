//! Tollgate Application - Authenticated request flow and ports
//!
//! This crate defines the application layer with:
//! - Port traits (HTTP execution, token refresh, token persistence)
//! - The token store, refresh coordinator and authenticated gateway
//! - Application-level error handling

pub mod auth;
pub mod error;
pub mod ports;

pub use auth::{
    AuthGateway, RefreshCoordinator, SessionEvent, SessionEvents, TokenStatus, TokenStore,
};
pub use error::{GatewayError, GatewayResult};
pub use ports::{
    HttpClient, HttpClientError, PersistenceError, TokenPersistence, TokenRefresher,
};
