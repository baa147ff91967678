//! Tollgate Domain - Core types
//!
//! This crate defines the domain model for the Tollgate API client:
//! session tokens, request and response specifications, the auth
//! endpoint table and client settings.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod error;
pub mod request;
pub mod response;
pub mod settings;

pub use auth::{
    AuthEndpoints, AuthError, Credentials, RefreshedTokens, SessionTokens, bearer, token_preview,
};
pub use error::{DomainError, DomainResult};
pub use request::{AUTHORIZATION, Header, Headers, HttpMethod, RequestBody, RequestSpec};
pub use response::ResponseSpec;
pub use settings::ClientSettings;
