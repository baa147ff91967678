//! Authentication domain types

mod endpoints;
mod types;

pub use endpoints::AuthEndpoints;
pub use types::{AuthError, Credentials, RefreshedTokens, SessionTokens, bearer, token_preview};
