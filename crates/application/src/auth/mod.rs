//! Authenticated request flow.
//!
//! This module provides:
//! - The session token store with optional durable persistence
//! - The refresh coordinator (single-flight refresh with a waiter queue)
//! - The authenticated gateway that attaches bearer tokens and recovers from 401
//! - Session events replacing the sign-in redirect

mod coordinator;
mod events;
mod gateway;
mod token_store;

pub use coordinator::RefreshCoordinator;
pub use events::{SessionEvent, SessionEvents};
pub use gateway::AuthGateway;
pub use token_store::{TokenStatus, TokenStore};
