//! Tollgate Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer, the settings loader, and the
//! wiring that assembles an authenticated gateway from settings.

pub mod adapters;
pub mod auth;
pub mod client;
pub mod persistence;
pub mod serialization;
pub mod settings;

pub use adapters::ReqwestHttpClient;
pub use auth::HttpTokenRefresher;
pub use client::{ClientBuildError, build_gateway};
pub use persistence::FileTokenRepository;
pub use serialization::{SerializationError, from_json_bytes, to_json_stable, to_json_stable_bytes};
pub use settings::{SettingsError, load_settings};
