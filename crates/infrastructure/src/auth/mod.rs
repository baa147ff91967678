//! Authentication infrastructure adapters.
//!
//! This module provides the concrete refresh-endpoint client used by the
//! refresh coordinator.

mod http_refresher;

pub use http_refresher::HttpTokenRefresher;
