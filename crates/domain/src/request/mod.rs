//! HTTP request domain types

mod body;
mod header;
mod method;
mod spec;

pub use body::RequestBody;
pub use header::{AUTHORIZATION, Header, Headers};
pub use method::HttpMethod;
pub use spec::RequestSpec;
