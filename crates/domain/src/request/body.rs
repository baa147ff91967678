//! HTTP request body types

use serde::{Deserialize, Serialize};

/// HTTP request body.
///
/// Bodies are kept in memory so a request can be replayed after a token
/// refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestBody {
    /// No body
    #[default]
    None,
    /// JSON document
    Json {
        /// The document
        value: serde_json::Value,
    },
    /// Raw text with an explicit content type
    Raw {
        /// The content type (e.g., "text/plain")
        content_type: String,
        /// The body content
        content: String,
    },
}

impl RequestBody {
    /// Creates a JSON body.
    #[must_use]
    pub const fn json(value: serde_json::Value) -> Self {
        Self::Json { value }
    }

    /// Creates a plain text body.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Raw {
            content_type: "text/plain".to_string(),
            content: content.into(),
        }
    }

    /// Returns whether the body is absent.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the content type if applicable.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Json { .. } => Some("application/json"),
            Self::Raw { content_type, .. } => Some(content_type),
        }
    }

    /// Serializes the body to bytes for the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON document cannot be serialized.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::None => Ok(Vec::new()),
            Self::Json { value } => serde_json::to_vec(value),
            Self::Raw { content, .. } => Ok(content.clone().into_bytes()),
        }
    }
}
