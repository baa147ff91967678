//! Session lifecycle events.

use tokio::sync::broadcast;
use tollgate_domain::token_preview;

/// Events emitted as the session changes, for the hosting application.
///
/// `SessionExpired` stands in for the sign-in redirect: subscribers decide
/// how to send the user back to sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Tokens obtained through login or registration.
    LoggedIn {
        /// Preview of the access token.
        token_preview: String,
    },
    /// Access token replaced by a refresh.
    TokenRefreshed {
        /// Preview of the new access token.
        token_preview: String,
    },
    /// Refresh failed; tokens were cleared and the user must sign in again.
    SessionExpired {
        /// Why the refresh failed.
        reason: String,
    },
    /// Logout finished and tokens were cleared.
    LoggedOut,
}

impl SessionEvent {
    pub(crate) fn logged_in(access_token: &str) -> Self {
        Self::LoggedIn {
            token_preview: token_preview(access_token),
        }
    }

    pub(crate) fn token_refreshed(access_token: &str) -> Self {
        Self::TokenRefreshed {
            token_preview: token_preview(access_token),
        }
    }
}

/// Broadcast channel for [`SessionEvent`]s. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    /// Default number of buffered events per subscriber.
    pub const DEFAULT_CAPACITY: usize = 32;

    /// Create a channel buffering `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Emit an event. Having no subscribers is not an error.
    pub fn emit(&self, event: SessionEvent) {
        tracing::debug!(?event, "session event");
        let _ = self.sender.send(event);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
