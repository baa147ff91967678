//! Single-flight token refresh.
//!
//! The first request that needs a refresh starts the one network call on a
//! task of its own. Every request, the first included, parks a oneshot
//! waiter in the queue. When the call settles the task updates (or clears)
//! the token store first, then releases every waiter in arrival order with
//! the same outcome.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tollgate_domain::{AuthError, token_preview};
use tracing::{debug, info, warn};

use super::events::{SessionEvent, SessionEvents};
use super::token_store::TokenStore;
use crate::ports::TokenRefresher;

type Outcome = Result<String, AuthError>;

enum RefreshState {
    Idle,
    Refreshing { waiters: Vec<oneshot::Sender<Outcome>> },
}

/// Serializes token refreshes so concurrent 401s produce one refresh call.
///
/// One coordinator exists per session and is shared by `Arc` with every
/// gateway issuing requests for that session.
pub struct RefreshCoordinator {
    store: TokenStore,
    refresher: Arc<dyn TokenRefresher>,
    events: SessionEvents,
    refresh_timeout: Duration,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    /// Default bound on a single refresh call.
    pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a coordinator over `store`, refreshing through `refresher`.
    #[must_use]
    pub fn new(store: TokenStore, refresher: Arc<dyn TokenRefresher>, events: SessionEvents) -> Self {
        Self {
            store,
            refresher,
            events,
            refresh_timeout: Self::DEFAULT_REFRESH_TIMEOUT,
            state: Mutex::new(RefreshState::Idle),
        }
    }

    /// Set the bound on a single refresh call.
    #[must_use]
    pub const fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// The token store this coordinator writes to.
    #[must_use]
    pub const fn store(&self) -> &TokenStore {
        &self.store
    }

    /// The session event channel.
    #[must_use]
    pub const fn events(&self) -> &SessionEvents {
        &self.events
    }

    /// Returns true while a refresh call is in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock_state(), RefreshState::Refreshing { .. })
    }

    /// Obtain a fresh access token after a request carrying `stale_token`
    /// was rejected.
    ///
    /// If a refresh is in flight the caller waits for its outcome. If none
    /// is in flight but the store already holds a different token, a
    /// refresh completed after the rejected request was sent and that token
    /// is returned without another call. Otherwise a new refresh is started
    /// on its own task and the caller waits for it like everyone else, so a
    /// caller that gives up never cancels the refresh for the others.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::LoggingOut`] without any call while a logout is
    /// in progress, [`AuthError::MissingRefreshToken`] without any call when
    /// no refresh token is held, and the refresh failure otherwise. Every
    /// session-fatal failure clears the store and emits
    /// [`SessionEvent::SessionExpired`] once.
    pub async fn refresh(self: &Arc<Self>, stale_token: Option<&str>) -> Result<String, AuthError> {
        if self.store.is_logging_out() {
            debug!("refresh suppressed, logout in progress");
            return Err(AuthError::LoggingOut);
        }

        let (tx, rx) = oneshot::channel();
        let lead = {
            let mut state = self.lock_state();
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    waiters.push(tx);
                    debug!(position = waiters.len(), "refresh in flight, request queued");
                    false
                }
                RefreshState::Idle => {
                    if let Some(current) = self.store.access_token()
                        && stale_token != Some(current.as_str())
                    {
                        debug!("token already refreshed since request was sent");
                        return Ok(current);
                    }
                    *state = RefreshState::Refreshing { waiters: vec![tx] };
                    true
                }
            }
        };

        if lead {
            let coordinator = Arc::clone(self);
            tokio::spawn(async move { coordinator.drive_refresh().await });
        }
        rx.await.unwrap_or(Err(AuthError::Cancelled))
    }

    async fn drive_refresh(&self) {
        let guard = SettleGuard {
            coordinator: self,
            armed: true,
        };
        let outcome = self.run_refresh().await;
        guard.settle(outcome).await;
    }

    async fn run_refresh(&self) -> Outcome {
        let Some(refresh_token) = self.store.refresh_token() else {
            return Err(AuthError::MissingRefreshToken);
        };

        info!("refreshing access token");
        let call = self.refresher.refresh(&refresh_token);
        let refreshed = tokio::time::timeout(self.refresh_timeout, call)
            .await
            .map_err(|_| AuthError::Timeout {
                timeout_ms: u64::try_from(self.refresh_timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        if self.store.is_logging_out() {
            return Err(AuthError::LoggingOut);
        }
        match self.store.apply_refresh(refreshed).await {
            Some(tokens) => Ok(tokens.access_token),
            None => Err(AuthError::LoggingOut),
        }
    }

    fn take_waiters(&self) -> Vec<oneshot::Sender<Outcome>> {
        let mut state = self.lock_state();
        match std::mem::replace(&mut *state, RefreshState::Idle) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => Vec::new(),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("refresh_timeout", &self.refresh_timeout)
            .finish_non_exhaustive()
    }
}

/// Held by the refresh task until it settles. If the task is torn down
/// first (a panicking refresher, runtime shutdown), queued callers are
/// rejected with `Cancelled` and the coordinator returns to idle.
struct SettleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    armed: bool,
}

impl SettleGuard<'_> {
    async fn settle(mut self, outcome: Outcome) {
        let coordinator = self.coordinator;

        match &outcome {
            Ok(token) => {
                info!(token = %token_preview(token), "access token refreshed");
                coordinator.events.emit(SessionEvent::token_refreshed(token));
            }
            Err(error) if error.is_session_fatal() => {
                warn!(%error, "token refresh failed, clearing session");
                coordinator.store.clear().await;
                coordinator.events.emit(SessionEvent::SessionExpired {
                    reason: error.to_string(),
                });
            }
            Err(_) => debug!("refresh abandoned"),
        }

        // Nothing awaits past this point, so the drain cannot be interrupted.
        self.armed = false;
        let waiters = coordinator.take_waiters();
        debug!(count = waiters.len(), "releasing queued requests");
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let waiters = self.coordinator.take_waiters();
        warn!(count = waiters.len(), "refresh task ended before it settled");
        for waiter in waiters {
            let _ = waiter.send(Err(AuthError::Cancelled));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tollgate_domain::{RefreshedTokens, SessionTokens};

    /// Refresher that blocks until released, then answers with `result`.
    struct GatedRefresher {
        calls: AtomicUsize,
        gate: Notify,
        result: Result<RefreshedTokens, AuthError>,
    }

    impl GatedRefresher {
        fn new(result: Result<RefreshedTokens, AuthError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Notify::new(),
                result,
            })
        }
    }

    impl TokenRefresher for GatedRefresher {
        fn refresh<'a>(
            &'a self,
            _refresh_token: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<RefreshedTokens, AuthError>> + Send + 'a>>
        {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.gate.notified().await;
                self.result.clone()
            })
        }
    }

    fn t2() -> Result<RefreshedTokens, AuthError> {
        Ok(RefreshedTokens {
            access_token: "T2".to_string(),
            refresh_token: None,
        })
    }

    async fn wait_until_refreshing(coordinator: &RefreshCoordinator) {
        while !coordinator.is_refreshing() {
            tokio::task::yield_now().await;
        }
    }

    async fn coordinator_with(refresher: Arc<GatedRefresher>) -> Arc<RefreshCoordinator> {
        let store = TokenStore::new();
        store.set(SessionTokens::new("T1", "R1")).await;
        Arc::new(RefreshCoordinator::new(
            store,
            refresher,
            SessionEvents::default(),
        ))
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let refresher = GatedRefresher::new(t2());
        let coordinator = coordinator_with(refresher.clone()).await;

        let mut handles = Vec::new();
        for _ in 0..3 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move {
                coordinator.refresh(Some("T1")).await
            }));
        }
        wait_until_refreshing(&coordinator).await;
        // Give the other callers time to queue.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        refresher.gate.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok("T2".to_string()));
        }
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.store().access_token().as_deref(), Some("T2"));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_stale_token_skips_refresh() {
        let refresher = GatedRefresher::new(t2());
        let coordinator = coordinator_with(refresher.clone()).await;

        // The store holds T1; a request sent with T0 raced an earlier refresh.
        let token = coordinator.refresh(Some("T0")).await;

        assert_eq!(token, Ok("T1".to_string()));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails_without_call() {
        let refresher = GatedRefresher::new(t2());
        let coordinator = Arc::new(RefreshCoordinator::new(
            TokenStore::new(),
            refresher.clone(),
            SessionEvents::default(),
        ));
        let mut events = coordinator.events().subscribe();

        let result = coordinator.refresh(None).await;

        assert_eq!(result, Err(AuthError::MissingRefreshToken));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            events.try_recv(),
            Ok(SessionEvent::SessionExpired { .. })
        ));
    }

    #[tokio::test]
    async fn test_logging_out_suppresses_refresh() {
        let refresher = GatedRefresher::new(t2());
        let coordinator = coordinator_with(refresher.clone()).await;
        coordinator.store().begin_logout();

        let result = coordinator.refresh(Some("T1")).await;

        assert_eq!(result, Err(AuthError::LoggingOut));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_clears_store_and_rejects_waiters() {
        let rejected = AuthError::RefreshRejected {
            status: 400,
            message: "invalid refresh token".to_string(),
        };
        let refresher = GatedRefresher::new(Err(rejected.clone()));
        let coordinator = coordinator_with(refresher.clone()).await;

        let leader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh(Some("T1")).await })
        };
        wait_until_refreshing(&coordinator).await;
        let follower = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh(Some("T1")).await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        refresher.gate.notify_one();

        assert_eq!(leader.await.unwrap(), Err(rejected.clone()));
        assert_eq!(follower.await.unwrap(), Err(rejected));
        assert_eq!(coordinator.store().get(), None);
    }

    #[tokio::test]
    async fn test_timeout_is_a_refresh_failure() {
        let refresher = GatedRefresher::new(t2());
        let store = TokenStore::new();
        store.set(SessionTokens::new("T1", "R1")).await;
        let coordinator = Arc::new(
            RefreshCoordinator::new(store, refresher, SessionEvents::default())
                .with_refresh_timeout(Duration::from_millis(20)),
        );

        let result = coordinator.refresh(Some("T1")).await;

        assert_eq!(result, Err(AuthError::Timeout { timeout_ms: 20 }));
        assert_eq!(coordinator.store().get(), None);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_first_caller_giving_up_does_not_cancel_refresh() {
        let refresher = GatedRefresher::new(t2());
        let coordinator = coordinator_with(refresher.clone()).await;

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh(Some("T1")).await })
        };
        wait_until_refreshing(&coordinator).await;
        let queued = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh(Some("T1")).await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());
        assert!(coordinator.is_refreshing());

        refresher.gate.notify_one();

        assert_eq!(queued.await.unwrap(), Ok("T2".to_string()));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.store().access_token().as_deref(), Some("T2"));
    }

    struct PanickingRefresher;

    fn explode() -> Result<RefreshedTokens, AuthError> {
        panic!("refresher blew up")
    }

    impl TokenRefresher for PanickingRefresher {
        fn refresh<'a>(
            &'a self,
            _refresh_token: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<RefreshedTokens, AuthError>> + Send + 'a>>
        {
            Box::pin(async { explode() })
        }
    }

    #[tokio::test]
    async fn test_torn_down_refresh_task_releases_waiters() {
        let store = TokenStore::new();
        store.set(SessionTokens::new("T1", "R1")).await;
        let coordinator = Arc::new(RefreshCoordinator::new(
            store,
            Arc::new(PanickingRefresher),
            SessionEvents::default(),
        ));

        let result = coordinator.refresh(Some("T1")).await;

        assert_eq!(result, Err(AuthError::Cancelled));
        assert!(!coordinator.is_refreshing());
        // The session survives a refresh that never settled.
        assert_eq!(coordinator.store().access_token().as_deref(), Some("T1"));
    }
}
