//! Per-request cancellation scopes.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Cancellation scope attached to every request an endpoint forwards.
///
/// Handlers find it in the request extensions (see [`RequestScope::from_request`]).
/// It is cancelled when the endpoint is closed, when the listener shuts down,
/// and when the response for this request has finished or been abandoned by the
/// client. Long-lived handlers must watch it instead of blocking unconditionally.
#[derive(Debug, Clone)]
pub struct RequestScope {
    endpoint_id: u64,
    sequence: u64,
    token: CancellationToken,
}

/// Decorator applied to each request's scope before the handler sees it.
pub type ScopeFn = Arc<dyn Fn(RequestScope) -> RequestScope + Send + Sync>;

impl RequestScope {
    pub(crate) const fn new(endpoint_id: u64, sequence: u64, token: CancellationToken) -> Self {
        Self {
            endpoint_id,
            sequence,
            token,
        }
    }

    /// A scope not owned by any endpoint. Only cancelled explicitly.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(0, 0, CancellationToken::new())
    }

    /// Scope of `request`, or a detached scope when it did not come through an endpoint.
    #[must_use]
    pub fn from_request<B>(request: &http::Request<B>) -> Self {
        request
            .extensions()
            .get::<Self>()
            .cloned()
            .unwrap_or_else(Self::detached)
    }

    /// Id of the endpoint that received the request (0 when detached).
    #[must_use]
    pub const fn endpoint_id(&self) -> u64 {
        self.endpoint_id
    }

    /// Arrival order of the request within its endpoint.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Underlying token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether the scope has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the scope is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Cancel this scope and everything derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// A narrower scope: cancelled with this one, or on its own.
    #[must_use]
    pub fn child(&self) -> Self {
        Self::new(self.endpoint_id, self.sequence, self.token.child_token())
    }

    /// A narrower scope that also cancels itself after `timeout`.
    ///
    /// Must be called from within a Tokio runtime (scope decorators always are).
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let scope = self.child();
        let token = scope.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(timeout) => token.cancel(),
            }
        });
        scope
    }
}
