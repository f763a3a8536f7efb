//! Failing-test helpers on top of [`MockEndpoint::await_request`].

use std::time::Duration;

use crate::{EndpointError, IncomingRequest, MockEndpoint};

/// The test-framework hooks used to report assertion failures.
pub trait TestScope: Send + Sync {
    /// Record a failure without stopping the test.
    fn error(&self, message: &str);

    /// Stop the test immediately.
    fn fail_now(&self) -> !;
}

impl MockEndpoint {
    /// Wait for the next request, failing the test if none arrives in time.
    pub async fn require_request<S>(&self, scope: &S, timeout: Duration) -> IncomingRequest
    where
        S: TestScope + ?Sized,
    {
        match self.await_request(timeout).await {
            Ok(request) => request,
            Err(err) => {
                scope.error(&format!("expected a request: {err}"));
                scope.fail_now()
            }
        }
    }

    /// Fail the test if a request arrives within `timeout`.
    pub async fn require_no_more_requests<S>(&self, scope: &S, timeout: Duration)
    where
        S: TestScope + ?Sized,
    {
        match self.await_request(timeout).await {
            Err(EndpointError::Timeout { .. } | EndpointError::Closed { .. }) => {}
            Err(err) => {
                scope.error(&format!("unexpected error while checking for requests: {err}"));
                scope.fail_now();
            }
            Ok(request) => {
                scope.error(&format!(
                    "did not expect any more requests to {}, but got {} {}",
                    self.label(),
                    request.method,
                    request.uri
                ));
                scope.fail_now();
            }
        }
    }
}
