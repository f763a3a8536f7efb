//! A [`TestScope`] for plain `#[test]` / `#[tokio::test]` functions.

use fdsim_endpoints::TestScope;
use parking_lot::Mutex;
use tracing::error;

/// Records failures and panics on [`TestScope::fail_now`], which is how
/// Rust test harnesses stop a test.
#[derive(Debug, Default)]
pub struct PanicTestScope {
    errors: Mutex<Vec<String>>,
}

impl PanicTestScope {
    /// Empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Failures recorded so far.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl TestScope for PanicTestScope {
    fn error(&self, message: &str) {
        error!(failure = message, "Test expectation failed");
        self.errors.lock().push(message.to_owned());
    }

    fn fail_now(&self) -> ! {
        let errors = self.errors.lock().join("\n");
        panic!("test failed:\n{errors}");
    }
}
