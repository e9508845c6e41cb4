use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

/// Result of running an operation under the retry policy.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was considered fatal and should bubble up immediately.
    Fatal(E),
    /// The error was retryable, but every allowed attempt failed.
    AttemptsExceeded { attempts: usize, last: E },
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::AttemptsExceeded { last, .. } => last,
        }
    }
}

/// Bounded retry with optional exponential backoff.
///
/// `max_retries` counts attempts after the first one, so `0` runs the
/// operation exactly once. A zero `base_delay` reissues immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay: Duration::ZERO,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
        }
    }

    /// Retries without any delay between attempts.
    pub fn immediate(max_retries: usize) -> Self {
        Self::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    /// Executes the operation with the configured retry policy.
    ///
    /// `op` receives the zero-based attempt index.
    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        mut op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
        E: std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            match op(attempt).await {
                Ok(result) => return Ok(result),
                Err(err) => match classify(&err) {
                    RetryDisposition::Stop => return Err(RetryError::Fatal(err)),
                    RetryDisposition::Retry => {
                        if attempt + 1 >= self.max_attempts() {
                            return Err(RetryError::AttemptsExceeded {
                                attempts: attempt + 1,
                                last: err,
                            });
                        }

                        let delay = self.backoff_delay(attempt);
                        debug!(
                            "Attempt {} of {} failed: {}; retrying in {:?}",
                            attempt + 1,
                            self.max_attempts(),
                            err,
                            delay
                        );
                        if !delay.is_zero() {
                            sleep(delay).await;
                        }
                        attempt += 1;
                    }
                },
            }
        }
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::from_millis(0);
        }

        let factor = 1u128 << attempt.min(6);
        let base_ms = self.base_delay.as_millis();
        let delay_ms = base_ms.saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[derive(Debug, PartialEq)]
    enum TestError {
        Flaky,
        Broken,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn classify(err: &TestError) -> RetryDisposition {
        match err {
            TestError::Flaky => RetryDisposition::Retry,
            TestError::Broken => RetryDisposition::Stop,
        }
    }

    async fn failing_then_ok(
        policy: &RetryPolicy,
        failures: usize,
        calls: Arc<AtomicUsize>,
    ) -> Result<&'static str, RetryError<TestError>> {
        policy
            .run(
                |_| {
                    let calls = calls.clone();
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) < failures {
                            Err(TestError::Flaky)
                        } else {
                            Ok("rows")
                        }
                    }
                },
                classify,
            )
            .await
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures_within_budget() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = failing_then_ok(&RetryPolicy::immediate(3), 3, calls.clone()).await;

        assert_eq!(result.unwrap(), "rows");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhausts_after_retries_plus_one_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = failing_then_ok(&RetryPolicy::immediate(3), 4, calls.clone()).await;

        match result {
            Err(RetryError::AttemptsExceeded { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last, TestError::Flaky);
            }
            other => panic!("expected AttemptsExceeded, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = failing_then_ok(&RetryPolicy::immediate(0), 1, calls.clone()).await;

        assert!(matches!(
            result,
            Err(RetryError::AttemptsExceeded { attempts: 1, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = RetryPolicy::immediate(5)
            .run(
                |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Err(TestError::Broken) }
                },
                classify,
            )
            .await;

        assert!(matches!(result, Err(RetryError::Fatal(TestError::Broken))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn passes_attempt_index() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = seen.clone();
        let _ = RetryPolicy::immediate(2)
            .run(
                |attempt| {
                    log.lock().unwrap().push(attempt);
                    async { Err::<(), _>(TestError::Flaky) }
                },
                classify,
            )
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(400));
        assert_eq!(policy.backoff_delay(9), Duration::from_millis(1000));
        assert_eq!(RetryPolicy::immediate(3).backoff_delay(5), Duration::ZERO);
    }
}
