use connectors::error::ServiceError;
use engine_core::{
    metrics::Metrics,
    retry::{RetryDisposition, RetryError, RetryPolicy},
};
use std::future::Future;

/// HTTP statuses worth reissuing unchanged.
const TRANSIENT_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Decide whether a service error should be retried.
pub fn classify_service_error(err: &ServiceError) -> RetryDisposition {
    match err {
        ServiceError::Connection(_) | ServiceError::Timeout(_) => RetryDisposition::Retry,
        ServiceError::Http { status, .. } if TRANSIENT_STATUSES.contains(status) => {
            RetryDisposition::Retry
        }
        ServiceError::Http { .. }
        | ServiceError::InvalidQuery(_)
        | ServiceError::Decode(_)
        | ServiceError::UnknownEntitySet(_)
        | ServiceError::InvalidUrl(_) => RetryDisposition::Stop,
    }
}

/// Runs one round trip under `policy`, reissuing it on transient failures.
///
/// Holds no state beyond the borrowed policy and shared counters, so
/// independent windows may call it concurrently.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    metrics: &Metrics,
    mut round_trip: F,
) -> Result<T, RetryError<ServiceError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    policy
        .run(
            |attempt| {
                metrics.increment_requests(1);
                if attempt > 0 {
                    metrics.increment_retries(1);
                }
                round_trip()
            },
            classify_service_error,
        )
        .await
}
