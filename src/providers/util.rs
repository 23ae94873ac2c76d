use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retries an async operation with a linearly growing pause.
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `attempts`: Total number of runs before giving up
/// - `backoff`: Base pause; the wait after failed run `n` is `backoff * n`
///
/// # Returns
/// The first successful result, or the error from the final attempt
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    attempts: usize,
    backoff: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt >= attempts {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, attempts, err
                );
                tokio::time::sleep(backoff * attempt as u32).await;
                attempt += 1;
            }
        }
    }
}
