//! Bounded polling, the one waiting primitive every stage uses.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

use crate::Result;

/// Polls `probe` every `interval` until it yields a value or `limit` elapses.
///
/// Returns `Ok(None)` on timeout. A probe error aborts the wait immediately.
/// A single probe that hangs past the deadline counts as a timeout.
pub async fn poll_until<T, F, Fut>(interval: Duration, limit: Duration, mut probe: F) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + limit;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, probe()).await {
            Ok(Ok(Some(value))) => return Ok(Some(value)),
            Ok(Ok(None)) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => return Ok(None),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        sleep(interval.min(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExportError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn returns_first_ready_value() {
        let calls = AtomicUsize::new(0);
        let result = poll_until(Duration::from_millis(1), Duration::from_secs(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok((n >= 2).then_some(n)) }
        })
        .await
        .unwrap();

        assert_eq!(result, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn times_out_with_none() {
        let start = Instant::now();
        let result: Option<()> =
            poll_until(Duration::from_millis(5), Duration::from_millis(40), || async {
                Ok(None)
            })
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn probe_error_stops_polling() {
        let calls = AtomicUsize::new(0);
        let result: Result<Option<()>> =
            poll_until(Duration::from_millis(1), Duration::from_secs(5), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ExportError::Browser("helper exited".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(ExportError::Browser(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hung_probe_counts_as_timeout() {
        let result: Option<()> =
            poll_until(Duration::from_millis(1), Duration::from_millis(30), || async {
                sleep(Duration::from_secs(10)).await;
                Ok(Some(()))
            })
            .await
            .unwrap();

        assert!(result.is_none());
    }
}
