use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Single-slot expiry timer for the cached quote. Starting always aborts
/// whatever was running, so at most one timer is ever live; cancelling an
/// idle countdown is a no-op.
#[derive(Default)]
pub struct QuoteCountdown {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl QuoteCountdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start<F>(&self, ttl: Duration, on_expiry: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.handle.lock().await;
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            on_expiry.await;
        }));
    }

    pub async fn cancel(&self) {
        if let Some(running) = self.handle.lock().await.take() {
            running.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_restart_aborts_the_previous_timer() {
        let countdown = QuoteCountdown::new();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let hits = first.clone();
        countdown
            .start(Duration::from_millis(20), async move {
                hits.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        let hits = second.clone();
        countdown
            .start(Duration::from_millis(20), async move {
                hits.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_expiry_and_is_idempotent() {
        let countdown = QuoteCountdown::new();
        let fired = Arc::new(AtomicU32::new(0));

        let hits = fired.clone();
        countdown
            .start(Duration::from_millis(20), async move {
                hits.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        countdown.cancel().await;
        countdown.cancel().await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
