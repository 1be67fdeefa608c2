use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Serializes calls to a rate-limited upstream. The lock is held across
/// the sleep, so concurrent callers queue instead of stampeding when the
/// window opens.
pub struct CallGate {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl CallGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Returns once the caller may issue its request.
    pub async fn admit(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
