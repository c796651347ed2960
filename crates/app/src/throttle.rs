//! Serial, rate-limited access to the device gateway.
//!
//! Every device call holds a [`ThrottlePermit`] for its whole duration, so
//! calls never overlap and consecutive calls start at least `spacing` apart.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Fixed-spacing limiter shared by all device pushes.
#[derive(Debug)]
pub struct Throttle {
    spacing: Duration,
    last_start: Mutex<Option<Instant>>,
}

/// Held while a device call is in flight.
#[must_use = "the throttle is released as soon as the permit is dropped"]
pub struct ThrottlePermit<'a> {
    _guard: MutexGuard<'a, Option<Instant>>,
}

impl Throttle {
    #[must_use]
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_start: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Wait for the previous call to finish and for the spacing to elapse.
    pub async fn acquire(&self) -> ThrottlePermit<'_> {
        let mut guard = self.last_start.lock().await;
        if let Some(previous) = *guard {
            tokio::time::sleep_until(previous + self.spacing).await;
        }
        *guard = Some(Instant::now());
        ThrottlePermit { _guard: guard }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn should_not_wait_for_first_call() {
        let throttle = Throttle::new(Duration::from_millis(100));
        let before = Instant::now();
        let _permit = throttle.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn should_space_consecutive_calls() {
        let throttle = Throttle::new(Duration::from_millis(100));
        let before = Instant::now();
        for _ in 0..5 {
            let _permit = throttle.acquire().await;
        }
        assert_eq!(before.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_wait_when_spacing_already_elapsed() {
        let throttle = Throttle::new(Duration::from_millis(100));
        drop(throttle.acquire().await);
        tokio::time::sleep(Duration::from_millis(250)).await;
        let before = Instant::now();
        drop(throttle.acquire().await);
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn should_serialise_concurrent_callers() {
        let throttle = Arc::new(Throttle::new(Duration::from_millis(100)));
        let in_flight = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let throttle = Arc::clone(&throttle);
            let in_flight = Arc::clone(&in_flight);
            handles.push(tokio::spawn(async move {
                let _permit = throttle.acquire().await;
                let running = in_flight.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                assert_eq!(running, 0, "calls overlapped");
                // A slow device call longer than the spacing.
                tokio::time::sleep(Duration::from_millis(150)).await;
                in_flight.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                Instant::now()
            }));
        }

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap());
        }
        finished.sort();
        assert_eq!(finished[2] - start, Duration::from_millis(450));
    }
}
