use lazy_static::lazy_static;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A minimum-interval gate used to keep request rates to a single endpoint
/// under control. Calling [`RateLimit::wait`] blocks until a minimum time has
/// passed since the previous call returned.
///
/// A single instance may be shared between sessions (wrap it in an [`Arc`]),
/// in which case requests made through one session count against the limit of
/// the others. The default limits used by [`crate::Session`] are process-wide
/// for exactly that reason.
pub struct RateLimit {
    last_call: Mutex<Option<Instant>>,
    minimum_interval: Duration,
}

impl RateLimit {
    /// Create a limit allowing `per_second` calls per second (fractional
    /// rates allowed). A rate of zero or less disables the limit entirely.
    pub fn new(per_second: f64) -> RateLimit {
        let minimum_interval = if per_second <= 0.0 {
            Duration::from_secs(0)
        } else {
            Duration::from_secs_f64(1.0 / per_second)
        };

        RateLimit {
            last_call: Mutex::new(None),
            minimum_interval,
        }
    }

    pub fn shared(per_second: f64) -> Arc<RateLimit> {
        Arc::new(RateLimit::new(per_second))
    }

    /// Block until the minimum interval since the last entry has elapsed.
    ///
    /// The bucket's lock is held across the sleep, so concurrent callers pass
    /// the gate strictly spaced: no two of them within `1 / per_second`
    /// seconds of each other.
    pub async fn wait(&self) {
        if self.minimum_interval.as_nanos() == 0 {
            return;
        }

        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let idle = Instant::now() - previous;
            if idle < self.minimum_interval {
                tokio::time::sleep(self.minimum_interval - idle).await;
            }
        }

        *last_call = Some(Instant::now());
    }

    /// Forget the last entry time, so the next `wait` returns immediately.
    pub async fn reset(&self) {
        *self.last_call.lock().await = None;
    }
}

lazy_static! {
    // Internet Archive folks have asked that client defaults stay at 80% of
    // the hard endpoint limits.
    pub(crate) static ref DEFAULT_CDX_RATE_LIMIT: Arc<RateLimit> =
        RateLimit::shared(0.8 * 60.0 / 60.0);
    pub(crate) static ref DEFAULT_TIMEMAP_RATE_LIMIT: Arc<RateLimit> =
        RateLimit::shared(0.8 * 100.0 / 60.0);
    pub(crate) static ref DEFAULT_MEMENTO_RATE_LIMIT: Arc<RateLimit> =
        RateLimit::shared(0.8 * 600.0 / 60.0);
}
