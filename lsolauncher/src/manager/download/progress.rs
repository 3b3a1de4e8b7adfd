//! Download progress sampling.
//!
//! The download thread only bumps atomic counters. A [`ProgressSampler`]
//! reads them on a tokio interval and reports the fraction done, until the
//! stage ends and its cancellation token fires.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Receives each sample of the shared counters.
pub type SampleCallback = Box<dyn Fn(&ProgressCounters) + Send + Sync>;

/// Counters shared between a download and its sampler.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    received: AtomicU64,
    /// Zero while the size is unknown.
    expected: AtomicU64,
    stop: AtomicBool,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_received(&self, bytes: u64) {
        self.received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn set_expected(&self, bytes: u64) {
        self.expected.store(bytes, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn expected(&self) -> Option<u64> {
        match self.expected.load(Ordering::Relaxed) {
            0 => None,
            n => Some(n),
        }
    }

    /// Fraction done in `[0, 1]`, if the size is known.
    pub fn fraction(&self) -> Option<f64> {
        self.expected()
            .map(|expected| (self.received() as f64 / expected as f64).clamp(0.0, 1.0))
    }

    /// Ask the download loop to stop at its next chunk.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Periodic reader of [`ProgressCounters`].
pub struct ProgressSampler {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ProgressSampler {
    /// Start sampling `counters` every `interval`. Must be called inside a
    /// tokio runtime.
    pub fn start(counters: Arc<ProgressCounters>, interval: Duration, callback: SampleCallback) -> Self {
        let token = CancellationToken::new();
        let child = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => callback(&counters),
                }
            }
            // Final sample so the last bytes are always reported.
            callback(&counters);
        });

        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Stop sampling and wait for the final sample.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ProgressSampler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_counters_fraction() {
        let counters = ProgressCounters::new();
        assert_eq!(counters.fraction(), None);

        counters.set_expected(200);
        counters.add_received(50);
        assert_eq!(counters.fraction(), Some(0.25));

        counters.add_received(500);
        assert_eq!(counters.fraction(), Some(1.0));
    }

    #[test]
    fn test_counters_stop_flag() {
        let counters = ProgressCounters::new();
        assert!(!counters.stop_requested());
        counters.request_stop();
        assert!(counters.stop_requested());
    }

    #[tokio::test]
    async fn test_sampler_reports_until_stopped() {
        let counters = Arc::new(ProgressCounters::new());
        counters.set_expected(10);
        let calls = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicU64::new(0));
        let fractions = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let sampler = {
            let calls = Arc::clone(&calls);
            let last = Arc::clone(&last);
            let fractions = Arc::clone(&fractions);
            ProgressSampler::start(
                Arc::clone(&counters),
                Duration::from_millis(5),
                Box::new(move |sample: &ProgressCounters| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    last.store(sample.received(), Ordering::SeqCst);
                    fractions.lock().push(sample.fraction());
                }),
            )
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        counters.add_received(10);
        sampler.stop().await;

        assert!(calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(last.load(Ordering::SeqCst), 10);
        let fractions = fractions.lock();
        assert_eq!(fractions.first(), Some(&Some(0.0)));
        assert_eq!(fractions.last(), Some(&Some(1.0)));
    }
}
