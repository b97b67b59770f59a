//! ConcurrencyLimiter - global admission gate for probe execution
//!
//! A counting semaphore shared by every scheduled job. Only the probe
//! itself runs under a permit; recording and notification happen after
//! the permit is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tracing::trace;

/// Bounded gate for in-flight probes
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// A slot in the limiter, released on drop
#[derive(Debug)]
pub struct ProbePermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for ProbePermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting at most `capacity` probes (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a free slot
    ///
    /// Waiters are served in FIFO order. Fails only once the limiter has
    /// been closed.
    pub async fn acquire(&self) -> Result<ProbePermit, AcquireError> {
        let permit = self.semaphore.clone().acquire_owned().await?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        trace!("probe admitted ({now}/{})", self.capacity);

        Ok(ProbePermit {
            _permit: permit,
            in_flight: self.in_flight.clone(),
        })
    }

    /// Reject current and future waiters
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous permits observed so far
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}
