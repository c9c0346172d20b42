//! Lock-free request/acknowledge protocol between control contexts and the
//! audio thread.
//!
//! Control contexts call [`TriggerProtocol::request`]; the audio thread calls
//! [`TriggerProtocol::drain_one`] once per processed block. Requests that land
//! between two blocks coalesce: each drain produces at most one
//! acknowledgement, so the status text reflects the latest known state rather
//! than a one-to-one count of rapid-fire requests.
//!
//! `ack_count() <= request_count()` holds at every observation point: every
//! acknowledgement consumes a pending transition, and every pending
//! transition is preceded by its own request increment.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct TriggerProtocol {
    requests: AtomicU32,
    acks: AtomicU32,
    pending: AtomicBool,
}

impl TriggerProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a playback request. Returns the new request count.
    pub fn request(&self) -> u32 {
        let count = self.requests.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        self.pending.store(true, Ordering::Release);
        count
    }

    /// Audio thread, once per block: consume at most one pending request.
    /// Returns true if an acknowledgement was produced.
    #[inline]
    pub fn drain_one(&self) -> bool {
        if self.pending.swap(false, Ordering::AcqRel) {
            self.acks.fetch_add(1, Ordering::AcqRel);
            true
        } else {
            false
        }
    }

    pub fn request_count(&self) -> u32 {
        self.requests.load(Ordering::Acquire)
    }

    pub fn ack_count(&self) -> u32 {
        self.acks.load(Ordering::Acquire)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Reinstate counters from a persisted record. A pending trigger counts as
    /// one unacknowledged request.
    ///
    /// Only called from state load; not meant to race with `request`.
    pub fn restore(&self, request_count: u32, pending: bool) {
        let acks = request_count.saturating_sub(u32::from(pending));
        self.pending.store(false, Ordering::Release);
        // Order the two stores so acks never overtake requests mid-restore.
        if request_count >= self.requests.load(Ordering::Acquire) {
            self.requests.store(request_count, Ordering::Release);
            self.acks.store(acks, Ordering::Release);
        } else {
            self.acks.store(acks, Ordering::Release);
            self.requests.store(request_count, Ordering::Release);
        }
        if pending {
            self.pending.store(true, Ordering::Release);
        }
    }
}
