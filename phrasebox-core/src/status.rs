//! Human-readable playback status, polled from a UI idle tick.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use phrasebox_audio::PlaybackControl;
use phrasebox_types::PlaybackStatus;

/// Status from the two trigger counters.
pub fn status_for(requests: u32, acks: u32) -> PlaybackStatus {
    if requests == 0 {
        PlaybackStatus::Idle
    } else if acks >= requests {
        PlaybackStatus::Acknowledged(acks)
    } else {
        PlaybackStatus::Pending(requests)
    }
}

/// Watches the acknowledgement counter. Purely observational.
pub struct StatusObserver {
    control: Arc<PlaybackControl>,
    loads: Arc<AtomicU32>,
    seen_load: u32,
    last_ack: Option<u32>,
}

impl StatusObserver {
    pub(crate) fn new(control: Arc<PlaybackControl>, loads: Arc<AtomicU32>) -> Self {
        let seen_load = loads.load(Ordering::Acquire);
        let last_ack = Some(control.trigger.ack_count());
        Self {
            control,
            loads,
            seen_load,
            last_ack,
        }
    }

    /// Report a status when the audio thread acknowledged something since the
    /// last poll, or when state was reloaded. Coalesced requests still read as
    /// pending until the ack count catches up.
    pub fn poll(&mut self) -> Option<PlaybackStatus> {
        let load = self.loads.load(Ordering::Acquire);
        if load != self.seen_load {
            self.seen_load = load;
            self.last_ack = None;
        }

        let (requests, acks) = self.counts();
        if self.last_ack == Some(acks) {
            return None;
        }
        self.last_ack = Some(acks);
        Some(status_for(requests, acks))
    }

    pub fn current(&self) -> PlaybackStatus {
        let (requests, acks) = self.counts();
        status_for(requests, acks)
    }

    fn counts(&self) -> (u32, u32) {
        let trigger = &self.control.trigger;
        // Acks first: a request landing in between can only make this look pending.
        let acks = trigger.ack_count();
        (trigger.request_count(), acks)
    }
}
