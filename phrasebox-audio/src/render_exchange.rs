//! Lock-free hand-off of the current render to the audio thread.
//!
//! A triple buffer of `Arc<RenderedAudio>` handles:
//! - the publisher writes a new handle into the back slot, then swaps back and middle
//! - the subscriber swaps front and middle when a fresh handle is waiting
//!
//! Neither side blocks, and the audio thread only ever holds a shared borrow of
//! the front slot. Old handles are dropped by the publisher when it overwrites
//! the back slot, so the last reference to a render is never released on the
//! audio thread.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use phrasebox_types::RenderedAudio;

/// State byte layout: [fresh:1][unused:1][back:2][middle:2][front:2]
const FRONT_SHIFT: u8 = 0;
const MIDDLE_SHIFT: u8 = 2;
const BACK_SHIFT: u8 = 4;
const SLOT_MASK: u8 = 0b11;
const FRESH_BIT: u8 = 0x80;

const INITIAL_STATE: u8 = (2 << BACK_SHIFT) | (1 << MIDDLE_SHIFT) | (0 << FRONT_SHIFT);

struct Shared {
    slots: [UnsafeCell<Arc<RenderedAudio>>; 3],
    state: AtomicU8,
}

// Safety: slot access is partitioned by the atomic state; the publisher only
// touches the back slot and the subscriber only the front slot.
unsafe impl Send for Shared {}
unsafe impl Sync for Shared {}

impl Shared {
    fn back(state: u8) -> usize {
        ((state >> BACK_SHIFT) & SLOT_MASK) as usize
    }

    fn middle(state: u8) -> usize {
        ((state >> MIDDLE_SHIFT) & SLOT_MASK) as usize
    }

    fn front(state: u8) -> usize {
        ((state >> FRONT_SHIFT) & SLOT_MASK) as usize
    }

    fn encode(back: usize, middle: usize, front: usize) -> u8 {
        ((back as u8) << BACK_SHIFT) | ((middle as u8) << MIDDLE_SHIFT) | ((front as u8) << FRONT_SHIFT)
    }

    /// Swap back and middle, marking the middle slot fresh.
    fn publish(&self) {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            let new_state = Self::encode(Self::middle(state), Self::back(state), Self::front(state))
                | FRESH_BIT;
            match self
                .state
                .compare_exchange_weak(state, new_state, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(actual) => state = actual,
            }
        }
    }

    /// Swap front and middle if the middle slot is fresh. Returns true if it was.
    fn consume(&self) -> bool {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            if state & FRESH_BIT == 0 {
                return false;
            }
            let new_state = Self::encode(Self::back(state), Self::front(state), Self::middle(state));
            match self
                .state
                .compare_exchange_weak(state, new_state, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => state = actual,
            }
        }
    }
}

/// Control-side half. Not `Clone`: owning it is what makes it the single writer.
pub struct RenderPublisher {
    shared: Arc<Shared>,
}

impl RenderPublisher {
    /// Make `render` the current render for the audio thread.
    pub fn publish(&mut self, render: Arc<RenderedAudio>) {
        let state = self.shared.state.load(Ordering::Acquire);
        let back = Shared::back(state);
        // Safety: only the publisher moves the back index, and we hold `&mut self`.
        unsafe {
            *self.shared.slots[back].get() = render;
        }
        self.shared.publish();
    }
}

/// Audio-side half. Not `Clone`: owning it is what makes it the single reader.
pub struct RenderSubscriber {
    shared: Arc<Shared>,
}

impl RenderSubscriber {
    /// Pick up the latest published render, if any. Returns true when the
    /// current render changed. Never allocates or frees.
    #[inline]
    pub fn refresh(&mut self) -> bool {
        self.shared.consume()
    }

    /// The render the audio thread is currently reading.
    #[inline]
    pub fn current(&self) -> &RenderedAudio {
        let state = self.shared.state.load(Ordering::Acquire);
        let front = Shared::front(state);
        // Safety: only the subscriber moves the front index, and the publisher
        // never writes the front slot.
        unsafe { &*self.shared.slots[front].get() }
    }
}

/// Create a publisher/subscriber pair whose current render is `initial`.
pub fn render_exchange(initial: Arc<RenderedAudio>) -> (RenderPublisher, RenderSubscriber) {
    let shared = Arc::new(Shared {
        slots: [
            UnsafeCell::new(Arc::clone(&initial)),
            UnsafeCell::new(Arc::clone(&initial)),
            UnsafeCell::new(initial),
        ],
        state: AtomicU8::new(INITIAL_STATE),
    });
    (
        RenderPublisher {
            shared: Arc::clone(&shared),
        },
        RenderSubscriber { shared },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn render(pcm: &[u8]) -> Arc<RenderedAudio> {
        Arc::new(RenderedAudio::new(pcm.to_vec()))
    }

    #[test]
    fn starts_with_initial_render() {
        let (_tx, mut rx) = render_exchange(render(&[1, 2, 3]));
        assert!(!rx.refresh());
        assert_eq!(rx.current().pcm(), &[1, 2, 3]);
    }

    #[test]
    fn publish_is_seen_after_refresh() {
        let (mut tx, mut rx) = render_exchange(Arc::new(RenderedAudio::default()));
        tx.publish(render(&[9, 9]));
        assert!(rx.current().is_empty());
        assert!(rx.refresh());
        assert_eq!(rx.current().pcm(), &[9, 9]);
        assert!(!rx.refresh());
        assert_eq!(rx.current().pcm(), &[9, 9]);
    }

    #[test]
    fn latest_publish_wins() {
        let (mut tx, mut rx) = render_exchange(Arc::new(RenderedAudio::default()));
        tx.publish(render(&[1]));
        tx.publish(render(&[2]));
        tx.publish(render(&[3]));
        assert!(rx.refresh());
        assert_eq!(rx.current().pcm(), &[3]);
    }

    #[test]
    fn front_is_stable_while_publisher_writes() {
        let (mut tx, mut rx) = render_exchange(Arc::new(RenderedAudio::default()));
        tx.publish(render(&[5, 5, 5]));
        rx.refresh();
        let held = rx.current() as *const RenderedAudio;
        tx.publish(render(&[6]));
        tx.publish(render(&[7]));
        assert_eq!(rx.current() as *const RenderedAudio, held);
        assert_eq!(rx.current().pcm(), &[5, 5, 5]);
    }

    #[test]
    fn reader_never_sees_a_torn_render() {
        let (mut tx, mut rx) = render_exchange(render(&[0; 16]));
        let writer = thread::spawn(move || {
            for i in 0..500u16 {
                let v = (i % 250) as u8;
                tx.publish(Arc::new(RenderedAudio::new(vec![v; 16 + (i as usize % 7)])));
            }
        });
        for _ in 0..5_000 {
            rx.refresh();
            let current = rx.current();
            let first = current.pcm()[0];
            assert!(current.pcm().iter().all(|&s| s == first));
        }
        writer.join().unwrap();
    }
}
