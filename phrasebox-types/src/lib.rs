//! # phrasebox-types
//!
//! Shared type definitions for the phrasebox speech player.
//! Plain data used by both the control side (phrasebox-core) and the
//! real-time side (phrasebox-audio): parameters, rendered audio and the
//! persisted state record.

mod audio;
mod param;
mod state;

pub use audio::{u8_to_centered, PlaybackStatus, RenderedAudio};
pub use param::{ParamId, ParamSpec, ParamStore, SynthParams};
pub use state::PersistedState;

/// Sample rate of every buffer produced by the speech engine.
pub const SOURCE_SAMPLE_RATE: f64 = 22_050.0;

/// Host rate substituted when the host reports a degenerate sample rate.
pub const NOMINAL_HOST_RATE: f64 = 44_100.0;

/// Maximum phrase length in bytes.
pub const MAX_PHRASE_LEN: usize = 512;

/// Spoken when the phrase is empty, and the initial phrase of a fresh store.
pub const FALLBACK_PHRASE: &str = "HELLO FROM SAM VST";

/// Truncate `text` to at most `max_len` bytes without splitting a UTF-8 character.
pub fn truncate_to_bound(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
