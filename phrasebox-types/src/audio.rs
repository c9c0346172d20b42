//! Audio-related types shared across crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Convert an unsigned 8-bit sample to a centered float in [-1, ~0.992].
#[inline]
pub fn u8_to_centered(v: u8) -> f32 {
    (v as f32 - 128.0) * (1.0 / 128.0)
}

/// One synthesized phrase: unsigned 8-bit PCM at the source rate plus its DC bias.
///
/// Replaced wholesale on every successful render; never mutated in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedAudio {
    pcm: Vec<u8>,
    dc_bias: f32,
}

impl RenderedAudio {
    /// Wrap a PCM buffer, computing its DC bias (mean of the centered samples).
    pub fn new(pcm: Vec<u8>) -> Self {
        let dc_bias = if pcm.is_empty() {
            0.0
        } else {
            let sum: f64 = pcm.iter().map(|&v| u8_to_centered(v) as f64).sum();
            (sum / pcm.len() as f64) as f32
        };
        Self { pcm, dc_bias }
    }

    pub fn pcm(&self) -> &[u8] {
        &self.pcm
    }

    pub fn dc_bias(&self) -> f32 {
        self.dc_bias
    }

    pub fn len(&self) -> usize {
        self.pcm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }
}

/// Human-readable playback progress as seen from the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    /// Latest request number, not yet acknowledged by the audio thread.
    Pending(u32),
    /// Acknowledgement count.
    Acknowledged(u32),
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackStatus::Idle => write!(f, "Playback idle"),
            PlaybackStatus::Pending(n) => write!(f, "Playback request #{} pending DSP ack", n),
            PlaybackStatus::Acknowledged(n) => write!(f, "Playback request #{} acknowledged", n),
        }
    }
}
