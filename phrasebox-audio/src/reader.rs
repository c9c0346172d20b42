//! Sample-rate converting reader over a rendered phrase.

use phrasebox_types::{u8_to_centered, RenderedAudio, NOMINAL_HOST_RATE, SOURCE_SAMPLE_RATE};

/// Host rate used for the resampling step. Rates at or below 1 Hz (and
/// non-finite rates) are degenerate and fall back to the nominal rate.
pub fn effective_host_rate(host_rate: f64) -> f64 {
    if host_rate.is_finite() && host_rate > 1.0 {
        host_rate
    } else {
        NOMINAL_HOST_RATE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Playing,
}

/// Playback cursor into the current render. Owned by the audio thread.
#[derive(Debug, Clone)]
pub struct PlaybackReader {
    cursor: f64,
    step: f64,
    state: ReaderState,
}

impl PlaybackReader {
    pub fn new(host_rate: f64) -> Self {
        let mut reader = Self {
            cursor: 0.0,
            step: SOURCE_SAMPLE_RATE / NOMINAL_HOST_RATE,
            state: ReaderState::Idle,
        };
        reader.set_host_rate(host_rate);
        reader
    }

    /// Recompute the step for a new host rate. Returns true if the host rate
    /// was degenerate and the nominal rate was substituted.
    pub fn set_host_rate(&mut self, host_rate: f64) -> bool {
        let rate = effective_host_rate(host_rate);
        self.step = SOURCE_SAMPLE_RATE / rate;
        rate != host_rate
    }

    /// Rewind to the start of `audio`. Plays only if there is something to play.
    pub fn restart(&mut self, audio: &RenderedAudio) {
        self.cursor = 0.0;
        self.state = if audio.is_empty() {
            ReaderState::Idle
        } else {
            ReaderState::Playing
        };
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == ReaderState::Playing
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Produce the next output frame: linear interpolation between adjacent
    /// centered samples, minus the render's DC bias, clamped to [-1, 1].
    #[inline]
    pub fn next_sample(&mut self, audio: &RenderedAudio) -> f32 {
        if self.state == ReaderState::Idle || audio.is_empty() {
            return 0.0;
        }

        let pcm = audio.pcm();
        let size = pcm.len();
        let idx = self.cursor as usize;

        if idx >= size {
            self.state = ReaderState::Idle;
            return 0.0;
        }

        let next_idx = if idx + 1 < size { idx + 1 } else { idx };
        let frac = (self.cursor - idx as f64) as f32;

        let s0 = u8_to_centered(pcm[idx]);
        let s1 = u8_to_centered(pcm[next_idx]);
        let out = s0 + (s1 - s0) * frac;
        let centered = (out - audio.dc_bias()).clamp(-1.0, 1.0);

        self.cursor += self.step;
        if self.cursor >= size as f64 {
            self.state = ReaderState::Idle;
        }

        centered
    }
}
