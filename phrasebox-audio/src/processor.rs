//! Real-time block entry point.
//!
//! The `AudioProcessor` is moved into the host's audio callback. Per block it
//! drains one trigger acknowledgement, picks up any freshly published render,
//! applies requested cursor restarts, then fans one mono signal out to every
//! connected channel. It never locks, allocates, frees or logs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use phrasebox_types::{ParamStore, RenderedAudio};

use crate::reader::PlaybackReader;
use crate::render_exchange::RenderSubscriber;
use crate::trigger::TriggerProtocol;

/// State shared between control contexts and the audio thread.
#[derive(Debug, Default)]
pub struct PlaybackControl {
    pub trigger: TriggerProtocol,
    restart_epoch: AtomicU32,
}

impl PlaybackControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the audio thread to rewind and play the current render from the
    /// start at its next block.
    pub fn request_restart(&self) {
        self.restart_epoch.fetch_add(1, Ordering::AcqRel);
    }

    fn restart_epoch(&self) -> u32 {
        self.restart_epoch.load(Ordering::Acquire)
    }
}

pub struct AudioProcessor {
    control: Arc<PlaybackControl>,
    params: Arc<ParamStore>,
    renders: RenderSubscriber,
    reader: PlaybackReader,
    seen_restart: u32,
}

impl AudioProcessor {
    pub fn new(
        control: Arc<PlaybackControl>,
        params: Arc<ParamStore>,
        renders: RenderSubscriber,
        host_rate: f64,
    ) -> Self {
        let seen_restart = control.restart_epoch();
        Self {
            control,
            params,
            renders,
            reader: PlaybackReader::new(host_rate),
            seen_restart,
        }
    }

    /// Host sample rate changed. Returns true if the rate was degenerate and
    /// the nominal rate is used instead.
    pub fn set_sample_rate(&mut self, host_rate: f64) -> bool {
        self.reader.set_host_rate(host_rate)
    }

    pub fn is_playing(&self) -> bool {
        self.reader.is_playing()
    }

    pub fn reader(&self) -> &PlaybackReader {
        &self.reader
    }

    pub fn current_render(&self) -> &RenderedAudio {
        self.renders.current()
    }

    fn begin_block(&mut self) {
        self.control.trigger.drain_one();

        let fresh = self.renders.refresh();
        let epoch = self.control.restart_epoch();
        if fresh || epoch != self.seen_restart {
            self.seen_restart = epoch;
            self.reader.restart(self.renders.current());
        }
    }

    /// Fill `frames` frames of every output channel with the same gained
    /// playback signal. Channels shorter than `frames` are filled as far as
    /// they go.
    pub fn process_block(&mut self, outputs: &mut [&mut [f32]], frames: usize) {
        self.begin_block();

        let gain = self.params.gain();
        let audio = self.renders.current();
        for s in 0..frames {
            let mono = self.reader.next_sample(audio) * gain;
            for channel in outputs.iter_mut() {
                if let Some(out) = channel.get_mut(s) {
                    *out = mono;
                }
            }
        }
    }

    /// Interleaved variant for device callbacks (cpal hands out one flat buffer).
    pub fn process_interleaved(&mut self, data: &mut [f32], channels: usize) {
        self.begin_block();

        let gain = self.params.gain();
        let audio = self.renders.current();
        let channels = channels.max(1);
        for frame in data.chunks_mut(channels) {
            let mono = self.reader.next_sample(audio) * gain;
            frame.fill(mono);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_exchange::{render_exchange, RenderPublisher};
    use phrasebox_types::{ParamId, SOURCE_SAMPLE_RATE};

    fn setup(host_rate: f64) -> (Arc<PlaybackControl>, Arc<ParamStore>, RenderPublisher, AudioProcessor) {
        let control = Arc::new(PlaybackControl::new());
        let params = Arc::new(ParamStore::new());
        let (tx, rx) = render_exchange(Arc::new(RenderedAudio::default()));
        let processor = AudioProcessor::new(Arc::clone(&control), Arc::clone(&params), rx, host_rate);
        (control, params, tx, processor)
    }

    fn run_block(proc: &mut AudioProcessor, channels: usize, frames: usize) -> Vec<Vec<f32>> {
        let mut bufs = vec![vec![1.0f32; frames]; channels];
        {
            let mut outs: Vec<&mut [f32]> = bufs.iter_mut().map(|b| b.as_mut_slice()).collect();
            proc.process_block(&mut outs, frames);
        }
        bufs
    }

    #[test]
    fn silent_until_something_is_published() {
        let (_c, _p, _tx, mut proc) = setup(SOURCE_SAMPLE_RATE);
        let out = run_block(&mut proc, 2, 8);
        assert!(out.iter().flatten().all(|&s| s == 0.0));
    }

    #[test]
    fn fresh_render_starts_playback_on_all_channels() {
        let (_c, _p, mut tx, mut proc) = setup(SOURCE_SAMPLE_RATE);
        tx.publish(Arc::new(RenderedAudio::new(vec![64, 192, 64, 192])));
        let out = run_block(&mut proc, 2, 6);
        assert_eq!(out[0], out[1]);
        assert!((out[0][0] - -0.5).abs() < 1e-6);
        assert!((out[0][1] - 0.5).abs() < 1e-6);
        assert_eq!(out[0][4..].to_vec(), vec![0.0f32, 0.0]);
        assert!(!proc.is_playing());
    }

    #[test]
    fn gain_scales_output() {
        let (_c, params, mut tx, mut proc) = setup(SOURCE_SAMPLE_RATE);
        params.set(ParamId::OutputGain, 200.0);
        tx.publish(Arc::new(RenderedAudio::new(vec![64, 192])));
        let out = run_block(&mut proc, 1, 2);
        assert!((out[0][0] - -1.0).abs() < 1e-6);
        assert!((out[0][1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn restart_request_rewinds_finished_playback() {
        let (control, _p, mut tx, mut proc) = setup(SOURCE_SAMPLE_RATE);
        tx.publish(Arc::new(RenderedAudio::new(vec![64, 192])));
        run_block(&mut proc, 1, 4);
        assert!(!proc.is_playing());

        control.request_restart();
        let out = run_block(&mut proc, 1, 1);
        assert!((out[0][0] - -0.5).abs() < 1e-6);
        assert!(proc.is_playing());
    }

    #[test]
    fn each_block_drains_at_most_one_ack() {
        let (control, _p, _tx, mut proc) = setup(SOURCE_SAMPLE_RATE);
        control.trigger.request();
        control.trigger.request();
        run_block(&mut proc, 1, 4);
        assert_eq!(control.trigger.ack_count(), 1);
        run_block(&mut proc, 1, 4);
        assert_eq!(control.trigger.ack_count(), 1);
        control.trigger.request();
        run_block(&mut proc, 1, 4);
        assert_eq!(control.trigger.ack_count(), 2);
    }

    #[test]
    fn interleaved_duplicates_each_frame() {
        let (_c, _p, mut tx, mut proc) = setup(SOURCE_SAMPLE_RATE);
        tx.publish(Arc::new(RenderedAudio::new(vec![64, 192])));
        let mut data = vec![9.0f32; 6];
        proc.process_interleaved(&mut data, 2);
        assert!((data[0] - -0.5).abs() < 1e-6);
        assert_eq!(data[0], data[1]);
        assert!((data[2] - 0.5).abs() < 1e-6);
        assert_eq!(data[2], data[3]);
        assert_eq!(data[4..].to_vec(), vec![0.0f32, 0.0]);
    }

    #[test]
    fn degenerate_sample_rate_is_reported() {
        let (_c, _p, _tx, mut proc) = setup(48_000.0);
        assert!(proc.set_sample_rate(0.0));
        assert!(!proc.set_sample_rate(48_000.0));
    }
}
