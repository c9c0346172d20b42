//! Control entry points.
//!
//! `PhraseController` is what a host or UI talks to. Every method runs on a
//! control context and may block on synthesis; none of them may be called
//! from the audio callback. The audio side is the [`AudioProcessor`] handed
//! out at construction.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use phrasebox_audio::{AudioProcessor, PlaybackControl};
use phrasebox_types::{
    ParamId, ParamStore, PersistedState, PlaybackStatus, RenderedAudio, FALLBACK_PHRASE,
    NOMINAL_HOST_RATE,
};

use crate::codec::{decode_state, encode_state, StateFormat};
use crate::midi::MidiEvent;
use crate::phrase::PhraseStore;
use crate::render::{DirtyFlag, RenderOutcome, RenderPipeline};
use crate::status::{status_for, StatusObserver};
use crate::synth::{SpeechEngine, SynthError, SynthesisAdapter};

/// Construction defaults. A state chunk that decodes to nothing resets the
/// controller to these.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub initial_text: String,
    pub fallback_phrase: String,
    pub host_rate: f64,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            initial_text: FALLBACK_PHRASE.to_string(),
            fallback_phrase: FALLBACK_PHRASE.to_string(),
            host_rate: NOMINAL_HOST_RATE,
        }
    }
}

pub struct PhraseController {
    phrases: PhraseStore,
    params: Arc<ParamStore>,
    dirty: Arc<DirtyFlag>,
    pipeline: RenderPipeline,
    control: Arc<PlaybackControl>,
    loads: Arc<AtomicU32>,
    options: ControllerOptions,
}

impl PhraseController {
    /// Build a controller around `engine`. The returned processor belongs in
    /// the audio callback.
    pub fn new(engine: Box<dyn SpeechEngine>, options: ControllerOptions) -> (Self, AudioProcessor) {
        let dirty = Arc::new(DirtyFlag::new(true));
        let phrases = PhraseStore::new(&options.initial_text, Arc::clone(&dirty));
        let params = Arc::new(ParamStore::new());
        let control = Arc::new(PlaybackControl::new());
        let (pipeline, renders) = RenderPipeline::new(
            SynthesisAdapter::new(engine),
            Arc::clone(&dirty),
            &options.fallback_phrase,
        );
        let processor = AudioProcessor::new(
            Arc::clone(&control),
            Arc::clone(&params),
            renders,
            options.host_rate,
        );

        let controller = Self {
            phrases,
            params,
            dirty,
            pipeline,
            control,
            loads: Arc::new(AtomicU32::new(0)),
            options,
        };
        (controller, processor)
    }

    /// Keystroke-level edit: store the text, render later.
    pub fn on_text_edited(&self, text: &str) {
        self.phrases.set(text);
    }

    /// The user finished editing: store the text and render now.
    pub fn on_text_committed(&self, text: &str) -> Result<RenderOutcome, SynthError> {
        self.phrases.set(text);
        self.dirty.mark();
        let result = self.ensure_rendered();
        if result.is_err() {
            log::warn!(target: "phrase", "failed to render phrase after text commit");
        }
        result
    }

    /// Re-synthesize if the text or synthesis parameters changed.
    pub fn ensure_rendered(&self) -> Result<RenderOutcome, SynthError> {
        self.pipeline.ensure_rendered(&self.phrases, &self.params)
    }

    /// Request playback from the top of the current phrase. The request is
    /// recorded even if rendering fails; playback only starts once there is
    /// audio. Returns whether playback was (re)started.
    pub fn request_playback(&self) -> bool {
        let request = self.control.trigger.request();
        match self.ensure_rendered() {
            Ok(RenderOutcome::Current) => {
                // A fresh publish restarts on its own; an unchanged render needs a rewind.
                self.control.request_restart();
                log::debug!(target: "trigger", "playback request #{} queued", request);
                true
            }
            Ok(RenderOutcome::Rendered { .. }) => {
                log::debug!(target: "trigger", "playback request #{} queued with new render", request);
                true
            }
            Err(_) => {
                log::warn!(target: "trigger", "playback request #{} has no audio to play", request);
                false
            }
        }
    }

    /// A host parameter changed. Only the synthesis parameters dirty the render.
    pub fn on_param_change(&self, id: ParamId) {
        if id.is_synthesis() {
            self.dirty.mark();
        }
    }

    /// Write a parameter and notify. Returns the stored (constrained) value.
    pub fn set_param(&self, id: ParamId, value: f64) -> f64 {
        let stored = self.params.set(id, value);
        self.on_param_change(id);
        stored
    }

    pub fn param(&self, id: ParamId) -> f64 {
        self.params.get(id)
    }

    pub fn params(&self) -> &Arc<ParamStore> {
        &self.params
    }

    /// Note-on with nonzero velocity requests playback. Returns whether
    /// playback was (re)started.
    pub fn on_midi(&self, event: &MidiEvent) -> bool {
        if !event.is_trigger() {
            return false;
        }
        log::debug!(target: "midi", "note-on retrigger: {:?}", event.kind);
        self.request_playback()
    }

    /// Host reset: re-render, or go silent if that fails.
    pub fn reset(&self) {
        self.dirty.mark();
        if self.ensure_rendered().is_err() {
            self.pipeline.clear();
        }
    }

    /// Current phrase, for display.
    pub fn text(&self) -> String {
        self.phrases.get()
    }

    pub fn current_render(&self) -> Arc<RenderedAudio> {
        self.pipeline.current()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_set()
    }

    pub fn request_count(&self) -> u32 {
        self.control.trigger.request_count()
    }

    pub fn ack_count(&self) -> u32 {
        self.control.trigger.ack_count()
    }

    pub fn status(&self) -> PlaybackStatus {
        let acks = self.ack_count();
        status_for(self.request_count(), acks)
    }

    pub fn status_observer(&self) -> StatusObserver {
        StatusObserver::new(Arc::clone(&self.control), Arc::clone(&self.loads))
    }

    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            pending: self.control.trigger.is_pending(),
            request_count: self.control.trigger.request_count(),
            text: self.phrases.get(),
        }
    }

    /// Phrase block followed by the parameter block.
    pub fn serialize_state(&self) -> Vec<u8> {
        encode_state(&self.persisted_state(), &self.params.snapshot())
    }

    /// Restore from a chunk starting at `start`. Never fails: an unreadable
    /// phrase block resets to construction defaults, an unreadable parameter
    /// block leaves parameters as they are. Always re-renders. Returns the
    /// offset after the consumed bytes.
    pub fn unserialize_state(&self, bytes: &[u8], start: usize) -> usize {
        let decoded = decode_state(bytes, start, ParamId::ALL.len());

        match decoded.state {
            Some(state) => {
                self.phrases.set(&state.text);
                self.control.trigger.restore(state.request_count, state.pending);
            }
            None => {
                log::warn!(target: "codec", "state chunk unreadable; using defaults");
                self.phrases.set(&self.options.initial_text);
                self.control.trigger.restore(0, false);
            }
        }
        if decoded.format == StateFormat::Legacy {
            log::info!(target: "codec", "upgraded legacy state; next save writes the versioned layout");
        }

        if let Some(values) = decoded.params {
            for (id, value) in ParamId::ALL.iter().zip(values) {
                self.params.set(*id, value);
            }
        }

        self.loads.fetch_add(1, Ordering::AcqRel);
        self.dirty.mark();
        if self.ensure_rendered().is_err() {
            log::warn!(target: "codec", "failed to render phrase after state load");
        }
        decoded.end
    }

    /// Write the serialized state to `path`, replacing it atomically.
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Cannot create {}: {}", parent.display(), e))?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, self.serialize_state())
            .map_err(|e| format!("Cannot write {}: {}", tmp.display(), e))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| format!("Cannot replace {}: {}", path.display(), e))?;
        log::info!(target: "codec", "state saved to {}", path.display());
        Ok(())
    }

    /// Restore from a state file written by [`save_to`](Self::save_to).
    pub fn load_from(&self, path: &Path) -> Result<(), String> {
        let bytes =
            std::fs::read(path).map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        let end = self.unserialize_state(&bytes, 0);
        if end < bytes.len() {
            log::warn!(
                target: "codec",
                "{} trailing bytes ignored in {}",
                bytes.len() - end,
                path.display()
            );
        }
        log::info!(target: "codec", "state loaded from {}", path.display());
        Ok(())
    }
}
