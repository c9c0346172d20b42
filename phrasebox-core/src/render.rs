//! Render cache and the dirty state machine that decides when to re-synthesize.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use phrasebox_audio::{render_exchange, RenderPublisher, RenderSubscriber};
use phrasebox_types::{ParamStore, RenderedAudio};

use crate::phrase::PhraseStore;
use crate::synth::{SynthError, SynthesisAdapter};

/// "The current render does not reflect the current text/params."
#[derive(Debug, Default)]
pub struct DirtyFlag(AtomicBool);

impl DirtyFlag {
    pub fn new(dirty: bool) -> Self {
        Self(AtomicBool::new(dirty))
    }

    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// What `ensure_rendered` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The existing render was up to date.
    Current,
    /// A new render was produced and published.
    Rendered { samples: usize },
}

struct RenderCache {
    publisher: RenderPublisher,
    current: Arc<RenderedAudio>,
}

impl RenderCache {
    fn replace(&mut self, render: Arc<RenderedAudio>) {
        self.publisher.publish(Arc::clone(&render));
        self.current = render;
    }
}

pub struct RenderPipeline {
    adapter: SynthesisAdapter,
    dirty: Arc<DirtyFlag>,
    fallback_phrase: String,
    cache: Mutex<RenderCache>,
}

impl RenderPipeline {
    /// Create a pipeline with an empty render. The returned subscriber is the
    /// audio thread's view of the render cache.
    pub fn new(
        adapter: SynthesisAdapter,
        dirty: Arc<DirtyFlag>,
        fallback_phrase: &str,
    ) -> (Self, RenderSubscriber) {
        let empty = Arc::new(RenderedAudio::default());
        let (publisher, subscriber) = render_exchange(Arc::clone(&empty));
        let pipeline = Self {
            adapter,
            dirty,
            fallback_phrase: fallback_phrase.to_string(),
            cache: Mutex::new(RenderCache {
                publisher,
                current: empty,
            }),
        };
        (pipeline, subscriber)
    }

    /// Re-synthesize if the render is dirty or empty.
    ///
    /// On failure the previous render stays published and the dirty flag
    /// stays set so the next opportunity retries. A successful render is
    /// published, which makes the audio thread restart playback from the top.
    pub fn ensure_rendered(
        &self,
        phrases: &PhraseStore,
        params: &ParamStore,
    ) -> Result<RenderOutcome, SynthError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.dirty.is_set() && !cache.current.is_empty() {
            return Ok(RenderOutcome::Current);
        }

        // Taken before rendering: a mutation during synthesis re-marks it.
        self.dirty.take();

        let mut text = phrases.get();
        if text.is_empty() {
            text = self.fallback_phrase.clone();
        }
        let synth_params = params.synth_params();

        match self.adapter.render(&text, synth_params) {
            Ok(pcm) => {
                let render = Arc::new(RenderedAudio::new(pcm));
                let samples = render.len();
                log::debug!(
                    target: "render",
                    "rendered {:?}: {} samples, dc bias {:.4}",
                    text,
                    samples,
                    render.dc_bias()
                );
                cache.replace(render);
                Ok(RenderOutcome::Rendered { samples })
            }
            Err(e) => {
                self.dirty.mark();
                log::warn!(target: "render", "synthesis of {:?} failed: {}", text, e);
                Err(e)
            }
        }
    }

    /// Publish an empty render so playback goes idle.
    pub fn clear(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.replace(Arc::new(RenderedAudio::default()));
        self.dirty.mark();
    }

    /// The most recently published render.
    pub fn current(&self) -> Arc<RenderedAudio> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&cache.current)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_set()
    }
}
