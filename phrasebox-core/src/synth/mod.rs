//! Speech engine capability and the serialized adapter around it.
//!
//! `SpeechEngine` captures what the player needs from a synthesizer (text plus
//! four parameters in, unsigned 8-bit PCM at [`SOURCE_SAMPLE_RATE`] out)
//! independently of how it's done. Engines are assumed non-reentrant and to
//! keep process-wide state, so every call goes through [`SynthesisAdapter`],
//! which serializes all engine calls in the process behind one lock.
//!
//! [`SOURCE_SAMPLE_RATE`]: phrasebox_types::SOURCE_SAMPLE_RATE

mod formant;

pub use formant::FormantEngine;

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use phrasebox_types::SynthParams;

/// Fixed input capacity of an engine call, including end marker and NUL.
pub const ENGINE_INPUT_BYTES: usize = 256;

/// Terminates the text handed to an engine.
pub const END_MARKER: u8 = b'[';

/// Serializes every engine call in the process.
static ENGINE_LOCK: Mutex<()> = Mutex::new(());

/// Failure from a synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthError {
    /// Nothing in the text could be pronounced.
    NoPhonemes,
    /// The engine reported success but produced no samples.
    EmptyOutput,
    /// Engine-specific failure.
    Engine(String),
}

impl fmt::Display for SynthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthError::NoPhonemes => write!(f, "text contains nothing to pronounce"),
            SynthError::EmptyOutput => write!(f, "engine produced no audio"),
            SynthError::Engine(msg) => write!(f, "engine failure: {}", msg),
        }
    }
}

impl std::error::Error for SynthError {}

impl From<String> for SynthError {
    fn from(s: String) -> Self {
        SynthError::Engine(s)
    }
}

/// A text-to-speech engine producing unsigned 8-bit PCM at the source rate.
pub trait SpeechEngine: Send {
    /// Render prepared input: upper-cased text bytes, then [`END_MARKER`],
    /// then NUL. Parameters are already clamped to [0, 255].
    fn render(&mut self, input: &[u8], params: SynthParams) -> Result<Vec<u8>, SynthError>;
}

/// Upper-case `text`, truncate it to the engine capacity and terminate it.
pub fn prepare_input(text: &str) -> Vec<u8> {
    let n = text.len().min(ENGINE_INPUT_BYTES - 2);
    let mut input = Vec::with_capacity(n + 2);
    input.extend(text.as_bytes()[..n].iter().map(u8::to_ascii_uppercase));
    input.push(END_MARKER);
    input.push(0);
    input
}

/// The only way the rest of the crate reaches an engine.
pub struct SynthesisAdapter {
    engine: Mutex<Box<dyn SpeechEngine>>,
}

impl SynthesisAdapter {
    pub fn new(engine: Box<dyn SpeechEngine>) -> Self {
        Self {
            engine: Mutex::new(engine),
        }
    }

    /// Render `text` with `params` clamped to the engine range. May take
    /// arbitrarily long; never call from the audio callback.
    pub fn render(&self, text: &str, params: SynthParams) -> Result<Vec<u8>, SynthError> {
        let input = prepare_input(text);
        let params = params.clamped();

        let _serialized = ENGINE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        let pcm = engine.render(&input, params)?;
        if pcm.is_empty() {
            return Err(SynthError::EmptyOutput);
        }
        Ok(pcm)
    }
}

/// A recorded engine call.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineCall {
    pub input: Vec<u8>,
    pub params: SynthParams,
}

#[derive(Default)]
struct Script {
    queued: VecDeque<Result<Vec<u8>, SynthError>>,
    fallback: Option<Result<Vec<u8>, SynthError>>,
    calls: Vec<EngineCall>,
}

/// A test engine that replays queued results and records every call.
///
/// Clones share the same script, so a test can keep one clone for
/// assertions after boxing another into an adapter. When the queue is empty
/// the fallback result is returned (failure if none was set).
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// An engine that always returns `pcm`.
    pub fn always(pcm: Vec<u8>) -> Self {
        let engine = Self::new();
        engine.set_fallback(Ok(pcm));
        engine
    }

    /// An engine that always fails.
    pub fn failing() -> Self {
        let engine = Self::new();
        engine.set_fallback(Err(SynthError::NoPhonemes));
        engine
    }

    pub fn push(&self, result: Result<Vec<u8>, SynthError>) {
        self.script().queued.push_back(result);
    }

    pub fn set_fallback(&self, result: Result<Vec<u8>, SynthError>) {
        self.script().fallback = Some(result);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.script().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.script().calls.len()
    }

    /// Text of the most recent call, without end marker and NUL.
    pub fn last_text(&self) -> Option<String> {
        let script = self.script();
        let call = script.calls.last()?;
        let end = call.input.iter().position(|&b| b == END_MARKER)?;
        Some(String::from_utf8_lossy(&call.input[..end]).into_owned())
    }
}

impl SpeechEngine for ScriptedEngine {
    fn render(&mut self, input: &[u8], params: SynthParams) -> Result<Vec<u8>, SynthError> {
        let mut script = self.script();
        script.calls.push(EngineCall {
            input: input.to_vec(),
            params,
        });
        match script.queued.pop_front() {
            Some(result) => result,
            None => script
                .fallback
                .clone()
                .unwrap_or(Err(SynthError::Engine("script exhausted".to_string()))),
        }
    }
}
