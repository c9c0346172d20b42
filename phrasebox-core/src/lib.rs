//! # phrasebox-core
//!
//! Control side of the phrase player: phrase storage, synthesis, the render
//! dirty state machine, state persistence and the entry points a host or UI
//! calls. Independent of any audio backend or UI.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use phrasebox_core::controller::{ControllerOptions, PhraseController};
//! use phrasebox_core::synth::FormantEngine;
//!
//! // 1. Build the controller; move the processor into the audio callback
//! let (controller, processor) =
//!     PhraseController::new(Box::new(FormantEngine::new()), ControllerOptions::default());
//! let _stream = phrasebox_audio::OutputStream::open(None, processor)?;
//!
//! // 2. Feed it text-widget events and triggers
//! controller.on_text_committed("HELLO WORLD")?;
//! controller.request_playback();
//!
//! // 3. Poll status from an idle tick
//! let mut status = controller.status_observer();
//! if let Some(s) = status.poll() { println!("{}", s); }
//! ```
//!
//! ## Module Overview
//!
//! - [`controller`]: `PhraseController`: text events, triggers, params, MIDI, save/load
//! - [`phrase`]: `PhraseStore`, the bounded phrase text
//! - [`render`]: `DirtyFlag` and `RenderPipeline` (`ensure_rendered`)
//! - [`synth`]: `SpeechEngine` capability, `SynthesisAdapter`, built-in `FormantEngine`
//! - [`codec`]: versioned and legacy state chunk layouts
//! - [`status`]: playback status text for a UI
//! - [`config`]: TOML configuration (embedded defaults + user override)
//! - [`midi`]: MIDI input
//! - [`paths`]: per-user file locations

pub mod codec;
pub mod config;
pub mod controller;
pub mod midi;
pub mod paths;
pub mod phrase;
pub mod render;
pub mod status;
pub mod synth;

pub use controller::{ControllerOptions, PhraseController};
