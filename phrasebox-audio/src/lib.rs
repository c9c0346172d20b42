//! # phrasebox-audio
//!
//! Real-time side of the phrase player: the trigger/acknowledge protocol,
//! the lock-free render hand-off, the resampling playback reader and the
//! block entry point driven by the host (or by a cpal output stream).

pub mod bounce;
pub mod output;
pub mod processor;
pub mod reader;
pub mod render_exchange;
pub mod trigger;

pub use output::OutputStream;
pub use processor::{AudioProcessor, PlaybackControl};
pub use reader::{PlaybackReader, ReaderState};
pub use render_exchange::{render_exchange, RenderPublisher, RenderSubscriber};
pub use trigger::TriggerProtocol;
