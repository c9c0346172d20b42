use std::sync::{Arc, Mutex, PoisonError};

use phrasebox_types::{truncate_to_bound, MAX_PHRASE_LEN};

use crate::render::DirtyFlag;

/// The phrase text, shared between control contexts.
///
/// The lock is held only to copy or replace the string, never across
/// synthesis or I/O. The audio thread never touches it.
pub struct PhraseStore {
    text: Mutex<String>,
    dirty: Arc<DirtyFlag>,
}

impl PhraseStore {
    pub fn new(initial: &str, dirty: Arc<DirtyFlag>) -> Self {
        Self {
            text: Mutex::new(truncate_to_bound(initial, MAX_PHRASE_LEN).to_string()),
            dirty,
        }
    }

    /// Replace the phrase, truncated to [`MAX_PHRASE_LEN`] bytes, and mark the
    /// render dirty.
    pub fn set(&self, text: &str) {
        let bounded = truncate_to_bound(text, MAX_PHRASE_LEN);
        if bounded.len() < text.len() {
            log::debug!(target: "phrase", "phrase truncated from {} to {} bytes", text.len(), bounded.len());
        }
        {
            let mut guard = self.text.lock().unwrap_or_else(PoisonError::into_inner);
            guard.clear();
            guard.push_str(bounded);
        }
        self.dirty.mark();
    }

    /// A consistent snapshot of the phrase.
    pub fn get(&self) -> String {
        self.text.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
