use serde::{Deserialize, Serialize};

/// The control state that survives a session save/restore.
///
/// Rendered audio is never part of it; it is re-derived from `text` on load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersistedState {
    /// A trigger was requested but not yet acknowledged by the audio thread.
    pub pending: bool,
    pub request_count: u32,
    pub text: String,
}

impl PersistedState {
    /// Acknowledgements implied by the record: a pending trigger counts as
    /// one outstanding request.
    pub fn ack_count(&self) -> u32 {
        self.request_count.saturating_sub(u32::from(self.pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_trigger_is_one_outstanding_request() {
        let s = PersistedState {
            pending: true,
            request_count: 4,
            text: String::new(),
        };
        assert_eq!(s.ack_count(), 3);
    }

    #[test]
    fn ack_count_never_underflows() {
        let s = PersistedState {
            pending: true,
            request_count: 0,
            text: String::new(),
        };
        assert_eq!(s.ack_count(), 0);
    }
}
