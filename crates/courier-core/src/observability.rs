use serde::{Deserialize, Serialize};

/// Pending work of one topic, as seen by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    /// Messages in the ready list.
    pub ready: u64,
    /// Entries in the delay set (due or not).
    pub delayed: u64,
}
