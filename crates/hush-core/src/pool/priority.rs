//! OS scheduling priority for pool threads.

use serde::{Deserialize, Serialize};
use thread_priority::{set_current_thread_priority, ThreadPriorityValue};

/// Priority of pool threads, relative to the host's audio thread (which always
/// outranks them except, possibly, `Realtime`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadPriority {
    #[default]
    Low,
    Normal,
    High,
    /// Highest priority the OS grants an unprivileged process. Use with caution.
    Realtime,
}

impl ThreadPriority {
    /// Apply to the calling thread. Failure (usually missing privileges) is logged and
    /// the thread keeps its inherited priority.
    pub(crate) fn apply_to_current_thread(self) {
        let target = match self {
            ThreadPriority::Low => thread_priority::ThreadPriority::Min,
            ThreadPriority::Normal => return,
            ThreadPriority::High => match ThreadPriorityValue::try_from(75u8) {
                Ok(value) => thread_priority::ThreadPriority::Crossplatform(value),
                Err(_) => return,
            },
            ThreadPriority::Realtime => thread_priority::ThreadPriority::Max,
        };

        if let Err(e) = set_current_thread_priority(target) {
            tracing::debug!("Could not set {:?} thread priority: {:?}", self, e);
        }
    }
}
