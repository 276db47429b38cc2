use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    VersionDiscovered { version: String },
    SonarDistance { cm: i32 },
    /// Any frame the engine does not act on, with link timing for diagnostics.
    Feedback { text: String, since_read_ms: u64, since_sent_ms: u64 },
    /// No inbound traffic for longer than the dead timeout.
    LinkDead { idle_ms: u64 },
    MuteMic,
    UnmuteMic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RovEvent {
    pub ts_unix_ms: i64,
    pub kind: EventKind,
}

impl RovEvent {
    pub fn now(kind: EventKind) -> Self {
        Self {
            ts_unix_ms: (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64,
            kind,
        }
    }
}
