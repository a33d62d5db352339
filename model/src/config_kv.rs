use serde::{Deserialize, Serialize};

/// Mutable, store-backed configuration item. `copy_enabled` and the
/// `last_leader_event_ts` cursor live here, re-read on each replication
/// pass rather than frozen into the startup config snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigKv {
    pub key: String,
    pub value: String,
}

/// Well-known keys.
pub mod keys {
    pub const COPY_ENABLED: &str = "copy_enabled";
    pub const LAST_LEADER_EVENT_TS: &str = "last_leader_event_ts";
}
