use crate::ids::BrokerOrderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row per operator-visible decision the Replicator made. Mirrors the
/// structured log line emitted for the same decision, with fields
/// `{error_kind, leader_order_id, context}` so either can be queried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub leader_order_id: Option<BrokerOrderId>,
    pub action: String,
    pub error_kind: Option<String>,
    pub context: Value,
    pub created_at: DateTime<Utc>,
}
