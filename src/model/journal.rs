use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::user::UserId;

/// Journal entry kinds (spec §3 "Journal Entry").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JournalKind {
    ActivityAccepted,
    ActivityHeld,
    XpAwarded,
    RpRecomputed,
    SessionOpened,
    SessionClosed,
    SessionClaimed,
    SessionSettled,
    SessionCancelled,
    CardActivated,
    CardExpired,
    StakeChanged,
    KycUpdated,
    RiskUpdated,
    SettlementFailed,
    MultiplierClamped,
    ReferralRegistered,
}

/// An immutable, append-only, totally-ordered-per-user record of an accepted
/// state change (spec §3 "Journal Entry", §6 persistence layout).
///
/// `payload` carries the deterministic inputs and pre/post counters required
/// to recompute the outcome on replay; its shape is kind-specific and is not
/// itself schema-constrained (each producer documents its own fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JournalEntry {
    pub seq: u64,
    pub user_id: UserId,
    pub kind: JournalKind,
    pub ts: u64,
    pub payload: Value,
}
