use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::amount::Fin;
use super::user::UserId;

/// Outcome reported by the external token authority for a settlement token
/// (spec §4.7 "Settling -> Settled", "Settling -> Claimable").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Confirmed,
    RetryableRejection,
    FatalRejection,
}

/// Mining session lifecycle (spec §4.7 "Session / Claim FSM").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Active,
    Claimable,
    Settling,
    Settled,
    Cancelled,
}

/// A bounded mining accrual window (spec §3 "MiningSession").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MiningSession {
    pub user_id: UserId,
    pub session_id: String,
    pub state: SessionState,
    pub opened_at: u64,
    /// Effective hourly rate snapshot taken at open (spec §4.2
    /// "Implementations MAY recompute rate at session open").
    pub rate_snapshot_per_hour: f64,
    /// Card effect ids active at open, so mid-session expiry can be detected
    /// by checking each id's `expires_at` against the integration window.
    pub active_card_ids_snapshot: Vec<String>,
    pub closed_at: Option<u64>,
    /// Amount accrued for this session, set on close (Active -> Claimable).
    pub accrued: Fin,
    /// Idempotency key that `open_session` was called with.
    pub open_idempotency_key: String,
    /// Idempotency key that `request_claim` was called with, once claimed.
    pub claim_idempotency_key: Option<String>,
    /// Settlement token handed to the external token authority, once a
    /// claim has moved this session into `Settling`.
    pub settlement_token: Option<String>,
    pub claim_attempts: u32,
}

impl MiningSession {
    pub fn new(
        user_id: UserId,
        session_id: String,
        opened_at: u64,
        rate_snapshot_per_hour: f64,
        active_card_ids_snapshot: Vec<String>,
        open_idempotency_key: String,
    ) -> Self {
        MiningSession {
            user_id,
            session_id,
            state: SessionState::Active,
            opened_at,
            rate_snapshot_per_hour,
            active_card_ids_snapshot,
            closed_at: None,
            accrued: Fin::ZERO,
            open_idempotency_key,
            claim_idempotency_key: None,
            settlement_token: None,
            claim_attempts: 0,
        }
    }
}

/// What a card effect boosts (spec §3 "CardEffect").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    MiningBoost,
    XpBoost,
    RpBoost,
    QualityOverride,
    StreakShield,
}

/// A card's synergy group; mining-boost cards in the same group multiply
/// together but are capped as a group, while distinct active groups grant a
/// cross-group synergy bonus (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SynergyGroup {
    Core,
    Event,
    Referral,
    Quality,
}

/// An activated card effect record (spec §3 "CardEffect", §4.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CardEffect {
    pub effect_id: String,
    pub user_id: UserId,
    pub card_type: String,
    pub effect_kind: EffectKind,
    pub multiplier: f64,
    pub synergy_group: SynergyGroup,
    pub stackable: bool,
    pub activated_at: u64,
    pub expires_at: Option<u64>,
    pub uses_left: Option<u32>,
}

impl CardEffect {
    pub fn is_expired(&self, now: u64) -> bool {
        match (self.expires_at, self.uses_left) {
            (Some(exp), _) => now >= exp,
            (None, Some(uses)) => uses == 0,
            (None, None) => false,
        }
    }
}
