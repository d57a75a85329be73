use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::activity::{ActivityKind, Platform};
use super::session::SettlementOutcome;
use super::user::{KycStatus, UserId};

/// The inbound command surface (spec §6 "Commands (inbound)"). Every mutating
/// interaction with the engine is one of these variants; each is validated
/// and applied atomically against the Ledger under a per-user serialized
/// region (spec §5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    CreateUser {
        user_id: UserId,
        referral_code: Option<UserId>,
        initial_kyc_status: KycStatus,
    },
    UpdateKyc {
        user_id: UserId,
        new_status: KycStatus,
        /// KYC verification level reached (e.g. basic/biometric/enhanced
        /// tiers), as reported by the KYC collaborator (spec §6 command
        /// table). Opaque to the engine beyond being stored and journalled —
        /// no accrual formula keys off it (see DESIGN.md).
        level: u8,
        idempotency_key: String,
    },
    SubmitActivity {
        user_id: UserId,
        kind: ActivityKind,
        platform: Platform,
        content_fingerprint: String,
        quality_score: f64,
        views: Option<u64>,
        ts: u64,
        idempotency_key: String,
    },
    RegisterReferral {
        referrer_id: UserId,
        referee_id: UserId,
    },
    OpenSession {
        user_id: UserId,
        idempotency_key: String,
        ts: u64,
    },
    CloseSession {
        user_id: UserId,
        session_id: String,
        ts: u64,
    },
    RequestClaim {
        user_id: UserId,
        session_id: String,
        idempotency_key: String,
    },
    AcknowledgeSettlement {
        settlement_token: String,
        outcome: SettlementOutcome,
    },
    ActivateCard {
        user_id: UserId,
        card_id: String,
        ts: u64,
    },
    StakeChange {
        user_id: UserId,
        new_staked_whole: u64,
    },
    UpdateRisk {
        user_id: UserId,
        human_probability: f64,
        velocity_anomaly: f64,
        duplication_ratio: f64,
        fingerprint_consistency: f64,
        ts: u64,
    },
}
