use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::amount::Fin;
use super::tiers::{RpTier, StakingTier, XpLevel};

/// Stable user identifier.
pub type UserId = String;

/// KYC verification status (spec §3 "User").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Unverified,
    Pending,
    Verified,
    Rejected,
}

/// Bot-risk classification, driving the damping coefficient of the risk
/// gate (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Damping coefficient applied as the final multiplicative factor on
    /// effective reward (spec §4.6).
    pub const fn damping(self) -> f64 {
        match self {
            RiskLevel::Low => 1.0,
            RiskLevel::Medium => 0.75,
            RiskLevel::High => 0.25,
            RiskLevel::Critical => 0.0,
        }
    }
}

/// The authoritative per-user state owned exclusively by the Ledger
/// (spec §3 "User", "Ownership summary").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct User {
    pub id: UserId,
    pub wallet_id: Option<String>,
    pub kyc_status: KycStatus,
    /// KYC verification level reported alongside `kyc_status` (spec §6
    /// `update_kyc` command table); 0 until the KYC collaborator reports
    /// otherwise.
    pub kyc_level: u8,

    /// Cumulative FIN mined, append-only, non-decreasing (spec §8 invariant 1).
    pub lifetime_mined: Fin,
    pub cumulative_xp: u64,
    pub cumulative_rp: u64,
    pub streak_days: u32,
    pub last_activity_ts: u64,

    pub liquid_balance: Fin,
    pub staked_balance: Fin,

    pub human_probability: f64,
    pub risk_level: RiskLevel,
    pub last_risk_assessment_ts: u64,
    /// Timestamp at which the user's risk level last transitioned into
    /// `Critical`; transitions out are rejected for 1h (spec §4.6 "sticky").
    pub critical_since_ts: Option<u64>,
    pub device_fingerprint_hash: Option<String>,

    /// Daily accrual already claimed today, reset lazily on UTC-day rollover
    /// (spec §4.2 "Daily cap").
    pub daily_claimed: Fin,
    pub daily_cap_reset_day: i64,

    /// 7-day trailing EMA of accepted activity quality, default 1.0
    /// (spec §4.2 item 10).
    pub quality_ema: f64,

    /// Last time accrual was integrated up to (Ledger's claim cursor).
    pub accrual_cursor_ts: u64,

    /// Sticky RP tier: only advances on its own, demoted only after RP stays
    /// below the tier's floor for 30 continuous days (spec §4.4 "Tiers").
    pub highest_rp_tier: RpTier,
    /// When RP first dropped below `highest_rp_tier`'s floor, if it currently
    /// is; cleared once RP recovers above the floor.
    pub rp_tier_floor_breach_since: Option<u64>,
}

impl User {
    pub fn new(id: UserId, kyc_status: KycStatus, now: u64) -> Self {
        User {
            id,
            wallet_id: None,
            kyc_status,
            kyc_level: 0,
            lifetime_mined: Fin::ZERO,
            cumulative_xp: 0,
            cumulative_rp: 0,
            streak_days: 0,
            last_activity_ts: now,
            liquid_balance: Fin::ZERO,
            staked_balance: Fin::ZERO,
            human_probability: 1.0,
            risk_level: RiskLevel::Low,
            last_risk_assessment_ts: now,
            critical_since_ts: None,
            device_fingerprint_hash: None,
            daily_claimed: Fin::ZERO,
            daily_cap_reset_day: day_index(now),
            quality_ema: 1.0,
            accrual_cursor_ts: now,
            highest_rp_tier: RpTier::Explorer,
            rp_tier_floor_breach_since: None,
        }
    }

    pub fn xp_level(&self) -> XpLevel {
        XpLevel::from_cumulative_xp(self.cumulative_xp)
    }

    /// The user's sticky RP tier (spec §4.4 "Tiers": "tier only advances
    /// ... unless RP drops below tier floor for 30 days"). Use
    /// [`crate::engine::rp::resolve_rp_tier`] to advance/demote this as RP
    /// is recomputed.
    pub fn rp_tier(&self) -> RpTier {
        self.highest_rp_tier
    }

    pub fn staking_tier(&self) -> StakingTier {
        StakingTier::from_staked_whole(self.staked_balance.whole_tokens())
    }

    /// Rolls the daily-claimed counter over at UTC midnight, lazily
    /// (spec §4.3 "Daily XP counters reset ... rolled by a lazy read pattern").
    pub fn roll_daily_cap_if_needed(&mut self, now: u64) {
        let today = day_index(now);
        if today != self.daily_cap_reset_day {
            self.daily_cap_reset_day = today;
            self.daily_claimed = Fin::ZERO;
        }
    }
}

/// UTC day index (days since epoch) used for daily-window rollovers.
pub fn day_index(ts: u64) -> i64 {
    (ts / 86_400) as i64
}
