//! Mining accrual: instantaneous rate composition and time integration
//! (spec §4.2).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, Phase};
use crate::model::amount::Fin;
use crate::model::session::CardEffect;
use crate::model::tiers::{RpTier, StakingTier, XpLevel};
use crate::model::user::RiskLevel;

/// Every input the mining-rate composition needs, gathered by the caller
/// (usually `Ledger::snapshot`/`open_session`) from the User record plus the
/// network-size signal.
#[derive(Debug, Clone, Copy)]
pub struct MiningInputs {
    pub phase: Phase,
    pub total_users: u64,
    pub active_referral_count: u32,
    pub kyc_verified: bool,
    pub risk_level: RiskLevel,
    pub lifetime_mined: Fin,
    pub xp_level: XpLevel,
    pub rp_tier: RpTier,
    pub staking_tier: StakingTier,
    /// Product of active mining-boost cards' multipliers, synergy-adjusted
    /// (spec §4.2 item 9; computed by `engine::multiplier`).
    pub card_factor: f64,
    /// 7-day trailing EMA of accepted activity quality (spec §4.2 item 10).
    pub quality_ema: f64,
}

/// Each clamped factor of the composition plus the final rate, kept around
/// for observability/audit (journal payloads, `mining_rate` query).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RateBreakdown {
    pub base_rate: f64,
    pub pioneer_factor: f64,
    pub referral_factor: f64,
    pub security_factor: f64,
    pub whale_regression: f64,
    pub xp_level_factor: f64,
    pub rp_tier_factor: f64,
    pub staking_factor: f64,
    pub card_factor: f64,
    pub quality_factor: f64,
    /// Product of all factors above, before the absolute hourly ceiling.
    pub unclamped_rate: f64,
    /// Final hourly rate after the phase's absolute ceiling clamp.
    pub hourly_rate: f64,
}

/// Compose the instantaneous hourly mining rate (spec §4.2 items 1-10 plus
/// the final absolute-ceiling clamp). Pure and total: never fails, never
/// reads the clock.
pub fn compose_rate(inputs: &MiningInputs, _cfg: &EngineConfig) -> RateBreakdown {
    let base_rate = inputs.phase.base_rate_per_hour();

    let pioneer_factor = (2.0 - inputs.total_users as f64 / 1_000_000.0).max(1.0);

    let referral_factor = (1.0 + 0.1 * inputs.active_referral_count as f64).min(3.5);

    let security_factor = if inputs.risk_level == RiskLevel::Critical {
        0.25
    } else if inputs.kyc_verified {
        1.2
    } else {
        0.8
    };

    let whale_regression = (-0.001 * inputs.lifetime_mined.whole_tokens() as f64).exp();

    let xp_level_factor = inputs.xp_level.mining_factor();
    let rp_tier_factor = inputs.rp_tier.mining_factor();
    let staking_factor = inputs.staking_tier.mining_factor();
    let card_factor = inputs.card_factor.max(0.0);
    let quality_factor = inputs.quality_ema.clamp(0.5, 2.0);

    let unclamped_rate = base_rate
        * pioneer_factor
        * referral_factor
        * security_factor
        * whale_regression
        * xp_level_factor
        * rp_tier_factor
        * staking_factor
        * card_factor
        * quality_factor;

    // Risk gate damping (spec §4.6) is applied by the caller as the final
    // factor, since it belongs to the Risk Gate component, not the
    // Mining Accrual composition proper; the security-factor override above
    // already forces `critical` down to its documented 0.25 ceiling.
    let hourly_rate = unclamped_rate.min(inputs.phase.hourly_ceiling()).max(0.0);

    RateBreakdown {
        base_rate,
        pioneer_factor,
        referral_factor,
        security_factor,
        whale_regression,
        xp_level_factor,
        rp_tier_factor,
        staking_factor,
        card_factor,
        quality_factor,
        unclamped_rate,
        hourly_rate,
    }
}

/// One piecewise-constant segment of a session's integration window.
#[derive(Debug, Clone, Copy)]
struct Segment {
    start: u64,
    end: u64,
    hourly_rate: f64,
}

/// Integrate accrual across `[opened_at, now]`, splitting at any mining-boost
/// card's expiry instant that falls strictly inside the window (spec §4.2
/// "Time integration"). `base_inputs` holds every factor except the active
/// card factor, which is recomputed per segment from `cards_at_open` filtered
/// by expiry.
pub fn integrate_session(
    opened_at: u64,
    now: u64,
    base_inputs: &MiningInputs,
    cfg: &EngineConfig,
    cards_at_open: &[CardEffect],
    risk_damping: f64,
    card_factor_fn: impl Fn(&[&CardEffect], &EngineConfig) -> f64,
) -> Fin {
    if now <= opened_at {
        return Fin::ZERO;
    }

    let mut breakpoints: Vec<u64> = cards_at_open
        .iter()
        .filter_map(|c| c.expires_at)
        .filter(|&t| t > opened_at && t < now)
        .collect();
    breakpoints.push(now);
    breakpoints.sort_unstable();
    breakpoints.dedup();

    let mut segments = Vec::with_capacity(breakpoints.len());
    let mut cursor = opened_at;
    for &bp in &breakpoints {
        if bp > cursor {
            let active: Vec<&CardEffect> = cards_at_open
                .iter()
                .filter(|c| c.expires_at.is_none_or(|exp| exp > cursor))
                .collect();
            let card_factor = card_factor_fn(&active, cfg);
            let mut inputs = *base_inputs;
            inputs.card_factor = card_factor;
            let breakdown = compose_rate(&inputs, cfg);
            segments.push(Segment {
                start: cursor,
                end: bp,
                hourly_rate: breakdown.hourly_rate * risk_damping,
            });
            cursor = bp;
        }
    }

    let total: f64 = segments
        .iter()
        .map(|s| s.hourly_rate * (s.end - s.start) as f64 / 3_600.0)
        .sum();

    Fin::from_f64_floor(total)
}

/// Tier-indexed absolute daily FIN cap (spec §4.2 "Daily cap"; see
/// DESIGN.md for the resolution of the ambiguous `phase.max_daily ×
/// tier_cap_factor` formula — the tier factor already yields the absolute
/// FIN/day figure).
pub fn daily_cap(xp_level: XpLevel) -> Fin {
    Fin::from_f64_floor(xp_level.daily_cap_factor())
}
