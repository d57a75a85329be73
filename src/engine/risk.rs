//! Risk Gate: translates anti-bot/velocity signals into a risk level and a
//! damping coefficient (spec §4.6).

use crate::config::EngineConfig;
use crate::model::user::RiskLevel;

/// Raw signals consumed by the risk gate (spec §4.6 "Inputs").
#[derive(Debug, Clone, Copy)]
pub struct RiskSignals {
    pub human_probability: f64,
    pub velocity_anomaly: f64,
    pub duplication_ratio: f64,
    pub fingerprint_consistency: f64,
}

/// Classify raw signals into a risk level. Thresholds are conservative and
/// monotone in each signal; a single bad signal is enough to escalate, since
/// the gate's job is to fail closed against Sybil/bot farms.
pub fn classify(signals: RiskSignals) -> RiskLevel {
    if signals.human_probability < 0.2 || signals.duplication_ratio > 0.8 {
        RiskLevel::Critical
    } else if signals.human_probability < 0.5
        || signals.velocity_anomaly > 0.7
        || signals.fingerprint_consistency < 0.3
    {
        RiskLevel::High
    } else if signals.human_probability < 0.8 || signals.velocity_anomaly > 0.4 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Resolve the risk level a user should transition to, honoring the
/// sticky-critical rule (spec §4.6 "Transitions to critical are sticky for
/// at least 1 hour regardless of subsequent signals").
pub fn resolve_transition(
    current: RiskLevel,
    critical_since_ts: Option<u64>,
    proposed: RiskLevel,
    now: u64,
    cfg: &EngineConfig,
) -> RiskLevel {
    if current == RiskLevel::Critical {
        if let Some(since) = critical_since_ts {
            if now < since + cfg.critical_sticky_secs {
                return RiskLevel::Critical;
            }
        }
    }
    proposed
}

/// The final multiplicative damping applied after all other mining-rate
/// composition (spec §4.6 "Damping is applied as a final multiplicative
/// factor after all other composition").
pub fn damping(level: RiskLevel) -> f64 {
    level.damping()
}

/// Whether a claim attempt must be held for the given risk level (spec §4.6
/// "high: claims held until human-probability check passes",
/// "critical: ... not claimable until cleared").
pub fn claim_blocked(level: RiskLevel) -> bool {
    matches!(level, RiskLevel::High | RiskLevel::Critical)
}

/// Whether opening a new session is blocked outright (spec §4.7 "Blocked if
/// risk is critical").
pub fn session_open_blocked(level: RiskLevel) -> bool {
    level == RiskLevel::Critical
}
