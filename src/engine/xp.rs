//! XP Pipeline: activity acceptance, XP computation, streaks (spec §4.3).

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::model::activity::{ActivityKind, Platform};
use crate::model::user::day_index;

/// Per-user bookkeeping the XP pipeline needs beyond the counters that live
/// directly on [`crate::model::user::User`]: daily per-kind counts and the
/// 24h fingerprint-dedup window (spec §3 "ActivityEvent" invariants).
#[derive(Debug, Clone, Default)]
pub struct ActivityState {
    daily_counts: HashMap<(ActivityKind, i64), u32>,
    seen_fingerprints: HashMap<String, u64>,
}

impl ActivityState {
    pub fn daily_count(&self, kind: ActivityKind, ts: u64) -> u32 {
        self.daily_counts.get(&(kind, day_index(ts))).copied().unwrap_or(0)
    }

    pub fn is_duplicate(&self, fingerprint: &str, now: u64) -> bool {
        self.seen_fingerprints
            .get(fingerprint)
            .is_some_and(|&seen_at| now.saturating_sub(seen_at) < 86_400)
    }

    /// Record an accepted activity's fingerprint/day counter and prune
    /// fingerprints that have aged out of the 24h window.
    pub fn record_accepted(&mut self, kind: ActivityKind, fingerprint: &str, ts: u64) {
        *self.daily_counts.entry((kind, day_index(ts))).or_insert(0) += 1;
        self.seen_fingerprints.insert(fingerprint.to_string(), ts);
        self.seen_fingerprints.retain(|_, &mut seen_at| ts.saturating_sub(seen_at) < 86_400);
    }
}

/// Streak multiplier by consecutive active days (spec §4.3).
pub fn streak_multiplier(streak_days: u32) -> f64 {
    match streak_days {
        0..=2 => 1.0,
        3..=6 => 1.2,
        7..=13 => 1.5,
        14..=29 => 2.0,
        _ => 3.0,
    }
}

/// `exp(-0.01 * current_level)` (spec §4.3 `level_decay`).
pub fn level_decay(current_level: u32) -> f64 {
    (-0.01 * current_level as f64).exp()
}

/// `1 + 0.3 * log10(views / 1000)` for views >= 1000, else 1.0, clamped to
/// 3.0 (spec §4.3 `viral_bonus`).
pub fn viral_bonus(views: Option<u64>) -> f64 {
    match views {
        Some(v) if v >= 1_000 => (1.0 + 0.3 * (v as f64 / 1_000.0).log10()).min(3.0),
        _ => 1.0,
    }
}

/// Everything needed to compute one activity's XP award (spec §4.3 "Compute
/// XP gained").
#[derive(Debug, Clone, Copy)]
pub struct XpInputs {
    pub kind: ActivityKind,
    pub platform: Platform,
    pub quality_score: f64,
    pub streak_days: u32,
    pub current_level: u32,
    pub views: Option<u64>,
    /// Strongest active `xp_boost` card multiplier, or `1.0` if none is
    /// active (spec §4.5/§4.8 card composition; resolved by the caller via
    /// `engine::multiplier::resolve_boost_factor`).
    pub xp_boost_factor: f64,
}

/// XP gained, floored to an integer (spec §4.3).
pub fn compute_xp_gained(inputs: &XpInputs, cfg: &EngineConfig) -> u64 {
    let base = cfg.activity_config(inputs.kind).base_xp as f64;
    let platform_mult = cfg.platform_multiplier(inputs.platform);
    let quality = inputs.quality_score.clamp(0.5, 2.0);
    let streak = streak_multiplier(inputs.streak_days);
    let decay = level_decay(inputs.current_level);
    let viral = viral_bonus(inputs.views);
    let card = inputs.xp_boost_factor.max(0.0);

    (base * platform_mult * quality * streak * decay * viral * card).floor().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streak_bands_match_spec() {
        assert_eq!(streak_multiplier(0), 1.0);
        assert_eq!(streak_multiplier(3), 1.2);
        assert_eq!(streak_multiplier(7), 1.5);
        assert_eq!(streak_multiplier(14), 2.0);
        assert_eq!(streak_multiplier(30), 3.0);
    }

    #[test]
    fn viral_bonus_clamped_and_gated() {
        assert_eq!(viral_bonus(Some(500)), 1.0);
        assert!(viral_bonus(Some(10_000)) > 1.0);
        assert!(viral_bonus(Some(u64::MAX)) <= 3.0);
    }

    #[test]
    fn daily_limit_and_duplicate_tracking() {
        let mut state = ActivityState::default();
        state.record_accepted(ActivityKind::Like, "fp1", 1_000);
        assert_eq!(state.daily_count(ActivityKind::Like, 1_000), 1);
        assert!(state.is_duplicate("fp1", 1_000 + 3_600));
        assert!(!state.is_duplicate("fp1", 1_000 + 90_000));
    }

    #[test]
    fn xp_gained_floors_to_integer() {
        let cfg = EngineConfig::default();
        let inputs = XpInputs {
            kind: ActivityKind::Like,
            platform: Platform::Other,
            quality_score: 1.0,
            streak_days: 0,
            current_level: 1,
            views: None,
            xp_boost_factor: 1.0,
        };
        let xp = compute_xp_gained(&inputs, &cfg);
        assert_eq!(xp, (5.0 * level_decay(1)).floor() as u64);
    }

    #[test]
    fn xp_boost_card_multiplies_gain() {
        let cfg = EngineConfig::default();
        let mut inputs = XpInputs {
            kind: ActivityKind::Like,
            platform: Platform::Other,
            quality_score: 1.0,
            streak_days: 0,
            current_level: 0,
            views: None,
            xp_boost_factor: 1.0,
        };
        let base = compute_xp_gained(&inputs, &cfg);
        inputs.xp_boost_factor = 2.0;
        let boosted = compute_xp_gained(&inputs, &cfg);
        assert_eq!(boosted, base * 2);
    }
}
