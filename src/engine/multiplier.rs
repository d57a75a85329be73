//! Multiplier Composer: stacking and synergy rules for active card effects
//! (spec §4.5).

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::model::session::{CardEffect, EffectKind, SynergyGroup};

/// Compose the active mining-boost card factor: same-synergy-group cards
/// multiply (capped per group at `card_synergy_cap`), then every additional
/// distinct active group beyond the first grants a cross-group synergy
/// bonus capped at `cross_group_synergy_max` (spec §4.5).
pub fn compose_mining_card_factor(active: &[&CardEffect], cfg: &EngineConfig) -> f64 {
    let mut by_group: HashMap<SynergyGroup, f64> = HashMap::new();
    for card in active.iter().filter(|c| c.effect_kind == EffectKind::MiningBoost) {
        let entry = by_group.entry(card.synergy_group).or_insert(1.0);
        *entry *= card.multiplier.max(1.0);
    }
    for product in by_group.values_mut() {
        *product = product.min(cfg.card_synergy_cap);
    }

    let group_product: f64 = by_group.values().product();
    let distinct_groups = by_group.len();
    let synergy_bonus = if distinct_groups > 1 {
        (cfg.cross_group_synergy_step * (distinct_groups as f64 - 1.0)).min(cfg.cross_group_synergy_max)
    } else {
        0.0
    };

    if group_product == 0.0 && distinct_groups == 0 {
        1.0
    } else {
        group_product * (1.0 + synergy_bonus)
    }
}

/// The quality factor to use for mining-rate/XP composition: a
/// `quality_override` card forces a fixed value for its duration, otherwise
/// the user's trailing quality EMA is used as-is (spec §4.5 "Quality-override
/// cards force the quality factor to a fixed value").
pub fn resolve_quality_factor(active: &[&CardEffect], ema: f64) -> f64 {
    active
        .iter()
        .find(|c| c.effect_kind == EffectKind::QualityOverride)
        .map(|c| c.multiplier)
        .unwrap_or(ema)
        .clamp(0.5, 2.0)
}

/// Strongest active card of a given kind, or `1.0` (neutral) if none are
/// active. Used for the non-mining boost kinds (`xp_boost`, `rp_boost`)
/// whose composition is a single override rather than the synergy-group
/// stacking that `mining_boost` gets (spec §4.5, §4.8).
pub fn resolve_boost_factor(active: &[&CardEffect], kind: EffectKind) -> f64 {
    active.iter().filter(|c| c.effect_kind == kind).map(|c| c.multiplier).fold(1.0, f64::max)
}

/// Clamp a composed effective multiplier to the global ceiling, reporting
/// whether a clamp actually happened (callers emit `MultiplierClamped` when
/// true, spec §4.5 "Effective multiplier <= a global ceiling of 50.0x").
pub fn clamp_to_ceiling(value: f64, cfg: &EngineConfig) -> (f64, bool) {
    if value > cfg.multiplier_ceiling {
        (cfg.multiplier_ceiling, true)
    } else {
        (value, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(multiplier: f64, group: SynergyGroup) -> CardEffect {
        CardEffect {
            effect_id: "e".into(),
            user_id: "u".into(),
            card_type: "t".into(),
            effect_kind: EffectKind::MiningBoost,
            multiplier,
            synergy_group: group,
            stackable: true,
            activated_at: 0,
            expires_at: None,
            uses_left: None,
        }
    }

    #[test]
    fn same_group_multiplies_and_caps() {
        let cfg = EngineConfig::default();
        let a = card(3.0, SynergyGroup::Core);
        let b = card(3.0, SynergyGroup::Core);
        let factor = compose_mining_card_factor(&[&a, &b], &cfg);
        assert_eq!(factor, cfg.card_synergy_cap);
    }

    #[test]
    fn cross_group_bonus_capped() {
        let cfg = EngineConfig::default();
        let a = card(1.5, SynergyGroup::Core);
        let b = card(1.5, SynergyGroup::Event);
        let c = card(1.5, SynergyGroup::Referral);
        let d = card(1.5, SynergyGroup::Quality);
        let factor = compose_mining_card_factor(&[&a, &b, &c, &d], &cfg);
        let group_product: f64 = 1.5_f64.powi(4);
        let expected = group_product * (1.0 + cfg.cross_group_synergy_max);
        assert!((factor - expected).abs() < 1e-9);
    }

    #[test]
    fn no_active_cards_is_neutral() {
        let cfg = EngineConfig::default();
        assert_eq!(compose_mining_card_factor(&[], &cfg), 1.0);
    }

    #[test]
    fn boost_factor_picks_strongest_active_and_defaults_neutral() {
        let mut a = card(1.5, SynergyGroup::Core);
        a.effect_kind = EffectKind::XpBoost;
        let mut b = card(2.0, SynergyGroup::Event);
        b.effect_kind = EffectKind::XpBoost;
        assert_eq!(resolve_boost_factor(&[&a, &b], EffectKind::XpBoost), 2.0);
        assert_eq!(resolve_boost_factor(&[&a], EffectKind::RpBoost), 1.0);
        assert_eq!(resolve_boost_factor(&[], EffectKind::XpBoost), 1.0);
    }

    #[test]
    fn global_ceiling_clamps() {
        let cfg = EngineConfig::default();
        let (v, clamped) = clamp_to_ceiling(100.0, &cfg);
        assert_eq!(v, cfg.multiplier_ceiling);
        assert!(clamped);
    }
}
