//! All tunable constants enumerated in spec.md §6, consolidated into plain
//! config structs passed into the pure composition functions in
//! `engine::mining`/`engine::multiplier`/`engine::risk` — never read from
//! globals, per spec.md §9's first re-architecture note.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::activity::{ActivityKind, Platform};
use crate::model::session::{EffectKind, SynergyGroup};

/// Network-size bracket dictating the mining base rate and the absolute
/// hourly anti-whale ceiling (spec §4.2 item 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Finizen,
    Growth,
    Maturity,
    Stability,
}

impl Phase {
    /// Resolve the phase from a total-network-users reading. Boundaries are
    /// half-open `[lo, hi)` (spec §8 "Boundary behaviours").
    pub fn from_total_users(total_users: u64) -> Phase {
        if total_users < 100_000 {
            Phase::Finizen
        } else if total_users < 1_000_000 {
            Phase::Growth
        } else if total_users < 10_000_000 {
            Phase::Maturity
        } else {
            Phase::Stability
        }
    }

    /// Base hourly mining rate in FIN/hr (spec §4.2 item 1).
    pub const fn base_rate_per_hour(self) -> f64 {
        match self {
            Phase::Finizen => 0.1,
            Phase::Growth => 0.05,
            Phase::Maturity => 0.025,
            Phase::Stability => 0.01,
        }
    }

    /// Absolute phase-level daily FIN ceiling used only to derive the
    /// per-user hourly rate clamp (`max_daily / 24`, spec §4.2 "Final hourly
    /// rate is further clamped..."). Distinct from the tier-indexed daily
    /// cap in [`EngineConfig::daily_caps_by_tier`] — see DESIGN.md.
    pub const fn max_daily(self) -> f64 {
        match self {
            Phase::Finizen => 4.8,
            Phase::Growth => 1.8,
            Phase::Maturity => 0.72,
            Phase::Stability => 0.24,
        }
    }

    pub fn hourly_ceiling(self) -> f64 {
        self.max_daily() / 24.0
    }
}

/// Per-activity-kind base XP and declared daily limit (spec §4.3
/// `base_xp(kind)`; table values grounded on `examples/finova-net-finova`'s
/// `constants.rs`, see SPEC_FULL.md §C).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActivityKindConfig {
    pub base_xp: u64,
    pub daily_limit: u32,
}

/// Composer + ledger configuration: every numeric knob named in spec.md §6.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    pub activity_kinds: HashMap<ActivityKind, ActivityKindConfig>,
    pub platform_multipliers: HashMap<Platform, f64>,

    /// Tier-indexed absolute daily FIN cap, 0.5 at Bronze I rising to 15.0
    /// at Mythic X (spec §4.2 "Daily cap"); computed via
    /// [`crate::model::tiers::XpLevel::daily_cap_factor`] directly as FIN.
    pub card_synergy_cap: f64,
    pub cross_group_synergy_step: f64,
    pub cross_group_synergy_max: f64,
    pub multiplier_ceiling: f64,

    /// Bound on simultaneously active card effects per user (spec §5
    /// "Card effects list: bounded per user").
    pub max_active_cards: u32,

    pub session_max_duration_secs: u64,
    pub claim_retry_budget: u32,
    pub network_size_staleness_secs: u64,
    pub rp_depth: u8,
    pub quality_ema_window_days: u32,

    /// Risk re-verification interval for `medium` risk (spec §4.6).
    pub medium_reverification_interval_secs: u64,
    /// Minimum sticky duration once a user transitions to `critical`
    /// (spec §4.6 "Transitions to critical are sticky for at least 1 hour").
    pub critical_sticky_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let activity_kinds = HashMap::from([
            (ActivityKind::Post, ActivityKindConfig { base_xp: 50, daily_limit: 10 }),
            (ActivityKind::PhotoPost, ActivityKindConfig { base_xp: 75, daily_limit: 20 }),
            (ActivityKind::VideoPost, ActivityKindConfig { base_xp: 150, daily_limit: 10 }),
            (ActivityKind::Story, ActivityKindConfig { base_xp: 25, daily_limit: 50 }),
            (ActivityKind::Comment, ActivityKindConfig { base_xp: 25, daily_limit: 100 }),
            // Daily limit pinned at 100 per spec.md's literal S5 scenario
            // (101st like of the day -> DailyLimit).
            (ActivityKind::Like, ActivityKindConfig { base_xp: 5, daily_limit: 100 }),
            (ActivityKind::Share, ActivityKindConfig { base_xp: 15, daily_limit: 50 }),
            (ActivityKind::Follow, ActivityKindConfig { base_xp: 20, daily_limit: 25 }),
            (ActivityKind::Login, ActivityKindConfig { base_xp: 10, daily_limit: 1 }),
            (ActivityKind::Quest, ActivityKindConfig { base_xp: 100, daily_limit: 3 }),
            (ActivityKind::Live, ActivityKindConfig { base_xp: 200, daily_limit: 5 }),
        ]);

        let platform_multipliers = HashMap::from([
            (Platform::TikTok, 1.3),
            (Platform::YouTube, 1.4),
            (Platform::Instagram, 1.2),
            (Platform::X, 1.2),
            (Platform::Facebook, 1.1),
            (Platform::Other, 1.0),
        ]);

        EngineConfig {
            activity_kinds,
            platform_multipliers,
            card_synergy_cap: 5.0,
            cross_group_synergy_step: 0.15,
            cross_group_synergy_max: 0.30,
            multiplier_ceiling: 50.0,
            max_active_cards: 5,
            session_max_duration_secs: 24 * 3_600,
            claim_retry_budget: 3,
            network_size_staleness_secs: 60,
            rp_depth: 3,
            quality_ema_window_days: 7,
            medium_reverification_interval_secs: 24 * 3_600,
            critical_sticky_secs: 3_600,
        }
    }
}

impl EngineConfig {
    pub fn activity_config(&self, kind: ActivityKind) -> ActivityKindConfig {
        self.activity_kinds
            .get(&kind)
            .copied()
            .unwrap_or(ActivityKindConfig { base_xp: 0, daily_limit: 0 })
    }

    pub fn platform_multiplier(&self, platform: Platform) -> f64 {
        self.platform_multipliers.get(&platform).copied().unwrap_or(1.0).clamp(1.0, 1.4)
    }
}

/// A catalogue entry for an activatable card (spec §3 "CardEffect",
/// SPEC_FULL.md §C "Card catalogue").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CardDef {
    pub card_id: String,
    pub card_type: String,
    pub effect_kind: EffectKind,
    pub multiplier: f64,
    pub synergy_group: SynergyGroup,
    pub stackable: bool,
    pub duration_secs: Option<u64>,
    pub uses: Option<u32>,
}

/// The fixed card catalogue. A real deployment would source this from the
/// marketplace collaborator; the engine only needs to validate
/// `activate_card` against *some* concrete catalogue.
pub fn card_catalogue() -> Vec<CardDef> {
    vec![
        CardDef {
            card_id: "double_mining".into(),
            card_type: "Double Mining".into(),
            effect_kind: EffectKind::MiningBoost,
            multiplier: 2.0,
            synergy_group: SynergyGroup::Core,
            stackable: true,
            duration_secs: Some(24 * 3_600),
            uses: None,
        },
        CardDef {
            card_id: "triple_mining".into(),
            card_type: "Triple Mining".into(),
            effect_kind: EffectKind::MiningBoost,
            multiplier: 3.0,
            synergy_group: SynergyGroup::Core,
            stackable: true,
            duration_secs: Some(12 * 3_600),
            uses: None,
        },
        CardDef {
            card_id: "mining_fever".into(),
            card_type: "Mining Fever".into(),
            effect_kind: EffectKind::MiningBoost,
            multiplier: 1.5,
            synergy_group: SynergyGroup::Event,
            stackable: true,
            duration_secs: Some(6 * 3_600),
            uses: None,
        },
        CardDef {
            card_id: "xp_accelerator".into(),
            card_type: "XP Accelerator".into(),
            effect_kind: EffectKind::XpBoost,
            multiplier: 1.5,
            synergy_group: SynergyGroup::Core,
            stackable: true,
            duration_secs: Some(24 * 3_600),
            uses: None,
        },
        CardDef {
            card_id: "xp_double".into(),
            card_type: "XP Double".into(),
            effect_kind: EffectKind::XpBoost,
            multiplier: 2.0,
            synergy_group: SynergyGroup::Event,
            stackable: true,
            duration_secs: Some(3_600),
            uses: None,
        },
        CardDef {
            card_id: "referral_boost".into(),
            card_type: "Referral Boost".into(),
            effect_kind: EffectKind::RpBoost,
            multiplier: 1.5,
            synergy_group: SynergyGroup::Referral,
            stackable: true,
            duration_secs: Some(7 * 24 * 3_600),
            uses: None,
        },
        CardDef {
            card_id: "quality_spotlight".into(),
            card_type: "Quality Spotlight".into(),
            effect_kind: EffectKind::QualityOverride,
            multiplier: 2.0,
            synergy_group: SynergyGroup::Quality,
            stackable: false,
            duration_secs: Some(3_600),
            uses: None,
        },
        CardDef {
            card_id: "streak_saver".into(),
            card_type: "Streak Saver".into(),
            effect_kind: EffectKind::StreakShield,
            multiplier: 1.0,
            synergy_group: SynergyGroup::Quality,
            stackable: false,
            duration_secs: None,
            uses: Some(1),
        },
    ]
}
