use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// XP tier. Determines the mining XP-level factor band (spec §4.2 item 6)
/// and the daily FIN cap multiplier (spec §4.2 "Daily cap").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum XpTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Mythic,
}

impl XpTier {
    /// Cumulative-XP floor for each tier.
    pub const fn floor(self) -> u64 {
        match self {
            XpTier::Bronze => 0,
            XpTier::Silver => 1_000,
            XpTier::Gold => 5_000,
            XpTier::Platinum => 20_000,
            XpTier::Diamond => 50_000,
            XpTier::Mythic => 100_000,
        }
    }

    /// Inclusive (lo, hi) mining-rate-factor band for the tier, interpolated
    /// across the 10 levels of the tier (spec §4.2 item 6).
    const fn factor_band(self) -> (f64, f64) {
        match self {
            XpTier::Bronze => (1.0, 1.2),
            XpTier::Silver => (1.3, 1.8),
            XpTier::Gold => (1.9, 2.5),
            XpTier::Platinum => (2.6, 3.2),
            XpTier::Diamond => (3.3, 4.0),
            XpTier::Mythic => (4.1, 5.0),
        }
    }

    /// Daily FIN cap multiplier, rising from 0.5 at Bronze I to 15.0 at
    /// Mythic X (spec §4.2 "Daily cap").
    const fn cap_band(self) -> (f64, f64) {
        match self {
            XpTier::Bronze => (0.5, 1.0),
            XpTier::Silver => (1.0, 2.0),
            XpTier::Gold => (2.0, 4.0),
            XpTier::Platinum => (4.0, 7.0),
            XpTier::Diamond => (7.0, 11.0),
            XpTier::Mythic => (11.0, 15.0),
        }
    }

    pub const fn next(self) -> Option<XpTier> {
        match self {
            XpTier::Bronze => Some(XpTier::Silver),
            XpTier::Silver => Some(XpTier::Gold),
            XpTier::Gold => Some(XpTier::Platinum),
            XpTier::Platinum => Some(XpTier::Diamond),
            XpTier::Diamond => Some(XpTier::Mythic),
            XpTier::Mythic => None,
        }
    }

    pub fn from_xp(xp: u64) -> XpTier {
        const TIERS: [XpTier; 6] = [
            XpTier::Mythic,
            XpTier::Diamond,
            XpTier::Platinum,
            XpTier::Gold,
            XpTier::Silver,
            XpTier::Bronze,
        ];
        TIERS
            .into_iter()
            .find(|t| xp >= t.floor())
            .unwrap_or(XpTier::Bronze)
    }
}

/// XP level, a deterministic function of cumulative XP (spec §8 invariant 8):
/// the tier plus a level-within-tier on a 10-way equal partition of the
/// tier's XP range (open-ended for Mythic, partitioned on a fixed span).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct XpLevel {
    pub tier: XpTier,
    /// 1-10 within the tier.
    pub level_in_tier: u8,
}

const MYTHIC_LEVEL_SPAN: u64 = 20_000;

impl XpLevel {
    pub fn from_cumulative_xp(xp: u64) -> XpLevel {
        let tier = XpTier::from_xp(xp);
        let span = match tier.next() {
            Some(next) => next.floor() - tier.floor(),
            None => MYTHIC_LEVEL_SPAN,
        };
        let into_tier = xp - tier.floor();
        let step = span / 10;
        let level_in_tier = if step == 0 {
            10
        } else {
            (into_tier / step).min(9) as u8 + 1
        };
        XpLevel { tier, level_in_tier }
    }

    /// Mining-rate XP-level factor, piecewise-linear across the tier's band
    /// (spec §4.2 item 6).
    pub fn mining_factor(self) -> f64 {
        let (lo, hi) = self.tier.factor_band();
        lerp_level(lo, hi, self.level_in_tier)
    }

    /// Daily FIN cap multiplier for this level (spec §4.2 "Daily cap").
    pub fn daily_cap_factor(self) -> f64 {
        let (lo, hi) = self.tier.cap_band();
        lerp_level(lo, hi, self.level_in_tier)
    }

    /// Absolute global level (1-60), used only for display/ordering.
    pub fn absolute_level(self) -> u32 {
        let tier_index = match self.tier {
            XpTier::Bronze => 0,
            XpTier::Silver => 1,
            XpTier::Gold => 2,
            XpTier::Platinum => 3,
            XpTier::Diamond => 4,
            XpTier::Mythic => 5,
        };
        tier_index * 10 + self.level_in_tier as u32
    }
}

fn lerp_level(lo: f64, hi: f64, level_in_tier: u8) -> f64 {
    let t = (level_in_tier.saturating_sub(1)) as f64 / 9.0;
    lo + (hi - lo) * t
}

/// RP tier (spec §4.4 "Tiers").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RpTier {
    Explorer,
    Connector,
    Influencer,
    Leader,
    Ambassador,
}

impl RpTier {
    pub const fn floor(self) -> u64 {
        match self {
            RpTier::Explorer => 0,
            RpTier::Connector => 1_000,
            RpTier::Influencer => 5_000,
            RpTier::Leader => 15_000,
            RpTier::Ambassador => 50_000,
        }
    }

    /// Mining-rate RP-tier factor (spec §4.2 item 7).
    pub const fn mining_factor(self) -> f64 {
        match self {
            RpTier::Explorer => 1.0,
            RpTier::Connector => 1.2,
            RpTier::Influencer => 1.5,
            RpTier::Leader => 2.0,
            RpTier::Ambassador => 3.0,
        }
    }

    pub fn from_rp(rp: u64) -> RpTier {
        const TIERS: [RpTier; 5] = [
            RpTier::Ambassador,
            RpTier::Leader,
            RpTier::Influencer,
            RpTier::Connector,
            RpTier::Explorer,
        ];
        TIERS.into_iter().find(|t| rp >= t.floor()).unwrap_or(RpTier::Explorer)
    }
}

/// Staking tier, keyed by staked FIN amount thresholds (spec §4.2 item 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StakingTier {
    None,
    Silver,
    Gold,
    Platinum,
    Diamond,
    WhaleGuarded,
}

impl StakingTier {
    pub fn from_staked_whole(staked_whole: u64) -> StakingTier {
        if staked_whole >= 10_000 {
            StakingTier::WhaleGuarded
        } else if staked_whole >= 5_000 {
            StakingTier::Diamond
        } else if staked_whole >= 1_000 {
            StakingTier::Platinum
        } else if staked_whole >= 500 {
            StakingTier::Gold
        } else if staked_whole >= 100 {
            StakingTier::Silver
        } else {
            StakingTier::None
        }
    }

    pub const fn mining_factor(self) -> f64 {
        match self {
            StakingTier::None => 1.0,
            StakingTier::Silver => 1.2,
            StakingTier::Gold => 1.35,
            StakingTier::Platinum => 1.5,
            StakingTier::Diamond => 1.75,
            StakingTier::WhaleGuarded => 2.0,
        }
    }
}
