//! RP Graph: referral edges (via petgraph) and RP valuation (spec §4.4).

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

use crate::errors::ErrorKind;
use crate::model::referral::ReferralEdge;
use crate::model::tiers::RpTier;
use crate::model::user::UserId;

/// Base RP points per direct referee before activity/time/quality decay
/// (spec §4.4 `base_points`, left abstract by the distillation — see
/// DESIGN.md for this value's grounding).
pub const RP_BASE_POINTS: f64 = 100.0;

/// Referral edge graph. Owns the petgraph structure and the materialised
/// [`ReferralEdge`] records (spec §3 "ReferralEdge" ownership: "the RP Graph
/// holds them as lookup structure; the users themselves don't mutate each
/// other").
#[derive(Default)]
pub struct RpGraph {
    graph: DiGraph<UserId, ()>,
    index_of: HashMap<UserId, NodeIndex>,
    edges: HashMap<UserId, ReferralEdge>, // keyed by referee_id: at most one inbound edge
}

impl RpGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node_index(&mut self, user_id: &UserId) -> NodeIndex {
        if let Some(&idx) = self.index_of.get(user_id) {
            idx
        } else {
            let idx = self.graph.add_node(user_id.clone());
            self.index_of.insert(user_id.clone(), idx);
            idx
        }
    }

    pub fn referrer_of(&self, referee: &UserId) -> Option<&UserId> {
        self.edges.get(referee).map(|e| &e.referrer_id)
    }

    pub fn level_of(&self, referee: &UserId) -> Option<u8> {
        self.edges.get(referee).map(|e| e.level)
    }

    pub fn direct_referees(&self, referrer: &UserId) -> Vec<UserId> {
        self.edges
            .values()
            .filter(|e| &e.referrer_id == referrer)
            .map(|e| e.referee_id.clone())
            .collect()
    }

    /// Register a new referral edge (spec §4.1/§4.4 `register_referral`).
    ///
    /// Level is materialised at creation by walking the referrer's own
    /// inbound edges up to depth `rp_depth - 1`; cycles are rejected by
    /// checking whether `referrer` already sits in `referee`'s downstream
    /// within `rp_depth` hops.
    pub fn register(
        &mut self,
        referrer: &UserId,
        referee: &UserId,
        now: u64,
        rp_depth: u8,
    ) -> Result<ReferralEdge, ErrorKind> {
        if referrer == referee {
            return Err(ErrorKind::SelfReferral);
        }
        if self.edges.contains_key(referee) {
            return Err(ErrorKind::AlreadyReferred);
        }
        if self.would_cycle(referrer, referee, rp_depth) {
            return Err(ErrorKind::CycleDetected);
        }

        let level = self.level_for_new_referrer(referrer, rp_depth);

        self.node_index(referrer);
        self.node_index(referee);
        let from = self.index_of[referrer];
        let to = self.index_of[referee];
        self.graph.add_edge(from, to, ());

        let edge = ReferralEdge {
            referrer_id: referrer.clone(),
            referee_id: referee.clone(),
            created_at: now,
            level,
        };
        self.edges.insert(referee.clone(), edge.clone());
        Ok(edge)
    }

    /// A referrer's own materialised level, plus one, clamped to `rp_depth`;
    /// a referrer with no inbound edge (root of their own tree) seeds level 1.
    fn level_for_new_referrer(&self, referrer: &UserId, rp_depth: u8) -> u8 {
        let referrer_level = self.edges.get(referrer).map(|e| e.level).unwrap_or(0);
        (referrer_level + 1).min(rp_depth)
    }

    /// Would adding `referrer -> referee` create a cycle within `rp_depth`
    /// hops? True iff `referrer` is reachable from `referee` by following
    /// outbound referral edges (referee's own referees) within depth.
    fn would_cycle(&self, referrer: &UserId, referee: &UserId, rp_depth: u8) -> bool {
        let Some(&referee_idx) = self.index_of.get(referee) else {
            return false;
        };
        let Some(&referrer_idx) = self.index_of.get(referrer) else {
            return false;
        };

        let mut frontier = vec![referee_idx];
        for _ in 0..rp_depth {
            let mut next = Vec::new();
            for idx in frontier {
                if idx == referrer_idx {
                    return true;
                }
                next.extend(self.graph.neighbors_directed(idx, Direction::Outgoing));
            }
            if next.is_empty() {
                return false;
            }
            frontier = next;
        }
        frontier.contains(&referrer_idx)
    }
}

/// A referee's contribution inputs to RP valuation, already resolved by the
/// caller from the Ledger (spec §4.4 "RP value computation").
#[derive(Debug, Clone, Copy)]
pub struct RefereeContribution {
    pub level: u8,
    pub xp: u64,
    pub days_since_active: f64,
    pub quality_ema: f64,
    pub active: bool,
}

/// Breakdown of an RP valuation (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RpValuation {
    pub rp_direct: f64,
    pub rp_network: f64,
    pub quality_bonus: f64,
    pub network_regression: f64,
    pub total: u64,
    pub tier: RpTier,
}

fn activity_factor(xp: u64) -> f64 {
    (xp as f64 / 1_000.0).min(10.0)
}

fn time_decay(days_since_active: f64) -> f64 {
    (-0.01 * days_since_active).exp()
}

fn referee_points(r: &RefereeContribution) -> f64 {
    RP_BASE_POINTS * activity_factor(r.xp) * time_decay(r.days_since_active) * r.quality_ema.clamp(0.5, 2.0)
}

/// Compute a user's total RP from their resolved referee contributions
/// (spec §4.4 "RP value computation (on demand, with caching)").
///
/// `avg_level` is the average XP level across all referees (for the quality
/// bonus), and `retention_30d` is the fraction of referees still active 30
/// days after signup — both supplied by the caller since they require
/// broader Ledger context than a referee-by-referee fold.
pub fn compute_rp(
    referees: &[RefereeContribution],
    total_network_size: u64,
    avg_level: f64,
    retention_30d: f64,
    rp_boost_factor: f64,
) -> RpValuation {
    let rp_direct: f64 = referees.iter().filter(|r| r.level == 1).map(referee_points).sum();
    let rp_level2: f64 = referees.iter().filter(|r| r.level == 2).map(referee_points).sum();
    let rp_level3: f64 = referees.iter().filter(|r| r.level == 3).map(referee_points).sum();
    let rp_network = 0.3 * rp_level2 + 0.1 * rp_level3;

    let active_ratio = if referees.is_empty() {
        1.0
    } else {
        referees.iter().filter(|r| r.active).count() as f64 / referees.len() as f64
    };
    let quality_bonus = if referees.is_empty() {
        1.0
    } else {
        active_ratio * (1.0 + avg_level / 100.0) * retention_30d
    };

    let network_regression = (-0.0001 * total_network_size as f64 * quality_bonus).exp();

    // An active `rp_boost` card (spec §4.5/§4.8) scales the referrer's own
    // direct + indirect take before the network-quality regression applies.
    let total = ((rp_direct + rp_network) * rp_boost_factor.max(0.0) * quality_bonus * network_regression)
        .floor()
        .max(0.0) as u64;

    RpValuation {
        rp_direct,
        rp_network,
        quality_bonus,
        network_regression,
        total,
        tier: RpTier::from_rp(total),
    }
}

/// Resolve a user's sticky RP tier given a freshly recomputed total RP
/// (spec §4.4 "Tiers": tier only advances; demotion requires RP to stay
/// below the sticky tier's floor for 30 continuous days). Returns the
/// `(new_tier, new_breach_since)` pair for the caller to store back onto the
/// user record.
pub fn resolve_rp_tier(
    current_tier: RpTier,
    breach_since: Option<u64>,
    new_total_rp: u64,
    now: u64,
) -> (RpTier, Option<u64>) {
    let natural = RpTier::from_rp(new_total_rp);
    if natural >= current_tier {
        return (natural, None);
    }

    if new_total_rp < current_tier.floor() {
        match breach_since {
            None => (current_tier, Some(now)),
            Some(since) if now.saturating_sub(since) >= 30 * 86_400 => (natural, None),
            Some(since) => (current_tier, Some(since)),
        }
    } else {
        (current_tier, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// spec §4.4 cycle guard: A->B exists, register_referral(B, A) must
    /// reject with CycleDetected and leave the graph unchanged (S4).
    #[test]
    fn s4_referral_cycle_rejected() {
        let mut graph = RpGraph::new();
        graph.register(&"a".to_string(), &"b".to_string(), 0, 3).unwrap();
        let err = graph.register(&"b".to_string(), &"a".to_string(), 0, 3).unwrap_err();
        assert_eq!(err, ErrorKind::CycleDetected);
        assert!(graph.referrer_of(&"a".to_string()).is_none());
    }

    #[test]
    fn self_referral_rejected() {
        let mut graph = RpGraph::new();
        let err = graph.register(&"a".to_string(), &"a".to_string(), 0, 3).unwrap_err();
        assert_eq!(err, ErrorKind::SelfReferral);
    }

    #[test]
    fn second_inbound_edge_rejected() {
        let mut graph = RpGraph::new();
        graph.register(&"a".to_string(), &"c".to_string(), 0, 3).unwrap();
        let err = graph.register(&"b".to_string(), &"c".to_string(), 0, 3).unwrap_err();
        assert_eq!(err, ErrorKind::AlreadyReferred);
    }

    #[test]
    fn levels_materialise_up_to_depth() {
        let mut graph = RpGraph::new();
        let e1 = graph.register(&"a".to_string(), &"b".to_string(), 0, 3).unwrap();
        let e2 = graph.register(&"b".to_string(), &"c".to_string(), 0, 3).unwrap();
        let e3 = graph.register(&"c".to_string(), &"d".to_string(), 0, 3).unwrap();
        let e4 = graph.register(&"d".to_string(), &"e".to_string(), 0, 3).unwrap();
        assert_eq!(e1.level, 1);
        assert_eq!(e2.level, 2);
        assert_eq!(e3.level, 3);
        assert_eq!(e4.level, 3); // capped at rp_depth
    }

    /// spec §8 invariant 9: RP is monotone non-increasing as days_since_active grows.
    #[test]
    fn rp_monotone_non_increasing_with_inactivity() {
        let fresh = RefereeContribution { level: 1, xp: 5_000, days_since_active: 0.0, quality_ema: 1.0, active: true };
        let stale = RefereeContribution { level: 1, xp: 5_000, days_since_active: 30.0, quality_ema: 1.0, active: false };
        let fresh_rp = compute_rp(&[fresh], 1_000, 1.0, 1.0, 1.0).total;
        let stale_rp = compute_rp(&[stale], 1_000, 1.0, 1.0, 1.0).total;
        assert!(stale_rp <= fresh_rp);
    }

    #[test]
    fn no_referees_defaults_quality_bonus_to_one() {
        let v = compute_rp(&[], 1_000, 0.0, 0.0, 1.0);
        assert_eq!(v.quality_bonus, 1.0);
    }

    #[test]
    fn rp_boost_card_scales_total() {
        let r = RefereeContribution { level: 1, xp: 5_000, days_since_active: 0.0, quality_ema: 1.0, active: true };
        let base = compute_rp(&[r.clone()], 1_000, 1.0, 1.0, 1.0).total;
        let boosted = compute_rp(&[r], 1_000, 1.0, 1.0, 1.5).total;
        assert!(boosted > base);
    }

    #[test]
    fn rp_tier_advances_immediately() {
        let (tier, breach) = resolve_rp_tier(RpTier::Explorer, None, 5_000, 0);
        assert_eq!(tier, RpTier::Influencer);
        assert_eq!(breach, None);
    }

    /// spec §4.4 "tier sticks unless RP drops below tier floor for 30 days".
    #[test]
    fn rp_tier_demotion_requires_30_day_hysteresis() {
        let (tier, breach) = resolve_rp_tier(RpTier::Influencer, None, 500, 0);
        assert_eq!(tier, RpTier::Influencer);
        assert_eq!(breach, Some(0));

        let (tier, breach) = resolve_rp_tier(RpTier::Influencer, Some(0), 500, 10 * 86_400);
        assert_eq!(tier, RpTier::Influencer);
        assert_eq!(breach, Some(0));

        let (tier, breach) = resolve_rp_tier(RpTier::Influencer, Some(0), 500, 30 * 86_400);
        assert_eq!(tier, RpTier::Explorer);
        assert_eq!(breach, None);
    }

    #[test]
    fn rp_tier_breach_clears_on_recovery() {
        let (tier, breach) = resolve_rp_tier(RpTier::Influencer, Some(0), 5_200, 10 * 86_400);
        assert_eq!(tier, RpTier::Influencer);
        assert_eq!(breach, None);
    }
}
