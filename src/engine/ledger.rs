//! The Ledger: the sole owner of all per-user authoritative state (spec §4.1,
//! §3 "Ownership summary"). Synchronous and deterministic — every external
//! signal (current time, network size) is resolved by the caller and handed
//! in as a plain value, so the Ledger itself never blocks and never reads a
//! clock. `engine::Engine` is the async wrapper that resolves those signals
//! and serializes access per spec §5.

use std::collections::HashMap;

use serde_json::json;
use tokio::sync::broadcast;

use crate::config::EngineConfig;
use crate::errors::ErrorKind;
use crate::model::activity::ActivityEvent;
use crate::model::amount::Fin;
use crate::model::journal::{JournalEntry, JournalKind};
use crate::model::session::{CardEffect, EffectKind, MiningSession, SessionState, SettlementOutcome};
use crate::model::tiers::{RpTier, StakingTier};
use crate::model::user::{day_index, KycStatus, RiskLevel, User, UserId};

use super::mining::{self, MiningInputs};
use super::multiplier;
use super::risk::{self, RiskSignals};
use super::rp::{self, RefereeContribution, RpGraph, RpValuation};
use super::session as fsm;
use super::xp::{self, ActivityState, XpInputs};

/// Everything the Ledger needs about the outside world to compose a mining
/// rate or accept an activity, resolved once per call by the caller
/// (spec §6 "External signals (consumed)").
#[derive(Debug, Clone, Copy)]
pub struct ExternalSignals {
    pub now: u64,
    pub total_users: u64,
}

/// The authoritative state store. Not `Clone`: there is exactly one per
/// running engine instance.
pub struct Ledger {
    cfg: EngineConfig,
    users: HashMap<UserId, User>,
    activity: HashMap<UserId, ActivityState>,
    rp_graph: RpGraph,
    sessions: HashMap<UserId, MiningSession>,
    cards: HashMap<UserId, Vec<CardEffect>>,
    settlement_tokens: HashMap<String, UserId>,
    seen_idempotency_keys: HashMap<String, u64>,
    journal: Vec<JournalEntry>,
    next_seq: u64,
    /// Live fan-out of newly appended entries for journal subscribers (spec
    /// §9 "streaming to clients is a pure replication concern" — the Ledger
    /// only publishes, it never blocks on a slow subscriber: a lagging
    /// receiver drops entries rather than stalling the ledger).
    journal_tx: broadcast::Sender<JournalEntry>,
}

impl Ledger {
    pub fn new(cfg: EngineConfig) -> Self {
        let (journal_tx, _) = broadcast::channel(1_024);
        Ledger {
            cfg,
            users: HashMap::new(),
            activity: HashMap::new(),
            rp_graph: RpGraph::new(),
            sessions: HashMap::new(),
            cards: HashMap::new(),
            settlement_tokens: HashMap::new(),
            seen_idempotency_keys: HashMap::new(),
            journal: Vec::new(),
            next_seq: 1,
            journal_tx,
        }
    }

    pub fn subscribe_journal(&self) -> broadcast::Receiver<JournalEntry> {
        self.journal_tx.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn user(&self, user_id: &UserId) -> Result<&User, ErrorKind> {
        self.users.get(user_id).ok_or(ErrorKind::Unknown)
    }

    pub fn active_cards(&self, user_id: &UserId) -> &[CardEffect] {
        self.cards.get(user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn session(&self, user_id: &UserId) -> Option<&MiningSession> {
        self.sessions.get(user_id)
    }

    pub fn journal_since(&self, since_seq: u64, user_id: Option<&UserId>) -> Vec<JournalEntry> {
        self.journal
            .iter()
            .filter(|e| e.seq > since_seq)
            .filter(|e| user_id.is_none_or(|u| &e.user_id == u))
            .cloned()
            .collect()
    }

    fn append(&mut self, user_id: &UserId, kind: JournalKind, ts: u64, payload: serde_json::Value) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = JournalEntry { seq, user_id: user_id.clone(), kind, ts, payload };
        self.journal.push(entry.clone());
        // No subscribers is the common case outside of live streaming; the
        // send error just means the channel is currently unwatched.
        let _ = self.journal_tx.send(entry);
        seq
    }

    /// Already-consumed idempotency keys short-circuit to `Stale` so replayed
    /// commands never double-apply (spec §6 "Idempotency").
    fn check_idempotency(&mut self, key: &str, seq_if_new: u64) -> Result<(), ErrorKind> {
        if self.seen_idempotency_keys.contains_key(key) {
            return Err(ErrorKind::Stale);
        }
        self.seen_idempotency_keys.insert(key.to_string(), seq_if_new);
        Ok(())
    }

    // ---- CreateUser / UpdateKyc / RegisterReferral ----------------------

    pub fn create_user(
        &mut self,
        user_id: UserId,
        referral_code: Option<UserId>,
        initial_kyc_status: KycStatus,
        now: u64,
    ) -> Result<(), ErrorKind> {
        if self.users.contains_key(&user_id) {
            return Err(ErrorKind::AlreadyExists);
        }
        let user = User::new(user_id.clone(), initial_kyc_status, now);
        self.users.insert(user_id.clone(), user);
        self.activity.insert(user_id.clone(), ActivityState::default());
        self.append(&user_id, JournalKind::KycUpdated, now, json!({ "status": initial_kyc_status }));

        if let Some(referrer_id) = referral_code {
            self.register_referral(referrer_id, user_id, now)?;
        }
        Ok(())
    }

    pub fn update_kyc(&mut self, user_id: UserId, new_status: KycStatus, level: u8, idempotency_key: String, now: u64) -> Result<(), ErrorKind> {
        let seq = self.next_seq;
        self.check_idempotency(&idempotency_key, seq)?;
        let user = self.users.get_mut(&user_id).ok_or(ErrorKind::Unknown)?;
        user.kyc_status = new_status;
        user.kyc_level = level;
        self.append(&user_id, JournalKind::KycUpdated, now, json!({ "status": new_status, "level": level }));
        Ok(())
    }

    pub fn register_referral(&mut self, referrer_id: UserId, referee_id: UserId, now: u64) -> Result<(), ErrorKind> {
        if !self.users.contains_key(&referrer_id) || !self.users.contains_key(&referee_id) {
            return Err(ErrorKind::InvalidReferral);
        }
        let edge = self.rp_graph.register(&referrer_id, &referee_id, now, self.cfg.rp_depth)?;
        self.append(
            &referee_id,
            JournalKind::ReferralRegistered,
            now,
            json!({ "referrer_id": referrer_id, "level": edge.level }),
        );
        Ok(())
    }

    // ---- SubmitActivity ---------------------------------------------------

    pub fn submit_activity(&mut self, event: ActivityEvent) -> Result<u64, ErrorKind> {
        let seq = self.next_seq;
        self.check_idempotency(&event.idempotency_key, seq)?;

        let user = self.users.get(&event.user_id).ok_or(ErrorKind::Unknown)?;
        if risk::claim_blocked(user.risk_level) {
            self.append(
                &event.user_id,
                JournalKind::ActivityHeld,
                event.ts,
                json!({ "kind": event.kind, "risk_level": user.risk_level }),
            );
            return Err(ErrorKind::Held);
        }

        let state = self.activity.entry(event.user_id.clone()).or_default();
        if state.is_duplicate(&event.content_fingerprint, event.ts) {
            return Err(ErrorKind::Duplicate);
        }
        let cfg_limit = self.cfg.activity_config(event.kind).daily_limit;
        if state.daily_count(event.kind, event.ts) >= cfg_limit {
            return Err(ErrorKind::DailyLimit);
        }

        let user = self.users.get(&event.user_id).unwrap();
        let active: Vec<&CardEffect> = self.active_cards(&event.user_id).iter().filter(|c| !c.is_expired(event.ts)).collect();
        let xp_boost_factor = multiplier::resolve_boost_factor(&active, EffectKind::XpBoost);
        let xp_inputs = XpInputs {
            kind: event.kind,
            platform: event.platform,
            quality_score: event.clamped_quality(),
            streak_days: user.streak_days,
            current_level: user.xp_level().absolute_level(),
            views: event.views,
            xp_boost_factor,
        };
        let gained = xp::compute_xp_gained(&xp_inputs, &self.cfg);

        let state = self.activity.get_mut(&event.user_id).unwrap();
        state.record_accepted(event.kind, &event.content_fingerprint, event.ts);

        // Streak days advance once per *calendar day*, not once per accepted
        // activity (spec §4.3: "consecutive active days"). A gap of more than
        // one day resets the streak unless a `streak_shield` card is active
        // and covers it, consuming one use (spec §4.8).
        let today = day_index(event.ts);
        let last_day = day_index(user.last_activity_ts);
        let gap_days = (today - last_day).max(0);
        let mut shielded = false;
        if gap_days > 1 {
            let shield_idx = self
                .cards
                .get(&event.user_id)
                .and_then(|cards| cards.iter().position(|c| c.effect_kind == EffectKind::StreakShield && !c.is_expired(event.ts)));
            if let Some(idx) = shield_idx {
                let effect = self.cards.get_mut(&event.user_id).unwrap().remove(idx);
                if let Some(updated) = super::cards::consume_use(effect) {
                    self.cards.get_mut(&event.user_id).unwrap().push(updated);
                }
                shielded = true;
            }
        }

        let user = self.users.get_mut(&event.user_id).unwrap();
        user.cumulative_xp += gained;
        if gap_days == 0 {
            // Same calendar day as the last activity: streak unchanged.
        } else if gap_days == 1 || shielded {
            user.streak_days += 1;
        } else {
            user.streak_days = 0;
        }
        user.last_activity_ts = event.ts;

        let window = self.cfg.quality_ema_window_days.max(1) as f64;
        let weight = 2.0 / (window + 1.0);
        user.quality_ema = user.quality_ema * (1.0 - weight) + event.clamped_quality() * weight;

        self.append(
            &event.user_id,
            JournalKind::XpAwarded,
            event.ts,
            json!({ "kind": event.kind, "xp_gained": gained, "cumulative_xp": user.cumulative_xp }),
        );
        Ok(gained)
    }

    // ---- Mining rate composition helper ------------------------------------

    /// Gathers the instantaneous composition inputs for a user, resolving the
    /// mining-boost card factor and quality factor (EMA, or an active
    /// `quality_override` card's fixed value per spec §4.5) from the same
    /// active-cards slice.
    fn mining_inputs(&self, user: &User, signals: ExternalSignals, active: &[&CardEffect]) -> MiningInputs {
        let card_factor = multiplier::compose_mining_card_factor(active, &self.cfg);
        let quality_factor = multiplier::resolve_quality_factor(active, user.quality_ema);
        MiningInputs {
            phase: crate::config::Phase::from_total_users(signals.total_users),
            total_users: signals.total_users,
            active_referral_count: self.rp_graph.direct_referees(&user.id).len() as u32,
            kyc_verified: user.kyc_status == KycStatus::Verified,
            risk_level: user.risk_level,
            lifetime_mined: user.lifetime_mined,
            xp_level: user.xp_level(),
            rp_tier: user.rp_tier(),
            staking_tier: user.staking_tier(),
            card_factor,
            quality_ema: quality_factor,
        }
    }

    /// Current composed mining-rate breakdown for a user, for the
    /// `mining_rate(user_id)` query (spec §6).
    pub fn mining_rate(&self, user_id: &UserId, signals: ExternalSignals) -> Result<mining::RateBreakdown, ErrorKind> {
        let user = self.user(user_id)?;
        let active: Vec<&CardEffect> = self.active_cards(user_id).iter().filter(|c| !c.is_expired(signals.now)).collect();
        let inputs = self.mining_inputs(user, signals, &active);
        Ok(mining::compose_rate(&inputs, &self.cfg))
    }

    // ---- Session / Claim FSM ----------------------------------------------

    pub fn open_session(&mut self, user_id: UserId, idempotency_key: String, signals: ExternalSignals) -> Result<MiningSession, ErrorKind> {
        let user = self.user(&user_id)?;
        if risk::session_open_blocked(user.risk_level) {
            return Err(ErrorKind::Blocked);
        }

        let active: Vec<&CardEffect> = self.active_cards(&user_id).iter().filter(|c| !c.is_expired(signals.now)).collect();
        let inputs = self.mining_inputs(user, signals, &active);
        let breakdown = mining::compose_rate(&inputs, &self.cfg);
        let rate = breakdown.hourly_rate * risk::damping(user.risk_level);

        let snapshot_ids: Vec<String> = self.active_cards(&user_id).iter().map(|c| c.effect_id.clone()).collect();
        let existing = self.sessions.get(&user_id);
        let session = fsm::open(existing, user_id.clone(), signals.now, rate, snapshot_ids, idempotency_key)?;
        self.sessions.insert(user_id.clone(), session.clone());
        self.append(&user_id, JournalKind::SessionOpened, signals.now, json!({ "session_id": session.session_id, "rate_snapshot_per_hour": rate }));
        Ok(session)
    }

    pub fn close_session(&mut self, user_id: UserId, session_id: String, signals: ExternalSignals) -> Result<MiningSession, ErrorKind> {
        let existing = self.sessions.get(&user_id).ok_or(ErrorKind::NotActive)?;
        if existing.session_id != session_id {
            return Err(ErrorKind::Unknown);
        }

        let user = self.user(&user_id)?.clone();
        let risk_damping = risk::damping(user.risk_level);
        let cards_at_open: Vec<CardEffect> = existing
            .active_card_ids_snapshot
            .iter()
            .filter_map(|id| self.active_cards(&user_id).iter().find(|c| &c.effect_id == id).cloned())
            .collect();
        let active_now: Vec<&CardEffect> = self.active_cards(&user_id).iter().filter(|c| !c.is_expired(signals.now)).collect();
        let base_inputs = self.mining_inputs(&user, signals, &active_now);

        let raw_accrued = mining::integrate_session(
            existing.opened_at,
            signals.now,
            &base_inputs,
            &self.cfg,
            &cards_at_open,
            risk_damping,
            |active, cfg| multiplier::compose_mining_card_factor(active, cfg),
        );

        let mut user = self.users.get_mut(&user_id).unwrap();
        user.roll_daily_cap_if_needed(signals.now);
        let cap = mining::daily_cap(user.xp_level());
        let room = cap.saturating_sub(user.daily_claimed);
        let accrued = raw_accrued.min(room);

        let existing = self.sessions.get(&user_id).unwrap();
        let closed = fsm::close(existing, signals.now, accrued)?;
        self.sessions.insert(user_id.clone(), closed.clone());

        user = self.users.get_mut(&user_id).unwrap();
        user.daily_claimed = user.daily_claimed.saturating_add(accrued);

        self.append(
            &user_id,
            JournalKind::SessionClosed,
            signals.now,
            json!({ "session_id": closed.session_id, "accrued": accrued.units(), "raw_accrued": raw_accrued.units() }),
        );
        Ok(closed)
    }

    /// Returns the claimed session, its settlement token, and whether this
    /// call actually produced a fresh claim (`false` on an idempotent
    /// replay) so the caller knows whether to submit to the settlement
    /// authority again (spec §8 "does not re-emit settlement").
    pub fn request_claim(&mut self, user_id: UserId, session_id: String, idempotency_key: String) -> Result<(MiningSession, String, bool), ErrorKind> {
        let user = self.user(&user_id)?;
        if risk::claim_blocked(user.risk_level) {
            return Err(ErrorKind::Blocked);
        }
        let existing = self.sessions.get(&user_id).ok_or(ErrorKind::NotActive)?;
        if existing.session_id != session_id {
            return Err(ErrorKind::Unknown);
        }

        let (next, token, fresh) = fsm::request_claim(existing, &idempotency_key)?;
        if fresh {
            let ts = existing.closed_at.unwrap_or(existing.opened_at);
            self.sessions.insert(user_id.clone(), next.clone());
            self.settlement_tokens.insert(token.clone(), user_id.clone());
            self.append(&user_id, JournalKind::SessionClaimed, ts, json!({ "session_id": session_id, "settlement_token": token, "accrued": next.accrued.units() }));
        }
        Ok((next, token, fresh))
    }

    pub fn acknowledge_settlement(&mut self, settlement_token: String, outcome: SettlementOutcome, now: u64) -> Result<(), ErrorKind> {
        let user_id = self.settlement_tokens.get(&settlement_token).cloned().ok_or(ErrorKind::Unknown)?;
        let existing = self.sessions.get(&user_id).ok_or(ErrorKind::InvariantViolated)?;
        if existing.settlement_token.as_deref() != Some(settlement_token.as_str()) {
            return Err(ErrorKind::Stale);
        }

        let accrued = existing.accrued;
        let next = fsm::acknowledge(existing, outcome, &self.cfg)?;
        self.sessions.insert(user_id.clone(), next.clone());

        match next.state {
            SessionState::Settled => {
                let user = self.users.get_mut(&user_id).unwrap();
                user.liquid_balance = user.liquid_balance.saturating_add(accrued);
                user.lifetime_mined = user.lifetime_mined.saturating_add(accrued);
                self.append(&user_id, JournalKind::SessionSettled, now, json!({ "settlement_token": settlement_token, "amount": accrued.units() }));
            }
            SessionState::Cancelled => {
                self.append(&user_id, JournalKind::SessionCancelled, now, json!({ "settlement_token": settlement_token }));
            }
            SessionState::Claimable => {
                self.settlement_tokens.remove(&settlement_token);
                self.append(&user_id, JournalKind::SettlementFailed, now, json!({ "settlement_token": settlement_token, "attempts": next.claim_attempts }));
            }
            _ => {}
        }
        Ok(())
    }

    // ---- Cards --------------------------------------------------------------

    pub fn activate_card(&mut self, user_id: UserId, card_id: String, now: u64) -> Result<CardEffect, ErrorKind> {
        self.user(&user_id)?;
        let active = self.cards.entry(user_id.clone()).or_default();
        let effect = super::cards::activate(&user_id, &card_id, now, active, &self.cfg)?;
        self.cards.get_mut(&user_id).unwrap().push(effect.clone());
        self.append(&user_id, JournalKind::CardActivated, now, json!({ "card_id": card_id, "effect_id": effect.effect_id }));
        Ok(effect)
    }

    /// Sweep and drop expired card effects for a user, journaling one
    /// `CardExpired` entry per effect (spec §4.8 "Expiration").
    pub fn sweep_expired_cards(&mut self, user_id: &UserId, now: u64) {
        let Some(active) = self.cards.remove(user_id) else { return };
        let (still_active, expired) = super::cards::sweep_expired(active, now);
        for effect in &expired {
            self.append(user_id, JournalKind::CardExpired, now, json!({ "effect_id": effect.effect_id }));
        }
        self.cards.insert(user_id.clone(), still_active);
    }

    // ---- Staking --------------------------------------------------------------

    pub fn stake_change(&mut self, user_id: UserId, new_staked_whole: u64, now: u64) -> Result<(), ErrorKind> {
        let user = self.users.get_mut(&user_id).ok_or(ErrorKind::Unknown)?;
        let new_staked = Fin::from_whole(new_staked_whole);
        if new_staked > user.staked_balance {
            let delta = new_staked.saturating_sub(user.staked_balance);
            if delta > user.liquid_balance {
                return Err(ErrorKind::InsufficientBalance);
            }
            user.liquid_balance = user.liquid_balance.saturating_sub(delta);
            user.staked_balance = new_staked;
        } else {
            let delta = user.staked_balance.saturating_sub(new_staked);
            user.staked_balance = new_staked;
            user.liquid_balance = user.liquid_balance.saturating_add(delta);
        }
        self.append(&user_id, JournalKind::StakeChanged, now, json!({ "new_staked_whole": new_staked_whole }));
        Ok(())
    }

    // ---- Risk gate --------------------------------------------------------------

    pub fn update_risk(&mut self, user_id: UserId, signals: RiskSignals, now: u64) -> Result<RiskLevel, ErrorKind> {
        let user = self.users.get_mut(&user_id).ok_or(ErrorKind::Unknown)?;
        let proposed = risk::classify(signals);
        let resolved = risk::resolve_transition(user.risk_level, user.critical_since_ts, proposed, now, &self.cfg);

        if resolved == RiskLevel::Critical && user.risk_level != RiskLevel::Critical {
            user.critical_since_ts = Some(now);
        } else if resolved != RiskLevel::Critical {
            user.critical_since_ts = None;
        }
        user.risk_level = resolved;
        user.human_probability = signals.human_probability;
        user.last_risk_assessment_ts = now;

        self.append(&user_id, JournalKind::RiskUpdated, now, json!({ "risk_level": resolved, "human_probability": signals.human_probability }));
        Ok(resolved)
    }

    // ---- RP valuation --------------------------------------------------------

    /// Compute and cache a user's total RP from their resolved referee tree
    /// (spec §4.4 "RP value computation (on demand, with caching)").
    pub fn compute_and_cache_rp(&mut self, user_id: &UserId, now: u64) -> Result<RpValuation, ErrorKind> {
        self.user(user_id)?;
        let referee_ids = self.rp_graph.direct_referees(user_id);
        let all_referees = self.collect_referee_tree(user_id);

        let contributions: Vec<RefereeContribution> = all_referees
            .iter()
            .filter_map(|(id, level)| {
                let u = self.users.get(id)?;
                Some(RefereeContribution {
                    level,
                    xp: u.cumulative_xp,
                    days_since_active: (now.saturating_sub(u.last_activity_ts)) as f64 / 86_400.0,
                    quality_ema: u.quality_ema,
                    active: now.saturating_sub(u.last_activity_ts) < 30 * 86_400,
                })
            })
            .collect();

        let avg_level = if referee_ids.is_empty() {
            0.0
        } else {
            referee_ids
                .iter()
                .filter_map(|id| self.users.get(id))
                .map(|u| u.xp_level().absolute_level() as f64)
                .sum::<f64>()
                / referee_ids.len() as f64
        };
        let retention_30d = if all_referees.is_empty() {
            1.0
        } else {
            contributions.iter().filter(|c| c.active).count() as f64 / contributions.len() as f64
        };

        let total_network_size = self.users.len() as u64;
        let active: Vec<&CardEffect> = self.active_cards(user_id).iter().filter(|c| !c.is_expired(now)).collect();
        let rp_boost_factor = multiplier::resolve_boost_factor(&active, EffectKind::RpBoost);
        let valuation = rp::compute_rp(&contributions, total_network_size, avg_level, retention_30d, rp_boost_factor);

        let user = self.users.get_mut(user_id).unwrap();
        user.cumulative_rp = valuation.total;
        let (tier, breach_since) = rp::resolve_rp_tier(user.highest_rp_tier, user.rp_tier_floor_breach_since, valuation.total, now);
        user.highest_rp_tier = tier;
        user.rp_tier_floor_breach_since = breach_since;
        self.append(user_id, JournalKind::RpRecomputed, now, json!({ "rp": valuation.total, "tier": tier }));
        Ok(valuation)
    }

    fn collect_referee_tree(&self, root: &UserId) -> Vec<(UserId, u8)> {
        let mut out = Vec::new();
        let mut frontier = vec![root.clone()];
        for _ in 0..self.cfg.rp_depth {
            let mut next = Vec::new();
            for id in &frontier {
                for referee in self.rp_graph.direct_referees(id) {
                    if let Some(level) = self.rp_graph.level_of(&referee) {
                        out.push((referee.clone(), level));
                    }
                    next.push(referee);
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        out
    }
}
