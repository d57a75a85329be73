pub mod cards;
pub mod ledger;
pub mod mining;
pub mod multiplier;
pub mod risk;
pub mod rp;
pub mod session;
pub mod xp;

use std::sync::Arc;

use async_stream::stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio_stream::Stream;

use crate::config::EngineConfig;
use crate::errors::{EngineResult, ErrorKind};
use crate::model::activity::ActivityEvent;
use crate::model::amount::Fin;
use crate::model::command::Command;
use crate::model::journal::JournalEntry;
use crate::model::session::MiningSession;
use crate::model::user::{User, UserId};
use crate::signals::{NetworkSizeProvider, SettlementAuthority};

use ledger::{ExternalSignals, Ledger};
use risk::RiskSignals;

/// A read-only view of a user's current accrual state, returned by the
/// `snapshot` query (spec §6 "Queries (outbound)").
#[derive(Debug, Clone)]
pub struct UserSnapshot {
    pub user: User,
    pub session: Option<MiningSession>,
    pub mining_rate: mining::RateBreakdown,
}

/// The live orchestrator: wraps the synchronous [`Ledger`] with the async
/// collaborators it needs (network-size aggregator, settlement authority)
/// and serializes writes under a single lock (spec §5 "Concurrency model").
///
/// A real deployment would shard this lock per user region; a single
/// `tokio::sync::Mutex` is the simplest implementation that still satisfies
/// the ownership rule "at most one in-flight mutation per user at a time" —
/// see DESIGN.md for the sharding tradeoff.
pub struct Engine {
    ledger: Arc<Mutex<Ledger>>,
    network: Arc<dyn NetworkSizeProvider>,
    settlement: Arc<dyn SettlementAuthority>,
}

impl Engine {
    pub fn new(cfg: EngineConfig, network: Arc<dyn NetworkSizeProvider>, settlement: Arc<dyn SettlementAuthority>) -> Self {
        Engine { ledger: Arc::new(Mutex::new(Ledger::new(cfg))), network, settlement }
    }

    async fn signals(&self, now: u64) -> ExternalSignals {
        let (total_users, _observed_at) = self.network.total_users().await;
        ExternalSignals { now, total_users }
    }

    /// Apply one inbound command (spec §6 "Commands (inbound)"). Each
    /// variant maps onto one Ledger operation; settlement submission to the
    /// external authority happens outside the lock once the claim transition
    /// has been recorded.
    pub async fn apply(&self, command: Command, now: u64) -> EngineResult<()> {
        match command {
            Command::CreateUser { user_id, referral_code, initial_kyc_status } => {
                let mut ledger = self.ledger.lock().await;
                ledger.create_user(user_id, referral_code, initial_kyc_status, now)
            }
            Command::UpdateKyc { user_id, new_status, level, idempotency_key } => {
                let mut ledger = self.ledger.lock().await;
                ledger.update_kyc(user_id, new_status, level, idempotency_key, now)
            }
            Command::RegisterReferral { referrer_id, referee_id } => {
                let mut ledger = self.ledger.lock().await;
                ledger.register_referral(referrer_id, referee_id, now)
            }
            Command::SubmitActivity { user_id, kind, platform, content_fingerprint, quality_score, views, ts, idempotency_key } => {
                let event = ActivityEvent { user_id, kind, platform, content_fingerprint, quality_score, views, ts, idempotency_key };
                let mut ledger = self.ledger.lock().await;
                ledger.submit_activity(event).map(|_| ())
            }
            Command::OpenSession { user_id, idempotency_key, ts } => {
                let signals = self.signals(ts).await;
                let mut ledger = self.ledger.lock().await;
                ledger.open_session(user_id, idempotency_key, signals).map(|_| ())
            }
            Command::CloseSession { user_id, session_id, ts } => {
                let signals = self.signals(ts).await;
                let mut ledger = self.ledger.lock().await;
                ledger.close_session(user_id, session_id, signals).map(|_| ())
            }
            Command::RequestClaim { user_id, session_id, idempotency_key } => {
                let (amount, token, dest_user, fresh) = {
                    let mut ledger = self.ledger.lock().await;
                    let (session, token, fresh) = ledger.request_claim(user_id.clone(), session_id, idempotency_key)?;
                    (session.accrued, token, user_id, fresh)
                };
                if !fresh {
                    // Idempotent replay: the authority already has this
                    // token from the first call.
                    return Ok(());
                }
                self.submit_settlement(&token, &dest_user, amount).await
            }
            Command::AcknowledgeSettlement { settlement_token, outcome } => {
                let mut ledger = self.ledger.lock().await;
                ledger.acknowledge_settlement(settlement_token, outcome, now)
            }
            Command::ActivateCard { user_id, card_id, ts } => {
                let mut ledger = self.ledger.lock().await;
                ledger.activate_card(user_id, card_id, ts).map(|_| ())
            }
            Command::StakeChange { user_id, new_staked_whole } => {
                let mut ledger = self.ledger.lock().await;
                ledger.stake_change(user_id, new_staked_whole, now)
            }
            Command::UpdateRisk { user_id, human_probability, velocity_anomaly, duplication_ratio, fingerprint_consistency, ts } => {
                let signals = RiskSignals { human_probability, velocity_anomaly, duplication_ratio, fingerprint_consistency };
                let mut ledger = self.ledger.lock().await;
                ledger.update_risk(user_id, signals, ts).map(|_| ())
            }
        }
    }

    /// Hand an approved claim off to the settlement authority outside the
    /// ledger lock; the authority's eventual outcome returns asynchronously
    /// through `AcknowledgeSettlement` (spec §4.7, §6).
    async fn submit_settlement(&self, token: &str, user_id: &UserId, amount: Fin) -> EngineResult<()> {
        self.settlement
            .submit(token, user_id, amount)
            .await
            .map_err(|_| ErrorKind::RateUnavailable)
    }

    pub async fn snapshot(&self, user_id: &UserId, now: u64) -> EngineResult<UserSnapshot> {
        let signals = self.signals(now).await;
        let ledger = self.ledger.lock().await;
        let user = ledger.user(user_id)?.clone();
        let session = ledger.session(user_id).cloned();
        let mining_rate = ledger.mining_rate(user_id, signals)?;
        Ok(UserSnapshot { user, session, mining_rate })
    }

    pub async fn journal_since(&self, since_seq: u64, user_id: Option<&UserId>) -> Vec<JournalEntry> {
        let ledger = self.ledger.lock().await;
        ledger.journal_since(since_seq, user_id)
    }

    /// Replays everything since `since_seq`, then streams new entries as
    /// they're appended — a pure replication feed for clients (spec §9:
    /// "streaming to clients is a pure replication concern, not a core
    /// responsibility"), not a way to drive accrual logic.
    pub async fn journal_stream(&self, since_seq: u64, user_id: Option<UserId>) -> impl Stream<Item = JournalEntry> {
        // Grab the replay buffer and subscribe under the same lock acquisition
        // so nothing appended in between is replayed twice or dropped.
        let (backlog, mut rx) = {
            let ledger = self.ledger.lock().await;
            let backlog = ledger.journal_since(since_seq, user_id.as_ref());
            (backlog, ledger.subscribe_journal())
        };

        stream! {
            for entry in backlog {
                yield entry;
            }
            loop {
                match rx.recv().await {
                    Ok(entry) => {
                        if user_id.as_ref().is_none_or(|uid| *uid == entry.user_id) {
                            yield entry;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "journal stream subscriber lagged; some entries were dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    pub async fn recompute_rp(&self, user_id: &UserId, now: u64) -> EngineResult<u64> {
        let mut ledger = self.ledger.lock().await;
        ledger.compute_and_cache_rp(user_id, now).map(|v| v.total)
    }

    pub async fn sweep_expired_cards(&self, user_id: &UserId, now: u64) {
        let mut ledger = self.ledger.lock().await;
        ledger.sweep_expired_cards(user_id, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::activity::{ActivityKind, Platform};
    use crate::model::user::KycStatus;
    use crate::signals::network::InMemoryNetworkSize;
    use crate::signals::settlement::InMemorySettlementAuthority;

    fn make_engine(total_users: u64) -> Engine {
        Engine::new(
            EngineConfig::default(),
            Arc::new(InMemoryNetworkSize::new(total_users, 0)),
            Arc::new(InMemorySettlementAuthority::new()),
        )
    }

    #[tokio::test]
    async fn end_to_end_mining_session_settles() {
        let engine = make_engine(10_000);
        engine
            .apply(Command::CreateUser { user_id: "u1".into(), referral_code: None, initial_kyc_status: KycStatus::Verified }, 0)
            .await
            .unwrap();
        engine
            .apply(Command::OpenSession { user_id: "u1".into(), idempotency_key: "open1".into(), ts: 0 }, 0)
            .await
            .unwrap();

        let session_id = engine.snapshot(&"u1".to_string(), 3_600).await.unwrap().session.unwrap().session_id;
        engine
            .apply(Command::CloseSession { user_id: "u1".into(), session_id: session_id.clone(), ts: 3_600 }, 3_600)
            .await
            .unwrap();
        engine
            .apply(Command::RequestClaim { user_id: "u1".into(), session_id, idempotency_key: "claim1".into() }, 3_600)
            .await
            .unwrap();

        let snap = engine.snapshot(&"u1".to_string(), 3_600).await.unwrap();
        assert_eq!(snap.session.unwrap().state, crate::model::session::SessionState::Settling);
    }

    #[tokio::test]
    async fn submit_activity_awards_xp() {
        let engine = make_engine(10_000);
        engine
            .apply(Command::CreateUser { user_id: "u1".into(), referral_code: None, initial_kyc_status: KycStatus::Unverified }, 0)
            .await
            .unwrap();
        engine
            .apply(
                Command::SubmitActivity {
                    user_id: "u1".into(),
                    kind: ActivityKind::Post,
                    platform: Platform::TikTok,
                    content_fingerprint: "fp1".into(),
                    quality_score: 1.0,
                    views: None,
                    ts: 10,
                    idempotency_key: "a1".into(),
                },
                10,
            )
            .await
            .unwrap();

        let snap = engine.snapshot(&"u1".to_string(), 10).await.unwrap();
        assert!(snap.user.cumulative_xp > 0);
    }
}
