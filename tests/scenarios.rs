//! End-to-end coverage of the literal scenarios and replay/idempotency
//! invariants, driven through the public `Engine` surface rather than the
//! internal pure functions already covered by unit tests.

use std::sync::Arc;

use reward_engine::config::EngineConfig;
use reward_engine::engine::Engine;
use reward_engine::model::command::Command;
use reward_engine::model::session::{SessionState, SettlementOutcome};
use reward_engine::model::user::KycStatus;
use reward_engine::signals::network::InMemoryNetworkSize;
use reward_engine::signals::settlement::InMemorySettlementAuthority;

fn make_engine(total_users: u64) -> Engine {
    Engine::new(
        EngineConfig::default(),
        Arc::new(InMemoryNetworkSize::new(total_users, 0)),
        Arc::new(InMemorySettlementAuthority::new()),
    )
}

async fn create_user(engine: &Engine, user_id: &str, kyc: KycStatus) {
    engine
        .apply(
            Command::CreateUser { user_id: user_id.into(), referral_code: None, initial_kyc_status: kyc },
            0,
        )
        .await
        .unwrap();
}

/// S1. Finizen base accrual: fresh user, total_users=10_000, 1h session.
#[tokio::test]
async fn s1_finizen_base_accrual() {
    let engine = make_engine(10_000);
    create_user(&engine, "u1", KycStatus::Verified).await;

    engine.apply(Command::OpenSession { user_id: "u1".into(), idempotency_key: "open".into(), ts: 0 }, 0).await.unwrap();
    let session_id = engine.snapshot(&"u1".to_string(), 0).await.unwrap().session.unwrap().session_id;
    engine
        .apply(Command::CloseSession { user_id: "u1".into(), session_id, ts: 3_600 }, 3_600)
        .await
        .unwrap();

    let snap = engine.snapshot(&"u1".to_string(), 3_600).await.unwrap();
    let accrued = snap.user.liquid_balance.to_f64() + snap.session.as_ref().map(|s| s.accrued.to_f64()).unwrap_or(0.0);
    // Accrual lives on the closed (Claimable) session until claimed, not yet
    // on liquid_balance.
    let session_accrued = snap.session.unwrap().accrued.to_f64();
    assert!((session_accrued - 0.2388).abs() < 1e-3, "got {session_accrued}, accrued_total_probe={accrued}");
}

/// S3. Critical risk blocks session open outright (spec §4.7 "Blocked if
/// risk is critical"); no accrual is possible for a critical-risk user.
#[tokio::test]
async fn s3_critical_risk_blocks_session_open() {
    let engine = make_engine(10_000);
    create_user(&engine, "u1", KycStatus::Verified).await;
    engine
        .apply(
            Command::UpdateRisk {
                user_id: "u1".into(),
                human_probability: 0.05,
                velocity_anomaly: 0.0,
                duplication_ratio: 0.0,
                fingerprint_consistency: 1.0,
                ts: 0,
            },
            0,
        )
        .await
        .unwrap();

    let snap = engine.snapshot(&"u1".to_string(), 0).await.unwrap();
    assert_eq!(snap.user.risk_level, reward_engine::model::user::RiskLevel::Critical);

    let err = engine.apply(Command::OpenSession { user_id: "u1".into(), idempotency_key: "open".into(), ts: 0 }, 0).await;
    assert_eq!(err.unwrap_err(), reward_engine::errors::ErrorKind::Blocked);
}

/// S4. Referral cycle reject: A->B exists; register(B, A) must fail without
/// mutating the graph.
#[tokio::test]
async fn s4_referral_cycle_rejected() {
    let engine = make_engine(10_000);
    create_user(&engine, "a", KycStatus::Verified).await;
    create_user(&engine, "b", KycStatus::Verified).await;

    engine.apply(Command::RegisterReferral { referrer_id: "a".into(), referee_id: "b".into() }, 0).await.unwrap();
    let err = engine
        .apply(Command::RegisterReferral { referrer_id: "b".into(), referee_id: "a".into() }, 0)
        .await
        .unwrap_err();
    assert_eq!(err, reward_engine::errors::ErrorKind::CycleDetected);
}

/// S5. Daily-limit duplicate: the 101st distinct `like` in a UTC day is
/// rejected with no XP awarded; the first 100 are accepted unchanged.
#[tokio::test]
async fn s5_daily_limit_rejects_101st_like() {
    let engine = make_engine(10_000);
    create_user(&engine, "u1", KycStatus::Unverified).await;

    for i in 0..100 {
        engine
            .apply(
                Command::SubmitActivity {
                    user_id: "u1".into(),
                    kind: reward_engine::model::activity::ActivityKind::Like,
                    platform: reward_engine::model::activity::Platform::TikTok,
                    content_fingerprint: format!("fp-{i}"),
                    quality_score: 1.0,
                    views: None,
                    ts: 10,
                    idempotency_key: format!("like-{i}"),
                },
                10,
            )
            .await
            .unwrap();
    }
    let xp_after_100 = engine.snapshot(&"u1".to_string(), 10).await.unwrap().user.cumulative_xp;
    assert!(xp_after_100 > 0);

    let err = engine
        .apply(
            Command::SubmitActivity {
                user_id: "u1".into(),
                kind: reward_engine::model::activity::ActivityKind::Like,
                platform: reward_engine::model::activity::Platform::TikTok,
                content_fingerprint: "fp-100".into(),
                quality_score: 1.0,
                views: None,
                ts: 10,
                idempotency_key: "like-100".into(),
            },
            10,
        )
        .await
        .unwrap_err();
    assert_eq!(err, reward_engine::errors::ErrorKind::DailyLimit);

    let xp_after_101st_attempt = engine.snapshot(&"u1".to_string(), 10).await.unwrap().user.cumulative_xp;
    assert_eq!(xp_after_100, xp_after_101st_attempt, "rejected activity must not award XP");
}

/// S6. Claim idempotency: repeating `request_claim` with the same key
/// returns the same token without re-emitting settlement, and acknowledging
/// it exactly once credits the liquid balance exactly once.
#[tokio::test]
async fn s6_claim_idempotency_end_to_end() {
    let settlement = Arc::new(InMemorySettlementAuthority::new());
    let engine = Engine::new(EngineConfig::default(), Arc::new(InMemoryNetworkSize::new(10_000, 0)), settlement.clone());
    create_user(&engine, "u1", KycStatus::Verified).await;
    engine.apply(Command::OpenSession { user_id: "u1".into(), idempotency_key: "open".into(), ts: 0 }, 0).await.unwrap();
    let session_id = engine.snapshot(&"u1".to_string(), 0).await.unwrap().session.unwrap().session_id;
    engine
        .apply(Command::CloseSession { user_id: "u1".into(), session_id: session_id.clone(), ts: 3_600 }, 3_600)
        .await
        .unwrap();

    engine
        .apply(Command::RequestClaim { user_id: "u1".into(), session_id: session_id.clone(), idempotency_key: "claim1".into() }, 3_600)
        .await
        .unwrap();
    // Replaying the same idempotency key must not raise and must not
    // double-transition the session.
    engine
        .apply(Command::RequestClaim { user_id: "u1".into(), session_id: session_id.clone(), idempotency_key: "claim1".into() }, 3_600)
        .await
        .unwrap();

    let snap = engine.snapshot(&"u1".to_string(), 3_600).await.unwrap();
    assert_eq!(snap.session.as_ref().unwrap().state, SessionState::Settling);
    assert_eq!(settlement.submissions().await.len(), 1, "replayed claim must not re-submit to the settlement authority");

    let journal_before = engine.journal_since(0, Some(&"u1".to_string())).await;
    let settled_count_before =
        journal_before.iter().filter(|e| e.kind == reward_engine::model::journal::JournalKind::SessionSettled).count();
    assert_eq!(settled_count_before, 0);

    engine
        .apply(Command::AcknowledgeSettlement { settlement_token: snap.session.as_ref().unwrap().settlement_token.clone().unwrap(), outcome: SettlementOutcome::Confirmed }, 3_600)
        .await
        .unwrap();
    engine
        .apply(Command::AcknowledgeSettlement { settlement_token: snap.session.as_ref().unwrap().settlement_token.clone().unwrap(), outcome: SettlementOutcome::Confirmed }, 3_600)
        .await
        .ok(); // second ack on an already-settled/removed token is allowed to error; it must not double-credit

    let final_snap = engine.snapshot(&"u1".to_string(), 3_600).await.unwrap();
    assert_eq!(final_snap.session.unwrap().state, SessionState::Settled);

    let journal_after = engine.journal_since(0, Some(&"u1".to_string())).await;
    let settled_count_after =
        journal_after.iter().filter(|e| e.kind == reward_engine::model::journal::JournalKind::SessionSettled).count();
    assert_eq!(settled_count_after, 1, "settlement must be credited exactly once");
}

/// spec §8 "submitting the same command with the same idempotency key N
/// times yields exactly one state change": a replayed `SubmitActivity` must
/// not double-award XP, re-advance the streak, or re-skew the quality EMA.
#[tokio::test]
async fn submit_activity_idempotency_key_replay_is_noop() {
    let engine = make_engine(10_000);
    create_user(&engine, "u1", KycStatus::Unverified).await;

    let cmd = Command::SubmitActivity {
        user_id: "u1".into(),
        kind: reward_engine::model::activity::ActivityKind::Post,
        platform: reward_engine::model::activity::Platform::TikTok,
        content_fingerprint: "fp-a".into(),
        quality_score: 1.5,
        views: None,
        ts: 10,
        idempotency_key: "dup-key".into(),
    };
    engine.apply(cmd.clone(), 10).await.unwrap();
    let xp_after_first = engine.snapshot(&"u1".to_string(), 10).await.unwrap().user.cumulative_xp;

    let err = engine.apply(cmd, 10).await.unwrap_err();
    assert_eq!(err, reward_engine::errors::ErrorKind::Stale);

    let xp_after_replay = engine.snapshot(&"u1".to_string(), 10).await.unwrap().user.cumulative_xp;
    assert_eq!(xp_after_first, xp_after_replay, "replayed idempotency key must not re-award XP");
}

/// spec §4.3 "consecutive active days": several activities submitted within
/// the same UTC day advance the streak by at most one, not once per activity.
#[tokio::test]
async fn streak_advances_once_per_calendar_day_not_per_activity() {
    let engine = make_engine(10_000);
    create_user(&engine, "u1", KycStatus::Unverified).await;

    for i in 0..5 {
        engine
            .apply(
                Command::SubmitActivity {
                    user_id: "u1".into(),
                    kind: reward_engine::model::activity::ActivityKind::Like,
                    platform: reward_engine::model::activity::Platform::TikTok,
                    content_fingerprint: format!("fp-day0-{i}"),
                    quality_score: 1.0,
                    views: None,
                    ts: 10 + i,
                    idempotency_key: format!("day0-{i}"),
                },
                10 + i,
            )
            .await
            .unwrap();
    }
    let streak_after_day0 = engine.snapshot(&"u1".to_string(), 10).await.unwrap().user.streak_days;
    assert_eq!(streak_after_day0, 0, "first activity only sets the last-activity day, no prior day to advance from");

    let next_day_ts = 86_400 + 10;
    engine
        .apply(
            Command::SubmitActivity {
                user_id: "u1".into(),
                kind: reward_engine::model::activity::ActivityKind::Like,
                platform: reward_engine::model::activity::Platform::TikTok,
                content_fingerprint: "fp-day1".into(),
                quality_score: 1.0,
                views: None,
                ts: next_day_ts,
                idempotency_key: "day1".into(),
            },
            next_day_ts,
        )
        .await
        .unwrap();
    let streak_after_day1 = engine.snapshot(&"u1".to_string(), next_day_ts).await.unwrap().user.streak_days;
    assert_eq!(streak_after_day1, 1, "exactly one distinct following day advances the streak by one");
}

/// spec §8 invariant: lifetime_mined and liquid_balance never decrease
/// across an accepted mining+claim+settle cycle.
#[tokio::test]
async fn lifetime_mined_is_non_decreasing_across_settlement() {
    let engine = make_engine(10_000);
    create_user(&engine, "u1", KycStatus::Verified).await;
    let before = engine.snapshot(&"u1".to_string(), 0).await.unwrap().user.lifetime_mined;

    engine.apply(Command::OpenSession { user_id: "u1".into(), idempotency_key: "open".into(), ts: 0 }, 0).await.unwrap();
    let session_id = engine.snapshot(&"u1".to_string(), 0).await.unwrap().session.unwrap().session_id;
    engine.apply(Command::CloseSession { user_id: "u1".into(), session_id: session_id.clone(), ts: 3_600 }, 3_600).await.unwrap();
    engine
        .apply(Command::RequestClaim { user_id: "u1".into(), session_id, idempotency_key: "claim1".into() }, 3_600)
        .await
        .unwrap();
    let token = engine.snapshot(&"u1".to_string(), 3_600).await.unwrap().session.unwrap().settlement_token.unwrap();
    engine.apply(Command::AcknowledgeSettlement { settlement_token: token, outcome: SettlementOutcome::Confirmed }, 3_600).await.unwrap();

    let after = engine.snapshot(&"u1".to_string(), 3_600).await.unwrap().user.lifetime_mined;
    assert!(after >= before);
    assert!(after.to_f64() > 0.0);
}

/// spec §8 round-trip invariant: replaying the durable journal from genesis
/// reproduces the same per-user rollup as reading it live.
#[tokio::test]
async fn journal_replay_is_reproducible_via_store() {
    use reward_engine::store::{SqliteStore, Store};

    let dir = tempdir();
    let db_path = dir.join("journal.db");
    let store = SqliteStore::open(&db_path).unwrap();

    let engine = make_engine(10_000);
    create_user(&engine, "u1", KycStatus::Unverified).await;
    engine
        .apply(
            Command::SubmitActivity {
                user_id: "u1".into(),
                kind: reward_engine::model::activity::ActivityKind::Post,
                platform: reward_engine::model::activity::Platform::TikTok,
                content_fingerprint: "fp-a".into(),
                quality_score: 1.5,
                views: None,
                ts: 10,
                idempotency_key: "a1".into(),
            },
            10,
        )
        .await
        .unwrap();

    let entries = engine.journal_since(0, None).await;
    for entry in &entries {
        store.append(entry).await.unwrap();
    }

    let reloaded = store.load_all().await.unwrap();
    assert_eq!(reloaded.len(), entries.len());
    assert_eq!(reloaded, entries);

    std::fs::remove_dir_all(dir).ok();
}

fn tempdir() -> std::path::PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("reward-engine-test-{}", std::process::id()));
    std::fs::create_dir_all(&p).unwrap();
    p
}
