//! Session / Claim FSM transitions (spec §4.7). Pure state-transition
//! functions; the Ledger owns storage and idempotency-key bookkeeping.

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::errors::ErrorKind;
use crate::model::amount::Fin;
use crate::model::session::{MiningSession, SessionState, SettlementOutcome};

/// Idle -> Active (spec §4.7). Rejects `AlreadyActive` if the caller already
/// holds a non-terminal session; callers check risk-gate blocking separately
/// via `engine::risk::session_open_blocked` before calling this.
pub fn open(
    existing: Option<&MiningSession>,
    user_id: String,
    now: u64,
    rate_snapshot_per_hour: f64,
    active_card_ids_snapshot: Vec<String>,
    idempotency_key: String,
) -> Result<MiningSession, ErrorKind> {
    if let Some(session) = existing {
        if session.open_idempotency_key == idempotency_key {
            return Ok(session.clone());
        }
        if matches!(session.state, SessionState::Active) {
            return Err(ErrorKind::AlreadyActive);
        }
    }

    Ok(MiningSession::new(
        user_id,
        Uuid::new_v4().to_string(),
        now,
        rate_snapshot_per_hour,
        active_card_ids_snapshot,
        idempotency_key,
    ))
}

/// Active -> Claimable, either by explicit `close_session` or because the
/// session reached `session_max_duration_secs` (spec §4.7).
pub fn close(session: &MiningSession, now: u64, accrued: Fin) -> Result<MiningSession, ErrorKind> {
    if session.state != SessionState::Active {
        return Err(ErrorKind::NotActive);
    }
    let mut next = session.clone();
    next.state = SessionState::Claimable;
    next.closed_at = Some(now);
    next.accrued = accrued;
    Ok(next)
}

/// Force-close a session that has exceeded its max idle/duration, server
/// side, without a `close_session` call from the caller.
pub fn expire_if_overdue(session: &MiningSession, now: u64, accrued: Fin, cfg: &EngineConfig) -> Option<MiningSession> {
    if session.state == SessionState::Active && now.saturating_sub(session.opened_at) >= cfg.session_max_duration_secs {
        close(session, now, accrued).ok()
    } else {
        None
    }
}

/// Claimable -> Settling (spec §4.7 "request_claim"). Idempotent on
/// `claim_idempotency_key`; returns the existing settlement token if the
/// same key is replayed, with `fresh = false` so the caller knows not to
/// re-submit to the settlement authority (spec §8 "does not re-emit
/// settlement").
pub fn request_claim(session: &MiningSession, idempotency_key: &str) -> Result<(MiningSession, String, bool), ErrorKind> {
    if let Some(existing_key) = &session.claim_idempotency_key {
        if existing_key == idempotency_key {
            let token = session.settlement_token.clone().ok_or(ErrorKind::InvariantViolated)?;
            return Ok((session.clone(), token, false));
        }
    }

    match session.state {
        SessionState::Claimable if session.accrued > Fin::ZERO => {
            let token = Uuid::new_v4().to_string();
            let mut next = session.clone();
            next.state = SessionState::Settling;
            next.claim_idempotency_key = Some(idempotency_key.to_string());
            next.settlement_token = Some(token.clone());
            next.claim_attempts += 1;
            Ok((next, token, true))
        }
        SessionState::Claimable => Err(ErrorKind::NothingToClaim),
        _ => Err(ErrorKind::NotActive),
    }
}

/// Settling -> {Settled, Claimable, Cancelled} on the external authority's
/// outcome (spec §4.7). Retryable rejections return to `Claimable` up to
/// `claim_retry_budget` attempts, then become fatally `Cancelled` with the
/// reserved accrual discarded.
pub fn acknowledge(session: &MiningSession, outcome: SettlementOutcome, cfg: &EngineConfig) -> Result<MiningSession, ErrorKind> {
    if session.state != SessionState::Settling {
        return Err(ErrorKind::Stale);
    }

    let mut next = session.clone();
    match outcome {
        SettlementOutcome::Confirmed => {
            next.state = SessionState::Settled;
        }
        SettlementOutcome::RetryableRejection => {
            if session.claim_attempts >= cfg.claim_retry_budget {
                next.state = SessionState::Cancelled;
            } else {
                next.state = SessionState::Claimable;
                next.claim_idempotency_key = None;
                next.settlement_token = None;
            }
        }
        SettlementOutcome::FatalRejection => {
            next.state = SessionState::Cancelled;
        }
    }
    Ok(next)
}
