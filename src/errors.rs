use thiserror::Error;

/// The full error taxonomy of the command surface (spec §7 "Taxonomy").
///
/// Grouped here by the families spec §7 describes; the type itself stays
/// flat so callers can match exhaustively without caring which family a
/// variant belongs to, the way `api::error::ApiError` stays flat in the
/// teacher codebase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    // ── Validation — surfaced to caller, not retryable ──
    #[error("daily activity limit exceeded for this (user, kind, day)")]
    DailyLimit,
    #[error("duplicate content fingerprint within the 24h window")]
    Duplicate,
    #[error("referral edge would create a cycle within depth 3")]
    CycleDetected,
    #[error("a user cannot refer themselves")]
    SelfReferral,
    #[error("referee already has an inbound referral edge")]
    AlreadyReferred,
    #[error("referral code does not resolve to an existing user")]
    InvalidReferral,
    #[error("user id already exists")]
    AlreadyExists,
    #[error("an Active session already exists for this user")]
    AlreadyActive,
    #[error("no Active session exists for this user")]
    NotActive,
    #[error("no claimable accrual for this session")]
    NothingToClaim,
    #[error("card is incompatible with the user's current active effects")]
    Incompatible,
    #[error("active card cap reached for this user")]
    CapReached,
    #[error("staked amount exceeds available liquid balance")]
    InsufficientBalance,

    // ── Authorization / gating — surfaced, caller may resolve upstream ──
    #[error("claim or session action blocked by risk gate")]
    Blocked,
    #[error("activity held pending re-verification (risk level >= high)")]
    Held,

    // ── Concurrency — retried internally with bounded backoff, then surfaced ──
    #[error("idempotency key already consumed or command superseded")]
    Stale,
    #[error("conflicting concurrent mutation, invariant would be violated")]
    Conflict,

    // ── Transient — safe for the caller to retry ──
    #[error("rate computation temporarily unavailable")]
    RateUnavailable,
    #[error("retryable failure, no state was mutated")]
    Retryable,
    #[error("shard queue overloaded, try again later")]
    TooBusy,

    // ── Resolution / not-found ──
    #[error("user id does not resolve to a known user")]
    Unknown,

    // ── Fatal — engine halts writes, requires operator intervention ──
    #[error("journal is corrupted or out of sequence")]
    CorruptedJournal,
    #[error("an engine invariant was violated")]
    InvariantViolated,
}

impl ErrorKind {
    /// Whether the caller may safely retry the exact same command.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateUnavailable | ErrorKind::Retryable | ErrorKind::TooBusy
        )
    }

    /// Whether this error is fatal to the engine as a whole (not just the
    /// one command), requiring operator intervention (spec §7 "Fatal").
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::CorruptedJournal | ErrorKind::InvariantViolated)
    }
}

pub type EngineResult<T> = Result<T, ErrorKind>;
