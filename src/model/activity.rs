use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::user::UserId;

/// Activity kinds accepted by the XP pipeline (spec §3 "ActivityEvent").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Post,
    PhotoPost,
    VideoPost,
    Comment,
    Like,
    Share,
    Follow,
    Story,
    Live,
    Login,
    Quest,
}

/// Social platform identifier (spec §4.3 `platform_multiplier`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    TikTok,
    YouTube,
    Instagram,
    X,
    Facebook,
    Other,
}

/// An inbound activity event, immutable once accepted (spec §3 "ActivityEvent").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActivityEvent {
    pub user_id: UserId,
    pub kind: ActivityKind,
    pub platform: Platform,
    /// Stable content identity for idempotency and 24h-dup detection.
    pub content_fingerprint: String,
    /// Quality score supplied by the external content-analysis collaborator,
    /// clamped to [0.5, 2.0] on acceptance.
    pub quality_score: f64,
    /// View count, only meaningful for viral-bonus computation.
    pub views: Option<u64>,
    pub ts: u64,
    pub idempotency_key: String,
}

impl ActivityEvent {
    /// Quality score clamped into the documented [0.5, 2.0] band
    /// (spec §8 "Boundary behaviours").
    pub fn clamped_quality(&self) -> f64 {
        self.quality_score.clamp(0.5, 2.0)
    }
}
