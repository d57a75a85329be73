use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::user::UserId;

/// A materialised referral edge (spec §3 "ReferralEdge", §4.4 "RP Graph").
///
/// Levels 1-3 are materialised once at creation by walking the referrer's
/// own inbound edges up to depth 2; RP propagation beyond depth 3 is zero
/// by design, so no level-4+ edges are ever created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReferralEdge {
    pub referrer_id: UserId,
    pub referee_id: UserId,
    pub created_at: u64,
    /// 1 = direct referral, 2-3 = network levels, materialised at creation.
    pub level: u8,
}
