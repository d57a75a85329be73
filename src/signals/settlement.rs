use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::model::amount::Fin;
use crate::model::user::UserId;

/// The external token-authority collaborator the claim FSM binds a
/// settlement token to (spec §4.7 "Claimable -> Settling", §6 "Settlement
/// outcomes"). The engine only ever calls `submit`; the authority's
/// eventual outcome comes back in through the inbound
/// `acknowledge_settlement` command, never as this trait's return value —
/// settlement is asynchronous and at-most-once by idempotency token, not a
/// synchronous RPC round trip.
#[async_trait]
pub trait SettlementAuthority: Send + Sync {
    async fn submit(&self, settlement_token: &str, user_id: &UserId, amount: Fin) -> anyhow::Result<()>;
}

/// A test/demo double that records submissions in memory instead of
/// calling out to a real token authority.
#[derive(Default)]
pub struct InMemorySettlementAuthority {
    submissions: Mutex<Vec<(String, UserId, Fin)>>,
}

impl InMemorySettlementAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn submissions(&self) -> Vec<(String, UserId, Fin)> {
        self.submissions.lock().await.clone()
    }
}

#[async_trait]
impl SettlementAuthority for InMemorySettlementAuthority {
    async fn submit(&self, settlement_token: &str, user_id: &UserId, amount: Fin) -> anyhow::Result<()> {
        self.submissions
            .lock()
            .await
            .push((settlement_token.to_string(), user_id.clone(), amount));
        Ok(())
    }
}
