//! Card Effects: activation, expiry, stacking validation (spec §4.8).

use uuid::Uuid;

use crate::config::{card_catalogue, CardDef, EngineConfig};
use crate::errors::ErrorKind;
use crate::model::session::CardEffect;
use crate::model::user::UserId;

fn find_def(card_id: &str) -> Option<CardDef> {
    card_catalogue().into_iter().find(|c| c.card_id == card_id)
}

/// Activate a card for a user, validating catalogue membership, the active-
/// card cap, and same-card-type incompatibility for non-stackable cards
/// (spec §4.8 "Activation").
pub fn activate(
    user_id: &UserId,
    card_id: &str,
    now: u64,
    currently_active: &[CardEffect],
    cfg: &EngineConfig,
) -> Result<CardEffect, ErrorKind> {
    let def = find_def(card_id).ok_or(ErrorKind::Unknown)?;

    if currently_active.len() as u32 >= cfg.max_active_cards {
        return Err(ErrorKind::CapReached);
    }

    if !def.stackable && currently_active.iter().any(|c| c.card_type == def.card_type) {
        return Err(ErrorKind::Incompatible);
    }

    Ok(CardEffect {
        effect_id: Uuid::new_v4().to_string(),
        user_id: user_id.clone(),
        card_type: def.card_type,
        effect_kind: def.effect_kind,
        multiplier: def.multiplier,
        synergy_group: def.synergy_group,
        stackable: def.stackable,
        activated_at: now,
        expires_at: def.duration_secs.map(|d| now + d),
        uses_left: def.uses,
    })
}

/// Partition a user's active-card list into still-active and newly-expired
/// (spec §4.8 "Expiration: lazy on read, or eager by a sweeper").
pub fn sweep_expired(active: Vec<CardEffect>, now: u64) -> (Vec<CardEffect>, Vec<CardEffect>) {
    active.into_iter().partition(|c| !c.is_expired(now))
}

/// Consume one use of a use-limited effect (e.g. `streak_shield`),
/// returning the updated effect or `None` if it is now exhausted and should
/// be dropped.
pub fn consume_use(mut effect: CardEffect) -> Option<CardEffect> {
    match effect.uses_left {
        Some(0) => None,
        Some(n) => {
            effect.uses_left = Some(n - 1);
            Some(effect)
        }
        None => Some(effect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_card_id_rejected() {
        let cfg = EngineConfig::default();
        let err = activate(&"u1".to_string(), "not_a_card", 0, &[], &cfg).unwrap_err();
        assert_eq!(err, ErrorKind::Unknown);
    }

    #[test]
    fn cap_reached_rejects_activation() {
        let cfg = EngineConfig::default();
        let active: Vec<CardEffect> = (0..cfg.max_active_cards)
            .map(|i| activate(&"u1".to_string(), "double_mining", 0, &[], &EngineConfig { max_active_cards: u32::MAX, ..EngineConfig::default() }).map(|mut c| { c.effect_id = i.to_string(); c }).unwrap())
            .collect();
        let err = activate(&"u1".to_string(), "double_mining", 0, &active, &cfg).unwrap_err();
        assert_eq!(err, ErrorKind::CapReached);
    }

    #[test]
    fn non_stackable_duplicate_incompatible() {
        let cfg = EngineConfig::default();
        let first = activate(&"u1".to_string(), "quality_spotlight", 0, &[], &cfg).unwrap();
        let err = activate(&"u1".to_string(), "quality_spotlight", 0, &[first], &cfg).unwrap_err();
        assert_eq!(err, ErrorKind::Incompatible);
    }

    #[test]
    fn sweep_partitions_by_expiry() {
        let active = CardEffect {
            effect_id: "a".into(),
            user_id: "u".into(),
            card_type: "t".into(),
            effect_kind: crate::model::session::EffectKind::MiningBoost,
            multiplier: 2.0,
            synergy_group: crate::model::session::SynergyGroup::Core,
            stackable: true,
            activated_at: 0,
            expires_at: Some(100),
            uses_left: None,
        };
        let (still_active, expired) = sweep_expired(vec![active], 200);
        assert!(still_active.is_empty());
        assert_eq!(expired.len(), 1);
    }
}
