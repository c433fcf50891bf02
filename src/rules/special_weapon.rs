//! Special weapon allocation.

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use tracing::{debug, info};

use crate::config::schema::SpecialWeaponConfig;
use crate::context::MatchContext;
use crate::error::RuleError;
use crate::phase::Capability;
use crate::roster::Weapon;

use super::RuleModule;

/// Hands the configured special weapon to one random member of a team
/// at the start of every round.
///
/// Any copy already held anywhere in the match is stripped first. The
/// granted copy is round-scoped, so the host destroys it between rounds.
#[derive(Debug)]
pub struct SpecialWeaponAllocator {
    config: SpecialWeaponConfig,
}

impl SpecialWeaponAllocator {
    #[must_use]
    pub const fn new(config: SpecialWeaponConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RuleModule for SpecialWeaponAllocator {
    fn name(&self) -> &'static str {
        "special_weapon"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::RoundStart]
    }

    async fn on_round_start(&mut self, ctx: &MatchContext) -> Result<(), RuleError> {
        let Some(kind) = self.config.weapon.as_deref() else {
            return Ok(());
        };

        let candidates = ctx.roster().ids_on_team(self.config.team);
        let Some(&chosen) = candidates.choose(&mut *ctx.rng()) else {
            debug!(team = %self.config.team, weapon = kind, "no candidates for special weapon");
            return Ok(());
        };

        let mut roster = ctx.roster();
        for player in roster.all_mut() {
            player.inventory.remove_weapon(kind);
        }
        if let Some(player) = roster.get_mut(chosen) {
            player.inventory.give_weapon(Weapon {
                kind: kind.to_string(),
                slot: self.config.slot,
                round_scoped: true,
            });
            info!(player = %player.id, weapon = kind, "special weapon granted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{PlayerId, Team, WeaponSlot};

    fn config(weapon: Option<&str>) -> SpecialWeaponConfig {
        SpecialWeaponConfig {
            weapon: weapon.map(str::to_string),
            team: Team::A,
            slot: WeaponSlot::Special,
        }
    }

    fn seat(ctx: &MatchContext, name: &str, team: Team) -> PlayerId {
        let id = ctx.roster().join(name, None);
        ctx.roster().get_mut(id).unwrap().team = team;
        id
    }

    fn holders(ctx: &MatchContext, kind: &str) -> Vec<PlayerId> {
        ctx.roster()
            .all()
            .filter(|p| p.inventory.has(kind))
            .map(|p| p.id)
            .collect()
    }

    #[tokio::test]
    async fn test_exactly_one_holder_on_team() {
        let ctx = MatchContext::detached();
        let a1 = seat(&ctx, "a1", Team::A);
        let a2 = seat(&ctx, "a2", Team::A);
        let b1 = seat(&ctx, "b1", Team::B);
        ctx.roster()
            .get_mut(b1)
            .unwrap()
            .inventory
            .give_weapon(Weapon::new("bomb", WeaponSlot::Special));

        let mut alloc = SpecialWeaponAllocator::new(config(Some("bomb")));
        for _ in 0..5 {
            alloc.on_round_start(&ctx).await.unwrap();
            let held = holders(&ctx, "bomb");
            assert_eq!(held.len(), 1);
            assert!(held[0] == a1 || held[0] == a2);
        }

        let roster = ctx.roster();
        let granted = roster
            .all()
            .flat_map(|p| p.inventory.weapons())
            .find(|w| w.kind == "bomb")
            .unwrap();
        assert!(granted.round_scoped);
    }

    #[tokio::test]
    async fn test_no_weapon_configured_is_noop() {
        let ctx = MatchContext::detached();
        seat(&ctx, "a1", Team::A);
        SpecialWeaponAllocator::new(config(None))
            .on_round_start(&ctx)
            .await
            .unwrap();
        assert!(ctx.roster().all().all(|p| p.inventory.weapons().is_empty()));
    }

    #[tokio::test]
    async fn test_empty_team_leaves_inventories_alone() {
        let ctx = MatchContext::detached();
        let b1 = seat(&ctx, "b1", Team::B);
        ctx.roster()
            .get_mut(b1)
            .unwrap()
            .inventory
            .give_weapon(Weapon::new("bomb", WeaponSlot::Special));

        SpecialWeaponAllocator::new(config(Some("bomb")))
            .on_round_start(&ctx)
            .await
            .unwrap();
        assert_eq!(holders(&ctx, "bomb"), vec![b1]);
    }

    #[tokio::test]
    async fn test_same_seed_same_choice() {
        async fn pick(seed: u64) -> Vec<PlayerId> {
            let ctx = MatchContext::new(
                Box::new(crate::spawn::AnySpawnAssigner),
                Vec::new(),
                seed,
                std::sync::Arc::new(crate::observability::events::EventEmitter::noop()),
            );
            for i in 0..6 {
                seat(&ctx, &format!("a{i}"), Team::A);
            }
            let mut alloc = SpecialWeaponAllocator::new(config(Some("bomb")));
            let mut picks = Vec::new();
            for _ in 0..4 {
                alloc.on_round_start(&ctx).await.unwrap();
                picks.extend(holders(&ctx, "bomb"));
            }
            picks
        }
        assert_eq!(pick(7).await, pick(7).await);
    }
}
