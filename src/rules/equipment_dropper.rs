//! Drops a killed player's equipment.

use tracing::debug;

use crate::context::MatchContext;
use crate::phase::Capability;
use crate::roster::{PlayerId, Weapon, WeaponSlot};

use super::RuleModule;

/// On a kill, moves the victim's droppable weapons into the world.
///
/// Default equipment and melee weapons stay behind. Weapons are dropped
/// last-picked-up first; the victim's weapon inventory is cleared after.
#[derive(Debug, Default)]
pub struct EquipmentDropper;

impl RuleModule for EquipmentDropper {
    fn name(&self) -> &'static str {
        "equipment_dropper"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::PlayerKilled]
    }

    fn on_player_killed(
        &mut self,
        ctx: &MatchContext,
        victim: PlayerId,
        _attacker: Option<PlayerId>,
    ) {
        let defaults = ctx.default_equipment();
        let drops = {
            let mut roster = ctx.roster();
            let Some(player) = roster.get_mut(victim) else {
                return;
            };
            let drops: Vec<Weapon> = player
                .inventory
                .weapons()
                .iter()
                .rev()
                .filter(|w| w.slot != WeaponSlot::Melee && !defaults.contains(&w.kind))
                .cloned()
                .collect();
            player.inventory.clear();
            drops
        };

        if !drops.is_empty() {
            debug!(player = %victim, count = drops.len(), "equipment dropped");
            ctx.dropped().extend(drops);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::observability::events::EventEmitter;
    use crate::spawn::AnySpawnAssigner;

    fn ctx() -> MatchContext {
        MatchContext::new(
            Box::new(AnySpawnAssigner),
            vec!["glock".to_string()],
            0,
            Arc::new(EventEmitter::noop()),
        )
    }

    #[test]
    fn test_drops_non_default_last_first() {
        let ctx = ctx();
        let victim = ctx.roster().join("v", None);
        {
            let mut roster = ctx.roster();
            let inv = &mut roster.get_mut(victim).unwrap().inventory;
            inv.set_cash(2000);
            inv.give_weapon(Weapon::new("knife", WeaponSlot::Melee));
            inv.give_weapon(Weapon::new("glock", WeaponSlot::Secondary));
            inv.give_weapon(Weapon::new("ak47", WeaponSlot::Primary));
            inv.give_weapon(Weapon::new("flashbang", WeaponSlot::Utility));
        }

        EquipmentDropper.on_player_killed(&ctx, victim, None);

        let kinds: Vec<_> = ctx.dropped().iter().map(|w| w.kind.clone()).collect();
        assert_eq!(kinds, vec!["flashbang", "ak47"]);
        let roster = ctx.roster();
        let inv = &roster.get(victim).unwrap().inventory;
        assert!(inv.weapons().is_empty());
        assert_eq!(inv.cash(), 2000);
    }

    #[test]
    fn test_unknown_victim_is_ignored() {
        let ctx = ctx();
        EquipmentDropper.on_player_killed(&ctx, PlayerId(9), None);
        assert!(ctx.dropped().is_empty());
    }
}
