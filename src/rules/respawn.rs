//! Round respawns.

use crate::context::MatchContext;
use crate::phase::Capability;
use crate::roster::PlayerId;

use super::RuleModule;

/// Revives every team-assigned player at the start of a round and places
/// them at a spawn point from the installed spawn assigner.
///
/// Mid-round spawns reported by the host get a fresh spawn point too.
#[derive(Debug, Default)]
pub struct Respawner;

impl RuleModule for Respawner {
    fn name(&self) -> &'static str {
        "respawn"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::RoundStart, Capability::PlayerSpawn]
    }

    fn pre_round_start(&mut self, ctx: &MatchContext) {
        let mut roster = ctx.roster();
        for player in roster.all_mut().filter(|p| p.team.is_playing()) {
            player.alive = true;
            player.spawn = Some(ctx.spawn_point(player));
        }
    }

    fn post_player_spawn(&mut self, ctx: &MatchContext, player: PlayerId) {
        let mut roster = ctx.roster();
        if let Some(p) = roster.get_mut(player) {
            p.spawn = Some(ctx.spawn_point(p));
        }
    }
}
