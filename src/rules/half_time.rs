//! Half-time team swap.

use chrono::Utc;
use tracing::info;

use crate::config::schema::HalfTimeSwapConfig;
use crate::context::MatchContext;
use crate::observability::events::Event;
use crate::phase::Capability;

use super::RuleModule;

/// Swaps every active player's team once the first half is over.
///
/// The first half is `max_rounds / 2` rounds. The swap is guarded by
/// equality with the round counter, so it fires exactly once per match.
/// Each moved player raises `TeamAssigned`, then a single `TeamSwap`
/// follows.
#[derive(Debug)]
pub struct HalfTimeSwap {
    config: HalfTimeSwapConfig,
    first_half: u32,
}

impl HalfTimeSwap {
    /// Creates the module for a match of `max_rounds` rounds.
    #[must_use]
    pub const fn new(config: HalfTimeSwapConfig, max_rounds: u32) -> Self {
        Self {
            config,
            first_half: max_rounds / 2,
        }
    }

    /// Rounds in the first half.
    #[must_use]
    pub const fn first_half_round_count(&self) -> u32 {
        self.first_half
    }
}

impl RuleModule for HalfTimeSwap {
    fn name(&self) -> &'static str {
        "half_time_swap"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::RoundStart, Capability::RoundEnd]
    }

    fn requires(&self) -> &'static [&'static str] {
        &["round_limit"]
    }

    fn pre_round_start(&mut self, ctx: &MatchContext) {
        if self.first_half.checked_sub(1) == Some(ctx.round()) {
            ctx.toast(&self.config.final_round_toast);
        }
    }

    fn post_round_end(&mut self, ctx: &MatchContext) {
        let round = ctx.round();
        if round != self.first_half {
            return;
        }

        let moves: Vec<_> = ctx
            .roster()
            .active()
            .map(|p| (p.id, p.team.opponent()))
            .collect();
        for (player, team) in &moves {
            ctx.assign_team(*player, *team);
        }
        ctx.request_team_swap();

        info!(round, players = moves.len(), "half time, teams swapped");
        ctx.emit(Event::TeamsSwapped {
            timestamp: Utc::now(),
            round,
            players: moves.len(),
        });
    }
}
