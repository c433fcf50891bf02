//! Round limit.

use crate::config::schema::RoundLimitConfig;
use crate::context::MatchContext;
use crate::error::RuleError;
use crate::phase::Capability;

use super::{RuleModule, Verdict};

/// Ends the game once `max_rounds` rounds have been completed.
///
/// The verdict names the team with more round wins, or nobody on a tie.
#[derive(Debug)]
pub struct RoundLimit {
    config: RoundLimitConfig,
}

impl RoundLimit {
    #[must_use]
    pub const fn new(config: RoundLimitConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn max_rounds(&self) -> u32 {
        self.config.max_rounds
    }
}

impl RuleModule for RoundLimit {
    fn name(&self) -> &'static str {
        "round_limit"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::GameEndCondition]
    }

    fn should_game_end(&mut self, ctx: &MatchContext) -> Result<Verdict, RuleError> {
        if ctx.round() < self.config.max_rounds {
            return Ok(Verdict::CONTINUE);
        }
        Ok(Verdict::ended(ctx.scoring().leader()))
    }
}
