//! Round clock.

use tokio::time::Instant;
use tracing::debug;

use crate::config::schema::RoundTimeLimitConfig;
use crate::context::MatchContext;
use crate::error::RuleError;
use crate::phase::Capability;

use super::{RuleModule, Verdict};

/// Ends the round in favour of the configured team once the clock runs out.
///
/// The clock lives in the match context so other modules can pause it;
/// a disabled clock never ends the round.
#[derive(Debug)]
pub struct RoundTimeLimit {
    config: RoundTimeLimitConfig,
}

impl RoundTimeLimit {
    #[must_use]
    pub const fn new(config: RoundTimeLimitConfig) -> Self {
        Self { config }
    }
}

impl RuleModule for RoundTimeLimit {
    fn name(&self) -> &'static str {
        "round_time_limit"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::RoundStart, Capability::RoundEndCondition]
    }

    fn post_round_start(&mut self, ctx: &MatchContext) {
        ctx.clock().start(Instant::now());
    }

    fn should_round_end(&mut self, ctx: &MatchContext) -> Result<Verdict, RuleError> {
        let clock = ctx.clock();
        if !clock.enabled {
            return Ok(Verdict::CONTINUE);
        }
        let Some(started) = clock.started_at else {
            return Ok(Verdict::CONTINUE);
        };
        if started.elapsed() < self.config.duration {
            return Ok(Verdict::CONTINUE);
        }
        debug!(limit = ?self.config.duration, "round clock expired");
        Ok(Verdict::won_by(self.config.timeout_winner))
    }
}
