//! Team elimination condition.

use crate::context::MatchContext;
use crate::error::RuleError;
use crate::phase::Capability;
use crate::roster::Team;

use super::{RuleModule, Verdict};

/// Ends the round once every member of a team is dead.
///
/// Teams are checked `A` then `B`. An empty team is never eliminated, and
/// the team named by the context's elimination exemption is skipped.
#[derive(Debug, Default)]
pub struct TeamElimination;

impl RuleModule for TeamElimination {
    fn name(&self) -> &'static str {
        "team_elimination"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::RoundEndCondition]
    }

    fn should_round_end(&mut self, ctx: &MatchContext) -> Result<Verdict, RuleError> {
        let exempt = ctx.elimination_exempt();
        let roster = ctx.roster();
        for team in Team::PLAYING {
            if team == exempt {
                continue;
            }
            let mut members = roster.on_team(team).peekable();
            if members.peek().is_some() && members.all(|p| !p.alive) {
                return Ok(Verdict::won_by(team.opponent()));
            }
        }
        Ok(Verdict::CONTINUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::PlayerId;

    fn ctx_with(teams: &[(Team, bool)]) -> (MatchContext, Vec<PlayerId>) {
        let ctx = MatchContext::detached();
        let ids = teams
            .iter()
            .enumerate()
            .map(|(i, (team, alive))| {
                let id = ctx.roster().join(format!("p{i}"), None);
                let mut roster = ctx.roster();
                let p = roster.get_mut(id).unwrap();
                p.team = *team;
                p.alive = *alive;
                id
            })
            .collect();
        (ctx, ids)
    }

    fn poll(ctx: &MatchContext) -> Verdict {
        TeamElimination.should_round_end(ctx).unwrap()
    }

    #[test]
    fn test_wiped_team_loses() {
        let (ctx, _) = ctx_with(&[(Team::A, true), (Team::B, false), (Team::B, false)]);
        assert_eq!(poll(&ctx), Verdict::won_by(Team::A));
    }

    #[test]
    fn test_a_checked_before_b() {
        let (ctx, _) = ctx_with(&[(Team::A, false), (Team::B, false)]);
        assert_eq!(poll(&ctx), Verdict::won_by(Team::B));
    }

    #[test]
    fn test_empty_team_is_not_eliminated() {
        let (ctx, _) = ctx_with(&[(Team::A, true)]);
        assert_eq!(poll(&ctx), Verdict::CONTINUE);
    }

    #[test]
    fn test_exempt_team_is_skipped() {
        let (ctx, _) = ctx_with(&[(Team::A, false), (Team::B, true)]);
        ctx.set_elimination_exempt(Team::A);
        assert_eq!(poll(&ctx), Verdict::CONTINUE);
    }
}
