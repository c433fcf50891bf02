//! Bomb defusal scenario.
//!
//! The attacking team wins by planting the bomb and letting it detonate;
//! the defending team wins by defusing it. The scenario owns the bomb
//! state and the loss-streak ledger, and settles the round economy in
//! `PreRoundEnd`.
//!
//! It relies on two sibling modules: the round time limit (paused once the
//! bomb is planted) and team elimination (the planting team stops counting
//! once the bomb is down).

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::schema::BombDefusalConfig;
use crate::context::MatchContext;
use crate::error::RuleError;
use crate::observability::events::Event;
use crate::observability::metrics;
use crate::phase::{BombView, Capability, MatchSnapshot};
use crate::roster::{PlayerId, Team};

use super::economy::{IncomeReason, LossStreakLedger, loss_bonus};
use super::{BombEvent, RuleModule, Verdict};

/// `Unplanted → Planted → {Detonated | Defused}`, reset every round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BombState {
    pub planted: bool,
    pub detonated: bool,
    pub defused: bool,
    pub defuser: Option<PlayerId>,
    pub defuse_started_at: Option<Instant>,
}

/// The bomb defusal scenario module.
#[derive(Debug)]
pub struct BombDefusal {
    config: BombDefusalConfig,
    ledger: LossStreakLedger,
    bomb: BombState,
}

impl BombDefusal {
    /// Creates the scenario with an empty ledger.
    #[must_use]
    pub const fn new(config: BombDefusalConfig) -> Self {
        let max = config.max_loss_streak_level;
        Self {
            config,
            ledger: LossStreakLedger::new(max),
            bomb: BombState {
                planted: false,
                detonated: false,
                defused: false,
                defuser: None,
                defuse_started_at: None,
            },
        }
    }

    /// Planting side.
    #[must_use]
    pub const fn attackers(&self) -> Team {
        self.config.attackers
    }

    /// Defending side.
    #[must_use]
    pub const fn defenders(&self) -> Team {
        self.config.attackers.opponent()
    }

    /// Current bomb state.
    #[must_use]
    pub const fn bomb(&self) -> &BombState {
        &self.bomb
    }

    /// Loss-streak ledger.
    #[must_use]
    pub const fn ledger(&self) -> &LossStreakLedger {
        &self.ledger
    }

    fn clear_ledger(&mut self) {
        self.ledger.clear();
        for team in Team::PLAYING {
            metrics::set_loss_streak_level(team, 0);
        }
    }

    /// Pays both teams for the decided round and advances the ledger.
    fn settle(&mut self, ctx: &MatchContext, winner: Team) {
        let loser = winner.opponent();
        let (income, reason) = if winner == self.attackers() && self.bomb.detonated {
            (self.config.bomb_detonated_income, IncomeReason::BombDetonated)
        } else if winner == self.defenders() && self.bomb.defused {
            (self.config.bomb_defused_income, IncomeReason::BombDefused)
        } else {
            (self.config.default_win_income, IncomeReason::RoundWin)
        };
        let bonus = loss_bonus(
            self.config.base_loss_income,
            self.config.loss_bonus_increment,
            self.ledger.level(loser),
        );

        ctx.give_team_income(winner, income, reason);
        ctx.give_team_income(loser, bonus, IncomeReason::LossBonus);

        self.ledger.settle(winner);
        for team in Team::PLAYING {
            metrics::set_loss_streak_level(team, self.ledger.level(team));
        }
        debug!(
            %winner,
            winner_level = self.ledger.level(winner),
            loser_level = self.ledger.level(loser),
            "loss streak updated"
        );
    }

    /// Requires `player` to be alive and on `side`.
    fn check_actor(ctx: &MatchContext, player: PlayerId, side: Team) -> Result<(), RuleError> {
        let roster = ctx.roster();
        let Some(p) = roster.get(player) else {
            return Err(RuleError::InvalidActor(format!("{player} is not seated")));
        };
        if p.team != side {
            return Err(RuleError::InvalidActor(format!(
                "{player} is on team {}, not {side}",
                p.team
            )));
        }
        if !p.alive {
            return Err(RuleError::InvalidActor(format!("{player} is dead")));
        }
        Ok(())
    }

    fn on_planted(&mut self, ctx: &MatchContext, planter: PlayerId) {
        self.bomb.planted = true;
        self.bomb.detonated = false;
        self.bomb.defused = false;

        let team = ctx
            .roster()
            .get(planter)
            .map_or(self.attackers(), |p| p.team);

        ctx.clock().enabled = false;
        ctx.set_elimination_exempt(team);

        ctx.show_status_text(team, "Defend");
        ctx.show_status_text(team.opponent(), "Defuse the Bomb");
        ctx.hide_timer();

        info!(%planter, %team, "bomb planted");
        ctx.emit(Event::BombPlanted {
            timestamp: Utc::now(),
            planter,
            team,
        });
    }

    fn resolved(ctx: &MatchContext, outcome: &str) {
        info!(outcome, "bomb resolved");
        ctx.emit(Event::BombResolved {
            timestamp: Utc::now(),
            outcome: outcome.to_string(),
        });
    }
}

impl RuleModule for BombDefusal {
    fn name(&self) -> &'static str {
        "bomb_defusal"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[
            Capability::GameStart,
            Capability::RoundStart,
            Capability::RoundEnd,
            Capability::TeamAssigned,
            Capability::TeamSwap,
            Capability::BombEvents,
            Capability::RoundEndCondition,
        ]
    }

    fn requires(&self) -> &'static [&'static str] {
        &["round_time_limit", "team_elimination"]
    }

    fn post_game_start(&mut self, _ctx: &MatchContext) {
        self.clear_ledger();
    }

    fn on_team_swap(&mut self, _ctx: &MatchContext) {
        self.clear_ledger();
    }

    fn on_team_assigned(&mut self, ctx: &MatchContext, player: PlayerId, _team: Team) {
        if let Some(p) = ctx.roster().get_mut(player) {
            p.inventory.clear();
            p.inventory.set_cash(self.config.start_money);
        }
    }

    fn pre_round_start(&mut self, _ctx: &MatchContext) {
        self.bomb = BombState::default();
    }

    fn post_round_start(&mut self, ctx: &MatchContext) {
        ctx.show_status_text(self.attackers(), "Plant the Bomb");
        ctx.show_status_text(self.defenders(), "Defend");
    }

    fn on_bomb_event(&mut self, ctx: &MatchContext, event: BombEvent) {
        match event {
            BombEvent::Planted { planter } => self.on_planted(ctx, planter),
            BombEvent::DefuseStarted { defuser } => {
                if !self.bomb.planted {
                    warn!(%defuser, "defuse started with no bomb planted");
                    return;
                }
                self.bomb.defuser = Some(defuser);
                self.bomb.defuse_started_at = Some(Instant::now());
            }
            BombEvent::Detonated => {
                self.bomb.detonated = true;
                Self::resolved(ctx, "detonated");
            }
            BombEvent::Defused { defuser } => {
                self.bomb.defused = true;
                self.bomb.defuser = Some(defuser);
                Self::resolved(ctx, "defused");
            }
        }
    }

    fn check_bomb_event(&self, ctx: &MatchContext, event: BombEvent) -> Result<(), RuleError> {
        let planted = self.bomb.planted && !self.bomb.detonated && !self.bomb.defused;
        match event {
            BombEvent::Planted { planter } => {
                if self.bomb.planted {
                    return Err(RuleError::InvalidActor("bomb already planted".to_string()));
                }
                Self::check_actor(ctx, planter, self.attackers())
            }
            BombEvent::DefuseStarted { defuser } | BombEvent::Defused { defuser } => {
                if !planted {
                    return Err(RuleError::InvalidActor("no live bomb to defuse".to_string()));
                }
                Self::check_actor(ctx, defuser, self.defenders())
            }
            BombEvent::Detonated if !planted => {
                Err(RuleError::InvalidActor("no live bomb to detonate".to_string()))
            }
            BombEvent::Detonated => Ok(()),
        }
    }

    fn should_round_end(&mut self, _ctx: &MatchContext) -> Result<Verdict, RuleError> {
        if !self.bomb.planted {
            return Ok(Verdict::CONTINUE);
        }
        if self.bomb.defused {
            return Ok(Verdict::won_by(self.defenders()));
        }
        if self.bomb.detonated {
            return Ok(Verdict::won_by(self.attackers()));
        }
        Ok(Verdict::CONTINUE)
    }

    fn pre_round_end(&mut self, ctx: &MatchContext) {
        let winner = ctx.scoring().round_winner();
        if winner.is_playing() {
            self.settle(ctx, winner);
        }

        self.bomb = BombState::default();
        ctx.clock().enabled = true;
        ctx.set_elimination_exempt(Team::Unassigned);
    }

    fn replicate(&self, snapshot: &mut MatchSnapshot) {
        snapshot.loss_streak = Team::PLAYING
            .iter()
            .map(|t| (*t, self.ledger.level(*t)))
            .collect();
        snapshot.bomb = Some(BombView {
            planted: self.bomb.planted,
            detonated: self.bomb.detonated,
            defused: self.bomb.defused,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seated() -> (MatchContext, PlayerId, PlayerId) {
        let ctx = MatchContext::detached();
        let a = ctx.roster().join("attacker", None);
        let b = ctx.roster().join("defender", None);
        ctx.roster().get_mut(a).unwrap().team = Team::A;
        ctx.roster().get_mut(b).unwrap().team = Team::B;
        (ctx, a, b)
    }

    fn cash(ctx: &MatchContext, id: PlayerId) -> u32 {
        ctx.roster().get(id).unwrap().inventory.cash()
    }

    #[test]
    fn test_not_planted_never_ends_round() {
        let (ctx, _, _) = seated();
        let mut bomb = BombDefusal::new(BombDefusalConfig::default());
        bomb.on_bomb_event(&ctx, BombEvent::Detonated);
        assert_eq!(bomb.should_round_end(&ctx).unwrap(), Verdict::CONTINUE);
    }

    #[test]
    fn test_detonation_wins_for_attackers() {
        let (ctx, a, _) = seated();
        let mut bomb = BombDefusal::new(BombDefusalConfig::default());
        bomb.on_bomb_event(&ctx, BombEvent::Planted { planter: a });
        assert_eq!(bomb.should_round_end(&ctx).unwrap(), Verdict::CONTINUE);
        bomb.on_bomb_event(&ctx, BombEvent::Detonated);
        assert_eq!(bomb.should_round_end(&ctx).unwrap(), Verdict::won_by(Team::A));
    }

    #[test]
    fn test_defuse_wins_for_defenders() {
        let (ctx, a, b) = seated();
        let mut bomb = BombDefusal::new(BombDefusalConfig::default());
        bomb.on_bomb_event(&ctx, BombEvent::Planted { planter: a });
        bomb.on_bomb_event(&ctx, BombEvent::DefuseStarted { defuser: b });
        assert_eq!(bomb.bomb().defuser, Some(b));
        bomb.on_bomb_event(&ctx, BombEvent::Defused { defuser: b });
        assert_eq!(bomb.should_round_end(&ctx).unwrap(), Verdict::won_by(Team::B));
    }

    #[test]
    fn test_plant_pauses_clock_and_exempts_attackers() {
        let (ctx, a, _) = seated();
        ctx.clock().start(Instant::now());
        let mut bomb = BombDefusal::new(BombDefusalConfig::default());
        bomb.on_bomb_event(&ctx, BombEvent::Planted { planter: a });
        assert!(!ctx.clock().enabled);
        assert!(!ctx.clock().visible);
        assert_eq!(ctx.elimination_exempt(), Team::A);
        assert_eq!(ctx.display().status[&Team::B], "Defuse the Bomb");

        ctx.scoring().record_round_winner(Team::A);
        bomb.pre_round_end(&ctx);
        assert!(ctx.clock().enabled);
        assert_eq!(ctx.elimination_exempt(), Team::Unassigned);
        assert!(!bomb.bomb().planted);
    }

    #[test]
    fn test_only_live_attackers_may_plant() {
        let (ctx, a, b) = seated();
        let bomb = BombDefusal::new(BombDefusalConfig::default());
        ctx.roster().get_mut(a).unwrap().alive = true;
        ctx.roster().get_mut(b).unwrap().alive = true;

        let err = bomb
            .check_bomb_event(&ctx, BombEvent::Planted { planter: b })
            .unwrap_err();
        assert!(err.to_string().contains("not a"), "{err}");
        assert!(bomb.check_bomb_event(&ctx, BombEvent::Planted { planter: a }).is_ok());

        ctx.roster().get_mut(a).unwrap().alive = false;
        let err = bomb
            .check_bomb_event(&ctx, BombEvent::Planted { planter: a })
            .unwrap_err();
        assert!(err.to_string().contains("dead"), "{err}");
    }

    #[test]
    fn test_defuse_needs_live_bomb_and_defender() {
        let (ctx, a, b) = seated();
        ctx.roster().get_mut(a).unwrap().alive = true;
        ctx.roster().get_mut(b).unwrap().alive = true;
        let mut bomb = BombDefusal::new(BombDefusalConfig::default());

        let defuse = BombEvent::Defused { defuser: b };
        assert!(bomb.check_bomb_event(&ctx, defuse).is_err());
        assert!(bomb.check_bomb_event(&ctx, BombEvent::Detonated).is_err());

        bomb.on_bomb_event(&ctx, BombEvent::Planted { planter: a });
        assert!(bomb.check_bomb_event(&ctx, defuse).is_ok());
        assert!(
            bomb.check_bomb_event(&ctx, BombEvent::DefuseStarted { defuser: a })
                .is_err()
        );
        assert!(bomb.check_bomb_event(&ctx, BombEvent::Planted { planter: a }).is_err());

        bomb.on_bomb_event(&ctx, BombEvent::Detonated);
        assert!(bomb.check_bomb_event(&ctx, defuse).is_err());
    }

    #[test]
    fn test_team_assigned_resets_inventory() {
        let (ctx, a, _) = seated();
        ctx.roster().get_mut(a).unwrap().inventory.set_cash(16000);
        let mut bomb = BombDefusal::new(BombDefusalConfig::default());
        bomb.on_team_assigned(&ctx, a, Team::A);
        assert_eq!(cash(&ctx, a), 800);
    }

    #[test]
    fn test_settlement_uses_level_before_update() {
        let (ctx, a, b) = seated();
        let mut bomb = BombDefusal::new(BombDefusalConfig::default());

        ctx.scoring().record_round_winner(Team::A);
        bomb.pre_round_end(&ctx);
        assert_eq!(cash(&ctx, a), 3250);
        assert_eq!(cash(&ctx, b), 1400);
        assert_eq!(bomb.ledger().level(Team::B), 1);

        ctx.scoring().clear_round_winner();
        bomb.pre_round_start(&ctx);
        bomb.on_bomb_event(&ctx, BombEvent::Planted { planter: a });
        bomb.on_bomb_event(&ctx, BombEvent::Detonated);
        let verdict = bomb.should_round_end(&ctx).unwrap();
        ctx.scoring().record_round_winner(verdict.outcome.unwrap());
        bomb.pre_round_end(&ctx);
        assert_eq!(cash(&ctx, a), 3250 + 3500);
        assert_eq!(cash(&ctx, b), 1400 + 1900);
        assert_eq!(bomb.ledger().level(Team::B), 2);
    }

    #[test]
    fn test_no_winner_pays_nothing() {
        let (ctx, a, b) = seated();
        let mut bomb = BombDefusal::new(BombDefusalConfig::default());
        bomb.pre_round_end(&ctx);
        assert_eq!(cash(&ctx, a), 0);
        assert_eq!(cash(&ctx, b), 0);
        assert!(bomb.ledger().levels().is_empty());
    }

    #[test]
    fn test_swap_and_game_start_clear_ledger() {
        let (ctx, _, _) = seated();
        let mut bomb = BombDefusal::new(BombDefusalConfig::default());
        ctx.scoring().record_round_winner(Team::B);
        bomb.pre_round_end(&ctx);
        assert_eq!(bomb.ledger().level(Team::A), 1);
        bomb.on_team_swap(&ctx);
        assert_eq!(bomb.ledger().level(Team::A), 0);

        bomb.pre_round_end(&ctx);
        assert_eq!(bomb.ledger().level(Team::A), 1);
        bomb.post_game_start(&ctx);
        assert!(bomb.ledger().levels().is_empty());
    }

    #[test]
    fn test_replicate_fills_bomb_and_ledger() {
        let (ctx, a, _) = seated();
        let mut bomb = BombDefusal::new(BombDefusalConfig::default());
        bomb.on_bomb_event(&ctx, BombEvent::Planted { planter: a });
        let mut snap = MatchSnapshot::default();
        bomb.replicate(&mut snap);
        assert!(snap.bomb.unwrap().planted);
        assert_eq!(snap.loss_streak[&Team::A], 0);
    }
}
