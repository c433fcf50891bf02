//! Rule modules.
//!
//! A rule module is a polymorphic implementer of one or more capabilities.
//! The host discovers modules by capability through the registry and calls
//! only the methods belonging to the capabilities a module declares. Every
//! method has a no-op default, so a module overrides exactly what it uses.

pub mod bomb_defusal;
pub mod economy;
pub mod equipment_dropper;
pub mod half_time;
pub mod respawn;
pub mod round_limit;
pub mod round_time_limit;
pub mod special_weapon;
pub mod team_elimination;

use async_trait::async_trait;

use crate::config::schema::{RoundLimitConfig, RulesConfig};
use crate::context::MatchContext;
use crate::error::RuleError;
use crate::phase::{Capability, MatchSnapshot};
use crate::roster::{PlayerId, Team};

pub use bomb_defusal::BombDefusal;
pub use economy::{IncomeReason, LossStreakLedger};
pub use equipment_dropper::EquipmentDropper;
pub use half_time::HalfTimeSwap;
pub use respawn::Respawner;
pub use round_limit::RoundLimit;
pub use round_time_limit::RoundTimeLimit;
pub use special_weapon::SpecialWeaponAllocator;
pub use team_elimination::TeamElimination;

/// Answer of a round-end or game-end condition poll.
///
/// A condition that ends the round names the winner in `outcome`; the host
/// records it. `None` with `ended` set means a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Verdict {
    /// Whether the round (or game) is over.
    pub ended: bool,
    /// Winning team, if any.
    pub outcome: Option<Team>,
}

impl Verdict {
    /// Keep playing.
    pub const CONTINUE: Self = Self {
        ended: false,
        outcome: None,
    };

    /// Over, won by `team`.
    #[must_use]
    pub const fn won_by(team: Team) -> Self {
        Self {
            ended: true,
            outcome: Some(team),
        }
    }

    /// Over, with `outcome` as the winner if there is one.
    #[must_use]
    pub const fn ended(outcome: Option<Team>) -> Self {
        Self {
            ended: true,
            outcome,
        }
    }
}

/// Bomb scenario notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BombEvent {
    /// The bomb was planted.
    Planted {
        /// Planting player.
        planter: PlayerId,
    },
    /// A defuse attempt started.
    DefuseStarted {
        /// Defusing player.
        defuser: PlayerId,
    },
    /// The bomb exploded.
    Detonated,
    /// The bomb was defused.
    Defused {
        /// Defusing player.
        defuser: PlayerId,
    },
}

/// A pluggable rule module.
///
/// `pre_*` and `post_*` run synchronously in registration order; `on_*`
/// may suspend and runs concurrently with the same stage of other
/// modules. Modules must not hold a context lock across an `.await`.
#[async_trait]
pub trait RuleModule: Send + Sync {
    /// Unique module name; used for requirements and logs.
    fn name(&self) -> &'static str;

    /// Capabilities this module subscribes to.
    fn capabilities(&self) -> &'static [Capability];

    /// Names of sibling modules that must be registered as well.
    fn requires(&self) -> &'static [&'static str] {
        &[]
    }

    // ------------------------------------------------------------------
    // GameStart
    // ------------------------------------------------------------------

    fn pre_game_start(&mut self, _ctx: &MatchContext) {}

    async fn on_game_start(&mut self, _ctx: &MatchContext) -> Result<(), RuleError> {
        Ok(())
    }

    fn post_game_start(&mut self, _ctx: &MatchContext) {}

    // ------------------------------------------------------------------
    // RoundStart
    // ------------------------------------------------------------------

    fn pre_round_start(&mut self, _ctx: &MatchContext) {}

    async fn on_round_start(&mut self, _ctx: &MatchContext) -> Result<(), RuleError> {
        Ok(())
    }

    fn post_round_start(&mut self, _ctx: &MatchContext) {}

    // ------------------------------------------------------------------
    // RoundEnd
    // ------------------------------------------------------------------

    fn pre_round_end(&mut self, _ctx: &MatchContext) {}

    async fn on_round_end(&mut self, _ctx: &MatchContext) -> Result<(), RuleError> {
        Ok(())
    }

    fn post_round_end(&mut self, _ctx: &MatchContext) {}

    // ------------------------------------------------------------------
    // GameEnd
    // ------------------------------------------------------------------

    fn pre_game_end(&mut self, _ctx: &MatchContext) {}

    async fn on_game_end(&mut self, _ctx: &MatchContext) -> Result<(), RuleError> {
        Ok(())
    }

    fn post_game_end(&mut self, _ctx: &MatchContext) {}

    // ------------------------------------------------------------------
    // PlayerSpawn
    // ------------------------------------------------------------------

    fn pre_player_spawn(&mut self, _ctx: &MatchContext, _player: PlayerId) {}

    async fn on_player_spawn(
        &mut self,
        _ctx: &MatchContext,
        _player: PlayerId,
    ) -> Result<(), RuleError> {
        Ok(())
    }

    fn post_player_spawn(&mut self, _ctx: &MatchContext, _player: PlayerId) {}

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// `TeamAssigned(player, team)`.
    fn on_team_assigned(&mut self, _ctx: &MatchContext, _player: PlayerId, _team: Team) {}

    /// `TeamSwap()`.
    fn on_team_swap(&mut self, _ctx: &MatchContext) {}

    /// Bomb plant, defuse or detonation.
    fn on_bomb_event(&mut self, _ctx: &MatchContext, _event: BombEvent) {}

    /// Vets a bomb event before any subscriber is notified.
    ///
    /// # Errors
    ///
    /// An error rejects the originating command; no module sees the event.
    fn check_bomb_event(&self, _ctx: &MatchContext, _event: BombEvent) -> Result<(), RuleError> {
        Ok(())
    }

    /// A player entered the directory; observers have not seen them yet.
    fn on_connect(&mut self, _ctx: &MatchContext, _player: PlayerId) {}

    /// A player joined and has been published to observers.
    fn on_joined(&mut self, _ctx: &MatchContext, _player: PlayerId) {}

    /// `PlayerKilled(victim, attacker)`.
    fn on_player_killed(
        &mut self,
        _ctx: &MatchContext,
        _victim: PlayerId,
        _attacker: Option<PlayerId>,
    ) {
    }

    // ------------------------------------------------------------------
    // Conditions
    // ------------------------------------------------------------------

    /// `ShouldRoundEnd()`.
    ///
    /// # Errors
    ///
    /// An error here is fatal to the phase transition.
    fn should_round_end(&mut self, _ctx: &MatchContext) -> Result<Verdict, RuleError> {
        Ok(Verdict::CONTINUE)
    }

    /// `ShouldGameEnd()`.
    ///
    /// # Errors
    ///
    /// An error here is fatal to the phase transition.
    fn should_game_end(&mut self, _ctx: &MatchContext) -> Result<Verdict, RuleError> {
        Ok(Verdict::CONTINUE)
    }

    /// Adds module-owned replicated fields to an observer snapshot.
    fn replicate(&self, _snapshot: &mut MatchSnapshot) {}
}

/// Instantiates the modules enabled in `rules`, in registration order.
#[must_use]
pub fn from_config(rules: &RulesConfig) -> Vec<Box<dyn RuleModule>> {
    let mut modules: Vec<Box<dyn RuleModule>> = Vec::new();
    if rules.respawn.is_some() {
        modules.push(Box::new(Respawner));
    }
    if let Some(cfg) = &rules.round_time_limit {
        modules.push(Box::new(RoundTimeLimit::new(cfg.clone())));
    }
    if rules.team_elimination.is_some() {
        modules.push(Box::new(TeamElimination));
    }
    if let Some(cfg) = &rules.bomb_defusal {
        modules.push(Box::new(BombDefusal::new(cfg.clone())));
    }
    if let Some(cfg) = &rules.round_limit {
        modules.push(Box::new(RoundLimit::new(cfg.clone())));
    }
    if let Some(cfg) = &rules.half_time_swap {
        let max_rounds = rules
            .round_limit
            .as_ref()
            .map_or_else(|| RoundLimitConfig::default().max_rounds, |r| r.max_rounds);
        modules.push(Box::new(HalfTimeSwap::new(cfg.clone(), max_rounds)));
    }
    if let Some(cfg) = &rules.special_weapon {
        modules.push(Box::new(SpecialWeaponAllocator::new(cfg.clone())));
    }
    if rules.equipment_dropper.is_some() {
        modules.push(Box::new(EquipmentDropper));
    }
    modules
}
