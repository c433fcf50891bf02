//! Match phase and the replicated snapshot.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::context::MatchContext;
use crate::roster::{PlayerId, Team};

/// Lifecycle state of a match.
///
/// Advances only along `PreGame → PreRound → DuringRound → PostRound →
/// (PreRound | PostGame) → Ended`. The administrative override may jump
/// straight to `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum MatchPhase {
    /// Waiting to start.
    #[default]
    PreGame,
    /// Between rounds, before the next one starts.
    PreRound,
    /// A round is being played.
    DuringRound,
    /// A round has just ended.
    PostRound,
    /// The last round has been played.
    PostGame,
    /// Terminal.
    Ended,
}

impl MatchPhase {
    /// Returns `true` once the match can no longer advance.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ended)
    }

    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreGame => "PreGame",
            Self::PreRound => "PreRound",
            Self::DuringRound => "DuringRound",
            Self::PostRound => "PostRound",
            Self::PostGame => "PostGame",
            Self::Ended => "Ended",
        }
    }

    /// Whether `to` is a legal successor of `self` in the step table.
    #[must_use]
    pub const fn can_advance_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::PreGame, Self::PreRound)
                | (Self::PreRound | Self::DuringRound, Self::DuringRound)
                | (Self::DuringRound, Self::PostRound)
                | (Self::PostRound, Self::PreRound | Self::PostGame)
                | (Self::PostGame, Self::Ended)
        )
    }
}

impl std::fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    /// Player id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Current team.
    pub team: Team,
    /// Alive this round.
    pub alive: bool,
    /// Cash balance.
    pub cash: u32,
    /// Held weapon kinds.
    pub weapons: Vec<String>,
}

/// Bomb triple as seen by observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BombView {
    /// Bomb is planted.
    pub planted: bool,
    /// Bomb went off.
    pub detonated: bool,
    /// Bomb was defused.
    pub defused: bool,
}

/// Host-authoritative state mirrored to observers.
///
/// Built by the host after every step and command. Observers only ever
/// hold a `watch::Receiver` of this value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchSnapshot {
    /// Current phase.
    pub phase: MatchPhase,
    /// Completed rounds.
    pub round: u32,
    /// Round wins per team.
    pub scores: BTreeMap<Team, u32>,
    /// Loss-streak level per team; empty when no scenario keeps a ledger.
    pub loss_streak: BTreeMap<Team, u32>,
    /// Bomb triple, if a bomb scenario is installed.
    pub bomb: Option<BombView>,
    /// Status text per team.
    pub status: BTreeMap<Team, String>,
    /// Whether the round countdown is shown.
    pub timer_visible: bool,
    /// Toasts raised so far.
    pub toasts: Vec<String>,
    /// All players in join order.
    pub players: Vec<PlayerView>,
}

impl MatchSnapshot {
    /// Captures the host-owned parts of the context. Module fields are
    /// filled in afterwards through `RuleModule::replicate`.
    pub(crate) fn capture(phase: MatchPhase, ctx: &MatchContext) -> Self {
        let scores = {
            let scoring = ctx.scoring();
            Team::PLAYING
                .iter()
                .map(|t| (*t, scoring.wins(*t)))
                .collect()
        };
        let players = ctx
            .roster()
            .all()
            .map(|p| PlayerView {
                id: p.id,
                name: p.name.clone(),
                team: p.team,
                alive: p.alive,
                cash: p.inventory.cash(),
                weapons: p.inventory.weapons().iter().map(|w| w.kind.clone()).collect(),
            })
            .collect();
        let display = ctx.display().clone();
        Self {
            phase,
            round: ctx.round(),
            scores,
            loss_streak: BTreeMap::new(),
            bomb: None,
            status: display.status,
            timer_visible: ctx.clock().visible,
            toasts: display.toasts,
            players,
        }
    }

    /// Round wins of `team`.
    #[must_use]
    pub fn score(&self, team: Team) -> u32 {
        self.scores.get(&team).copied().unwrap_or(0)
    }

    /// Players of `team` still alive.
    pub fn alive_on(&self, team: Team) -> impl Iterator<Item = &PlayerView> {
        self.players
            .iter()
            .filter(move |p| p.team == team && p.alive)
    }
}
