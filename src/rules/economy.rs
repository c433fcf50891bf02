//! Loss-streak economy.
//!
//! A [`LossStreakLedger`] maps each team to a level in `[0, max_level]`.
//! A loss raises the loser's level by one and a win lowers the winner's by
//! one; the loss bonus paid is `base + level * increment` at the level held
//! before the round is settled.

use std::collections::BTreeMap;

use crate::roster::Team;

/// Why income was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncomeReason {
    /// Round win without a scenario bonus.
    RoundWin,
    /// Win by bomb detonation.
    BombDetonated,
    /// Win by bomb defusal.
    BombDefused,
    /// Loss compensation.
    LossBonus,
}

impl IncomeReason {
    /// Stable label used in logs, metrics and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RoundWin => "round_win",
            Self::BombDetonated => "bomb_detonated",
            Self::BombDefused => "bomb_defused",
            Self::LossBonus => "loss_bonus",
        }
    }
}

/// Per-team loss-streak levels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LossStreakLedger {
    levels: BTreeMap<Team, u32>,
    max_level: u32,
}

impl LossStreakLedger {
    /// Creates an empty ledger bounded by `max_level`.
    #[must_use]
    pub const fn new(max_level: u32) -> Self {
        Self {
            levels: BTreeMap::new(),
            max_level,
        }
    }

    /// Current level of `team`; teams never seen are at 0.
    #[must_use]
    pub fn level(&self, team: Team) -> u32 {
        self.levels.get(&team).copied().unwrap_or(0)
    }

    /// Upper bound of every level.
    #[must_use]
    pub const fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Settles one decided round: the winner steps down, the loser up.
    pub fn settle(&mut self, winner: Team) {
        let loser = winner.opponent();
        let down = self.level(winner).saturating_sub(1);
        let up = self.level(loser).saturating_add(1).min(self.max_level);
        self.levels.insert(winner, down);
        self.levels.insert(loser, up);
    }

    /// Forgets every level.
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Levels of the teams that have an entry.
    #[must_use]
    pub const fn levels(&self) -> &BTreeMap<Team, u32> {
        &self.levels
    }
}

/// Loss compensation at `level`.
#[must_use]
pub const fn loss_bonus(base: u32, increment: u32, level: u32) -> u32 {
    base.saturating_add(level.saturating_mul(increment))
}
