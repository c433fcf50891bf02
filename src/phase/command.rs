//! External command surface.
//!
//! Out-of-band inputs (network, admin console, bots) reach the host as
//! [`MatchCommand`]s. A [`MatchHandle`] sends them over a channel and waits
//! for the host to apply them between steps.

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::error::MatchError;
use crate::roster::{ConnectionId, PlayerRef, Team};

use super::state::MatchSnapshot;

/// Capacity of the command channel.
pub const COMMAND_BUFFER: usize = 64;

/// An input the host applies between steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchCommand {
    /// Seat a new unassigned player.
    ///
    /// The reply carries no id; refer to the player by `connection` later.
    Join {
        /// Display name.
        name: String,
        /// Owning connection, `None` for bots.
        connection: Option<ConnectionId>,
    },
    /// Move a player to a team.
    AssignTeam {
        /// Player to move.
        player: PlayerRef,
        /// Destination team.
        team: Team,
    },
    /// A player (re)spawned in the world.
    PlayerSpawned {
        /// Spawned player.
        player: PlayerRef,
    },
    /// The bomb was planted.
    BombPlanted {
        /// Planting player.
        planter: PlayerRef,
    },
    /// Someone started defusing.
    DefuseStarted {
        /// Defusing player.
        defuser: PlayerRef,
    },
    /// The planted bomb went off.
    BombDetonated,
    /// The planted bomb was defused.
    BombDefused {
        /// Defusing player.
        defuser: PlayerRef,
    },
    /// A player died.
    PlayerKilled {
        /// Player who died.
        victim: PlayerRef,
        /// Killer, if any.
        attacker: Option<PlayerRef>,
    },
    /// Administrative override: jump straight to `Ended`.
    ForceEnd,
}

impl MatchCommand {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::AssignTeam { .. } => "assign_team",
            Self::PlayerSpawned { .. } => "player_spawned",
            Self::BombPlanted { .. } => "bomb_planted",
            Self::DefuseStarted { .. } => "defuse_started",
            Self::BombDetonated => "bomb_detonated",
            Self::BombDefused { .. } => "bomb_defused",
            Self::PlayerKilled { .. } => "player_killed",
            Self::ForceEnd => "force_end",
        }
    }

    /// Commands that only make sense while a round is being played.
    #[must_use]
    pub const fn requires_live_round(&self) -> bool {
        matches!(
            self,
            Self::BombPlanted { .. }
                | Self::DefuseStarted { .. }
                | Self::BombDetonated
                | Self::BombDefused { .. }
                | Self::PlayerKilled { .. }
        )
    }
}

pub(crate) type Envelope = (MatchCommand, oneshot::Sender<Result<(), MatchError>>);

/// Cloneable client of a running match.
#[derive(Debug, Clone)]
pub struct MatchHandle {
    commands: mpsc::Sender<Envelope>,
    mirror: watch::Receiver<MatchSnapshot>,
    cancel: CancellationToken,
}

impl MatchHandle {
    pub(crate) const fn new(
        commands: mpsc::Sender<Envelope>,
        mirror: watch::Receiver<MatchSnapshot>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            commands,
            mirror,
            cancel,
        }
    }

    /// Sends a command and waits until the host has applied or rejected it.
    ///
    /// # Errors
    ///
    /// Returns the host's rejection, or `MatchError::EngineClosed` if the
    /// host is gone.
    pub async fn send(&self, command: MatchCommand) -> Result<(), MatchError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send((command, tx))
            .await
            .map_err(|_| MatchError::EngineClosed)?;
        rx.await.map_err(|_| MatchError::EngineClosed)?
    }

    /// A fresh receiver of the observer mirror.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MatchSnapshot> {
        self.mirror.clone()
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MatchSnapshot {
        self.mirror.borrow().clone()
    }

    /// Asks the host loop to stop; it ends the match through the override.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token cancelled when the host is asked to stop.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::PlayerId;

    #[test]
    fn test_live_round_commands() {
        let p = PlayerRef::Id(PlayerId(1));
        assert!(MatchCommand::BombPlanted { planter: p }.requires_live_round());
        assert!(MatchCommand::BombDetonated.requires_live_round());
        assert!(
            MatchCommand::PlayerKilled {
                victim: p,
                attacker: None
            }
            .requires_live_round()
        );
        assert!(!MatchCommand::AssignTeam { player: p, team: Team::A }.requires_live_round());
        assert!(!MatchCommand::ForceEnd.requires_live_round());
        assert!(
            !MatchCommand::Join {
                name: "late".to_string(),
                connection: None
            }
            .requires_live_round()
        );
    }

    #[tokio::test]
    async fn test_send_to_dropped_host_is_engine_closed() {
        let (tx, rx) = mpsc::channel(1);
        let (_mirror_tx, mirror_rx) = watch::channel(MatchSnapshot::default());
        drop(rx);
        let handle = MatchHandle::new(tx, mirror_rx, CancellationToken::new());
        let err = handle.send(MatchCommand::ForceEnd).await.unwrap_err();
        assert!(matches!(err, MatchError::EngineClosed));
    }
}
