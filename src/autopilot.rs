//! Seeded bot driver.
//!
//! The autopilot plays a match through the public command surface only:
//! it watches the observer mirror and, once per round, scripts an outcome
//! the way a game server would report it. Given the same seed and roster
//! it issues the same commands.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::MatchError;
use crate::phase::{MatchCommand, MatchHandle, MatchPhase, MatchSnapshot};
use crate::roster::{PlayerId, Team};

/// Scripted outcome of one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundScript {
    /// Kill every member of `loser`.
    Eliminate {
        /// Team that gets wiped out.
        loser: Team,
    },
    /// Plant, then let the bomb go off.
    Detonate,
    /// Plant, then defuse.
    Defuse,
}

/// What the autopilot did over a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutopilotReport {
    /// Rounds the autopilot scripted.
    pub rounds_played: u32,
    /// Commands the host accepted.
    pub commands_accepted: u32,
    /// Commands the host rejected.
    pub commands_rejected: u32,
}

/// Drives a running match to completion.
#[derive(Debug)]
pub struct Autopilot {
    handle: MatchHandle,
    rng: StdRng,
    attackers: Option<Team>,
    report: AutopilotReport,
}

impl Autopilot {
    /// Creates an autopilot. `attackers` names the planting team when a
    /// bomb scenario is installed; without it only eliminations are played.
    #[must_use]
    pub fn new(handle: MatchHandle, seed: u64, attackers: Option<Team>) -> Self {
        Self {
            handle,
            rng: StdRng::seed_from_u64(seed),
            attackers,
            report: AutopilotReport::default(),
        }
    }

    /// Plays until the match ends, the host goes away or the match is
    /// cancelled.
    pub async fn run(mut self) -> AutopilotReport {
        let mut mirror = self.handle.subscribe();
        let cancel = self.handle.cancellation_token();
        let mut last_played = None;

        loop {
            let snapshot = mirror.borrow_and_update().clone();
            if snapshot.phase.is_terminal() {
                break;
            }
            if snapshot.phase == MatchPhase::DuringRound && last_played != Some(snapshot.round) {
                last_played = Some(snapshot.round);
                match self.play_round(&snapshot).await {
                    Ok(()) => self.report.rounds_played += 1,
                    Err(MatchError::EngineClosed) => break,
                    Err(e) => debug!(round = snapshot.round + 1, error = %e, "round script cut short"),
                }
            }

            if !wait_for_change(&mut mirror, &cancel).await {
                break;
            }
        }

        info!(
            rounds = self.report.rounds_played,
            accepted = self.report.commands_accepted,
            rejected = self.report.commands_rejected,
            "autopilot finished"
        );
        self.report
    }

    /// Picks the script for the round about to be played.
    pub fn choose_script(&mut self, snapshot: &MatchSnapshot) -> Option<RoundScript> {
        let populated: Vec<Team> = Team::PLAYING
            .into_iter()
            .filter(|t| snapshot.players.iter().any(|p| p.team == *t))
            .collect();

        if let Some(attackers) = self.attackers {
            let both = populated.contains(&attackers) && populated.contains(&attackers.opponent());
            if both {
                return Some(match self.rng.random_range(0..3) {
                    0 => RoundScript::Detonate,
                    1 => RoundScript::Defuse,
                    _ => RoundScript::Eliminate {
                        loser: *Team::PLAYING.choose(&mut self.rng)?,
                    },
                });
            }
        }

        populated
            .choose(&mut self.rng)
            .map(|loser| RoundScript::Eliminate { loser: *loser })
    }

    async fn play_round(&mut self, snapshot: &MatchSnapshot) -> Result<(), MatchError> {
        for player in snapshot
            .players
            .iter()
            .filter(|p| p.team.is_playing() && !p.alive)
        {
            self.send(MatchCommand::PlayerSpawned {
                player: player.id.into(),
            })
            .await?;
        }

        let Some(script) = self.choose_script(snapshot) else {
            warn!(round = snapshot.round + 1, "no players to script a round for");
            return Ok(());
        };
        debug!(round = snapshot.round + 1, ?script, "scripting round");

        match script {
            RoundScript::Eliminate { loser } => {
                let victims = ids_on(snapshot, loser);
                let killers = ids_on(snapshot, loser.opponent());
                for victim in victims {
                    let attacker = killers.choose(&mut self.rng).copied().map(Into::into);
                    self.send(MatchCommand::PlayerKilled {
                        victim: victim.into(),
                        attacker,
                    })
                    .await?;
                }
            }
            RoundScript::Detonate | RoundScript::Defuse => {
                let Some(attackers) = self.attackers else {
                    return Ok(());
                };
                let planter = self.pick(snapshot, attackers);
                let defuser = self.pick(snapshot, attackers.opponent());
                let (Some(planter), Some(defuser)) = (planter, defuser) else {
                    return Ok(());
                };
                self.send(MatchCommand::BombPlanted {
                    planter: planter.into(),
                })
                .await?;
                if script == RoundScript::Detonate {
                    self.send(MatchCommand::BombDetonated).await?;
                } else {
                    self.send(MatchCommand::DefuseStarted {
                        defuser: defuser.into(),
                    })
                    .await?;
                    self.send(MatchCommand::BombDefused {
                        defuser: defuser.into(),
                    })
                    .await?;
                }
            }
        }
        Ok(())
    }

    fn pick(&mut self, snapshot: &MatchSnapshot, team: Team) -> Option<PlayerId> {
        ids_on(snapshot, team).choose(&mut self.rng).copied()
    }

    async fn send(&mut self, command: MatchCommand) -> Result<(), MatchError> {
        match self.handle.send(command).await {
            Ok(()) => {
                self.report.commands_accepted += 1;
                Ok(())
            }
            Err(e) => {
                if !matches!(e, MatchError::EngineClosed) {
                    self.report.commands_rejected += 1;
                }
                Err(e)
            }
        }
    }
}

fn ids_on(snapshot: &MatchSnapshot, team: Team) -> Vec<PlayerId> {
    snapshot
        .players
        .iter()
        .filter(|p| p.team == team)
        .map(|p| p.id)
        .collect()
}

/// Waits for the next published snapshot. Returns `false` once the host
/// is gone or the match is cancelled.
async fn wait_for_change(
    mirror: &mut watch::Receiver<MatchSnapshot>,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        changed = mirror.changed() => changed.is_ok(),
        () = cancel.cancelled() => false,
    }
}
