//! Match state machine.
//!
//! The [`Match`] owns the authoritative phase and drives it through the
//! step table:
//!
//! | From | Action | To |
//! |---|---|---|
//! | `PreGame` | dispatch `GameStart` | `PreRound` |
//! | `PreRound` | dispatch `RoundStart` | `DuringRound` |
//! | `DuringRound` | wait one tick, poll `RoundEndCondition` | `PostRound` or `DuringRound` |
//! | `PostRound` | dispatch `RoundEnd`, poll `GameEndCondition` | `PostGame` or `PreRound` |
//! | `PostGame` | dispatch `GameEnd` | `Ended` |
//!
//! Conditions are polled in registration order and the first `ended`
//! verdict wins; later conditions are not asked that tick.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::context::{MatchContext, Signal};
use crate::error::MatchError;
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics;
use crate::roster::{ConnectionId, PlayerId, PlayerRef, Team};
use crate::rules::{BombEvent, RuleModule, Verdict};
use crate::spawn::{AnySpawnAssigner, SpawnAssigner};

use super::command::{COMMAND_BUFFER, Envelope, MatchCommand, MatchHandle};
use super::dispatch::{
    self, BombNotice, GameEnd, GameStart, PlayerConnect, PlayerJoined, PlayerKilled, PlayerSpawn,
    RoundEnd, RoundStart, TeamAssigned, TeamSwap,
};
use super::registry::{Capability, CapabilityRegistry, ModuleId};
use super::state::{MatchPhase, MatchSnapshot};

/// Default wait between `DuringRound` polls.
pub const DEFAULT_TICK: Duration = Duration::from_millis(16);

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`Match`] and validates module requirements.
pub struct MatchBuilder {
    name: String,
    tick: Duration,
    seed: u64,
    modules: Vec<Box<dyn RuleModule>>,
    spawns: Option<Box<dyn SpawnAssigner>>,
    default_equipment: Vec<String>,
    events: Option<Arc<EventEmitter>>,
    cancel: Option<CancellationToken>,
}

impl MatchBuilder {
    /// Starts a builder for a match called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tick: DEFAULT_TICK,
            seed: 0,
            modules: Vec::new(),
            spawns: None,
            default_equipment: Vec::new(),
            events: None,
            cancel: None,
        }
    }

    /// Wait between round-end polls. Zero yields instead of sleeping.
    #[must_use]
    pub const fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Seed of the match random source.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Registers a module after those already added.
    #[must_use]
    pub fn module(mut self, module: Box<dyn RuleModule>) -> Self {
        self.modules.push(module);
        self
    }

    /// Registers several modules in iteration order.
    #[must_use]
    pub fn modules(mut self, modules: impl IntoIterator<Item = Box<dyn RuleModule>>) -> Self {
        self.modules.extend(modules);
        self
    }

    /// Installs the spawn assigner collaborator.
    #[must_use]
    pub fn spawn_assigner(mut self, spawns: Box<dyn SpawnAssigner>) -> Self {
        self.spawns = Some(spawns);
        self
    }

    /// Weapon kinds every player starts with.
    #[must_use]
    pub fn default_equipment(mut self, kinds: Vec<String>) -> Self {
        self.default_equipment = kinds;
        self
    }

    /// Event stream sink.
    #[must_use]
    pub fn events(mut self, events: Arc<EventEmitter>) -> Self {
        self.events = Some(events);
        self
    }

    /// Token that stops [`Match::run`].
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Registers the modules and checks every declared requirement.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::MissingCapability` naming the first required
    /// module that is not registered.
    pub fn build(self) -> Result<Match, MatchError> {
        let mut registry = CapabilityRegistry::new();
        for module in self.modules {
            registry.register(module);
        }

        let names = registry.names();
        for module in registry.modules() {
            if let Some(missing) = module.requires().iter().copied().find(|r| !names.contains(r)) {
                error!(module = module.name(), requires = missing, "required module missing");
                return Err(MatchError::MissingCapability {
                    name: missing.to_string(),
                });
            }
        }

        let spawns = self.spawns.unwrap_or_else(|| {
            debug!("no spawn assigner supplied, installing AnySpawnAssigner");
            Box::new(AnySpawnAssigner)
        });
        let events = self.events.unwrap_or_else(|| Arc::new(EventEmitter::noop()));
        let ctx = MatchContext::new(spawns, self.default_equipment, self.seed, events);

        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (mirror, _) = watch::channel(MatchSnapshot::default());

        let built = Match {
            id: Uuid::new_v4(),
            name: self.name,
            phase: MatchPhase::PreGame,
            tick: self.tick,
            registry,
            ctx,
            commands_tx,
            commands,
            mirror,
            cancel: self.cancel.unwrap_or_default(),
            forced: false,
            winner: None,
        };
        built.publish();
        Ok(built)
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Result of a finished match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    /// Match id.
    pub match_id: Uuid,
    /// Match name.
    pub name: String,
    /// Completed rounds.
    pub rounds: u32,
    /// Round wins per team.
    pub scores: BTreeMap<Team, u32>,
    /// Winner named by the deciding game-end condition.
    pub winner: Option<Team>,
    /// Whether the administrative override ended the match.
    pub forced: bool,
}

// ============================================================================
// Match
// ============================================================================

/// The authoritative host of one match.
pub struct Match {
    id: Uuid,
    name: String,
    phase: MatchPhase,
    tick: Duration,
    registry: CapabilityRegistry,
    ctx: MatchContext,
    commands_tx: mpsc::Sender<Envelope>,
    commands: mpsc::Receiver<Envelope>,
    mirror: watch::Sender<MatchSnapshot>,
    cancel: CancellationToken,
    forced: bool,
    winner: Option<Team>,
}

impl std::fmt::Debug for Match {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Match")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Match {
    /// Match id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Shared state handed to modules.
    #[must_use]
    pub const fn context(&self) -> &MatchContext {
        &self.ctx
    }

    /// Looks up a registered module by name.
    #[must_use]
    pub fn module_id(&self, name: &str) -> Option<ModuleId> {
        self.registry.find(name)
    }

    /// Enables or disables a module between dispatches.
    pub fn set_module_enabled(&mut self, id: ModuleId, enabled: bool) -> bool {
        self.registry.set_enabled(id, enabled)
    }

    /// A client for sending commands and observing snapshots.
    #[must_use]
    pub fn handle(&self) -> MatchHandle {
        MatchHandle::new(
            self.commands_tx.clone(),
            self.mirror.subscribe(),
            self.cancel.clone(),
        )
    }

    /// Seats a new unassigned player.
    ///
    /// `PlayerJoined` subscribers get `on_connect` before the player is
    /// published to observers and `on_joined` after.
    pub fn join(&mut self, name: impl Into<String>, connection: Option<ConnectionId>) -> PlayerId {
        let name = name.into();
        let id = self.ctx.roster().join(name.clone(), connection);
        dispatch::notify(&mut self.registry, &self.ctx, &PlayerConnect(id));
        info!(player = %id, %name, phase = %self.phase, "player joined");
        self.publish();

        dispatch::notify(&mut self.registry, &self.ctx, &PlayerJoined(id));
        self.settle();
        self.publish();
        id
    }

    /// Drives the match until `Ended` or cancellation.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::ConditionFailed` if a condition poll fails; the
    /// match stays in the phase it was in.
    pub async fn run(mut self) -> Result<MatchSummary, MatchError> {
        let cancel = self.cancel.clone();
        while !self.phase.is_terminal() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    warn!(phase = %self.phase, "match cancelled");
                    self.force_end();
                }
                result = self.step() => {
                    result?;
                }
            }
        }
        Ok(self.summary())
    }

    /// Performs one row of the step table.
    ///
    /// Pending commands are applied first. Returns the phase after the step.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::ConditionFailed` if a condition poll fails.
    pub async fn step(&mut self) -> Result<MatchPhase, MatchError> {
        self.drain_commands().await;
        match self.phase {
            MatchPhase::PreGame => self.start_game().await,
            MatchPhase::PreRound => self.start_round().await,
            MatchPhase::DuringRound => self.play_tick().await?,
            MatchPhase::PostRound => self.end_round().await?,
            MatchPhase::PostGame => self.end_game().await,
            MatchPhase::Ended => {}
        }
        self.publish();
        Ok(self.phase)
    }

    /// Applies one external command.
    ///
    /// # Errors
    ///
    /// `PlayerNotFound` for unknown references, `OutOfPhase` for bomb or
    /// kill commands outside `DuringRound` and `Refused` for bomb events a
    /// module vetoes. A rejected command changes nothing.
    pub async fn apply(&mut self, command: MatchCommand) -> Result<(), MatchError> {
        let name = command.name();
        let result = self.apply_command(command).await;
        match &result {
            Ok(()) => metrics::record_command(name),
            Err(e) => {
                warn!(command = name, error = %e, "command rejected");
                metrics::record_command_rejected(rejection_label(e));
            }
        }
        self.publish();
        result
    }

    /// Administrative override: moves straight to `Ended`.
    pub fn force_end(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        warn!(phase = %self.phase, round = self.ctx.round(), "forcing match end");
        self.forced = true;
        if self.winner.is_none() {
            self.winner = self.ctx.scoring().leader();
        }
        self.transition(MatchPhase::Ended);
        self.publish();
    }

    /// Summary of the match so far.
    #[must_use]
    pub fn summary(&self) -> MatchSummary {
        let scoring = self.ctx.scoring();
        MatchSummary {
            match_id: self.id,
            name: self.name.clone(),
            rounds: self.ctx.round(),
            scores: Team::PLAYING.iter().map(|t| (*t, scoring.wins(*t))).collect(),
            winner: self.winner,
            forced: self.forced,
        }
    }

    // ------------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------------

    async fn start_game(&mut self) {
        self.ctx.set_round(0);
        self.ctx.scoring().reset();
        self.winner = None;
        self.ctx.emit(Event::MatchStarted {
            timestamp: Utc::now(),
            match_id: self.id,
            name: self.name.clone(),
            modules: self.registry.names().iter().map(ToString::to_string).collect(),
        });
        info!(match_id = %self.id, name = %self.name, modules = self.registry.len(), "match starting");

        dispatch::dispatch(&mut self.registry, &self.ctx, &GameStart).await;
        self.settle();
        self.transition(MatchPhase::PreRound);
    }

    async fn start_round(&mut self) {
        self.ctx.scoring().clear_round_winner();
        dispatch::dispatch(&mut self.registry, &self.ctx, &RoundStart).await;
        self.settle();
        self.transition(MatchPhase::DuringRound);
    }

    async fn play_tick(&mut self) -> Result<(), MatchError> {
        if self.tick.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.tick).await;
        }
        self.drain_commands().await;
        if self.phase != MatchPhase::DuringRound {
            return Ok(());
        }

        let Some((module, verdict)) = self.poll(Capability::RoundEndCondition)? else {
            return Ok(());
        };
        let round = self.ctx.round() + 1;
        if let Some(team) = verdict.outcome {
            self.ctx.scoring().record_round_winner(team);
        }
        info!(round, decided_by = module, winner = ?verdict.outcome, "round decided");
        metrics::record_round(verdict.outcome);
        self.ctx.emit(Event::RoundEnded {
            timestamp: Utc::now(),
            round,
            decided_by: module.to_string(),
            winner: verdict.outcome,
        });
        self.transition(MatchPhase::PostRound);
        Ok(())
    }

    async fn end_round(&mut self) -> Result<(), MatchError> {
        self.ctx.complete_round();
        dispatch::dispatch(&mut self.registry, &self.ctx, &RoundEnd).await;
        self.settle();

        self.ctx.roster().purge_round_scoped();
        self.ctx.dropped().retain(|w| !w.round_scoped);

        match self.poll(Capability::GameEndCondition)? {
            Some((module, verdict)) => {
                self.winner = verdict.outcome;
                info!(decided_by = module, winner = ?verdict.outcome, "game decided");
                self.transition(MatchPhase::PostGame);
            }
            None => self.transition(MatchPhase::PreRound),
        }
        Ok(())
    }

    async fn end_game(&mut self) {
        dispatch::dispatch(&mut self.registry, &self.ctx, &GameEnd).await;
        self.settle();
        self.transition(MatchPhase::Ended);
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// First subscriber of a condition capability reporting `ended`.
    fn poll(&mut self, capability: Capability) -> Result<Option<(&'static str, Verdict)>, MatchError> {
        let snapshot = self.registry.snapshot(capability);
        for module in self.registry.modules_mut(&snapshot) {
            let polled = match capability {
                Capability::GameEndCondition => module.should_game_end(&self.ctx),
                _ => module.should_round_end(&self.ctx),
            };
            let verdict = polled.map_err(|source| {
                error!(module = module.name(), %capability, error = %source, "condition poll failed");
                MatchError::ConditionFailed {
                    module: module.name().to_string(),
                    source,
                }
            })?;
            if verdict.ended {
                return Ok(Some((module.name(), verdict)));
            }
        }
        Ok(None)
    }

    fn transition(&mut self, to: MatchPhase) {
        let from = self.phase;
        debug_assert!(from.can_advance_to(to) || to == MatchPhase::Ended);
        if from == to {
            return;
        }
        self.phase = to;
        self.registry.invalidate();

        let round = self.ctx.round();
        info!(%from, %to, round, "phase transition");
        metrics::record_phase_transition(from, to);
        metrics::set_current_phase(to, Some(from));
        self.ctx.emit(Event::PhaseEntered {
            timestamp: Utc::now(),
            from,
            to,
            round,
        });

        if to == MatchPhase::Ended {
            let winner = self.winner;
            info!(rounds = round, winner = ?winner, forced = self.forced, "match ended");
            self.ctx.emit(Event::MatchEnded {
                timestamp: Utc::now(),
                rounds: round,
                winner,
                forced: self.forced,
            });
        }
    }

    /// Delivers queued notifications and applies module toggles.
    fn settle(&mut self) {
        while let Some(signal) = self.ctx.take_signal() {
            match signal {
                Signal::TeamAssigned(player, team) => {
                    dispatch::notify(&mut self.registry, &self.ctx, &TeamAssigned(player, team));
                }
                Signal::TeamSwap => {
                    dispatch::notify(&mut self.registry, &self.ctx, &TeamSwap);
                }
            }
        }
        for (id, enabled) in self.ctx.take_toggles() {
            self.registry.set_enabled(id, enabled);
        }
    }

    async fn drain_commands(&mut self) {
        while !self.phase.is_terminal() {
            let Ok((command, reply)) = self.commands.try_recv() else {
                break;
            };
            let result = self.apply(command).await;
            let _ = reply.send(result);
        }
    }

    async fn apply_command(&mut self, command: MatchCommand) -> Result<(), MatchError> {
        if command.requires_live_round() && self.phase != MatchPhase::DuringRound {
            return Err(MatchError::OutOfPhase {
                action: command.name(),
                phase: self.phase,
            });
        }
        debug!(command = command.name(), phase = %self.phase, "applying command");

        let action = command.name();
        match command {
            MatchCommand::Join { name, connection } => {
                self.join(name, connection);
            }
            MatchCommand::AssignTeam { player, team } => {
                let id = self.resolve(player)?;
                self.ctx.assign_team(id, team);
            }
            MatchCommand::PlayerSpawned { player } => {
                let id = self.resolve(player)?;
                if let Some(p) = self.ctx.roster().get_mut(id) {
                    p.alive = true;
                }
                dispatch::dispatch(&mut self.registry, &self.ctx, &PlayerSpawn(id)).await;
            }
            MatchCommand::BombPlanted { planter } => {
                let planter = self.resolve(planter)?;
                self.bomb(action, BombEvent::Planted { planter })?;
            }
            MatchCommand::DefuseStarted { defuser } => {
                let defuser = self.resolve(defuser)?;
                self.bomb(action, BombEvent::DefuseStarted { defuser })?;
            }
            MatchCommand::BombDetonated => self.bomb(action, BombEvent::Detonated)?,
            MatchCommand::BombDefused { defuser } => {
                let defuser = self.resolve(defuser)?;
                self.bomb(action, BombEvent::Defused { defuser })?;
            }
            MatchCommand::PlayerKilled { victim, attacker } => {
                let victim = self.resolve(victim)?;
                let attacker = attacker.map(|a| self.resolve(a)).transpose()?;
                if let Some(p) = self.ctx.roster().get_mut(victim) {
                    p.alive = false;
                }
                dispatch::notify(
                    &mut self.registry,
                    &self.ctx,
                    &PlayerKilled { victim, attacker },
                );
            }
            MatchCommand::ForceEnd => self.force_end(),
        }
        self.settle();
        Ok(())
    }

    /// Notifies bomb subscribers once every one of them accepts `event`.
    fn bomb(&mut self, action: &'static str, event: BombEvent) -> Result<(), MatchError> {
        let subscribers = self.registry.snapshot(Capability::BombEvents);
        for module in self.registry.modules_mut(&subscribers) {
            module
                .check_bomb_event(&self.ctx, event)
                .map_err(|source| MatchError::Refused {
                    action,
                    module: module.name().to_string(),
                    source,
                })?;
        }
        dispatch::notify(&mut self.registry, &self.ctx, &BombNotice(event));
        Ok(())
    }

    fn resolve(&self, player: PlayerRef) -> Result<PlayerId, MatchError> {
        self.ctx
            .roster()
            .find(player)
            .map(|p| p.id)
            .ok_or_else(|| MatchError::PlayerNotFound {
                player: player.to_string(),
            })
    }

    fn publish(&self) {
        let mut snapshot = MatchSnapshot::capture(self.phase, &self.ctx);
        for module in self.registry.modules() {
            module.replicate(&mut snapshot);
        }
        self.mirror.send_replace(snapshot);
    }
}

const fn rejection_label(error: &MatchError) -> &'static str {
    match error {
        MatchError::PlayerNotFound { .. } => "player_not_found",
        MatchError::OutOfPhase { .. } => "out_of_phase",
        MatchError::Refused { .. } => "refused",
        _ => "other",
    }
}
