//! Shared integration-test harness: fixture loading, in-process match
//! drivers and a helper for running the `roundkeeper` binary.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use roundkeeper::cli::commands::run::build;
use roundkeeper::config::{ConfigLoader, MatchConfig};
use roundkeeper::context::MatchContext;
use roundkeeper::error::RuleError;
use roundkeeper::observability::EventEmitter;
use roundkeeper::phase::{Capability, Match, MatchCommand, MatchPhase};
use roundkeeper::roster::{PlayerId, Team};
use roundkeeper::rules::RuleModule;

/// Upper bound on steps taken while waiting for a phase.
pub const MAX_STEPS: usize = 10_000;

/// Returns the path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Runs the `roundkeeper` binary to completion with the given arguments.
pub fn run_cli(args: &[&str]) -> Output {
    run_cli_with_env(args, &[])
}

/// Runs the `roundkeeper` binary with extra environment variables.
#[allow(clippy::missing_panics_doc)]
pub fn run_cli_with_env(args: &[&str], env: &[(&str, &str)]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_roundkeeper"))
        .args(args)
        .env_remove("ROUNDKEEPER_CONFIG")
        .env_remove("ROUNDKEEPER_SEED")
        .env_remove("ROUNDKEEPER_EVENTS_FILE")
        .env_remove("ROUNDKEEPER_METRICS_PORT")
        .envs(env.iter().copied())
        .output()
        .expect("failed to run roundkeeper")
}

/// Loads a fixture through the full configuration pipeline.
#[allow(clippy::missing_panics_doc)]
pub fn load_fixture(name: &str) -> MatchConfig {
    let loaded = ConfigLoader::with_defaults()
        .load(&fixture_path(name))
        .unwrap_or_else(|e| panic!("fixture {name} failed to load: {e}"));
    (*loaded.config).clone()
}

/// Builds a match from `config` and seats its players.
pub async fn seated_match(config: &MatchConfig, seed: u64) -> Match {
    seated_match_with_events(config, seed, Arc::new(EventEmitter::noop())).await
}

/// Like [`seated_match`], writing the event stream to `events`.
#[allow(clippy::missing_panics_doc)]
pub async fn seated_match_with_events(
    config: &MatchConfig,
    seed: u64,
    events: Arc<EventEmitter>,
) -> Match {
    let mut game =
        build(config, seed, events, CancellationToken::new()).expect("match should build");
    for player in &config.players {
        let id = game.join(player.name.clone(), None);
        if player.team.is_playing() {
            game.apply(MatchCommand::AssignTeam {
                player: id.into(),
                team: player.team,
            })
            .await
            .expect("seating should succeed");
        }
    }
    game
}

/// Steps until the match reaches `phase`.
#[allow(clippy::missing_panics_doc)]
pub async fn step_until(game: &mut Match, phase: MatchPhase) {
    for _ in 0..MAX_STEPS {
        if game.phase() == phase {
            return;
        }
        game.step().await.expect("step failed");
    }
    panic!("match never reached {phase} (stuck in {})", game.phase());
}

/// Steps until the match leaves `DuringRound`.
#[allow(clippy::missing_panics_doc)]
pub async fn finish_round(game: &mut Match) {
    for _ in 0..MAX_STEPS {
        if game.phase() != MatchPhase::DuringRound {
            return;
        }
        game.step().await.expect("step failed");
    }
    panic!("round never ended");
}

/// Ids of every player currently on `team`.
pub fn members(game: &Match, team: Team) -> Vec<PlayerId> {
    game.context().roster().ids_on_team(team)
}

/// Id of the player called `name`.
#[allow(clippy::missing_panics_doc)]
pub fn player(game: &Match, name: &str) -> PlayerId {
    game.context()
        .roster()
        .all()
        .find(|p| p.name == name)
        .map(|p| p.id)
        .unwrap_or_else(|| panic!("no player named {name}"))
}

/// Cash held by the player called `name`.
pub fn cash(game: &Match, name: &str) -> u32 {
    let id = player(game, name);
    game.context()
        .roster()
        .get(id)
        .map_or(0, |p| p.inventory.cash())
}

/// Kills every member of `team`.
#[allow(clippy::missing_panics_doc)]
pub async fn eliminate(game: &mut Match, team: Team) {
    for victim in members(game, team) {
        game.apply(MatchCommand::PlayerKilled {
            victim: victim.into(),
            attacker: None,
        })
        .await
        .expect("kill should be accepted");
    }
}

/// Plays one full round that `loser` loses by elimination, ending in
/// `PreRound` or `PostGame`.
pub async fn play_elimination_round(game: &mut Match, loser: Team) {
    step_until(game, MatchPhase::DuringRound).await;
    eliminate(game, loser).await;
    finish_round(game).await;
    step_until_any(game, &[MatchPhase::PreRound, MatchPhase::PostGame]).await;
}

/// Steps until the match reaches one of `phases`.
#[allow(clippy::missing_panics_doc)]
pub async fn step_until_any(game: &mut Match, phases: &[MatchPhase]) {
    for _ in 0..MAX_STEPS {
        if phases.contains(&game.phase()) {
            return;
        }
        game.step().await.expect("step failed");
    }
    panic!("match never reached any of {phases:?}");
}

// ============================================================================
// Recorder module
// ============================================================================

/// Shared, ordered record of module callbacks.
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Creates an empty journal.
pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// Entries recorded so far.
#[allow(clippy::missing_panics_doc)]
pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// A module that journals every round start and round end stage.
///
/// Its `on` stage sleeps for `delay` between a `start` and an `end` entry,
/// so concurrent `on` stages interleave in the journal.
pub struct Recorder {
    pub name: &'static str,
    pub delay: Duration,
    pub fail_on: bool,
    pub journal: Journal,
}

impl Recorder {
    pub fn new(name: &'static str, delay: Duration, journal: &Journal) -> Self {
        Self {
            name,
            delay,
            fail_on: false,
            journal: Arc::clone(journal),
        }
    }

    fn log(&self, entry: &str) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}.{entry}", self.name));
    }

    async fn on_stage(&self, stage: &str) -> Result<(), RuleError> {
        self.log(&format!("on_{stage}.start"));
        tokio::time::sleep(self.delay).await;
        self.log(&format!("on_{stage}.end"));
        if self.fail_on {
            return Err(RuleError::Failed(format!("{} refused", self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl RuleModule for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::RoundStart, Capability::RoundEnd]
    }

    fn pre_round_start(&mut self, _ctx: &MatchContext) {
        self.log("pre_round_start");
    }

    async fn on_round_start(&mut self, _ctx: &MatchContext) -> Result<(), RuleError> {
        self.on_stage("round_start").await
    }

    fn post_round_start(&mut self, _ctx: &MatchContext) {
        self.log("post_round_start");
    }

    fn pre_round_end(&mut self, _ctx: &MatchContext) {
        self.log("pre_round_end");
    }

    async fn on_round_end(&mut self, _ctx: &MatchContext) -> Result<(), RuleError> {
        self.on_stage("round_end").await
    }

    fn post_round_end(&mut self, _ctx: &MatchContext) {
        self.log("post_round_end");
    }
}
