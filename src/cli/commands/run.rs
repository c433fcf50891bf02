//! `run` command.
//!
//! Builds a match from configuration, seats the configured players and
//! lets the autopilot play it to the end.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::autopilot::Autopilot;
use crate::cli::args::{OutputFormat, RunArgs};
use crate::config::{ConfigLoader, MatchConfig};
use crate::error::RoundKeeperError;
use crate::observability::EventEmitter;
use crate::phase::{Match, MatchBuilder, MatchCommand, MatchSummary};
use crate::roster::Team;
use crate::rules;
use crate::spawn::TeamSpawnAssigner;

/// Run a match from a configuration file.
///
/// # Errors
///
/// Returns a config error if the file does not load, an I/O error if the
/// event file or metrics listener cannot be opened, and a match error if
/// the match cannot be built or a condition poll fails.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), RoundKeeperError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    info!(config = %args.config.display(), "loading configuration");
    let loaded = ConfigLoader::with_defaults().load(&args.config)?;
    for warning in &loaded.warnings {
        warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    let config = loaded.config;

    let events = match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };
    let seed = args
        .seed
        .or(config.settings.seed)
        .unwrap_or_else(rand::random);
    info!(seed, "match seed");

    let mut game = build(&config, seed, Arc::new(events), cancel)?;
    seat_players(&mut game, &config).await?;

    let attackers = config.rules.bomb_defusal.as_ref().map(|b| b.attackers);
    let pilot = tokio::spawn(Autopilot::new(game.handle(), seed, attackers).run());

    let summary = game.run().await?;
    if let Err(e) = pilot.await {
        warn!(error = %e, "autopilot task failed");
    }

    print_summary(&summary, args.format)?;
    Ok(())
}

/// Builds the match described by `config`.
///
/// # Errors
///
/// Returns `MatchError::MissingCapability` if a module's requirement is
/// not configured.
pub fn build(
    config: &MatchConfig,
    seed: u64,
    events: Arc<EventEmitter>,
    cancel: CancellationToken,
) -> Result<Match, RoundKeeperError> {
    let mut builder = MatchBuilder::new(config.settings.name.clone())
        .tick(config.settings.tick)
        .seed(seed)
        .modules(rules::from_config(&config.rules))
        .default_equipment(config.default_equipment.clone())
        .events(events)
        .cancellation(cancel);

    if !config.spawns.is_empty() {
        let points = HashMap::from([
            (Team::A, config.spawns.a.clone()),
            (Team::B, config.spawns.b.clone()),
        ]);
        builder = builder.spawn_assigner(Box::new(TeamSpawnAssigner::new(points)));
    }

    Ok(builder.build()?)
}

/// Joins every configured player and assigns their team.
async fn seat_players(game: &mut Match, config: &MatchConfig) -> Result<(), RoundKeeperError> {
    for player in &config.players {
        let id = game.join(player.name.clone(), None);
        if player.team.is_playing() {
            game.apply(MatchCommand::AssignTeam {
                player: id.into(),
                team: player.team,
            })
            .await?;
        }
    }
    Ok(())
}

fn print_summary(summary: &MatchSummary, format: OutputFormat) -> Result<(), RoundKeeperError> {
    match format {
        OutputFormat::Human => {
            let winner = summary
                .winner
                .map_or_else(|| "draw".to_string(), |t| format!("team {t}"));
            println!("match:   {} ({})", summary.name, summary.match_id);
            println!("rounds:  {}", summary.rounds);
            for (team, wins) in &summary.scores {
                println!("team {team}:  {wins}");
            }
            println!("winner:  {winner}");
            if summary.forced {
                println!("ended:   forced");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
    }
    Ok(())
}
