//! Prometheus metrics for the match host.
//!
//! Every label value comes from a closed enum, so series cardinality is
//! bounded regardless of configuration or player input.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::RoundKeeperError;
use crate::phase::{Capability, MatchPhase};
use crate::roster::Team;
use crate::rules::economy::IncomeReason;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// With a port, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`; without one the recorder is installed with no
/// endpoint.
///
/// # Errors
///
/// Returns `RoundKeeperError::Io` if the recorder or listener cannot be
/// installed.
pub fn init_metrics(port: Option<u16>) -> Result<(), RoundKeeperError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| RoundKeeperError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "roundkeeper_phase_transitions_total",
        "Match phase transitions"
    );
    describe_gauge!(
        "roundkeeper_current_phase",
        "Currently active match phase (1 = active)"
    );
    describe_counter!("roundkeeper_rounds_total", "Completed rounds by winner");
    describe_histogram!(
        "roundkeeper_dispatch_duration_ms",
        "Capability dispatch duration in milliseconds"
    );
    describe_counter!(
        "roundkeeper_dispatch_failures_total",
        "Failed on-stage callbacks"
    );
    describe_counter!(
        "roundkeeper_income_granted_total",
        "Income paid per player, by team and reason"
    );
    describe_gauge!("roundkeeper_loss_streak_level", "Loss-streak level per team");
    describe_counter!("roundkeeper_commands_total", "External commands applied");
    describe_counter!(
        "roundkeeper_commands_rejected_total",
        "External commands rejected"
    );
}

/// Records a phase transition.
pub fn record_phase_transition(from: MatchPhase, to: MatchPhase) {
    counter!(
        "roundkeeper_phase_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

/// Sets the current-phase gauge, zeroing the previous label.
pub fn set_current_phase(phase: MatchPhase, previous: Option<MatchPhase>) {
    if let Some(prev) = previous {
        gauge!("roundkeeper_current_phase", "phase" => prev.as_str()).set(0.0);
    }
    gauge!("roundkeeper_current_phase", "phase" => phase.as_str()).set(1.0);
}

/// Records a completed round.
pub fn record_round(winner: Option<Team>) {
    let label = winner.map_or("none", team_label);
    counter!("roundkeeper_rounds_total", "winner" => label).increment(1);
}

/// Records one dispatch and its failed callbacks.
#[allow(clippy::cast_precision_loss)]
pub fn record_dispatch(capability: Capability, duration: Duration, failures: usize) {
    histogram!("roundkeeper_dispatch_duration_ms", "capability" => capability.as_str())
        .record(duration.as_secs_f64() * 1000.0);
    if failures > 0 {
        counter!("roundkeeper_dispatch_failures_total", "capability" => capability.as_str())
            .increment(failures as u64);
    }
}

/// Records income paid to a team.
pub fn record_income(team: Team, reason: IncomeReason, amount: u32) {
    counter!(
        "roundkeeper_income_granted_total",
        "team" => team_label(team),
        "reason" => reason.as_str()
    )
    .increment(u64::from(amount));
}

/// Sets the loss-streak gauge for a team.
pub fn set_loss_streak_level(team: Team, level: u32) {
    gauge!("roundkeeper_loss_streak_level", "team" => team_label(team)).set(f64::from(level));
}

/// Records an applied external command.
pub fn record_command(command: &'static str) {
    counter!("roundkeeper_commands_total", "command" => command).increment(1);
}

/// Records a rejected external command.
pub fn record_command_rejected(reason: &'static str) {
    counter!("roundkeeper_commands_rejected_total", "reason" => reason).increment(1);
}

const fn team_label(team: Team) -> &'static str {
    match team {
        Team::Unassigned => "unassigned",
        Team::A => "a",
        Team::B => "b",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_phase_transition(MatchPhase::PreGame, MatchPhase::PreRound);
        set_current_phase(MatchPhase::PreRound, Some(MatchPhase::PreGame));
        record_round(Some(Team::A));
        record_round(None);
        record_dispatch(Capability::RoundStart, Duration::from_millis(3), 1);
        record_income(Team::B, IncomeReason::LossBonus, 1400);
        set_loss_streak_level(Team::B, 2);
        record_command("bomb_planted");
        record_command_rejected("player_not_found");
    }

    #[test]
    fn team_labels_are_fixed() {
        assert_eq!(team_label(Team::A), "a");
        assert_eq!(team_label(Team::B), "b");
        assert_eq!(team_label(Team::Unassigned), "unassigned");
    }
}
