//! Explicit match context.
//!
//! Every rule-module callback receives a `&MatchContext`. It owns the
//! shared, host-authoritative match state that modules read and mutate:
//! roster, team scoring, round clock, elimination exemption, display state
//! and dropped equipment. Requests that must be handled by the host after
//! the current stage (team notifications, module toggles) are queued here.
//!
//! Only the host task ever touches a context. The mutexes exist because
//! concurrent `on` callbacks share it; they are never held across `.await`.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::time::Instant;
use tracing::info;

use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics;
use crate::phase::ModuleId;
use crate::roster::{Player, PlayerId, Roster, SpawnPoint, Team, Weapon};
use crate::rules::economy::IncomeReason;
use crate::spawn::{AnySpawnAssigner, SpawnAssigner};

// ============================================================================
// Collaborator state
// ============================================================================

/// Round-winner slot and per-team round wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeamScoring {
    round_winner: Team,
    wins: BTreeMap<Team, u32>,
}

impl TeamScoring {
    /// Winner of the round being settled; `Unassigned` when none was recorded.
    #[must_use]
    pub const fn round_winner(&self) -> Team {
        self.round_winner
    }

    /// Records the round winner and counts the win.
    pub fn record_round_winner(&mut self, team: Team) {
        self.round_winner = team;
        if team.is_playing() {
            *self.wins.entry(team).or_insert(0) += 1;
        }
    }

    /// Clears the winner slot before a new round.
    pub fn clear_round_winner(&mut self) {
        self.round_winner = Team::Unassigned;
    }

    /// Round wins for `team`.
    #[must_use]
    pub fn wins(&self, team: Team) -> u32 {
        self.wins.get(&team).copied().unwrap_or(0)
    }

    /// Team with strictly more round wins, if any.
    #[must_use]
    pub fn leader(&self) -> Option<Team> {
        let (a, b) = (self.wins(Team::A), self.wins(Team::B));
        match a.cmp(&b) {
            std::cmp::Ordering::Greater => Some(Team::A),
            std::cmp::Ordering::Less => Some(Team::B),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Resets winner slot and totals.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Round countdown shared by the round time limit and scenario modules.
#[derive(Debug, Clone, Default)]
pub struct RoundClock {
    /// Whether the countdown can end the round.
    pub enabled: bool,
    /// Whether observers should show the countdown.
    pub visible: bool,
    /// When the current round's countdown started.
    pub started_at: Option<Instant>,
}

impl RoundClock {
    /// Restarts the countdown at `now`.
    pub fn start(&mut self, now: Instant) {
        self.enabled = true;
        self.visible = true;
        self.started_at = Some(now);
    }
}

/// Presentation state mirrored to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisplayState {
    /// Status line per team.
    pub status: BTreeMap<Team, String>,
    /// Toast notifications raised so far this match.
    pub toasts: Vec<String>,
}

/// Follow-up work a callback asks the host to perform after the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Deliver `TeamAssigned(player, team)` to subscribers.
    TeamAssigned(PlayerId, Team),
    /// Deliver `TeamSwap` to subscribers.
    TeamSwap,
}

// ============================================================================
// MatchContext
// ============================================================================

/// Shared state handed to every rule-module call.
pub struct MatchContext {
    round: AtomicU32,
    roster: Mutex<Roster>,
    scoring: Mutex<TeamScoring>,
    clock: Mutex<RoundClock>,
    elimination_exempt: Mutex<Team>,
    display: Mutex<DisplayState>,
    dropped: Mutex<Vec<Weapon>>,
    signals: Mutex<VecDeque<Signal>>,
    toggles: Mutex<Vec<(ModuleId, bool)>>,
    rng: Mutex<StdRng>,
    default_equipment: Vec<String>,
    spawns: Box<dyn SpawnAssigner>,
    events: Arc<EventEmitter>,
}

impl MatchContext {
    /// Creates a context around the given collaborators.
    #[must_use]
    pub fn new(
        spawns: Box<dyn SpawnAssigner>,
        default_equipment: Vec<String>,
        seed: u64,
        events: Arc<EventEmitter>,
    ) -> Self {
        Self {
            round: AtomicU32::new(0),
            roster: Mutex::new(Roster::new()),
            scoring: Mutex::new(TeamScoring::default()),
            clock: Mutex::new(RoundClock::default()),
            elimination_exempt: Mutex::new(Team::Unassigned),
            display: Mutex::new(DisplayState::default()),
            dropped: Mutex::new(Vec::new()),
            signals: Mutex::new(VecDeque::new()),
            toggles: Mutex::new(Vec::new()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            default_equipment,
            spawns,
            events,
        }
    }

    /// A context with fallback collaborators and a silent event stream.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(
            Box::new(AnySpawnAssigner),
            Vec::new(),
            0,
            Arc::new(EventEmitter::noop()),
        )
    }

    // ------------------------------------------------------------------------
    // Round counter
    // ------------------------------------------------------------------------

    /// Number of completed rounds.
    #[must_use]
    pub fn round(&self) -> u32 {
        self.round.load(Ordering::SeqCst)
    }

    pub(crate) fn set_round(&self, round: u32) {
        self.round.store(round, Ordering::SeqCst);
    }

    pub(crate) fn complete_round(&self) -> u32 {
        self.round.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ------------------------------------------------------------------------
    // Locked state
    // ------------------------------------------------------------------------

    /// Player directory and inventories.
    ///
    /// # Panics
    ///
    /// Panics if the roster lock is poisoned.
    pub fn roster(&self) -> MutexGuard<'_, Roster> {
        self.roster.lock().expect("roster lock poisoned")
    }

    /// Team scoring slot.
    ///
    /// # Panics
    ///
    /// Panics if the scoring lock is poisoned.
    pub fn scoring(&self) -> MutexGuard<'_, TeamScoring> {
        self.scoring.lock().expect("scoring lock poisoned")
    }

    /// Round countdown.
    ///
    /// # Panics
    ///
    /// Panics if the clock lock is poisoned.
    pub fn clock(&self) -> MutexGuard<'_, RoundClock> {
        self.clock.lock().expect("clock lock poisoned")
    }

    /// Presentation state.
    ///
    /// # Panics
    ///
    /// Panics if the display lock is poisoned.
    pub fn display(&self) -> MutexGuard<'_, DisplayState> {
        self.display.lock().expect("display lock poisoned")
    }

    /// Weapons lying in the world.
    ///
    /// # Panics
    ///
    /// Panics if the dropped-equipment lock is poisoned.
    pub fn dropped(&self) -> MutexGuard<'_, Vec<Weapon>> {
        self.dropped.lock().expect("dropped equipment lock poisoned")
    }

    /// Match-wide random source, seeded at build time.
    ///
    /// # Panics
    ///
    /// Panics if the rng lock is poisoned.
    pub fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().expect("rng lock poisoned")
    }

    // ------------------------------------------------------------------------
    // Elimination exemption
    // ------------------------------------------------------------------------

    /// Team currently exempt from the elimination condition.
    ///
    /// # Panics
    ///
    /// Panics if the exemption lock is poisoned.
    #[must_use]
    pub fn elimination_exempt(&self) -> Team {
        *self
            .elimination_exempt
            .lock()
            .expect("exemption lock poisoned")
    }

    /// Exempts `team` from elimination; `Unassigned` clears the exemption.
    ///
    /// # Panics
    ///
    /// Panics if the exemption lock is poisoned.
    pub fn set_elimination_exempt(&self, team: Team) {
        *self
            .elimination_exempt
            .lock()
            .expect("exemption lock poisoned") = team;
    }

    // ------------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------------

    /// Spawn point for `player` from the installed assigner.
    #[must_use]
    pub fn spawn_point(&self, player: &Player) -> SpawnPoint {
        self.spawns.spawn_point(player)
    }

    /// Weapon kinds every player starts with; these are never dropped.
    #[must_use]
    pub fn default_equipment(&self) -> &[String] {
        &self.default_equipment
    }

    /// Grants `amount` to every player on `team`.
    pub fn give_team_income(&self, team: Team, amount: u32, reason: IncomeReason) {
        self.roster().give_team_income(team, amount);
        info!(%team, amount, reason = reason.as_str(), "team income granted");
        metrics::record_income(team, reason, amount);
        self.emit(Event::IncomeGranted {
            timestamp: Utc::now(),
            team,
            amount,
            reason: reason.as_str().to_string(),
        });
    }

    /// Sets the status line shown to `team`.
    pub fn show_status_text(&self, team: Team, text: &str) {
        self.display().status.insert(team, text.to_string());
    }

    /// Raises a toast notification for everyone.
    pub fn toast(&self, text: &str) {
        info!(text, "toast");
        self.display().toasts.push(text.to_string());
    }

    /// Hides the round countdown from observers.
    pub fn hide_timer(&self) {
        self.clock().visible = false;
    }

    /// Emits a structured event.
    pub fn emit(&self, event: Event) {
        self.events.emit(event);
    }

    // ------------------------------------------------------------------------
    // Deferred host work
    // ------------------------------------------------------------------------

    /// Moves a player to `team` and queues a `TeamAssigned` notification.
    ///
    /// Returns `false` if the player is unknown; nothing changes then.
    pub fn assign_team(&self, player: PlayerId, team: Team) -> bool {
        let Some(p) = self.roster().get_mut(player).map(|p| {
            p.team = team;
            p.id
        }) else {
            return false;
        };
        self.push_signal(Signal::TeamAssigned(p, team));
        true
    }

    /// Queues a `TeamSwap` notification.
    pub fn request_team_swap(&self) {
        self.push_signal(Signal::TeamSwap);
    }

    /// Requests that a module be enabled or disabled.
    ///
    /// The host applies the request once the current dispatch has
    /// finished; a dispatch in progress keeps its subscriber snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the toggle lock is poisoned.
    pub fn set_module_enabled(&self, module: ModuleId, enabled: bool) {
        self.toggles
            .lock()
            .expect("toggle lock poisoned")
            .push((module, enabled));
    }

    pub(crate) fn take_signal(&self) -> Option<Signal> {
        self.signals
            .lock()
            .expect("signal lock poisoned")
            .pop_front()
    }

    pub(crate) fn take_toggles(&self) -> Vec<(ModuleId, bool)> {
        std::mem::take(&mut *self.toggles.lock().expect("toggle lock poisoned"))
    }

    fn push_signal(&self, signal: Signal) {
        self.signals
            .lock()
            .expect("signal lock poisoned")
            .push_back(signal);
    }
}

impl std::fmt::Debug for MatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchContext")
            .field("round", &self.round())
            .field("default_equipment", &self.default_equipment)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_leader_and_tie() {
        let mut scoring = TeamScoring::default();
        assert_eq!(scoring.leader(), None);
        scoring.record_round_winner(Team::B);
        assert_eq!(scoring.leader(), Some(Team::B));
        scoring.record_round_winner(Team::A);
        assert_eq!(scoring.leader(), None);
        assert_eq!(scoring.round_winner(), Team::A);
    }

    #[test]
    fn test_unassigned_winner_not_counted() {
        let mut scoring = TeamScoring::default();
        scoring.record_round_winner(Team::Unassigned);
        assert_eq!(scoring.wins(Team::Unassigned), 0);
        assert_eq!(scoring.round_winner(), Team::Unassigned);
    }

    #[test]
    fn test_assign_team_queues_signal() {
        let ctx = MatchContext::detached();
        let id = ctx.roster().join("alice", None);
        assert!(ctx.assign_team(id, Team::A));
        assert_eq!(ctx.take_signal(), Some(Signal::TeamAssigned(id, Team::A)));
        assert_eq!(ctx.take_signal(), None);
    }

    #[test]
    fn test_assign_unknown_player_changes_nothing() {
        let ctx = MatchContext::detached();
        assert!(!ctx.assign_team(PlayerId(42), Team::A));
        assert_eq!(ctx.take_signal(), None);
    }

    #[test]
    fn test_team_income_reaches_roster() {
        let ctx = MatchContext::detached();
        let id = ctx.roster().join("alice", None);
        ctx.roster().get_mut(id).unwrap().team = Team::A;
        ctx.give_team_income(Team::A, 1400, IncomeReason::LossBonus);
        assert_eq!(ctx.roster().get(id).unwrap().inventory.cash(), 1400);
    }

    #[test]
    fn test_complete_round_counts_up() {
        let ctx = MatchContext::detached();
        assert_eq!(ctx.complete_round(), 1);
        assert_eq!(ctx.complete_round(), 2);
        ctx.set_round(0);
        assert_eq!(ctx.round(), 0);
    }
}
